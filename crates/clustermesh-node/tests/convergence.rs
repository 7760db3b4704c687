//! Multi-node convergence over the simulated mesh.

use clustermesh_node::{Node, NodeConfig, SimulatedMesh};
use clustermesh_peer::Gossiper;
use clustermesh_state::{ClusterInfo, PeerName, RootCertificate};

fn name(n: u64) -> PeerName {
    PeerName::from_u64(n)
}

fn cert(not_before: u64, sig: &str) -> RootCertificate {
    RootCertificate::new(format!("ca-{sig}").into_bytes(), not_before, sig.as_bytes().to_vec())
}

async fn start(mesh: &SimulatedMesh, n: u64, url: &str, peers: &[u64]) -> Node {
    let mut config = NodeConfig::new(name(n)).with_apiserver_url(url);
    for &p in peers {
        config = config.with_peer(name(p));
    }
    Node::start(config, mesh).await.unwrap()
}

#[tokio::test]
async fn three_disjoint_nodes_converge_to_union() {
    let mesh = SimulatedMesh::new();
    let a = start(&mesh, 1, "u1", &[]).await;
    let b = start(&mesh, 2, "u2", &[1]).await;
    let c = start(&mesh, 3, "u3", &[2]).await;

    assert!(mesh.converge(5).is_some());

    let expected = ClusterInfo::new(None, ["u1", "u2", "u3"]);
    for node in [&a, &b, &c] {
        assert_eq!(node.cluster_info(), expected);
    }
}

#[tokio::test]
async fn line_topology_converges_through_intermediaries() {
    let mesh = SimulatedMesh::new();
    let mut nodes = Vec::new();
    for i in 0..6u64 {
        let peers: Vec<u64> = if i == 0 { vec![] } else { vec![i - 1] };
        nodes.push(start(&mesh, i, &format!("https://api-{i}"), &peers).await);
    }

    let rounds = mesh.converge(10).expect("line should converge");
    assert!(rounds <= 6);
    for node in &nodes {
        assert_eq!(node.cluster_info().apiserver_urls.len(), 6);
    }
}

#[tokio::test]
async fn certificate_tie_break_agrees_everywhere() {
    let mesh = SimulatedMesh::new();
    let a = Node::start_with_certificate(
        NodeConfig::new(name(1)).with_apiserver_url("http://x"),
        Some(cert(1_000, "aa")),
        &mesh,
    )
    .await
    .unwrap();
    let b = Node::start_with_certificate(
        NodeConfig::new(name(2))
            .with_apiserver_url("http://y")
            .with_peer(name(1)),
        Some(cert(1_000, "bb")),
        &mesh,
    )
    .await
    .unwrap();

    for node in [&a, &b] {
        let info = node.cluster_info();
        assert_eq!(info.root_certificate.as_ref().unwrap().signature, b"bb".to_vec());
        assert_eq!(info, ClusterInfo::new(Some(cert(1_000, "bb")), ["http://x", "http://y"]));
    }
}

#[tokio::test]
async fn newer_certificate_replaces_older_across_mesh() {
    let mesh = SimulatedMesh::new();
    let a = Node::start_with_certificate(NodeConfig::new(name(1)), Some(cert(100, "zz")), &mesh)
        .await
        .unwrap();
    let b = start(&mesh, 2, "u2", &[1]).await;
    let c = start(&mesh, 3, "u3", &[2]).await;
    assert!(mesh.converge(5).is_some());
    assert_eq!(c.cluster_info().not_before(), Some(100));

    // rotate on b: later not_before wins even with a smaller signature
    b.set_root_certificate(cert(200, "aa")).await.unwrap();
    assert!(mesh.converge(5).is_some());

    for node in [&a, &b, &c] {
        assert_eq!(node.cluster_info().not_before(), Some(200));
    }

    // an older certificate announced later is ignored
    c.set_root_certificate(cert(150, "zzzz")).await.unwrap();
    assert!(mesh.converge(5).is_some());
    assert_eq!(a.cluster_info().not_before(), Some(200));
}

#[tokio::test]
async fn partition_heals_after_reconnect() {
    let mesh = SimulatedMesh::new();
    let a = start(&mesh, 1, "u1", &[]).await;
    let b = start(&mesh, 2, "u2", &[1]).await;
    mesh.unlink(name(1), name(2));

    a.add_apiserver_url("only-a").await.unwrap();
    b.add_apiserver_url("only-b").await.unwrap();
    assert!(!mesh.is_converged());
    assert_eq!(mesh.converge(3), None);

    mesh.link(name(1), name(2));
    assert_eq!(mesh.converge(3), Some(1));
    assert_eq!(
        a.cluster_info(),
        ClusterInfo::new(None, ["only-a", "only-b", "u1", "u2"])
    );
}

#[tokio::test]
async fn duplicate_and_reordered_delivery_is_harmless() {
    let mesh = SimulatedMesh::new();
    let a = start(&mesh, 1, "u1", &[]).await;

    let older = ClusterInfo::new(Some(cert(1, "a")), ["x"]).encode().unwrap();
    let newer = ClusterInfo::new(Some(cert(2, "b")), ["y"]).encode().unwrap();

    for buf in [&newer, &older, &newer, &older] {
        a.peer().on_gossip_broadcast(name(9), buf).unwrap();
    }
    let info = a.cluster_info();
    assert_eq!(info.not_before(), Some(2));
    assert_eq!(info, ClusterInfo::new(Some(cert(2, "b")), ["u1", "x", "y"]));
}

#[tokio::test]
async fn malformed_payload_does_not_disturb_mesh() {
    let mesh = SimulatedMesh::new();
    let a = start(&mesh, 1, "u1", &[]).await;
    let before = a.cluster_info();

    assert!(a.peer().on_gossip_broadcast(name(9), b"not bincode at all").is_err());
    assert!(a.peer().on_gossip(&[]).is_err());
    assert_eq!(a.cluster_info(), before);
}

#[tokio::test]
async fn send_complete_delivers_full_state_by_unicast() {
    let mesh = SimulatedMesh::new();
    let a = start(&mesh, 1, "u1", &[]).await;
    let b = start(&mesh, 2, "u2", &[]).await;

    a.peer().send_complete(name(2)).await.unwrap();

    assert!(b.cluster_info().apiserver_urls.contains("u1"));
    assert_eq!(mesh.stats().unicasts, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callbacks_from_many_peers() {
    let mesh = SimulatedMesh::new();
    let a = start(&mesh, 1, "u1", &[]).await;
    let peer = a.peer().clone();

    let tasks: Vec<_> = (0..16u64)
        .map(|i| {
            let peer = peer.clone();
            tokio::task::spawn_blocking(move || {
                for j in 0..25u64 {
                    let buf = ClusterInfo::new(Some(cert(j, "s")), [format!("p{i}-{j}")])
                        .encode()
                        .unwrap();
                    let result = match j % 3 {
                        0 => peer.on_gossip_broadcast(name(100 + i), &buf).map(|_| ()),
                        1 => peer.on_gossip_unicast(name(100 + i), &buf),
                        _ => peer.on_gossip(&buf).map(|_| ()),
                    };
                    result.unwrap();
                }
            })
        })
        .collect();
    for t in tasks {
        t.await.unwrap();
    }

    let info = a.cluster_info();
    assert_eq!(info.apiserver_urls.len(), 1 + 16 * 25);
    assert_eq!(info.not_before(), Some(24));
}
