//! Clustermesh simulator
//!
//! Starts a ring of nodes on the in-process mesh, lets them gossip and
//! prints every node's converged view.
//!
//! Usage: `clustermesh-sim [NODES] [MAX_ROUNDS]`

use std::env;
use std::time::{SystemTime, UNIX_EPOCH};

use clustermesh_node::certificate::unix_millis;
use clustermesh_node::{Node, NodeConfig, SimulatedMesh};
use clustermesh_state::{PeerName, RootCertificate};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clustermesh_state=info,clustermesh_peer=info,clustermesh_node=info,clustermesh_sim=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().collect();
    let node_count = args.get(1).and_then(|s| s.parse::<u64>().ok()).unwrap_or(5).max(1);
    let max_rounds: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(10);

    let now = unix_millis(SystemTime::now().duration_since(UNIX_EPOCH)?)?;
    let mesh = SimulatedMesh::new();
    let mut nodes = Vec::new();

    for i in 0..node_count {
        let name = PeerName::from_u64(0x0200_0000_0000 + i);
        let mut config = NodeConfig::new(name)
            .with_nickname(format!("node-{i}"))
            .with_apiserver_url(format!("https://apiserver-{i}.cluster.local:6443"));
        if i > 0 {
            config = config.with_peer(PeerName::from_u64(0x0200_0000_0000 + i - 1));
        }

        // first and last node race with the same not_before
        let certificate = (i == 0 || i == node_count - 1).then(|| {
            RootCertificate::new(
                format!("root-ca-{i}").into_bytes(),
                now,
                blake3::hash(format!("root-ca-{i}").as_bytes()).as_bytes().to_vec(),
            )
        });

        nodes.push(Node::start_with_certificate(config, certificate, &mesh).await?);
    }
    if node_count > 2 {
        // close the ring
        mesh.link(nodes[0].name(), nodes[nodes.len() - 1].name());
    }

    nodes[0]
        .add_apiserver_url("https://apiserver-vip.cluster.local:6443")
        .await?;

    match mesh.converge(max_rounds) {
        Some(rounds) => tracing::info!("Converged after {} gossip rounds", rounds),
        None => tracing::warn!("Not converged after {} gossip rounds", max_rounds),
    }

    let report: Vec<_> = nodes
        .iter()
        .map(|node| {
            let info = node.cluster_info();
            serde_json::json!({
                "node": node.name().to_string(),
                "nickname": node.config().nickname,
                "root_ca": info.root_certificate.as_ref().map(|c| serde_json::json!({
                    "not_before": c.not_before,
                    "signature": hex::encode(&c.signature),
                    "bytes": c.bytes.len(),
                })),
                "apiserver_urls": info.apiserver_urls,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&report)?);

    let stats = mesh.stats();
    println!(
        "exchanges={} broadcasts={} unicasts={} errors={}",
        stats.exchanges, stats.broadcasts, stats.unicasts, stats.errors
    );

    for node in &nodes {
        node.stop();
    }
    Ok(())
}
