//! Clustermesh Node - bootstrap for a gossip-converged cluster config node
//!
//! Produces the inputs the core consumes and wires the core into a gossip
//! substrate:
//!
//! - **Config**: [`NodeConfig`], from `CLUSTERMESH_*` environment variables
//! - **Root CA**: [`load_root_certificate`], opaque bytes plus timestamp
//! - **Substrate seam**: [`Substrate`], what a transport must provide
//! - **Node**: [`Node`], the started peer plus its registered channel
//! - **Simulation**: [`sim::SimulatedMesh`], an in-process substrate
//!
//! # Example
//!
//! ```no_run
//! use clustermesh_node::{Node, NodeConfig, SimulatedMesh};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mesh = SimulatedMesh::new();
//!     let node = Node::start(NodeConfig::from_env()?, &mesh).await?;
//!     node.add_apiserver_url("https://10.0.0.1:6443").await?;
//!     println!("{}", node.cluster_info());
//!     Ok(())
//! }
//! ```

pub mod certificate;
pub mod config;
pub mod error;
pub mod node;
pub mod sim;
pub mod substrate;

pub use certificate::load_root_certificate;
pub use config::NodeConfig;
pub use error::{Error, Result};
pub use node::Node;
pub use sim::{MeshStats, SimulatedMesh};
pub use substrate::Substrate;
