//! # ilp-node
//!
//! Configuration loading, logging setup and bring-up of a connector node.

mod config;
mod error;
mod node;
mod trace;

pub use self::config::{load_configuration, NodeConfig, ENV_PREFIX};
pub use self::error::NodeError;
pub use self::node::ConnectorNode;
pub use self::trace::init_tracing;
