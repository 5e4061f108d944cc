pub mod channel;
pub mod communications;
pub mod config;
pub mod membership;
pub mod network;
pub mod node;
pub mod runtime;
pub mod simulation;

pub(crate) use tracing::{debug, error, info, warn};
