use crate::NodeError;

use tracing_subscriber::{
    filter::EnvFilter,
    fmt::{time::ChronoUtc, Subscriber},
};

/// Installs the global log subscriber. `RUST_LOG` takes precedence over
/// `default_level`.
pub fn init_tracing(default_level: &str) -> Result<(), NodeError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    Subscriber::builder()
        .with_timer(ChronoUtc::rfc3339())
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| NodeError::Logging(err.to_string()))
}
