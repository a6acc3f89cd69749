use tracing_subscriber::{fmt, EnvFilter};

pub mod logging;
pub mod metrics;

// Re-export commonly used items
pub use logging::{init_structured_logging, LogConfig, LogFormat};

/// Minimal init for tests and one-off tools; services should build a
/// [`LogConfig`] and call [`init_structured_logging`] instead.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
}
