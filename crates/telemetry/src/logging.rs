use serde::{Deserialize, Serialize};
use std::env;
use std::io;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    /// Human-readable format (default for development)
    Pretty,
    /// Compact text format
    Compact,
    /// JSON format for log aggregation systems
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self::Pretty
    }
}

impl LogFormat {
    /// Parse log format from the `LOG_FORMAT` environment variable
    pub fn from_env() -> Self {
        match env::var("LOG_FORMAT")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "json" => Self::Json,
            "compact" => Self::Compact,
            "pretty" => Self::Pretty,
            _ => Self::default(),
        }
    }
}

/// Configuration for structured logging
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log output format (pretty/compact/json)
    pub format: LogFormat,
    /// Service name (e.g., "monitor-node", "dashboard-ui")
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Node ID when several monitors report into one aggregator
    pub node_id: Option<String>,
    /// Environment (dev/staging/production)
    pub environment: String,
    /// Enable span events (enter/exit/close)
    pub enable_span_events: bool,
    /// Log to file in addition to stdout
    pub log_to_file: bool,
    /// Log file directory
    pub log_dir: Option<String>,
}

impl LogConfig {
    /// Create a new log configuration with sensible defaults
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            format: LogFormat::from_env(),
            service_name: service_name.into(),
            service_version: env::var("SERVICE_VERSION").unwrap_or_else(|_| "0.1.0".to_string()),
            node_id: env::var("NODE_ID").ok(),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            enable_span_events: env::var("LOG_SPAN_EVENTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            log_to_file: env::var("LOG_TO_FILE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            log_dir: env::var("LOG_DIR").ok(),
        }
    }

    /// Set the log format
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the service version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    /// Set the node ID
    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    /// Set the environment
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Enable logging to file
    pub fn with_file_logging(mut self, log_dir: impl Into<String>) -> Self {
        self.log_to_file = true;
        self.log_dir = Some(log_dir.into());
        self
    }
}

fn default_filter() -> EnvFilter {
    // Chatty dependencies stay at warn unless RUST_LOG overrides them
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    for directive in ["hyper=warn", "tokio=warn", "rumqttc=warn", "ort=warn"] {
        if let Ok(parsed) = directive.parse() {
            filter = filter.add_directive(parsed);
        }
    }
    filter
}

/// Initialize structured logging with the given configuration
pub fn init_structured_logging(config: LogConfig) {
    let span_events = if config.enable_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let registry = tracing_subscriber::registry().with(default_filter());

    match config.format {
        LogFormat::Json => {
            let json_layer = fmt::layer()
                .json()
                .with_span_events(span_events.clone())
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_writer(io::stdout);

            match (config.log_to_file, config.log_dir.as_deref()) {
                (true, Some(log_dir)) => {
                    let file_appender = tracing_appender::rolling::daily(log_dir, "app.log");
                    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
                    let file_layer = fmt::layer()
                        .json()
                        .with_span_events(span_events)
                        .with_writer(non_blocking);
                    registry.with(json_layer).with(file_layer).init();
                }
                _ => registry.with(json_layer).init(),
            }
        }
        LogFormat::Compact => {
            let compact_layer = fmt::layer()
                .compact()
                .with_span_events(span_events)
                .with_target(true)
                .with_thread_ids(false);
            registry.with(compact_layer).init();
        }
        LogFormat::Pretty => {
            let pretty_layer = fmt::layer()
                .pretty()
                .with_span_events(span_events)
                .with_target(true)
                .with_thread_ids(false)
                .with_line_number(true);
            registry.with(pretty_layer).init();
        }
    }

    tracing::info!(
        service.name = %config.service_name,
        service.version = %config.service_version,
        environment = %config.environment,
        node_id = ?config.node_id,
        format = ?config.format,
        "structured logging initialized"
    );
}
