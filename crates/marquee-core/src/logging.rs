use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global `fmt` subscriber.
///
/// `RUST_LOG` wins over `default_filter`. Calling this more than once keeps
/// the first subscriber.
pub fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}
