use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins; otherwise the configured level (default `info`) is used.
/// Safe to call more than once; later calls are no-ops.
pub fn init(level: Option<&str>) {
  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("info")));

  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(true)
    .try_init();
}
