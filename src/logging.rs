use tracing_subscriber::{EnvFilter, fmt};

/// Installs the stderr subscriber. `RUST_LOG` overrides the `info` default;
/// stdout stays free for results.
pub fn init() {
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .try_init();
}
