//! Logging setup for geoadjust binaries and benchmarks
//!
//! The library itself only emits `tracing` events; executables call one of the
//! functions below once at startup to install a subscriber.

use tracing::Level;

/// Initialize the tracing subscriber with the default INFO level
///
/// The level can be overridden with the `RUST_LOG` environment variable:
/// ```bash
/// RUST_LOG=geoadjust=debug cargo run --bin residuals -- ...
/// ```
///
/// # Example
/// ```no_run
/// use geoadjust::init_logger;
///
/// init_logger();
/// tracing::info!("Residual run started");
/// ```
pub fn init_logger() {
    init_logger_with_level(Level::INFO)
}

/// Initialize the tracing subscriber with a custom default level
///
/// # Arguments
/// * `default_level` - The default log level (overrideable via RUST_LOG)
pub fn init_logger_with_level(default_level: Level) {
    use tracing_subscriber::fmt::time::SystemTime;

    // try_init: benches and tests may install a subscriber more than once
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_timer(SystemTime)
        .with_target(true)
        .with_level(true)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init();
}
