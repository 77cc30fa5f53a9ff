//! Structured logging bootstrap with `tracing`.
//!
//! The relay logs through the `tracing` macros everywhere; this module only
//! owns subscriber setup. Relay failures are intentionally quiet (the
//! swallow-and-log policy), so the log stream is the main observability
//! surface next to the Prometheus counters.

/// Initialize the global tracing subscriber with stderr output.
///
/// Call once at application startup. Subsequent calls are no-ops.
///
/// # Arguments
///
/// * `level` - Minimum log level when `RUST_LOG` is unset. Defaults
///   apply per-crate filtering syntax, e.g. `"info,concierge_server=debug"`.
pub fn init_subscriber(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // set_global_default is a no-op if already set
    let _ = subscriber.try_init();
}
