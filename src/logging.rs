//! Logging setup for the command-line follower.
//!
//! Priority: `RUST_LOG` env var > `--debug` flag > "info". Output goes to stderr
//! so followed lines on stdout stay clean.

use tracing_subscriber::EnvFilter;

/// Default filter when neither `RUST_LOG` nor `--debug` is given.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Initialise the global subscriber. Call once, from `main`.
pub fn init(debug_flag: bool) {
    let filter = filter_for(std::env::var("RUST_LOG").ok().as_deref(), debug_flag);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "Logging initialised");
}

fn filter_for(rust_log: Option<&str>, debug_flag: bool) -> EnvFilter {
    match rust_log {
        Some(directives) if !directives.is_empty() => EnvFilter::new(directives),
        _ if debug_flag => EnvFilter::new("debug"),
        _ => EnvFilter::new(DEFAULT_LOG_LEVEL),
    }
}
