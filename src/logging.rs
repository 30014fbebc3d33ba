//! Logging and tracing setup.
//!
//! Logs go to **stderr**: stdout belongs to the host that runs the provider.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls log levels (e.g., `info`, `keep_provider=debug`)
//!
//! ```bash
//! # Trace every backend request
//! RUST_LOG=keep_provider::client=debug terraform apply
//! ```

use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

const DEFAULT_FILTER: &str = "info";

/// Install the stderr subscriber, filtered by `RUST_LOG` or `info`.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    tracing_subscriber::registry().with(stderr_layer()).init();
}

/// Like [`init_logging`], but returns `false` instead of panicking when a
/// subscriber is already installed. Test binaries call this from every test.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(stderr_layer())
        .try_init()
        .is_ok()
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn stderr_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_filter(env_filter())
}

#[cfg(test)]
mod tests {
    // One global subscriber per process.
    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("keep_provider=debug").is_ok());
        assert!(EnvFilter::try_new("warn,keep_provider::client=trace").is_ok());
    }

    #[test]
    fn test_try_init_is_idempotent() {
        let _ = try_init_logging();
        assert!(!try_init_logging());
    }
}
