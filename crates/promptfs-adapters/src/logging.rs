//! Tracing subscriber setup for binaries.
//!
//! Library code only emits events; whichever binary links the crates calls
//! [`init`] once at startup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str =
    "promptfs=info,promptfs_core=info,promptfs_adapters=info,promptfs_engine=info";

/// Install a stderr fmt layer filtered by `RUST_LOG` (or `DEFAULT_FILTER`).
///
/// `verbose` bumps the promptfs crates to `debug` when `RUST_LOG` is unset.
/// Calling it twice is harmless; the second call is ignored.
pub fn init(verbose: bool) {
    let fallback = if verbose {
        DEFAULT_FILTER.replace("=info", "=debug")
    } else {
        DEFAULT_FILTER.to_string()
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .try_init();
}
