//! Logging setup for opgraph.
//!
//! The library reports through the `log` facade. Set OPGRAPH_DEBUG=1 or
//! OPGRAPH_DEBUG=true to see every translated call and inserted node.

use std::env;
use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

static DEBUG_ENABLED: OnceLock<bool> = OnceLock::new();

/// Check if debug mode is enabled via OPGRAPH_DEBUG environment variable
#[inline]
pub fn debug_enabled() -> bool {
    *DEBUG_ENABLED.get_or_init(|| {
        env::var("OPGRAPH_DEBUG")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    })
}

pub fn log_level(verbose: bool) -> LevelFilter {
    if verbose || debug_enabled() {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    }
}

/// Install a stderr subscriber at the level picked by [`log_level`].
///
/// `RUST_LOG` directives take precedence. `log` records are forwarded to it.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(log_level(verbose).into())
        .from_env_lossy();
    // A subscriber may already be installed (tests, embedding applications).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
