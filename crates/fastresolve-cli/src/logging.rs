//! Logging initialization for the CLI.
//!
//! Library crates only emit `tracing` events; the subscriber is installed
//! here. Logs always go to stderr so stdout stays parseable.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber.
///
/// `verbosity` 0 keeps resolver warnings only, 1 adds per-request
/// decisions (DEBUG), 2+ adds cache hits and misses (TRACE). With `json`
/// every event is a single JSON line on stderr.
///
/// JSON output format (stable contract):
/// ```json
/// {"timestamp":"...","level":"WARN","target":"fastresolve_core::resolver","span":{"cmd":"resolve","cwd":"/path"},"message":"..."}
/// ```
///
/// # Panics
/// Panics if the subscriber cannot be initialized (e.g., called twice).
pub fn init(verbosity: u8, json: bool) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // RUST_LOG wins for other targets; our crates follow the -v flag.
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    for target in ["fastresolve_core", "fastresolve"] {
        if let Ok(directive) = format!("{target}={level}").parse() {
            filter = filter.add_directive(directive);
        }
    }

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}
