//! Diagnostic tracing for experiment resolution.
//!
//! Resolution events carry structured `experiment_id`, `variant` and `run`
//! fields; fetch, normalization and assignment-store failures are logged at
//! `warn` and fall back to the page defaults. Output goes to stderr and never
//! mixes with the JSON the CLI prints on stdout.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the stderr subscriber for the `experiments` binary.
///
/// `RUST_LOG` selects the filter; unset means `warn`, so only fallbacks to
/// page defaults are shown. Use `experiments=debug` to trace directive
/// parsing and sticky-assignment reuse.
///
/// # Example
/// ```bash
/// RUST_LOG=experiments=debug experiments resolve --page page.toml --root site/
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
