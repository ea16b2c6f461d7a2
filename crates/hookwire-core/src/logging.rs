//! Logging setup for hosts embedding the runtime.

use tracing_subscriber::EnvFilter;

use crate::config::env_vars;

/// Install a global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `verbose`. Setting `HOOKWIRE_LOG_JSON` to
/// `1`, `true`, `yes` or `on` switches to JSON output. Returns `false` if a
/// subscriber was already installed.
pub fn init(verbose: bool) -> bool {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    let json_logging = json_requested(std::env::var(env_vars::LOG_JSON).ok().as_deref());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("hookwire_core={}", level))
            .add_directive(tracing::Level::WARN.into())
    });

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .try_init()
            .is_ok()
    }
}

fn json_requested(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}
