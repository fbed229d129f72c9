//! Structured logging setup for services embedding the scheduler.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset: queue decisions at info, expiry and
/// overflow warnings included, everything else at warn.
pub const DEFAULT_FILTER: &str = "warn,report_admission=info";

/// Install an env-filtered fmt subscriber unless one is already set.
///
/// `RUST_LOG` wins when present; otherwise [`DEFAULT_FILTER`] applies.
/// Returns whether this call installed the subscriber.
pub fn init_tracing() -> bool {
    if tracing::dispatcher::has_been_set() {
        return false;
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
