//! Shared utilities.

pub mod clock;
pub mod duration;
pub mod ids;
pub mod telemetry;

pub use self::clock::now_ms;
pub use self::ids::{ReportId, ReportPayload};
pub use self::telemetry::init_tracing;
