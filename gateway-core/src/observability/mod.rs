pub mod logger;
pub mod logging;
pub mod metrics;

pub use logger::{noop_logger, Logger, NoopLogger, TracingLogger};
#[cfg(any(test, feature = "test-util"))]
pub use logger::{Level, RecordingLogger};
pub use logging::setup_logging;
pub use metrics::{ConnectorMetrics, ConnectorStats};
