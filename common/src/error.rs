use std::{backtrace::Backtrace, fmt::Debug};

use tracing::{error, warn};

/// Report-and-continue handling for results whose failure must not take the
/// control loop down with them
pub trait LogErrorExt {
    /// Logs the error at `error` level with a backtrace and discards it
    fn log_error(self, message: &str);
    /// Logs the error at `warn` level and discards it; for expected losses
    /// such as a full telemetry channel
    fn log_warn(self, message: &str);
}

impl<T, E: Debug> LogErrorExt for Result<T, E> {
    fn log_error(self, message: &str) {
        if let Err(err) = self {
            error!(
                "{}: {:?}, Backtrace: {}",
                message,
                err,
                Backtrace::force_capture()
            );
        }
    }

    fn log_warn(self, message: &str) {
        if let Err(err) = self {
            warn!("{}: {:?}", message, err);
        }
    }
}
