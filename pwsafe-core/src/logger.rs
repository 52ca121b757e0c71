//! Forwarding of this crate's `log` records to a host-supplied sink.
//!
//! The library only calls `log::debug!` and friends. A host without a `log`
//! backend of its own can install a [`Logger`] with [`set_logger`]. Records
//! from `pwsafe_*` targets are forwarded from the chosen threshold up, records
//! from dependencies only from [`LogLevel::Info`] up.
//!
//! No message emitted by this crate carries a passphrase, a key or a password
//! field value.

use std::sync::{Arc, OnceLock};

use thiserror::Error;

/// Receiver for forwarded log lines.
///
/// # Examples
///
/// ```rust
/// use pwsafe_core::logger::{LogLine, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, line: LogLine) {
///         eprintln!("[{:?} {}] {}", line.level, line.target, line.message);
///     }
/// }
/// ```
pub trait Logger: Sync + Send {
    /// Receives one forwarded line.
    fn log(&self, line: LogLine);
}

/// Severity, least severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Very detailed flow information.
    Trace,
    /// Debugging information such as encoding attempts.
    Debug,
    /// Progress such as opened and saved containers.
    Info,
    /// Recoverable oddities: unknown fields, encoding fallbacks.
    Warn,
    /// Integrity and storage failures.
    Error,
}

impl LogLevel {
    const fn filter(self) -> log::LevelFilter {
        match self {
            Self::Trace => log::LevelFilter::Trace,
            Self::Debug => log::LevelFilter::Debug,
            Self::Info => log::LevelFilter::Info,
            Self::Warn => log::LevelFilter::Warn,
            Self::Error => log::LevelFilter::Error,
        }
    }
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug => Self::Debug,
            log::Level::Trace => Self::Trace,
        }
    }
}

/// One forwarded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Severity.
    pub level: LogLevel,
    /// Emitting target, usually a module path such as `pwsafe_core::container`.
    pub target: String,
    /// Formatted message.
    pub message: String,
}

/// Why [`set_logger`] did not install the sink.
#[derive(Debug, Error)]
pub enum LoggerError {
    /// A sink was installed by an earlier call.
    #[error("a pwsafe logger is already installed")]
    AlreadySet,
    /// Another `log` backend owns the global logger.
    #[error("another log backend is installed: {0}")]
    Backend(#[from] log::SetLoggerError),
}

fn is_ours(target: &str) -> bool {
    target.starts_with("pwsafe_")
}

/// Whether a record at `level` from `target` reaches a sink installed with
/// `threshold`.
fn forwards(threshold: LogLevel, target: &str, level: LogLevel) -> bool {
    if is_ours(target) {
        level >= threshold
    } else {
        level >= threshold.max(LogLevel::Info)
    }
}

struct Bridge {
    sink: Arc<dyn Logger>,
    threshold: LogLevel,
}

impl log::Log for Bridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        forwards(self.threshold, metadata.target(), metadata.level().into())
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.sink.log(LogLine {
            level: record.level().into(),
            target: record.target().to_owned(),
            message: record.args().to_string(),
        });
    }

    fn flush(&self) {}
}

static BRIDGE: OnceLock<Bridge> = OnceLock::new();

/// Installs `sink` as the process-wide destination for log records at
/// `threshold` and above.
///
/// # Errors
///
/// * [`LoggerError::AlreadySet`] on every call after the first.
/// * [`LoggerError::Backend`] if a different `log` backend is already
///   installed. The sink is then never called.
pub fn set_logger(sink: Arc<dyn Logger>, threshold: LogLevel) -> Result<(), LoggerError> {
    let mut fresh = false;
    let bridge = BRIDGE.get_or_init(|| {
        fresh = true;
        Bridge { sink, threshold }
    });
    if !fresh {
        return Err(LoggerError::AlreadySet);
    }
    log::set_logger(bridge)?;
    log::set_max_level(threshold.filter());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(LogLevel::Debug, "pwsafe_core::container::v3", LogLevel::Debug, true ; "own debug")]
    #[test_case(LogLevel::Debug, "pwsafe_crypto::seal", LogLevel::Trace, false ; "own trace below threshold")]
    #[test_case(LogLevel::Trace, "pwsafe_core", LogLevel::Trace, true ; "own trace")]
    #[test_case(LogLevel::Trace, "tempfile", LogLevel::Debug, false ; "foreign debug")]
    #[test_case(LogLevel::Trace, "tempfile", LogLevel::Info, true ; "foreign info")]
    #[test_case(LogLevel::Warn, "tempfile", LogLevel::Info, false ; "foreign info below threshold")]
    #[test_case(LogLevel::Warn, "pwsafe_core", LogLevel::Error, true ; "own error")]
    #[test_case(LogLevel::Debug, "pwsafe", LogLevel::Debug, false ; "bare prefix is foreign")]
    fn test_forwarding(threshold: LogLevel, target: &str, level: LogLevel, expected: bool) {
        assert_eq!(forwards(threshold, target, level), expected);
    }

    #[test]
    fn test_levels_order_by_severity() {
        assert!(LogLevel::Error > LogLevel::Warn);
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert_eq!(LogLevel::from(log::Level::Warn), LogLevel::Warn);
        assert_eq!(LogLevel::Debug.filter(), log::LevelFilter::Debug);
    }
}
