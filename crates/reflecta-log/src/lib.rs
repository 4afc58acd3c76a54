//! Diagnostics channel for the `Reflecta` runtime.
//!
//! Every failed lookup, rejected invocation or dropped queued call in the
//! runtime is reported through this crate. Messages are filtered by a global
//! level and handed to a [`Sink`]: the default [`TerminalSink`] prints
//! colored lines to stderr, and [`CaptureSink`] keeps records in memory so
//! tests can assert on the exact diagnostic a call produced.
//!
//! # Example
//!
//! ```
//! use reflecta_log::{error, warn, info, debug, Level};
//!
//! reflecta_log::set_level(Level::Debug);
//!
//! let class = "Counter";
//! info!("registered class {}", class);
//! debug!("method table: {:?}", vec!["increment()", "reset()"]);
//! warn!("no such method");
//! error!("dead lock detected");
//! ```

use parking_lot::RwLock;
use std::cell::RefCell;
use std::fmt::Arguments;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::ThreadId;

/// Environment variable consulted by [`init_from_env`].
pub const ENV_VAR: &str = "REFLECTA_LOG";

/// Severity of a log record.
///
/// Lower numeric values indicate higher severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Contract violations and calls that were refused.
    Error = 0,
    /// Recoverable failures (lookup misses, dropped deliveries).
    Warn = 1,
    /// Informational messages.
    Info = 2,
    /// Registry and dispatch decisions.
    Debug = 3,
    /// Per-call tracing.
    Trace = 4,
}

impl Level {
    #[cfg(feature = "color")]
    const fn color_code(self) -> &'static str {
        match self {
            Level::Error => "\x1b[31m",
            Level::Warn => "\x1b[33m",
            Level::Info => "\x1b[32m",
            Level::Debug => "\x1b[36m",
            Level::Trace => "\x1b[35m",
        }
    }

    /// Returns the upper-case name of this level.
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }

    const fn from_u8(raw: u8) -> Level {
        match raw {
            0 => Level::Error,
            1 => Level::Warn,
            2 => Level::Info,
            3 => Level::Debug,
            _ => Level::Trace,
        }
    }
}

/// Error returned when a level name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelError(pub String);

impl std::fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid log level: {}", self.0)
    }
}

impl std::error::Error for ParseLevelError {}

impl FromStr for Level {
    type Err = ParseLevelError;

    /// Parses a level name case-insensitively.
    ///
    /// ```
    /// use reflecta_log::Level;
    ///
    /// assert_eq!("error".parse::<Level>(), Ok(Level::Error));
    /// assert_eq!("INFO".parse::<Level>(), Ok(Level::Info));
    /// assert!("loud".parse::<Level>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ERROR" => Ok(Level::Error),
            "WARN" | "WARNING" => Ok(Level::Warn),
            "INFO" => Ok(Level::Info),
            "DEBUG" => Ok(Level::Debug),
            "TRACE" => Ok(Level::Trace),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// A single formatted log message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Severity.
    pub level: Level,
    /// Module path of the call site.
    pub target: String,
    /// Formatted message.
    pub message: String,
    /// Thread that emitted the record.
    pub thread: ThreadId,
}

/// Destination for log records.
pub trait Sink: Send + Sync {
    /// Consumes one record. Called only for enabled levels.
    fn write(&self, record: &Record);
}

/// Writes records to stderr, one line each.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalSink;

impl Sink for TerminalSink {
    fn write(&self, record: &Record) {
        #[cfg(feature = "color")]
        {
            const RESET: &str = "\x1b[0m";
            let color = record.level.color_code();
            eprintln!(
                "{color}[{}]{RESET} {}: {}",
                record.level.as_str(),
                record.target,
                record.message
            );
        }
        #[cfg(not(feature = "color"))]
        eprintln!(
            "[{}] {}: {}",
            record.level.as_str(),
            record.target,
            record.message
        );
    }
}

/// Keeps every record in memory.
///
/// Install it globally with [`set_sink`] or for one thread with
/// [`with_thread_sink`].
#[derive(Debug, Default)]
pub struct CaptureSink {
    records: parking_lot::Mutex<Vec<Record>>,
}

impl CaptureSink {
    /// Creates an empty capture sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything captured so far.
    #[must_use]
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().clone()
    }

    /// Drains the captured records.
    pub fn take(&self) -> Vec<Record> {
        std::mem::take(&mut *self.records.lock())
    }

    /// Returns `true` if a record at `level` contains `needle`.
    #[must_use]
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.records
            .lock()
            .iter()
            .any(|r| r.level == level && r.message.contains(needle))
    }
}

impl Sink for CaptureSink {
    fn write(&self, record: &Record) {
        self.records.lock().push(record.clone());
    }
}

impl<S: Sink + ?Sized> Sink for Arc<S> {
    fn write(&self, record: &Record) {
        (**self).write(record);
    }
}

/// The global logger.
///
/// The level is an atomic so the enabled check on the hot path never takes
/// a lock; the sink sits behind a read-mostly lock.
pub struct Logger {
    level: AtomicU8,
    sink: RwLock<Arc<dyn Sink>>,
}

impl Logger {
    fn new(level: Level) -> Self {
        Logger {
            level: AtomicU8::new(level as u8),
            sink: RwLock::new(Arc::new(TerminalSink)),
        }
    }

    /// Sets the minimum level; less severe messages are discarded.
    pub fn set_level(&self, level: Level) {
        self.level.store(level as u8, Ordering::SeqCst);
    }

    /// Returns the current minimum level.
    pub fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed))
    }

    /// Checks if a message at `level` would be delivered.
    pub fn enabled(&self, level: Level) -> bool {
        level as u8 <= self.level.load(Ordering::Relaxed)
    }

    /// Replaces the sink, returning the previous one.
    pub fn set_sink(&self, sink: Arc<dyn Sink>) -> Arc<dyn Sink> {
        std::mem::replace(&mut *self.sink.write(), sink)
    }
}

static LOGGER: OnceLock<Logger> = OnceLock::new();

thread_local! {
    static THREAD_SINK: RefCell<Option<Arc<dyn Sink>>> = const { RefCell::new(None) };
}

/// Returns the global logger, created at `Level::Info` on first use.
pub fn get_logger() -> &'static Logger {
    LOGGER.get_or_init(|| Logger::new(Level::Info))
}

/// Sets the minimum level of the global logger.
pub fn set_level(level: Level) {
    get_logger().set_level(level);
}

/// Sets the minimum level from a level name.
///
/// # Errors
///
/// Returns [`ParseLevelError`] if `s` is not a level name.
pub fn set_level_from_str(s: &str) -> Result<(), ParseLevelError> {
    set_level(s.parse()?);
    Ok(())
}

/// Replaces the global sink, returning the previous one.
pub fn set_sink(sink: Arc<dyn Sink>) -> Arc<dyn Sink> {
    get_logger().set_sink(sink)
}

/// Applies the level named by the `REFLECTA_LOG` environment variable.
///
/// Returns the level now in effect. An unset or unparsable variable keeps
/// the current level.
pub fn init_from_env() -> Level {
    if let Ok(value) = std::env::var(ENV_VAR) {
        match value.parse::<Level>() {
            Ok(level) => set_level(level),
            Err(err) => __log_with_target(
                Level::Warn,
                module_path!(),
                format_args!("{ENV_VAR}: {err}"),
            ),
        }
    }
    get_logger().level()
}

/// Runs `f` with `sink` receiving every record emitted on this thread.
///
/// Records from other threads still go to the global sink. Nested calls
/// restore the outer sink when they return.
pub fn with_thread_sink<R>(sink: Arc<dyn Sink>, f: impl FnOnce() -> R) -> R {
    struct Restore(Option<Arc<dyn Sink>>);
    impl Drop for Restore {
        fn drop(&mut self) {
            let previous = self.0.take();
            THREAD_SINK.with(|slot| *slot.borrow_mut() = previous);
        }
    }

    let previous = THREAD_SINK.with(|slot| slot.borrow_mut().replace(sink));
    let _restore = Restore(previous);
    f()
}

/// Formats and delivers a record. Called by the macros after the level check.
#[doc(hidden)]
pub fn __log_with_target(level: Level, target: &str, args: Arguments<'_>) {
    let logger = get_logger();
    if !logger.enabled(level) {
        return;
    }

    let record = Record {
        level,
        target: target.to_string(),
        message: args.to_string(),
        thread: std::thread::current().id(),
    };

    let local = THREAD_SINK.with(|slot| slot.borrow().clone());
    match local {
        Some(sink) => sink.write(&record),
        None => logger.sink.read().write(&record),
    }
}

/// Logs a message at an explicit level, tagged with the caller's module path.
///
/// ```
/// use reflecta_log::{log, Level};
///
/// log!(level: Level::Info, "resolved {} methods", 3);
/// ```
#[macro_export]
macro_rules! log {
    (level: $level:expr, $($arg:tt)*) => {
        {
            if $crate::get_logger().enabled($level) {
                $crate::__log_with_target(
                    $level,
                    module_path!(),
                    format_args!($($arg)*)
                );
            }
        }
    };
}

/// Logs at [`Level::Error`].
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Error, $($arg)*)
    };
}

/// Logs at [`Level::Warn`].
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Warn, $($arg)*)
    };
}

/// Logs at [`Level::Info`].
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Info, $($arg)*)
    };
}

/// Logs at [`Level::Debug`].
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Debug, $($arg)*)
    };
}

/// Logs at [`Level::Trace`].
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Trace, $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Error < Level::Warn);
        assert!(Level::Warn < Level::Info);
        assert!(Level::Info < Level::Debug);
        assert!(Level::Debug < Level::Trace);
    }

    #[test]
    fn test_level_from_str() {
        assert_eq!("error".parse::<Level>(), Ok(Level::Error));
        assert_eq!("WARN".parse::<Level>(), Ok(Level::Warn));
        assert_eq!("warning".parse::<Level>(), Ok(Level::Warn));
        assert_eq!(" Info ".parse::<Level>(), Ok(Level::Info));
        assert_eq!("trace".parse::<Level>(), Ok(Level::Trace));
        assert!("verbose".parse::<Level>().is_err());
    }

    #[test]
    fn test_logger_level_filtering() {
        let logger = Logger::new(Level::Warn);

        assert!(logger.enabled(Level::Error));
        assert!(logger.enabled(Level::Warn));
        assert!(!logger.enabled(Level::Info));

        logger.set_level(Level::Trace);
        assert!(logger.enabled(Level::Trace));
        assert_eq!(logger.level(), Level::Trace);
    }

    #[test]
    fn test_thread_sink_captures_records() {
        let capture = Arc::new(CaptureSink::new());

        with_thread_sink(capture.clone(), || {
            error!("method {} not found", "frobnicate(i32)");
        });
        error!("outside the capture scope");

        let records = capture.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, Level::Error);
        assert!(records[0].message.contains("frobnicate(i32)"));
        assert!(records[0].target.starts_with("reflecta_log"));
        assert!(capture.contains(Level::Error, "not found"));
    }

    #[test]
    fn test_thread_sink_nesting_restores_outer() {
        let outer = Arc::new(CaptureSink::new());
        let inner = Arc::new(CaptureSink::new());

        with_thread_sink(outer.clone(), || {
            with_thread_sink(inner.clone(), || error!("inner"));
            error!("outer");
        });

        assert_eq!(inner.take().len(), 1);
        let outer_records = outer.take();
        assert_eq!(outer_records.len(), 1);
        assert_eq!(outer_records[0].message, "outer");
    }

    #[test]
    fn test_capture_from_other_threads_is_isolated() {
        let capture = Arc::new(CaptureSink::new());

        with_thread_sink(capture.clone(), || {
            std::thread::spawn(|| error!("from another thread"))
                .join()
                .unwrap();
        });

        assert!(capture.records().is_empty());
    }
}
