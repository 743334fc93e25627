/// Structured logging for the tap water quality service
///
/// Provides context-rich logging with component and ZIP identifiers,
/// timestamps, and severity levels. Supports both console output
/// and file-based logging for long-running service operation.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl LogLevel {
    /// Parses a level name as written in `tapwater.toml`.
    pub fn parse(name: &str) -> Option<LogLevel> {
        match name.trim().to_ascii_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Database,
    Api,
    Client,
    Fixture,
    System,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Database => write!(f, "DB"),
            Component::Api => write!(f, "API"),
            Component::Client => write!(f, "CLIENT"),
            Component::Fixture => write!(f, "FIXTURE"),
            Component::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - e.g. the service is shutting down
    Expected,
    /// Unexpected failure - indicates store outage or a schema/config issue
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut slot) = LOGGER.lock() {
            *slot = Some(logger);
        }
    }

    fn log(&self, level: LogLevel, component: Component, zip: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let zip_part = zip.map(|z| format!(" [{}]", z)).unwrap_or_default();
        let log_entry = format!("{} {} {}{}: {}", timestamp, level, component, zip_part, message);

        if self.console_timestamps {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", log_entry),
                LogLevel::Info | LogLevel::Debug => println!("{}", log_entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", component, zip_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", component, zip_part, message),
                LogLevel::Info => println!("   {}{}: {}", component, zip_part, message),
                LogLevel::Debug => println!("   [DEBUG] {}{}: {}", component, zip_part, message),
            }
        }

        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn emit(level: LogLevel, component: Component, zip: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, component, zip, message);
        }
    }
}

/// Log a general informational message
pub fn info(component: Component, zip: Option<&str>, message: &str) {
    emit(LogLevel::Info, component, zip, message);
}

/// Log a warning message
pub fn warn(component: Component, zip: Option<&str>, message: &str) {
    emit(LogLevel::Warning, component, zip, message);
}

/// Log an error message
pub fn error(component: Component, zip: Option<&str>, message: &str) {
    emit(LogLevel::Error, component, zip, message);
}

/// Log a debug message
pub fn debug(component: Component, zip: Option<&str>, message: &str) {
    emit(LogLevel::Debug, component, zip, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a store failure from its error text
pub fn classify_store_failure(error_message: &str) -> FailureType {
    let msg = error_message.to_ascii_lowercase();

    if msg.contains("shutting down") || msg.contains("admin_shutdown") {
        FailureType::Expected
    }
    // Connectivity problems mean the store is unreachable
    else if msg.contains("connection") || msg.contains("timed out") || msg.contains("timeout") {
        FailureType::Unexpected
    }
    // Missing relations or columns point at a schema mismatch
    else if msg.contains("does not exist") || msg.contains("schema error") {
        FailureType::Unexpected
    } else {
        FailureType::Unknown
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a store failure with automatic classification
pub fn log_store_failure(zip: &str, operation: &str, err: &dyn std::error::Error) {
    let error_msg = err.to_string();
    let failure_type = classify_store_failure(&error_msg);

    let message = format!("{} failed [{}]: {}", operation, failure_type, error_msg);

    match failure_type {
        FailureType::Expected => debug(Component::Database, Some(zip), &message),
        FailureType::Unexpected => error(Component::Database, Some(zip), &message),
        FailureType::Unknown => warn(Component::Database, Some(zip), &message),
    }
}

// ---------------------------------------------------------------------------
// Report Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of one ZIP lookup
pub fn log_report_summary(zip: &str, providers: usize, contaminants: usize, exceeding: usize) {
    let message = format!(
        "Report built: {} provider(s), {} contaminant(s), {} above guideline",
        providers, contaminants, exceeding
    );

    if providers == 0 {
        debug(Component::Api, Some(zip), &message);
    } else {
        info(Component::Api, Some(zip), &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("INFO"), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse("warn"), Some(LogLevel::Warning));
        assert_eq!(LogLevel::parse(" debug "), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("verbose"), None);
    }

    #[test]
    fn test_failure_classification() {
        let refused = "Connection error: error connecting to server: Connection refused";
        assert_eq!(classify_store_failure(refused), FailureType::Unexpected);

        let missing = "Query error: db error: ERROR: relation \"ewg_zip_pwsids\" does not exist";
        assert_eq!(classify_store_failure(missing), FailureType::Unexpected);

        let shutdown = "Query error: db error: FATAL: terminating connection due to administrator command (shutting down)";
        assert_eq!(classify_store_failure(shutdown), FailureType::Expected);

        let other = "Decode error: unexpected null in column \"pwsid\"";
        assert_eq!(classify_store_failure(other), FailureType::Unknown);
    }
}
