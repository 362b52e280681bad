use sloggers::terminal::{Destination, TerminalLoggerBuilder};
use sloggers::Build;

pub use slog::{crit, debug, error, info, o, trace, warn, Discard, Logger};
pub use sloggers::types::Severity;

/// Builds the process-wide terminal logger writing to stderr. Components
/// derive their own child loggers from the returned root.
pub fn init(level: Severity) -> Logger {
    let mut builder = TerminalLoggerBuilder::new();
    builder.level(level);
    builder.destination(Destination::Stderr);

    builder.build().expect("Logger construction failed")
}

/// Parses a `LOG_LEVEL`-style string into a severity. Unrecognized values
/// fall back to `Info`.
pub fn parse_level(level: &str) -> Severity {
    match level.to_ascii_lowercase().as_str() {
        "trace" => Severity::Trace,
        "debug" => Severity::Debug,
        "warning" | "warn" => Severity::Warning,
        "error" => Severity::Error,
        "critical" => Severity::Critical,
        _ => Severity::Info,
    }
}
