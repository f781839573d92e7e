/// Routing-table engine logging macros that automatically include the
/// component="rt" field for log categorization and filtering.

/// Log an info-level message with component="rt" field
#[macro_export]
macro_rules! rt_info {
    ($($arg:tt)*) => {
        tracing::info!(component = "rt", $($arg)*)
    };
}

/// Log a warning-level message with component="rt" field
#[macro_export]
macro_rules! rt_warn {
    ($($arg:tt)*) => {
        tracing::warn!(component = "rt", $($arg)*)
    };
}

/// Log a debug-level message with component="rt" field
#[macro_export]
macro_rules! rt_debug {
    ($($arg:tt)*) => {
        tracing::debug!(component = "rt", $($arg)*)
    };
}

/// Log an info-level message with component="io" field
#[macro_export]
macro_rules! io_info {
    ($($arg:tt)*) => {
        tracing::info!(component = "io", $($arg)*)
    };
}

/// Log a warning-level message with component="io" field
#[macro_export]
macro_rules! io_warn {
    ($($arg:tt)*) => {
        tracing::warn!(component = "io", $($arg)*)
    };
}

/// Log a debug-level message with component="io" field
#[macro_export]
macro_rules! io_debug {
    ($($arg:tt)*) => {
        tracing::debug!(component = "io", $($arg)*)
    };
}
