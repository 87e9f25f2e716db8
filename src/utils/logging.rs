//! Conditional logging macros gated on a module-level `ENABLE_LOGS` const.
//!
//! Hot paths (the per-frame decode loop) log through these so a module's
//! chatter can be compiled out by flipping one flag, without touching call
//! sites. Each using module defines `const ENABLE_LOGS: bool = ...;` and
//! imports the macros from the crate root.

/// Info-level logging, compiled out when the calling module's `ENABLE_LOGS`
/// is false.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Warn-level variant of [`log_info!`].
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Error-level variant of [`log_info!`].
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
