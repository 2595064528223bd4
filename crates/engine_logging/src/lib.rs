#![deny(missing_docs)]
//! Shared logging utilities for the harvest workspace.
//!
//! This crate provides the `engine_*` logging macros used across the codebase
//! and a minimal test initializer for the global logger.

use std::sync::atomic::{AtomicU32, Ordering};

/// Results page currently being processed; 0 when no page is active.
static CURRENT_PAGE: AtomicU32 = AtomicU32::new(0);

/// Sets the results page that subsequent log lines are tagged with.
/// Pass 0 to clear the tag.
pub fn set_current_page(page: u32) {
    CURRENT_PAGE.store(page, Ordering::Relaxed);
}

/// Retrieves the results page log lines are currently tagged with.
/// Returns 0 if no page is active.
pub fn current_page() -> u32 {
    CURRENT_PAGE.load(Ordering::Relaxed)
}

/// Prefix prepended by the `engine_*` macros, e.g. `"[page 3] "`.
#[doc(hidden)]
pub fn page_prefix() -> String {
    match current_page() {
        0 => String::new(),
        page => format!("[page {page}] "),
    }
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! engine_trace {
    ($($arg:tt)*) => {{
        log::trace!("{}{}", $crate::page_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {{
        log::info!("{}{}", $crate::page_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! engine_debug {
    ($($arg:tt)*) => {{
        log::debug!("{}{}", $crate::page_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {{
        log::warn!("{}{}", $crate::page_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {{
        log::error!("{}{}", $crate::page_prefix(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

#[cfg(test)]
mod tests {
    use super::{current_page, page_prefix, set_current_page};

    #[test]
    fn page_tag_follows_current_page() {
        set_current_page(3);
        assert_eq!(current_page(), 3);
        assert_eq!(page_prefix(), "[page 3] ");
        set_current_page(0);
        assert_eq!(page_prefix(), "");
    }
}
