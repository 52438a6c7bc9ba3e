//! Step logging configuration.

use std::ffi::OsString;

use serde::{Deserialize, Serialize};

/// Environment variable whose presence turns on forensic dumps.
pub const DEBUG_ENV: &str = "BFT_DEBUG";

/// Default column at which log lines are wrapped.
pub const DEFAULT_WRAP_WIDTH: usize = 80;

/// Settings shared by every step of a test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Dump per-action results and failure detail when a step fails.
    pub debug: bool,

    /// Echo log lines to stdout in addition to the owner's buffer.
    pub console: bool,

    /// Column at which timestamped lines are wrapped.
    pub wrap_width: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            console: true,
            wrap_width: DEFAULT_WRAP_WIDTH,
        }
    }
}

impl Settings {
    /// Defaults, with `debug` taken from [`DEBUG_ENV`].
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        Self {
            debug: lookup(DEBUG_ENV).is_some(),
            ..Self::default()
        }
    }

    /// Set the debug flag.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Enable or disable stdout echo.
    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    /// Set the wrap column. Zero is clamped to one.
    pub fn with_wrap_width(mut self, width: usize) -> Self {
        self.wrap_width = width.max(1);
        self
    }

    /// Settings suitable for unit tests: no console echo.
    pub fn quiet() -> Self {
        Self::default().with_console(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert!(!s.debug);
        assert!(s.console);
        assert_eq!(s.wrap_width, 80);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: Settings = serde_json::from_str(r#"{"debug": true}"#).expect("valid settings");
        assert!(s.debug);
        assert!(s.console);
        assert_eq!(s.wrap_width, DEFAULT_WRAP_WIDTH);
    }

    #[test]
    fn debug_flag_follows_presence_of_variable() {
        let set = Settings::from_lookup(|key| (key == DEBUG_ENV).then(|| OsString::from("")));
        assert!(set.debug, "an empty value still enables debug");
        assert!(set.console);

        let unset = Settings::from_lookup(|_| None);
        assert!(!unset.debug);
    }

    #[test]
    fn from_env_reads_bft_debug() {
        std::env::set_var(DEBUG_ENV, "1");
        let on = Settings::from_env();
        std::env::remove_var(DEBUG_ENV);
        let off = Settings::from_env();

        assert!(on.debug);
        assert!(!off.debug);
    }

    #[test]
    fn builder_clamps_width() {
        let s = Settings::quiet().with_wrap_width(0);
        assert!(!s.console);
        assert_eq!(s.wrap_width, 1);
    }
}
