//! Common types and actions for tests.
//!
//! This module contains:
//! - `DeviceError`: Error type returned by test actions
//! - `FakeModem`: A device manager with interior state
//! - `CallLog`: Records the order in which actions ran
//! - Test case constructors with console output disabled

use std::cell::{Cell, RefCell};

use crate::{Settings, TestCase};

// ============================================================================
// Error Type
// ============================================================================

/// Errors that test actions can return.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum DeviceError {
    /// Arithmetic stand-in for a bad device response.
    #[error("division by zero")]
    DivideByZero,

    /// The device did not answer.
    #[error("prompt not seen within {0}s")]
    Timeout(u32),

    /// Transient error that may succeed on retry.
    #[error("link flapping")]
    Transient,
}

// ============================================================================
// Test Cases
// ============================================================================

/// Quiet test case with wrapping effectively disabled.
pub fn test_case(name: &str) -> TestCase {
    TestCase::with_settings(name, (), Settings::quiet().with_wrap_width(1000))
}

/// Like [`test_case`], with forensic dumps enabled.
pub fn debug_case(name: &str) -> TestCase {
    TestCase::with_settings(
        name,
        (),
        Settings::quiet().with_wrap_width(1000).with_debug(true),
    )
}

/// Quiet test case around a fake modem.
pub fn modem_case(name: &str) -> TestCase<FakeModem> {
    TestCase::with_settings(
        name,
        FakeModem::default(),
        Settings::quiet().with_wrap_width(1000),
    )
}

// ============================================================================
// Device Manager
// ============================================================================

/// Minimal device manager: a firewall flag and a command history.
#[derive(Debug, Default)]
pub struct FakeModem {
    /// Whether the firewall is enabled.
    pub firewall: Cell<bool>,
    /// Commands sent to the device.
    pub history: RefCell<Vec<String>>,
}

impl FakeModem {
    /// Record a command and return its echo.
    pub fn send(&self, cmd: &str) -> Result<String, DeviceError> {
        self.history.borrow_mut().push(cmd.to_owned());
        match cmd {
            "firewall on" => self.firewall.set(true),
            "firewall off" => self.firewall.set(false),
            "hang" => return Err(DeviceError::Timeout(30)),
            _ => {}
        }
        Ok(format!("{cmd}: ok"))
    }
}

// ============================================================================
// Call Recording
// ============================================================================

/// Records action names in invocation order.
#[derive(Debug, Default)]
pub struct CallLog(RefCell<Vec<&'static str>>);

impl CallLog {
    /// Append `name`.
    pub fn record(&self, name: &'static str) {
        self.0.borrow_mut().push(name);
    }

    /// Names recorded so far.
    pub fn calls(&self) -> Vec<&'static str> {
        self.0.borrow().clone()
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Returns `a * m`.
pub fn multiply(a: i64, m: i64) -> Result<i64, DeviceError> {
    Ok(a * m)
}

/// Returns `a / m`.
pub fn divide(a: i64, m: i64) -> Result<i64, DeviceError> {
    a.checked_div(m).ok_or(DeviceError::DivideByZero)
}

/// Returns `a + 100`.
pub fn add_100(a: i64) -> Result<i64, DeviceError> {
    Ok(a + 100)
}
