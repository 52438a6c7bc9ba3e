//! Tests for step execution, numbering and teardown.
//!
//! ## Test Organization
//!
//! - `common`: Shared test cases, device error type and actions
//! - `basic`: Ordering, queue reset and verification
//! - `numbering`: Per-section step indices
//! - `usage`: Usage faults
//! - `teardown`: Fail-soft teardown behavior
//! - `retry`: Retry policy tests
//! - `logging`: Log buffer contents
//!
//! ## Test Actions
//!
//! Most tests use arithmetic stand-ins for device calls:
//! - `multiply`: Returns `a * m`
//! - `divide`: Returns `a / m`, fails on division by zero
//! - `add_100`: Returns `a + 100`

mod common;

mod usage;
