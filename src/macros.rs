//! Macros for queueing named function calls.
//!
//! - `add_action!`: queue `func(args..)` under the name `func`
//! - `call_action!`: queue and execute in one go, optionally comparing the
//!   output of a teardown action with an expected value

/// Queue a function call on a step, named after the function.
///
/// Arguments are moved into the deferred closure when the action is queued;
/// the function itself runs on the next `execute`.
///
/// ```no_run
/// use boardstep::{add_action, Settings, TestCase};
///
/// fn reboot(delay: u32) -> Result<u32, String> {
///     Ok(delay)
/// }
///
/// let tc = TestCase::with_settings("Reboot", (), Settings::quiet());
/// let mut ts = tc.step("reboot the board");
/// ts.enter();
/// add_action!(ts, reboot(5));
/// assert_eq!(ts.pending_len(), 1);
/// ```
#[macro_export]
macro_rules! add_action {
    ($step:expr, $func:ident ( $($arg:expr),* $(,)? )) => {
        $step.add(stringify!($func), move || $func($($arg),*))
    };
}

/// Queue a function call on a step and execute it immediately.
///
/// The `=> expected` form is for teardown steps and compares the output with
/// `expected`.
#[macro_export]
macro_rules! call_action {
    ($step:expr, $func:ident ( $($arg:expr),* $(,)? ) => $expected:expr) => {
        $step.call_expect(stringify!($func), move || $func($($arg),*), $expected)
    };
    ($step:expr, $func:ident ( $($arg:expr),* $(,)? )) => {
        $step.call(stringify!($func), move || $func($($arg),*))
    };
}
