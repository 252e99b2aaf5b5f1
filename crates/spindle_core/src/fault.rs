//! Faults raised by test code and initializers.
//!
//! A [`Fault`] plays the role an exception plays in a managed runtime: it carries a reported type name (which the
//! engine's skip/inconclusive heuristic matches on), a message, a stack trace when one could be captured, and for
//! cancellations the token that raised it.
//!
//! Any `std::error::Error` converts into a `Fault` that reports the error's Rust type name, so `?` works inside test
//! bodies. A panic is converted by [`catch_fault`]; panicking with a `Fault` payload (`std::panic::panic_any`) keeps
//! that fault intact.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::borrow::Cow;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::cancel::{CancellationToken, OPERATION_CANCELLED};

/// Type name reported for faults produced by a panic.
pub const PANIC: &str = "Panic";
/// Type name reported by [`Fault::inconclusive`].
pub const ASSERT_INCONCLUSIVE: &str = "AssertInconclusive";
/// Type name reported by [`Fault::skip`].
pub const SKIP_TEST: &str = "SkipTest";

/// Outcome of a test body.
pub type TestResult = Result<(), Fault>;

/// A failure raised by test code.
pub struct Fault {
    type_name: Cow<'static, str>,
    message: String,
    stack_trace: String,
    cancellation: Option<CancellationToken>,
}

impl Fault {
    /// Create a fault with an explicit reported type name.
    pub fn new(type_name: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            stack_trace: capture_stack_trace(),
            cancellation: None,
        }
    }

    /// Create a fault that reports `T`'s type name.
    pub fn of<T: ?Sized>(message: impl Into<String>) -> Self {
        Self::new(std::any::type_name::<T>(), message)
    }

    /// The test could not reach a verdict.
    pub fn inconclusive(message: impl Into<String>) -> Self {
        Self::new(ASSERT_INCONCLUSIVE, message)
    }

    /// The test asked to be skipped.
    pub fn skip(message: impl Into<String>) -> Self {
        Self::new(SKIP_TEST, message)
    }

    /// A cancellation raised on behalf of `token`.
    pub fn cancelled(message: impl Into<String>, token: &CancellationToken) -> Self {
        Self {
            cancellation: Some(token.clone()),
            ..Self::new(OPERATION_CANCELLED, message)
        }
    }

    /// Convert a panic payload into a fault.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        match payload.downcast::<Fault>() {
            Ok(fault) => *fault,
            Err(payload) => {
                let message = if let Some(s) = payload.downcast_ref::<&str>() {
                    (*s).to_string()
                } else if let Some(s) = payload.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                Self::new(PANIC, message)
            }
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Captured stack trace, empty when backtraces are disabled.
    pub fn stack_trace(&self) -> &str {
        &self.stack_trace
    }

    pub fn cancellation_token(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    /// Whether this fault is a cancellation raised through `token`'s source.
    pub fn is_cancellation_of(&self, token: &CancellationToken) -> bool {
        self.cancellation.as_ref().is_some_and(|own| own.same_source(token))
    }
}

impl<E> From<E> for Fault
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self::new(std::any::type_name::<E>(), err.to_string())
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fault")
            .field("type_name", &self.type_name)
            .field("message", &self.message)
            .field("cancellation", &self.cancellation.is_some())
            .finish()
    }
}

fn capture_stack_trace() -> String {
    let trace = Backtrace::capture();
    match trace.status() {
        BacktraceStatus::Captured => trace.to_string(),
        _ => String::new(),
    }
}

/// Run `f`, converting a panic into a [`Fault`].
pub fn catch_fault<T, F>(f: F) -> Result<T, Fault>
where
    F: FnOnce() -> Result<T, Fault>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(Fault::from_panic(payload)),
    }
}

/// Return types a test method may declare.
///
/// Both `()` and `Result<(), E>` count as "returns no value": the error side is the fault channel.
pub trait IntoTestResult {
    fn into_test_result(self) -> TestResult;
}

impl IntoTestResult for () {
    fn into_test_result(self) -> TestResult {
        Ok(())
    }
}

impl<E: Into<Fault>> IntoTestResult for Result<(), E> {
    fn into_test_result(self) -> TestResult {
        self.map_err(Into::into)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cancel::CancellationSource;

    #[derive(Debug)]
    struct DiskFull;

    impl fmt::Display for DiskFull {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "no space left")
        }
    }

    impl std::error::Error for DiskFull {}

    fn failing() -> TestResult {
        Err::<(), _>(DiskFull)?;
        Ok(())
    }

    #[test]
    fn test_error_conversion_reports_type_name() {
        let fault = failing().unwrap_err();
        assert!(fault.type_name().ends_with("DiskFull"));
        assert_eq!(fault.message(), "no space left");
    }

    #[test]
    fn test_catch_fault_converts_str_panic() {
        let fault = catch_fault(|| -> TestResult { panic!("boom") }).unwrap_err();
        assert_eq!(fault.type_name(), PANIC);
        assert_eq!(fault.message(), "boom");
    }

    #[test]
    fn test_catch_fault_converts_formatted_panic() {
        let n = 3;
        let fault = catch_fault(|| -> TestResult { panic!("boom {n}") }).unwrap_err();
        assert_eq!(fault.message(), "boom 3");
    }

    #[test]
    fn test_catch_fault_keeps_fault_payload() {
        let fault = catch_fault(|| -> TestResult { std::panic::panic_any(Fault::inconclusive("maybe")) }).unwrap_err();
        assert_eq!(fault.type_name(), ASSERT_INCONCLUSIVE);
        assert_eq!(fault.message(), "maybe");
    }

    #[test]
    fn test_catch_fault_passes_values_through() {
        assert_eq!(catch_fault(|| Ok(7)).unwrap(), 7);
    }

    #[test]
    fn test_cancelled_fault_tracks_source() {
        let source = CancellationSource::new();
        let fault = Fault::cancelled("stop", &source.token());
        assert!(fault.is_cancellation_of(&source.token()));
        assert!(!Fault::new("Other", "x").is_cancellation_of(&source.token()));
    }

    #[test]
    fn test_into_test_result() {
        assert!(().into_test_result().is_ok());
        let res: Result<(), DiskFull> = Err(DiskFull);
        assert!(res.into_test_result().is_err());
        let res: Result<(), Fault> = Err(Fault::skip("later"));
        assert_eq!(res.into_test_result().unwrap_err().type_name(), SKIP_TEST);
    }

    #[test]
    fn test_display() {
        assert_eq!(Fault::new("Boom", "went off").to_string(), "Boom: went off");
    }
}
