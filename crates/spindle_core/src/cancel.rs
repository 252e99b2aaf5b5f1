//! Cooperative cancellation shared between the engine and running tests.
//!
//! A [`CancellationSource`] owns the signal; any number of [`CancellationToken`]s observe it. Tokens compare equal
//! only when they observe the same source, which is how the engine tells "this test was cancelled by the run" apart
//! from a cancellation fault raised for some unrelated token.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::fault::Fault;

/// Type name reported by faults raised through [`CancellationToken::error_if_cancelled`].
pub const OPERATION_CANCELLED: &str = "OperationCancelled";

#[derive(Debug, Default)]
struct Signal {
    cancelled: AtomicBool,
}

/// Owner of a cancellation signal.
#[derive(Debug, Default)]
pub struct CancellationSource {
    signal: Arc<Signal>,
}

impl CancellationSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out an observer of this source.
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            signal: Arc::clone(&self.signal),
        }
    }

    /// Request cancellation. Calling this more than once has no further effect.
    pub fn cancel(&self) {
        self.signal.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.cancelled.load(Ordering::Acquire)
    }
}

/// Read-only view of a [`CancellationSource`].
#[derive(Clone)]
pub struct CancellationToken {
    signal: Arc<Signal>,
}

impl CancellationToken {
    /// A token whose source is unreachable, so it can never be cancelled.
    pub fn none() -> Self {
        Self {
            signal: Arc::new(Signal::default()),
        }
    }

    pub fn is_cancellation_requested(&self) -> bool {
        self.signal.cancelled.load(Ordering::Acquire)
    }

    /// Return a cancellation fault bound to this token if cancellation was requested.
    ///
    /// ## Examples
    /// ```rust
    /// use spindle_core::CancellationSource;
    /// let source = CancellationSource::new();
    /// let token = source.token();
    /// assert!(token.error_if_cancelled().is_ok());
    /// source.cancel();
    /// let fault = token.error_if_cancelled().unwrap_err();
    /// assert!(fault.is_cancellation_of(&token));
    /// ```
    pub fn error_if_cancelled(&self) -> Result<(), Fault> {
        if self.is_cancellation_requested() {
            Err(Fault::cancelled("The operation was cancelled.", self))
        } else {
            Ok(())
        }
    }

    /// Whether both tokens observe the same source.
    pub fn same_source(&self, other: &CancellationToken) -> bool {
        Arc::ptr_eq(&self.signal, &other.signal)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::none()
    }
}

impl PartialEq for CancellationToken {
    fn eq(&self, other: &Self) -> bool {
        self.same_source(other)
    }
}

impl Eq for CancellationToken {}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancellation_requested())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_observed_by_all_tokens() {
        let source = CancellationSource::new();
        let a = source.token();
        let b = a.clone();
        assert!(!a.is_cancellation_requested());
        source.cancel();
        assert!(a.is_cancellation_requested());
        assert!(b.is_cancellation_requested());
        assert!(source.is_cancelled());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let source = CancellationSource::new();
        source.cancel();
        source.cancel();
        assert!(source.token().is_cancellation_requested());
    }

    #[test]
    fn test_token_identity_follows_source() {
        let first = CancellationSource::new();
        let second = CancellationSource::new();
        assert_eq!(first.token(), first.token());
        assert_ne!(first.token(), second.token());
        assert_ne!(CancellationToken::none(), CancellationToken::none());
    }

    #[test]
    fn test_error_if_cancelled_binds_token() {
        let source = CancellationSource::new();
        let token = source.token();
        source.cancel();
        let fault = token.error_if_cancelled().unwrap_err();
        assert_eq!(fault.type_name(), OPERATION_CANCELLED);
        assert!(fault.is_cancellation_of(&token));
        assert!(!fault.is_cancellation_of(&CancellationToken::none()));
    }
}
