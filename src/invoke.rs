//! Invocation resolver
//!
//! Each unit's method is resolved once, when its job is built, into an [`Invoker`]: the bound entry point plus the
//! calling convention it was resolved to. Dispatch then only has to hand over the capabilities that convention asks
//! for.

use spindle_core::{CallShape, Callable, CancellationToken, EntryPoint, Instance, MethodInfo, TestLog, TestResult};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("method {method} has an unsupported signature {signature}")]
    UnsupportedShape { method: String, signature: String },

    #[error("method {0} has no bound entry point")]
    Unbound(String),

    #[error("method {method} is declared as {declared} but bound as {bound}")]
    ShapeMismatch {
        method: String,
        declared: CallShape,
        bound: CallShape,
    },
}

#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("entry point for {method} expects an instance of {expected}, found {actual}")]
    InstanceMismatch {
        method: String,
        expected: &'static str,
        actual: &'static str,
    },
}

/// A resolved dispatch thunk for one test method.
#[derive(Debug, Clone)]
pub struct Invoker {
    method: String,
    entry: EntryPoint,
}

impl Invoker {
    /// Resolve `method` into one of the four calling conventions.
    pub fn resolve(method: &MethodInfo) -> Result<Self, ResolveError> {
        let declared = method
            .signature()
            .call_shape()
            .ok_or_else(|| ResolveError::UnsupportedShape {
                method: method.name().to_string(),
                signature: method.signature().to_string(),
            })?;
        let entry = method
            .entry()
            .ok_or_else(|| ResolveError::Unbound(method.name().to_string()))?;
        if entry.shape() != declared {
            return Err(ResolveError::ShapeMismatch {
                method: method.name().to_string(),
                declared,
                bound: entry.shape(),
            });
        }
        Ok(Self {
            method: method.name().to_string(),
            entry: entry.clone(),
        })
    }

    pub fn shape(&self) -> CallShape {
        self.entry.shape()
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Check that `instance` is what the entry point will be called on.
    pub fn prepare(&self, instance: &Instance) -> Result<(), PrepareError> {
        if instance.concrete_type() == self.entry.target_type() {
            Ok(())
        } else {
            Err(PrepareError::InstanceMismatch {
                method: self.method.clone(),
                expected: self.entry.target_name(),
                actual: instance.type_name(),
            })
        }
    }

    /// Call the method on `instance`, passing only the capabilities its convention takes.
    ///
    /// Panics are not caught here.
    pub fn invoke(&self, instance: &mut Instance, log: &mut TestLog, token: &CancellationToken) -> TestResult {
        let target = instance.target();
        match self.entry.callable() {
            Callable::NoArgs(f) => f(target),
            Callable::Logger(f) => f(target, log),
            Callable::Cancellation(f) => f(target, token),
            Callable::LoggerAndCancellation(f) => f(target, log, token),
        }
    }
}
