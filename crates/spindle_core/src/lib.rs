//! Provide the shared vocabulary between the spindle engine and the test code it runs.
//!
//! This crate is intentionally small and dependency-free. It contains what both sides of the engine need to agree on:
//! - the reflection model (artifacts, types, methods, signatures, bound entry points) that discovery inspects,
//! - the `Fault` type test bodies raise and the engine classifies,
//! - the two capabilities a test method can ask for: a `TestLog` and a `CancellationToken`,
//! - the display-name transform applied to method names.
//!
//! ## Notes
//!
//! - This is a "semantic core" crate: **no IO**, no threads, no global state.
//! - Reflection metadata is normally generated by `#[spindle_derive::test_class]`, but every type here can be built by
//!   hand, which is how tests describe shapes that the macro refuses to bind.

pub mod cancel;
pub mod fault;
pub mod log;
pub mod naming;
pub mod reflect;

pub use cancel::{CancellationSource, CancellationToken};
pub use fault::{Fault, IntoTestResult, TestResult, catch_fault};
pub use log::TestLog;
pub use naming::display_name;
pub use reflect::{
    ArtifactInfo, CallShape, Callable, Constructor, Dispose, EntryPoint, Initializer, Instance, MethodInfo, ParamType,
    Receiver, Reflect, ReturnType, Signature, TypeInfo, TypeKind, Visibility,
};
