//! Reflection metadata for test artifacts.
//!
//! An [`ArtifactInfo`] is what a loaded artifact exposes: its exported [`TypeInfo`]s and an optional one-time module
//! initializer. A `TypeInfo` describes a type structurally (kind, namespace, abstract/sealed flags, methods) and, when
//! the type can be instantiated, how to construct it. A [`MethodInfo`] records a method's declared [`Signature`] and,
//! if the signature is one of the supported calling conventions, a bound [`EntryPoint`].
//!
//! Metadata and binding are deliberately separate: discovery only looks at the declared shape, and the engine's
//! resolver checks the bound entry point against that shape before anything is called.

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::fault::{Fault, IntoTestResult, TestResult};
use crate::log::TestLog;

/// Type name reported when an entry point is called with an instance of the wrong type.
pub const INSTANCE_MISMATCH: &str = "InstanceMismatch";
/// Type name reported when a type without a constructor is instantiated.
pub const MISSING_CONSTRUCTOR: &str = "MissingConstructor";

// ============================================================================
// Signatures
// ============================================================================

/// Kind of an exported type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Struct,
    Interface,
    Enum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

/// How a method receives its instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receiver {
    /// `&self`
    Shared,
    /// `&mut self`
    Mutable,
    /// `self`
    Owned,
    /// No receiver (associated function).
    Static,
}

impl Receiver {
    /// Whether the method is called on a borrowed instance.
    pub fn is_instance(self) -> bool {
        matches!(self, Receiver::Shared | Receiver::Mutable)
    }
}

/// Declared type of one method parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    /// `&mut TestLog`
    Logger,
    /// `&CancellationToken` or `CancellationToken`
    Cancellation,
    Other(Cow<'static, str>),
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Logger => write!(f, "&mut TestLog"),
            ParamType::Cancellation => write!(f, "&CancellationToken"),
            ParamType::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Declared return type of a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnType {
    /// `()` or `Result<(), E>`: no value, faults travel on the error side.
    Unit,
    Value(Cow<'static, str>),
}

/// The four calling conventions a test method may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallShape {
    NoArgs,
    Logger,
    Cancellation,
    LoggerAndCancellation,
}

impl fmt::Display for CallShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CallShape::NoArgs => "()",
            CallShape::Logger => "(logger)",
            CallShape::Cancellation => "(cancellation)",
            CallShape::LoggerAndCancellation => "(logger, cancellation)",
        };
        f.write_str(s)
    }
}

/// Declared parameter list and return type of a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<ParamType>,
    pub returns: ReturnType,
}

impl Default for Signature {
    fn default() -> Self {
        Self {
            params: Vec::new(),
            returns: ReturnType::Unit,
        }
    }
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param(mut self, param: ParamType) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_returns(mut self, returns: ReturnType) -> Self {
        self.returns = returns;
        self
    }

    /// Classify the parameter list. The return type is not considered.
    ///
    /// ## Returns
    /// - `Some(shape)` for `()`, `(Logger)`, `(Cancellation)` and `(Logger, Cancellation)`; `None` otherwise.
    pub fn call_shape(&self) -> Option<CallShape> {
        match self.params.as_slice() {
            [] => Some(CallShape::NoArgs),
            [ParamType::Logger] => Some(CallShape::Logger),
            [ParamType::Cancellation] => Some(CallShape::Cancellation),
            [ParamType::Logger, ParamType::Cancellation] => Some(CallShape::LoggerAndCancellation),
            _ => None,
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.params.iter().map(ToString::to_string).collect();
        write!(f, "({})", params.join(", "))?;
        match &self.returns {
            ReturnType::Unit => Ok(()),
            ReturnType::Value(name) => write!(f, " -> {}", name),
        }
    }
}

// ============================================================================
// Entry points
// ============================================================================

pub type NoArgsFn = dyn Fn(&mut dyn Any) -> TestResult + Send + Sync;
pub type LoggerFn = dyn Fn(&mut dyn Any, &mut TestLog) -> TestResult + Send + Sync;
pub type CancellationFn = dyn Fn(&mut dyn Any, &CancellationToken) -> TestResult + Send + Sync;
pub type LoggerAndCancellationFn = dyn Fn(&mut dyn Any, &mut TestLog, &CancellationToken) -> TestResult + Send + Sync;

/// A type-erased callable, tagged by the capabilities it takes.
#[derive(Clone)]
pub enum Callable {
    NoArgs(Arc<NoArgsFn>),
    Logger(Arc<LoggerFn>),
    Cancellation(Arc<CancellationFn>),
    LoggerAndCancellation(Arc<LoggerAndCancellationFn>),
}

impl Callable {
    pub fn shape(&self) -> CallShape {
        match self {
            Callable::NoArgs(_) => CallShape::NoArgs,
            Callable::Logger(_) => CallShape::Logger,
            Callable::Cancellation(_) => CallShape::Cancellation,
            Callable::LoggerAndCancellation(_) => CallShape::LoggerAndCancellation,
        }
    }
}

/// A method bound to the concrete type it must be called on.
#[derive(Clone)]
pub struct EntryPoint {
    target: TypeId,
    target_name: &'static str,
    callable: Callable,
}

fn downcast<T: Any>(target: &mut dyn Any) -> Result<&mut T, Fault> {
    target.downcast_mut::<T>().ok_or_else(|| {
        Fault::new(
            INSTANCE_MISMATCH,
            format!("entry point expects an instance of {}", std::any::type_name::<T>()),
        )
    })
}

impl EntryPoint {
    pub fn no_args<T, R, F>(f: F) -> Self
    where
        T: Any,
        R: IntoTestResult,
        F: Fn(&mut T) -> R + Send + Sync + 'static,
    {
        Self::bind::<T>(Callable::NoArgs(Arc::new(move |target: &mut dyn Any| {
            f(downcast::<T>(target)?).into_test_result()
        })))
    }

    pub fn logger<T, R, F>(f: F) -> Self
    where
        T: Any,
        R: IntoTestResult,
        F: Fn(&mut T, &mut TestLog) -> R + Send + Sync + 'static,
    {
        Self::bind::<T>(Callable::Logger(Arc::new(move |target: &mut dyn Any, log: &mut TestLog| {
            f(downcast::<T>(target)?, log).into_test_result()
        })))
    }

    pub fn cancellation<T, R, F>(f: F) -> Self
    where
        T: Any,
        R: IntoTestResult,
        F: Fn(&mut T, &CancellationToken) -> R + Send + Sync + 'static,
    {
        Self::bind::<T>(Callable::Cancellation(Arc::new(
            move |target: &mut dyn Any, token: &CancellationToken| f(downcast::<T>(target)?, token).into_test_result(),
        )))
    }

    pub fn logger_and_cancellation<T, R, F>(f: F) -> Self
    where
        T: Any,
        R: IntoTestResult,
        F: Fn(&mut T, &mut TestLog, &CancellationToken) -> R + Send + Sync + 'static,
    {
        Self::bind::<T>(Callable::LoggerAndCancellation(Arc::new(
            move |target: &mut dyn Any, log: &mut TestLog, token: &CancellationToken| {
                f(downcast::<T>(target)?, log, token).into_test_result()
            },
        )))
    }

    fn bind<T: Any>(callable: Callable) -> Self {
        Self {
            target: TypeId::of::<T>(),
            target_name: std::any::type_name::<T>(),
            callable,
        }
    }

    pub fn shape(&self) -> CallShape {
        self.callable.shape()
    }

    pub fn callable(&self) -> &Callable {
        &self.callable
    }

    pub fn target_type(&self) -> TypeId {
        self.target
    }

    pub fn target_name(&self) -> &'static str {
        self.target_name
    }
}

impl fmt::Debug for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPoint")
            .field("target", &self.target_name)
            .field("shape", &self.shape())
            .finish()
    }
}

// ============================================================================
// Methods
// ============================================================================

/// Reflection record for one method.
#[derive(Debug, Clone)]
pub struct MethodInfo {
    name: Cow<'static, str>,
    visibility: Visibility,
    receiver: Receiver,
    signature: Signature,
    display_name: Option<Cow<'static, str>>,
    entry: Option<EntryPoint>,
}

impl MethodInfo {
    /// A public `&mut self` method taking no parameters and returning no value, with nothing bound.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
            receiver: Receiver::Mutable,
            signature: Signature::default(),
            display_name: None,
            entry: None,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_receiver(mut self, receiver: Receiver) -> Self {
        self.receiver = receiver;
        self
    }

    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<Cow<'static, str>>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_entry(mut self, entry: EntryPoint) -> Self {
        self.entry = Some(entry);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn receiver(&self) -> Receiver {
        self.receiver
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Explicit display name override, if declared.
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn entry(&self) -> Option<&EntryPoint> {
        self.entry.as_ref()
    }
}

// ============================================================================
// Instances
// ============================================================================

/// Cleanup hook for test classes that hold resources.
///
/// The engine calls `dispose` once per constructed instance, on the worker thread that ran the test, after the
/// test's result has been recorded.
pub trait Dispose {
    fn dispose(&mut self) -> TestResult;
}

type DisposeFn = fn(&mut dyn Any) -> TestResult;

fn dispose_erased<T: Dispose + Any>(target: &mut dyn Any) -> TestResult {
    downcast::<T>(target)?.dispose()
}

/// A constructed test-class instance.
pub struct Instance {
    value: Box<dyn Any + Send>,
    type_name: &'static str,
    dispose: Option<DisposeFn>,
}

impl Instance {
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_name: std::any::type_name::<T>(),
            dispose: None,
        }
    }

    pub fn disposable<T: Any + Send + Dispose>(value: T) -> Self {
        Self {
            dispose: Some(dispose_erased::<T>),
            ..Self::new(value)
        }
    }

    /// `TypeId` of the concrete value.
    pub fn concrete_type(&self) -> TypeId {
        self.value.as_ref().type_id()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn target(&mut self) -> &mut dyn Any {
        self.value.as_mut()
    }

    pub fn is_disposable(&self) -> bool {
        self.dispose.is_some()
    }

    /// Run the instance's disposer. Non-disposable instances succeed trivially.
    pub fn dispose(&mut self) -> TestResult {
        match self.dispose {
            Some(dispose) => dispose(self.value.as_mut()),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type_name", &self.type_name)
            .field("disposable", &self.is_disposable())
            .finish()
    }
}

// ============================================================================
// Types and artifacts
// ============================================================================

pub type Constructor = Arc<dyn Fn() -> Result<Instance, Fault> + Send + Sync>;
/// One-time initializer for a module or a class.
pub type Initializer = Arc<dyn Fn() -> TestResult + Send + Sync>;

/// Types that can describe themselves. Implemented by `#[test_class]`.
pub trait Reflect {
    fn type_info() -> TypeInfo;
}

/// Reflection record for one exported type.
#[derive(Clone)]
pub struct TypeInfo {
    namespace: Option<Cow<'static, str>>,
    name: Cow<'static, str>,
    kind: TypeKind,
    is_abstract: bool,
    is_sealed: bool,
    constructor: Option<Constructor>,
    static_initializer: Option<Initializer>,
    methods: Vec<MethodInfo>,
}

impl TypeInfo {
    pub fn new(kind: TypeKind, name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
            kind,
            is_abstract: false,
            is_sealed: false,
            constructor: None,
            static_initializer: None,
            methods: Vec::new(),
        }
    }

    /// A concrete, unsealed class in `namespace`.
    pub fn class(namespace: impl Into<Cow<'static, str>>, name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(TypeKind::Class, name).with_namespace(namespace)
    }

    pub fn with_namespace(mut self, namespace: impl Into<Cow<'static, str>>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_sealed(mut self, sealed: bool) -> Self {
        self.is_sealed = sealed;
        self
    }

    pub fn with_abstract(mut self, is_abstract: bool) -> Self {
        self.is_abstract = is_abstract;
        self
    }

    /// Construct instances with `f`.
    pub fn with_constructor<T, F>(mut self, f: F) -> Self
    where
        T: Any + Send,
        F: Fn() -> Result<T, Fault> + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(move || f().map(Instance::new)));
        self
    }

    /// Construct disposable instances with `f`.
    pub fn with_disposable_constructor<T, F>(mut self, f: F) -> Self
    where
        T: Any + Send + Dispose,
        F: Fn() -> Result<T, Fault> + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(move || f().map(Instance::disposable)));
        self
    }

    pub fn with_static_initializer<F>(mut self, f: F) -> Self
    where
        F: Fn() -> TestResult + Send + Sync + 'static,
    {
        self.static_initializer = Some(Arc::new(f));
        self
    }

    pub fn with_method(mut self, method: MethodInfo) -> Self {
        self.methods.push(method);
        self
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `namespace.Name`, or just `Name` outside any namespace.
    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(ns) if !ns.is_empty() => format!("{}.{}", ns, self.name),
            _ => self.name.to_string(),
        }
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn is_sealed(&self) -> bool {
        self.is_sealed
    }

    pub fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }

    /// All methods called `name` (more than one means the name is overloaded).
    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodInfo> + 'a {
        self.methods.iter().filter(move |m| m.name() == name)
    }

    pub fn static_initializer(&self) -> Option<&Initializer> {
        self.static_initializer.as_ref()
    }

    pub fn has_constructor(&self) -> bool {
        self.constructor.is_some()
    }

    /// Create a new instance of this type.
    pub fn construct(&self) -> Result<Instance, Fault> {
        match &self.constructor {
            Some(ctor) => ctor(),
            None => Err(Fault::new(
                MISSING_CONSTRUCTOR,
                format!("{} has no accessible constructor", self.full_name()),
            )),
        }
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("full_name", &self.full_name())
            .field("kind", &self.kind)
            .field("is_abstract", &self.is_abstract)
            .field("is_sealed", &self.is_sealed)
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}

/// Everything a loaded artifact exports.
#[derive(Clone)]
pub struct ArtifactInfo {
    name: Cow<'static, str>,
    module_initializer: Option<Initializer>,
    types: Vec<TypeInfo>,
}

impl ArtifactInfo {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            module_initializer: None,
            types: Vec::new(),
        }
    }

    pub fn with_module_initializer<F>(mut self, f: F) -> Self
    where
        F: Fn() -> TestResult + Send + Sync + 'static,
    {
        self.module_initializer = Some(Arc::new(f));
        self
    }

    /// Export a type that describes itself.
    pub fn export<T: Reflect>(self) -> Self {
        self.export_type(T::type_info())
    }

    pub fn export_type(mut self, info: TypeInfo) -> Self {
        self.types.push(info);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module_initializer(&self) -> Option<&Initializer> {
        self.module_initializer.as_ref()
    }

    pub fn types(&self) -> &[TypeInfo] {
        &self.types
    }

    pub fn into_types(self) -> Vec<TypeInfo> {
        self.types
    }

    /// Look up an exported type by full name.
    pub fn find_type(&self, full_name: &str) -> Option<&TypeInfo> {
        self.types.iter().find(|t| t.full_name() == full_name)
    }
}

impl fmt::Debug for ArtifactInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactInfo")
            .field("name", &self.name)
            .field("has_module_initializer", &self.module_initializer.is_some())
            .field("types", &self.types)
            .finish()
    }
}
