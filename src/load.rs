//! Artifact loading
//!
//! An [`ArtifactLoader`] turns a location string into [`ArtifactInfo`]. A [`LoadContext`] scopes what was loaded to a
//! single discovery pass or execution request: it caches artifacts by location, owns the per-request
//! "initialized" flags for module and class initializers, and is released with [`LoadContext::unload`].

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use spindle_core::fault::TestResult;
use spindle_core::{ArtifactInfo, Fault, Initializer, Instance, MethodInfo, TypeInfo, catch_fault};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Could not find {0}")]
    NotFound(String),

    #[error("no artifact is registered for {0}")]
    Unknown(String),

    #[error("artifact {location} failed while loading: {message}")]
    Faulted { location: String, message: String },
}

/// Produces artifact metadata from a location.
pub trait ArtifactLoader: Send + Sync {
    fn load(&self, location: &str) -> Result<ArtifactInfo, LoadError>;
}

type ArtifactFactory = Arc<dyn Fn() -> ArtifactInfo + Send + Sync>;

/// In-process loader backed by a table of artifact factories.
///
/// With `require_on_disk` set, a location must also exist as a path before its factory is consulted, which mirrors a
/// loader that reads compiled artifacts from disk.
#[derive(Default, Clone)]
pub struct ArtifactRegistry {
    factories: HashMap<String, ArtifactFactory>,
    order: Vec<String>,
    require_on_disk: bool,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `location`. Re-registering a location replaces its factory.
    pub fn with_artifact<F>(mut self, location: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> ArtifactInfo + Send + Sync + 'static,
    {
        let location = location.into();
        if !self.factories.contains_key(&location) {
            self.order.push(location.clone());
        }
        self.factories.insert(location, Arc::new(factory));
        self
    }

    pub fn with_require_on_disk(mut self, require: bool) -> Self {
        self.require_on_disk = require;
        self
    }

    /// Registered locations in registration order.
    pub fn locations(&self) -> &[String] {
        &self.order
    }
}

impl std::fmt::Debug for ArtifactRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactRegistry")
            .field("locations", &self.order)
            .field("require_on_disk", &self.require_on_disk)
            .finish()
    }
}

impl ArtifactLoader for ArtifactRegistry {
    fn load(&self, location: &str) -> Result<ArtifactInfo, LoadError> {
        if self.require_on_disk && !Path::new(location).exists() {
            return Err(LoadError::NotFound(location.to_string()));
        }
        let factory = self
            .factories
            .get(location)
            .ok_or_else(|| LoadError::Unknown(location.to_string()))?;
        panic::catch_unwind(AssertUnwindSafe(|| factory())).map_err(|payload| LoadError::Faulted {
            location: location.to_string(),
            message: Fault::from_panic(payload).message().to_string(),
        })
    }
}

// ============================================================================
// Load contexts
// ============================================================================

/// A class resolved from a loaded artifact.
#[derive(Debug)]
pub struct LoadedClass {
    artifact: String,
    info: TypeInfo,
    initialized: AtomicBool,
}

impl LoadedClass {
    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    pub fn info(&self) -> &TypeInfo {
        &self.info
    }

    pub fn full_name(&self) -> String {
        self.info.full_name()
    }

    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodInfo> + 'a {
        self.info.methods_named(name)
    }

    /// Construct a fresh instance, converting a panicking constructor into a fault.
    pub fn construct(&self) -> Result<Instance, Fault> {
        catch_fault(|| self.info.construct())
    }

    /// Run the class's static initializer unless it already ran in this context.
    ///
    /// ## Returns
    /// - `None` when there is no initializer or it already ran
    /// - `Some(result)` with the initializer's outcome otherwise
    pub fn initialize(&self) -> Option<TestResult> {
        run_once(&self.initialized, self.info.static_initializer())
    }
}

/// An artifact loaded into a [`LoadContext`].
pub struct LoadedArtifact {
    location: String,
    name: String,
    module_initializer: Option<Initializer>,
    classes: Vec<Arc<LoadedClass>>,
    by_name: HashMap<String, usize>,
    initialized: AtomicBool,
}

impl LoadedArtifact {
    fn new(location: &str, info: ArtifactInfo) -> Self {
        let name = info.name().to_string();
        let module_initializer = info.module_initializer().cloned();
        let mut classes = Vec::new();
        let mut by_name = HashMap::new();
        for ty in info.into_types() {
            // First export wins when two types share a full name.
            let full_name = ty.full_name();
            if by_name.contains_key(&full_name) {
                continue;
            }
            by_name.insert(full_name, classes.len());
            classes.push(Arc::new(LoadedClass {
                artifact: location.to_string(),
                info: ty,
                initialized: AtomicBool::new(false),
            }));
        }
        Self {
            location: location.to_string(),
            name,
            module_initializer,
            classes,
            by_name,
            initialized: AtomicBool::new(false),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up an exported class by full name.
    pub fn class(&self, full_name: &str) -> Option<Arc<LoadedClass>> {
        self.by_name.get(full_name).map(|&i| Arc::clone(&self.classes[i]))
    }

    /// Exported classes in export order.
    pub fn classes(&self) -> impl Iterator<Item = &Arc<LoadedClass>> {
        self.classes.iter()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Run the module initializer unless it already ran in this context.
    pub fn initialize(&self) -> Option<TestResult> {
        run_once(&self.initialized, self.module_initializer.as_ref())
    }
}

impl std::fmt::Debug for LoadedArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedArtifact")
            .field("location", &self.location)
            .field("name", &self.name)
            .field("classes", &self.classes.len())
            .finish_non_exhaustive()
    }
}

fn run_once(flag: &AtomicBool, initializer: Option<&Initializer>) -> Option<TestResult> {
    let init = initializer?;
    if flag.swap(true, Ordering::AcqRel) {
        return None;
    }
    Some(catch_fault(|| init()))
}

/// Isolated, unloadable scope for the artifacts of one discovery pass or one execution request.
pub struct LoadContext<'a> {
    name: String,
    loader: &'a dyn ArtifactLoader,
    artifacts: Vec<Arc<LoadedArtifact>>,
}

impl<'a> LoadContext<'a> {
    pub fn new(name: impl Into<String>, loader: &'a dyn ArtifactLoader) -> Self {
        Self {
            name: name.into(),
            loader,
            artifacts: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Load `location` into this context. A location already loaded here is returned from the cache.
    #[tracing::instrument(skip(self), fields(context = %self.name))]
    pub fn load(&mut self, location: &str) -> Result<Arc<LoadedArtifact>, LoadError> {
        if let Some(loaded) = self.artifacts.iter().find(|a| a.location == location) {
            return Ok(Arc::clone(loaded));
        }
        let info = self.loader.load(location)?;
        let loaded = Arc::new(LoadedArtifact::new(location, info));
        tracing::debug!(classes = loaded.class_count(), "artifact loaded");
        self.artifacts.push(Arc::clone(&loaded));
        Ok(loaded)
    }

    pub fn artifacts(&self) -> &[Arc<LoadedArtifact>] {
        &self.artifacts
    }

    /// Release everything loaded into this context.
    pub fn unload(self) {
        tracing::debug!(context = %self.name, artifacts = self.artifacts.len(), "unloading load context");
    }
}

impl std::fmt::Debug for LoadContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadContext")
            .field("name", &self.name)
            .field("artifacts", &self.artifacts)
            .finish_non_exhaustive()
    }
}
