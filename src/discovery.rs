//! Structural test discovery
//!
//! A type is a test class when it is a concrete, sealed class whose simple name and namespace carry the configured
//! suffixes. A method of a test class is a test unit when it is a public instance method, returns no value and takes
//! one of the four supported parameter lists. Anything else is silently not discovered.

use spindle_core::{MethodInfo, ReturnType, TypeInfo, TypeKind, Visibility, display_name};

use crate::config::RunnerConfig;
use crate::host::{DiscoverySink, MessageLevel, MessageLogger};
use crate::load::{ArtifactLoader, LoadContext};
use crate::model::UnitDescriptor;

/// Name of the load context used while discovering.
pub const DISCOVERER_CONTEXT: &str = "spindle-discoverer";

pub fn is_test_class(ty: &TypeInfo, config: &RunnerConfig) -> bool {
    ty.kind() == TypeKind::Class
        && !ty.is_abstract()
        && ty.is_sealed()
        && ty.name().ends_with(config.class_suffix.as_str())
        && ty
            .namespace()
            .is_some_and(|ns| ns.ends_with(config.namespace_suffix.as_str()))
}

pub fn is_test_method(method: &MethodInfo) -> bool {
    method.visibility() == Visibility::Public
        && method.receiver().is_instance()
        && method.signature().returns == ReturnType::Unit
        && method.signature().call_shape().is_some()
}

/// The explicit display-name override, or the transformed method name.
pub fn unit_display_name(method: &MethodInfo) -> String {
    match method.display_name() {
        Some(name) => name.to_string(),
        None => display_name(method.name()),
    }
}

/// Discover test units in `artifacts`, streaming each one to `sink` as it is found.
///
/// Artifacts that fail to load are reported as warnings and skipped.
///
/// ## Returns
/// - The number of units sent to `sink`.
#[tracing::instrument(skip_all)]
pub fn discover<I, S>(
    loader: &dyn ArtifactLoader,
    config: &RunnerConfig,
    artifacts: I,
    logger: Option<&dyn MessageLogger>,
    sink: &mut dyn DiscoverySink,
) -> usize
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut context = LoadContext::new(DISCOVERER_CONTEXT, loader);
    let mut found = 0;

    for location in artifacts {
        let location = location.as_ref();
        let artifact = match context.load(location) {
            Ok(artifact) => artifact,
            Err(e) => {
                tracing::warn!(artifact = location, error = %e, "skipping artifact that failed to load");
                if let Some(logger) = logger {
                    logger.send_message(MessageLevel::Warning, &format!("Failed to load {}: {}", location, e));
                }
                continue;
            }
        };

        for class in artifact.classes().filter(|c| is_test_class(c.info(), config)) {
            let full_name = class.full_name();
            if let Some(logger) = logger {
                logger.send_message(MessageLevel::Informational, &format!("class {}!{}", location, full_name));
            }
            for method in class.info().methods().iter().filter(|m| is_test_method(m)) {
                if let Some(logger) = logger {
                    logger.send_message(MessageLevel::Informational, &format!("method {}", method.name()));
                }
                let unit = UnitDescriptor::new(
                    format!("{}.{}", full_name, method.name()),
                    unit_display_name(method),
                    location,
                );
                tracing::trace!(unit = %unit.id, "discovered");
                sink.send_test_case(unit);
                found += 1;
            }
        }
    }

    tracing::debug!(units = found, "discovery finished");
    context.unload();
    found
}
