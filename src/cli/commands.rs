//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::config::{FanOutPolicy, RunnerConfig};
use crate::demo;
use crate::host::{CollectingSink, DiscoveryContext, RunContext};
use crate::load::ArtifactRegistry;
use crate::model::UnitDescriptor;
use crate::reporter::{ConsoleHandle, JsonLinesHandle};
use crate::runner::TestRunner;

use super::{CliError, CliResult, ExitCode};

/// Options for `spindle run`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub artifacts: Vec<String>,
    pub verbose: bool,
    pub filter: Option<String>,
    pub json: bool,
    pub sequential: bool,
    pub align: bool,
}

// ============================================================================
// Discovery helpers
// ============================================================================

/// The requested artifacts, or every registered one when none were named.
fn artifact_locations(requested: &[String], registry: &ArtifactRegistry) -> Vec<String> {
    if requested.is_empty() {
        registry.locations().to_vec()
    } else {
        requested.to_vec()
    }
}

/// Whether `unit` matches a `-k` keyword: a substring of its id or display name.
pub fn keyword_matches(unit: &UnitDescriptor, keyword: &str) -> bool {
    unit.id.contains(keyword) || unit.display_name.contains(keyword)
}

/// One line per unit: `artifact::id` and, when it differs from the method name, the display name.
pub fn format_listing(units: &[UnitDescriptor]) -> String {
    let mut out = String::new();
    for unit in units {
        out.push_str(&format!("{}::{}", unit.artifact, unit.id));
        if unit.display_name != unit.method_name() {
            out.push_str(&format!("  \"{}\"", unit.display_name));
        }
        out.push('\n');
    }
    out
}

fn discover(runner: &TestRunner, locations: &[String], logger: &ConsoleHandle) -> Vec<UnitDescriptor> {
    let mut sink = CollectingSink::new();
    runner.discover_tests(locations, &DiscoveryContext::default(), Some(logger), &mut sink);
    sink.into_units()
}

// ============================================================================
// Commands
// ============================================================================

/// `spindle list`
pub fn list_units(artifacts: &[String]) -> CliResult<ExitCode> {
    let registry = demo::demo_registry();
    let locations = artifact_locations(artifacts, &registry);
    let runner = TestRunner::new(registry);
    let units = discover(&runner, &locations, &ConsoleHandle::new(false));

    if units.is_empty() {
        eprintln!("No tests collected");
        return Ok(ExitCode::SUCCESS);
    }
    print!("{}", format_listing(&units));
    println!();
    println!("{} unit(s) in {} artifact(s)", units.len(), locations.len());
    Ok(ExitCode::SUCCESS)
}

/// `spindle run`
pub fn run_units(options: &RunOptions) -> CliResult<ExitCode> {
    let start_time = Instant::now();
    let registry = demo::demo_registry();
    let locations = artifact_locations(&options.artifacts, &registry);

    let fan_out = if options.sequential {
        FanOutPolicy::Sequential
    } else {
        FanOutPolicy::Unbounded
    };
    let config = RunnerConfig::default()
        .with_fan_out(fan_out)
        .with_align_timestamps(options.align);
    let runner = Arc::new(TestRunner::with_config(registry, config));
    cancel_on_ctrl_c(Arc::clone(&runner));

    let console = ConsoleHandle::new(options.verbose);
    let units: Vec<UnitDescriptor> = discover(&runner, &locations, &console)
        .into_iter()
        .filter(|u| options.filter.as_deref().is_none_or(|k| keyword_matches(u, k)))
        .collect();

    if units.is_empty() {
        eprintln!("No tests collected");
        return Ok(ExitCode::SUCCESS); // "no tests collected" is not a failure
    }

    let summary = if options.json {
        let handle = JsonLinesHandle::new(io::stdout());
        runner.run_tests(units, &RunContext::default(), &handle)
    } else {
        eprintln!("\x1b[1m=================== test session starts ===================\x1b[0m");
        eprintln!("collected {} item(s)", units.len());
        eprintln!();
        let summary = runner.run_tests(units, &RunContext::default(), &console);
        console.finish(&summary, start_time.elapsed());
        summary
    };

    if runner.cancellation_token().is_cancellation_requested() {
        return Err(CliError::with_code("run cancelled", 130));
    }
    Ok(if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Cancel `runner` when the process receives Ctrl-C.
///
/// The listener runs on its own thread with a current-thread tokio runtime; the run itself never touches tokio.
fn cancel_on_ctrl_c(runner: Arc<TestRunner>) {
    let spawned = thread::Builder::new().name("ctrl-c listener".to_string()).spawn(move || {
        let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::warn!(error = %e, "failed to start signal runtime, Ctrl-C will not cancel the run");
                return;
            }
        };
        rt.block_on(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    eprintln!();
                    eprintln!("interrupted, cancelling remaining tests");
                    runner.cancel();
                }
                Err(e) => tracing::warn!(error = %e, "failed to listen for Ctrl-C"),
            }
        });
    });
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "failed to spawn Ctrl-C listener");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(id: &str, display: &str) -> UnitDescriptor {
        UnitDescriptor::new(id, display, "spindle-demo")
    }

    #[test]
    fn test_keyword_matches_id_or_display_name() {
        let u = unit("Demo.Tests.ActualTests.Passing_test", "Passing test");
        assert!(keyword_matches(&u, "ActualTests"));
        assert!(keyword_matches(&u, "Passing test"));
        assert!(!keyword_matches(&u, "Failing"));
    }

    #[test]
    fn test_default_locations_are_every_registered_artifact() {
        let registry = demo::demo_registry();
        assert_eq!(artifact_locations(&[], &registry), registry.locations());
        assert_eq!(artifact_locations(&["x".to_string()], &registry), ["x"]);
    }

    #[test]
    fn test_format_listing() {
        let units = [
            unit("Demo.Tests.MyTests.Run", "Run"),
            unit("Demo.Tests.ActualTests.Passing_test", "Passing test"),
        ];
        insta::assert_snapshot!(format_listing(&units), @r#"
        spindle-demo::Demo.Tests.MyTests.Run
        spindle-demo::Demo.Tests.ActualTests.Passing_test  "Passing test"
        "#);
    }
}
