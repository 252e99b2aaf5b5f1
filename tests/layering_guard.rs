//! Layering guardrails to keep the reflection core free of I/O and third-party dependencies.
//!
//! Test artifacts link `spindle_core` directly, so anything it depends on ends up in every artifact. This test scans
//! its `Cargo.toml` and fails if the `[dependencies]` table lists anything.

fn dependency_lines(manifest: &str) -> Vec<&str> {
    let mut in_dependencies = false;
    let mut found = Vec::new();

    for raw_line in manifest.lines() {
        let line = raw_line.trim();
        // Track when we enter/exit the `[dependencies]` table.
        if line.starts_with('[') {
            in_dependencies = line == "[dependencies]";
            continue;
        }
        if !in_dependencies || line.is_empty() || line.starts_with('#') {
            continue;
        }
        // Strip inline comments for robustness.
        let line_no_comment = line.split('#').next().unwrap_or("").trim();
        if !line_no_comment.is_empty() {
            found.push(line_no_comment);
        }
    }
    found
}

#[test]
fn core_has_no_dependencies() {
    let manifest = include_str!("../crates/spindle_core/Cargo.toml");
    let deps = dependency_lines(manifest);
    assert!(deps.is_empty(), "spindle_core must stay dependency-free, found: {deps:?}");
}

#[test]
fn engine_does_not_depend_on_test_tooling() {
    let manifest = include_str!("../Cargo.toml");
    for dep in dependency_lines(manifest) {
        for tooling in ["insta", "proptest", "prettyplease"] {
            assert!(
                !dep.starts_with(tooling),
                "`{tooling}` must only appear in [dev-dependencies], found `{dep}`"
            );
        }
    }
}
