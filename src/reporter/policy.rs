//! Outcome classification.
//!
//! Whether a fault means "failed" or "skipped" is decided by a name heuristic on the fault's reported type name. The
//! rules are ordinal and case-sensitive. A cancellation raised through the token the worker was given always counts
//! as a failure, before any rule is consulted.

use std::borrow::Cow;

use spindle_core::{CancellationToken, Fault};

use crate::model::TestOutcome;

/// One type-name rule that marks a fault as a skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameRule {
    Contains(Cow<'static, str>),
    EndsWith(Cow<'static, str>),
}

impl NameRule {
    pub fn matches(&self, type_name: &str) -> bool {
        match self {
            NameRule::Contains(needle) => type_name.contains(needle.as_ref()),
            NameRule::EndsWith(suffix) => type_name.ends_with(suffix.as_ref()),
        }
    }
}

/// Table of skip rules.
///
/// | rule                         | outcome |
/// |------------------------------|---------|
/// | contains `Inconclusive`      | Skipped |
/// | contains `Skipped`           | Skipped |
/// | contains `SkipTest`          | Skipped |
/// | ends with `SkipException`    | Skipped |
/// | anything else                | Failed  |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationPolicy {
    skip_rules: Vec<NameRule>,
}

impl Default for ClassificationPolicy {
    fn default() -> Self {
        Self {
            skip_rules: vec![
                NameRule::Contains(Cow::Borrowed("Inconclusive")),
                NameRule::Contains(Cow::Borrowed("Skipped")),
                NameRule::Contains(Cow::Borrowed("SkipTest")),
                NameRule::EndsWith(Cow::Borrowed("SkipException")),
            ],
        }
    }
}

impl ClassificationPolicy {
    /// A policy with no skip rules: every fault fails.
    pub fn strict() -> Self {
        Self { skip_rules: Vec::new() }
    }

    pub fn with_rule(mut self, rule: NameRule) -> Self {
        self.skip_rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[NameRule] {
        &self.skip_rules
    }

    pub fn is_skip(&self, type_name: &str) -> bool {
        self.skip_rules.iter().any(|rule| rule.matches(type_name))
    }

    /// Classify the end of a unit that ran.
    pub fn classify(&self, fault: Option<&Fault>, token: &CancellationToken) -> TestOutcome {
        match fault {
            None => TestOutcome::Passed,
            Some(f) if f.is_cancellation_of(token) => TestOutcome::Failed,
            Some(f) if self.is_skip(f.type_name()) => TestOutcome::Skipped,
            Some(_) => TestOutcome::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spindle_core::CancellationSource;

    #[test]
    fn test_default_rules() {
        let policy = ClassificationPolicy::default();
        for name in [
            "AssertInconclusive",
            "InconclusiveError",
            "TestSkipped",
            "SkipTest",
            "my::SkipTestMarker",
            "NUnitSkipException",
        ] {
            assert!(policy.is_skip(name), "{name} should skip");
        }
        for name in ["Panic", "skipped", "SkipExceptionWrapper", "inconclusive", "OperationCancelled"] {
            assert!(!policy.is_skip(name), "{name} should fail");
        }
    }

    #[test]
    fn test_classify_order() {
        let policy = ClassificationPolicy::default();
        let source = CancellationSource::new();
        let token = source.token();

        assert_eq!(policy.classify(None, &token), TestOutcome::Passed);
        assert_eq!(policy.classify(Some(&Fault::new("Panic", "x")), &token), TestOutcome::Failed);
        assert_eq!(policy.classify(Some(&Fault::inconclusive("?")), &token), TestOutcome::Skipped);

        source.cancel();
        let own = token.error_if_cancelled().err();
        assert_eq!(policy.classify(own.as_ref(), &token), TestOutcome::Failed);
    }

    #[test]
    fn test_cancellation_from_another_source_uses_name_rules() {
        let policy = ClassificationPolicy::default().with_rule(NameRule::Contains("Cancelled".into()));
        let ours = CancellationSource::new();
        let theirs = CancellationSource::new();
        theirs.cancel();
        let foreign = theirs.token().error_if_cancelled().err();
        assert_eq!(policy.classify(foreign.as_ref(), &ours.token()), TestOutcome::Skipped);
    }

    #[test]
    fn test_strict_policy() {
        let policy = ClassificationPolicy::strict();
        assert!(policy.rules().is_empty());
        let token = CancellationToken::none();
        assert_eq!(policy.classify(Some(&Fault::skip("later")), &token), TestOutcome::Failed);
    }
}
