//! Stage guards - predicates over trigger metadata

use crate::core::trigger::TriggerMetadata;

/// A boolean predicate over [`TriggerMetadata`] deciding whether a stage runs.
///
/// Guards are data, not control flow: stages declare the condition they are
/// gated on and the engine evaluates it. Evaluation is pure and total - a
/// trigger with unset release-tag metadata evaluates `ReleaseTag` to `false`
/// so an ambiguous trigger degrades to dev behavior, never to release
/// behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// Stage always runs
    Always,
    /// Stage runs only when the trigger is a release tag
    ReleaseTag,
    /// Negation of another guard
    Not(Box<Guard>),
    /// Conjunction of guards; empty conjunction evaluates `true`
    All(Vec<Guard>),
}

impl Guard {
    /// Evaluate the guard against trigger metadata.
    pub fn evaluate(&self, trigger: &TriggerMetadata) -> bool {
        match self {
            Guard::Always => true,
            Guard::ReleaseTag => trigger.release_tag().unwrap_or(false),
            Guard::Not(inner) => !inner.evaluate(trigger),
            Guard::All(guards) => guards.iter().all(|g| g.evaluate(trigger)),
        }
    }

    /// Negate this guard.
    pub fn negate(self) -> Guard {
        Guard::Not(Box::new(self))
    }

    /// Combine this guard with another; both must hold.
    pub fn and(self, other: Guard) -> Guard {
        match self {
            Guard::All(mut guards) => {
                guards.push(other);
                Guard::All(guards)
            }
            guard => Guard::All(vec![guard, other]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::trigger::EventType;

    fn release_trigger() -> TriggerMetadata {
        TriggerMetadata::from_ref("v1.1.0", EventType::TagPush)
    }

    fn dev_trigger() -> TriggerMetadata {
        TriggerMetadata::from_ref("main", EventType::Push)
    }

    #[test]
    fn test_release_guards_are_exhaustive_and_exclusive() {
        let release = Guard::ReleaseTag;
        let dev = Guard::ReleaseTag.negate();

        for trigger in [release_trigger(), dev_trigger()] {
            let on_release = release.evaluate(&trigger);
            let on_dev = dev.evaluate(&trigger);
            assert_ne!(on_release, on_dev, "guards must be mutually exclusive");
        }

        assert!(release.evaluate(&release_trigger()));
        assert!(dev.evaluate(&dev_trigger()));
    }

    #[test]
    fn test_ambiguous_trigger_degrades_to_dev() {
        let trigger = TriggerMetadata::unresolved("v1.1.0", EventType::Manual);

        assert!(!Guard::ReleaseTag.evaluate(&trigger));
        assert!(Guard::ReleaseTag.negate().evaluate(&trigger));
    }

    #[test]
    fn test_always_guard() {
        assert!(Guard::Always.evaluate(&release_trigger()));
        assert!(Guard::Always.evaluate(&dev_trigger()));
    }

    #[test]
    fn test_conjunction() {
        let guard = Guard::Always.and(Guard::ReleaseTag);
        assert!(guard.evaluate(&release_trigger()));
        assert!(!guard.evaluate(&dev_trigger()));

        assert!(Guard::All(vec![]).evaluate(&dev_trigger()));
    }

    #[test]
    fn test_double_negation() {
        let guard = Guard::ReleaseTag.negate().negate();
        assert!(guard.evaluate(&release_trigger()));
        assert!(!guard.evaluate(&dev_trigger()));
    }
}
