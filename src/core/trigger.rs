//! Trigger metadata - what started a pipeline run

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Kind of event that triggered the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Push to a branch
    Push,
    /// Push of a tag
    TagPush,
    /// Manually requested run
    Manual,
}

/// Immutable description of the trigger, set once at pipeline start.
///
/// All guard evaluation reads from this value; nothing else carries trigger
/// state. `release_tag` is `None` when the invoking system could not derive
/// it, in which case guards treat the trigger as a non-release (dev) one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerMetadata {
    /// The git ref the run was triggered for (branch or tag name)
    pub git_ref: String,

    /// Kind of triggering event
    pub event: EventType,

    /// Whether the ref matches the release-tag convention; `None` = unknown
    release_tag: Option<bool>,
}

impl TriggerMetadata {
    /// Build trigger metadata, deriving `release_tag` from the ref.
    pub fn from_ref(git_ref: impl Into<String>, event: EventType) -> Self {
        let git_ref = git_ref.into();
        let release_tag = Some(is_release_ref(&git_ref));
        Self {
            git_ref,
            event,
            release_tag,
        }
    }

    /// Build trigger metadata without deriving `release_tag`.
    ///
    /// Models a trigger whose metadata is ambiguous; guards evaluate such a
    /// trigger as non-release.
    pub fn unresolved(git_ref: impl Into<String>, event: EventType) -> Self {
        Self {
            git_ref: git_ref.into(),
            event,
            release_tag: None,
        }
    }

    /// Whether this trigger is for a release tag, if known.
    pub fn release_tag(&self) -> Option<bool> {
        self.release_tag
    }
}

/// Check a ref against the release-tag convention: `v<major>.<minor>.<patch>`
/// with optional numeric or rc suffix segments (`v1.2.0`, `v1.2.0.rc1`).
pub fn is_release_ref(git_ref: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"^v\d+\.\d+\.\d+(?:\.(?:rc)?\d+)*$").expect("release tag pattern is valid")
    });
    pattern.is_match(git_ref)
}
