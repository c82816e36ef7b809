// SPDX-License-Identifier: MPL-2.0

//! Version preferences: which allowed version the resolver tries first.
//!
//! Preferences never change whether a solution exists,
//! only which one is found first.

use version_ranges::Ranges;

use crate::{Map, PackageVersion, Set, Subject, Version, VersionSet};

/// Soft preference that only applies once `trigger` has been decided.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SoftRequirement {
    /// The subject whose decision activates the preference.
    pub trigger: Subject,
    /// The subject whose choice is steered.
    pub target: Subject,
    /// The versions to prefer for `target`.
    #[cfg_attr(feature = "serde", serde(with = "crate::version::serde_requirement"))]
    pub versions: Ranges<Version>,
}

/// How the resolver chooses a version among the allowed candidates.
///
/// The rules are checked in order, the first one that applies wins:
/// 1. a locked version, if it is still allowed;
/// 2. the highest allowed version for subjects marked as latest;
/// 3. the highest allowed version matching an active soft requirement;
/// 4. the lowest allowed version for subjects being downgraded, the highest otherwise.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Preferences {
    locked: Map<Subject, Version>,
    latest: Set<Subject>,
    soft: Vec<SoftRequirement>,
    downgrade: Set<Subject>,
}

impl Preferences {
    /// No preference: always the highest allowed version.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefer `version` for `subject`, typically taken from a lock file.
    pub fn lock(mut self, subject: impl Into<Subject>, version: impl Into<Version>) -> Self {
        self.locked.insert(subject.into(), version.into());
        self
    }

    /// Always take the highest allowed version of `subject`,
    /// regardless of soft requirements and downgrades.
    pub fn latest(mut self, subject: impl Into<Subject>) -> Self {
        self.latest.insert(subject.into());
        self
    }

    /// Once `trigger` is decided, prefer `versions` for `target`.
    pub fn soft(
        mut self,
        trigger: impl Into<Subject>,
        target: impl Into<Subject>,
        versions: Ranges<Version>,
    ) -> Self {
        self.soft.push(SoftRequirement {
            trigger: trigger.into(),
            target: target.into(),
            versions,
        });
        self
    }

    /// Prefer the lowest allowed version of `subject`.
    pub fn downgrade(mut self, subject: impl Into<Subject>) -> Self {
        self.downgrade.insert(subject.into());
        self
    }

    /// Choose a version of `subject` among `candidates`, which are sorted in ascending order.
    ///
    /// `is_decided` tells whether a subject was already decided in the current partial solution.
    pub fn choose<'a>(
        &self,
        subject: &Subject,
        candidates: &'a VersionSet,
        is_decided: impl Fn(&Subject) -> bool,
    ) -> Option<&'a PackageVersion> {
        if let Some(locked) = self.locked.get(subject) {
            if let Some(version) = candidates.iter().find(|c| &c.version == locked) {
                return Some(version);
            }
        }
        if self.latest.contains(subject) {
            return candidates.last();
        }
        let soft = self
            .soft
            .iter()
            .filter(|soft| &soft.target == subject && is_decided(&soft.trigger))
            .find_map(|soft| {
                candidates
                    .iter()
                    .rev()
                    .find(|c| soft.versions.contains(&c.version))
            });
        if soft.is_some() {
            return soft;
        }
        if self.downgrade.contains(subject) {
            candidates.first()
        } else {
            candidates.last()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(majors: &[u32]) -> VersionSet {
        majors.iter().map(|&v| PackageVersion::new("a", v)).collect()
    }

    fn nothing_decided(_: &Subject) -> bool {
        false
    }

    #[test]
    fn highest_by_default() {
        let all = candidates(&[1, 2, 3]);
        let chosen = Preferences::new().choose(&"a".into(), &all, nothing_decided);
        assert_eq!(chosen, Some(&PackageVersion::new("a", 3)));
        assert_eq!(
            Preferences::new().choose(&"a".into(), &VersionSet::new(), nothing_decided),
            None
        );
    }

    #[test]
    fn locked_version_wins_while_allowed() {
        let preferences = Preferences::new().lock("a", 2);
        let all = candidates(&[1, 2, 3]);
        let chosen = preferences.choose(&"a".into(), &all, nothing_decided);
        assert_eq!(chosen, Some(&PackageVersion::new("a", 2)));

        let without_locked = candidates(&[1, 3]);
        let chosen = preferences.choose(&"a".into(), &without_locked, nothing_decided);
        assert_eq!(chosen, Some(&PackageVersion::new("a", 3)));
    }

    #[test]
    fn latest_ignores_soft_requirements_and_downgrades() {
        let preferences = Preferences::new()
            .soft("b", "a", Ranges::singleton(Version::from(1)))
            .downgrade("a")
            .latest("a");
        let all = candidates(&[1, 2, 3]);
        let chosen = preferences.choose(&"a".into(), &all, |_| true);
        assert_eq!(chosen, Some(&PackageVersion::new("a", 3)));

        let locked = preferences.lock("a", 2);
        assert_eq!(
            locked.choose(&"a".into(), &all, |_| true),
            Some(&PackageVersion::new("a", 2))
        );
    }

    #[test]
    fn soft_requirement_needs_its_trigger() {
        let preferences =
            Preferences::new().soft("b", "a", Ranges::strictly_lower_than(Version::from(3)));
        let all = candidates(&[1, 2, 3]);
        assert_eq!(
            preferences.choose(&"a".into(), &all, nothing_decided),
            Some(&PackageVersion::new("a", 3))
        );
        let b_decided = |s: &Subject| s == &Subject::package("b");
        assert_eq!(
            preferences.choose(&"a".into(), &all, b_decided),
            Some(&PackageVersion::new("a", 2))
        );
    }

    #[test]
    fn downgrade_takes_the_lowest() {
        let preferences = Preferences::new().downgrade("a");
        let all = candidates(&[2, 3]);
        let chosen = preferences.choose(&"a".into(), &all, nothing_decided);
        assert_eq!(chosen, Some(&PackageVersion::new("a", 2)));
    }
}
