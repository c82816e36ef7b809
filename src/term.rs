// SPDX-License-Identifier: MPL-2.0

//! A term is the fundamental unit of operation of the PubGrub algorithm.
//! It is a positive or negative expression regarding a set of versions of one subject.
//!
//! Every term kind implements the [Constraint] contract.
//! One only needs to provide the four accessors and a constructor,
//! the set algebra (satisfaction, intersection, difference, inverse)
//! is derived from them and is shared by all kinds of terms.

use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::sync::Arc;

use crate::{MismatchedSubjects, PackageVersion, Subject, VersionSet};

/// The contract shared by all terms.
///
/// A positive term "`subject` is selected with a version in `versions`" is true
/// only once the subject has been selected.
/// A negative term "`subject` is not selected with a version in `versions`"
/// is also true when the subject is not selected at all.
pub trait Constraint: Clone + Sized {
    /// The package or domain this term is about.
    fn subject(&self) -> &Subject;

    /// The versions allowed by a positive term, or excluded by a negative one.
    fn versions(&self) -> &VersionSet;

    /// Polarity of the term.
    fn is_positive(&self) -> bool;

    /// Every version the subject could ever take.
    fn all_versions(&self) -> &Arc<VersionSet>;

    /// Build a term of the same kind, subject and universe.
    fn with(&self, versions: VersionSet, positive: bool) -> Self;

    // Automatically implemented functions

    /// Same versions, opposite polarity.
    fn inverse(&self) -> Self {
        self.with(self.versions().clone(), !self.is_positive())
    }

    /// Whether this term being true forces `other` to be true.
    fn satisfies(&self, other: &Self) -> Result<bool, MismatchedSubjects> {
        same_subject(self.subject(), other.subject())?;
        Ok(satisfies_parts(
            (self.versions(), self.is_positive()),
            (other.versions(), other.is_positive()),
        ))
    }

    /// The term true exactly when both terms are, or [None] if no version could make it true.
    fn intersect(&self, other: &Self) -> Result<Option<Self>, MismatchedSubjects> {
        same_subject(self.subject(), other.subject())?;
        Ok(intersect_parts(
            (self.versions(), self.is_positive()),
            (other.versions(), other.is_positive()),
        )
        .map(|(versions, positive)| self.with(versions, positive)))
    }

    /// The versions allowed by this term but not by `other`, or [None] if there are none.
    fn difference(&self, other: &Self) -> Result<Option<Self>, MismatchedSubjects> {
        self.intersect(&other.inverse())
    }
}

fn same_subject(left: &Subject, right: &Subject) -> Result<(), MismatchedSubjects> {
    if left == right {
        Ok(())
    } else {
        Err(MismatchedSubjects {
            left: left.clone(),
            right: right.clone(),
        })
    }
}

fn satisfies_parts((v1, pos1): (&VersionSet, bool), (v2, pos2): (&VersionSet, bool)) -> bool {
    match (pos1, pos2) {
        (true, true) => v1.is_subset(v2),
        (false, false) => v2.is_subset(v1),
        (false, true) => false,
        (true, false) => v1.is_disjoint(v2),
    }
}

fn intersect_parts(
    (v1, pos1): (&VersionSet, bool),
    (v2, pos2): (&VersionSet, bool),
) -> Option<(VersionSet, bool)> {
    let (versions, positive) = match (pos1, pos2) {
        (true, true) => (v1.intersection(v2).cloned().collect::<VersionSet>(), true),
        // De Morgan: not in v1 and not in v2 is not in either of them.
        (false, false) => return Some((v1.union(v2).cloned().collect(), false)),
        (true, false) => (v1.difference(v2).cloned().collect(), true),
        (false, true) => (v2.difference(v1).cloned().collect(), true),
    };
    if versions.is_empty() {
        None
    } else {
        Some((versions, positive))
    }
}

macro_rules! constraint_kind {
    ($(#[$doc:meta])* $name:ident, $subjects:pat) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            subject: Subject,
            versions: VersionSet,
            positive: bool,
            universe: Arc<VersionSet>,
        }

        impl $name {
            /// A positive term: the subject is selected with one of `versions`.
            pub fn require(subject: Subject, versions: VersionSet, universe: Arc<VersionSet>) -> Self {
                Self::new(subject, versions, true, universe)
            }

            /// A negative term: the subject is not selected with any of `versions`.
            pub fn exclude(subject: Subject, versions: VersionSet, universe: Arc<VersionSet>) -> Self {
                Self::new(subject, versions, false, universe)
            }

            fn new(
                subject: Subject,
                versions: VersionSet,
                positive: bool,
                universe: Arc<VersionSet>,
            ) -> Self {
                debug_assert!(
                    matches!(subject, $subjects),
                    "{} cannot constrain {}",
                    stringify!($name),
                    subject
                );
                Self {
                    subject,
                    versions,
                    positive,
                    universe,
                }
            }
        }

        impl Constraint for $name {
            fn subject(&self) -> &Subject {
                &self.subject
            }

            fn versions(&self) -> &VersionSet {
                &self.versions
            }

            fn is_positive(&self) -> bool {
                self.positive
            }

            fn all_versions(&self) -> &Arc<VersionSet> {
                &self.universe
            }

            fn with(&self, versions: VersionSet, positive: bool) -> Self {
                Self {
                    subject: self.subject.clone(),
                    versions,
                    positive,
                    universe: self.universe.clone(),
                }
            }
        }
    };
}

constraint_kind!(
    /// A term about the versions of a package.
    VersionConstraint,
    Subject::Package(_)
);

constraint_kind!(
    /// A term about the platform the solution targets.
    PlatformConstraint,
    Subject::Platform
);

constraint_kind!(
    /// A term about the interpreter version the solution targets.
    PythonInterpreterConstraint,
    Subject::PythonInterpreter
);

constraint_kind!(
    /// A term about the virtual root package.
    RootConstraint,
    Subject::Root
);

/// Any kind of term, so that terms about different domains can live in the same incompatibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// See [VersionConstraint].
    Version(VersionConstraint),
    /// See [PlatformConstraint].
    Platform(PlatformConstraint),
    /// See [PythonInterpreterConstraint].
    PythonInterpreter(PythonInterpreterConstraint),
    /// See [RootConstraint].
    Root(RootConstraint),
}

macro_rules! dispatch {
    ($term:expr, $c:ident => $body:expr) => {
        match $term {
            Term::Version($c) => $body,
            Term::Platform($c) => $body,
            Term::PythonInterpreter($c) => $body,
            Term::Root($c) => $body,
        }
    };
}

impl Constraint for Term {
    fn subject(&self) -> &Subject {
        dispatch!(self, c => c.subject())
    }

    fn versions(&self) -> &VersionSet {
        dispatch!(self, c => c.versions())
    }

    fn is_positive(&self) -> bool {
        dispatch!(self, c => c.is_positive())
    }

    fn all_versions(&self) -> &Arc<VersionSet> {
        dispatch!(self, c => c.all_versions())
    }

    fn with(&self, versions: VersionSet, positive: bool) -> Self {
        match self {
            Self::Version(c) => Self::Version(c.with(versions, positive)),
            Self::Platform(c) => Self::Platform(c.with(versions, positive)),
            Self::PythonInterpreter(c) => Self::PythonInterpreter(c.with(versions, positive)),
            Self::Root(c) => Self::Root(c.with(versions, positive)),
        }
    }
}

/// Describe how a set of terms can be compared to another term.
/// Typically, the set of terms comes from the partial solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// The set of terms satisfies the term.
    Satisfied,
    /// The set of terms contradicts the term, both can never hold at once.
    Contradicted,
    /// Otherwise, their relation is inconclusive.
    Inconclusive,
}

impl Term {
    /// A positive term of the kind matching `subject`.
    pub fn require(subject: Subject, versions: VersionSet, universe: Arc<VersionSet>) -> Self {
        Self::new(subject, versions, true, universe)
    }

    /// A negative term of the kind matching `subject`.
    pub fn exclude(subject: Subject, versions: VersionSet, universe: Arc<VersionSet>) -> Self {
        Self::new(subject, versions, false, universe)
    }

    /// The positive term selecting exactly this version.
    pub fn exact(version: PackageVersion, universe: Arc<VersionSet>) -> Self {
        let subject = version.subject.clone();
        Self::require(subject, VersionSet::from([version]), universe)
    }

    fn new(subject: Subject, versions: VersionSet, positive: bool, universe: Arc<VersionSet>) -> Self {
        match subject {
            Subject::Package(_) => Self::Version(if positive {
                VersionConstraint::require(subject, versions, universe)
            } else {
                VersionConstraint::exclude(subject, versions, universe)
            }),
            Subject::Platform => Self::Platform(if positive {
                PlatformConstraint::require(subject, versions, universe)
            } else {
                PlatformConstraint::exclude(subject, versions, universe)
            }),
            Subject::PythonInterpreter => Self::PythonInterpreter(if positive {
                PythonInterpreterConstraint::require(subject, versions, universe)
            } else {
                PythonInterpreterConstraint::exclude(subject, versions, universe)
            }),
            Subject::Root => Self::Root(if positive {
                RootConstraint::require(subject, versions, universe)
            } else {
                RootConstraint::exclude(subject, versions, universe)
            }),
        }
    }

    /// The negative term excluding nothing, which always holds.
    pub(crate) fn any_of(&self) -> Self {
        self.with(VersionSet::new(), false)
    }

    /// Whether this term always holds.
    pub fn is_any(&self) -> bool {
        !self.is_positive() && self.versions().is_empty()
    }

    /// Whether the version is allowed by this term.
    pub fn contains(&self, version: &PackageVersion) -> bool {
        self.versions().contains(version) == self.is_positive()
    }

    // Unchecked variants of the contract, for callers that already grouped terms by subject.

    pub(crate) fn intersection(&self, other: &Self) -> Option<Self> {
        debug_assert_eq!(self.subject(), other.subject());
        intersect_parts(
            (self.versions(), self.is_positive()),
            (other.versions(), other.is_positive()),
        )
        .map(|(versions, positive)| self.with(versions, positive))
    }

    pub(crate) fn is_satisfied_by(&self, other: &Self) -> bool {
        debug_assert_eq!(self.subject(), other.subject());
        satisfies_parts(
            (other.versions(), other.is_positive()),
            (self.versions(), self.is_positive()),
        )
    }

    /// The term true when either term is.
    pub(crate) fn union(&self, other: &Self) -> Self {
        match self.inverse().intersection(&other.inverse()) {
            Some(both_false) => both_false.inverse(),
            None => self.any_of(),
        }
    }

    /// Check if a set of terms satisfies or contradicts a given term.
    /// Otherwise the relation is inconclusive.
    pub(crate) fn relation_with(&self, other_terms_intersection: &Self) -> Relation {
        if self.is_satisfied_by(other_terms_intersection) {
            Relation::Satisfied
        } else if self.intersection(other_terms_intersection).is_none() {
            Relation::Contradicted
        } else {
            Relation::Inconclusive
        }
    }
}

impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Terms sort by subject, then positive terms before negative ones.
impl Ord for Term {
    fn cmp(&self, other: &Self) -> Ordering {
        self.subject()
            .cmp(other.subject())
            .then_with(|| other.is_positive().cmp(&self.is_positive()))
            .then_with(|| self.versions().cmp(other.versions()))
            .then_with(|| self.all_versions().cmp(other.all_versions()))
    }
}

/// Render `versions` as runs of consecutive versions of `universe`.
pub(crate) fn describe_versions(versions: &VersionSet, universe: &VersionSet) -> String {
    if !universe.is_empty() && versions.is_superset(universe) {
        return "*".to_string();
    }
    let ordered: Vec<&PackageVersion> = universe.iter().collect();
    let last = ordered.len().saturating_sub(1);
    let mut runs: Vec<String> = Vec::new();
    let mut start: Option<usize> = None;
    for i in 0..=ordered.len() {
        let inside = ordered.get(i).is_some_and(|v| versions.contains(*v));
        match (start, inside) {
            (None, true) => start = Some(i),
            (Some(s), false) => {
                let end = i - 1;
                runs.push(match (s == 0, end == last) {
                    _ if s == end => format!("=={}", ordered[s].version),
                    (true, _) => format!("<={}", ordered[end].version),
                    (_, true) => format!(">={}", ordered[s].version),
                    _ => format!(">={}, <={}", ordered[s].version, ordered[end].version),
                });
                start = None;
            }
            _ => {}
        }
    }
    runs.extend(
        versions
            .iter()
            .filter(|v| !universe.contains(*v))
            .map(|v| format!("=={}", v.version)),
    );
    if runs.is_empty() {
        "∅".to_string()
    } else {
        runs.join(" || ")
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subject = self.subject();
        let versions = describe_versions(self.versions(), self.all_versions());
        match (self.is_positive(), subject) {
            (true, Subject::Root) => write!(f, "{subject}"),
            (false, Subject::Root) => write!(f, "not {subject}"),
            (true, _) if versions == "*" => write!(f, "{subject}"),
            (true, _) => write!(f, "{subject} {versions}"),
            (false, _) if self.versions().is_empty() => write!(f, "any {subject}"),
            (false, _) => write!(f, "not {subject} {versions}"),
        }
    }
}

// TESTS #######################################################################

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    pub(crate) fn universe() -> Arc<VersionSet> {
        Arc::new(
            (1..=6u32)
                .map(|major| PackageVersion::new("p", major))
                .collect(),
        )
    }

    pub(crate) fn versions(majors: &[u32]) -> VersionSet {
        majors
            .iter()
            .map(|&major| PackageVersion::new("p", major))
            .collect()
    }

    pub(crate) fn pos(majors: &[u32]) -> Term {
        Term::require(Subject::package("p"), versions(majors), universe())
    }

    pub(crate) fn neg(majors: &[u32]) -> Term {
        Term::exclude(Subject::package("p"), versions(majors), universe())
    }

    pub(crate) fn strategy() -> impl Strategy<Value = Term> {
        (any::<bool>(), prop::collection::btree_set(1..=6u32, 0..=6)).prop_map(
            |(positive, majors)| {
                let majors: Vec<u32> = majors.into_iter().collect();
                if positive && !majors.is_empty() {
                    pos(&majors)
                } else {
                    neg(&majors)
                }
            },
        )
    }

    #[test]
    fn satisfaction_table() {
        assert!(pos(&[1]).satisfies(&pos(&[1, 2])).unwrap());
        assert!(!pos(&[1, 3]).satisfies(&pos(&[1, 2])).unwrap());
        assert!(neg(&[1, 2]).satisfies(&neg(&[1])).unwrap());
        assert!(!neg(&[1]).satisfies(&neg(&[1, 2])).unwrap());
        assert!(!neg(&[]).satisfies(&pos(&[1, 2, 3, 4, 5, 6])).unwrap());
        assert!(pos(&[3]).satisfies(&neg(&[1, 2])).unwrap());
        assert!(!pos(&[2]).satisfies(&neg(&[1, 2])).unwrap());
    }

    #[test]
    fn intersection_table() {
        assert_eq!(pos(&[1, 2]).intersect(&pos(&[2, 3])).unwrap(), Some(pos(&[2])));
        assert_eq!(neg(&[1]).intersect(&neg(&[2])).unwrap(), Some(neg(&[1, 2])));
        assert_eq!(pos(&[1, 2]).intersect(&neg(&[2])).unwrap(), Some(pos(&[1])));
        assert_eq!(neg(&[2]).intersect(&pos(&[1, 2])).unwrap(), Some(pos(&[1])));
        assert_eq!(pos(&[1]).intersect(&neg(&[1])).unwrap(), None);
        assert_eq!(pos(&[1, 2, 3]).difference(&pos(&[2])).unwrap(), Some(pos(&[1, 3])));
        assert_eq!(pos(&[2]).difference(&pos(&[1, 2])).unwrap(), None);
    }

    #[test]
    fn mismatched_subjects() {
        let other = Term::require(
            Subject::package("q"),
            VersionSet::from([PackageVersion::new("q", 1)]),
            universe(),
        );
        let err = pos(&[1]).satisfies(&other).unwrap_err();
        assert_eq!(err.left, Subject::package("p"));
        assert_eq!(err.right, Subject::package("q"));
        assert!(pos(&[1]).intersect(&other).is_err());
    }

    #[test]
    fn kinds_follow_subjects() {
        let platforms: Arc<VersionSet> = Arc::new(
            ["linux", "macos"]
                .iter()
                .map(|p| PackageVersion::new(Subject::Platform, p.parse::<crate::Version>().unwrap()))
                .collect(),
        );
        let linux = platforms.iter().next().unwrap().clone();
        let term = Term::exact(linux.clone(), platforms.clone());
        assert!(matches!(term, Term::Platform(_)));
        assert!(term.contains(&linux));
        assert!(matches!(
            Term::require(Subject::Root, VersionSet::from([PackageVersion::root()]), universe()),
            Term::Root(_)
        ));
        assert!(matches!(pos(&[1]), Term::Version(_)));
        assert_eq!(term.to_string(), "platform ==linux");
    }

    #[test]
    fn sorting_is_by_subject_then_polarity() {
        let q = Term::exclude(
            Subject::package("q"),
            VersionSet::from([PackageVersion::new("q", 1)]),
            universe(),
        );
        let python = Term::require(Subject::PythonInterpreter, VersionSet::new(), universe());
        let mut terms = vec![python.clone(), q.clone(), neg(&[1]), pos(&[4])];
        terms.sort();
        assert_eq!(terms, vec![pos(&[4]), neg(&[1]), q, python]);
    }

    #[test]
    fn display() {
        assert_eq!(pos(&[2, 3, 4]).to_string(), "p >=2.0.0, <=4.0.0");
        assert_eq!(pos(&[1, 2, 5, 6]).to_string(), "p <=2.0.0 || >=5.0.0");
        assert_eq!(pos(&[3]).to_string(), "p ==3.0.0");
        assert_eq!(pos(&[1, 2, 3, 4, 5, 6]).to_string(), "p");
        assert_eq!(neg(&[6]).to_string(), "not p ==6.0.0");
        assert_eq!(neg(&[]).to_string(), "any p");
    }

    proptest! {

        #[test]
        fn intersect_with_inverse_is_empty(t in strategy()) {
            assert_eq!(t.intersect(&t.inverse()).unwrap(), None);
        }

        #[test]
        fn double_inverse_is_identity(t in strategy()) {
            assert_eq!(t.inverse().inverse(), t);
        }

        #[test]
        fn disjoint_positives_do_not_intersect(
            a in prop::collection::btree_set(1..=3u32, 1..=3),
            b in prop::collection::btree_set(4..=6u32, 1..=3),
        ) {
            let a: Vec<u32> = a.into_iter().collect();
            let b: Vec<u32> = b.into_iter().collect();
            assert_eq!(pos(&a).intersect(&pos(&b)).unwrap(), None);
        }

        #[test]
        fn intersection_is_commutative(t1 in strategy(), t2 in strategy()) {
            assert_eq!(t1.intersection(&t2), t2.intersection(&t1));
        }

        #[test]
        fn intersection_satisfies_both(t1 in strategy(), t2 in strategy()) {
            if let Some(both) = t1.intersection(&t2) {
                assert!(both.satisfies(&t1).unwrap());
                assert!(both.satisfies(&t2).unwrap());
            }
        }

        #[test]
        fn union_is_satisfied_by_both(t1 in strategy(), t2 in strategy()) {
            let either = t1.union(&t2);
            assert!(t1.satisfies(&either).unwrap());
            assert!(t2.satisfies(&either).unwrap());
        }

        #[test]
        fn relation_is_consistent(t1 in strategy(), t2 in strategy()) {
            match t1.relation_with(&t2) {
                Relation::Satisfied => assert!(t2.satisfies(&t1).unwrap()),
                Relation::Contradicted => assert_eq!(t1.intersection(&t2), None),
                Relation::Inconclusive => {
                    assert!(!t2.satisfies(&t1).unwrap());
                    assert!(t1.intersection(&t2).is_some());
                }
            }
        }
    }
}
