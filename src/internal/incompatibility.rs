// SPDX-License-Identifier: MPL-2.0

//! An incompatibility is a set of terms for different subjects
//! that should never be satisfied all together.

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::sync::Arc;

use crate::internal::{Arena, Id};
use crate::term::{self, Constraint};
use crate::{PackageVersion, Subject, Term, VersionSet};

/// An incompatibility is a set of terms for different subjects
/// that should never be satisfied all together.
/// An incompatibility usually originates from a package dependency.
/// For example, if package A at version 1 depends on package B
/// at version 2, you can never have both terms `A = 1`
/// and `not B = 2` satisfied at the same time in a partial solution.
/// This would mean that we found a solution with package A at version 1
/// but not with package B at version 2.
/// Yet A at version 1 depends on B at version 2 so this is not possible.
/// Therefore, the set `{ A = 1, not B = 2 }` is an incompatibility,
/// defined from dependencies of A at version 1.
///
/// Incompatibilities can also be derived from two other incompatibilities
/// during conflict resolution. More about all this in
/// [PubGrub documentation](https://github.com/dart-lang/pub/blob/master/doc/solver.md#incompatibility).
#[derive(Debug, Clone)]
pub struct Incompatibility {
    /// At most one term per subject, sorted.
    terms: Vec<Term>,
    /// The reason for the incompatibility.
    pub cause: Cause,
}

/// Type alias of unique identifiers for incompatibilities.
pub type IncompId = Id<Incompatibility>;

/// The reason for an incompatibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cause {
    /// Initial incompatibility `{ not root }`, forcing the root to be selected.
    Root,
    /// The positive term depends on the inverse of the negative term.
    ///
    /// If a@1 depends on b in {1, 2}, the incompatibility has terms `{ a 1, not b {1, 2} }`.
    Dependency,
    /// The version is unavailable for a reason coming from the graph backend,
    /// such as a dependency that does not exist.
    Unavailable(String),
    /// Derived from two earlier incompatibilities by the rule of resolution.
    ///
    /// For example, if a -> b and b -> c, we can derive a -> c.
    Conflict {
        /// The incompatibility that was satisfied.
        conflict: IncompId,
        /// The cause of the assignment that satisfied it.
        other: IncompId,
    },
}

/// A Relation describes how a set of terms can be compared to an incompatibility.
/// Typically, the set of terms comes from the partial solution.
#[derive(Eq, PartialEq, Debug, Clone)]
pub(crate) enum Relation {
    /// We say that a set of terms S satisfies an incompatibility I
    /// if S satisfies every term in I.
    Satisfied,
    /// We say that S contradicts I
    /// if S contradicts at least one term in I.
    Contradicted(Subject),
    /// If S satisfies all but one of I's terms and is inconclusive for the remaining term,
    /// we say S "almost satisfies" I and we call the remaining term the "unsatisfied term".
    AlmostSatisfied(Subject),
    /// Otherwise, we say that their relation is inconclusive.
    Inconclusive,
}

impl Incompatibility {
    fn new(terms: impl IntoIterator<Item = Term>, cause: Cause) -> Self {
        let mut terms: Vec<Term> = terms.into_iter().collect();
        terms.sort();
        debug_assert!(
            terms.windows(2).all(|w| w[0].subject() != w[1].subject()),
            "one term per subject"
        );
        Self { terms, cause }
    }

    /// Create the initial "not root" incompatibility.
    pub(crate) fn root(universe: Arc<VersionSet>) -> Self {
        let root = PackageVersion::root();
        Self::new(
            [Term::exclude(Subject::Root, VersionSet::from([root]), universe)],
            Cause::Root,
        )
    }

    /// Create an incompatibility forbidding a version for a reason outside the solver.
    pub(crate) fn unavailable(
        version: PackageVersion,
        universe: Arc<VersionSet>,
        reason: String,
    ) -> Self {
        Self::new([Term::exact(version, universe)], Cause::Unavailable(reason))
    }

    /// Build an incompatibility from a given dependency.
    ///
    /// Returns [None] for a self-dependency that the version trivially fulfills.
    pub(crate) fn from_dependency(depender: Term, dependency: Term) -> Option<Self> {
        debug_assert!(depender.is_positive() && !dependency.is_positive());
        if depender.subject() == dependency.subject() {
            // A self-dependency is either always true or forbids the depender.
            return match depender.intersection(&dependency) {
                Some(_) => Some(Self::new([depender], Cause::Dependency)),
                None => None,
            };
        }
        let terms = if dependency.is_any() {
            vec![depender]
        } else {
            vec![depender, dependency]
        };
        Some(Self::new(terms, Cause::Dependency))
    }

    /// Prior cause of two incompatibilities using the rule of resolution.
    pub(crate) fn prior_cause(
        incompat: IncompId,
        satisfier_cause: IncompId,
        subject: &Subject,
        store: &Arena<Self>,
    ) -> Self {
        let cause = Cause::Conflict {
            conflict: incompat,
            other: satisfier_cause,
        };
        let mut terms: BTreeMap<Subject, Term> = BTreeMap::new();
        for term in store[incompat].terms.iter().chain(&store[satisfier_cause].terms) {
            if term.subject() == subject {
                continue;
            }
            let merged = match terms.get(term.subject()) {
                // Both incompatibilities are satisfied by the partial solution,
                // so their terms always overlap.
                Some(existing) => existing
                    .intersection(term)
                    .unwrap_or_else(|| term.with(VersionSet::new(), true)),
                None => term.clone(),
            };
            terms.insert(term.subject().clone(), merged);
        }
        let t1 = store[incompat].get(subject);
        let t2 = store[satisfier_cause].get(subject);
        if let (Some(t1), Some(t2)) = (t1, t2) {
            let term = t1.union(t2);
            if !term.is_any() {
                terms.insert(subject.clone(), term);
            }
        }
        Self::new(terms.into_values(), cause)
    }

    /// Whether this is the empty incompatibility, meaning version solving failed.
    pub fn is_failure(&self) -> bool {
        self.terms.is_empty()
    }

    /// Whether the only thing this incompatibility forbids is selecting the root.
    pub(crate) fn forbids_root(&self) -> bool {
        matches!(self.terms.as_slice(), [t] if t.subject() == &Subject::Root && t.is_positive())
    }

    /// Get the term related to a given subject (if it exists).
    pub fn get(&self, subject: &Subject) -> Option<&Term> {
        self.terms.iter().find(|t| t.subject() == subject)
    }

    /// Iterate over the terms, sorted by subject.
    pub fn iter(&self) -> impl Iterator<Item = &Term> {
        self.terms.iter()
    }

    /// Retrieve parent causes if of type Conflict.
    pub fn causes(&self) -> Option<(IncompId, IncompId)> {
        match self.cause {
            Cause::Conflict { conflict, other } => Some((conflict, other)),
            _ => None,
        }
    }

    /// CF definition of Relation enum.
    pub(crate) fn relation<'a>(&self, terms: impl Fn(&Subject) -> Option<&'a Term>) -> Relation {
        let mut relation = Relation::Satisfied;
        for incompat_term in &self.terms {
            let subject = incompat_term.subject();
            match terms(subject).map(|term| incompat_term.relation_with(term)) {
                Some(term::Relation::Satisfied) => {}
                Some(term::Relation::Contradicted) => {
                    return Relation::Contradicted(subject.clone());
                }
                None | Some(term::Relation::Inconclusive) => {
                    // If a subject is not present, the intersection is the same as any.
                    // According to the rules of satisfactions, the relation would be inconclusive.
                    // It could also be satisfied if the incompatibility term was also any,
                    // but we systematically remove those from incompatibilities
                    // so we're safe on that front.
                    if relation == Relation::Satisfied {
                        relation = Relation::AlmostSatisfied(subject.clone());
                    } else {
                        return Relation::Inconclusive;
                    }
                }
            }
        }
        relation
    }
}

impl Display for Incompatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.terms.as_slice() {
            [] => write!(f, "version solving failed"),
            [term] if term.is_positive() => write!(f, "{term} is forbidden"),
            [term] => write!(f, "{} is mandatory", term.inverse()),
            [pos, neg] | [neg, pos] if pos.is_positive() && !neg.is_positive() => {
                write!(f, "{pos} depends on {}", neg.inverse())
            }
            terms => {
                let terms: Vec<String> = terms.iter().map(|t| t.to_string()).collect();
                write!(f, "{} are incompatible", terms.join(", "))
            }
        }
    }
}

// TESTS #######################################################################

#[cfg(test)]
pub(crate) mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::term::tests::strategy as term_strat;

    fn universe(name: &str) -> Arc<VersionSet> {
        Arc::new((1..=3u32).map(|v| PackageVersion::new(name, v)).collect())
    }

    fn relabel(term: &Term, name: &str) -> Term {
        let versions = term
            .versions()
            .iter()
            .map(|v| PackageVersion::new(name, v.version.clone()))
            .collect();
        let universe = Arc::new(
            term.all_versions()
                .iter()
                .map(|v| PackageVersion::new(name, v.version.clone()))
                .collect(),
        );
        if term.is_positive() {
            Term::require(Subject::package(name), versions, universe)
        } else {
            Term::exclude(Subject::package(name), versions, universe)
        }
    }

    fn raw(terms: Vec<Term>) -> Incompatibility {
        Incompatibility::new(terms.into_iter().filter(|t| !t.is_any()), Cause::Dependency)
    }

    proptest! {

        /// For any three different packages p1, p2 and p3,
        /// for any three terms t1, t2 and t3,
        /// if we have the two following incompatibilities:
        ///    { p1: t1, p2: not t2 }
        ///    { p2: t2, p3: t3 }
        /// the rule of resolution says that we can deduce the following incompatibility:
        ///    { p1: t1, p3: t3 }
        #[test]
        fn rule_of_resolution(t1 in term_strat(), t2 in term_strat(), t3 in term_strat()) {
            let (t1, t2, t3) = (relabel(&t1, "p1"), relabel(&t2, "p2"), relabel(&t3, "p3"));
            let mut store = Arena::new();
            let i1 = store.alloc(raw(vec![t1.clone(), t2.inverse()]));
            let i2 = store.alloc(raw(vec![t2, t3.clone()]));

            let expected: Vec<Term> = [t1, t3].into_iter().filter(|t| !t.is_any()).collect();
            let resolution = Incompatibility::prior_cause(i1, i2, &Subject::package("p2"), &store);
            assert_eq!(resolution.iter().cloned().collect::<Vec<_>>(), expected);
            assert_eq!(resolution.causes(), Some((i1, i2)));
        }

    }

    #[test]
    fn self_dependency() {
        let a = Subject::package("a");
        let a1 = Term::exact(PackageVersion::new("a", 1), universe("a"));
        let fulfilled = Term::exclude(a.clone(), universe("a").as_ref().clone(), universe("a"));
        assert!(Incompatibility::from_dependency(a1.clone(), fulfilled).is_none());

        let other = Term::exclude(
            a.clone(),
            VersionSet::from([PackageVersion::new("a", 2)]),
            universe("a"),
        );
        let forbidden = Incompatibility::from_dependency(a1.clone(), other).unwrap();
        assert_eq!(forbidden.iter().collect::<Vec<_>>(), vec![&a1]);
    }

    #[test]
    fn display() {
        let root = Incompatibility::root(Arc::new(VersionSet::from([PackageVersion::root()])));
        assert_eq!(root.to_string(), "root is mandatory");

        let a1 = Term::exact(PackageVersion::new("a", 1), universe("a"));
        let b = Term::exclude(
            Subject::package("b"),
            VersionSet::from([PackageVersion::new("b", 2), PackageVersion::new("b", 3)]),
            universe("b"),
        );
        let dep = Incompatibility::from_dependency(a1.clone(), b).unwrap();
        assert_eq!(dep.to_string(), "a ==1.0.0 depends on b >=2.0.0");

        let unavailable =
            Incompatibility::unavailable(PackageVersion::new("a", 1), universe("a"), "gone".into());
        assert_eq!(unavailable.to_string(), "a ==1.0.0 is forbidden");
        assert!(!unavailable.is_failure());
        assert!(raw(vec![]).is_failure());
    }

    #[test]
    fn relation_with_partial_terms() {
        let a1 = Term::exact(PackageVersion::new("a", 1), universe("a"));
        let not_b2 = Term::exclude(
            Subject::package("b"),
            VersionSet::from([PackageVersion::new("b", 2)]),
            universe("b"),
        );
        let incompat = Incompatibility::from_dependency(a1.clone(), not_b2.clone()).unwrap();

        let only_a = |s: &Subject| (s == a1.subject()).then_some(&a1);
        assert_eq!(
            incompat.relation(only_a),
            Relation::AlmostSatisfied(Subject::package("b"))
        );

        let b3 = Term::exact(PackageVersion::new("b", 3), universe("b"));
        let both = |s: &Subject| if s == a1.subject() { Some(&a1) } else { Some(&b3) };
        assert_eq!(incompat.relation(both), Relation::Satisfied);

        let b2 = Term::exact(PackageVersion::new("b", 2), universe("b"));
        let contradicting = |s: &Subject| if s == a1.subject() { Some(&a1) } else { Some(&b2) };
        assert_eq!(
            incompat.relation(contradicting),
            Relation::Contradicted(Subject::package("b"))
        );
    }
}
