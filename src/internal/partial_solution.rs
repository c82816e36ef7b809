// SPDX-License-Identifier: MPL-2.0

//! The partial solution is the solver's working memory:
//! an append-only log of assignments, the decisions taken so far,
//! and for every subject the intersection of all its live assignments.

use std::cmp::Reverse;
use std::fmt::{self, Display};
use std::hash::BuildHasherDefault;

use priority_queue::PriorityQueue;
use rustc_hash::FxHasher;

use crate::internal::{IncompId, Incompatibility, Relation};
use crate::term::Constraint;
use crate::{Map, PackageVersion, Set, Subject, Term, VersionSet};

type FnvIndexMap<K, V> = indexmap::IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// Priority of an undecided subject: its conflict count, then fewer candidates first.
pub(crate) type Priority = (u32, Reverse<usize>);

/// Number of decisions taken before (and including) an assignment.
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default)]
pub struct DecisionLevel(pub u32);

impl Display for DecisionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of the partial solution log.
///
/// A decision has no cause, a derivation always has one:
/// the incompatibility that forced it.
#[derive(Debug, Clone)]
pub struct Assignment {
    /// What was assigned.
    pub term: Term,
    /// Number of decisions in the log up to and including this assignment.
    pub decision_level: DecisionLevel,
    /// Position in the log.
    pub index: usize,
    /// The incompatibility this assignment was derived from.
    pub cause: Option<IncompId>,
}

impl Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cause {
            None => write!(f, "[{}] decision {}", self.decision_level, self.term),
            Some(cause) => write!(
                f,
                "[{}] derivation {} (from {:?})",
                self.decision_level, self.term, cause
            ),
        }
    }
}

/// The partial solution contains all subject assignments,
/// historically ordered.
#[derive(Clone, Debug, Default)]
pub struct PartialSolution {
    /// Every live assignment, in the order they were made.
    /// Decision levels never decrease along the log.
    assignments: Vec<Assignment>,
    /// Decided versions, in decision order.
    /// The decision level is always the length of this map.
    decisions: FnvIndexMap<Subject, PackageVersion>,
    /// Intersection of the live assignments of each subject, in log order.
    merged: Map<Subject, Term>,
    /// Undecided subjects with a positive term, by priority then subject order.
    /// The entries of subjects in `outdated` may be stale.
    prioritized: PriorityQueue<Subject, (Priority, Reverse<Subject>), BuildHasherDefault<FxHasher>>,
    /// Subjects whose merged term changed since the last pick.
    outdated: Set<Subject>,
    /// How many times a decision followed a backtrack.
    attempted_solutions: u32,
    /// Whether the last structural change was a backtrack.
    backtracking: bool,
}

impl PartialSolution {
    /// Initialize an empty PartialSolution.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Current decision level, equal to the number of decisions.
    pub fn decision_level(&self) -> DecisionLevel {
        DecisionLevel(self.decisions.len() as u32)
    }

    /// Number of times the search resumed deciding after a backtrack.
    pub fn attempted_solutions(&self) -> u32 {
        self.attempted_solutions
    }

    /// Whether a version was already decided for this subject.
    pub fn is_decided(&self, subject: &Subject) -> bool {
        self.decisions.contains_key(subject)
    }

    /// Add a decision. The term must select exactly one version.
    pub fn decide(&mut self, term: Term) {
        debug_assert!(term.is_positive() && term.versions().len() == 1);
        debug_assert!(
            !self.decisions.contains_key(term.subject()),
            "Already existing decision for {}",
            term.subject()
        );
        if self.backtracking {
            self.attempted_solutions += 1;
            self.backtracking = false;
        }
        if let Some(version) = term.versions().iter().next() {
            self.decisions
                .insert(term.subject().clone(), version.clone());
        }
        self.push(term, None);
    }

    /// Add a derivation at the current decision level.
    pub fn derive(&mut self, term: Term, cause: IncompId) {
        self.push(term, Some(cause));
    }

    fn push(&mut self, term: Term, cause: Option<IncompId>) {
        let merged = match self.merged.remove(term.subject()) {
            None => term.clone(),
            // Propagation only derives terms compatible with what is known,
            // an empty intersection stays representable as an empty positive term.
            Some(existing) => existing
                .intersection(&term)
                .unwrap_or_else(|| term.with(VersionSet::new(), true)),
        };
        self.merged.insert(term.subject().clone(), merged);
        self.outdated.insert(term.subject().clone());
        self.assignments.push(Assignment {
            term,
            decision_level: self.decision_level(),
            index: self.assignments.len(),
            cause,
        });
    }

    /// Backtrack the partial solution to a given decision level.
    pub fn backtrack(&mut self, level: DecisionLevel) {
        let keep = self
            .assignments
            .partition_point(|a| a.decision_level <= level);
        self.assignments.truncate(keep);
        self.decisions.truncate(level.0 as usize);
        self.merged.clear();
        for assignment in &self.assignments {
            let subject = assignment.term.subject();
            let merged = match self.merged.get(subject) {
                None => assignment.term.clone(),
                Some(existing) => existing
                    .intersection(&assignment.term)
                    .unwrap_or_else(|| assignment.term.with(VersionSet::new(), true)),
            };
            self.merged.insert(subject.clone(), merged);
        }
        // Conflict counts only change right before a backtrack.
        self.prioritized.clear();
        self.outdated = self.merged.keys().cloned().collect();
        self.backtracking = true;
    }

    /// Retrieve intersection of terms related to a subject.
    pub fn term_intersection_for(&self, subject: &Subject) -> Option<&Term> {
        self.merged.get(subject)
    }

    /// Whether what is known about the term's subject forces the term to be true.
    pub fn satisfies(&self, term: &Term) -> bool {
        self.merged
            .get(term.subject())
            .is_some_and(|merged| term.is_satisfied_by(merged))
    }

    /// Whether what is known about the term's subject makes the term impossible.
    pub fn is_incompatible(&self, term: &Term) -> bool {
        self.merged
            .get(term.subject())
            .is_some_and(|merged| merged.intersection(term).is_none())
    }

    /// Check if the terms in the partial solution satisfy the incompatibility.
    pub(crate) fn relation(&self, incompat: &Incompatibility) -> Relation {
        let mut relation = Relation::Satisfied;
        for term in incompat.iter() {
            if self.satisfies(term) {
                continue;
            }
            if self.is_incompatible(term) {
                return Relation::Contradicted(term.subject().clone());
            }
            if relation != Relation::Satisfied {
                return Relation::Inconclusive;
            }
            relation = Relation::AlmostSatisfied(term.subject().clone());
        }
        relation
    }

    /// The earliest assignment such that the assignments of its subject up to and including it
    /// satisfy `term`.
    pub fn satisfier(&self, term: &Term) -> Option<&Assignment> {
        let mut running: Option<Term> = None;
        let subject = term.subject();
        for assignment in self.assignments.iter().filter(|a| a.term.subject() == subject) {
            let merged = Self::accumulate(running.as_ref(), &assignment.term);
            if term.is_satisfied_by(&merged) {
                return Some(assignment);
            }
            running = Some(merged);
        }
        None
    }

    /// Find the satisfier of a satisfied incompatibility, and the decision level of the
    /// previous satisfier: the earliest assignment before the satisfier such that the
    /// incompatibility is satisfied by the log up to it plus the satisfier.
    ///
    /// Without a previous satisfier, the level is 0.
    pub(crate) fn satisfier_search(&self, incompat: &Incompatibility) -> (&Assignment, DecisionLevel) {
        let mut satisfiers: Vec<(&Term, &Assignment)> = incompat
            .iter()
            .map(|term| {
                let satisfier = self
                    .satisfier(term)
                    .unwrap_or_else(|| panic!("{incompat} must be satisfied, {term} is not"));
                (term, satisfier)
            })
            .collect();
        satisfiers.sort_by_key(|(_, a)| a.index);
        let Some((incompat_term, satisfier)) = satisfiers.pop() else {
            panic!("the empty incompatibility has no satisfier")
        };

        let mut previous = satisfiers.last().map(|(_, a)| a.index);
        // Earlier assignments of the same subject only matter
        // when the satisfier is not enough on its own.
        if !incompat_term.is_satisfied_by(&satisfier.term) {
            let mut running: Option<Term> = None;
            let subject = satisfier.term.subject();
            for assignment in self.assignments[..satisfier.index]
                .iter()
                .filter(|a| a.term.subject() == subject)
            {
                let merged = Self::accumulate(running.as_ref(), &assignment.term);
                let with_satisfier = merged.intersection(&satisfier.term);
                if with_satisfier.map_or(true, |t| incompat_term.is_satisfied_by(&t)) {
                    previous = previous.max(Some(assignment.index));
                    break;
                }
                running = Some(merged);
            }
        }

        let level = previous
            .map(|i| self.assignments[i].decision_level)
            .unwrap_or_default();
        (satisfier, level)
    }

    fn accumulate(running: Option<&Term>, term: &Term) -> Term {
        match running {
            None => term.clone(),
            Some(running) => running
                .intersection(term)
                .unwrap_or_else(|| term.with(VersionSet::new(), true)),
        }
    }

    /// Pick the undecided subject with a positive term that has the highest priority.
    ///
    /// Only subjects whose term changed since the last call are prioritized again,
    /// everything is after a backtrack. Ties are broken by subject order,
    /// so that the result is stable. The subject stays queued until it is decided.
    pub(crate) fn pick_highest_priority_subject(
        &mut self,
        mut prioritizer: impl FnMut(&Subject, &Term) -> Priority,
    ) -> Option<Subject> {
        for subject in std::mem::take(&mut self.outdated) {
            match self.merged.get(&subject) {
                Some(term) if term.is_positive() && !self.decisions.contains_key(&subject) => {
                    let priority = prioritizer(&subject, term);
                    self.prioritized
                        .push(subject.clone(), (priority, Reverse(subject)));
                }
                _ => {
                    self.prioritized.remove(&subject);
                }
            }
        }
        self.prioritized.peek().map(|(subject, _)| subject.clone())
    }

    /// If a partial solution has, for every positive derivation,
    /// a corresponding decision that satisfies that assignment,
    /// it's a total solution and version solving has succeeded.
    pub fn extract_solution(&self) -> Vec<PackageVersion> {
        let mut solution: Vec<PackageVersion> = self
            .decisions
            .values()
            .filter(|v| v.subject != Subject::Root)
            .cloned()
            .collect();
        solution.sort();
        solution
    }
}

impl Display for PartialSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "decision_level: {}", self.decision_level())?;
        for assignment in &self.assignments {
            writeln!(f, "  {assignment}")?;
        }
        Ok(())
    }
}
