// SPDX-License-Identifier: MPL-2.0

//! Core model and functions
//! to write a functional PubGrub algorithm.

use std::ops::Range;
use std::sync::Arc;

use log::{debug, info};

use crate::internal::{
    Arena, DecisionLevel, Id, IncompId, Incompatibility, PartialSolution, Relation,
};
use crate::term::Constraint;
use crate::{Map, PackageVersion, Subject, Term, VersionSet};

/// Current state of the PubGrub algorithm.
#[derive(Clone)]
pub(crate) struct State {
    /// For each subject, the incompatibilities mentioning it, oldest first.
    incompatibilities: Map<Subject, Vec<IncompId>>,

    /// As an optimization, store the ids of incompatibilities that are already contradicted.
    ///
    /// For each one keep track of the decision level when it was found to be contradicted.
    /// These will stay contradicted until we have backtracked beyond its associated decision level.
    contradicted_incompatibilities: Map<IncompId, DecisionLevel>,

    /// Decisions and derivations made so far.
    pub(crate) partial_solution: PartialSolution,

    /// The number of times each subject was part of an incompatibility that caused a backjump.
    pub(crate) conflict_count: Map<Subject, u32>,

    /// The number of conflicts that went through resolution.
    pub(crate) conflicts: u32,

    /// The store is the reference storage for all incompatibilities.
    pub(crate) incompatibility_store: Arena<Incompatibility>,
}

impl State {
    /// Initialization of PubGrub state.
    pub(crate) fn init(root_universe: Arc<VersionSet>) -> Self {
        let mut incompatibility_store = Arena::new();
        let root = incompatibility_store.alloc(Incompatibility::root(root_universe));
        let mut incompatibilities = Map::default();
        incompatibilities.insert(Subject::Root, vec![root]);
        Self {
            incompatibilities,
            contradicted_incompatibilities: Map::default(),
            partial_solution: PartialSolution::empty(),
            conflict_count: Map::default(),
            conflicts: 0,
            incompatibility_store,
        }
    }

    /// Add an incompatibility to the state.
    pub(crate) fn add_incompatibility(&mut self, incompat: Incompatibility) -> IncompId {
        let id = self.incompatibility_store.alloc(incompat);
        self.merge_incompatibility(id);
        id
    }

    /// Add the incompatibilities of a version's dependencies to the state.
    pub(crate) fn add_incompatibilities(
        &mut self,
        incompats: Vec<Incompatibility>,
    ) -> Range<IncompId> {
        let range = self.incompatibility_store.alloc_iter(incompats.into_iter());
        for id in Id::range_to_iter(range.clone()) {
            self.merge_incompatibility(id);
        }
        range
    }

    /// Decide `version` unless one of its freshly added dependency incompatibilities
    /// would be satisfied right away.
    ///
    /// Returns whether the decision was taken.
    pub(crate) fn decide_if_compatible(
        &mut self,
        version: PackageVersion,
        universe: Arc<VersionSet>,
        new_incompatibilities: Range<IncompId>,
    ) -> bool {
        let decision = Term::exact(version, universe);
        let subject = decision.subject().clone();
        let conflicting = Id::range_to_iter(new_incompatibilities).find(|&id| {
            self.incompatibility_store[id].relation(|s| {
                if s == &subject {
                    Some(&decision)
                } else {
                    self.partial_solution.term_intersection_for(s)
                }
            }) == Relation::Satisfied
        });
        match conflicting {
            Some(id) => {
                info!(
                    "not adding {decision} because of its dependencies: {}",
                    self.incompatibility_store[id]
                );
                false
            }
            None => {
                info!("add_decision: {decision}");
                self.partial_solution.decide(decision);
                true
            }
        }
    }

    /// Unit propagation is the core mechanism of the solving algorithm.
    /// CF <https://github.com/dart-lang/pub/blob/master/doc/solver.md#unit-propagation>
    ///
    /// On failure, returns the id of the empty incompatibility that was derived.
    pub(crate) fn unit_propagation(&mut self, subject: Subject) -> Result<(), IncompId> {
        let mut buffer: Vec<Subject> = vec![subject];
        while let Some(current) = buffer.pop() {
            let mut conflict_id = None;
            let ids = self.incompatibilities.get(&current).cloned().unwrap_or_default();
            // Iterate in reverse order to evaluate newer incompatibilities first.
            for &incompat_id in ids.iter().rev() {
                if self.contradicted_incompatibilities.contains_key(&incompat_id) {
                    continue;
                }
                let incompat = &self.incompatibility_store[incompat_id];
                match self.partial_solution.relation(incompat) {
                    // If the partial solution satisfies the incompatibility
                    // we must perform conflict resolution.
                    Relation::Satisfied => {
                        debug!("Start conflict resolution because incompat satisfied:\n   {incompat}");
                        conflict_id = Some(incompat_id);
                        break;
                    }
                    Relation::AlmostSatisfied(unsatisfied) => {
                        let Some(term) = incompat.get(&unsatisfied).map(|t| t.inverse()) else {
                            continue;
                        };
                        if !buffer.contains(&unsatisfied) {
                            buffer.push(unsatisfied);
                        }
                        self.partial_solution.derive(term, incompat_id);
                        // With the partial solution updated, the incompatibility is now contradicted.
                        self.contradicted_incompatibilities
                            .insert(incompat_id, self.partial_solution.decision_level());
                    }
                    Relation::Contradicted(_) => {
                        self.contradicted_incompatibilities
                            .insert(incompat_id, self.partial_solution.decision_level());
                    }
                    Relation::Inconclusive => {}
                }
            }
            if let Some(incompat_id) = conflict_id {
                let (subject, root_cause) = self.conflict_resolution(incompat_id)?;
                // Conflict resolution backtracked, the learned incompatibility is now almost satisfied
                // and everything in the buffer may have been undone.
                buffer.clear();
                if let Some(term) = self.incompatibility_store[root_cause]
                    .get(&subject)
                    .map(|t| t.inverse())
                {
                    self.partial_solution.derive(term, root_cause);
                }
                // After conflict resolution and the partial solution update,
                // the root cause incompatibility is now contradicted.
                self.contradicted_incompatibilities
                    .insert(root_cause, self.partial_solution.decision_level());
                buffer.push(subject);
            }
        }
        // If there are no more changed subjects, unit propagation is done.
        Ok(())
    }

    /// Return the root cause or the terminal incompatibility.
    /// CF <https://github.com/dart-lang/pub/blob/master/doc/solver.md#unit-propagation>
    fn conflict_resolution(&mut self, incompatibility: IncompId) -> Result<(Subject, IncompId), IncompId> {
        self.conflicts += 1;
        let mut current = incompatibility;
        let mut current_changed = false;
        loop {
            if self.incompatibility_store[current].is_failure() {
                return Err(current);
            }
            let (subject, satisfier_cause, satisfier_level, previous_level) = {
                let (satisfier, previous_level) = self
                    .partial_solution
                    .satisfier_search(&self.incompatibility_store[current]);
                (
                    satisfier.term.subject().clone(),
                    satisfier.cause,
                    satisfier.decision_level,
                    previous_level,
                )
            };
            match satisfier_cause {
                Some(cause) if previous_level == satisfier_level => {
                    let prior_cause =
                        Incompatibility::prior_cause(current, cause, &subject, &self.incompatibility_store);
                    info!("prior cause: {prior_cause}");
                    current = self.incompatibility_store.alloc(prior_cause);
                    current_changed = true;
                }
                // Either the satisfier is a decision, or the incompatibility
                // was already almost satisfied at an earlier level.
                _ => {
                    for term in self.incompatibility_store[current].iter() {
                        *self.conflict_count.entry(term.subject().clone()).or_default() += 1;
                    }
                    self.backtrack(current, current_changed, previous_level);
                    info!("backtrack to {previous_level} because of {}", self.incompatibility_store[current]);
                    return Ok((subject, current));
                }
            }
        }
    }

    /// Backtracking.
    fn backtrack(&mut self, incompat: IncompId, incompat_changed: bool, level: DecisionLevel) {
        self.partial_solution.backtrack(level);
        // Remove contradicted incompatibilities that depend on decisions we just backtracked away.
        self.contradicted_incompatibilities.retain(|_, dl| *dl <= level);
        if incompat_changed {
            self.merge_incompatibility(incompat);
        }
    }

    /// Index the incompatibility under every subject it mentions.
    fn merge_incompatibility(&mut self, id: IncompId) {
        for term in self.incompatibility_store[id].iter() {
            self.incompatibilities
                .entry(term.subject().clone())
                .or_default()
                .push(id);
        }
    }
}
