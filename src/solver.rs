// SPDX-License-Identifier: MPL-2.0

//! PubGrub version solving algorithm.
//!
//! It consists in efficiently finding a set of packages and versions
//! that satisfy all the constraints of a given project dependencies.
//! In addition, when that is not possible,
//! PubGrub tries to provide a very human-readable and clear
//! explanation as to why that failed.
//!
//! ## API
//!
//! ```
//! # use vsolve::{InMemoryGraph, Ranges, Requirements, Resolver, SolveError, Subject};
//! #
//! # fn try_main() -> Result<(), SolveError> {
//! let mut graph = InMemoryGraph::new();
//! graph.add_dependencies("a", (1, 0, 0), [("b", Ranges::full())]);
//! graph.add_dependencies("b", (1, 0, 0), Vec::<(Subject, _)>::new());
//!
//! let requirements = Requirements::from([(Subject::package("a"), ">=1.0".to_string())]);
//! let mut resolver = Resolver::new(requirements, graph);
//! resolver.run()?;
//! assert_eq!(resolver.result().len(), 2);
//! #     Ok(())
//! # }
//! # fn main() { try_main().unwrap() }
//! ```
//!
//! Where the graph supplies the list of available versions,
//! as well as the dependencies of every version
//! by implementing the [Graph] trait.
//! If there is no solution, [Resolver::report] explains why as clearly as possible.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info};

use crate::export::{Summary, Visualization};
use crate::internal::{Arena, IncompId, Incompatibility, State};
use crate::report::Report;
use crate::term::Constraint;
use crate::{
    DependencyCandidates, Graph, GraphError, Map, PackageVersion, Preferences, Requirements, Set,
    SolveError, Subject, Term, VersionSet,
};

/// Solves the dependencies of a set of root requirements over a [Graph].
///
/// [run](Resolver::run) performs the search,
/// [result](Resolver::result) and [report](Resolver::report) read its outcome.
#[derive(Debug)]
pub struct Resolver<G> {
    requirements: Requirements,
    graph: G,
    preferences: Preferences,
    outcome: Option<Outcome>,
}

/// Some statistics about how much trouble the resolver had.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statistics {
    /// How many times the search resumed deciding after a backtrack.
    pub attempted_solutions: u32,
    /// Number of decisions taken, including those later undone.
    pub decisions: u32,
    /// Number of conflicts that went through conflict resolution.
    pub conflicts: u32,
    /// Number of incompatibilities known at the end, learned ones included.
    pub incompatibilities: usize,
    /// The number of times each subject was involved in a conflict that caused a backjump.
    pub conflict_counts: BTreeMap<Subject, u32>,
}

#[derive(Debug)]
struct Outcome {
    solution: Vec<PackageVersion>,
    failure: Option<(Arena<Incompatibility>, IncompId)>,
    statistics: Statistics,
    /// Every version whose dependencies were fetched, with those dependencies.
    explored: BTreeMap<PackageVersion, DependencyCandidates>,
}

impl<G: Graph> Resolver<G> {
    /// A resolver for `requirements`, taking the highest allowed version of everything.
    pub fn new(requirements: Requirements, graph: G) -> Self {
        Self {
            requirements,
            graph,
            preferences: Preferences::default(),
            outcome: None,
        }
    }

    /// Choose versions according to `preferences` instead.
    pub fn with_preferences(mut self, preferences: Preferences) -> Self {
        self.preferences = preferences;
        self
    }

    /// The graph this resolver queries.
    pub fn graph(&self) -> &G {
        &self.graph
    }

    /// Finds a set of versions satisfying the root requirements.
    ///
    /// Having no solution is not an error: the result is then empty
    /// and [report](Resolver::report) tells why.
    /// Calling it again starts a new search from scratch.
    #[cold]
    pub fn run(&mut self) -> Result<(), SolveError> {
        self.outcome = None;
        let search = Search {
            graph: &self.graph,
            preferences: &self.preferences,
            requirements: &self.requirements,
            universes: Map::default(),
            explored: BTreeMap::new(),
            decisions: 0,
        };
        self.outcome = Some(search.solve()?);
        Ok(())
    }

    /// The selected versions, sorted, without the root.
    ///
    /// Empty until [run](Resolver::run) has completed, and when there is no solution.
    pub fn result(&self) -> &[PackageVersion] {
        self.outcome
            .as_ref()
            .map(|outcome| outcome.solution.as_slice())
            .unwrap_or_default()
    }

    /// Whether the last run found a solution.
    pub fn is_solved(&self) -> bool {
        self.outcome
            .as_ref()
            .is_some_and(|outcome| outcome.failure.is_none())
    }

    /// The root of the derivation of the failure, if the last run found no solution.
    pub fn failure(&self) -> Option<&Incompatibility> {
        let (store, id) = self.outcome.as_ref()?.failure.as_ref()?;
        Some(&store[*id])
    }

    /// A human-readable explanation of why the last run found no solution.
    pub fn report(&self) -> Option<String> {
        let (store, id) = self.outcome.as_ref()?.failure.as_ref()?;
        Some(Report::render(store, *id))
    }

    /// How much trouble the last run had.
    pub fn statistics(&self) -> Option<&Statistics> {
        self.outcome.as_ref().map(|outcome| &outcome.statistics)
    }

    /// The part of the graph the last run explored, for visualization.
    pub fn visualization(&self) -> Option<Visualization> {
        let outcome = self.outcome.as_ref()?;
        Some(Visualization::new(&outcome.explored, &outcome.solution))
    }

    /// The solution of the last run and the dependencies between its releases.
    pub fn summary(&self) -> Option<Summary> {
        let outcome = self.outcome.as_ref()?;
        Some(Summary::new(&outcome.explored, &outcome.solution))
    }
}

/// Everything one run needs besides the [State].
struct Search<'a, G> {
    graph: &'a G,
    preferences: &'a Preferences,
    requirements: &'a Requirements,
    /// Every version of each subject met so far.
    universes: Map<Subject, Arc<VersionSet>>,
    explored: BTreeMap<PackageVersion, DependencyCandidates>,
    decisions: u32,
}

/// Incompatibilities for the dependencies of a version,
/// or the reason the version cannot be used at all.
type Materialized = Result<Vec<Incompatibility>, Incompatibility>;

impl<G: Graph> Search<'_, G> {
    fn solve(mut self) -> Result<Outcome, SolveError> {
        let root_universe = Arc::new(VersionSet::from([PackageVersion::root()]));
        self.universes.insert(Subject::Root, root_universe.clone());
        let mut state = State::init(root_universe);
        let mut added_dependencies: Set<PackageVersion> = Set::default();
        let mut next = Subject::Root;
        loop {
            info!("unit_propagation: {next}");
            if let Err(failure) = state.unit_propagation(next) {
                info!("version solving failed");
                return Ok(self.finish(state, Some(failure)));
            }

            debug!(
                "Partial solution after unit propagation: {}",
                state.partial_solution
            );

            let Some(highest_priority_subject) =
                state.partial_solution.pick_highest_priority_subject(|s, term| {
                    let conflicts = state.conflict_count.get(s).copied().unwrap_or_default();
                    (conflicts, Reverse(term.versions().len()))
                })
            else {
                info!("version solving succeeded");
                return Ok(self.finish(state, None));
            };
            next = highest_priority_subject;

            let term_intersection = state
                .partial_solution
                .term_intersection_for(&next)
                .ok_or_else(|| {
                    SolveError::Failure("a subject was chosen but we don't have a term.".into())
                })?;
            let version = self
                .preferences
                .choose(&next, term_intersection.versions(), |s| {
                    state.partial_solution.is_decided(s)
                })
                .cloned()
                .ok_or_else(|| SolveError::Failure(format!("no version of {next} is allowed")))?;

            if !term_intersection.contains(&version) {
                return Err(SolveError::Failure(
                    "preferences picked an incompatible version".into(),
                ));
            }
            let universe = term_intersection.all_versions().clone();
            info!("chose {version}");

            if added_dependencies.insert(version.clone()) {
                match self.dependencies_of(&version, &universe)? {
                    Err(unavailable) => {
                        state.add_incompatibility(unavailable);
                    }
                    Ok(incompats) => {
                        let dep_incompats = state.add_incompatibilities(incompats);
                        if state.decide_if_compatible(version, universe, dep_incompats) {
                            self.decisions += 1;
                        }
                    }
                }
            } else {
                // The dependency incompatibilities are already known and not satisfied,
                // we can add the decision directly.
                info!("add_decision (not first time): {version}");
                state.partial_solution.decide(Term::exact(version, universe));
                self.decisions += 1;
            }
        }
    }

    /// Fetch the dependencies of `version` and turn them into incompatibilities.
    ///
    /// Data gaps in the graph make the version unavailable, other graph errors abort the search.
    fn dependencies_of(
        &mut self,
        version: &PackageVersion,
        universe: &Arc<VersionSet>,
    ) -> Result<Materialized, SolveError> {
        let unavailable = |err: GraphError| -> Result<Materialized, SolveError> {
            if !err.is_not_found() {
                return Err(err.into());
            }
            info!("{version} is unavailable: {err}");
            Ok(Err(Incompatibility::unavailable(
                version.clone(),
                universe.clone(),
                err.to_string(),
            )))
        };

        let fetched = match version.subject {
            Subject::Root => self.graph.dependencies_for_root(self.requirements),
            _ => self.graph.fetch_dependencies_for(version),
        };
        let dependencies = match fetched {
            Ok(dependencies) => dependencies,
            Err(err) => return unavailable(err),
        };

        let depender = Term::exact(version.clone(), universe.clone());
        let mut incompats = Vec::with_capacity(dependencies.len());
        for (subject, candidates) in &dependencies {
            let dependency_universe = match self.universe(subject) {
                Ok(dependency_universe) => dependency_universe,
                Err(err) => return unavailable(err),
            };
            debug_assert!(candidates.is_subset(&dependency_universe));
            let dependency = Term::exclude(subject.clone(), candidates.clone(), dependency_universe);
            incompats.extend(Incompatibility::from_dependency(
                depender.clone(),
                dependency,
            ));
        }
        self.explored.insert(version.clone(), dependencies);
        Ok(Ok(incompats))
    }

    /// Every version of `subject`, fetched once per run.
    fn universe(&mut self, subject: &Subject) -> Result<Arc<VersionSet>, GraphError> {
        if let Some(universe) = self.universes.get(subject) {
            return Ok(universe.clone());
        }
        let universe = Arc::new(self.graph.fetch_all_versions_for(subject)?);
        self.universes.insert(subject.clone(), universe.clone());
        Ok(universe)
    }

    fn finish(self, state: State, failure: Option<IncompId>) -> Outcome {
        let statistics = Statistics {
            attempted_solutions: state.partial_solution.attempted_solutions(),
            decisions: self.decisions,
            conflicts: state.conflicts,
            incompatibilities: state.incompatibility_store.len(),
            conflict_counts: state.conflict_count.into_iter().collect(),
        };
        let (solution, failure) = match failure {
            None => (state.partial_solution.extract_solution(), None),
            Some(id) => (Vec::new(), Some((state.incompatibility_store, id))),
        };
        Outcome {
            solution,
            failure,
            statistics,
            explored: self.explored,
        }
    }
}
