// SPDX-License-Identifier: MPL-2.0

//! vsolve: PubGrub-style version solving.
//!
//! Version solving consists in efficiently finding a set of packages and versions
//! that satisfy all the constraints of a given set of root requirements.
//! When that is not possible, the solver explains why
//! in a human-readable report.
//!
//! # Model
//!
//! Everything the solver reasons about is a [Subject]: a package, but also
//! the target platform or the interpreter version, which are chosen exactly like packages.
//! Each subject has a finite universe of [PackageVersion]s, listed by a [Graph].
//! A [Term] is a positive or negative statement about the version selected for one subject,
//! and an [Incompatibility] is a set of terms that must never all hold.
//!
//! # Basic example
//!
//! Let's imagine that we are building a user interface
//! with a menu containing dropdowns with some icons,
//! icons that we are also directly using in other parts of the interface.
//! For this scenario our direct dependencies are `menu` and `icons`,
//! but the complete set of dependencies looks like follows:
//!
//! - `menu` depends on `dropdown`
//! - `dropdown` depends on `icons`
//! - `icons` has no dependency
//!
//! We can model that scenario with this library as follows
//! ```
//! # use vsolve::{InMemoryGraph, Ranges, Requirements, Resolver, Subject};
//! let mut graph = InMemoryGraph::new();
//! graph.add_dependencies("menu", (1, 0, 0), [("dropdown", Ranges::full())]);
//! graph.add_dependencies("dropdown", (1, 0, 0), [("icons", Ranges::full())]);
//! graph.add_dependencies("icons", (1, 0, 0), Vec::<(Subject, _)>::new());
//!
//! let requirements = Requirements::from([
//!     (Subject::package("menu"), "*".to_string()),
//!     (Subject::package("icons"), ">=1.0.0".to_string()),
//! ]);
//! let mut resolver = Resolver::new(requirements, graph);
//! resolver.run().unwrap();
//! assert_eq!(resolver.result().len(), 3);
//! ```
//!
//! # Graph trait
//!
//! [InMemoryGraph] keeps the whole ecosystem in memory.
//! Other sources of package data implement the [Graph] trait,
//! which answers with candidate sets rather than version requirements:
//!
//! ```
//! # use vsolve::{DependencyCandidates, GraphError, PackageVersion, Requirements, Subject, VersionSet};
//! # trait Graph {
//! fn fetch_all_versions_for(&self, subject: &Subject) -> Result<VersionSet, GraphError>;
//!
//! fn fetch_dependencies_for(
//!     &self,
//!     version: &PackageVersion,
//! ) -> Result<DependencyCandidates, GraphError>;
//!
//! fn dependencies_for_root(
//!     &self,
//!     requirements: &Requirements,
//! ) -> Result<DependencyCandidates, GraphError>;
//! # }
//! ```
//!
//! Wrap a graph in a [CachedGraph] when its answers are costly to obtain.
//! Which version is tried first is decided by [Preferences].
//!
//! # Solution and error reporting
//!
//! When everything goes well, [Resolver::result] lists the selected versions.
//! When there is no solution, [Resolver::report] builds an explanation
//! such as
//! ```txt
//! Because dropdown depends on icons >=2.0.0 and root depends on icons <=1.0.0, dropdown is forbidden.
//! So, because root depends on menu and menu depends on dropdown, version solving failed.
//! ```
//!
//! Errors of the graph other than data gaps abort the search with a [SolveError].
//!
//! # Logging
//!
//! The solver logs through the [log] facade: propagation, decisions,
//! conflicts and backtracking at the info level, partial solutions at the debug level.

#![warn(missing_docs)]

mod error;
mod export;
mod graph;
mod internal;
mod package;
mod preferences;
mod provider;
mod report;
mod solver;
mod term;
mod type_aliases;
mod version;

pub use error::{GraphError, MismatchedSubjects, SolveError};
pub use export::{Dependency, Edge, Group, Node, Summary, Visualization};
pub use graph::{CachedGraph, Graph};
pub use internal::{Cause, Id, IncompId, Incompatibility};
pub use package::{PackageVersion, Subject};
pub use preferences::{Preferences, SoftRequirement};
pub use provider::{DependencyConstraints, InMemoryGraph};
pub use solver::{Resolver, Statistics};
pub use term::{
    Constraint, PlatformConstraint, PythonInterpreterConstraint, Relation, RootConstraint, Term,
    VersionConstraint,
};
pub use type_aliases::{DependencyCandidates, Map, Requirements, Set, VersionSet};
pub use version::{format_requirement, parse_requirement, Version, VersionParseError};
pub use version_ranges::Ranges;
