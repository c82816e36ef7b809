// SPDX-License-Identifier: MPL-2.0

//! The interface between the resolver and an ecosystem's package data.

use std::cell::RefCell;
use std::hash::Hash;

use log::debug;

use crate::{DependencyCandidates, GraphError, Map, PackageVersion, Requirements, Subject, VersionSet};

/// Trait that allows the resolver to retrieve available versions and their dependencies.
///
/// A backend answers in terms of candidate sets: the concrete versions
/// that match a requirement, not the requirement itself.
/// This keeps the solver independent of any particular version syntax.
///
/// Data gaps, such as a missing package or a requirement that no version satisfies,
/// are reported with [GraphError::PackageNotFound] and [GraphError::VersionNotFound].
/// The resolver folds those into the search.
/// Any other error aborts it.
pub trait Graph {
    /// Every version of a subject that exists, in ascending order.
    fn fetch_all_versions_for(&self, subject: &Subject) -> Result<VersionSet, GraphError>;

    /// For each dependency of `version`, the versions that satisfy it.
    ///
    /// Every candidate set must be a non-empty subset of what
    /// [fetch_all_versions_for](Graph::fetch_all_versions_for) returns for its subject.
    fn fetch_dependencies_for(
        &self,
        version: &PackageVersion,
    ) -> Result<DependencyCandidates, GraphError>;

    /// Like [fetch_dependencies_for](Graph::fetch_dependencies_for),
    /// for the requirements the solve starts from.
    fn dependencies_for_root(
        &self,
        requirements: &Requirements,
    ) -> Result<DependencyCandidates, GraphError>;
}

impl<G: Graph + ?Sized> Graph for &G {
    fn fetch_all_versions_for(&self, subject: &Subject) -> Result<VersionSet, GraphError> {
        (**self).fetch_all_versions_for(subject)
    }

    fn fetch_dependencies_for(
        &self,
        version: &PackageVersion,
    ) -> Result<DependencyCandidates, GraphError> {
        (**self).fetch_dependencies_for(version)
    }

    fn dependencies_for_root(
        &self,
        requirements: &Requirements,
    ) -> Result<DependencyCandidates, GraphError> {
        (**self).dependencies_for_root(requirements)
    }
}

type Cache<K, T> = RefCell<Map<K, Result<T, GraphError>>>;

/// A [Graph] that remembers every answer of the graph it wraps.
///
/// Answers are kept until [invalidate](CachedGraph::invalidate) is called,
/// so that a backend is queried at most once per question during a solve.
/// Data gaps are remembered like successful answers,
/// [GraphError::Backend] failures are not.
#[derive(Debug)]
pub struct CachedGraph<G> {
    inner: G,
    versions: Cache<Subject, VersionSet>,
    dependencies: Cache<PackageVersion, DependencyCandidates>,
    roots: Cache<Requirements, DependencyCandidates>,
}

impl<G: Graph> CachedGraph<G> {
    /// Wrap a graph with empty caches.
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            versions: RefCell::default(),
            dependencies: RefCell::default(),
            roots: RefCell::default(),
        }
    }

    /// The wrapped graph.
    pub fn inner(&self) -> &G {
        &self.inner
    }

    /// Unwrap the graph, dropping the caches.
    pub fn into_inner(self) -> G {
        self.inner
    }

    /// Forget every remembered answer.
    pub fn invalidate(&self) {
        debug!("invalidating graph caches");
        self.versions.borrow_mut().clear();
        self.dependencies.borrow_mut().clear();
        self.roots.borrow_mut().clear();
    }
}

fn memoized<K: Hash + Eq + Clone, T: Clone>(
    cache: &Cache<K, T>,
    key: &K,
    fetch: impl FnOnce() -> Result<T, GraphError>,
) -> Result<T, GraphError> {
    if let Some(answer) = cache.borrow().get(key) {
        match answer {
            Ok(value) => return Ok(value.clone()),
            Err(err) => {
                if let Some(err) = err.try_clone() {
                    return Err(err);
                }
            }
        }
    }
    let answer = fetch();
    let remembered = match &answer {
        Ok(value) => Some(Ok(value.clone())),
        Err(err) => err.try_clone().map(Err),
    };
    if let Some(remembered) = remembered {
        cache.borrow_mut().insert(key.clone(), remembered);
    }
    answer
}

impl<G: Graph> Graph for CachedGraph<G> {
    fn fetch_all_versions_for(&self, subject: &Subject) -> Result<VersionSet, GraphError> {
        memoized(&self.versions, subject, || self.inner.fetch_all_versions_for(subject))
    }

    fn fetch_dependencies_for(
        &self,
        version: &PackageVersion,
    ) -> Result<DependencyCandidates, GraphError> {
        memoized(&self.dependencies, version, || {
            self.inner.fetch_dependencies_for(version)
        })
    }

    fn dependencies_for_root(
        &self,
        requirements: &Requirements,
    ) -> Result<DependencyCandidates, GraphError> {
        memoized(&self.roots, requirements, || {
            self.inner.dependencies_for_root(requirements)
        })
    }
}
