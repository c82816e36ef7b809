// SPDX-License-Identifier: MPL-2.0

//! A [Graph] holding the whole ecosystem in memory.

use std::collections::BTreeMap;

use version_ranges::Ranges;

use crate::version::{format_requirement, parse_requirement};
use crate::{
    DependencyCandidates, Graph, GraphError, PackageVersion, Requirements, Subject, Version,
    VersionSet,
};

/// Requirements declared by one package version, keyed by the constrained subject.
pub type DependencyConstraints = BTreeMap<Subject, Ranges<Version>>;

type Packages = BTreeMap<String, BTreeMap<Version, DependencyConstraints>>;

/// A basic implementation of [Graph].
///
/// Packages, platforms and interpreter versions are registered up front.
/// Requirements are stored as [Ranges] and resolved to candidate sets on demand.
/// Root requirements use the syntax of [parse_requirement].
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InMemoryGraph {
    #[cfg_attr(feature = "serde", serde(with = "serde_packages"))]
    packages: Packages,
    platforms: VersionSet,
    interpreters: VersionSet,
}

impl InMemoryGraph {
    /// Creates an empty InMemoryGraph with no packages.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the dependencies of a package and version pair.
    /// Dependencies must be added with a single call to
    /// [add_dependencies](InMemoryGraph::add_dependencies).
    /// All subsequent calls to
    /// [add_dependencies](InMemoryGraph::add_dependencies) for a given
    /// package version pair will replace the dependencies by the new ones.
    ///
    /// Dependencies may also constrain [Subject::Platform] or [Subject::PythonInterpreter].
    pub fn add_dependencies<S: Into<Subject>, I: IntoIterator<Item = (S, Ranges<Version>)>>(
        &mut self,
        package: impl Into<String>,
        version: impl Into<Version>,
        dependencies: I,
    ) {
        let package_deps = dependencies
            .into_iter()
            .map(|(subject, range)| (subject.into(), range))
            .collect();
        *self
            .packages
            .entry(package.into())
            .or_default()
            .entry(version.into())
            .or_default() = package_deps;
    }

    /// Registers a platform the solution may target.
    pub fn add_platform(&mut self, version: impl Into<Version>) {
        self.platforms
            .insert(PackageVersion::new(Subject::Platform, version));
    }

    /// Registers an interpreter version the solution may run with.
    pub fn add_python_interpreter(&mut self, version: impl Into<Version>) {
        self.interpreters
            .insert(PackageVersion::new(Subject::PythonInterpreter, version));
    }

    /// Lists packages that have been saved.
    pub fn packages(&self) -> impl Iterator<Item = &String> {
        self.packages.keys()
    }

    /// Lists versions of saved packages in sorted order.
    /// Returns [None] if no information is available regarding that package.
    pub fn versions(&self, package: &str) -> Option<impl Iterator<Item = &Version>> {
        self.packages.get(package).map(|k| k.keys())
    }

    /// Every version of `subject` matching `range`,
    /// or [GraphError::VersionNotFound] on behalf of `depender` if there is none.
    fn candidates(
        &self,
        depender: &PackageVersion,
        subject: &Subject,
        range: &Ranges<Version>,
    ) -> Result<VersionSet, GraphError> {
        let available = self.fetch_all_versions_for(subject)?;
        let candidates: VersionSet = available
            .iter()
            .filter(|v| range.contains(&v.version))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Err(GraphError::VersionNotFound {
                package_version: depender.clone(),
                dependency: subject.clone(),
                requirement: format_requirement(range),
                available: available.into_iter().collect(),
            });
        }
        Ok(candidates)
    }
}

/// Declared requirements are written in the syntax of [parse_requirement].
#[cfg(feature = "serde")]
mod serde_packages {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use version_ranges::Ranges;

    use super::Packages;
    use crate::{Subject, Version};

    #[derive(Serialize, Deserialize)]
    #[serde(transparent)]
    struct Requirement(#[serde(with = "crate::version::serde_requirement")] Ranges<Version>);

    type Written = BTreeMap<String, BTreeMap<Version, BTreeMap<Subject, Requirement>>>;

    pub(super) fn serialize<S: Serializer>(
        packages: &Packages,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let written: Written = packages
            .iter()
            .map(|(name, versions)| {
                let versions = versions
                    .iter()
                    .map(|(version, dependencies)| {
                        let dependencies = dependencies
                            .iter()
                            .map(|(subject, range)| (subject.clone(), Requirement(range.clone())))
                            .collect();
                        (version.clone(), dependencies)
                    })
                    .collect();
                (name.clone(), versions)
            })
            .collect();
        written.serialize(serializer)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Packages, D::Error> {
        let written = Written::deserialize(deserializer)?;
        Ok(written
            .into_iter()
            .map(|(name, versions)| {
                let versions = versions
                    .into_iter()
                    .map(|(version, dependencies)| {
                        let dependencies = dependencies
                            .into_iter()
                            .map(|(subject, Requirement(range))| (subject, range))
                            .collect();
                        (version, dependencies)
                    })
                    .collect();
                (name, versions)
            })
            .collect())
    }
}

impl Graph for InMemoryGraph {
    fn fetch_all_versions_for(&self, subject: &Subject) -> Result<VersionSet, GraphError> {
        let not_found = || GraphError::PackageNotFound {
            package: subject.clone(),
        };
        let versions = match subject {
            Subject::Root => VersionSet::from([PackageVersion::root()]),
            Subject::Package(name) => self
                .packages
                .get(name)
                .ok_or_else(not_found)?
                .keys()
                .map(|v| PackageVersion::new(subject.clone(), v.clone()))
                .collect(),
            Subject::Platform => self.platforms.clone(),
            Subject::PythonInterpreter => self.interpreters.clone(),
        };
        if versions.is_empty() {
            return Err(not_found());
        }
        Ok(versions)
    }

    fn fetch_dependencies_for(
        &self,
        version: &PackageVersion,
    ) -> Result<DependencyCandidates, GraphError> {
        let Subject::Package(name) = &version.subject else {
            // Platforms, interpreters and the root have no dependencies of their own.
            return Ok(DependencyCandidates::new());
        };
        let constraints = self
            .packages
            .get(name)
            .and_then(|versions| versions.get(&version.version))
            .ok_or_else(|| GraphError::PackageNotFound {
                package: version.subject.clone(),
            })?;
        let mut dependencies = DependencyCandidates::new();
        for (subject, range) in constraints {
            let candidates = self.candidates(version, subject, range)?;
            dependencies.insert(subject.clone(), candidates);
        }
        Ok(dependencies)
    }

    fn dependencies_for_root(
        &self,
        requirements: &Requirements,
    ) -> Result<DependencyCandidates, GraphError> {
        let root = PackageVersion::root();
        let mut dependencies = DependencyCandidates::new();
        for (subject, requirement) in requirements {
            let range = parse_requirement(requirement).map_err(|err| {
                GraphError::InvalidRequirements {
                    subject: subject.clone(),
                    requirement: requirement.clone(),
                    reason: err.to_string(),
                }
            })?;
            let candidates = self.candidates(&root, subject, &range)?;
            dependencies.insert(subject.clone(), candidates);
        }
        Ok(dependencies)
    }
}
