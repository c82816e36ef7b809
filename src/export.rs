// SPDX-License-Identifier: MPL-2.0

//! Export of what a solve explored, for visualization,
//! and of the dependency graph of the solution alone.
//!
//! Every list is sorted so that exports of the same solve are identical.

use std::collections::{BTreeMap, BTreeSet};

use crate::{DependencyCandidates, PackageVersion, Subject, Version};

/// One package version that the search looked at.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    /// Unique identifier, `name@version` (or `root`).
    pub id: String,
    /// The subject the version belongs to.
    pub subject: Subject,
    /// The version.
    pub version: Version,
    /// Whether the version is part of the solution.
    pub selected: bool,
}

/// The nodes of one subject.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Group {
    /// The subject, as displayed.
    pub id: String,
    /// Node identifiers, in version order.
    pub nodes: Vec<String>,
}

/// `from` depends on `to`: `to` was one of the candidates for a dependency of `from`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Edge {
    /// Identifier of the depending node.
    pub from: String,
    /// Identifier of the node depended upon.
    pub to: String,
}

/// The explored part of the dependency graph, grouped by subject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Visualization {
    /// Every visible version, sorted.
    pub nodes: Vec<Node>,
    /// One group per subject, sorted.
    pub groups: Vec<Group>,
    /// Dependency edges between visible versions, sorted and deduplicated.
    pub edges: Vec<Edge>,
}

impl Visualization {
    /// Versions are visible if their dependencies were fetched or if they were selected.
    /// Edges only link visible versions.
    pub(crate) fn new(
        explored: &BTreeMap<PackageVersion, DependencyCandidates>,
        solution: &[PackageVersion],
    ) -> Self {
        let selected: BTreeSet<&PackageVersion> = solution.iter().collect();
        let visible: BTreeSet<&PackageVersion> = explored.keys().chain(solution).collect();

        let nodes: Vec<Node> = visible
            .iter()
            .map(|version| Node {
                id: version.to_string(),
                subject: version.subject.clone(),
                version: version.version.clone(),
                selected: selected.contains(version) || version.subject == Subject::Root,
            })
            .collect();

        let mut groups: BTreeMap<&Subject, Vec<String>> = BTreeMap::new();
        for version in &visible {
            groups
                .entry(&version.subject)
                .or_default()
                .push(version.to_string());
        }
        let groups = groups
            .into_iter()
            .map(|(subject, nodes)| Group {
                id: subject.to_string(),
                nodes,
            })
            .collect();

        let visible = &visible;
        let edges: BTreeSet<Edge> = explored
            .iter()
            .flat_map(|(from, dependencies)| {
                dependencies
                    .values()
                    .flatten()
                    .filter(move |to| visible.contains(to))
                    .map(move |to| Edge {
                        from: from.to_string(),
                        to: to.to_string(),
                    })
            })
            .collect();

        Self {
            nodes,
            groups,
            edges: edges.into_iter().collect(),
        }
    }
}

/// A "depends on" relation between two selected versions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Dependency {
    /// The depending release.
    pub from: PackageVersion,
    /// The release it depends on.
    pub to: PackageVersion,
}

/// The solution and the dependencies between its releases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Summary {
    /// Selected versions, sorted.
    pub releases: Vec<PackageVersion>,
    /// Dependencies between selected versions, sorted.
    pub dependencies: Vec<Dependency>,
}

impl Summary {
    pub(crate) fn new(
        explored: &BTreeMap<PackageVersion, DependencyCandidates>,
        solution: &[PackageVersion],
    ) -> Self {
        let selected: BTreeMap<&Subject, &PackageVersion> =
            solution.iter().map(|v| (&v.subject, v)).collect();
        let selected = &selected;
        let mut dependencies: Vec<Dependency> = solution
            .iter()
            .filter_map(|from| explored.get(from).map(|deps| (from, deps)))
            .flat_map(|(from, deps)| {
                deps.iter().filter_map(move |(subject, candidates)| {
                    let to = selected.get(subject)?;
                    candidates.contains(*to).then(|| Dependency {
                        from: from.clone(),
                        to: (*to).clone(),
                    })
                })
            })
            .collect();
        dependencies.sort();
        Self {
            releases: solution.to_vec(),
            dependencies,
        }
    }
}
