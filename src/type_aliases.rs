// SPDX-License-Identifier: MPL-2.0

//! Publicly exported type aliases.

use std::collections::BTreeSet;

use crate::PackageVersion;

/// Map implementation used by the library.
pub type Map<K, V> = rustc_hash::FxHashMap<K, V>;

/// Set implementation used by the library.
pub type Set<V> = rustc_hash::FxHashSet<V>;

/// An ordered set of package versions.
///
/// Terms, graph answers and universes are all expressed with this type,
/// so iteration order is always the version order.
pub type VersionSet = BTreeSet<PackageVersion>;

/// Dependencies of one package version (or of the root requirements),
/// keyed by the constrained subject, valued by the acceptable candidates.
pub type DependencyCandidates = std::collections::BTreeMap<crate::Subject, VersionSet>;

/// Requirements the solve starts from: for each subject,
/// a requirement written in the syntax of the graph backend.
pub type Requirements = std::collections::BTreeMap<crate::Subject, String>;
