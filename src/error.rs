// SPDX-License-Identifier: MPL-2.0

//! Handling vsolve errors.

use thiserror::Error;

use crate::{PackageVersion, Subject};

/// Errors a [Graph](crate::Graph) backend may return.
#[derive(Error, Debug)]
pub enum GraphError {
    /// The ecosystem has no package with this name.
    #[error("package {package} could not be found")]
    PackageNotFound {
        /// The subject that was queried.
        package: Subject,
    },

    /// A declared requirement matches none of the available versions.
    #[error(
        "{package_version} requires {dependency} {requirement} but {}",
        display_available(.available)
    )]
    VersionNotFound {
        /// The package version declaring the dependency, or root.
        package_version: PackageVersion,
        /// The dependency that cannot be satisfied.
        dependency: Subject,
        /// The declared requirement, in the backend's syntax.
        requirement: String,
        /// Every version of the dependency that exists, none of which satisfies the requirement.
        available: Vec<PackageVersion>,
    },

    /// Root requirements could not be understood.
    #[error("invalid requirement {requirement:?} for {subject}: {reason}")]
    InvalidRequirements {
        /// The subject the requirement is about.
        subject: Subject,
        /// The requirement as given by the caller.
        requirement: String,
        /// Why it could not be parsed.
        reason: String,
    },

    /// Any other failure of the backend, such as I/O.
    #[error("graph backend failed: {0}")]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

fn display_available(available: &[PackageVersion]) -> String {
    let versions: Vec<String> = available.iter().map(|v| v.version.to_string()).collect();
    match versions.len() {
        0 => "no version is available".to_string(),
        1 => format!("only {} is available", versions[0]),
        _ => format!("only {} are available", versions.join(", ")),
    }
}

impl GraphError {
    /// Whether this error is a gap in the ecosystem data,
    /// which the resolver turns into an incompatibility instead of aborting.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PackageNotFound { .. } | Self::VersionNotFound { .. }
        )
    }

    /// A copy of this error, unless it wraps an opaque backend failure.
    pub(crate) fn try_clone(&self) -> Option<Self> {
        Some(match self {
            Self::PackageNotFound { package } => Self::PackageNotFound {
                package: package.clone(),
            },
            Self::VersionNotFound {
                package_version,
                dependency,
                requirement,
                available,
            } => Self::VersionNotFound {
                package_version: package_version.clone(),
                dependency: dependency.clone(),
                requirement: requirement.clone(),
                available: available.clone(),
            },
            Self::InvalidRequirements {
                subject,
                requirement,
                reason,
            } => Self::InvalidRequirements {
                subject: subject.clone(),
                requirement: requirement.clone(),
                reason: reason.clone(),
            },
            Self::Backend(_) => return None,
        })
    }
}

/// Two terms about different subjects were combined.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot combine a term about {left} with a term about {right}")]
pub struct MismatchedSubjects {
    /// Subject of the receiver.
    pub left: Subject,
    /// Subject of the argument.
    pub right: Subject,
}

/// Errors that may occur while solving dependencies.
///
/// Having no solution is not one of them: see [Resolver::report](crate::Resolver::report).
#[derive(Error, Debug)]
pub enum SolveError {
    /// Error arising when the graph backend failed in a way that cannot be worked around.
    #[error("retrieving dependencies failed")]
    Graph(#[from] GraphError),

    /// Something unexpected happened.
    #[error("{0}")]
    Failure(String),
}
