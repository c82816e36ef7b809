// SPDX-License-Identifier: MPL-2.0

//! Subjects of terms and the package versions they range over.

use std::fmt::{self, Display};

use crate::Version;

/// What a term talks about.
///
/// Most subjects are packages, but the solver treats cross-cutting domains
/// such as the target platform or the interpreter version exactly the same way:
/// they have a universe of values and exactly one of them ends up selected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Subject {
    /// The virtual package standing for the caller's requirements.
    Root,
    /// A package of the ecosystem, identified by its name.
    Package(String),
    /// The platform the solution is meant to run on.
    Platform,
    /// The version of the interpreter the solution is meant to run with.
    PythonInterpreter,
}

impl Subject {
    /// Shorthand for [Subject::Package].
    pub fn package(name: impl Into<String>) -> Self {
        Self::Package(name.into())
    }

    /// Name of the package, if this subject is one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Package(name) => Some(name),
            _ => None,
        }
    }
}

impl From<&str> for Subject {
    fn from(name: &str) -> Self {
        Self::package(name)
    }
}

impl From<String> for Subject {
    fn from(name: String) -> Self {
        Self::Package(name)
    }
}

impl Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("root"),
            Self::Package(name) => f.write_str(name),
            Self::Platform => f.write_str("platform"),
            Self::PythonInterpreter => f.write_str("python"),
        }
    }
}

/// A subject at a given version: the atomic element of the solution universe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PackageVersion {
    /// The package (or domain) this version belongs to.
    pub subject: Subject,
    /// The version itself.
    pub version: Version,
}

impl PackageVersion {
    /// Pair a subject with a version.
    pub fn new(subject: impl Into<Subject>, version: impl Into<Version>) -> Self {
        Self {
            subject: subject.into(),
            version: version.into(),
        }
    }

    /// The single version of the virtual root package.
    pub fn root() -> Self {
        Self {
            subject: Subject::Root,
            version: Version::root(),
        }
    }
}

impl Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subject {
            Subject::Root => write!(f, "{}", self.subject),
            _ => write!(f, "{}@{}", self.subject, self.version),
        }
    }
}
