// SPDX-License-Identifier: MPL-2.0

//! Versions and version requirements.
//!
//! The solver never interprets versions beyond their ordering,
//! so [Version] only knows how to split a dotted string into segments
//! and compare them. Backends with a richer syntax are expected
//! to map their own versions onto it.

use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};
use std::ops::Bound;
use std::str::FromStr;

use thiserror::Error;
use version_ranges::Ranges;

/// A dotted version such as `1.2.3`, `3.11` or `linux_x86_64`.
///
/// Segments made only of digits compare numerically, other segments compare as text
/// and sort before numbers. Trailing zero segments are not significant,
/// so `1.0` and `1.0.0` are the same version, but the original spelling is kept for display.
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub struct Version {
    text: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Segment {
    Text(String),
    Number(u64),
}

/// Error returned when a version or a requirement cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionParseError {
    /// Version strings must not be empty.
    #[error("empty version")]
    Empty,
    /// A version contained an empty segment, e.g. `1..2`.
    #[error("version {0:?} has an empty segment")]
    EmptySegment(String),
    /// A comparator clause of a requirement could not be understood.
    #[error("invalid requirement clause {0:?}")]
    InvalidClause(String),
}

impl Version {
    /// The version given to the virtual root package.
    pub fn root() -> Self {
        Self {
            text: "0".to_string(),
            segments: Vec::new(),
        }
    }

    /// Segments of this version with trailing zeros removed.
    fn significant(segments: &mut Vec<Segment>) {
        while segments.last() == Some(&Segment::Number(0)) {
            segments.pop();
        }
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.is_empty() {
            return Err(VersionParseError::Empty);
        }
        let mut segments = text
            .split('.')
            .map(|part| {
                if part.is_empty() {
                    Err(VersionParseError::EmptySegment(text.to_string()))
                } else if let Ok(n) = part.parse::<u64>() {
                    Ok(Segment::Number(n))
                } else {
                    Ok(Segment::Text(part.to_string()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::significant(&mut segments);
        Ok(Self {
            text: text.to_string(),
            segments,
        })
    }
}

impl TryFrom<String> for Version {
    type Error = VersionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.text
    }
}

impl From<(u32, u32, u32)> for Version {
    fn from((major, minor, patch): (u32, u32, u32)) -> Self {
        let mut segments = vec![
            Segment::Number(major.into()),
            Segment::Number(minor.into()),
            Segment::Number(patch.into()),
        ];
        Self::significant(&mut segments);
        Self {
            text: format!("{major}.{minor}.{patch}"),
            segments,
        }
    }
}

impl From<u32> for Version {
    fn from(major: u32) -> Self {
        (major, 0, 0).into()
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments.hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.segments.cmp(&other.segments)
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Parse a requirement such as `>=1.0.0, <2.0.0 || ==3.1`.
///
/// Clauses separated by commas must all hold, alternatives separated by `||` are unioned.
/// Supported comparators are `==`, `!=`, `>=`, `>`, `<=` and `<`; a bare version means `==`
/// and `*` matches every version.
pub fn parse_requirement(requirement: &str) -> Result<Ranges<Version>, VersionParseError> {
    let mut alternatives = Ranges::empty();
    for alternative in requirement.split("||") {
        let mut conjunction = Ranges::full();
        for clause in alternative.split(',') {
            conjunction = conjunction.intersection(&parse_clause(clause.trim())?);
        }
        alternatives = alternatives.union(&conjunction);
    }
    Ok(alternatives)
}

/// Write a range back in the syntax of [parse_requirement].
///
/// The empty range has no alternative and is written as an empty string.
pub fn format_requirement(range: &Ranges<Version>) -> String {
    alternatives(range).join(" || ")
}

/// One requirement per disjoint segment of the range.
fn alternatives(range: &Ranges<Version>) -> Vec<String> {
    range
        .iter()
        .map(|(lower, upper)| {
            if let (Bound::Included(low), Bound::Included(high)) = (lower, upper) {
                if low == high {
                    return format!("=={low}");
                }
            }
            let lower = match lower {
                Bound::Included(v) => Some(format!(">={v}")),
                Bound::Excluded(v) => Some(format!(">{v}")),
                Bound::Unbounded => None,
            };
            let upper = match upper {
                Bound::Included(v) => Some(format!("<={v}")),
                Bound::Excluded(v) => Some(format!("<{v}")),
                Bound::Unbounded => None,
            };
            match (lower, upper) {
                (Some(lower), Some(upper)) => format!("{lower}, {upper}"),
                (Some(bound), None) | (None, Some(bound)) => bound,
                (None, None) => "*".to_string(),
            }
        })
        .collect()
}

/// (De)serialize a range as its list of alternatives, each in the syntax of [parse_requirement].
#[cfg(feature = "serde")]
pub(crate) mod serde_requirement {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use version_ranges::Ranges;

    use super::{alternatives, parse_requirement, Version};

    pub(crate) fn serialize<S: Serializer>(
        range: &Ranges<Version>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        alternatives(range).serialize(serializer)
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Ranges<Version>, D::Error> {
        let mut range = Ranges::empty();
        for alternative in Vec::<String>::deserialize(deserializer)? {
            let parsed = parse_requirement(&alternative).map_err(D::Error::custom)?;
            range = range.union(&parsed);
        }
        Ok(range)
    }
}

fn parse_clause(clause: &str) -> Result<Ranges<Version>, VersionParseError> {
    if clause == "*" {
        return Ok(Ranges::full());
    }
    let (op, rest) = ["==", "!=", ">=", "<=", ">", "<"]
        .iter()
        .find_map(|op| clause.strip_prefix(op).map(|rest| (*op, rest)))
        .unwrap_or(("==", clause));
    let version: Version = rest
        .trim()
        .parse()
        .map_err(|_| VersionParseError::InvalidClause(clause.to_string()))?;
    Ok(match op {
        "==" => Ranges::singleton(version),
        "!=" => Ranges::singleton(version).complement(),
        ">=" => Ranges::higher_than(version),
        ">" => Ranges::strictly_higher_than(version),
        "<=" => Ranges::lower_than(version),
        _ => Ranges::strictly_lower_than(version),
    })
}
