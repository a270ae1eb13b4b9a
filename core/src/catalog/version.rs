use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionRangeError {
    #[error("empty comparator in '{0}'")]
    EmptyComparator(String),
    #[error("invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },
}

/// One side of a range. `inclusive` is ignored for unbounded sides.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Bound {
    version: Version,
    inclusive: bool,
}

/// A contiguous semver interval parsed from comparators such as
/// `">=1.2, <2"`, `"=1.4.0"` or `"*"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionRange {
    lower: Option<Bound>,
    upper: Option<Bound>,
    source: String,
}

impl VersionRange {
    pub fn any() -> Self {
        Self {
            lower: None,
            upper: None,
            source: "*".to_string(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, VersionRangeError> {
        let source = input.trim().to_string();
        let mut range = Self {
            lower: None,
            upper: None,
            source: source.clone(),
        };

        if source.is_empty() || source == "*" {
            return Ok(range);
        }

        for part in source.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(VersionRangeError::EmptyComparator(source.clone()));
            }

            let (op, rest) = split_operator(part);
            let version = parse_partial(rest)?;
            match op {
                ">=" => range.raise_lower(version, true),
                ">" => range.raise_lower(version, false),
                "<=" => range.cap_upper(version, true),
                "<" => range.cap_upper(version, false),
                _ => {
                    range.raise_lower(version.clone(), true);
                    range.cap_upper(version, true);
                }
            }
        }

        Ok(range)
    }

    pub fn contains(&self, version: &Version) -> bool {
        let above = match &self.lower {
            Some(b) if b.inclusive => version >= &b.version,
            Some(b) => version > &b.version,
            None => true,
        };
        let below = match &self.upper {
            Some(b) if b.inclusive => version <= &b.version,
            Some(b) => version < &b.version,
            None => true,
        };
        above && below
    }

    /// Whether some version satisfies both ranges.
    pub fn intersects(&self, other: &VersionRange) -> bool {
        let mut merged = self.clone();
        if let Some(b) = &other.lower {
            merged.raise_lower(b.version.clone(), b.inclusive);
        }
        if let Some(b) = &other.upper {
            merged.cap_upper(b.version.clone(), b.inclusive);
        }
        !merged.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Some(lo), Some(hi)) => match lo.version.cmp(&hi.version) {
                Ordering::Greater => true,
                Ordering::Equal => !(lo.inclusive && hi.inclusive),
                Ordering::Less => false,
            },
            _ => false,
        }
    }

    fn raise_lower(&mut self, version: Version, inclusive: bool) {
        let replace = match &self.lower {
            None => true,
            Some(cur) => match version.cmp(&cur.version) {
                Ordering::Greater => true,
                Ordering::Equal => cur.inclusive && !inclusive,
                Ordering::Less => false,
            },
        };
        if replace {
            self.lower = Some(Bound { version, inclusive });
        }
    }

    fn cap_upper(&mut self, version: Version, inclusive: bool) {
        let replace = match &self.upper {
            None => true,
            Some(cur) => match version.cmp(&cur.version) {
                Ordering::Less => true,
                Ordering::Equal => cur.inclusive && !inclusive,
                Ordering::Greater => false,
            },
        };
        if replace {
            self.upper = Some(Bound { version, inclusive });
        }
    }
}

fn split_operator(part: &str) -> (&str, &str) {
    for op in [">=", "<=", ">", "<", "="] {
        if let Some(rest) = part.strip_prefix(op) {
            return (op, rest.trim());
        }
    }
    ("=", part)
}

/// Accepts `1`, `1.2` and `1.2.3`, padding missing components with zero.
fn parse_partial(raw: &str) -> Result<Version, VersionRangeError> {
    let dots = raw.matches('.').count();
    let padded = match dots {
        0 => format!("{raw}.0.0"),
        1 => format!("{raw}.0"),
        _ => raw.to_string(),
    };
    Version::parse(&padded).map_err(|e| VersionRangeError::InvalidVersion {
        version: raw.to_string(),
        reason: e.to_string(),
    })
}

impl FromStr for VersionRange {
    type Err = VersionRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VersionRange {
    type Error = VersionRangeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VersionRange> for String {
    fn from(range: VersionRange) -> Self {
        range.source
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
