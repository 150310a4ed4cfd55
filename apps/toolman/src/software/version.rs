//! Version model for tool releases.
//!
//! Vendors publish versions in loosely similar shapes (`v1.2.3`, `1.21`,
//! `1.21.0-rc2`, `20.11.0.1`), so this module implements a small four
//! component model instead of strict semver:
//!
//! ```text
//! [v]MAJOR[.MINOR[.PATCH[QUALIFIER][.BUILD[QUALIFIER]]]]
//! ```
//!
//! Every component is optional. A missing or empty component is
//! *unspecified*, which is not the same as zero: as a query it matches any
//! value, and in ordering it sorts below every specified value. Patch and
//! build may carry a qualifier suffix (`3-rc1` is number 3 with qualifier
//! `-rc1`); a component without a qualifier is newer than one with a
//! qualifier, whatever the numbers are.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, ToolmanError};

/// Maximum number of dot separated components.
const MAX_COMPONENTS: usize = 4;

/// A patch or build component: a number plus an optional qualifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
struct Component {
    number: Option<u64>,
    qualifier: String,
}

impl Component {
    fn unspecified() -> Self {
        Self::default()
    }

    /// Orders components so that an empty qualifier beats a non-empty one,
    /// then compares qualifiers, then numbers.
    fn cmp_release(&self, other: &Self) -> Ordering {
        let by_qualifier = match (self.qualifier.is_empty(), other.qualifier.is_empty()) {
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            _ => self.qualifier.cmp(&other.qualifier),
        };
        by_qualifier.then_with(|| self.number.cmp(&other.number))
    }

    /// A specified component must match exactly, qualifier included.
    fn admits(&self, candidate: &Self) -> bool {
        self.number.is_none() || self == candidate
    }
}

/// A parsed tool version.
///
/// Equality and ordering look only at the components, never at the raw
/// text, so `v1.2` and `1.2` are equal. `Display` renders the raw text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    raw: String,
    major: Option<u64>,
    minor: Option<u64>,
    patch: Component,
    build: Component,
}

impl Version {
    /// Parses a version string.
    ///
    /// A leading `v` is ignored and an empty string yields a version with
    /// every component unspecified, which matches any version.
    ///
    /// # Errors
    ///
    /// Returns `ToolmanError::Parse` if a component is not numeric, if
    /// major or minor carry a qualifier, or if there are more than four
    /// components.
    pub fn parse(text: &str) -> Result<Self> {
        let raw = text.trim();
        let body = raw.strip_prefix('v').unwrap_or(raw);

        if body.is_empty() {
            return Ok(Self {
                raw: raw.to_string(),
                major: None,
                minor: None,
                patch: Component::unspecified(),
                build: Component::unspecified(),
            });
        }

        let parts: Vec<&str> = body.split('.').collect();
        if parts.len() > MAX_COMPONENTS {
            return Err(ToolmanError::parse(
                raw,
                format!("expected at most {MAX_COMPONENTS} components"),
            ));
        }

        let part = |index: usize| parts.get(index).copied().unwrap_or("");

        Ok(Self {
            raw: raw.to_string(),
            major: parse_number(raw, part(0))?,
            minor: parse_number(raw, part(1))?,
            patch: parse_component(raw, part(2))?,
            build: parse_component(raw, part(3))?,
        })
    }

    /// Returns the major component, `None` if unspecified.
    #[must_use]
    pub fn major(&self) -> Option<u64> {
        self.major
    }

    /// Returns the minor component, `None` if unspecified.
    #[must_use]
    pub fn minor(&self) -> Option<u64> {
        self.minor
    }

    /// Returns the numeric part of the patch component, `None` if unspecified.
    #[must_use]
    pub fn patch(&self) -> Option<u64> {
        self.patch.number
    }

    /// Returns the numeric part of the build component, `None` if unspecified.
    #[must_use]
    pub fn build(&self) -> Option<u64> {
        self.build.number
    }

    /// Returns the text this version was parsed from.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns true if no component is specified.
    #[must_use]
    pub fn is_any(&self) -> bool {
        self.major.is_none()
            && self.minor.is_none()
            && self.patch.number.is_none()
            && self.build.number.is_none()
    }

    /// Treats `self` as a query and checks whether `candidate` satisfies it.
    ///
    /// Every component specified in `self` must equal the candidate's;
    /// unspecified components match anything.
    #[must_use]
    pub fn matches(&self, candidate: &Self) -> bool {
        self.major.is_none_or(|m| candidate.major == Some(m))
            && self.minor.is_none_or(|m| candidate.minor == Some(m))
            && self.patch.admits(&candidate.patch)
            && self.build.admits(&candidate.build)
    }

    /// Returns true if `a` sorts before `b` in a newest-first list.
    #[must_use]
    pub fn compare_descending(a: &Self, b: &Self) -> bool {
        a > b
    }
}

fn parse_number(raw: &str, part: &str) -> Result<Option<u64>> {
    if part.is_empty() {
        return Ok(None);
    }
    if !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ToolmanError::parse(
            raw,
            format!("component '{part}' is not a number"),
        ));
    }
    part.parse::<u64>()
        .map(Some)
        .map_err(|e| ToolmanError::parse(raw, format!("component '{part}': {e}")))
}

fn parse_component(raw: &str, part: &str) -> Result<Component> {
    if part.is_empty() {
        return Ok(Component::unspecified());
    }

    let split = part
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(part.len());
    let (digits, qualifier) = part.split_at(split);

    if digits.is_empty() {
        return Err(ToolmanError::parse(
            raw,
            format!("component '{part}' is not a number"),
        ));
    }

    Ok(Component {
        number: parse_number(raw, digits)?,
        qualifier: qualifier.to_string(),
    })
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    /// Orders oldest to newest; sort with `b.cmp(a)` for a newest-first list.
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then_with(|| self.minor.cmp(&other.minor))
            .then_with(|| self.patch.cmp_release(&other.patch))
            .then_with(|| self.build.cmp_release(&other.build))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Version {
    type Err = ToolmanError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = ToolmanError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.raw
    }
}
