//! Next-version computation.
//!
//! The baseline is the newest release in the changelog (or `0.0.0` when
//! nothing has been released yet). It is incremented by one of the seven
//! standard bump kinds, or replaced by an explicit version.

mod prerelease;

use std::fmt;
use std::str::FromStr;

use semver::{BuildMetadata, Prerelease, Version};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::index::DocumentIndex;

/// Errors from version operations.
#[derive(Error, Debug)]
pub enum VersionError {
    /// Failed to parse a semver string.
    #[error("invalid semver: {0}")]
    InvalidSemver(#[from] semver::Error),

    /// The prerelease identifier is not a valid semver identifier.
    #[error("invalid prerelease identifier {identifier:?}: {source}")]
    InvalidPrerelease {
        /// Identifier as supplied.
        identifier: String,
        /// Parser error.
        source: semver::Error,
    },

    /// The computed version does not move past the newest release.
    #[error("version {next} must be greater than the latest release {baseline}")]
    NotGreater {
        /// Newest release in the changelog.
        baseline: Version,
        /// Version that was computed or requested.
        next: Version,
    },

    /// A numeric component is already at its maximum.
    #[error("cannot increment {0} without overflowing")]
    Overflow(String),
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// How to derive the next version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BumpKind {
    /// Next major release (X.0.0).
    Major,
    /// Next minor release (x.Y.0).
    Minor,
    /// Next patch release (x.y.Z).
    Patch,
    /// Prerelease of the next major release.
    Premajor,
    /// Prerelease of the next minor release.
    Preminor,
    /// Prerelease of the next patch release.
    Prepatch,
    /// Next prerelease of the current (or next patch) release.
    Prerelease,
    /// Use this version as-is.
    Explicit(Version),
}

impl fmt::Display for BumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
            Self::Patch => write!(f, "patch"),
            Self::Premajor => write!(f, "premajor"),
            Self::Preminor => write!(f, "preminor"),
            Self::Prepatch => write!(f, "prepatch"),
            Self::Prerelease => write!(f, "prerelease"),
            Self::Explicit(version) => write!(f, "{version}"),
        }
    }
}

impl FromStr for BumpKind {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "patch" => Ok(Self::Patch),
            "premajor" => Ok(Self::Premajor),
            "preminor" => Ok(Self::Preminor),
            "prepatch" => Ok(Self::Prepatch),
            "prerelease" => Ok(Self::Prerelease),
            _ => Ok(Self::Explicit(parse_version(s.trim())?)),
        }
    }
}

/// Parse a version string, stripping an optional `v` prefix.
pub fn parse_version(s: &str) -> VersionResult<Version> {
    let s = s.strip_prefix('v').unwrap_or(s);
    Ok(Version::parse(s)?)
}

/// The version new releases are computed from: the newest release in the
/// index, or `0.0.0` if there is none.
pub fn baseline(index: &DocumentIndex) -> Version {
    index
        .latest_release()
        .map_or_else(|| Version::new(0, 0, 0), |release| release.version.clone())
}

/// Apply `kind` to `current`.
///
/// `preid` names the prerelease identifier for the `pre*` kinds
/// (`beta` gives `-beta.0`); without it the prerelease is a bare counter.
pub fn next_version(
    current: &Version,
    kind: &BumpKind,
    preid: Option<&str>,
) -> VersionResult<Version> {
    let pre = current.pre.clone();
    let mut next = Version {
        build: BuildMetadata::EMPTY,
        pre: Prerelease::EMPTY,
        ..current.clone()
    };

    match kind {
        BumpKind::Major => {
            if pre.is_empty() || current.minor != 0 || current.patch != 0 {
                next.major = increment(next.major, current)?;
            }
            next.minor = 0;
            next.patch = 0;
        }
        BumpKind::Minor => {
            if pre.is_empty() || current.patch != 0 {
                next.minor = increment(next.minor, current)?;
            }
            next.patch = 0;
        }
        BumpKind::Patch => {
            if pre.is_empty() {
                next.patch = increment(next.patch, current)?;
            }
        }
        BumpKind::Premajor => {
            next.major = increment(next.major, current)?;
            next.minor = 0;
            next.patch = 0;
            next.pre = prerelease::start(preid)?;
        }
        BumpKind::Preminor => {
            next.minor = increment(next.minor, current)?;
            next.patch = 0;
            next.pre = prerelease::start(preid)?;
        }
        BumpKind::Prepatch => {
            next.patch = increment(next.patch, current)?;
            next.pre = prerelease::start(preid)?;
        }
        BumpKind::Prerelease => {
            if pre.is_empty() {
                next.patch = increment(next.patch, current)?;
                next.pre = prerelease::start(preid)?;
            } else {
                next.pre = prerelease::advance(&pre, preid)?;
            }
        }
        BumpKind::Explicit(version) => next = version.clone(),
    }

    Ok(next)
}

fn increment(component: u64, current: &Version) -> VersionResult<u64> {
    component
        .checked_add(1)
        .ok_or_else(|| VersionError::Overflow(current.to_string()))
}

/// Compute the version the Unreleased section will be promoted to.
///
/// Fails if the result would not sort above the newest release.
#[instrument(skip_all, fields(%kind, ?preid))]
pub fn calculate(
    index: &DocumentIndex,
    kind: &BumpKind,
    preid: Option<&str>,
) -> VersionResult<Version> {
    let baseline = baseline(index);
    let next = next_version(&baseline, kind, preid)?;
    if next <= baseline {
        return Err(VersionError::NotGreater { baseline, next });
    }
    debug!(%baseline, %next, "computed next version");
    Ok(next)
}
