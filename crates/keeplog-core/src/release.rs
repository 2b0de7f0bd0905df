//! Release identities parsed from changelog headings.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use semver::Version;
use serde::Serialize;

use crate::document::Inline;
use crate::version::{VersionError, parse_version};

/// Label used for the Unreleased heading and its link definition.
pub const UNRELEASED_LABEL: &str = "Unreleased";

/// Version reported for the Unreleased section by queries.
pub const UNRELEASED_VERSION: &str = "[unreleased]";

/// ISO-8601 calendar date format used in headings.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// What a release heading names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ReleaseSpec {
    /// The working section for changes not yet released.
    Unreleased,
    /// A dated, versioned release.
    Released(Release),
}

/// A published release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Release {
    /// Release version.
    pub version: Version,
    /// Release date.
    pub date: NaiveDate,
    /// Free text following the date (e.g. `[YANKED]`); may be empty.
    pub suffix: String,
}

impl ReleaseSpec {
    /// The release, unless this is the Unreleased section.
    pub const fn release(&self) -> Option<&Release> {
        match self {
            Self::Unreleased => None,
            Self::Released(release) => Some(release),
        }
    }

    /// Whether this is the Unreleased section.
    pub const fn is_unreleased(&self) -> bool {
        matches!(self, Self::Unreleased)
    }

    /// Link label for this heading: the version, or `Unreleased`.
    pub fn label(&self) -> String {
        match self {
            Self::Unreleased => UNRELEASED_LABEL.to_string(),
            Self::Released(release) => release.version.to_string(),
        }
    }

    /// Canonical heading content: `[label]` followed by ` - date suffix`.
    pub fn heading_inlines(&self) -> Vec<Inline> {
        let mut inlines = vec![Inline::LinkReference {
            label: self.label(),
        }];
        if let Self::Released(release) = self {
            let mut text = format!(" - {}", release.date.format(DATE_FORMAT));
            if !release.suffix.is_empty() {
                text.push(' ');
                text.push_str(&release.suffix);
            }
            inlines.push(Inline::Text(text));
        }
        inlines
    }
}

impl fmt::Display for ReleaseSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreleased => f.write_str(UNRELEASED_LABEL),
            Self::Released(release) => {
                write!(f, "{} - {}", release.version, release.date.format(DATE_FORMAT))?;
                if !release.suffix.is_empty() {
                    write!(f, " {}", release.suffix)?;
                }
                Ok(())
            }
        }
    }
}

/// Which release a query asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuerySelector {
    /// The release with exactly this version.
    ExplicitVersion(Version),
    /// The Unreleased section.
    Unreleased,
    /// The newest release.
    Latest,
    /// The newest release, or the Unreleased section if nothing is released.
    LatestOrUnreleased,
}

impl FromStr for QuerySelector {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest" => Ok(Self::Latest),
            "unreleased" => Ok(Self::Unreleased),
            "latest-or-unreleased" => Ok(Self::LatestOrUnreleased),
            _ => Ok(Self::ExplicitVersion(parse_version(s.trim())?)),
        }
    }
}

impl fmt::Display for QuerySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExplicitVersion(version) => write!(f, "{version}"),
            Self::Unreleased => f.write_str("unreleased"),
            Self::Latest => f.write_str("latest"),
            Self::LatestOrUnreleased => f.write_str("latest-or-unreleased"),
        }
    }
}
