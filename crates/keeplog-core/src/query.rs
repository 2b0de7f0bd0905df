//! Release lookup pipeline.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::diagnostics::Diagnostics;
use crate::document::Document;
use crate::error::ChangelogResult;
use crate::extract::extract;
use crate::index::build_index;
use crate::release::{QuerySelector, ReleaseSpec, UNRELEASED_VERSION};

/// A release found by [`query`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryOutcome {
    /// The version, or `[unreleased]` for the Unreleased section.
    pub version: String,
    /// Release date; absent for Unreleased.
    pub date: Option<NaiveDate>,
    /// Heading text after the date.
    pub suffix: String,
    /// Markdown body of the section.
    pub release_notes: String,
}

/// Find the release `selector` names and return its notes.
#[instrument(skip(document), fields(%selector))]
pub fn query(document: &Document, selector: &QuerySelector) -> ChangelogResult<QueryOutcome> {
    let mut diagnostics = Diagnostics::new();
    let index = build_index(document, &mut diagnostics);
    diagnostics.check()?;

    let section = extract(selector, &index, document)?;
    let release_notes = section.body.to_markdown();
    let outcome = match section.heading.spec() {
        ReleaseSpec::Unreleased => QueryOutcome {
            version: UNRELEASED_VERSION.to_string(),
            date: None,
            suffix: String::new(),
            release_notes,
        },
        ReleaseSpec::Released(release) => QueryOutcome {
            version: release.version.to_string(),
            date: Some(release.date),
            suffix: release.suffix.clone(),
            release_notes,
        },
    };

    debug!(version = %outcome.version, "query matched");
    Ok(outcome)
}
