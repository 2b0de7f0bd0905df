//! Section lookup and extraction.

use tracing::{debug, instrument};

use crate::document::Document;
use crate::error::{ChangelogError, ChangelogResult};
use crate::index::{DocumentIndex, Heading};
use crate::release::QuerySelector;

/// A release heading together with a detached copy of its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// The matched heading.
    pub heading: Heading,
    /// Blocks strictly between the heading and the end of its section.
    pub body: Document,
}

/// Find the heading `selector` refers to. The first match wins.
pub fn find<'a>(selector: &QuerySelector, index: &'a DocumentIndex) -> ChangelogResult<&'a Heading> {
    let first_release = || index.iter().find(|heading| heading.spec().release().is_some());
    let unreleased = || index.iter().find(|heading| heading.spec().is_unreleased());

    let found = match selector {
        QuerySelector::Unreleased => unreleased(),
        QuerySelector::ExplicitVersion(version) => index.iter().find(|heading| {
            heading
                .spec()
                .release()
                .is_some_and(|release| release.version == *version)
        }),
        QuerySelector::Latest => first_release(),
        QuerySelector::LatestOrUnreleased => {
            if index.is_empty() {
                return Err(ChangelogError::NoReleases);
            }
            first_release().or_else(unreleased)
        }
    };
    found.ok_or(ChangelogError::ReleaseNotFound)
}

/// Copy the body of `heading`'s section out of `document`.
///
/// `heading` must come from an index built over this same document.
pub fn section_body(heading: &Heading, document: &Document) -> ChangelogResult<Document> {
    document
        .slice(heading.node(), heading.section_end())
        .ok_or_else(|| {
            ChangelogError::Internal(format!(
                "section `{}` does not belong to this document",
                heading.spec()
            ))
        })
}

/// Find the section `selector` refers to and copy out its body.
#[instrument(skip(index, document), fields(%selector))]
pub fn extract(
    selector: &QuerySelector,
    index: &DocumentIndex,
    document: &Document,
) -> ChangelogResult<Section> {
    let heading = find(selector, index)?;
    let body = section_body(heading, document)?;
    debug!(heading = %heading.spec(), blocks = body.len(), "extracted section");
    Ok(Section {
        heading: heading.clone(),
        body,
    })
}
