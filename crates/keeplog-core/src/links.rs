//! Comparison link definitions.
//!
//! Every release heading is a shortcut reference (`## [1.2.0] - ...`)
//! resolved by a definition at the bottom of the changelog:
//!
//! ```text
//! [unreleased]: https://github.com/acme/widget/compare/v1.2.0...HEAD
//! [1.2.0]: https://github.com/acme/widget/compare/v1.1.0...v1.2.0
//! [1.1.0]: https://github.com/acme/widget/releases/tag/v1.1.0
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::document::{Definition, Document};
use crate::error::{ChangelogError, ChangelogResult};
use crate::index::DocumentIndex;
use crate::release::ReleaseSpec;

/// Host used when none is configured.
pub const DEFAULT_HOST: &str = "github.com";

/// Git reference the Unreleased section compares against.
pub const HEAD_REF: &str = "HEAD";

/// Where a repository is hosted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryCoordinates {
    /// Host name, e.g. `github.com`.
    pub host: String,
    /// Owning user or organization.
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl RepositoryCoordinates {
    /// Coordinates on the default host.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Same repository on a different host.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// `https://{host}/{owner}/{name}`
    pub fn base_url(&self) -> String {
        format!("https://{}/{}/{}", self.host, self.owner, self.name)
    }

    /// URL comparing two git references.
    pub fn compare_url(&self, from: &str, to: &str) -> String {
        format!("{}/compare/{from}...{to}", self.base_url())
    }

    /// URL of the release page for one tag.
    pub fn tag_url(&self, tag: &str) -> String {
        format!("{}/releases/tag/{tag}", self.base_url())
    }
}

impl fmt::Display for RepositoryCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.host, self.owner, self.name)
    }
}

/// Git reference for a heading: `HEAD`, or the prefixed version tag.
pub fn tag_for(spec: &ReleaseSpec, tag_prefix: &str) -> String {
    match spec {
        ReleaseSpec::Unreleased => HEAD_REF.to_string(),
        ReleaseSpec::Released(release) => format!("{tag_prefix}{}", release.version),
    }
}

fn definition_label(spec: &ReleaseSpec) -> String {
    match spec {
        ReleaseSpec::Unreleased => "unreleased".to_string(),
        ReleaseSpec::Released(release) => release.version.to_string(),
    }
}

/// Rewrite every release heading and rebuild the link definitions.
///
/// Existing definitions are always removed. New ones are only appended when
/// `repository` is known; without it the changelog is left link-free.
#[instrument(skip(document, index, repository), fields(repository = ?repository.map(ToString::to_string)))]
pub fn regenerate_links(
    document: &mut Document,
    index: &DocumentIndex,
    repository: Option<&RepositoryCoordinates>,
    tag_prefix: &str,
) -> ChangelogResult<()> {
    let removed = document.remove_definitions();

    let headings = index.headings();
    for heading in headings {
        if !document.set_heading_children(heading.node(), heading.spec().heading_inlines()) {
            return Err(ChangelogError::Internal(format!(
                "heading `{}` is no longer in the document",
                heading.spec()
            )));
        }
    }

    let Some(repository) = repository else {
        debug!(removed, "no repository coordinates; omitting links");
        return Ok(());
    };

    for (position, heading) in headings.iter().enumerate() {
        let current = tag_for(heading.spec(), tag_prefix);
        let url = match headings.get(position + 1) {
            Some(previous) => repository.compare_url(&tag_for(previous.spec(), tag_prefix), &current),
            None => repository.tag_url(&current),
        };
        document.push_definition(Definition {
            label: definition_label(heading.spec()),
            url,
            title: None,
        });
    }

    debug!(removed, added = headings.len(), "regenerated link definitions");
    Ok(())
}
