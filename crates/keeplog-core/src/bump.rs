//! Release bump pipeline.
//!
//! All orchestration lives here. The CLI reads the changelog, hands the
//! parsed [`Document`] to [`bump`], and writes the returned document back.
//!
//! # Stages
//!
//! 1. Index the release headings and stop on any fatal diagnostic.
//! 2. Copy out the Unreleased body; it becomes the release notes.
//! 3. Compute the next version from the newest release.
//! 4. Promote Unreleased to `## [version] - date`, optionally adding a
//!    fresh Unreleased heading above it.
//! 5. Rewrite every heading and rebuild the link definitions.
//!
//! Extraction (2) reads section boundaries computed by the index, so it has
//! to happen before promotion (4) mutates the document.

use chrono::NaiveDate;
use semver::Version;
use serde::Serialize;
use tracing::{info, instrument};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::document::Document;
use crate::error::ChangelogResult;
use crate::extract::section_body;
use crate::index::build_index;
use crate::links::{RepositoryCoordinates, regenerate_links};
use crate::promote::{insert_unreleased_placeholder, promote};
use crate::version::{self, BumpKind};

/// Default prefix for release tags (`v1.2.3`).
pub const DEFAULT_TAG_PREFIX: &str = "v";

// ──────────────────────────────────────────────
// Options and outcome
// ──────────────────────────────────────────────

/// Inputs for one bump run.
#[derive(Debug, Clone)]
pub struct BumpOptions {
    /// How to derive the next version.
    pub kind: BumpKind,
    /// Prerelease identifier for the `pre*` kinds.
    pub preid: Option<String>,
    /// Date written into the new release heading.
    pub date: NaiveDate,
    /// Prefix turning a version into a git tag.
    pub tag_prefix: String,
    /// Repository for comparison links; `None` writes no links.
    pub repository: Option<RepositoryCoordinates>,
    /// Add an empty Unreleased section after promoting.
    pub keep_unreleased_section: bool,
    /// Treat an empty Unreleased section as fatal instead of a warning.
    pub fail_on_empty_release_notes: bool,
}

impl BumpOptions {
    /// Options with the default tag prefix, no links, and no flags set.
    pub fn new(kind: BumpKind, date: NaiveDate) -> Self {
        Self {
            kind,
            preid: None,
            date,
            tag_prefix: DEFAULT_TAG_PREFIX.to_string(),
            repository: None,
            keep_unreleased_section: false,
            fail_on_empty_release_notes: false,
        }
    }
}

/// Result of a successful bump.
#[derive(Debug, Clone, Serialize)]
pub struct BumpOutcome {
    /// The updated changelog.
    #[serde(skip)]
    pub document: Document,
    /// The version Unreleased was promoted to.
    pub version: Version,
    /// The newest release before this bump (`0.0.0` if there was none).
    pub previous: Version,
    /// Date of the new release.
    pub release_date: NaiveDate,
    /// Markdown body of the former Unreleased section.
    pub release_notes: String,
    /// Non-fatal problems found along the way.
    pub warnings: Vec<Diagnostic>,
}

// ──────────────────────────────────────────────
// Pipeline
// ──────────────────────────────────────────────

/// Promote the Unreleased section of `document` to a new release.
///
/// Either every stage succeeds and the updated document is returned, or
/// nothing is returned at all.
#[instrument(skip_all, fields(kind = %options.kind, date = %options.date))]
pub fn bump(mut document: Document, options: &BumpOptions) -> ChangelogResult<BumpOutcome> {
    let mut diagnostics = Diagnostics::new();
    let mut index = build_index(&document, &mut diagnostics);
    diagnostics.check()?;

    let Some(unreleased) = index.unreleased() else {
        return Err(Diagnostics::fail("the Unreleased section must be present"));
    };
    let body = section_body(unreleased, &document)?;
    if body.is_empty() {
        let message = "the Unreleased section is empty";
        if options.fail_on_empty_release_notes {
            diagnostics.fatal(message, unreleased.span());
            diagnostics.check()?;
        } else {
            diagnostics.warn(message, unreleased.span());
        }
    }
    let release_notes = body.to_markdown();

    let previous = version::baseline(&index);
    let next = version::calculate(&index, &options.kind, options.preid.as_deref())?;

    promote(&mut document, &mut index, &next, options.date)?;
    if options.keep_unreleased_section {
        insert_unreleased_placeholder(&mut document, &mut index)?;
    }
    regenerate_links(
        &mut document,
        &index,
        options.repository.as_ref(),
        &options.tag_prefix,
    )?;

    info!(%previous, %next, "bumped changelog");
    Ok(BumpOutcome {
        document,
        version: next,
        previous,
        release_date: options.date,
        release_notes,
        warnings: diagnostics.into_warnings(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChangelogError;
    use crate::version::VersionError;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn options(kind: BumpKind) -> BumpOptions {
        BumpOptions::new(kind, date("2022-03-31"))
    }

    fn run(markdown: &str, options: &BumpOptions) -> ChangelogResult<BumpOutcome> {
        bump(Document::parse(markdown).unwrap(), options)
    }

    const CHANGELOG: &str = "# Changelog

## [Unreleased]

- Added a thing

## [1.0.0] - 2022-01-01

- Initial release
";

    #[test]
    fn minor_bump_scenario() {
        let outcome = run(CHANGELOG, &options(BumpKind::Minor)).unwrap();
        assert_eq!(outcome.version.to_string(), "1.1.0");
        assert_eq!(outcome.previous, Version::new(1, 0, 0));
        assert_eq!(outcome.release_notes, "- Added a thing\n");
        assert!(outcome.warnings.is_empty());
        assert_eq!(
            outcome.document.to_markdown(),
            "# Changelog

## [1.1.0] - 2022-03-31

- Added a thing

## [1.0.0] - 2022-01-01

- Initial release
"
        );
    }

    #[test]
    fn keeps_unreleased_section_when_asked() {
        let mut opts = options(BumpKind::Minor);
        opts.keep_unreleased_section = true;
        let out = run(CHANGELOG, &opts).unwrap().document.to_markdown();
        assert!(out.starts_with("# Changelog\n\n## [Unreleased]\n\n## [1.1.0] - 2022-03-31\n"));
    }

    #[test]
    fn writes_links_with_repository() {
        let mut opts = options(BumpKind::Patch);
        opts.keep_unreleased_section = true;
        opts.repository = Some(RepositoryCoordinates::new("acme", "widget"));
        let out = run(CHANGELOG, &opts).unwrap().document.to_markdown();
        assert!(out.ends_with(
            "- Initial release

[unreleased]: https://github.com/acme/widget/compare/v1.0.1...HEAD
[1.0.1]: https://github.com/acme/widget/compare/v1.0.0...v1.0.1
[1.0.0]: https://github.com/acme/widget/releases/tag/v1.0.0
"
        ));
    }

    #[test]
    fn bumped_output_can_be_bumped_again() {
        let mut opts = options(BumpKind::Minor);
        opts.keep_unreleased_section = true;
        opts.repository = Some(RepositoryCoordinates::new("acme", "widget"));
        let first = run(CHANGELOG, &opts).unwrap();

        opts.kind = BumpKind::Major;
        opts.date = date("2022-06-01");
        let second = bump(first.document, &opts).unwrap();
        assert_eq!(second.version, Version::new(2, 0, 0));
        assert_eq!(second.previous, Version::new(1, 1, 0));
        assert!(!second.warnings.is_empty());
        assert!(
            second
                .document
                .to_markdown()
                .contains("[2.0.0]: https://github.com/acme/widget/compare/v1.1.0...v2.0.0\n")
        );
    }

    #[test]
    fn first_release_starts_from_zero() {
        let outcome = run("## Unreleased\n\n- Hello\n", &options(BumpKind::Minor)).unwrap();
        assert_eq!(outcome.version.to_string(), "0.1.0");
        assert_eq!(outcome.previous, Version::new(0, 0, 0));
        assert_eq!(outcome.document.to_markdown(), "## [0.1.0] - 2022-03-31\n\n- Hello\n");
    }

    #[test]
    fn explicit_version() {
        let kind = BumpKind::Explicit(Version::parse("2.0.0-rc.1").unwrap());
        let outcome = run(CHANGELOG, &options(kind)).unwrap();
        assert_eq!(outcome.version.to_string(), "2.0.0-rc.1");
    }

    #[test]
    fn explicit_version_must_move_forward() {
        let kind = BumpKind::Explicit(Version::new(1, 0, 0));
        let err = run(CHANGELOG, &options(kind)).unwrap_err();
        assert!(matches!(
            err,
            ChangelogError::Version(VersionError::NotGreater { .. })
        ));
    }

    #[test]
    fn prerelease_with_identifier() {
        let mut opts = options(BumpKind::Preminor);
        opts.preid = Some("beta".into());
        assert_eq!(run(CHANGELOG, &opts).unwrap().version.to_string(), "1.1.0-beta.0");
    }

    #[test]
    fn missing_unreleased_fails() {
        let err = run("## [1.0.0] - 2022-01-01\n\n- x\n", &options(BumpKind::Patch)).unwrap_err();
        assert_eq!(err.to_string(), "the Unreleased section must be present");
    }

    #[test]
    fn empty_unreleased_warns_by_default() {
        let outcome = run("## Unreleased\n\n## 1.0.0 - 2022-01-01\n", &options(BumpKind::Patch))
            .unwrap();
        assert_eq!(outcome.release_notes, "");
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].message, "the Unreleased section is empty");
    }

    #[test]
    fn empty_unreleased_is_fatal_when_configured() {
        let mut opts = options(BumpKind::Patch);
        opts.fail_on_empty_release_notes = true;
        let err = run("## Unreleased\n\n## 1.0.0 - 2022-01-01\n", &opts).unwrap_err();
        assert_eq!(err.diagnostics().len(), 1);
        assert!(err.to_string().contains("the Unreleased section is empty"));
    }

    #[test]
    fn invalid_changelog_produces_no_output() {
        let err = run(
            "## Unreleased\n\n- x\n\n## notaversion\n\n## 1.0.0 - 2022-01-01\n",
            &options(BumpKind::Patch),
        )
        .unwrap_err();
        assert!(matches!(err, ChangelogError::Invalid(_)));
        assert_eq!(err.diagnostics()[0].message, "invalid version in release heading");
    }

    #[test]
    fn links_are_dropped_without_repository() {
        let linked = "# Changelog

## [Unreleased]

- Next

## [1.0.0] - 2022-01-01

- First

[unreleased]: https://github.com/acme/widget/compare/v1.0.0...HEAD
[1.0.0]: https://github.com/acme/widget/releases/tag/v1.0.0
";
        let out = run(linked, &options(BumpKind::Patch))
            .unwrap()
            .document
            .to_markdown();
        assert_eq!(
            out,
            "# Changelog

## [1.0.1] - 2022-03-31

- Next

## [1.0.0] - 2022-01-01

- First
"
        );

        let reparsed = Document::parse(&out).unwrap();
        assert!(!reparsed.blocks().iter().any(|block| block.is_definition()));
        let mut diagnostics = Diagnostics::new();
        let index = build_index(&reparsed, &mut diagnostics);
        diagnostics.check().unwrap();
        let headings: Vec<String> = index
            .headings()
            .iter()
            .map(|heading| heading.spec().to_string())
            .collect();
        assert_eq!(headings, ["1.0.1 - 2022-03-31", "1.0.0 - 2022-01-01"]);
    }

    #[test]
    fn older_heading_suffix_keeps_its_escapes() {
        let out = run(
            "## Unreleased\n\n- x\n\n## 1.0.0 - 2022-01-01 \\*not emphasis\\* &amp; co\n\n- y\n",
            &options(BumpKind::Minor),
        )
        .unwrap()
        .document
        .to_markdown();
        assert_eq!(
            out,
            "## [1.1.0] - 2022-03-31\n\n- x\n\n## [1.0.0] - 2022-01-01 \\*not emphasis\\* &amp; co\n\n- y\n"
        );
    }

    #[test]
    fn newest_release_at_the_numeric_limit_cannot_be_bumped() {
        let markdown = format!("## Unreleased\n\n- x\n\n## {}.0.0 - 2022-01-01\n", u64::MAX);
        let err = run(&markdown, &options(BumpKind::Major)).unwrap_err();
        assert!(matches!(
            err,
            ChangelogError::Version(VersionError::Overflow(_))
        ));
    }

    #[test]
    fn outcome_serializes_without_document() {
        let outcome = run(CHANGELOG, &options(BumpKind::Minor)).unwrap();
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["version"], "1.1.0");
        assert_eq!(json["previous"], "1.0.0");
        assert_eq!(json["release_date"], "2022-03-31");
        assert!(json.get("document").is_none());
    }
}
