//! Release heading index.
//!
//! [`build_index`] walks the top level of a [`Document`] once, parsing every
//! level-2 heading into a [`ReleaseSpec`] and recording where each section
//! ends. A second pass checks the ordering rules between headings:
//!
//! - at most one Unreleased heading, and only as the first heading;
//! - released versions strictly descending from top to bottom;
//! - link definitions only after the last section.
//!
//! Violations are fatal diagnostics. The index is only meaningful for the
//! document it was built from, and only until that document is mutated.

use tracing::{debug, instrument};

use crate::diagnostics::Diagnostics;
use crate::document::{BlockKind, Document, NodeId, Span};
use crate::heading::parse_heading;
use crate::release::{Release, ReleaseSpec};

/// Heading level that starts a release section.
pub const RELEASE_HEADING_DEPTH: u8 = 2;

/// A release heading and the extent of its section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    node: NodeId,
    spec: ReleaseSpec,
    section_end: Option<NodeId>,
    span: Option<Span>,
}

impl Heading {
    pub(crate) const fn new(node: NodeId, spec: ReleaseSpec, span: Option<Span>) -> Self {
        Self {
            node,
            spec,
            section_end: None,
            span,
        }
    }

    /// The heading block.
    pub const fn node(&self) -> NodeId {
        self.node
    }

    /// What the heading names.
    pub const fn spec(&self) -> &ReleaseSpec {
        &self.spec
    }

    /// First block after the section: the next release heading or the first
    /// link definition. `None` if the section runs to the end of the document.
    pub const fn section_end(&self) -> Option<NodeId> {
        self.section_end
    }

    /// Source position of the heading, if it was parsed from input.
    pub const fn span(&self) -> Option<Span> {
        self.span
    }

    pub(crate) fn closed_by(mut self, end: Option<NodeId>) -> Self {
        self.section_end = end;
        self
    }

    pub(crate) fn set_spec(&mut self, spec: ReleaseSpec) {
        self.spec = spec;
    }
}

/// Release headings in document order (newest first).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentIndex {
    headings: Vec<Heading>,
}

impl DocumentIndex {
    /// All headings, top to bottom.
    pub fn headings(&self) -> &[Heading] {
        &self.headings
    }

    /// Number of release headings.
    pub fn len(&self) -> usize {
        self.headings.len()
    }

    /// Whether the document has no release headings.
    pub fn is_empty(&self) -> bool {
        self.headings.is_empty()
    }

    /// Iterate over headings, top to bottom.
    pub fn iter(&self) -> std::slice::Iter<'_, Heading> {
        self.headings.iter()
    }

    /// The top heading.
    pub fn first(&self) -> Option<&Heading> {
        self.headings.first()
    }

    /// The Unreleased heading, if the document has one.
    pub fn unreleased(&self) -> Option<&Heading> {
        self.first().filter(|heading| heading.spec.is_unreleased())
    }

    /// The newest release.
    pub fn latest_release(&self) -> Option<&Release> {
        self.headings.iter().find_map(|heading| heading.spec.release())
    }

    pub(crate) fn first_mut(&mut self) -> Option<&mut Heading> {
        self.headings.first_mut()
    }

    pub(crate) fn prepend(&mut self, heading: Heading) {
        self.headings.insert(0, heading);
    }
}

impl<'a> IntoIterator for &'a DocumentIndex {
    type Item = &'a Heading;
    type IntoIter = std::slice::Iter<'a, Heading>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Index the release headings of `document`.
///
/// Problems are recorded in `diagnostics`; callers must check for fatal
/// entries before trusting the result.
#[instrument(skip_all, fields(blocks = document.len()))]
pub fn build_index(document: &Document, diagnostics: &mut Diagnostics) -> DocumentIndex {
    let mut headings: Vec<Heading> = Vec::new();
    let mut after_definitions = false;

    for block in document.blocks() {
        match block.kind() {
            BlockKind::Heading { depth, children } if *depth == RELEASE_HEADING_DEPTH => {
                let Some(spec) = parse_heading(children, block.span(), diagnostics) else {
                    continue;
                };
                if after_definitions {
                    diagnostics.fatal("definitions must be located at the end", block.span());
                    continue;
                }
                if let Some(previous) = headings.last_mut() {
                    previous.section_end = Some(block.id());
                }
                headings.push(Heading::new(block.id(), spec, block.span()));
            }
            BlockKind::Definition(_) => {
                if !after_definitions
                    && let Some(previous) = headings.last_mut()
                {
                    previous.section_end = Some(block.id());
                    after_definitions = true;
                }
            }
            _ => {}
        }
    }

    validate(&headings, diagnostics);
    debug!(headings = headings.len(), "indexed release headings");
    DocumentIndex { headings }
}

fn validate(headings: &[Heading], diagnostics: &mut Diagnostics) {
    let mut seen_unreleased = false;
    for (position, heading) in headings.iter().enumerate() {
        if !heading.spec.is_unreleased() {
            continue;
        }
        if seen_unreleased {
            diagnostics.fatal("there must be at most one Unreleased section", heading.span);
        } else if position != 0 {
            diagnostics.fatal(
                "the Unreleased section must come before all releases",
                heading.span,
            );
        }
        seen_unreleased = true;
    }

    let releases: Vec<(&Release, Option<Span>)> = headings
        .iter()
        .filter_map(|heading| heading.spec.release().map(|release| (release, heading.span)))
        .collect();
    for pair in releases.windows(2) {
        let [(newer, _), (older, span)] = pair else {
            continue;
        };
        if newer.version <= older.version {
            diagnostics.push(
                Diagnostics::error("releases must be listed newest first", *span)
                    .with_context(
                        format!("a version lower than {}", newer.version),
                        older.version.to_string(),
                    ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;

    fn index(markdown: &str) -> (Document, DocumentIndex, Diagnostics) {
        let document = Document::parse(markdown).unwrap();
        let mut diagnostics = Diagnostics::new();
        let index = build_index(&document, &mut diagnostics);
        (document, index, diagnostics)
    }

    fn messages(diagnostics: &Diagnostics) -> Vec<&str> {
        diagnostics
            .entries()
            .iter()
            .map(|d| d.message.as_str())
            .collect()
    }

    const VALID: &str = "# Changelog

Intro text.

## [Unreleased]

- Pending

## [1.1.0] - 2022-02-01

- Second

## [1.0.0] - 2022-01-01

- First

[unreleased]: https://example.com/compare/v1.1.0...HEAD
[1.1.0]: https://example.com/compare/v1.0.0...v1.1.0
[1.0.0]: https://example.com/releases/tag/v1.0.0
";

    #[test]
    fn indexes_headings_in_order() {
        let (_, index, diagnostics) = index(VALID);
        assert!(!diagnostics.has_fatal());
        assert_eq!(index.len(), 3);
        assert!(index.unreleased().is_some());
        assert_eq!(
            index.latest_release().map(|r| r.version.clone()),
            Some(Version::new(1, 1, 0))
        );
    }

    #[test]
    fn sections_end_at_next_heading_then_first_definition() {
        let (document, index, _) = index(VALID);
        let headings = index.headings();
        assert_eq!(headings[0].section_end(), Some(headings[1].node()));
        assert_eq!(headings[1].section_end(), Some(headings[2].node()));

        let end = headings[2].section_end().unwrap();
        let position = document.position_of(end).unwrap();
        assert!(document.blocks()[position].is_definition());
        assert!(!document.blocks()[position - 1].is_definition());
    }

    #[test]
    fn last_section_without_definitions_is_open() {
        let (_, index, _) = index("## [1.0.0] - 2022-01-01\n\n- First\n");
        assert_eq!(index.headings()[0].section_end(), None);
    }

    #[test]
    fn other_heading_levels_are_ignored() {
        let (_, index, diagnostics) =
            index("# Title\n\n## 1.0.0 - 2022-01-01\n\n### Added\n\n- Thing\n");
        assert!(!diagnostics.has_fatal());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn empty_document_has_no_headings() {
        let (_, index, diagnostics) = index("");
        assert!(index.is_empty());
        assert!(diagnostics.entries().is_empty());
        assert!(index.latest_release().is_none());
    }

    #[test]
    fn ascending_versions_are_fatal() {
        let (_, _, diagnostics) =
            index("## 1.0.0 - 2022-01-01\n\n- a\n\n## 1.1.0 - 2022-02-01\n\n- b\n");
        assert!(diagnostics.has_fatal());
        assert_eq!(messages(&diagnostics), ["releases must be listed newest first"]);
    }

    #[test]
    fn equal_versions_are_fatal() {
        let (_, _, diagnostics) =
            index("## 1.0.0 - 2022-02-01\n\n## 1.0.0 - 2022-01-01\n");
        assert!(diagnostics.has_fatal());
    }

    #[test]
    fn every_out_of_order_pair_is_reported() {
        let (_, _, diagnostics) = index(
            "## 1.0.0 - 2022-01-01\n\n## 2.0.0 - 2022-02-01\n\n## 1.0.0 - 2022-03-01\n\n## 3.0.0 - 2022-04-01\n",
        );
        assert_eq!(
            messages(&diagnostics),
            [
                "releases must be listed newest first",
                "releases must be listed newest first"
            ]
        );
        let lines: Vec<usize> = diagnostics
            .entries()
            .iter()
            .filter_map(|d| d.span.map(|span| span.start_line))
            .collect();
        assert_eq!(lines, [3, 7]);
    }

    #[test]
    fn unreleased_must_be_first() {
        let (_, _, diagnostics) =
            index("## 1.0.0 - 2022-01-01\n\n## Unreleased\n");
        assert_eq!(
            messages(&diagnostics),
            ["the Unreleased section must come before all releases"]
        );
    }

    #[test]
    fn duplicate_unreleased_is_fatal() {
        let (_, _, diagnostics) = index("## Unreleased\n\n## [Unreleased]\n");
        assert_eq!(
            messages(&diagnostics),
            ["there must be at most one Unreleased section"]
        );
    }

    #[test]
    fn definitions_between_sections_are_fatal() {
        let (_, _, diagnostics) = index(
            "## Unreleased\n\n[x]: https://example.com\n\n## 1.0.0 - 2022-01-01\n\n## 0.9.0 - 2021-01-01\n",
        );
        assert_eq!(
            messages(&diagnostics),
            [
                "definitions must be located at the end",
                "definitions must be located at the end"
            ]
        );
        let lines: Vec<usize> = diagnostics
            .entries()
            .iter()
            .filter_map(|d| d.span.map(|span| span.start_line))
            .collect();
        assert_eq!(lines, [5, 7]);
    }

    #[test]
    fn headings_after_trailing_definitions_are_not_indexed() {
        let (_, index, diagnostics) = index(
            "## 1.0.0 - 2022-01-01

- a

[1.0.0]: https://example.com

## 0.9.0 - 2021-01-01
",
        );
        assert_eq!(index.len(), 1);
        assert_eq!(diagnostics.entries().len(), 1);
        assert_eq!(diagnostics.entries()[0].span.map(|s| s.start_line), Some(7));
    }

    #[test]
    fn definitions_before_any_heading_are_ignored() {
        let (_, index, diagnostics) =
            index("[x]: https://example.com\n\n## 1.0.0 - 2022-01-01\n\n- a\n");
        assert!(!diagnostics.has_fatal());
        assert_eq!(index.headings()[0].section_end(), None);
    }

    #[test]
    fn malformed_heading_does_not_stop_the_pass() {
        let (_, index, diagnostics) = index(
            "## notaversion\n\n## 1.0.0 - 2022-01-01\n\n## 2.0.0 - 2022-02-01\n",
        );
        assert_eq!(
            messages(&diagnostics),
            [
                "invalid version in release heading",
                "releases must be listed newest first"
            ]
        );
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn unreleased_is_not_compared() {
        let (_, _, diagnostics) =
            index("## Unreleased\n\n## 2.0.0 - 2022-02-01\n\n## 1.0.0 - 2022-01-01\n");
        assert!(diagnostics.entries().is_empty());
    }
}
