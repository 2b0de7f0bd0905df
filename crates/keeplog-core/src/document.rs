//! Flat block tree over a parsed markdown document.
//!
//! The changelog pipeline only cares about the top level of a document:
//! level-2 headings, trailing link definitions, and everything in between.
//! [`Document::parse`] runs the `markdown` crate's mdast parser and keeps
//! each root child as a [`Block`] with a stable [`NodeId`]. Blocks the
//! pipeline never touches keep their verbatim source, so they serialize to
//! exactly the bytes they were read from.

use std::fmt;

use markdown::ParseOptions;
use markdown::mdast::{Node, ReferenceKind};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::{ChangelogError, ChangelogResult};

/// Identity of a block within one [`Document`].
///
/// Ids are never reused, so a stored id either names the same block it was
/// taken from or nothing at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u32);

/// Line/column range in the original source (1-based, end exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    /// First line.
    pub start_line: usize,
    /// Column on the first line.
    pub start_column: usize,
    /// Last line.
    pub end_line: usize,
    /// Column on the last line.
    pub end_column: usize,
}

impl From<&markdown::unist::Position> for Span {
    fn from(position: &markdown::unist::Position) -> Self {
        Self {
            start_line: position.start.line,
            start_column: position.start.column,
            end_line: position.end.line,
            end_column: position.end.column,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start_line, self.start_column, self.end_line, self.end_column
        )
    }
}

/// Inline content of a heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    /// Literal text (adjacent text runs are merged).
    Text(String),
    /// Shortcut reference such as `[1.0.0]`.
    LinkReference {
        /// The label as written between the brackets.
        label: String,
    },
    /// Any other inline, kept as its source text.
    Raw(String),
}

impl Inline {
    /// Append this inline's markdown to `out`.
    pub fn write_to(&self, out: &mut String) {
        match self {
            Self::Text(text) | Self::Raw(text) => out.push_str(text),
            Self::LinkReference { label } => {
                out.push('[');
                out.push_str(label);
                out.push(']');
            }
        }
    }
}

/// A link reference definition (`[label]: url "title"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    /// Label as written.
    pub label: String,
    /// Destination URL.
    pub url: String,
    /// Optional title.
    pub title: Option<String>,
}

impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]: {}", self.label, self.url)?;
        if let Some(ref title) = self.title {
            write!(f, " \"{title}\"")?;
        }
        Ok(())
    }
}

/// What a block is, as far as the pipeline is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    /// An ATX or setext heading.
    Heading {
        /// Heading level (1-6).
        depth: u8,
        /// Inline content.
        children: Vec<Inline>,
    },
    /// A link reference definition.
    Definition(Definition),
    /// Paragraphs, lists, code, and everything else.
    Other,
}

/// One top-level node of a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    id: NodeId,
    kind: BlockKind,
    span: Option<Span>,
    source: Option<String>,
}

impl Block {
    /// Stable identity of this block.
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// The block's kind and structured content.
    pub const fn kind(&self) -> &BlockKind {
        &self.kind
    }

    /// Source location, if the block came from parsed input.
    pub const fn span(&self) -> Option<Span> {
        self.span
    }

    /// Whether this is a link reference definition.
    pub const fn is_definition(&self) -> bool {
        matches!(self.kind, BlockKind::Definition(_))
    }

    /// Inline children if this is a heading of the given level.
    pub fn heading_children(&self, level: u8) -> Option<&[Inline]> {
        match self.kind {
            BlockKind::Heading {
                depth,
                ref children,
            } if depth == level => Some(children.as_slice()),
            _ => None,
        }
    }

    /// Render this block as markdown (no trailing newline).
    pub fn to_markdown(&self) -> String {
        if let Some(ref source) = self.source {
            return source.clone();
        }
        match self.kind {
            BlockKind::Heading {
                depth,
                ref children,
            } => {
                let mut out = "#".repeat(usize::from(depth));
                out.push(' ');
                for child in children {
                    child.write_to(&mut out);
                }
                out
            }
            BlockKind::Definition(ref definition) => definition.to_string(),
            BlockKind::Other => String::new(),
        }
    }
}

/// An ordered list of top-level blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    blocks: Vec<Block>,
    next_id: u32,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse markdown (GFM) into a document.
    #[instrument(skip(text), fields(bytes = text.len()))]
    pub fn parse(text: &str) -> ChangelogResult<Self> {
        let tree = markdown::to_mdast(text, &ParseOptions::gfm())
            .map_err(|message| ChangelogError::Markdown(message.to_string()))?;

        let mut document = Self::new();
        for node in tree.children().map(Vec::as_slice).unwrap_or_default() {
            let kind = block_kind(node, text);
            let span = node.position().map(Span::from);
            // List positions run through the closing line ending.
            let source = source_of(node, text).trim_end_matches(['\r', '\n']);
            document.push_block(kind, span, Some(source.to_owned()));
        }

        debug!(blocks = document.blocks.len(), "parsed markdown document");
        Ok(document)
    }

    /// All blocks in document order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of top-level blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the document has no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Current index of the block with `id`.
    pub fn position_of(&self, id: NodeId) -> Option<usize> {
        self.blocks.iter().position(|block| block.id == id)
    }

    /// The block with `id`, if it is still in the document.
    pub fn block(&self, id: NodeId) -> Option<&Block> {
        self.blocks.iter().find(|block| block.id == id)
    }

    /// Insert a new heading directly before `anchor`.
    ///
    /// Returns `None` if `anchor` is not in the document.
    pub fn insert_heading_before(
        &mut self,
        anchor: NodeId,
        depth: u8,
        children: Vec<Inline>,
    ) -> Option<NodeId> {
        let index = self.position_of(anchor)?;
        let block = self.new_block(BlockKind::Heading { depth, children });
        let id = block.id;
        self.blocks.insert(index, block);
        Some(id)
    }

    /// Append a new heading at the end of the document.
    pub fn push_heading(&mut self, depth: u8, children: Vec<Inline>) -> NodeId {
        let block = self.new_block(BlockKind::Heading { depth, children });
        let id = block.id;
        self.blocks.push(block);
        id
    }

    /// Append a new link definition at the end of the document.
    pub fn push_definition(&mut self, definition: Definition) -> NodeId {
        let block = self.new_block(BlockKind::Definition(definition));
        let id = block.id;
        self.blocks.push(block);
        id
    }

    /// Replace the inline content of the heading `id`.
    ///
    /// Returns `false` if `id` is missing or not a heading.
    pub fn set_heading_children(&mut self, id: NodeId, inlines: Vec<Inline>) -> bool {
        let Some(block) = self.blocks.iter_mut().find(|block| block.id == id) else {
            return false;
        };
        let BlockKind::Heading {
            ref mut children, ..
        } = block.kind
        else {
            return false;
        };
        *children = inlines;
        block.source = None;
        true
    }

    /// Remove every link definition, returning how many were dropped.
    pub fn remove_definitions(&mut self) -> usize {
        let before = self.blocks.len();
        self.blocks.retain(|block| !block.is_definition());
        before - self.blocks.len()
    }

    /// Copy the blocks strictly between `after` and `until` into a new,
    /// independent document. With `until == None` the copy runs to the end.
    ///
    /// Returns `None` if either id is missing or `until` precedes `after`.
    pub fn slice(&self, after: NodeId, until: Option<NodeId>) -> Option<Self> {
        let start = self.position_of(after)? + 1;
        let end = match until {
            Some(id) => self.position_of(id)?,
            None => self.blocks.len(),
        };
        let blocks = self.blocks.get(start..end)?.to_vec();
        Some(Self {
            blocks,
            next_id: self.next_id,
        })
    }

    /// Render the document as markdown.
    ///
    /// Blocks are separated by a blank line, consecutive definitions by a
    /// single newline, and non-empty output ends with a newline.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let mut previous: Option<&Block> = None;
        for block in &self.blocks {
            if let Some(prev) = previous {
                let tight = prev.is_definition() && block.is_definition();
                out.push_str(if tight { "\n" } else { "\n\n" });
            }
            out.push_str(&block.to_markdown());
            previous = Some(block);
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }

    fn new_block(&mut self, kind: BlockKind) -> Block {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        Block {
            id,
            kind,
            span: None,
            source: None,
        }
    }

    fn push_block(&mut self, kind: BlockKind, span: Option<Span>, source: Option<String>) {
        let mut block = self.new_block(kind);
        block.span = span;
        block.source = source;
        self.blocks.push(block);
    }
}

fn block_kind(node: &Node, text: &str) -> BlockKind {
    match node {
        Node::Heading(heading) => BlockKind::Heading {
            depth: heading.depth,
            children: inlines(&heading.children, text),
        },
        Node::Definition(definition) => BlockKind::Definition(Definition {
            label: definition
                .label
                .clone()
                .unwrap_or_else(|| definition.identifier.clone()),
            url: definition.url.clone(),
            title: definition.title.clone(),
        }),
        _ => BlockKind::Other,
    }
}

fn inlines(nodes: &[Node], text: &str) -> Vec<Inline> {
    let mut out: Vec<Inline> = Vec::with_capacity(nodes.len());
    for node in nodes {
        let inline = match node {
            Node::Text(t) => match source_of(node, text) {
                "" => Inline::Text(t.value.clone()),
                source => Inline::Text(source.to_owned()),
            },
            Node::LinkReference(reference)
                if matches!(reference.reference_kind, ReferenceKind::Shortcut) =>
            {
                Inline::LinkReference {
                    label: reference
                        .label
                        .clone()
                        .unwrap_or_else(|| reference.identifier.clone()),
                }
            }
            other => Inline::Raw(source_of(other, text).to_owned()),
        };
        if let Inline::Text(ref next) = inline
            && let Some(Inline::Text(prev)) = out.last_mut()
        {
            prev.push_str(next);
            continue;
        }
        out.push(inline);
    }
    out
}

fn source_of<'a>(node: &Node, text: &'a str) -> &'a str {
    node.position()
        .and_then(|position| text.get(position.start.offset..position.end.offset))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# Changelog

## [Unreleased]

- Added a thing

## [1.0.0] - 2022-01-01

- Initial release

[unreleased]: https://github.com/acme/widget/compare/v1.0.0...HEAD
[1.0.0]: https://github.com/acme/widget/releases/tag/v1.0.0
";

    #[test]
    fn parse_flattens_root_children() {
        let doc = Document::parse(SAMPLE).unwrap();
        assert_eq!(doc.len(), 7);
        assert!(doc.blocks()[5].is_definition());
        assert!(doc.blocks()[6].is_definition());
        assert!(doc.blocks()[0].heading_children(1).is_some());
        assert!(doc.blocks()[0].heading_children(2).is_none());
    }

    #[test]
    fn untouched_document_round_trips() {
        let doc = Document::parse(SAMPLE).unwrap();
        assert_eq!(doc.to_markdown(), SAMPLE);
    }

    #[test]
    fn heading_with_definition_becomes_link_reference() {
        let doc = Document::parse(SAMPLE).unwrap();
        let children = doc.blocks()[3].heading_children(2).unwrap();
        assert_eq!(
            children[0],
            Inline::LinkReference {
                label: "1.0.0".into()
            }
        );
        assert_eq!(children[1], Inline::Text(" - 2022-01-01".into()));
    }

    #[test]
    fn heading_without_definition_stays_text() {
        let doc = Document::parse("## [2.0.0] - 2023-05-06\n").unwrap();
        let children = doc.blocks()[0].heading_children(2).unwrap();
        assert_eq!(children, [Inline::Text("[2.0.0] - 2023-05-06".into())]);
    }

    #[test]
    fn spans_are_one_based() {
        let doc = Document::parse(SAMPLE).unwrap();
        let span = doc.blocks()[1].span().unwrap();
        assert_eq!(span.start_line, 3);
        assert_eq!(span.start_column, 1);
    }

    #[test]
    fn rebuilt_heading_renders_canonically() {
        let mut doc = Document::parse("## old\n\ntext\n").unwrap();
        let id = doc.blocks()[0].id();
        assert!(doc.set_heading_children(
            id,
            vec![
                Inline::LinkReference {
                    label: "1.1.0".into()
                },
                Inline::Text(" - 2022-03-31".into()),
            ]
        ));
        assert_eq!(doc.to_markdown(), "## [1.1.0] - 2022-03-31\n\ntext\n");
    }

    #[test]
    fn set_heading_children_rejects_other_blocks() {
        let mut doc = Document::parse("para\n").unwrap();
        let id = doc.blocks()[0].id();
        assert!(!doc.set_heading_children(id, Vec::new()));
    }

    #[test]
    fn definitions_are_joined_tightly() {
        let mut doc = Document::parse("## [Unreleased]\n").unwrap();
        doc.push_definition(Definition {
            label: "unreleased".into(),
            url: "https://example.com/a".into(),
            title: None,
        });
        doc.push_definition(Definition {
            label: "1.0.0".into(),
            url: "https://example.com/b".into(),
            title: Some("First".into()),
        });
        assert_eq!(
            doc.to_markdown(),
            "## [Unreleased]\n\n[unreleased]: https://example.com/a\n[1.0.0]: https://example.com/b \"First\"\n"
        );
    }

    #[test]
    fn remove_definitions_keeps_other_blocks() {
        let mut doc = Document::parse(SAMPLE).unwrap();
        assert_eq!(doc.remove_definitions(), 2);
        assert_eq!(doc.len(), 5);
        assert!(!doc.blocks().iter().any(Block::is_definition));
    }

    #[test]
    fn slice_is_exclusive_on_both_ends() {
        let doc = Document::parse(SAMPLE).unwrap();
        let heading = doc.blocks()[1].id();
        let next = doc.blocks()[3].id();
        let body = doc.slice(heading, Some(next)).unwrap();
        assert_eq!(body.len(), 1);
        assert_eq!(body.to_markdown(), "- Added a thing\n");
    }

    #[test]
    fn slice_to_end_of_document() {
        let doc = Document::parse("## a\n\none\n\ntwo\n").unwrap();
        let heading = doc.blocks()[0].id();
        let body = doc.slice(heading, None).unwrap();
        assert_eq!(body.to_markdown(), "one\n\ntwo\n");
    }

    #[test]
    fn slice_of_adjacent_nodes_is_empty() {
        let doc = Document::parse("## a\n\n## b\n").unwrap();
        let body = doc
            .slice(doc.blocks()[0].id(), Some(doc.blocks()[1].id()))
            .unwrap();
        assert!(body.is_empty());
        assert_eq!(body.to_markdown(), "");
    }

    #[test]
    fn inserted_heading_gets_fresh_id() {
        let mut doc = Document::parse("## a\n\n## b\n").unwrap();
        let anchor = doc.blocks()[1].id();
        let id = doc
            .insert_heading_before(anchor, 2, vec![Inline::Text("new".into())])
            .unwrap();
        assert_eq!(doc.position_of(id), Some(1));
        assert!(doc.blocks().iter().filter(|b| b.id() == id).count() == 1);
        assert_eq!(doc.to_markdown(), "## a\n\n## new\n\n## b\n");
    }

    #[test]
    fn tight_and_loose_lists_round_trip() {
        let input = "# Changelog

## [1.0.0] - 2022-01-01

### Added

- One
- Two

### Fixed

- Three

- Four

## [0.1.0] - 2021-12-01

1. Only
";
        let doc = Document::parse(input).unwrap();
        assert_eq!(doc.to_markdown(), input);
    }

    #[test]
    fn list_between_headings_keeps_single_blank_line() {
        let doc = Document::parse("## a\n\n- x\n\n## b\n").unwrap();
        assert_eq!(doc.to_markdown(), "## a\n\n- x\n\n## b\n");
        let body = doc
            .slice(doc.blocks()[0].id(), Some(doc.blocks()[2].id()))
            .unwrap();
        assert_eq!(body.to_markdown(), "- x\n");
    }

    #[test]
    fn heading_text_keeps_escapes_and_entities() {
        let doc = Document::parse("## 1.0.0 - 2022-01-01 \\*not emphasis\\* &amp; more\n").unwrap();
        let children = doc.blocks()[0].heading_children(2).unwrap();
        assert_eq!(
            children,
            [Inline::Text(
                "1.0.0 - 2022-01-01 \\*not emphasis\\* &amp; more".into()
            )]
        );
    }

    #[test]
    fn empty_document_serializes_to_nothing() {
        let doc = Document::parse("").unwrap();
        assert!(doc.is_empty());
        assert_eq!(doc.to_markdown(), "");
    }
}
