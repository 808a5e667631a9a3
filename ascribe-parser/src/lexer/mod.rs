//! Block-level parsing: turns the reader's lines into sections, blocks, lists and
//! tables.
//!
//! The lexer is a recursive descent over line groups. Each block starts with the
//! metadata lines in front of it (block title, anchor, attribute list, attribute
//! entries), then the first content line decides what kind of block follows. Compound
//! blocks (example, sidebar, quote, open, `a` table cells, list continuations) are
//! parsed by a nested lexer over the lines they enclose, sharing the same
//! [`ParserState`].
mod attribute_entry;
mod block;
mod delimited;
mod header;
mod list;
mod metadata;
mod section;
mod table;

use ascribe_core::Doctype;

use crate::{
    diagnostic::{Diagnostic, DiagnosticKind},
    error::SourceLocation,
    model::{BlockMetadata, Header, Node},
    reader::{Line, Reader},
    state::ParserState,
};

pub(crate) use attribute_entry::AttributeEntry;

use section::SectionNumbers;

/// Where a run of blocks is being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// A document or section body: section titles open sections.
    Section,
    /// The body of a compound block or an `a` table cell.
    Block,
    /// Content attached to a list item: list markers and continuation lines end
    /// paragraphs.
    ListItem,
}

pub(crate) struct Lexer<'s, 'o> {
    reader: Reader,
    state: &'s mut ParserState<'o>,
    /// Metadata read ahead of a section title that closes the section being parsed.
    /// The enclosing section loop picks it up.
    pending: Option<BlockMetadata>,
    numbers: SectionNumbers,
}

/// Parse a whole document: the header, then the body.
#[tracing::instrument(level = "trace", skip_all)]
pub(crate) fn parse_document(reader: Reader, state: &mut ParserState) -> (Option<Header>, Vec<Node>) {
    let mut lexer = Lexer::new(reader, state);
    let header = lexer.parse_header();
    let children = lexer.parse_sections(None);
    (header, children)
}

impl<'s, 'o> Lexer<'s, 'o> {
    pub(crate) fn new(reader: Reader, state: &'s mut ParserState<'o>) -> Self {
        Self {
            reader,
            state,
            pending: None,
            numbers: SectionNumbers::default(),
        }
    }

    /// A lexer over lines this one already read, such as the body of a delimited block.
    fn nested(&mut self, lines: Vec<Line>, location: SourceLocation) -> Lexer<'_, 'o> {
        Lexer::new(Reader::from_lines(lines, location), &mut *self.state)
    }

    fn markdown(&self) -> bool {
        self.state.options.compliance.markdown_syntax
    }

    fn is_book(&self) -> bool {
        self.state.doctype() == Doctype::Book
    }

    fn location(&mut self) -> SourceLocation {
        self.reader.location(self.state)
    }

    fn warn(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.state
            .report(Diagnostic::warning(DiagnosticKind::Structural, message).at(location));
    }

    /// The metadata of the next block: whatever a closed section left behind, or the
    /// metadata lines ahead. `None` at the end of input.
    fn next_metadata(&mut self) -> Option<BlockMetadata> {
        if self.state.is_aborted() {
            return None;
        }
        match self.pending.take() {
            Some(metadata) => Some(metadata),
            None if self.reader.has_more_lines(self.state) => self.collect_metadata(),
            None => None,
        }
    }

    /// Parse a document or section body. With `parent` set, stops in front of the first
    /// section title at `parent`'s level or above, leaving its metadata pending.
    #[tracing::instrument(level = "trace", skip(self))]
    fn parse_sections(&mut self, parent: Option<u8>) -> Vec<Node> {
        let mut children = Vec::new();
        while let Some(metadata) = self.next_metadata() {
            if !metadata::is_discrete(&metadata)
                && let Some(title) = self.peek_section_title()
            {
                let level = self.effective_level(title.level);
                if parent.is_some_and(|parent| level <= parent) {
                    self.pending = Some(metadata);
                    break;
                }
                children.push(self.parse_section(metadata, title, parent));
                continue;
            }
            if let Some(node) = self.next_block(metadata, Scope::Section) {
                children.push(node);
            }
        }
        children
    }

    /// Parse blocks until the reader runs dry. Section titles are not recognized.
    #[tracing::instrument(level = "trace", skip(self))]
    fn parse_blocks(&mut self, scope: Scope) -> Vec<Node> {
        let mut children = Vec::new();
        while let Some(metadata) = self.next_metadata() {
            if let Some(node) = self.next_block(metadata, scope) {
                children.push(node);
            }
        }
        children
    }

    /// Register the id carried by a block's metadata in the document catalog.
    fn register_id(&mut self, metadata: &BlockMetadata, location: &SourceLocation) {
        let Some(id) = metadata.id.as_deref() else {
            return;
        };
        let reftext = metadata.reftext.clone().or_else(|| metadata.title.clone());
        if !self.state.catalog.register_reference(id, reftext) {
            self.warn(
                location.clone(),
                format!("id assigned to block already in use: {id}"),
            );
        }
    }
}
