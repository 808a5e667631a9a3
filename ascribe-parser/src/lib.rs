//! `ascribe-parser` turns `AsciiDoc`-style markup into a typed document tree.
//!
//! Parsing runs in three stages over one [`ParserState`](state::ParserState):
//!
//! - the reader pulls source lines, resolving `ifdef`/`ifndef`/`ifeval`
//!   conditionals and `include::` directives as it goes,
//! - the lexer groups lines into sections, blocks, lists and tables,
//! - the substitutor rewrites the text of each leaf block (special characters,
//!   quotes, attribute references, replacements, macros, hard breaks).
//!
//! The result is a [`Document`]. Problems the parser recovers from are reported as
//! [`Diagnostic`] values next to it; only unsupported input and security violations
//! (or any error, in strict mode) fail the parse.
//!
//! ```
//! use ascribe_parser::{Options, Node, parse};
//!
//! let document = parse("= Hello\n\nA *bold* start.", &Options::default())?;
//! assert_eq!(document.title(), Some("Hello"));
//! let Some(Node::Block(paragraph)) = document.children.first() else {
//!     unreachable!("one paragraph");
//! };
//! assert_eq!(paragraph.text(), Some("A <strong>bold</strong> start."));
//! # Ok::<(), ascribe_parser::Error>(())
//! ```
use std::io::Read;

mod attributes;
mod constants;
mod diagnostic;
mod error;
mod inline;
mod lexer;
mod model;
mod options;
mod pattern;
mod reader;
mod state;
mod substitution;

#[cfg(test)]
mod proptests;

pub use ascribe_core::{Doctype, SafeMode};
pub use attributes::{
    AttributeList, AttributeMissing, AttributeStore, AttributeUndefined, AttributeValue,
    FLEXIBLE_ATTRIBUTES, intrinsic,
};
pub use diagnostic::{Diagnostic, DiagnosticKind, Severity};
pub use error::{Error, SourceLocation};
pub use inline::{Html5Converter, Inline, InlineConverter, MathNotation, MediaKind, QuoteKind};
pub use model::{
    Author, Block, BlockMetadata, Catalog, Cell, CellContent, CellSpec, CellStyle, Column,
    Content, Context, Document, Footnote, Header, HorizontalAlignment, List, ListItem, ListKind,
    Node, OrderedStyle, Reference, Revision, Row, Section, Table, TableFormat, VerticalAlignment,
};
pub use options::{Compliance, Options, OptionsBuilder};
pub use reader::{
    IncludeError, IncludeRequest, IncludeResolver, IncludeSelector, Line, LineRange,
    MemoryResolver, TagFilter,
};
pub use substitution::{HEADER, NONE, NORMAL, Substitution, VERBATIM};

use crate::{reader::Reader, state::ParserState};

/// Input to [`parse`]: a whole text or its lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Text(String),
    Lines(Vec<String>),
}

impl From<&str> for Source {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Source {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<String>> for Source {
    fn from(lines: Vec<String>) -> Self {
        Self::Lines(lines)
    }
}

impl From<&[&str]> for Source {
    fn from(lines: &[&str]) -> Self {
        Self::Lines(lines.iter().map(ToString::to_string).collect())
    }
}

impl Source {
    /// Split into lines with a leading byte order mark, carriage returns and trailing
    /// whitespace removed.
    fn into_lines(self) -> Vec<String> {
        let lines = match self {
            Self::Text(text) => text.lines().map(str::to_string).collect(),
            Self::Lines(lines) => lines,
        };
        lines
            .into_iter()
            .enumerate()
            .map(|(index, line)| {
                let line = if index == 0 {
                    line.strip_prefix('\u{feff}').unwrap_or(&line)
                } else {
                    &line
                };
                line.trim_end().to_string()
            })
            .collect()
    }
}

/// A parsed document and the problems recovered from while building it.
#[derive(Debug, Clone)]
pub struct Parsed {
    pub document: Document,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse a document.
///
/// # Errors
///
/// Fails on a security violation the active safe mode treats as fatal, or, in strict
/// mode, on the first error-severity diagnostic.
pub fn parse(source: impl Into<Source>, options: &Options) -> Result<Document, Error> {
    parse_with_diagnostics(source, options).map(|parsed| parsed.document)
}

/// Parse a document, keeping the diagnostics.
///
/// # Errors
///
/// See [`parse`].
#[tracing::instrument(skip_all, fields(source = options.source_name.as_deref()))]
pub fn parse_with_diagnostics(
    source: impl Into<Source>,
    options: &Options,
) -> Result<Parsed, Error> {
    let lines = source.into().into_lines();
    let mut state = ParserState::new(options);
    let reader = Reader::new(lines, options.source_name.clone());
    let (header, children) = lexer::parse_document(reader, &mut state);
    state.collect_attribute_diagnostics();
    if let Some(error) = state.fatal.take() {
        return Err(error);
    }
    if options.strict
        && let Some(diagnostic) = state.diagnostics.first_error()
    {
        return Err(diagnostic.clone().into_error());
    }
    tracing::debug!(
        blocks = children.len(),
        diagnostics = state.diagnostics.len(),
        "document parsed"
    );
    let document = Document {
        doctype: state.doctype(),
        safe_mode: state.safe_mode(),
        header,
        attributes: state.attributes,
        children,
        catalog: state.catalog,
    };
    Ok(Parsed {
        document,
        diagnostics: state.diagnostics.into_vec(),
    })
}

/// Parse a document read from `reader`, which must yield UTF-8.
///
/// # Errors
///
/// Fails with [`Error::Io`] when reading fails and [`Error::Input`] when the bytes are
/// not UTF-8, then as [`parse_with_diagnostics`].
pub fn parse_reader<R: Read>(mut reader: R, options: &Options) -> Result<Parsed, Error> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let text = String::from_utf8(bytes)
        .map_err(|error| Error::Input(format!("input is not valid UTF-8: {error}")))?;
    parse_with_diagnostics(text, options)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_normalizes_lines() -> Result<(), Error> {
        let document = parse("\u{feff}= Title  \r\n\r\nbody text\t\r\n", &Options::default())?;
        assert_eq!(document.title(), Some("Title"));
        let Some(Node::Block(paragraph)) = document.children.first() else {
            return Err(Error::Input("expected a paragraph".to_string()));
        };
        assert_eq!(paragraph.text(), Some("body text"));
        Ok(())
    }

    #[test]
    fn test_lines_source() -> Result<(), Error> {
        let lines: &[&str] = &["== Section", "", "text"];
        let document = parse(lines, &Options::default())?;
        assert_eq!(document.children.first().map(Node::context), Some(Context::Section));
        Ok(())
    }

    #[test]
    fn test_reader_rejects_invalid_utf8() {
        let bytes: &[u8] = &[0x66, 0x6f, 0xff, 0x6f];
        let result = parse_reader(bytes, &Options::default());
        assert!(matches!(result, Err(Error::Input(..))));
    }

    #[test]
    fn test_reader_parses_utf8() -> Result<(), Error> {
        let parsed = parse_reader("caf\u{e9} & more".as_bytes(), &Options::default())?;
        let Some(Node::Block(paragraph)) = parsed.document.children.first() else {
            return Err(Error::Input("expected a paragraph".to_string()));
        };
        assert_eq!(paragraph.text(), Some("caf\u{e9} &amp; more"));
        Ok(())
    }

    #[test]
    fn test_diagnostics_are_returned_beside_the_document() -> Result<(), Error> {
        let parsed = parse_with_diagnostics("----\nnever closed", &Options::default())?;
        assert_eq!(parsed.document.children.len(), 1);
        assert_eq!(
            parsed
                .diagnostics
                .iter()
                .map(|diagnostic| diagnostic.message.as_str())
                .collect::<Vec<_>>(),
            vec!["unterminated listing block"]
        );
        Ok(())
    }

    #[test]
    fn test_strict_mode_fails() {
        let options = Options::builder().with_strict().build();
        let result = parse("----\nnever closed", &options);
        assert!(matches!(result, Err(Error::UnterminatedBlock(..))));
    }

    #[test]
    fn test_document_defaults() -> Result<(), Error> {
        let document = parse("text", &Options::default())?;
        assert_eq!(document.safe_mode, SafeMode::Secure);
        assert_eq!(document.doctype, Doctype::Article);
        assert!(document.header.is_none());
        Ok(())
    }
}
