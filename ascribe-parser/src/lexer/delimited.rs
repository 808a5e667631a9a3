use super::{Lexer, Scope};
use crate::{
    constants::ADMONITION_STYLES,
    diagnostic::{Diagnostic, DiagnosticKind},
    error::{Error, SourceLocation},
    model::{Block, BlockMetadata, Content, Context, Node, TableFormat},
    reader::Line,
};

/// The block types that are opened and closed by a delimiter line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DelimitedKind {
    Comment,
    Example,
    Fenced,
    Listing,
    Literal,
    Open,
    Pass,
    Quote,
    Sidebar,
    Table(TableFormat, char),
}

impl DelimitedKind {
    pub(super) fn name(self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::Example => "example",
            Self::Fenced => "fenced code",
            Self::Listing => "listing",
            Self::Literal => "literal",
            Self::Open => "open",
            Self::Pass => "pass",
            Self::Quote => "quote",
            Self::Sidebar => "sidebar",
            Self::Table(..) => "table",
        }
    }

    fn context(self) -> Context {
        match self {
            Self::Comment => Context::Comment,
            Self::Example => Context::Example,
            Self::Fenced | Self::Listing => Context::Listing,
            Self::Literal => Context::Literal,
            Self::Open => Context::Open,
            Self::Pass => Context::Passthrough,
            Self::Quote => Context::Quote,
            Self::Sidebar => Context::Sidebar,
            Self::Table(..) => Context::Table,
        }
    }

    /// The styles a block of this kind may take on instead of its own; `admonition`
    /// stands for any admonition label.
    fn masquerades(self) -> &'static [&'static str] {
        match self {
            Self::Open => &[
                "comment",
                "example",
                "literal",
                "listing",
                "pass",
                "quote",
                "sidebar",
                "source",
                "verse",
                "admonition",
                "abstract",
                "partintro",
            ],
            Self::Listing => &["literal", "source"],
            Self::Literal => &["listing", "source"],
            Self::Example => &["admonition"],
            Self::Quote => &["verse"],
            Self::Pass => &["stem", "latexmath", "asciimath"],
            Self::Comment | Self::Fenced | Self::Sidebar | Self::Table(..) => &[],
        }
    }

    fn accepts(self, style: &str) -> bool {
        let masquerades = self.masquerades();
        masquerades.contains(&style)
            || (masquerades.contains(&"admonition") && ADMONITION_STYLES.contains(&style))
    }
}

/// A delimiter line and the line that closes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Delimiter {
    pub(super) kind: DelimitedKind,
    /// The exact line that closes the block.
    pub(super) close: String,
    /// The language after a fenced code opener.
    pub(super) language: Option<String>,
}

impl Delimiter {
    /// Recognize a delimiter line. Leaders of four or more characters may be any length;
    /// the open block (`--`) and air quotes (`""`) have a fixed length, and table
    /// delimiters are a separator followed by at least three `=`.
    pub(super) fn detect(line: &str, markdown: bool) -> Option<Self> {
        let simple = |kind| {
            Some(Self {
                kind,
                close: line.to_string(),
                language: None,
            })
        };
        match line {
            "--" => return simple(DelimitedKind::Open),
            "\"\"" => return simple(DelimitedKind::Quote),
            _ => {}
        }
        let mut chars = line.chars();
        let first = chars.next()?;
        if markdown && (line.starts_with("```") || line.starts_with("~~~")) {
            let fence_length = line.chars().take_while(|c| *c == first).count();
            let fence: String = std::iter::repeat_n(first, fence_length).collect();
            let language = line.get(fence.len()..).map_or("", str::trim);
            return Some(Self {
                kind: DelimitedKind::Fenced,
                close: fence,
                language: (!language.is_empty()).then(|| language.to_string()),
            });
        }
        let rest = chars.as_str();
        let table_format = match first {
            '|' | '!' => Some(TableFormat::Psv),
            ',' => Some(TableFormat::Csv),
            ':' => Some(TableFormat::Dsv),
            _ => None,
        };
        if let Some(format) = table_format
            && rest.len() >= 3
            && rest.bytes().all(|b| b == b'=')
        {
            return simple(DelimitedKind::Table(format, first));
        }
        if line.len() < 4 || !rest.chars().all(|c| c == first) {
            return None;
        }
        simple(match first {
            '/' => DelimitedKind::Comment,
            '=' => DelimitedKind::Example,
            '-' => DelimitedKind::Listing,
            '.' => DelimitedKind::Literal,
            '+' => DelimitedKind::Pass,
            '_' => DelimitedKind::Quote,
            '*' => DelimitedKind::Sidebar,
            _ => return None,
        })
    }
}

/// The context a style gives a delimited block. `None` drops the block.
fn styled_context(style: &str) -> Option<Context> {
    Some(match style {
        "comment" => return None,
        "example" => Context::Example,
        "literal" => Context::Literal,
        "listing" | "source" => Context::Listing,
        "pass" => Context::Passthrough,
        "quote" => Context::Quote,
        "sidebar" => Context::Sidebar,
        "verse" => Context::Verse,
        "stem" | "latexmath" | "asciimath" => Context::Stem,
        style if ADMONITION_STYLES.contains(&style) => Context::Admonition,
        _ => Context::Open,
    })
}

impl Lexer<'_, '_> {
    /// Parse the delimited block opened by the next line.
    #[tracing::instrument(level = "trace", skip(self, metadata))]
    pub(super) fn parse_delimited(
        &mut self,
        mut metadata: BlockMetadata,
        delimiter: Delimiter,
    ) -> Option<Node> {
        let open = self.reader.read_line(self.state)?;
        let kind = delimiter.kind;
        tracing::trace!(block = kind.name(), location = %open.location, "block opened");
        let body = self
            .reader
            .read_lines_until(self.state, |line| line.text == delimiter.close);
        if self.reader.read_line(self.state).is_none() {
            self.unterminated(&open, kind.name());
        }
        tracing::trace!(block = kind.name(), lines = body.len(), "block closed");

        let location = open.location;
        if let DelimitedKind::Table(format, separator) = kind {
            self.register_id(&metadata, &location);
            return Some(Node::Table(
                self.parse_table(metadata, format, separator, &body, location),
            ));
        }
        if kind == DelimitedKind::Fenced {
            metadata.style = Some("source".to_string());
            if let Some(language) = delimiter.language {
                metadata.positional.insert(0, language);
            }
        }
        let context = match metadata.style.as_deref() {
            None => kind.context(),
            Some(style) if style == kind.name() || style == kind.context().name() => {
                kind.context()
            }
            Some(style) if kind == DelimitedKind::Fenced || kind.accepts(style) => {
                styled_context(style)?
            }
            Some(style) => {
                let message = format!("unknown style for {} block: {style}", kind.name());
                self.warn(location.clone(), message);
                kind.context()
            }
        };
        if context == Context::Comment {
            return None;
        }
        self.register_id(&metadata, &location);
        match context {
            Context::Example
            | Context::Sidebar
            | Context::Quote
            | Context::Open
            | Context::Admonition => {
                Some(self.compound_block(context, metadata, body, location))
            }
            Context::Section
            | Context::Paragraph
            | Context::Listing
            | Context::Literal
            | Context::Verse
            | Context::Passthrough
            | Context::Stem
            | Context::Table
            | Context::Ulist
            | Context::Olist
            | Context::Dlist
            | Context::ListItem
            | Context::Comment
            | Context::FloatingTitle
            | Context::ThematicBreak
            | Context::PageBreak
            | Context::Image
            | Context::Video
            | Context::Audio
            | Context::Toc => Some(self.simple_block(context, metadata, body, location)),
        }
    }

    fn compound_block(
        &mut self,
        context: Context,
        mut metadata: BlockMetadata,
        body: Vec<Line>,
        location: SourceLocation,
    ) -> Node {
        self.decorate(context, &mut metadata);
        let body_location = body
            .first()
            .map_or_else(|| location.clone(), |line| line.location.clone());
        let children = self.nested(body, body_location).parse_blocks(Scope::Block);
        let mut block = Block::new(context, metadata, location);
        block.content = Content::Compound(children);
        Node::Block(block)
    }

    /// Report a block whose closing delimiter never came. Strict mode aborts the parse.
    pub(super) fn unterminated(&mut self, open: &Line, name: &str) {
        if self.state.options.strict {
            self.state.abort(Error::UnterminatedBlock(
                Box::new(open.location.clone()),
                name.to_string(),
            ));
            return;
        }
        self.state.report(
            Diagnostic::error(DiagnosticKind::Structural, format!("unterminated {name} block"))
                .at(open.location.clone()),
        );
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::{Options, diagnostic::Severity, lexer::tests::lex};

    #[rstest]
    #[case("----", Some(DelimitedKind::Listing))]
    #[case("--------", Some(DelimitedKind::Listing))]
    #[case("---", None)]
    #[case("--", Some(DelimitedKind::Open))]
    #[case("====", Some(DelimitedKind::Example))]
    #[case("....", Some(DelimitedKind::Literal))]
    #[case("****", Some(DelimitedKind::Sidebar))]
    #[case("____", Some(DelimitedKind::Quote))]
    #[case("\"\"", Some(DelimitedKind::Quote))]
    #[case("++++", Some(DelimitedKind::Pass))]
    #[case("////", Some(DelimitedKind::Comment))]
    #[case("|===", Some(DelimitedKind::Table(TableFormat::Psv, '|')))]
    #[case("!======", Some(DelimitedKind::Table(TableFormat::Psv, '!')))]
    #[case(",===", Some(DelimitedKind::Table(TableFormat::Csv, ',')))]
    #[case(":===", Some(DelimitedKind::Table(TableFormat::Dsv, ':')))]
    #[case("```", Some(DelimitedKind::Fenced))]
    #[case("-=-=", None)]
    #[case("|==", None)]
    fn test_detect(#[case] line: &str, #[case] expected: Option<DelimitedKind>) {
        assert_eq!(
            Delimiter::detect(line, true).map(|delimiter| delimiter.kind),
            expected
        );
    }

    #[test]
    fn test_fenced_code_language() {
        let delimiter = Delimiter::detect("```rust", true);
        assert_eq!(
            delimiter,
            Some(Delimiter {
                kind: DelimitedKind::Fenced,
                close: "```".to_string(),
                language: Some("rust".to_string()),
            })
        );
        assert_eq!(Delimiter::detect("```rust", false), None);
    }

    #[test]
    fn test_close_needs_the_same_length() {
        let options = Options::default();
        let source = "----\ncode\n-----\nmore\n----\nafter";
        let (_, children, state) = lex(source, &options);
        let [Node::Block(listing), Node::Block(after)] = children.as_slice() else {
            panic!("expected two blocks, got {children:?}");
        };
        assert_eq!(listing.context, Context::Listing);
        assert_eq!(listing.text(), Some("code\n-----\nmore"));
        assert_eq!(after.text(), Some("after"));
        assert_eq!(state.diagnostics.len(), 0);
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_unterminated_block_is_reported() {
        let options = Options::default();
        let (_, children, state) = lex("====\ninside", &options);
        assert_eq!(children.len(), 1);
        let diagnostic = state.diagnostics.first_error().cloned();
        assert_eq!(
            diagnostic.map(|d| (d.severity, d.message)),
            Some((Severity::Error, "unterminated example block".to_string()))
        );
        assert!(logs_contain("unterminated example block"));
    }

    #[test]
    fn test_unterminated_block_aborts_in_strict_mode() {
        let options = Options::builder().with_strict().build();
        let (_, _, state) = lex("----\ncode", &options);
        assert!(matches!(state.fatal, Some(Error::UnterminatedBlock(..))));
    }

    #[test]
    fn test_compound_blocks_nest() {
        let options = Options::default();
        let source = "====\nouter\n\n******\ninner *text*\n******\n====";
        let (_, children, _) = lex(source, &options);
        let [Node::Block(example)] = children.as_slice() else {
            panic!("expected one block, got {children:?}");
        };
        assert_eq!(example.context, Context::Example);
        let [Node::Block(paragraph), Node::Block(sidebar)] = example.children() else {
            panic!("unexpected children {:?}", example.children());
        };
        assert_eq!(paragraph.text(), Some("outer"));
        assert_eq!(sidebar.context, Context::Sidebar);
        assert_eq!(
            sidebar.children().first().and_then(|node| match node {
                Node::Block(block) => block.text(),
                Node::Section(_) | Node::List(_) | Node::Table(_) => None,
            }),
            Some("inner <strong>text</strong>")
        );
    }

    #[rstest]
    #[case("[source,ruby]\n----\nputs 1\n----", Context::Listing, Some("source"))]
    #[case("[verse, Poet]\n____\nline *one*\n____", Context::Verse, Some("verse"))]
    #[case("[NOTE]\n====\nCareful.\n====", Context::Admonition, Some("NOTE"))]
    #[case("[sidebar]\n--\naside\n--", Context::Sidebar, Some("sidebar"))]
    #[case("[stem]\n++++\nx^2\n++++", Context::Stem, Some("stem"))]
    #[case("[verse]\n****\ntext\n****", Context::Sidebar, Some("verse"))]
    fn test_style_masquerade(
        #[case] source: &str,
        #[case] context: Context,
        #[case] style: Option<&str>,
    ) {
        let options = Options::default();
        let (_, children, _) = lex(source, &options);
        assert_eq!(
            children
                .first()
                .map(|node| (node.context(), node.metadata().style.as_deref())),
            Some((context, style))
        );
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_unknown_style_is_reported() {
        let options = Options::default();
        let (_, _, state) = lex("[verse]\n****\ntext\n****", &options);
        assert_eq!(state.diagnostics.len(), 1);
        assert!(logs_contain("unknown style for sidebar block: verse"));
    }

    #[test]
    fn test_comment_blocks_produce_nothing() {
        let options = Options::default();
        let (_, children, _) = lex("[comment]\n--\nnot rendered\n--\n\n////\nnor this\n////", &options);
        assert!(children.is_empty());
    }
}
