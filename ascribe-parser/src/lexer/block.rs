use std::sync::LazyLock;

use regex::Regex;

use super::{
    Lexer, Scope,
    delimited::Delimiter,
    list,
    metadata::{is_attribute_line, is_discrete, is_line_comment},
};
use crate::{
    constants::ADMONITION_STYLES,
    error::SourceLocation,
    inline::MediaKind,
    model::{Block, BlockMetadata, Content, Context, Node},
    pattern::compile,
    reader::Line,
    substitution::{NONE, NORMAL, Substitution, Substitutor, VERBATIM, default_alt, resolve_subs},
};

/// `image::target[attrs]`, `video::target[attrs]` and `audio::target[attrs]` on their
/// own line.
static MEDIA_BLOCK_MACRO: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^(image|video|audio)::(\S|\S.*?\S)\[((?:\\\]|[^\]])*)\]$"));

static TOC_MACRO: LazyLock<Regex> = LazyLock::new(|| compile(r"^toc::\[(.*)\]$"));

static ADMONITION_PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^(NOTE|TIP|IMPORTANT|WARNING|CAUTION):[ \t]+(.*)$"));

/// `'''` and `<<<`, at any length from three.
static BREAK: LazyLock<Regex> = LazyLock::new(|| compile(r"^(?:'{3,}|<{3,})$"));

/// Markdown horizontal rules, indented by at most three spaces.
static MARKDOWN_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"^ {0,3}(?:-{3}|\*{3}|_{3}|- - -|\* \* \*|_ _ _)$")
});

/// The substitutions a block of `context` gets when no `subs` attribute says otherwise.
pub(super) fn default_subs(context: Context) -> &'static [Substitution] {
    match context {
        Context::Listing | Context::Literal => VERBATIM,
        Context::Passthrough | Context::Stem | Context::Comment => NONE,
        Context::Section
        | Context::Paragraph
        | Context::Example
        | Context::Quote
        | Context::Verse
        | Context::Sidebar
        | Context::Table
        | Context::Ulist
        | Context::Olist
        | Context::Dlist
        | Context::ListItem
        | Context::Open
        | Context::Admonition
        | Context::FloatingTitle
        | Context::ThematicBreak
        | Context::PageBreak
        | Context::Image
        | Context::Video
        | Context::Audio
        | Context::Toc => NORMAL,
    }
}

/// The context a styled paragraph takes. `None` drops the paragraph.
fn paragraph_context(style: Option<&str>) -> Option<Context> {
    let Some(style) = style else {
        return Some(Context::Paragraph);
    };
    Some(match style {
        "comment" => return None,
        "source" | "listing" => Context::Listing,
        "literal" => Context::Literal,
        "quote" => Context::Quote,
        "verse" => Context::Verse,
        "pass" => Context::Passthrough,
        "stem" | "latexmath" | "asciimath" => Context::Stem,
        "example" => Context::Example,
        "sidebar" => Context::Sidebar,
        style if ADMONITION_STYLES.contains(&style) => Context::Admonition,
        _ => Context::Paragraph,
    })
}

/// Remove the indentation every non-blank line shares.
fn strip_common_indent(lines: &mut [String]) {
    let indent = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or_default();
    if indent == 0 {
        return;
    }
    for line in lines.iter_mut() {
        *line = line.get(indent..).map(str::to_string).unwrap_or_default();
    }
}

impl Lexer<'_, '_> {
    /// Parse the block starting at the next line, which the caller knows is not blank
    /// and not a section title that opens a section here.
    #[tracing::instrument(level = "trace", skip(self, metadata))]
    pub(super) fn next_block(&mut self, metadata: BlockMetadata, scope: Scope) -> Option<Node> {
        let text = self.reader.peek_text(self.state)?;
        if let Some(delimiter) = Delimiter::detect(&text, self.markdown()) {
            return self.parse_delimited(metadata, delimiter);
        }
        if is_discrete(&metadata)
            && let Some(title) = self.peek_section_title()
        {
            return Some(self.floating_title(metadata, title));
        }
        if let Some(context) = self.break_context(&text) {
            let line = self.reader.read_line(self.state)?;
            self.register_id(&metadata, &line.location);
            return Some(Node::Block(Block::new(context, metadata, line.location)));
        }
        if MEDIA_BLOCK_MACRO.is_match(&text) || TOC_MACRO.is_match(&text) {
            return self.parse_block_macro(metadata);
        }
        if list::is_list_item(&text) {
            return self.parse_list(metadata);
        }
        let indented = text.starts_with([' ', '\t']);
        if indented && metadata.style.is_none() {
            return Some(self.literal_paragraph(metadata, scope));
        }
        self.parse_paragraph(metadata, scope)
    }

    fn break_context(&self, text: &str) -> Option<Context> {
        if BREAK.is_match(text) {
            Some(if text.starts_with('<') {
                Context::PageBreak
            } else {
                Context::ThematicBreak
            })
        } else if self.markdown() && MARKDOWN_BREAK.is_match(text) {
            Some(Context::ThematicBreak)
        } else {
            None
        }
    }

    /// `image::`, `video::`, `audio::` and `toc::` lines. Attribute references are
    /// resolved first; a line dropped by a missing reference yields nothing, and one
    /// that no longer reads as a macro becomes a paragraph.
    fn parse_block_macro(&mut self, mut metadata: BlockMetadata) -> Option<Node> {
        let line = self.reader.read_line(self.state)?;
        let resolved = self.state.attributes.resolve(&line.text);
        self.state.collect_attribute_diagnostics();
        if resolved.is_empty() {
            tracing::trace!(line = %line.text, "block macro dropped by a missing attribute");
            return None;
        }
        let location = line.location.clone();
        let context = if let Some(captures) = TOC_MACRO.captures(&resolved) {
            let list = self.attribute_list(captures.get(1).map_or("", |m| m.as_str()));
            self.apply_named(&mut metadata, &list);
            Context::Toc
        } else if let Some(captures) = MEDIA_BLOCK_MACRO.captures(&resolved) {
            let name = captures.get(1).map_or("", |m| m.as_str());
            let target = captures.get(2).map_or("", |m| m.as_str());
            let source = captures.get(3).map_or("", |m| m.as_str()).replace("\\]", "]");
            let list = self.attribute_list(&source);
            metadata.set_attribute("target", target);
            let (context, names): (Context, &[&str]) = match name {
                "video" => (Context::Video, &["poster", "width", "height"]),
                "audio" => (Context::Audio, &[]),
                _ => (Context::Image, &["alt", "width", "height"]),
            };
            for (index, name) in names.iter().enumerate() {
                if let Some(value) = list.named_or_positional(name, index) {
                    metadata.set_attribute(name, value);
                }
            }
            if context == Context::Image && metadata.attribute("alt").is_none() {
                let alt = default_alt(MediaKind::Image, target);
                metadata.set_attribute("default-alt", alt.clone());
                metadata.set_attribute("alt", alt);
            }
            self.apply_named(&mut metadata, &list);
            context
        } else {
            let line = Line::new(resolved, location.clone());
            self.register_id(&metadata, &location);
            return Some(self.simple_block(Context::Paragraph, metadata, vec![line], location));
        };
        self.register_id(&metadata, &location);
        Some(Node::Block(Block::new(context, metadata, location)))
    }

    /// An indented run of lines, kept verbatim with the shared indentation removed.
    pub(super) fn literal_paragraph(&mut self, metadata: BlockMetadata, scope: Scope) -> Node {
        let location = self.location();
        let lines = self
            .reader
            .read_lines_until(self.state, |line| {
                line.is_blank()
                    || (scope == Scope::ListItem
                        && (line.text == "+"
                            || (!line.text.starts_with([' ', '\t'])
                                && list::is_list_item(&line.text))))
            });
        let mut texts: Vec<String> = lines.into_iter().map(|line| line.text).collect();
        strip_common_indent(&mut texts);
        let lines = texts
            .into_iter()
            .map(|text| Line::new(text, location.clone()))
            .collect();
        self.register_id(&metadata, &location);
        self.simple_block(Context::Literal, metadata, lines, location)
    }

    /// The lines of a paragraph: up to a blank line, or up to a line that opens other
    /// content when such lines end paragraphs.
    pub(super) fn read_paragraph_lines(&mut self, scope: Scope, verbatim: bool) -> Vec<Line> {
        let terminates = self.state.options.compliance.block_terminates_paragraph
            && !(verbatim && self.state.options.compliance.strict_verbatim_paragraphs);
        let markdown = self.markdown();
        let mut lines = Vec::new();
        while let Some(line) = self.reader.peek_line(self.state) {
            let text = line.text.as_str();
            if line.is_blank() {
                break;
            }
            if scope == Scope::ListItem && (text == "+" || list::is_list_item(text)) {
                break;
            }
            if terminates
                && !lines.is_empty()
                && (Delimiter::detect(text, markdown).is_some()
                    || is_attribute_line(text)
                    || list::is_list_item(text))
            {
                break;
            }
            let comment = !verbatim && is_line_comment(text);
            let Some(line) = self.reader.read_line(self.state) else {
                break;
            };
            if !comment {
                lines.push(line);
            }
        }
        lines
    }

    fn parse_paragraph(&mut self, mut metadata: BlockMetadata, scope: Scope) -> Option<Node> {
        let location = self.location();
        let context = paragraph_context(metadata.style.as_deref());
        let verbatim = context.is_some_and(Context::is_verbatim);
        let mut lines = self.read_paragraph_lines(scope, verbatim);
        if lines.is_empty() {
            // A lone terminator line; take it as text so the parse moves on.
            lines.extend(self.reader.read_line(self.state));
        }
        let Some(mut context) = context else {
            tracing::trace!(lines = lines.len(), "comment paragraph dropped");
            return None;
        };
        if context == Context::Paragraph
            && let Some(first) = lines.first_mut()
            && let Some(captures) = ADMONITION_PARAGRAPH.captures(&first.text)
        {
            let label = captures.get(1).map_or("", |m| m.as_str()).to_string();
            first.text = captures.get(2).map_or("", |m| m.as_str()).to_string();
            metadata.style = Some(label);
            context = Context::Admonition;
        }
        self.register_id(&metadata, &location);
        Some(self.simple_block(context, metadata, lines, location))
    }

    /// A block whose content is its lines after substitution.
    pub(super) fn simple_block(
        &mut self,
        context: Context,
        mut metadata: BlockMetadata,
        lines: Vec<Line>,
        location: SourceLocation,
    ) -> Node {
        self.decorate(context, &mut metadata);
        let subs = self.block_subs(&metadata, default_subs(context), &location);
        let mut texts: Vec<String> = lines.into_iter().map(|line| line.text).collect();
        while texts.first().is_some_and(|text| text.trim().is_empty()) {
            texts.remove(0);
        }
        while texts.last().is_some_and(|text| text.trim().is_empty()) {
            texts.pop();
        }
        let source = texts.join("\n");
        let text = Substitutor::new(self.state)
            .with_hardbreaks(metadata.has_option("hardbreaks"))
            .apply(&source, &subs);
        let mut block = Block::new(context, metadata, location);
        block.subs = subs;
        block.content = Content::Simple { lines: texts, text };
        Node::Block(block)
    }

    /// The substitutions for a block: its `subs` attribute applied over `defaults`.
    pub(super) fn block_subs(
        &mut self,
        metadata: &BlockMetadata,
        defaults: &[Substitution],
        location: &SourceLocation,
    ) -> Vec<Substitution> {
        let Some(spec) = metadata.attribute("subs") else {
            return defaults.to_vec();
        };
        let (subs, diagnostics) = resolve_subs(spec, defaults);
        for diagnostic in diagnostics {
            self.state.report(diagnostic.at(location.clone()));
        }
        subs
    }

    /// Fill in the attributes a context derives from its positional attributes.
    pub(super) fn decorate(&mut self, context: Context, metadata: &mut BlockMetadata) {
        if matches!(context, Context::Quote | Context::Verse) {
            let mut positional = metadata.positional.clone().into_iter();
            if let Some(attribution) = positional.next() {
                metadata.set_attribute("attribution", attribution);
            }
            if let Some(citetitle) = positional.next() {
                metadata.set_attribute("citetitle", citetitle);
            }
        } else if context == Context::Listing && metadata.style.as_deref() == Some("source") {
            let language = metadata
                .positional
                .first()
                .filter(|language| !language.is_empty())
                .cloned()
                .or_else(|| self.state.attributes.get("source-language").map(str::to_string));
            if let Some(language) = language {
                metadata.set_attribute("language", language);
            }
        } else if context == Context::Admonition
            && let Some(label) = metadata.style.clone()
        {
            let name = label.to_lowercase();
            let caption = self
                .state
                .attributes
                .get(&format!("{name}-caption"))
                .map_or_else(|| label.clone(), str::to_string);
            metadata.set_attribute("name", name);
            metadata.set_attribute("textlabel", caption);
        }
    }
}
