use std::sync::LazyLock;

use regex::Regex;

use super::Lexer;
use crate::{
    constants::SPECIAL_SECTION_STYLES,
    diagnostic::{Diagnostic, DiagnosticKind},
    model::{Block, BlockMetadata, Content, Context, Node, Section, generate_id},
    pattern::compile,
    substitution::NORMAL,
};

/// `Title [[id]]` or `Title [[id, reftext]]`; a backslash before the brackets keeps
/// them as text.
static EMBEDDED_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"^(.+?)[ \t]+(\\)?\[\[([[:alpha:]_:][\w:.-]*)(?:,[ \t]*(.+?))?\]\]$")
});

const MAX_LEVEL: u8 = 5;

/// Counters behind `sectnums`, one per level from 1, plus the current appendix letter.
#[derive(Debug, Default)]
pub(super) struct SectionNumbers {
    counters: Vec<u32>,
    appendix: Option<char>,
    appendices: u8,
}

impl SectionNumbers {
    /// The number of the next section at `level`, such as `2.1.` or `B.3.`.
    fn next(&mut self, level: u8, appendix: bool) -> String {
        let depth = usize::from(level.max(1));
        if appendix && depth == 1 {
            let letter = char::from(b'A'.saturating_add(self.appendices));
            self.appendices = self.appendices.saturating_add(1);
            self.appendix = Some(letter);
            self.counters = vec![0];
            return format!("{letter}.");
        }
        if depth == 1 {
            self.appendix = None;
        }
        self.counters.resize(depth, 0);
        if let Some(last) = self.counters.last_mut() {
            *last += 1;
        }
        let mut number = String::new();
        for (index, counter) in self.counters.iter().enumerate() {
            match self.appendix {
                Some(letter) if index == 0 => number.push(letter),
                Some(_) | None => number.push_str(&counter.to_string()),
            }
            number.push('.');
        }
        number
    }
}

/// A section title found ahead of the reader, not yet consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct SectionTitle {
    /// As written, before `leveloffset`.
    pub(super) level: u8,
    pub(super) text: String,
    pub(super) id: Option<String>,
    pub(super) reftext: Option<String>,
    /// 1 for `== Title`, 2 for a title with an underline.
    pub(super) lines: usize,
}

impl SectionTitle {
    fn new(level: u8, text: &str, lines: usize) -> Self {
        let mut title = Self {
            level,
            text: text.to_string(),
            id: None,
            reftext: None,
            lines,
        };
        if let Some(captures) = EMBEDDED_ANCHOR.captures(text) {
            let before = captures.get(1).map_or("", |m| m.as_str());
            if captures.get(2).is_some() {
                title.text = text.replacen("\\[[", "[[", 1);
            } else {
                title.text = before.to_string();
                title.id = captures.get(3).map(|m| m.as_str().to_string());
                title.reftext = captures.get(4).map(|m| m.as_str().to_string());
            }
        }
        title
    }
}

/// `== Title`, `== Title ==`, or with markdown syntax `## Title`.
fn atx_title(text: &str, markdown: bool) -> Option<SectionTitle> {
    let marker = text.chars().next()?;
    if marker != '=' && !(markdown && marker == '#') {
        return None;
    }
    let run = text.chars().take_while(|c| *c == marker).count();
    if !(1..=6).contains(&run) {
        return None;
    }
    let rest = text.get(run..)?;
    if !rest.starts_with([' ', '\t']) {
        return None;
    }
    let mut title = rest.trim();
    let closing: String = std::iter::repeat_n(marker, run).collect();
    if let Some(stripped) = title.strip_suffix(closing.as_str())
        && stripped.ends_with([' ', '\t'])
    {
        title = stripped.trim_end();
    }
    if title.is_empty() {
        return None;
    }
    let level = u8::try_from(run - 1).ok()?;
    Some(SectionTitle::new(level, title, 1))
}

/// A title line followed by an underline of `=`, `-`, `~`, `^` or `+` no more than one
/// character longer or shorter than the title.
fn setext_title(title: &str, underline: &str) -> Option<SectionTitle> {
    let marker = underline.chars().next()?;
    let level = match marker {
        '=' => 0,
        '-' => 1,
        '~' => 2,
        '^' => 3,
        '+' => 4,
        _ => return None,
    };
    let underline_length = underline.chars().count();
    if underline_length < 2 || !underline.chars().all(|c| c == marker) {
        return None;
    }
    if title.starts_with(['.', '[', ' ', '\t']) || !title.chars().any(char::is_alphanumeric) {
        return None;
    }
    let title_length = title.trim_end().chars().count();
    if title_length.abs_diff(underline_length) > 1 {
        return None;
    }
    Some(SectionTitle::new(level, title.trim_end(), 2))
}

impl Lexer<'_, '_> {
    /// The section title at the next line, if there is one. Nothing is consumed.
    pub(super) fn peek_section_title(&mut self) -> Option<SectionTitle> {
        let first = self.reader.read_line(self.state)?;
        let mut title = atx_title(&first.text, self.markdown());
        if title.is_none()
            && self.state.options.compliance.underline_style_section_titles
            && let Some(second) = self.reader.peek_line(self.state)
        {
            title = setext_title(&first.text, &second.text);
        }
        self.reader.unshift(first);
        title
    }

    /// `level` shifted by the `leveloffset` attribute.
    pub(super) fn effective_level(&self, level: u8) -> u8 {
        let offset = self
            .state
            .attributes
            .get("leveloffset")
            .and_then(|offset| offset.trim().parse::<i32>().ok())
            .unwrap_or_default();
        let shifted = (i32::from(level) + offset).clamp(0, i32::from(MAX_LEVEL));
        u8::try_from(shifted).unwrap_or(MAX_LEVEL)
    }

    /// Parse a section whose title is next in the reader, and every block and
    /// subsection up to the next title at its level or above.
    #[tracing::instrument(level = "trace", skip(self, metadata, title), fields(title = %title.text))]
    pub(super) fn parse_section(
        &mut self,
        mut metadata: BlockMetadata,
        title: SectionTitle,
        parent: Option<u8>,
    ) -> Node {
        let location = self.location();
        for _ in 0..title.lines {
            self.reader.read_line(self.state);
        }
        let mut level = self.effective_level(title.level);
        if level == 0 && !self.is_book() {
            self.state.report(
                Diagnostic::error(
                    DiagnosticKind::Structural,
                    "level 0 sections can only be used when doctype is book",
                )
                .at(location.clone()),
            );
            level = 1;
        }
        let expected = parent.map_or(1, |parent| parent + 1);
        if level > expected {
            self.warn(
                location.clone(),
                format!("section title out of sequence: expected level {expected}, got level {level}"),
            );
            level = expected;
        }

        let style = metadata.style.clone();
        let special = style
            .as_deref()
            .is_some_and(|style| SPECIAL_SECTION_STYLES.contains(&style));
        let sectname = match style.as_deref() {
            Some(style) if special => style.to_string(),
            Some(_) | None if self.is_book() && level == 0 => "part".to_string(),
            Some(_) | None if self.is_book() && level == 1 => "chapter".to_string(),
            Some(_) | None => format!("sect{level}"),
        };

        let rendered = self.state.substitute(&title.text, NORMAL);
        if metadata.id.is_none() {
            metadata.id = title.id.clone().or_else(|| self.generated_id(&rendered));
        }
        if metadata.reftext.is_none() {
            metadata.reftext.clone_from(&title.reftext);
        }
        if let Some(id) = metadata.id.as_deref() {
            let reftext = metadata.reftext.clone().or_else(|| Some(rendered.clone()));
            if !self.state.catalog.register_reference(id, reftext) {
                self.warn(location.clone(), format!("id assigned to section already in use: {id}"));
            }
        }

        let appendix = sectname == "appendix";
        let number = self.section_number(level, appendix, special, &sectname);
        tracing::trace!(level, %sectname, number = ?number, "section opened");

        let children = self.parse_sections(Some(level));
        Node::Section(Section {
            context: Context::Section,
            level,
            title: rendered,
            source_title: title.text,
            sectname,
            number,
            special,
            metadata,
            children,
            location,
        })
    }

    /// An id derived from the title when `sectids` is set, made unique with a numeric
    /// suffix.
    fn generated_id(&self, title: &str) -> Option<String> {
        let attributes = &self.state.attributes;
        if !attributes.contains("sectids") {
            return None;
        }
        let prefix = attributes.get("idprefix").unwrap_or_default();
        let separator = attributes.get("idseparator").unwrap_or_default();
        let base = generate_id(title, prefix, separator);
        if !self.state.catalog.contains_id(&base) {
            return Some(base);
        }
        let joiner = if separator.is_empty() { "_" } else { separator };
        (2..)
            .map(|suffix| format!("{base}{joiner}{suffix}"))
            .find(|id| !self.state.catalog.contains_id(id))
    }

    fn section_number(
        &mut self,
        level: u8,
        appendix: bool,
        special: bool,
        sectname: &str,
    ) -> Option<String> {
        let attributes = &self.state.attributes;
        if !(attributes.contains("sectnums") || attributes.contains("numbered")) {
            return None;
        }
        if sectname == "part" || (special && !appendix) {
            return None;
        }
        let max_level = attributes
            .get("sectnumlevels")
            .and_then(|levels| levels.parse::<u8>().ok())
            .unwrap_or(3);
        if level > max_level {
            return None;
        }
        Some(self.numbers.next(level, appendix))
    }

    /// A heading styled `discrete` (or `float`): a title that opens no section.
    pub(super) fn floating_title(&mut self, mut metadata: BlockMetadata, title: SectionTitle) -> Node {
        let location = self.location();
        for _ in 0..title.lines {
            self.reader.read_line(self.state);
        }
        let level = self.effective_level(title.level);
        let rendered = self.state.substitute(&title.text, NORMAL);
        if metadata.id.is_none() {
            metadata.id = title.id.clone().or_else(|| self.generated_id(&rendered));
        }
        metadata.set_attribute("level", level.to_string());
        self.register_id(&metadata, &location);
        let mut block = Block::new(Context::FloatingTitle, metadata, location);
        block.subs = NORMAL.to_vec();
        block.content = Content::Simple {
            lines: vec![title.text],
            text: rendered,
        };
        Node::Block(block)
    }
}
