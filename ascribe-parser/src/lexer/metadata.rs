use std::sync::LazyLock;

use regex::Regex;

use super::{
    AttributeEntry, Lexer,
    delimited::{DelimitedKind, Delimiter},
};
use crate::{
    attributes::AttributeList,
    model::BlockMetadata,
    pattern::compile,
    substitution::NORMAL,
};

/// `[style, positional, name=value]` on a line of its own.
static ATTRIBUTE_LINE: LazyLock<Regex> =
    LazyLock::new(|| compile(r#"^\[(|[ \t]*[\w{,.#"'%].*)\]$"#));

/// `[[id]]` or `[[id, reftext]]` on a line of its own.
static BLOCK_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"^\[\[(?:|([[:alpha:]:_][\w:.-]*)(?:,\s*(\S.*))?)\]\]$")
});

/// `.Title`, but not `..` or `. item`.
static BLOCK_TITLE: LazyLock<Regex> = LazyLock::new(|| compile(r"^\.([^\s.].*)$"));

pub(super) fn is_attribute_line(text: &str) -> bool {
    ATTRIBUTE_LINE.is_match(text)
}

pub(super) fn is_line_comment(text: &str) -> bool {
    text.strip_prefix("//")
        .is_some_and(|rest| !rest.starts_with('/'))
}

/// Headings styled `discrete` (or the older `float`) are not sections.
pub(super) fn is_discrete(metadata: &BlockMetadata) -> bool {
    matches!(metadata.style.as_deref(), Some("discrete" | "float"))
}

impl Lexer<'_, '_> {
    /// Consume the metadata lines in front of the next block. Attribute entries are
    /// applied as they are read, and comments are dropped.
    ///
    /// Returns `None` once the input is exhausted; metadata with no block to attach to
    /// is discarded.
    pub(super) fn collect_metadata(&mut self) -> Option<BlockMetadata> {
        let mut metadata = BlockMetadata::default();
        loop {
            self.reader.skip_blank_lines(self.state);
            let text = self.reader.peek_text(self.state)?;
            if let Some(delimiter) = Delimiter::detect(&text, self.markdown())
                && delimiter.kind == DelimitedKind::Comment
            {
                self.skip_comment_block(&delimiter.close);
                continue;
            }
            if is_line_comment(&text) {
                self.reader.read_line(self.state);
                continue;
            }
            if let Some(entry) = AttributeEntry::parse(&text) {
                self.read_attribute_entry(entry, false);
                continue;
            }
            if let Some(captures) = BLOCK_ANCHOR.captures(&text) {
                self.reader.read_line(self.state);
                if let Some(id) = captures.get(1) {
                    metadata.id = Some(id.as_str().to_string());
                }
                if let Some(reftext) = captures.get(2) {
                    metadata.reftext = Some(reftext.as_str().to_string());
                }
                continue;
            }
            if let Some(captures) = ATTRIBUTE_LINE.captures(&text) {
                self.reader.read_line(self.state);
                let list = captures.get(1).map_or("", |m| m.as_str());
                let parsed = self.parse_attribute_list(list);
                metadata.merge(parsed);
                continue;
            }
            if let Some(captures) = BLOCK_TITLE.captures(&text) {
                self.reader.read_line(self.state);
                let title = captures.get(1).map_or("", |m| m.as_str());
                metadata.title = Some(self.state.substitute(title, NORMAL));
                continue;
            }
            return Some(metadata);
        }
    }

    /// Read an attribute entry that was already parsed from the next line, including
    /// its continuation lines, and apply it.
    pub(super) fn read_attribute_entry(&mut self, mut entry: AttributeEntry, in_header: bool) {
        let Some(line) = self.reader.read_line(self.state) else {
            return;
        };
        while entry.continued_value().is_some() {
            match self.reader.read_line(self.state) {
                Some(next) => entry.continue_with(&next.text),
                None => break,
            }
        }
        entry.apply(self.state, in_header, &line.location);
    }

    pub(super) fn skip_comment_block(&mut self, delimiter: &str) {
        let Some(open) = self.reader.read_line(self.state) else {
            return;
        };
        let body = self
            .reader
            .read_lines_until(self.state, |line| line.text == delimiter);
        if self.reader.read_line(self.state).is_none() {
            self.unterminated(&open, "comment");
        }
        tracing::trace!(lines = body.len(), "skipped comment block");
    }

    /// The metadata given by the text between the brackets of an attribute line.
    ///
    /// The first positional entry may use the shorthand `style#id.role%option`. The
    /// `id`, `role`, `options` (or `opts`), `reftext` and `title` entries fill their
    /// dedicated fields; every other named entry is kept as an attribute.
    pub(super) fn parse_attribute_list(&mut self, source: &str) -> BlockMetadata {
        let list = self.attribute_list(source);
        let mut metadata = BlockMetadata::default();
        let mut positionals = list.positionals().iter();
        if let Some(first) = positionals.next() {
            apply_shorthand(&mut metadata, first.trim());
        }
        metadata.positional = positionals.map(|value| value.trim().to_string()).collect();
        self.apply_named(&mut metadata, &list);
        metadata
    }

    /// Parse bracket content, resolving attribute references first.
    pub(super) fn attribute_list(&mut self, source: &str) -> AttributeList {
        if !source.contains('{') {
            return AttributeList::parse(source);
        }
        let resolved = self.state.attributes.resolve(source);
        self.state.collect_attribute_diagnostics();
        AttributeList::parse(&resolved)
    }

    pub(super) fn apply_named(&mut self, metadata: &mut BlockMetadata, list: &AttributeList) {
        for (name, value) in list.named_entries() {
            match name {
                "id" => metadata.id = Some(value.to_string()),
                "role" => metadata
                    .roles
                    .extend(value.split_whitespace().map(str::to_string)),
                "options" | "opts" => metadata.options.extend(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|option| !option.is_empty())
                        .map(str::to_string),
                ),
                "reftext" => metadata.reftext = Some(value.to_string()),
                "title" => metadata.title = Some(self.state.substitute(value, NORMAL)),
                name => metadata.set_attribute(name, value),
            }
        }
    }
}

/// Split `style#id.role%option` into its parts. An entry containing blanks is a plain
/// style.
fn apply_shorthand(metadata: &mut BlockMetadata, first: &str) {
    if first.is_empty() {
        return;
    }
    if first.contains(char::is_whitespace) || !first.contains(['#', '.', '%']) {
        metadata.style = Some(first.to_string());
        return;
    }
    let mut marker = None;
    let mut current = String::new();
    for c in first.chars() {
        if matches!(c, '#' | '.' | '%') {
            flush_shorthand(metadata, marker, &mut current);
            marker = Some(c);
        } else {
            current.push(c);
        }
    }
    flush_shorthand(metadata, marker, &mut current);
}

fn flush_shorthand(metadata: &mut BlockMetadata, marker: Option<char>, value: &mut String) {
    let value = std::mem::take(value);
    if value.is_empty() {
        return;
    }
    match marker {
        None => metadata.style = Some(value),
        Some('#') => metadata.id = Some(value),
        Some('.') => metadata.roles.push(value),
        Some(_) => metadata.options.push(value),
    }
}
