use std::sync::LazyLock;

use regex::Regex;

use super::{
    Lexer, Scope,
    delimited::Delimiter,
    metadata::{is_attribute_line, is_line_comment},
};
use crate::{
    error::SourceLocation,
    model::{BlockMetadata, Context, List, ListItem, ListKind, Node, OrderedStyle},
    pattern::compile,
    substitution::NORMAL,
};

/// `-`, `*` to `*****`, or a bullet, then the item text.
static UNORDERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^[ \t]*(-|\*{1,5}|\x{2022})[ \t]+(\S.*)$"));

/// `.` to `.....`, `1.`, `a.`, `A.`, `iv)` or `IV)`, then the item text.
static ORDERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^[ \t]*(\.{1,5}|\d+\.|[a-zA-Z]\.|[IVXivx]+\))[ \t]+(\S.*)$"));

/// `term::`, `term:::`, `term::::` or `term;;`, optionally followed by the definition.
static DESCRIPTION_ITEM: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^[ \t]*([^ \t].*?)(:::{0,2}|;;)(?:$|[ \t]+(.*)$)"));

/// Markers that may share a list. A marker of another family starts a nested list.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Family {
    Unordered(String),
    /// Explicit numbering is folded into its dotted depth: `1.` is `.`, `a.` is `..`.
    Ordered(usize),
    Description(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Marker {
    family: Family,
    /// The marker as written.
    text: String,
    /// The style and ordinal of an explicitly numbered item.
    ordinal: Option<(OrderedStyle, u32)>,
    /// The term of a description list entry.
    term: Option<String>,
    /// The text after the marker.
    body: String,
}

fn depth_of(style: OrderedStyle) -> usize {
    match style {
        OrderedStyle::Arabic => 1,
        OrderedStyle::LowerAlpha => 2,
        OrderedStyle::LowerRoman => 3,
        OrderedStyle::UpperAlpha => 4,
        OrderedStyle::UpperRoman => 5,
    }
}

fn style_named(name: &str) -> Option<OrderedStyle> {
    Some(match name {
        "arabic" => OrderedStyle::Arabic,
        "loweralpha" => OrderedStyle::LowerAlpha,
        "upperalpha" => OrderedStyle::UpperAlpha,
        "lowerroman" => OrderedStyle::LowerRoman,
        "upperroman" => OrderedStyle::UpperRoman,
        _ => return None,
    })
}

fn roman_value(numeral: &str) -> Option<u32> {
    let mut total: u32 = 0;
    let mut largest = 0;
    for c in numeral.chars().rev() {
        let value = match c.to_ascii_lowercase() {
            'i' => 1,
            'v' => 5,
            'x' => 10,
            _ => return None,
        };
        if value < largest {
            total = total.saturating_sub(value);
        } else {
            total += value;
            largest = value;
        }
    }
    Some(total)
}

/// The style and ordinal of an explicit ordered marker such as `3.`, `c.` or `iv)`.
fn explicit_ordinal(marker: &str) -> Option<(OrderedStyle, u32)> {
    if let Some(numeral) = marker.strip_suffix(')') {
        let style = if numeral.chars().all(|c| c.is_ascii_lowercase()) {
            OrderedStyle::LowerRoman
        } else {
            OrderedStyle::UpperRoman
        };
        return Some((style, roman_value(numeral)?));
    }
    let label = marker.strip_suffix('.')?;
    if let Ok(number) = label.parse::<u32>() {
        return Some((OrderedStyle::Arabic, number));
    }
    let letter = label.chars().next()?;
    let (style, base) = if letter.is_ascii_lowercase() {
        (OrderedStyle::LowerAlpha, 'a')
    } else {
        (OrderedStyle::UpperAlpha, 'A')
    };
    Some((style, u32::from(letter) - u32::from(base) + 1))
}

fn parse_marker(line: &str) -> Option<Marker> {
    if let Some(captures) = UNORDERED_ITEM.captures(line) {
        let text = captures.get(1).map_or("", |m| m.as_str());
        return Some(Marker {
            family: Family::Unordered(text.to_string()),
            text: text.to_string(),
            ordinal: None,
            term: None,
            body: captures.get(2).map_or("", |m| m.as_str()).to_string(),
        });
    }
    if let Some(captures) = ORDERED_ITEM.captures(line) {
        let text = captures.get(1).map_or("", |m| m.as_str());
        let ordinal = if text.starts_with('.') {
            None
        } else {
            Some(explicit_ordinal(text)?)
        };
        let depth = ordinal.map_or(text.len(), |(style, _)| depth_of(style));
        return Some(Marker {
            family: Family::Ordered(depth),
            text: text.to_string(),
            ordinal,
            term: None,
            body: captures.get(2).map_or("", |m| m.as_str()).to_string(),
        });
    }
    if line.trim_start().starts_with("//") {
        return None;
    }
    let captures = DESCRIPTION_ITEM.captures(line)?;
    let text = captures.get(2).map_or("", |m| m.as_str());
    Some(Marker {
        family: Family::Description(text.to_string()),
        text: text.to_string(),
        ordinal: None,
        term: captures.get(1).map(|m| m.as_str().to_string()),
        body: captures.get(3).map_or("", |m| m.as_str()).trim().to_string(),
    })
}

/// Whether `line` starts a list item of any kind.
pub(super) fn is_list_item(line: &str) -> bool {
    parse_marker(line).is_some()
}

impl Lexer<'_, '_> {
    /// Parse the list whose first item is the next line.
    pub(super) fn parse_list(&mut self, metadata: BlockMetadata) -> Option<Node> {
        self.parse_list_within(metadata, &[])
    }

    /// Parse a list nested in lists of the `enclosing` families. A marker of the list's
    /// own family adds an item, a marker of an enclosing family ends the list.
    #[tracing::instrument(level = "trace", skip(self, metadata))]
    fn parse_list_within(
        &mut self,
        metadata: BlockMetadata,
        enclosing: &[Family],
    ) -> Option<Node> {
        let location = self.location();
        let first = parse_marker(&self.reader.peek_text(self.state)?)?;
        let family = first.family.clone();
        let (context, kind) = match &family {
            Family::Unordered(_) => (Context::Ulist, ListKind::Unordered),
            Family::Description(_) => (Context::Dlist, ListKind::Description),
            Family::Ordered(depth) => {
                let style = metadata
                    .style
                    .as_deref()
                    .and_then(style_named)
                    .or_else(|| first.ordinal.map(|(style, _)| style))
                    .unwrap_or_else(|| OrderedStyle::for_depth(*depth));
                let start = metadata.attribute("start").map(str::to_string).or_else(|| {
                    first
                        .ordinal
                        .filter(|(_, ordinal)| *ordinal != 1)
                        .map(|(_, ordinal)| ordinal.to_string())
                });
                (Context::Olist, ListKind::Ordered { style, start })
            }
        };
        let mut nested_in = enclosing.to_vec();
        nested_in.push(family.clone());

        let mut items: Vec<ListItem> = Vec::new();
        let mut previous_ordinal: Option<u32> = None;
        while let Some(text) = self.reader.peek_text(self.state) {
            let Some(marker) = parse_marker(&text).filter(|marker| marker.family == family) else {
                break;
            };
            let Some(line) = self.reader.read_line(self.state) else {
                break;
            };
            if let (Some((_, ordinal)), Some(previous)) = (marker.ordinal, previous_ordinal)
                && ordinal != previous.saturating_add(1)
            {
                self.warn(
                    line.location.clone(),
                    format!(
                        "list item index: expected {}, got {ordinal}",
                        previous.saturating_add(1)
                    ),
                );
            }
            previous_ordinal = marker.ordinal.map(|(_, ordinal)| ordinal);
            let item = self.parse_list_item(marker, line.location, &nested_in);
            match items.last_mut() {
                // Consecutive terms with no definition in between share one entry.
                Some(last)
                    if context == Context::Dlist && last.text.is_none() && last.blocks.is_empty() =>
                {
                    last.terms.extend(item.terms);
                    last.text = item.text;
                    last.blocks = item.blocks;
                }
                Some(_) | None => items.push(item),
            }
        }
        tracing::trace!(list = context.name(), items = items.len(), "list closed");
        self.register_id(&metadata, &location);
        Some(Node::List(List {
            context,
            kind,
            marker: first.text,
            metadata,
            items,
            location,
        }))
    }

    /// Read one item: its text lines, then any attached blocks, nested lists and
    /// literal paragraphs.
    fn parse_list_item(
        &mut self,
        marker: Marker,
        location: SourceLocation,
        families: &[Family],
    ) -> ListItem {
        let mut lines: Vec<String> = Vec::new();
        if !marker.body.is_empty() {
            lines.push(marker.body);
        }
        let mut blocks = Vec::new();
        let markdown = self.markdown();
        loop {
            let Some(text) = self.reader.peek_text(self.state) else {
                break;
            };
            if text.trim().is_empty() {
                self.reader.skip_blank_lines(self.state);
                let Some(next) = self.reader.peek_text(self.state) else {
                    break;
                };
                if let Some(next_marker) = parse_marker(&next) {
                    if families.contains(&next_marker.family) {
                        break;
                    }
                    blocks.extend(self.parse_list_within(BlockMetadata::default(), families));
                } else if next.starts_with([' ', '\t']) {
                    blocks.push(self.literal_paragraph(BlockMetadata::default(), Scope::ListItem));
                } else if lines.is_empty()
                    && blocks.is_empty()
                    && matches!(marker.family, Family::Description(_))
                {
                    let paragraph = self.read_paragraph_lines(Scope::ListItem, false);
                    lines.extend(paragraph.into_iter().map(|line| line.text));
                } else {
                    break;
                }
                continue;
            }
            if text == "+" {
                self.reader.read_line(self.state);
                if self
                    .reader
                    .peek_text(self.state)
                    .is_some_and(|next| is_list_item(&next))
                {
                    continue;
                }
                let Some(metadata) = self.collect_metadata() else {
                    break;
                };
                blocks.extend(self.next_block(metadata, Scope::ListItem));
                continue;
            }
            if let Some(next_marker) = parse_marker(&text) {
                if families.contains(&next_marker.family) {
                    break;
                }
                blocks.extend(self.parse_list_within(BlockMetadata::default(), families));
                continue;
            }
            if !blocks.is_empty()
                || Delimiter::detect(&text, markdown).is_some()
                || is_attribute_line(&text)
            {
                break;
            }
            self.reader.read_line(self.state);
            if !is_line_comment(&text) {
                lines.push(text.trim().to_string());
            }
        }

        let source = lines.join("\n");
        let text = (!source.is_empty()).then(|| self.state.substitute(&source, NORMAL));
        let terms = marker
            .term
            .map(|term| vec![self.state.substitute(&term, NORMAL)])
            .unwrap_or_default();
        ListItem {
            context: Context::ListItem,
            marker: marker.text,
            terms,
            text,
            blocks,
            location,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::{Options, lexer::tests::lex};

    fn list(node: Option<&Node>) -> &List {
        match node {
            Some(Node::List(list)) => list,
            other => panic!("expected a list, got {other:?}"),
        }
    }

    fn texts(list: &List) -> Vec<&str> {
        list.items.iter().filter_map(|item| item.text.as_deref()).collect()
    }

    #[rstest]
    #[case("* item", Some(Family::Unordered("*".into())))]
    #[case("*** deep", Some(Family::Unordered("***".into())))]
    #[case("- dash", Some(Family::Unordered("-".into())))]
    #[case(". first", Some(Family::Ordered(1)))]
    #[case("1. first", Some(Family::Ordered(1)))]
    #[case("b. second", Some(Family::Ordered(2)))]
    #[case("iv) fourth", Some(Family::Ordered(3)))]
    #[case("C. third", Some(Family::Ordered(4)))]
    #[case("CPU:: brain", Some(Family::Description("::".into())))]
    #[case("term;;", Some(Family::Description(";;".into())))]
    #[case("*bold* text", None)]
    #[case("// comment:: not a term", None)]
    #[case("image::photo.png[]", None)]
    #[case("NOTE: text", None)]
    fn test_marker_family(#[case] line: &str, #[case] expected: Option<Family>) {
        assert_eq!(parse_marker(line).map(|marker| marker.family), expected);
    }

    #[rstest]
    #[case("3.", Some((OrderedStyle::Arabic, 3)))]
    #[case("c.", Some((OrderedStyle::LowerAlpha, 3)))]
    #[case("B.", Some((OrderedStyle::UpperAlpha, 2)))]
    #[case("ix)", Some((OrderedStyle::LowerRoman, 9)))]
    #[case("XIV)", Some((OrderedStyle::UpperRoman, 14)))]
    fn test_explicit_ordinal(#[case] marker: &str, #[case] expected: Option<(OrderedStyle, u32)>) {
        assert_eq!(explicit_ordinal(marker), expected);
    }

    #[test]
    fn test_marker_change_nests_a_list() {
        let options = Options::default();
        let (_, children, _) = lex("* a\n* b\n- c", &options);
        assert_eq!(children.len(), 1);
        let outer = list(children.first());
        assert_eq!(texts(outer), vec!["a", "b"]);
        let nested = list(outer.items.get(1).and_then(|item| item.blocks.first()));
        assert_eq!(nested.marker, "-");
        assert_eq!(texts(nested), vec!["c"]);
    }

    #[test]
    fn test_ordered_style_is_locked_by_the_first_item() {
        let options = Options::default();
        let (_, children, _) = lex("a. alpha\n1. one", &options);
        let outer = list(children.first());
        assert_eq!(
            outer.kind,
            ListKind::Ordered {
                style: OrderedStyle::LowerAlpha,
                start: None
            }
        );
        assert_eq!(outer.items.len(), 1);
        let nested = list(outer.items.first().and_then(|item| item.blocks.first()));
        assert_eq!(
            nested.kind,
            ListKind::Ordered {
                style: OrderedStyle::Arabic,
                start: None
            }
        );
    }

    #[test]
    fn test_depth_markers_nest_and_return() {
        let options = Options::default();
        let (_, children, _) = lex("* a\n** b\n*** c\n* d", &options);
        let outer = list(children.first());
        assert_eq!(texts(outer), vec!["a", "d"]);
        let second = list(outer.items.first().and_then(|item| item.blocks.first()));
        assert_eq!(texts(second), vec!["b"]);
        let third = list(second.items.first().and_then(|item| item.blocks.first()));
        assert_eq!(texts(third), vec!["c"]);
    }

    #[test]
    fn test_item_text_spans_lines() {
        let options = Options::default();
        let (_, children, _) = lex("* first line\n  second *line*\n* next", &options);
        assert_eq!(
            texts(list(children.first())),
            vec!["first line\nsecond <strong>line</strong>", "next"]
        );
    }

    #[test]
    fn test_blank_lines_between_items() {
        let options = Options::default();
        let (_, children, _) = lex("* one\n\n\n* two\n\nafter", &options);
        assert_eq!(children.len(), 2);
        assert_eq!(texts(list(children.first())), vec!["one", "two"]);
        assert_eq!(children.get(1).map(Node::context), Some(Context::Paragraph));
    }

    #[test]
    fn test_continuation_attaches_blocks() {
        let options = Options::default();
        let source = "* item\n+\n----\ncode\n----\n+\nmore text\n* next";
        let (_, children, _) = lex(source, &options);
        let outer = list(children.first());
        assert_eq!(outer.items.len(), 2);
        let contexts: Vec<Context> = outer
            .items
            .first()
            .map(|item| item.blocks.iter().map(Node::context).collect())
            .unwrap_or_default();
        assert_eq!(contexts, vec![Context::Listing, Context::Paragraph]);
    }

    #[test]
    fn test_indented_text_after_a_blank_line_is_literal() {
        let options = Options::default();
        let (_, children, _) = lex("* item\n\n  $ run <this>\n* next", &options);
        let outer = list(children.first());
        let item = outer.items.first();
        let Some(Node::Block(literal)) = item.and_then(|item| item.blocks.first()) else {
            panic!("expected a literal block in {item:?}");
        };
        assert_eq!(literal.context, Context::Literal);
        assert_eq!(literal.text(), Some("$ run &lt;this&gt;"));
        assert_eq!(outer.items.len(), 2);
    }

    #[test]
    fn test_delimiter_without_continuation_ends_the_list() {
        let options = Options::default();
        let (_, children, _) = lex("* item\n----\ncode\n----", &options);
        let contexts: Vec<Context> = children.iter().map(Node::context).collect();
        assert_eq!(contexts, vec![Context::Ulist, Context::Listing]);
    }

    #[test]
    fn test_description_list() {
        let options = Options::default();
        let source = "CPU:: The *brain*\nRAM::\nShort-term memory\nHDD::\nSSD:: Storage\n\nBus;;\n\n  on the board";
        let (_, children, _) = lex(source, &options);
        let outer = list(children.first());
        assert_eq!(outer.kind, ListKind::Description);
        let entries: Vec<(Vec<&str>, Option<&str>)> = outer
            .items
            .iter()
            .map(|item| {
                (
                    item.terms.iter().map(String::as_str).collect(),
                    item.text.as_deref(),
                )
            })
            .collect();
        assert_eq!(
            entries,
            vec![
                (vec!["CPU"], Some("The <strong>brain</strong>")),
                (vec!["RAM"], Some("Short-term memory")),
                (vec!["HDD", "SSD"], Some("Storage")),
            ]
        );
        let nested = list(outer.items.get(2).and_then(|item| item.blocks.first()));
        assert_eq!(nested.marker, ";;");
        assert_eq!(
            nested.items.first().and_then(|item| item.blocks.first()).map(Node::context),
            Some(Context::Literal)
        );
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_ordered_start_and_sequence() {
        let options = Options::default();
        let (_, children, state) = lex("3. three\n5. five", &options);
        let outer = list(children.first());
        assert_eq!(
            outer.kind,
            ListKind::Ordered {
                style: OrderedStyle::Arabic,
                start: Some("3".into())
            }
        );
        assert_eq!(outer.items.len(), 2);
        assert_eq!(state.diagnostics.len(), 1);
        assert!(logs_contain("list item index: expected 4, got 5"));
    }

    #[test]
    fn test_style_attribute_overrides_the_marker() {
        let options = Options::default();
        let (_, children, _) = lex("[lowerroman,start=2]\n. one\n. two", &options);
        assert_eq!(
            list(children.first()).kind,
            ListKind::Ordered {
                style: OrderedStyle::LowerRoman,
                start: Some("2".into())
            }
        );
    }
}
