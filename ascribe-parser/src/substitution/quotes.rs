use crate::{
    inline::{Inline, InlineConverter, QuoteKind},
    pattern::{head, slice, tail},
};

/// One quoted-text rule.
///
/// An unconstrained rule matches `\?([attrs])?OPEN(.+?)CLOSE` anywhere. A constrained
/// rule additionally needs the character before the span (or the line start) to be
/// neither a word character nor one of `;:}`, the text right inside each delimiter to
/// be non-blank, and the character after the closing delimiter to be a non-word
/// character (or the end of the text).
#[derive(Debug)]
struct QuoteRule {
    kind: QuoteKind,
    constrained: bool,
    open: &'static str,
    close: &'static str,
}

const fn rule(
    kind: QuoteKind,
    constrained: bool,
    open: &'static str,
    close: &'static str,
) -> QuoteRule {
    QuoteRule {
        kind,
        constrained,
        open,
        close,
    }
}

/// Applied in this order; each rule sees the output of the ones before it. A doubled
/// delimiter is always tried before its single form.
const QUOTE_RULES: [QuoteRule; 13] = [
    rule(QuoteKind::Strong, false, "**", "**"),
    rule(QuoteKind::Strong, true, "*", "*"),
    rule(QuoteKind::Double, true, "``", "''"),
    rule(QuoteKind::Emphasis, true, "'", "'"),
    rule(QuoteKind::Single, true, "`", "'"),
    rule(QuoteKind::Monospaced, false, "++", "++"),
    rule(QuoteKind::Monospaced, true, "+", "+"),
    rule(QuoteKind::Emphasis, false, "__", "__"),
    rule(QuoteKind::Emphasis, true, "_", "_"),
    rule(QuoteKind::Mark, false, "##", "##"),
    rule(QuoteKind::Mark, true, "#", "#"),
    rule(QuoteKind::Superscript, false, "^", "^"),
    rule(QuoteKind::Subscript, false, "~", "~"),
];

#[derive(Debug)]
struct QuoteMatch<'t> {
    start: usize,
    end: usize,
    /// The character kept in front of a constrained span.
    boundary: &'t str,
    escaped: bool,
    attrs: Option<&'t str>,
    content: &'t str,
}

pub(crate) fn substitute(text: &str, converter: &dyn InlineConverter) -> String {
    let mut text = text.to_string();
    for rule in &QUOTE_RULES {
        if text.contains(rule.open) {
            text = apply_rule(&text, rule, converter);
        }
    }
    text
}

fn apply_rule(text: &str, rule: &QuoteRule, converter: &dyn InlineConverter) -> String {
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut position = 0;
    while position < text.len() {
        let found = if rule.constrained {
            match_constrained(text, position, rule)
        } else {
            match_unconstrained(text, position, rule)
        };
        match found {
            Some(found) => {
                out.push_str(slice(text, copied, found.start));
                out.push_str(&render(&found, rule, converter));
                copied = found.end;
                position = found.end;
            }
            None => position = next_boundary(text, position),
        }
    }
    out.push_str(tail(text, copied));
    out
}

fn render(found: &QuoteMatch<'_>, rule: &QuoteRule, converter: &dyn InlineConverter) -> String {
    if found.escaped {
        if rule.constrained
            && let Some(attrs) = found.attrs
        {
            // the escape only protects the attribute list
            return format!("[{attrs}]{}", span(rule.kind, found.content, None, converter));
        }
        let attrs = found
            .attrs
            .map(|attrs| format!("[{attrs}]"))
            .unwrap_or_default();
        return format!("{attrs}{}{}{}", rule.open, found.content, rule.close);
    }
    format!(
        "{}{}",
        found.boundary,
        span(rule.kind, found.content, found.attrs, converter)
    )
}

fn span(
    kind: QuoteKind,
    content: &str,
    attrs: Option<&str>,
    converter: &dyn InlineConverter,
) -> String {
    let (id, roles) = attrs.map(parse_quoted_attributes).unwrap_or_default();
    let kind = if kind == QuoteKind::Mark && attrs.is_some() {
        QuoteKind::Unquoted
    } else {
        kind
    };
    converter.convert(&Inline::Quoted {
        kind,
        text: content.to_string(),
        id,
        roles,
    })
}

/// `[.role1.role2#id]`, `[#id.role]` or a bare role name (`[underline]`). Only the
/// first comma-separated entry counts.
pub(crate) fn parse_quoted_attributes(attrs: &str) -> (Option<String>, Vec<String>) {
    let attrs = attrs.split(',').next().unwrap_or_default().trim();
    if attrs.is_empty() {
        return (None, Vec::new());
    }
    if !attrs.starts_with(['.', '#']) {
        return (None, vec![attrs.to_string()]);
    }
    let (role_part, id_part) = match attrs.split_once('#') {
        Some((roles, rest)) => (roles, Some(rest)),
        None => (attrs, None),
    };
    let mut roles: Vec<String> = role_part
        .split('.')
        .filter(|role| !role.is_empty())
        .map(str::to_string)
        .collect();
    let id = id_part.map(|rest| {
        let mut segments = rest.split('.');
        let id = segments.next().unwrap_or_default().to_string();
        roles.extend(
            segments
                .filter(|role| !role.is_empty())
                .map(str::to_string),
        );
        id
    });
    (id.filter(|id| !id.is_empty()), roles)
}

pub(crate) fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub(crate) fn next_boundary(text: &str, position: usize) -> usize {
    tail(text, position)
        .chars()
        .next()
        .map_or(text.len(), |c| position + c.len_utf8())
}

/// `[attrs]` at `position`: returns the attribute text and the position after `]`.
fn attribute_list(text: &str, position: usize) -> Option<(&str, usize)> {
    let rest = tail(text, position).strip_prefix('[')?;
    let close = rest.find(']')?;
    (close > 0).then(|| (head(rest, close), position + 1 + close + 1))
}

/// Spans made only of delimiter characters (`******`) are not quotes.
fn only_delimiters(content: &str, rule: &QuoteRule) -> bool {
    content
        .chars()
        .all(|c| rule.open.contains(c) || rule.close.contains(c))
}

fn match_unconstrained<'t>(
    text: &'t str,
    start: usize,
    rule: &QuoteRule,
) -> Option<QuoteMatch<'t>> {
    let escaped = tail(text, start).starts_with('\\');
    let mut position = start + usize::from(escaped);
    let mut attrs = None;
    if let Some((list, after)) = attribute_list(text, position)
        && tail(text, after).starts_with(rule.open)
    {
        attrs = Some(list);
        position = after;
    }
    if !tail(text, position).starts_with(rule.open) {
        return None;
    }
    let content_start = position + rule.open.len();
    // superscript and subscript never span whitespace
    let no_blanks = matches!(rule.kind, QuoteKind::Superscript | QuoteKind::Subscript);
    let mut content_end = next_boundary(text, content_start);
    if content_end == content_start {
        return None;
    }
    if no_blanks && slice(text, content_start, content_end).starts_with(char::is_whitespace) {
        return None;
    }
    loop {
        if tail(text, content_end).starts_with(rule.close)
            && !only_delimiters(slice(text, content_start, content_end), rule)
        {
            return Some(QuoteMatch {
                start,
                end: content_end + rule.close.len(),
                boundary: "",
                escaped,
                attrs,
                content: slice(text, content_start, content_end),
            });
        }
        let next = next_boundary(text, content_end);
        if next == content_end
            || (no_blanks && slice(text, content_end, next).starts_with(char::is_whitespace))
        {
            return None;
        }
        content_end = next;
    }
}

fn match_constrained<'t>(text: &'t str, start: usize, rule: &QuoteRule) -> Option<QuoteMatch<'t>> {
    let at_line_start = start == 0 || head(text, start).ends_with('\n');
    if at_line_start && let Some(found) = constrained_body(text, start, start, "", rule) {
        return Some(found);
    }
    let boundary = tail(text, start).chars().next()?;
    if is_word_char(boundary) || matches!(boundary, ';' | ':' | '}') {
        return None;
    }
    let after = start + boundary.len_utf8();
    let mut found = constrained_body(text, start, after, slice(text, start, after), rule)?;
    found.escaped = boundary == '\\';
    Some(found)
}

fn constrained_body<'t>(
    text: &'t str,
    start: usize,
    position: usize,
    boundary: &'t str,
    rule: &QuoteRule,
) -> Option<QuoteMatch<'t>> {
    let mut position = position;
    let mut attrs = None;
    if let Some((list, after)) = attribute_list(text, position)
        && tail(text, after).starts_with(rule.open)
    {
        attrs = Some(list);
        position = after;
    }
    if !tail(text, position).starts_with(rule.open) {
        return None;
    }
    let content_start = position + rule.open.len();
    let first = tail(text, content_start).chars().next()?;
    if first.is_whitespace() {
        return None;
    }
    let mut content_end = content_start + first.len_utf8();
    loop {
        let last_is_blank = head(text, content_end).ends_with(char::is_whitespace);
        if !last_is_blank
            && tail(text, content_end).starts_with(rule.close)
            && !only_delimiters(slice(text, content_start, content_end), rule)
        {
            let end = content_end + rule.close.len();
            let followed_by_word = tail(text, end).chars().next().is_some_and(is_word_char);
            if !followed_by_word {
                return Some(QuoteMatch {
                    start,
                    end,
                    boundary,
                    escaped: false,
                    attrs,
                    content: slice(text, content_start, content_end),
                });
            }
        }
        let next = next_boundary(text, content_end);
        if next == content_end {
            return None;
        }
        content_end = next;
    }
}
