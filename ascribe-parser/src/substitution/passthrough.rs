use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::{
    Substitution, Substitutor,
    quotes::{is_word_char, next_boundary, parse_quoted_attributes},
    resolve_subs,
};
use crate::{
    inline::{Inline, MathNotation, QuoteKind},
    pattern::{compile, head, slice, tail},
    state::ParserState,
};

/// Placeholder delimiters. Both are C1 control characters, which never occur in
/// source text.
const START: char = '\u{96}';
const END: char = '\u{97}';

/// `+++text+++`, `$$text$$` and `pass:subs[text]`.
///
/// Groups: 1 `+++` body, 2 `$$` body, 3 pass subs, 4 pass body.
static PASS_MACRO: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?s)\\?(?:\+\+\+(.*?)\+\+\+|\$\$(.*?)\$\$|pass:([a-z,]*)\[(.*?[^\\])\])")
});

/// `math:[...]`, `asciimath:[...]`, `latexmath:[...]`, optionally with subs.
///
/// Groups: 1 macro name, 2 subs, 3 body.
static MATH_MACRO: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?s)\\?((?:latex|ascii)?math):([a-z,]*)\[(.*?[^\\])\]"));

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| compile("\u{96}(\\d+)\u{97}"));

#[derive(Debug)]
enum Protected {
    /// Raw text, put back after its own substitutions.
    Raw,
    /// A backtick literal, rendered as monospaced text.
    Literal {
        id: Option<String>,
        roles: Vec<String>,
    },
    Math(MathNotation),
}

#[derive(Debug)]
struct Passthrough {
    text: String,
    subs: Vec<Substitution>,
    kind: Protected,
}

/// The placeholder registry for one run of the substitutor.
#[derive(Debug, Default)]
pub(crate) struct Passthroughs {
    entries: Vec<Passthrough>,
}

impl Passthroughs {
    fn placeholder(&mut self, passthrough: Passthrough) -> String {
        self.entries.push(passthrough);
        format!("{START}{}{END}", self.entries.len() - 1)
    }

    /// Replace every passthrough in `text` with a placeholder.
    pub(crate) fn extract(&mut self, text: &str, state: &mut ParserState) -> String {
        let mut text = text.to_string();
        if text.contains("+++") || text.contains("$$") || text.contains("pass:") {
            text = self.extract_pass_macros(&text, state);
        }
        if text.contains('`') {
            text = self.extract_literals(&text);
        }
        if text.contains("math:") {
            text = self.extract_math(&text, state);
        }
        text
    }

    fn extract_pass_macros(&mut self, text: &str, state: &mut ParserState) -> String {
        PASS_MACRO
            .replace_all(text, |captures: &Captures<'_>| {
                let whole = captures.get(0).map_or("", |m| m.as_str());
                if let Some(unescaped) = whole.strip_prefix('\\') {
                    return unescaped.to_string();
                }
                let group = |index| captures.get(index).map(|m| m.as_str());
                let (text, subs) = if let Some(body) = group(4) {
                    let subs = match group(3).filter(|subs| !subs.is_empty()) {
                        Some(spec) => {
                            let (subs, diagnostics) = resolve_subs(spec, &[]);
                            for diagnostic in diagnostics {
                                state.report(diagnostic);
                            }
                            subs
                        }
                        None => Vec::new(),
                    };
                    (body.replace("\\]", "]"), subs)
                } else if let Some(body) = group(2) {
                    (body.to_string(), vec![Substitution::SpecialChars])
                } else {
                    (group(1).unwrap_or_default().to_string(), Vec::new())
                };
                self.placeholder(Passthrough {
                    text,
                    subs,
                    kind: Protected::Raw,
                })
            })
            .into_owned()
    }

    /// Backtick literals: `` `text` `` with an optional `[role]` in front, bounded
    /// like a constrained quote.
    fn extract_literals(&mut self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut copied = 0;
        let mut position = 0;
        while position < text.len() {
            let Some(found) = match_literal(text, position) else {
                position = next_boundary(text, position);
                continue;
            };
            out.push_str(slice(text, copied, position));
            if found.escaped {
                out.push_str(found.boundary);
                if let Some(attrs) = found.attrs {
                    out.push_str(&format!("[{attrs}]"));
                }
                out.push('`');
                out.push_str(found.content);
                out.push('`');
            } else {
                let (boundary, attrs) = match (found.boundary, found.attrs) {
                    // a backslash boundary escapes the attribute list only
                    ("\\", Some(attrs)) => (format!("[{attrs}]"), None),
                    (boundary, attrs) => (boundary.to_string(), attrs),
                };
                let (id, roles) = attrs.map(parse_quoted_attributes).unwrap_or_default();
                out.push_str(&boundary);
                out.push_str(&self.placeholder(Passthrough {
                    text: found.content.to_string(),
                    subs: vec![Substitution::SpecialChars],
                    kind: Protected::Literal { id, roles },
                }));
            }
            copied = found.end;
            position = found.end;
        }
        out.push_str(tail(text, copied));
        out
    }

    fn extract_math(&mut self, text: &str, state: &mut ParserState) -> String {
        MATH_MACRO
            .replace_all(text, |captures: &Captures<'_>| {
                let whole = captures.get(0).map_or("", |m| m.as_str());
                if let Some(unescaped) = whole.strip_prefix('\\') {
                    return unescaped.to_string();
                }
                let group = |index| captures.get(index).map_or("", |m| m.as_str());
                let name = match group(1) {
                    "math" => state.attributes.get("math").unwrap_or("asciimath"),
                    name => name,
                };
                let notation = if name == "latexmath" {
                    MathNotation::LatexMath
                } else {
                    MathNotation::AsciiMath
                };
                let subs = if group(2).is_empty() {
                    vec![Substitution::SpecialChars]
                } else {
                    let (subs, diagnostics) = resolve_subs(group(2), &[]);
                    for diagnostic in diagnostics {
                        state.report(diagnostic);
                    }
                    subs
                };
                self.placeholder(Passthrough {
                    text: group(3).replace("\\]", "]"),
                    subs,
                    kind: Protected::Math(notation),
                })
            })
            .into_owned()
    }

    /// Put every placeholder back, running the passthrough's own substitutions first.
    /// Text that leaves the substitutor early (footnote bodies) goes through here too.
    pub(crate) fn restore(&self, text: &str, state: &mut ParserState) -> String {
        if self.entries.is_empty() || !text.contains(START) {
            return text.to_string();
        }
        PLACEHOLDER
            .replace_all(text, |captures: &Captures<'_>| {
                let whole = captures.get(0).map_or("", |m| m.as_str());
                let Some(entry) = captures
                    .get(1)
                    .and_then(|index| index.as_str().parse::<usize>().ok())
                    .and_then(|index| self.entries.get(index))
                else {
                    return whole.to_string();
                };
                let text = Substitutor::new(state).apply(&entry.text, &entry.subs);
                match &entry.kind {
                    Protected::Raw => text,
                    Protected::Literal { id, roles } => state.converter.convert(&Inline::Quoted {
                        kind: QuoteKind::Monospaced,
                        text,
                        id: id.clone(),
                        roles: roles.clone(),
                    }),
                    Protected::Math(notation) => state.converter.convert(&Inline::Math {
                        notation: *notation,
                        text,
                    }),
                }
            })
            .into_owned()
    }
}

#[derive(Debug)]
struct LiteralMatch<'t> {
    end: usize,
    boundary: &'t str,
    attrs: Option<&'t str>,
    escaped: bool,
    content: &'t str,
}

fn match_literal(text: &str, start: usize) -> Option<LiteralMatch<'_>> {
    let at_line_start = start == 0 || head(text, start).ends_with('\n');
    if at_line_start && let Some(found) = literal_body(text, start, "") {
        return Some(found);
    }
    let boundary = tail(text, start).chars().next()?;
    if boundary == '`' || is_word_char(boundary) {
        return None;
    }
    let after = start + boundary.len_utf8();
    literal_body(text, after, slice(text, start, after))
}

fn literal_body<'t>(text: &'t str, position: usize, boundary: &'t str) -> Option<LiteralMatch<'t>> {
    let mut position = position;
    let mut attrs = None;
    if let Some(rest) = tail(text, position).strip_prefix('[')
        && let Some(close) = rest.find(']')
        && close > 0
    {
        let after = position + close + 2;
        if tail(text, after).starts_with(['`', '\\']) {
            attrs = rest.get(..close);
            position = after;
        }
    }
    let escaped = tail(text, position).starts_with('\\');
    position += usize::from(escaped);
    let content_start = position + tail(text, position).strip_prefix('`').map(|_| 1)?;
    let first = tail(text, content_start).chars().next()?;
    if first == '`' || first.is_whitespace() {
        return None;
    }
    let mut content_end = content_start + first.len_utf8();
    loop {
        let last_is_blank = head(text, content_end).ends_with(char::is_whitespace);
        if !last_is_blank && tail(text, content_end).starts_with('`') {
            let end = content_end + 1;
            let next = tail(text, end).chars().next();
            if !next.is_some_and(|c| c == '`' || is_word_char(c)) {
                return Some(LiteralMatch {
                    end,
                    boundary,
                    attrs,
                    escaped,
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
