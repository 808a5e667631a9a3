use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::passthrough::Passthroughs;
use crate::{
    attributes::AttributeList,
    diagnostic::{Diagnostic, DiagnosticKind},
    inline::{Inline, MediaKind},
    pattern::{compile, head, slice, tail},
    state::ParserState,
};

/// `footnote:[text]`, `footnoteref:[id,text]` and `footnoteref:[id]`.
static FOOTNOTE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?s)\\?(footnote(?:ref)?):\[(.*?[^\\])\]"));

/// Groups: 1 macro name, 2 target, 3 attribute list.
static MEDIA: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"\\?(image|icon|video|audio):([^:\[][^\[]*)\[((?:\\\]|[^\]])*?)\]")
});

/// A bare URL, optionally followed by `[text]`.
///
/// Groups: 1 the character or `link:` prefix in front, 2 the target (with a possible
/// escaping backslash), 3 the link text.
static URL: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?m)(^|link:|\s|>|&lt;|[()\[\]])(\\?(?:https?|ftp|irc)://[^\s\[\]<\x{96}\x{97}]*[^\s.,\[\]<\x{96}\x{97}])(?:\[((?:\\\]|[^\]])*?)\])?",
    )
});

/// `link:target[text]` and `mailto:address[text]`.
static LINK_MACRO: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\\?(link|mailto):([^\s\[]+)\[((?:\\\]|[^\]])*?)\]"));

/// A bare email address. A leading `>`, `:` or `/` means the address is already part
/// of a link.
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"[\\>:/]?\w[\w.%+-]*@[[:alnum:]][[:alnum:].-]*\.[[:alpha:]]{2,4}\b")
});

/// Groups: 1 escaped `<<...>>`, 2 raw `<<...>>`, 3 `xref:` target, 4 `xref:` text.
static XREF: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r#"(?s)\\?(?:&lt;&lt;([\w":./#].*?)&gt;&gt;|<<([\w":./#].*?)>>|xref:([\w":./#].*?)\[(.*?)\])"#,
    )
});

static KBD_BTN: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?s)\\?(kbd|btn):\[((?:\\\]|[^\]])+?)\]"));

static MENU: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\\?menu:(\w|\w.*?\S)\[\s*(.+?)?\]"));

/// `"File > Save"`, after special characters were escaped.
static MENU_SHORTHAND: LazyLock<Regex> =
    LazyLock::new(|| compile(r#"\\?"(\w[^"]*?\s*&gt;\s*[^" \t][^"]*)""#));

static INDEXTERM_MACRO: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?s)\\?(indexterm2?):\[(.*?[^\\])\]"));

static TERM_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| compile(r"\s*,\s*"));

static BIBREF: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\\?\[\[\[([\w:][\w:.-]*?)\]\]\]"));

/// Groups: 1 `[[id]]` id, 2 its reftext, 3 `anchor:` id, 4 its reftext.
static ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\\?(?:\[\[([[:alpha:]:_][\w:.-]*)(?:,\s*(\S.*?))?\]\]|anchor:(\S+)\[(.*?[^\\])?\])",
    )
});

fn group<'h>(captures: &Captures<'h>, index: usize) -> &'h str {
    captures.get(index).map_or("", |m| m.as_str())
}

fn optional<'h>(captures: &Captures<'h>, index: usize) -> Option<&'h str> {
    captures.get(index).map(|m| m.as_str())
}

fn unescape_brackets(text: &str) -> String {
    text.replace("\\]", "]")
}

fn roles(attrs: &AttributeList) -> Vec<String> {
    attrs
        .named("role")
        .map(|roles| roles.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Expand every inline macro in `text`.
#[tracing::instrument(level = "trace", skip(state, passthroughs))]
pub(crate) fn substitute(
    text: &str,
    state: &mut ParserState,
    passthroughs: &mut Passthroughs,
) -> String {
    let mut text = text.to_string();
    if text.contains("footnote") {
        text = footnotes(&text, state, passthroughs);
    }
    if ["image:", "icon:", "video:", "audio:"]
        .iter()
        .any(|name| text.contains(name))
    {
        text = media(&text, state);
    }
    if text.contains("://") {
        text = urls(&text, state);
    }
    if text.contains("link:") || text.contains("mailto:") {
        text = link_macros(&text, state);
    }
    if text.contains('@') {
        text = emails(&text, state);
    }
    if text.contains("&lt;&lt;") || text.contains("<<") || text.contains("xref:") {
        text = xrefs(&text, state);
    }
    if text.contains("kbd:") || text.contains("btn:") {
        text = keys_and_buttons(&text, state);
    }
    if text.contains("menu:") {
        text = menus(&text, state);
    }
    if state.attributes.contains("experimental") && text.contains("&gt;") && text.contains('"')
    {
        text = menu_shorthand(&text, state);
    }
    if text.contains("((") || text.contains("indexterm") {
        text = index_terms(&text, state);
    }
    if text.contains("[[") || text.contains("anchor:") {
        text = anchors(&text, state);
    }
    text
}

fn footnotes(text: &str, state: &mut ParserState, passthroughs: &mut Passthroughs) -> String {
    FOOTNOTE
        .replace_all(text, |captures: &Captures<'_>| {
            let whole = group(captures, 0);
            if let Some(unescaped) = whole.strip_prefix('\\') {
                return unescaped.to_string();
            }
            let body = unescape_brackets(group(captures, 2))
                .trim()
                .replace('\n', " ");
            let (id, body) = if group(captures, 1) == "footnoteref" {
                match body.split_once(',') {
                    Some((id, body)) => (Some(id.trim().to_string()), Some(body.trim().to_string())),
                    None => (Some(body.trim().to_string()), None),
                }
            } else {
                (None, Some(body))
            };

            let Some(body) = body else {
                let id = id.unwrap_or_default();
                return match state.catalog.named_footnote(&id) {
                    Some(number) => state.converter.convert(&Inline::Footnote {
                        number,
                        id: Some(id),
                        first: false,
                    }),
                    None => {
                        state.report(Diagnostic::warning(
                            DiagnosticKind::Structural,
                            format!("invalid footnote reference: {id}"),
                        ));
                        whole.to_string()
                    }
                };
            };
            // macros inside the footnote, then the passthroughs it swallowed
            let body = substitute(&body, state, passthroughs);
            let body = passthroughs.restore(&body, state);
            let (number, first) = state.catalog.register_footnote(id.as_deref(), Some(body));
            state.converter.convert(&Inline::Footnote { number, id, first })
        })
        .into_owned()
}

fn media(text: &str, state: &ParserState) -> String {
    MEDIA
        .replace_all(text, |captures: &Captures<'_>| {
            let whole = group(captures, 0);
            if let Some(unescaped) = whole.strip_prefix('\\') {
                return unescaped.to_string();
            }
            let kind = match group(captures, 1) {
                "icon" => MediaKind::Icon,
                "video" => MediaKind::Video,
                "audio" => MediaKind::Audio,
                _ => MediaKind::Image,
            };
            let target = group(captures, 2).trim();
            let attrs = AttributeList::parse(&unescape_brackets(group(captures, 3)));
            let alt = attrs
                .named_or_positional("alt", 0)
                .map_or_else(|| default_alt(kind, target), str::to_string);
            state.converter.convert(&Inline::Media {
                kind,
                target: target.to_string(),
                alt,
                width: attrs.named_or_positional("width", 1).map(str::to_string),
                height: attrs.named_or_positional("height", 2).map(str::to_string),
                title: attrs.named("title").map(str::to_string),
                link: attrs.named("link").map(str::to_string),
                roles: roles(&attrs),
            })
        })
        .into_owned()
}

/// Icons fall back to their name; everything else to the file's base name.
pub(crate) fn default_alt(kind: MediaKind, target: &str) -> String {
    if kind == MediaKind::Icon {
        return target.to_string();
    }
    let file = target.rsplit('/').next().unwrap_or(target);
    let stem = match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        Some(_) | None => file,
    };
    stem.replace(['_', '-'], " ")
}

/// Link text and attributes from the bracket content of a link.
struct LinkText {
    text: String,
    window: Option<String>,
    roles: Vec<String>,
    attrs: AttributeList,
}

fn link_text(raw: &str, parse_attributes: bool) -> LinkText {
    let raw = unescape_brackets(raw);
    let (mut text, attrs) = if parse_attributes && (raw.starts_with('"') || raw.contains(',')) {
        let attrs = AttributeList::parse(&raw);
        (attrs.positional(0).unwrap_or_default().to_string(), attrs)
    } else {
        (raw, AttributeList::default())
    };
    let mut window = attrs.named("window").map(str::to_string);
    if let Some(stripped) = text.strip_suffix('^') {
        text = stripped.to_string();
        window = Some("_blank".to_string());
    }
    LinkText {
        text,
        window,
        roles: roles(&attrs),
        attrs,
    }
}

fn urls(text: &str, state: &ParserState) -> String {
    let linkattrs = state.attributes.contains("linkattrs");
    URL.replace_all(text, |captures: &Captures<'_>| {
        let whole = group(captures, 0);
        let mut prefix = group(captures, 1);
        let mut target = group(captures, 2);
        let text = optional(captures, 3);
        if target.starts_with('\\') {
            return whole.replacen('\\', "", 1);
        }
        if prefix == "link:" {
            if text.is_none() {
                return whole.to_string();
            }
            prefix = "";
        }
        let mut suffix = "";
        if text.is_none() {
            if prefix == "&lt;"
                && let Some(stripped) = target.strip_suffix("&gt;")
            {
                prefix = "";
                target = stripped;
            } else if let Some(stripped) = target.strip_suffix("):") {
                target = stripped;
                suffix = "):";
            } else if let Some(stripped) = target.strip_suffix(')') {
                target = stripped;
                suffix = ")";
            }
        }
        let link = link_text(text.unwrap_or_default(), linkattrs);
        let anchor = state.converter.convert(&Inline::Link {
            target: target.to_string(),
            text: link.text,
            window: link.window,
            roles: link.roles,
        });
        format!("{prefix}{anchor}{suffix}")
    })
    .into_owned()
}

fn link_macros(text: &str, state: &ParserState) -> String {
    let linkattrs = state.attributes.contains("linkattrs");
    LINK_MACRO
        .replace_all(text, |captures: &Captures<'_>| {
            let whole = group(captures, 0);
            if let Some(unescaped) = whole.strip_prefix('\\') {
                return unescaped.to_string();
            }
            let target = group(captures, 2);
            if group(captures, 1) == "link" {
                let link = link_text(group(captures, 3), linkattrs);
                return state.converter.convert(&Inline::Link {
                    target: target.to_string(),
                    text: link.text,
                    window: link.window,
                    roles: link.roles,
                });
            }
            let link = link_text(group(captures, 3), true);
            let mut href = format!("mailto:{target}");
            let subject = link.attrs.positional(1);
            let body = link.attrs.positional(2);
            if subject.is_some() || body.is_some() {
                let query: Vec<String> = [("subject", subject), ("body", body)]
                    .into_iter()
                    .filter_map(|(name, value)| {
                        value.map(|value| {
                            let encoded: String =
                                url::form_urlencoded::byte_serialize(value.as_bytes()).collect();
                            format!("{name}={encoded}")
                        })
                    })
                    .collect();
                href = format!("{href}?{}", query.join("&amp;"));
            }
            let text = if link.text.is_empty() {
                target.to_string()
            } else {
                link.text
            };
            state.converter.convert(&Inline::Link {
                target: href,
                text,
                window: link.window,
                roles: link.roles,
            })
        })
        .into_owned()
}

fn emails(text: &str, state: &ParserState) -> String {
    EMAIL
        .replace_all(text, |captures: &Captures<'_>| {
            let whole = group(captures, 0);
            if let Some(unescaped) = whole.strip_prefix('\\') {
                return unescaped.to_string();
            }
            if whole.starts_with(['>', ':', '/']) {
                return whole.to_string();
            }
            state.converter.convert(&Inline::Link {
                target: format!("mailto:{whole}"),
                text: whole.to_string(),
                window: None,
                roles: Vec::new(),
            })
        })
        .into_owned()
}

fn xrefs(text: &str, state: &ParserState) -> String {
    XREF.replace_all(text, |captures: &Captures<'_>| {
        let whole = group(captures, 0);
        if let Some(unescaped) = whole.strip_prefix('\\') {
            return unescaped.to_string();
        }
        let (id, reftext) = match optional(captures, 1).or_else(|| optional(captures, 2)) {
            Some(shorthand) => match shorthand.split_once(',') {
                Some((id, reftext)) => (id.trim(), Some(reftext.trim())),
                None => (shorthand.trim(), None),
            },
            None => (group(captures, 3), optional(captures, 4)),
        };
        let id = id.trim_matches('"');
        let reftext = reftext
            .filter(|reftext| !reftext.is_empty())
            .map(unescape_brackets);
        let (href, fragment) = xref_target(id, state);
        let text = reftext
            .or_else(|| {
                state
                    .catalog
                    .reference(&fragment)
                    .and_then(|reference| reference.reftext.clone())
            })
            .unwrap_or_else(|| format!("[{fragment}]"));
        state.converter.convert(&Inline::Xref { href, text })
    })
    .into_owned()
}

/// The href for a cross reference and the id it points at.
///
/// `doc.adoc#id`, `doc#id` and `doc.adoc` point into another document unless `doc`
/// names the current one.
fn xref_target(id: &str, state: &ParserState) -> (String, String) {
    let (path, fragment) = match id.split_once('#') {
        Some((path, fragment)) => (path, fragment),
        None if ascribe_core::is_source_file(id) => (id, ""),
        None => ("", id),
    };
    let path = match path.rsplit_once('.') {
        Some((stem, _)) if ascribe_core::is_source_file(path) => stem,
        Some(_) | None => path,
    };
    let internal = path.is_empty() || state.attributes.get("docname") == Some(path);
    if internal {
        return (format!("#{fragment}"), fragment.to_string());
    }
    let suffix = state.attributes.get("outfilesuffix").unwrap_or(".html");
    let href = if fragment.is_empty() {
        format!("{path}{suffix}")
    } else {
        format!("{path}{suffix}#{fragment}")
    };
    let label = if fragment.is_empty() { path } else { fragment };
    (href, label.to_string())
}

fn keys_and_buttons(text: &str, state: &ParserState) -> String {
    KBD_BTN
        .replace_all(text, |captures: &Captures<'_>| {
            let whole = group(captures, 0);
            if let Some(unescaped) = whole.strip_prefix('\\') {
                return unescaped.to_string();
            }
            let content = unescape_brackets(group(captures, 2));
            let content = content.trim();
            if group(captures, 1) == "btn" {
                return state.converter.convert(&Inline::Button {
                    label: content.to_string(),
                });
            }
            state.converter.convert(&Inline::Kbd {
                keys: split_keys(content),
            })
        })
        .into_owned()
}

/// `Ctrl+T`, `Ctrl,T` or `Ctrl++`: a trailing delimiter is itself a key.
fn split_keys(keys: &str) -> Vec<String> {
    if keys.chars().count() == 1 {
        return vec![keys.to_string()];
    }
    let delimiter = if keys.contains(',') { ',' } else { '+' };
    let mut split: Vec<String> = keys
        .split(delimiter)
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect();
    if keys.ends_with(delimiter) {
        split.push(delimiter.to_string());
    }
    split
}

fn menu_inline(menu: &str, items: &[&str]) -> Inline {
    let (item, submenus) = match items.split_last() {
        Some((item, submenus)) => (
            Some((*item).to_string()),
            submenus.iter().map(|submenu| (*submenu).to_string()).collect(),
        ),
        None => (None, Vec::new()),
    };
    Inline::Menu {
        menu: menu.to_string(),
        submenus,
        item,
    }
}

fn menus(text: &str, state: &ParserState) -> String {
    MENU.replace_all(text, |captures: &Captures<'_>| {
        let whole = group(captures, 0);
        if let Some(unescaped) = whole.strip_prefix('\\') {
            return unescaped.to_string();
        }
        let items = optional(captures, 2).map(unescape_brackets).unwrap_or_default();
        let delimiter = if items.contains("&gt;") { "&gt;" } else { "," };
        let items: Vec<&str> = items
            .split(delimiter)
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .collect();
        state
            .converter
            .convert(&menu_inline(group(captures, 1), &items))
    })
    .into_owned()
}

fn menu_shorthand(text: &str, state: &ParserState) -> String {
    MENU_SHORTHAND
        .replace_all(text, |captures: &Captures<'_>| {
            let whole = group(captures, 0);
            if let Some(unescaped) = whole.strip_prefix('\\') {
                return unescaped.to_string();
            }
            let parts: Vec<&str> = group(captures, 1).split("&gt;").map(str::trim).collect();
            match parts.split_first() {
                Some((menu, items)) => state.converter.convert(&menu_inline(menu, items)),
                None => whole.to_string(),
            }
        })
        .into_owned()
}

fn split_terms(terms: &str) -> Vec<String> {
    TERM_SEPARATOR
        .split(terms.trim())
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect()
}

fn index_terms(text: &str, state: &mut ParserState) -> String {
    let text = if text.contains("indexterm") {
        INDEXTERM_MACRO
            .replace_all(text, |captures: &Captures<'_>| {
                let whole = group(captures, 0);
                if let Some(unescaped) = whole.strip_prefix('\\') {
                    return unescaped.to_string();
                }
                let content = unescape_brackets(group(captures, 2));
                let visible = group(captures, 1) == "indexterm2";
                let terms = if visible {
                    vec![content.trim().to_string()]
                } else {
                    split_terms(&content)
                };
                let node = Inline::IndexTerm {
                    terms: terms.clone(),
                    visible,
                };
                state.catalog.register_index_term(terms);
                state.converter.convert(&node)
            })
            .into_owned()
    } else {
        text.to_string()
    };
    if text.contains("((") {
        index_term_shorthand(&text, state)
    } else {
        text
    }
}

/// `((term))` is shown and indexed, `(((primary, secondary)))` only indexed.
fn index_term_shorthand(text: &str, state: &mut ParserState) -> String {
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut search = 0;
    while let Some(offset) = text.get(search..).and_then(|rest| rest.find("((")) {
        let open = search + offset;
        let Some(close) = closing_parens(text, open + 2) else {
            break;
        };
        let escaped = head(text, open).ends_with('\\');
        out.push_str(slice(text, copied, open - usize::from(escaped)));
        let content = slice(text, open + 2, close);
        if escaped {
            out.push_str(slice(text, open, close + 2));
        } else {
            let concealed = content
                .strip_prefix('(')
                .and_then(|inner| inner.strip_suffix(')'));
            let (terms, visible) = match concealed {
                Some(inner) => (split_terms(inner), false),
                None => (vec![content.trim().to_string()], true),
            };
            let node = Inline::IndexTerm {
                terms: terms.clone(),
                visible,
            };
            state.catalog.register_index_term(terms);
            out.push_str(&state.converter.convert(&node));
        }
        copied = close + 2;
        search = close + 2;
    }
    out.push_str(tail(text, copied));
    out
}

/// The first `))` after at least one character of content that is not followed by a
/// third `)`.
fn closing_parens(text: &str, content_start: usize) -> Option<usize> {
    let first = text.get(content_start..)?.chars().next()?;
    let mut search = content_start + first.len_utf8();
    loop {
        let close = search + text.get(search..)?.find("))")?;
        if !tail(text, close + 2).starts_with(')') {
            return Some(close);
        }
        search = close + 1;
    }
}

fn anchors(text: &str, state: &mut ParserState) -> String {
    let text = if text.contains("[[[") {
        BIBREF
            .replace_all(text, |captures: &Captures<'_>| {
                let whole = group(captures, 0);
                if let Some(unescaped) = whole.strip_prefix('\\') {
                    return unescaped.to_string();
                }
                let id = group(captures, 1);
                let reftext = format!("[{id}]");
                register_anchor(state, id, Some(reftext.clone()));
                state.converter.convert(&Inline::Bibref {
                    id: id.to_string(),
                    reftext: Some(reftext),
                })
            })
            .into_owned()
    } else {
        text.to_string()
    };
    ANCHOR
        .replace_all(&text, |captures: &Captures<'_>| {
            let whole = group(captures, 0);
            if let Some(unescaped) = whole.strip_prefix('\\') {
                return unescaped.to_string();
            }
            let (id, reftext) = match optional(captures, 1) {
                Some(id) => (id, optional(captures, 2)),
                None => (group(captures, 3), optional(captures, 4)),
            };
            let reftext = reftext.map(unescape_brackets);
            register_anchor(state, id, reftext.clone());
            state.converter.convert(&Inline::Anchor {
                id: id.to_string(),
                reftext,
            })
        })
        .into_owned()
}

fn register_anchor(state: &mut ParserState, id: &str, reftext: Option<String>) {
    if !state.catalog.register_reference(id, reftext) {
        state.report(Diagnostic::warning(
            DiagnosticKind::Structural,
            format!("id assigned to anchor already in use: {id}"),
        ));
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::{Options, substitution::NORMAL};

    fn normal(text: &str) -> String {
        let options = Options::default();
        let mut state = ParserState::new(&options);
        state.substitute(text, NORMAL)
    }

    #[test]
    fn test_footnotes_are_numbered_in_order() {
        let options = Options::default();
        let mut state = ParserState::new(&options);
        let out = state.substitute("One.footnote:[First *note*.] Two.footnote:[Second]", NORMAL);
        assert!(out.contains(r##"href="#_footnotedef_1""##));
        assert!(out.contains(r##"href="#_footnotedef_2""##));
        let texts: Vec<&str> = state
            .catalog
            .footnotes
            .iter()
            .map(|footnote| footnote.text.as_str())
            .collect();
        assert_eq!(texts, vec!["First <strong>note</strong>.", "Second"]);
    }

    #[test]
    fn test_footnote_text_keeps_its_passthroughs() {
        let options = Options::default();
        let mut state = ParserState::new(&options);
        state.substitute("A.footnote:[See +++<u>this</u>+++.]", NORMAL);
        assert_eq!(
            state.catalog.footnotes.first().map(|f| f.text.as_str()),
            Some("See <u>this</u>.")
        );
    }

    #[test]
    fn test_named_footnote_reuse() {
        let options = Options::default();
        let mut state = ParserState::new(&options);
        let out = state.substitute(
            "a footnoteref:[disclaimer,Opinions are my own.] b footnoteref:[disclaimer]",
            NORMAL,
        );
        assert_eq!(state.catalog.footnotes.len(), 1);
        assert!(out.contains(r#"<sup class="footnote" id="_footnote_disclaimer">"#));
        assert!(out.contains(r#"<sup class="footnoteref">"#));
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_unknown_footnote_reference() {
        let options = Options::default();
        let mut state = ParserState::new(&options);
        let out = state.substitute("see footnoteref:[nope]", NORMAL);
        assert_eq!(out, "see footnoteref:[nope]");
        assert_eq!(state.diagnostics.len(), 1);
        assert!(logs_contain("invalid footnote reference: nope"));
    }

    #[rstest]
    #[case(
        "image:logo.png[Company Logo, 64]",
        r#"<span class="image"><img src="logo.png" alt="Company Logo" width="64"></span>"#
    )]
    #[case(
        "image:images/my_logo-big.png[]",
        r#"<span class="image"><img src="images/my_logo-big.png" alt="my logo big"></span>"#
    )]
    #[case(
        "image:a.png[A, link=https://example.org]",
        r#"<span class="image"><a class="image" href="https://example.org"><img src="a.png" alt="A"></a></span>"#
    )]
    #[case("icon:heart[]", r#"<span class="icon">[heart]</span>"#)]
    #[case(r"\image:a.png[]", "image:a.png[]")]
    fn test_media(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normal(input), expected);
    }

    #[rstest]
    #[case(
        "see https://example.org.",
        r#"see <a href="https://example.org" class="bare">https://example.org</a>."#
    )]
    #[case(
        "https://example.org[Example^]",
        r#"<a href="https://example.org" target="_blank" rel="noopener">Example</a>"#
    )]
    #[case(
        "<https://example.org>",
        r#"<a href="https://example.org" class="bare">https://example.org</a>"#
    )]
    #[case(
        "(https://example.org)",
        r#"(<a href="https://example.org" class="bare">https://example.org</a>)"#
    )]
    #[case(r"\https://example.org", "https://example.org")]
    #[case("link:https://example.org", "link:https://example.org")]
    #[case("link:index.html[Home]", r#"<a href="index.html">Home</a>"#)]
    #[case(
        "write to joe@example.org",
        r#"write to <a href="mailto:joe@example.org">joe@example.org</a>"#
    )]
    #[case(
        "mailto:joe@example.org[Joe, Hi there]",
        r#"<a href="mailto:joe@example.org?subject=Hi+there">Joe</a>"#
    )]
    fn test_links(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normal(input), expected);
    }

    #[test]
    fn test_link_attributes_need_linkattrs() {
        let options = Options::builder().with_attribute("linkattrs", true).build();
        let mut state = ParserState::new(&options);
        let out = state.substitute(
            r#"https://example.org["Example, Inc.", role=corp]"#,
            NORMAL,
        );
        assert_eq!(
            out,
            r#"<a href="https://example.org" class="corp">Example, Inc.</a>"#
        );
    }

    #[test]
    fn test_xrefs() {
        let options = Options::default();
        let mut state = ParserState::new(&options);
        state
            .catalog
            .register_reference("intro", Some("Introduction".into()));
        let out = state.substitute(
            "<<intro>>, <<other,Other>>, <<missing>> and xref:doc.adoc#s[Doc]",
            NORMAL,
        );
        assert_eq!(
            out,
            r##"<a href="#intro">Introduction</a>, <a href="#other">Other</a>, <a href="#missing">[missing]</a> and <a href="doc.html#s">Doc</a>"##
        );
    }

    #[rstest]
    #[case(
        "kbd:[Ctrl+T]",
        r#"<span class="keyseq"><kbd>Ctrl</kbd>+<kbd>T</kbd></span>"#
    )]
    #[case("kbd:[F11]", "<kbd>F11</kbd>")]
    #[case("btn:[Save]", r#"<b class="button">Save</b>"#)]
    #[case("menu:Help[]", r#"<b class="menuref">Help</b>"#)]
    #[case(
        "menu:View[Zoom > Reset]",
        r#"<span class="menuseq"><b class="menu">View</b>&#160;<b class="caret">&#8250;</b> <b class="submenu">Zoom</b>&#160;<b class="caret">&#8250;</b> <b class="menuitem">Reset</b></span>"#
    )]
    fn test_ui_macros(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normal(input), expected);
    }

    #[test]
    fn test_split_keys() {
        assert_eq!(split_keys("Ctrl++"), vec!["Ctrl", "+"]);
        assert_eq!(split_keys("Ctrl, Shift, T"), vec!["Ctrl", "Shift", "T"]);
        assert_eq!(split_keys("+"), vec!["+"]);
    }

    #[test]
    fn test_menu_shorthand_is_experimental() {
        assert_eq!(normal(r#""File > Save""#), r#""File &gt; Save""#);
        let options = Options::builder().with_attribute("experimental", true).build();
        let mut state = ParserState::new(&options);
        assert_eq!(
            state.substitute(r#""File > Save""#, NORMAL),
            r#"<span class="menuseq"><b class="menu">File</b>&#160;<b class="caret">&#8250;</b> <b class="menuitem">Save</b></span>"#
        );
    }

    #[test]
    fn test_index_terms() {
        let options = Options::default();
        let mut state = ParserState::new(&options);
        let out = state.substitute(
            "the ((Linux)) kernel (((Unix, BSD))) and indexterm:[Tigers, Big cats]indexterm2:[Lions]",
            NORMAL,
        );
        assert_eq!(out, "the Linux kernel  and Lions");
        assert_eq!(
            state.catalog.index_terms,
            vec![
                vec!["Tigers".to_string(), "Big cats".to_string()],
                vec!["Lions".to_string()],
                vec!["Linux".to_string()],
                vec!["Unix".to_string(), "BSD".to_string()],
            ]
        );
    }

    #[test]
    fn test_escaped_index_term() {
        assert_eq!(normal(r"\((not a term))"), "((not a term))");
    }

    #[test]
    fn test_anchors_register_ids() {
        let options = Options::default();
        let mut state = ParserState::new(&options);
        let out = state.substitute(
            "[[bookmark-a]]Inline and anchor:b[Label] and [[[ref1]]] Book",
            NORMAL,
        );
        assert_eq!(
            out,
            r#"<a id="bookmark-a"></a>Inline and <a id="b"></a> and <a id="ref1"></a>[ref1] Book"#
        );
        assert!(state.catalog.contains_id("bookmark-a"));
        assert_eq!(
            state.catalog.reference("b").and_then(|r| r.reftext.as_deref()),
            Some("Label")
        );
        assert_eq!(
            state.catalog.reference("ref1").and_then(|r| r.reftext.as_deref()),
            Some("[ref1]")
        );
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_duplicate_anchor_is_reported() {
        let options = Options::default();
        let mut state = ParserState::new(&options);
        state.substitute("[[same]]one [[same]]two", NORMAL);
        assert_eq!(state.diagnostics.len(), 1);
        assert!(logs_contain("already in use: same"));
    }

    #[test]
    fn test_escaped_anchor() {
        assert_eq!(normal(r"\[[not-an-anchor]]"), "[[not-an-anchor]]");
    }
}
