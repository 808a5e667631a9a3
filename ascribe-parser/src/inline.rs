//! Inline nodes recognized by the substitution passes, and the converter that turns
//! each of them into output markup.
//!
//! Inline nodes are transient: a pass recognizes one, hands it to the
//! [`InlineConverter`] and splices the returned string back into the text. The
//! document tree only ever holds the converted text.
use std::fmt::{self, Write as _};

use serde::Serialize;

/// Which quoted-text rule produced a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteKind {
    Strong,
    Emphasis,
    Monospaced,
    Superscript,
    Subscript,
    Double,
    Single,
    Mark,
    /// `[role]#text#`: a span that only carries attributes.
    Unquoted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MathNotation {
    AsciiMath,
    LatexMath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Icon,
    Video,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum Inline {
    Quoted {
        kind: QuoteKind,
        /// Already-converted content of the span.
        text: String,
        id: Option<String>,
        roles: Vec<String>,
    },
    Anchor {
        id: String,
        reftext: Option<String>,
    },
    Bibref {
        id: String,
        reftext: Option<String>,
    },
    Xref {
        /// `#id` for a reference inside the document, `doc.html#id` otherwise.
        href: String,
        text: String,
    },
    Link {
        target: String,
        /// Empty when the link text is the target itself.
        text: String,
        window: Option<String>,
        roles: Vec<String>,
    },
    Media {
        kind: MediaKind,
        target: String,
        alt: String,
        width: Option<String>,
        height: Option<String>,
        title: Option<String>,
        link: Option<String>,
        roles: Vec<String>,
    },
    Footnote {
        number: u32,
        id: Option<String>,
        /// `false` for a repeated reference to an already defined footnote.
        first: bool,
    },
    IndexTerm {
        terms: Vec<String>,
        visible: bool,
    },
    Kbd {
        keys: Vec<String>,
    },
    Button {
        label: String,
    },
    Menu {
        menu: String,
        submenus: Vec<String>,
        item: Option<String>,
    },
    Math {
        notation: MathNotation,
        text: String,
    },
    LineBreak,
}

/// Turns inline nodes into output markup.
///
/// The converter is shared by every block of one parse and must not hold per-parse
/// state; document-wide numbering (footnotes) is done before the node reaches it.
pub trait InlineConverter: Send + Sync + fmt::Debug {
    fn convert(&self, node: &Inline) -> String;
}

/// The default converter, producing HTML5 fragments.
#[derive(Debug, Default, Clone, Copy)]
pub struct Html5Converter;

fn open_tag(out: &mut String, tag: &str, id: Option<&str>, roles: &[String]) {
    let _ = write!(out, "<{tag}");
    if let Some(id) = id {
        let _ = write!(out, " id=\"{id}\"");
    }
    if !roles.is_empty() {
        let _ = write!(out, " class=\"{}\"", roles.join(" "));
    }
    out.push('>');
}

fn wrap(tag: &str, text: &str, id: Option<&str>, roles: &[String]) -> String {
    let mut out = String::with_capacity(text.len() + 2 * tag.len() + 5);
    open_tag(&mut out, tag, id, roles);
    let _ = write!(out, "{text}</{tag}>");
    out
}

fn quoted(kind: QuoteKind, text: &str, id: Option<&str>, roles: &[String]) -> String {
    let tag = match kind {
        QuoteKind::Strong => "strong",
        QuoteKind::Emphasis => "em",
        QuoteKind::Monospaced => "code",
        QuoteKind::Superscript => "sup",
        QuoteKind::Subscript => "sub",
        QuoteKind::Mark => "mark",
        QuoteKind::Double | QuoteKind::Single | QuoteKind::Unquoted => {
            let text = match kind {
                QuoteKind::Double => format!("&#8220;{text}&#8221;"),
                QuoteKind::Single => format!("&#8216;{text}&#8217;"),
                QuoteKind::Strong
                | QuoteKind::Emphasis
                | QuoteKind::Monospaced
                | QuoteKind::Superscript
                | QuoteKind::Subscript
                | QuoteKind::Mark
                | QuoteKind::Unquoted => text.to_string(),
            };
            return if id.is_none() && roles.is_empty() {
                text
            } else {
                wrap("span", &text, id, roles)
            };
        }
    };
    wrap(tag, text, id, roles)
}

fn media(
    kind: MediaKind,
    target: &str,
    alt: &str,
    size: (Option<&str>, Option<&str>),
    title: Option<&str>,
    link: Option<&str>,
) -> String {
    let (width, height) = size;
    let mut sizing = String::new();
    if let Some(width) = width {
        let _ = write!(sizing, " width=\"{width}\"");
    }
    if let Some(height) = height {
        let _ = write!(sizing, " height=\"{height}\"");
    }
    let title = title
        .map(|title| format!(" title=\"{title}\""))
        .unwrap_or_default();
    let element = match kind {
        MediaKind::Image => format!("<img src=\"{target}\" alt=\"{alt}\"{sizing}{title}>"),
        MediaKind::Icon => format!("[{alt}]"),
        MediaKind::Video => format!("<video src=\"{target}\"{sizing} controls></video>"),
        MediaKind::Audio => format!("<audio src=\"{target}\" controls></audio>"),
    };
    let element = match link {
        Some(href) => format!("<a class=\"image\" href=\"{href}\">{element}</a>"),
        None => element,
    };
    let class = match kind {
        MediaKind::Image => "image",
        MediaKind::Icon => "icon",
        MediaKind::Video => "video",
        MediaKind::Audio => "audio",
    };
    format!("<span class=\"{class}\">{element}</span>")
}

impl InlineConverter for Html5Converter {
    fn convert(&self, node: &Inline) -> String {
        match node {
            Inline::Quoted {
                kind,
                text,
                id,
                roles,
            } => quoted(*kind, text, id.as_deref(), roles),
            Inline::Anchor { id, .. } => format!("<a id=\"{id}\"></a>"),
            Inline::Bibref { id, .. } => format!("<a id=\"{id}\"></a>[{id}]"),
            Inline::Xref { href, text } => format!("<a href=\"{href}\">{text}</a>"),
            Inline::Link {
                target,
                text,
                window,
                roles,
            } => {
                let mut out = format!("<a href=\"{target}\"");
                let mut classes = roles.clone();
                if text.is_empty() {
                    classes.insert(0, "bare".to_string());
                }
                if !classes.is_empty() {
                    let _ = write!(out, " class=\"{}\"", classes.join(" "));
                }
                if let Some(window) = window {
                    let _ = write!(out, " target=\"{window}\"");
                    if window == "_blank" {
                        out.push_str(" rel=\"noopener\"");
                    }
                }
                let text = if text.is_empty() { target } else { text };
                let _ = write!(out, ">{text}</a>");
                out
            }
            Inline::Media {
                kind,
                target,
                alt,
                width,
                height,
                title,
                link,
                ..
            } => media(
                *kind,
                target,
                alt,
                (width.as_deref(), height.as_deref()),
                title.as_deref(),
                link.as_deref(),
            ),
            Inline::Footnote { number, id, first } => {
                let id = id
                    .as_deref()
                    .filter(|_| *first)
                    .map(|id| format!(" id=\"_footnote_{id}\""))
                    .unwrap_or_default();
                if *first {
                    format!(
                        "<sup class=\"footnote\"{id}>[<a id=\"_footnoteref_{number}\" class=\"footnote\" href=\"#_footnotedef_{number}\" title=\"View footnote.\">{number}</a>]</sup>"
                    )
                } else {
                    format!(
                        "<sup class=\"footnoteref\">[<a class=\"footnote\" href=\"#_footnotedef_{number}\" title=\"View footnote.\">{number}</a>]</sup>"
                    )
                }
            }
            Inline::IndexTerm { terms, visible } => {
                if *visible {
                    terms.first().cloned().unwrap_or_default()
                } else {
                    String::new()
                }
            }
            Inline::Kbd { keys } => match keys.as_slice() {
                [key] => format!("<kbd>{key}</kbd>"),
                keys => {
                    let keys: Vec<String> =
                        keys.iter().map(|key| format!("<kbd>{key}</kbd>")).collect();
                    format!("<span class=\"keyseq\">{}</span>", keys.join("+"))
                }
            },
            Inline::Button { label } => format!("<b class=\"button\">{label}</b>"),
            Inline::Menu {
                menu,
                submenus,
                item,
            } => {
                if submenus.is_empty() && item.is_none() {
                    return format!("<b class=\"menuref\">{menu}</b>");
                }
                let caret = "&#160;<b class=\"caret\">&#8250;</b> ";
                let mut out = format!("<span class=\"menuseq\"><b class=\"menu\">{menu}</b>");
                for submenu in submenus {
                    let _ = write!(out, "{caret}<b class=\"submenu\">{submenu}</b>");
                }
                if let Some(item) = item {
                    let _ = write!(out, "{caret}<b class=\"menuitem\">{item}</b>");
                }
                out.push_str("</span>");
                out
            }
            Inline::Math { notation, text } => match notation {
                MathNotation::AsciiMath => format!("\\${text}\\$"),
                MathNotation::LatexMath => format!("\\({text}\\)"),
            },
            Inline::LineBreak => "<br>".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_quoted_spans() {
        let converter = Html5Converter;
        let strong = Inline::Quoted {
            kind: QuoteKind::Strong,
            text: "bold".into(),
            id: None,
            roles: vec![],
        };
        assert_eq!(converter.convert(&strong), "<strong>bold</strong>");
        let span = Inline::Quoted {
            kind: QuoteKind::Unquoted,
            text: "text".into(),
            id: Some("x".into()),
            roles: vec!["red".into(), "big".into()],
        };
        assert_eq!(
            converter.convert(&span),
            r#"<span id="x" class="red big">text</span>"#
        );
        let double = Inline::Quoted {
            kind: QuoteKind::Double,
            text: "hi".into(),
            id: None,
            roles: vec![],
        };
        assert_eq!(converter.convert(&double), "&#8220;hi&#8221;");
    }

    #[test]
    fn test_bare_link_and_window() {
        let converter = Html5Converter;
        let bare = Inline::Link {
            target: "https://example.org".into(),
            text: String::new(),
            window: None,
            roles: vec![],
        };
        assert_eq!(
            converter.convert(&bare),
            r#"<a href="https://example.org" class="bare">https://example.org</a>"#
        );
        let blank = Inline::Link {
            target: "https://example.org".into(),
            text: "Example".into(),
            window: Some("_blank".into()),
            roles: vec![],
        };
        assert_eq!(
            converter.convert(&blank),
            r#"<a href="https://example.org" target="_blank" rel="noopener">Example</a>"#
        );
    }

    #[test]
    fn test_kbd_and_menu() {
        let converter = Html5Converter;
        assert_eq!(
            converter.convert(&Inline::Kbd {
                keys: vec!["Ctrl".into(), "T".into()]
            }),
            r#"<span class="keyseq"><kbd>Ctrl</kbd>+<kbd>T</kbd></span>"#
        );
        assert_eq!(
            converter.convert(&Inline::Menu {
                menu: "File".into(),
                submenus: vec![],
                item: Some("Save".into()),
            }),
            r#"<span class="menuseq"><b class="menu">File</b>&#160;<b class="caret">&#8250;</b> <b class="menuitem">Save</b></span>"#
        );
    }
}
