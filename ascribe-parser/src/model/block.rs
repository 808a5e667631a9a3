use serde::Serialize;

use crate::{error::SourceLocation, model::Node, substitution::Substitution};

/// The node context tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Context {
    Section,
    Paragraph,
    Listing,
    Literal,
    Example,
    Quote,
    Verse,
    Sidebar,
    Passthrough,
    Stem,
    Table,
    Ulist,
    Olist,
    Dlist,
    ListItem,
    Open,
    Comment,
    Admonition,
    FloatingTitle,
    ThematicBreak,
    PageBreak,
    Image,
    Video,
    Audio,
    Toc,
}

impl Context {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Section => "section",
            Self::Paragraph => "paragraph",
            Self::Listing => "listing",
            Self::Literal => "literal",
            Self::Example => "example",
            Self::Quote => "quote",
            Self::Verse => "verse",
            Self::Sidebar => "sidebar",
            Self::Passthrough => "passthrough",
            Self::Stem => "stem",
            Self::Table => "table",
            Self::Ulist => "ulist",
            Self::Olist => "olist",
            Self::Dlist => "dlist",
            Self::ListItem => "list_item",
            Self::Open => "open",
            Self::Comment => "comment",
            Self::Admonition => "admonition",
            Self::FloatingTitle => "floating_title",
            Self::ThematicBreak => "thematic_break",
            Self::PageBreak => "page_break",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Toc => "toc",
        }
    }

    /// Verbatim contexts keep their lines and only escape special characters.
    #[must_use]
    pub fn is_verbatim(self) -> bool {
        matches!(self, Self::Listing | Self::Literal)
    }
}

/// Metadata attached to a block by the lines preceding it (block title, anchor,
/// attribute list) or by its own attribute list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlockMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reftext: Option<String>,
    /// The block title, after substitution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Named attributes, in the order they were written.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<(String, String)>,
    /// Positional attributes after the style.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub positional: Vec<String>,
}

impl BlockMetadata {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    #[must_use]
    pub fn has_option(&self, name: &str) -> bool {
        self.options.iter().any(|option| option == name)
    }

    pub(crate) fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    /// Fold `other` into `self`; values in `other` win.
    pub(crate) fn merge(&mut self, other: Self) {
        if other.id.is_some() {
            self.id = other.id;
        }
        if other.reftext.is_some() {
            self.reftext = other.reftext;
        }
        if other.title.is_some() {
            self.title = other.title;
        }
        if other.style.is_some() {
            self.style = other.style;
        }
        self.roles.extend(other.roles);
        self.options.extend(other.options);
        for (name, value) in other.attributes {
            self.set_attribute(&name, value);
        }
        if !other.positional.is_empty() {
            self.positional = other.positional;
        }
    }
}

/// What a block holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Content {
    /// Breaks and block macros.
    Empty,
    /// Lines of text and their substituted form.
    Simple { lines: Vec<String>, text: String },
    /// Child nodes (example, sidebar, quote, open, admonition blocks).
    Compound(Vec<Node>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub context: Context,
    #[serde(flatten)]
    pub metadata: BlockMetadata,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subs: Vec<Substitution>,
    pub content: Content,
    pub location: SourceLocation,
}

impl Block {
    pub(crate) fn new(context: Context, metadata: BlockMetadata, location: SourceLocation) -> Self {
        Self {
            context,
            metadata,
            subs: Vec::new(),
            content: Content::Empty,
            location,
        }
    }

    /// The substituted text of a simple block.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Content::Simple { text, .. } => Some(text),
            Content::Empty | Content::Compound(_) => None,
        }
    }

    /// Child nodes of a compound block; empty otherwise.
    #[must_use]
    pub fn children(&self) -> &[Node] {
        match &self.content {
            Content::Compound(children) => children,
            Content::Empty | Content::Simple { .. } => &[],
        }
    }

    #[must_use]
    pub fn style(&self) -> Option<&str> {
        self.metadata.style.as_deref()
    }
}
