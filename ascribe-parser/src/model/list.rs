use serde::Serialize;

use crate::{
    error::SourceLocation,
    model::{BlockMetadata, Context, Node},
};

/// Numbering style of an ordered list, fixed by its first item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderedStyle {
    Arabic,
    LowerAlpha,
    UpperAlpha,
    LowerRoman,
    UpperRoman,
}

impl OrderedStyle {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Arabic => "arabic",
            Self::LowerAlpha => "loweralpha",
            Self::UpperAlpha => "upperalpha",
            Self::LowerRoman => "lowerroman",
            Self::UpperRoman => "upperroman",
        }
    }

    /// The style implied by a run of `.` markers of the given depth.
    pub(crate) fn for_depth(depth: usize) -> Self {
        match depth {
            2 => Self::LowerAlpha,
            3 => Self::LowerRoman,
            4 => Self::UpperAlpha,
            5 => Self::UpperRoman,
            _ => Self::Arabic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ListKind {
    Unordered,
    Ordered {
        style: OrderedStyle,
        /// Set when the first item's number is not the first of its style.
        #[serde(skip_serializing_if = "Option::is_none")]
        start: Option<String>,
    },
    Description,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct List {
    pub context: Context,
    #[serde(flatten)]
    pub kind: ListKind,
    /// The marker shared by every item (`*`, `-`, `..`, `1.`, `::`, ...). Items of
    /// an ordered list with explicit numbers share the family, not the text.
    pub marker: String,
    #[serde(flatten)]
    pub metadata: BlockMetadata,
    pub items: Vec<ListItem>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListItem {
    pub context: Context,
    pub marker: String,
    /// Terms of a description list entry, substituted.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub terms: Vec<String>,
    /// The principal text, substituted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Blocks attached by continuation, nesting or indentation.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Node>,
    pub location: SourceLocation,
}
