use serde::Serialize;

use crate::{
    error::SourceLocation,
    model::{BlockMetadata, Context, Node},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    /// `|===` and `!===`: prefix-separated values.
    #[default]
    Psv,
    /// `,===`
    Csv,
    /// `:===`
    Dsv,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalAlignment {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlignment {
    #[default]
    Top,
    Middle,
    Bottom,
}

/// The style letter of a column or cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CellStyle {
    /// `a`: the cell holds a nested document.
    Asciidoc,
    #[default]
    Default,
    Emphasis,
    Header,
    /// `l`: verbatim text.
    Literal,
    Monospaced,
    Strong,
    Verse,
}

impl CellStyle {
    pub(crate) fn from_letter(letter: char) -> Option<Self> {
        Some(match letter {
            'a' => Self::Asciidoc,
            'd' => Self::Default,
            'e' => Self::Emphasis,
            'h' => Self::Header,
            'l' => Self::Literal,
            'm' => Self::Monospaced,
            's' => Self::Strong,
            'v' => Self::Verse,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Column {
    /// Relative width; a `%` width keeps its number.
    pub width: u32,
    pub halign: HorizontalAlignment,
    pub valign: VerticalAlignment,
    pub style: CellStyle,
}

/// The formatting descriptor in front of a cell, parsed apart from its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellSpec {
    pub colspan: usize,
    pub rowspan: usize,
    /// `None` falls back to the column.
    pub halign: Option<HorizontalAlignment>,
    pub valign: Option<VerticalAlignment>,
    pub style: Option<CellStyle>,
}

impl Default for CellSpec {
    fn default() -> Self {
        Self {
            colspan: 1,
            rowspan: 1,
            halign: None,
            valign: None,
            style: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CellContent {
    /// Paragraphs of substituted text.
    Paragraphs(Vec<String>),
    /// Verbatim text of an `l` cell.
    Literal(String),
    /// A nested document of an `a` cell.
    Blocks(Vec<Node>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    pub spec: CellSpec,
    pub content: CellContent,
    /// The cell text as written.
    pub source: String,
}

pub type Row = Vec<Cell>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub context: Context,
    pub format: TableFormat,
    #[serde(flatten)]
    pub metadata: BlockMetadata,
    pub columns: Vec<Column>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub head: Vec<Row>,
    pub body: Vec<Row>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub foot: Vec<Row>,
    pub location: SourceLocation,
}

impl Table {
    /// All rows, head first.
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.head.iter().chain(&self.body).chain(&self.foot)
    }
}
