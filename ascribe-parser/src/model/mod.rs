//! The document tree produced by the lexer.
//!
//! The tree is owned top-down: a [`Document`] owns its [`Node`]s and each node owns its
//! children. Nothing points back at its parent; code that needs a node's ancestry walks
//! the tree with [`Document::walk`], which hands the ancestor chain to the visitor.
use ascribe_core::{Doctype, SafeMode};
use serde::Serialize;

use crate::{attributes::AttributeStore, error::SourceLocation};

mod block;
mod catalog;
mod list;
mod section;
mod table;

pub use block::{Block, BlockMetadata, Content, Context};
pub use catalog::{Catalog, Footnote, Reference};
pub use list::{List, ListItem, ListKind, OrderedStyle};
pub use section::Section;
pub(crate) use section::generate_id;
pub use table::{
    Cell, CellContent, CellSpec, CellStyle, Column, HorizontalAlignment, Row, Table,
    TableFormat, VerticalAlignment,
};

/// Any node of the tree below the document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
#[non_exhaustive]
pub enum Node {
    Section(Section),
    Block(Block),
    List(List),
    Table(Table),
}

impl Node {
    #[must_use]
    pub fn context(&self) -> Context {
        match self {
            Self::Section(section) => section.context,
            Self::Block(block) => block.context,
            Self::List(list) => list.context,
            Self::Table(table) => table.context,
        }
    }

    #[must_use]
    pub fn metadata(&self) -> &BlockMetadata {
        match self {
            Self::Section(section) => &section.metadata,
            Self::Block(block) => &block.metadata,
            Self::List(list) => &list.metadata,
            Self::Table(table) => &table.metadata,
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.metadata().id.as_deref()
    }

    #[must_use]
    pub fn location(&self) -> &SourceLocation {
        match self {
            Self::Section(section) => &section.location,
            Self::Block(block) => &block.location,
            Self::List(list) => &list.location,
            Self::Table(table) => &table.location,
        }
    }

    /// The nodes directly below this one, in document order. List items and table cells
    /// are transparent: their blocks count as children of the list or table.
    #[must_use]
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Self::Section(section) => section.children.iter().collect(),
            Self::Block(block) => block.children().iter().collect(),
            Self::List(list) => list
                .items
                .iter()
                .flat_map(|item| item.blocks.iter())
                .collect(),
            Self::Table(table) => table
                .rows()
                .flatten()
                .flat_map(|cell| match &cell.content {
                    CellContent::Blocks(blocks) => blocks.as_slice(),
                    CellContent::Paragraphs(_) | CellContent::Literal(_) => &[],
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Author {
    pub firstname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middlename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastname: Option<String>,
    pub initials: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Author {
    /// First, middle and last names joined by spaces.
    #[must_use]
    pub fn name(&self) -> String {
        [Some(&self.firstname), self.middlename.as_ref(), self.lastname.as_ref()]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Revision {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Header {
    /// The document title after substitution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<Author>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<Revision>,
    pub location: SourceLocation,
}

/// The root of the tree.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub doctype: Doctype,
    pub safe_mode: SafeMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<Header>,
    pub attributes: AttributeStore,
    pub children: Vec<Node>,
    pub catalog: Catalog,
}

impl Document {
    /// The document title: the header title, or the `doctitle` attribute.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.header
            .as_ref()
            .and_then(|header| header.title.as_deref())
            .or_else(|| self.attributes.get("doctitle"))
    }

    /// Visit every node depth-first, in document order. The visitor receives the node
    /// and its ancestors, outermost first.
    pub fn walk<'a, F>(&'a self, mut visit: F)
    where
        F: FnMut(&'a Node, &[&'a Node]),
    {
        let mut ancestors = Vec::new();
        for node in &self.children {
            walk_node(node, &mut ancestors, &mut visit);
        }
    }

    /// Find the node carrying `id`.
    #[must_use]
    pub fn find_by_id(&self, id: &str) -> Option<&Node> {
        let mut found = None;
        self.walk(|node, _| {
            if found.is_none() && node.id() == Some(id) {
                found = Some(node);
            }
        });
        found
    }

    /// The tree as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Fails only if a serializer error occurs, which the tree's types never produce.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn walk_node<'a, F>(node: &'a Node, ancestors: &mut Vec<&'a Node>, visit: &mut F)
where
    F: FnMut(&'a Node, &[&'a Node]),
{
    visit(node, ancestors);
    ancestors.push(node);
    for child in node.children() {
        walk_node(child, ancestors, visit);
    }
    ancestors.pop();
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn paragraph(text: &str, line: usize) -> Node {
        Node::Block(Block {
            context: Context::Paragraph,
            metadata: BlockMetadata::default(),
            subs: Vec::new(),
            content: Content::Simple {
                lines: vec![text.to_string()],
                text: text.to_string(),
            },
            location: SourceLocation::new(None, line),
        })
    }

    fn document(children: Vec<Node>) -> Document {
        Document {
            doctype: Doctype::Article,
            safe_mode: SafeMode::Secure,
            header: None,
            attributes: AttributeStore::new(),
            children,
            catalog: Catalog::default(),
        }
    }

    #[test]
    fn test_walk_reports_ancestors() {
        let mut example = Block::new(
            Context::Example,
            BlockMetadata {
                id: Some("ex".into()),
                ..BlockMetadata::default()
            },
            SourceLocation::new(None, 3),
        );
        example.content = Content::Compound(vec![paragraph("inner", 4)]);
        let section = Node::Section(Section {
            context: Context::Section,
            level: 1,
            title: "One".into(),
            source_title: "One".into(),
            sectname: "sect1".into(),
            number: None,
            special: false,
            metadata: BlockMetadata::default(),
            children: vec![Node::Block(example)],
            location: SourceLocation::new(None, 1),
        });
        let document = document(vec![section, paragraph("after", 7)]);

        let mut seen = Vec::new();
        document.walk(|node, ancestors| {
            let path: Vec<&str> = ancestors.iter().map(|a| a.context().name()).collect();
            seen.push((node.context().name(), path.join("/")));
        });
        assert_eq!(
            seen,
            vec![
                ("section", String::new()),
                ("example", "section".to_string()),
                ("paragraph", "section/example".to_string()),
                ("paragraph", String::new()),
            ]
        );
        assert_eq!(
            document.find_by_id("ex").map(|node| node.location().line),
            Some(3)
        );
    }

    #[test]
    fn test_to_json_uses_lowercase_tags() -> Result<(), serde_json::Error> {
        let document = document(vec![paragraph("hi", 1)]);
        let json: serde_json::Value = serde_json::from_str(&document.to_json()?)?;
        assert_eq!(json["children"][0]["context"], "paragraph");
        assert_eq!(json["safe_mode"], "secure");
        assert_eq!(json["doctype"], "article");
        Ok(())
    }
}
