use std::{fmt, str::FromStr};

use serde::Serialize;

/// Document type to use when parsing a document.
///
/// The doctype alters a small number of structural rules: a `book` may contain level 0
/// sections (parts), a `manpage` reads its name and purpose from the `NAME` section, and
/// `inline` documents skip header processing entirely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Doctype {
    #[default]
    Article,
    Book,
    Manpage,
    Inline,
}

impl Doctype {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Book => "book",
            Self::Manpage => "manpage",
            Self::Inline => "inline",
        }
    }
}

impl fmt::Display for Doctype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Doctype {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "article" => Ok(Self::Article),
            "book" => Ok(Self::Book),
            "manpage" => Ok(Self::Manpage),
            "inline" => Ok(Self::Inline),
            _ => Err(format!(
                "invalid doctype: '{s}', expected: article, book, manpage, inline"
            )),
        }
    }
}
