use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::{
    error::SourceLocation,
    model::{BlockMetadata, Context, Node},
    pattern::compile,
};

static MARKUP: LazyLock<Regex> = LazyLock::new(|| compile(r"<[^>]+>"));

/// Character references and runs of non-word characters, both replaced by the separator.
static INVALID_ID_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"&(?:[a-zA-Z]{2,}|#\d{2,4}|#x[a-fA-F0-9]{2,4});|\W+?")
});

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub context: Context,
    /// 0 for book parts and the document title, 1-5 for nested sections.
    pub level: u8,
    /// The title after substitution.
    pub title: String,
    /// The title as written.
    pub source_title: String,
    /// `sect1`, `appendix`, `part`, ... derived from the level and style.
    pub sectname: String,
    /// Set when numbering is enabled: `1.2.`, or `A.` for appendices.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    pub special: bool,
    #[serde(flatten)]
    pub metadata: BlockMetadata,
    pub children: Vec<Node>,
    pub location: SourceLocation,
}

impl Section {
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.metadata.id.as_deref()
    }
}

/// Derive an id from a substituted section title.
///
/// Markup is stripped, the text is lowercased and every run of characters that cannot
/// appear in an id collapses to one `separator`. Separators are never left at either
/// end of the generated part.
pub(crate) fn generate_id(title: &str, prefix: &str, separator: &str) -> String {
    let text = MARKUP.replace_all(title, "").to_lowercase();
    let replaced = INVALID_ID_CHARS.replace_all(&text, " ");
    let words: Vec<&str> = replaced.split_whitespace().collect();
    format!("{prefix}{}", words.join(separator))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("Getting Started", "_", "_", "_getting_started")]
    #[case("<strong>Bold</strong> move", "_", "_", "_bold_move")]
    #[case("Cats &amp; Dogs", "", "-", "cats-dogs")]
    #[case("(Intro)", "sec-", "_", "sec-intro")]
    #[case("Café au lait", "_", "_", "_café_au_lait")]
    fn test_generate_id(
        #[case] title: &str,
        #[case] prefix: &str,
        #[case] separator: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(generate_id(title, prefix, separator), expected);
    }
}
