use rustc_hash::FxHashMap;
use serde::Serialize;

/// An id registered by a section, block anchor, inline anchor or bibliography entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reftext: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Footnote {
    pub number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The footnote text, after substitution.
    pub text: String,
}

/// Document-wide registries filled while the body is parsed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Catalog {
    pub references: Vec<Reference>,
    pub footnotes: Vec<Footnote>,
    /// Index terms in document order, primary term first.
    pub index_terms: Vec<Vec<String>>,
    #[serde(skip)]
    reference_index: FxHashMap<String, usize>,
    #[serde(skip)]
    named_footnotes: FxHashMap<String, u32>,
}

impl Catalog {
    /// Register `id`. Returns `false`, leaving the first registration in place, when the
    /// id is already taken.
    pub(crate) fn register_reference(&mut self, id: &str, reftext: Option<String>) -> bool {
        if self.reference_index.contains_key(id) {
            tracing::warn!(%id, "duplicate id");
            return false;
        }
        self.reference_index
            .insert(id.to_string(), self.references.len());
        self.references.push(Reference {
            id: id.to_string(),
            reftext,
        });
        true
    }

    #[must_use]
    pub fn contains_id(&self, id: &str) -> bool {
        self.reference_index.contains_key(id)
    }

    #[must_use]
    pub fn reference(&self, id: &str) -> Option<&Reference> {
        self.reference_index
            .get(id)
            .and_then(|index| self.references.get(*index))
    }

    /// Number a footnote. Named footnotes keep the number they were first given; a
    /// repeated name returns that number and `false`.
    #[tracing::instrument(level = "trace", skip(self, text))]
    pub(crate) fn register_footnote(&mut self, id: Option<&str>, text: Option<String>) -> (u32, bool) {
        if let Some(id) = id
            && let Some(number) = self.named_footnotes.get(id)
        {
            return (*number, false);
        }
        let number = u32::try_from(self.footnotes.len() + 1).unwrap_or(u32::MAX);
        if let Some(id) = id {
            self.named_footnotes.insert(id.to_string(), number);
        }
        self.footnotes.push(Footnote {
            number,
            id: id.map(str::to_string),
            text: text.unwrap_or_default(),
        });
        (number, true)
    }

    /// The number given to the footnote named `id`, if one was defined.
    #[must_use]
    pub fn named_footnote(&self, id: &str) -> Option<u32> {
        self.named_footnotes.get(id).copied()
    }

    pub(crate) fn register_index_term(&mut self, terms: Vec<String>) {
        if !terms.is_empty() {
            self.index_terms.push(terms);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_named_footnotes_reuse_their_number() {
        let mut catalog = Catalog::default();
        assert_eq!(catalog.register_footnote(None, Some("one".into())), (1, true));
        assert_eq!(
            catalog.register_footnote(Some("disclaimer"), Some("two".into())),
            (2, true)
        );
        assert_eq!(catalog.register_footnote(Some("disclaimer"), None), (2, false));
        assert_eq!(catalog.register_footnote(None, Some("three".into())), (3, true));
        assert_eq!(catalog.footnotes.len(), 3);
    }

    #[test]
    fn test_duplicate_reference_keeps_first() {
        let mut catalog = Catalog::default();
        assert!(catalog.register_reference("intro", Some("Intro".into())));
        assert!(!catalog.register_reference("intro", Some("Other".into())));
        assert_eq!(
            catalog.reference("intro").and_then(|r| r.reftext.as_deref()),
            Some("Intro")
        );
    }
}
