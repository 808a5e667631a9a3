//! Document attributes: the ordered store, its interpolation rules and the attribute
//! list syntax shared by block attribute lines and inline macros.
mod interpolate;
mod intrinsics;
mod list;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Serialize, Serializer, ser::SerializeMap};

pub use interpolate::{AttributeMissing, AttributeUndefined};
pub use intrinsics::intrinsic;
pub use list::AttributeList;

use crate::diagnostic::Diagnostic;

/// Attributes that stay assignable from document content even when locked.
pub const FLEXIBLE_ATTRIBUTES: [&str; 2] = ["numbered", "sectnums"];

/// A value supplied through the API for an initial attribute.
///
/// `Bool(true)` sets the attribute to the empty string, `Bool(false)` unsets it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeValue {
    String(String),
    Bool(bool),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// The ordered mapping of attribute names to values for one document.
///
/// Names are case-insensitive and stored lowercased. Every name may carry a lock; a
/// locked name can only be changed through [`AttributeStore::set`] and
/// [`AttributeStore::unset`], never through a content assignment
/// ([`AttributeStore::assign`]) unless it is one of the [`FLEXIBLE_ATTRIBUTES`].
#[derive(Debug, Clone, Default)]
pub struct AttributeStore {
    entries: Vec<(String, String)>,
    index: FxHashMap<String, usize>,
    locked: FxHashSet<String>,
    warned_intrinsics: FxHashSet<String>,
    diagnostics: Vec<Diagnostic>,
}

impl AttributeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value`, regardless of any lock. When `locked` is true the name
    /// becomes locked; an existing lock is never removed by this call.
    pub fn set(&mut self, name: &str, value: impl Into<String>, locked: bool) {
        let name = name.to_lowercase();
        let value = value.into();
        if let Some(&position) = self.index.get(&name) {
            if let Some(entry) = self.entries.get_mut(position) {
                entry.1 = value;
            }
        } else {
            self.index.insert(name.clone(), self.entries.len());
            self.entries.push((name.clone(), value));
        }
        if locked {
            self.locked.insert(name);
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        let position = if name.bytes().any(|b| b.is_ascii_uppercase()) {
            self.index.get(&name.to_lowercase())
        } else {
            self.index.get(name)
        }?;
        self.entries.get(*position).map(|(_, value)| value.as_str())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove `name`, regardless of any lock. The lock state is kept.
    pub fn unset(&mut self, name: &str) {
        let name = name.to_lowercase();
        if self.index.remove(&name).is_some() {
            self.entries.retain(|(existing, _)| *existing != name);
            self.reindex();
        }
    }

    /// Lock `name` without changing its value (which may be absent).
    pub fn lock(&mut self, name: &str) {
        self.locked.insert(name.to_lowercase());
    }

    #[must_use]
    pub fn is_locked(&self, name: &str) -> bool {
        self.locked.contains(&name.to_lowercase())
    }

    /// A content assignment (`:name: value` or `:name!:` when `value` is `None`).
    ///
    /// Returns `false`, without touching the store, when the name is locked and not
    /// flexible.
    pub fn assign(&mut self, name: &str, value: Option<String>) -> bool {
        let name = name.to_lowercase();
        if self.locked.contains(&name) && !FLEXIBLE_ATTRIBUTES.contains(&name.as_str()) {
            tracing::trace!(%name, "ignoring assignment to locked attribute");
            return false;
        }
        match value {
            Some(value) => self.set(&name, value, false),
            None => self.unset(&name),
        }
        true
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The policy for references to undefined attributes, read from the store.
    #[must_use]
    pub fn attribute_missing(&self) -> AttributeMissing {
        self.get("attribute-missing")
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    /// The policy for assignments that undefine an attribute, read from the store.
    #[must_use]
    pub fn attribute_undefined(&self) -> AttributeUndefined {
        self.get("attribute-undefined")
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    /// Diagnostics produced by interpolation since the last call.
    pub(crate) fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    fn reindex(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, (name, _))| (name.clone(), position))
            .collect();
    }
}

impl Serialize for AttributeStore {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            state.serialize_entry(name, value)?;
        }
        state.end()
    }
}
