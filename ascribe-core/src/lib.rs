//! Vocabulary shared by every stage of the ascribe toolchain: the safe mode policy,
//! the document type and the recognized source extensions.
mod doctype;
mod safe_mode;

pub use doctype::Doctype;
pub use safe_mode::SafeMode;

/// File extensions recognized as markup sources.
///
/// Collaborators that dispatch by extension (include resolvers, directory walkers)
/// should treat any of these as parseable input.
pub const SOURCE_EXTENSIONS: [&str; 5] = ["asciidoc", "adoc", "ad", "asc", "txt"];

/// Returns `true` if `path` ends with one of the [`SOURCE_EXTENSIONS`].
#[must_use]
pub fn is_source_file(path: &str) -> bool {
    path.rsplit_once('.').is_some_and(|(stem, ext)| {
        !stem.is_empty()
            && SOURCE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
    })
}
