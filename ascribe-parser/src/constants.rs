// Default document attributes
//
// These universal attributes are seeded into every document before the caller's own
// attributes. They are soft: the document header or body may override any of them.

use ascribe_core::SafeMode;

/// Universal default attributes applied to all documents.
pub(crate) fn default_attributes() -> Vec<(&'static str, &'static str)> {
    vec![
        // Admonition captions
        ("note-caption", "Note"),
        ("tip-caption", "Tip"),
        ("important-caption", "Important"),
        ("warning-caption", "Warning"),
        ("caution-caption", "Caution"),
        // Block captions
        ("example-caption", "Example"),
        ("figure-caption", "Figure"),
        ("table-caption", "Table"),
        ("appendix-caption", "Appendix"),
        // UI labels
        ("toc-title", "Table of Contents"),
        ("untitled-label", "Untitled"),
        ("version-label", "Version"),
        ("last-update-label", "Last updated"),
        // Structural settings
        ("toclevels", "2"),
        ("sectnumlevels", "3"),
        ("max-include-depth", "64"),
        // ID generation
        ("idprefix", "_"),
        ("idseparator", "_"),
        ("sectids", ""),
        // Inline math notation used by the bare `math:` macro
        ("math", "asciimath"),
        ("backend", "html5"),
        ("encoding", "UTF-8"),
    ]
}

/// Attributes a document may not assign once the safe mode reaches `Server`.
pub(crate) const SERVER_PROTECTED_ATTRIBUTES: [&str; 9] = [
    "backend",
    "doctype",
    "docinfo",
    "source-highlighter",
    "docdir",
    "docfile",
    "linkcss",
    "stylesheet",
    "copycss",
];

/// Whether the document is allowed to assign `name` at `safe_mode`.
pub(crate) fn is_protected(name: &str, safe_mode: SafeMode) -> bool {
    safe_mode >= SafeMode::Server && SERVER_PROTECTED_ATTRIBUTES.contains(&name)
}

/// Admonition labels, recognized both as paragraph prefixes (`NOTE: text`) and as
/// block styles (`[NOTE]`).
pub(crate) const ADMONITION_STYLES: [&str; 5] = ["NOTE", "TIP", "IMPORTANT", "WARNING", "CAUTION"];

/// Section styles that mark special sections (never numbered unless they are appendices).
pub(crate) const SPECIAL_SECTION_STYLES: [&str; 9] = [
    "abstract",
    "appendix",
    "bibliography",
    "colophon",
    "dedication",
    "glossary",
    "index",
    "preface",
    "partintro",
];
