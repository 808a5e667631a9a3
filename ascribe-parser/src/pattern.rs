use regex::Regex;

/// Compile one of the crate's built-in patterns.
///
/// Every caller passes a literal that is covered by a unit test forcing its
/// `LazyLock`, so a failure here is a programming error caught before release.
#[allow(clippy::expect_used)]
pub(crate) fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in pattern must compile")
}

/// `text` from byte offset `at` on. Empty when `at` is past the end or inside a char.
pub(crate) fn tail(text: &str, at: usize) -> &str {
    text.get(at..).unwrap_or_default()
}

/// `text` up to byte offset `at`. Empty when `at` is past the end or inside a char.
pub(crate) fn head(text: &str, at: usize) -> &str {
    text.get(..at).unwrap_or_default()
}

/// The bytes `from..to` of `text`, or nothing when the range is not valid.
pub(crate) fn slice(text: &str, from: usize, to: usize) -> &str {
    text.get(from..to).unwrap_or_default()
}
