//! Input generators for property-based testing.
#![allow(clippy::expect_used)]
use proptest::prelude::*;

/// Any string, including empty and control characters.
pub fn any_document_string() -> impl Strategy<Value = String> {
    prop::string::string_regex(".*").expect("Failed to create any string strategy")
}

/// Printable ASCII with newlines and tabs.
pub fn ascii_document() -> impl Strategy<Value = String> {
    prop::string::string_regex(r"[\x20-\x7E\n\t]*").expect("Failed to create ASCII string strategy")
}

/// Lines drawn from the markup's block and inline constructs, in any order and
/// frequently unbalanced: unterminated delimiters, stray `endif`s, list markers of
/// every family, table fragments.
pub fn line_soup() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just("= Title".to_string()),
            Just("== Section".to_string()),
            Just("==== Skipped level".to_string()),
            Just("Underlined".to_string()),
            Just("----------".to_string()),
            Just(String::new()),
            Just("----".to_string()),
            Just("====".to_string()),
            Just("****".to_string()),
            Just("____".to_string()),
            Just("--".to_string()),
            Just("++++".to_string()),
            Just("////".to_string()),
            Just("```".to_string()),
            Just("|===".to_string()),
            Just(",===".to_string()),
            Just("|a |b".to_string()),
            Just("2+|span .3+^.>a|cell".to_string()),
            Just("* item".to_string()),
            Just("** nested".to_string()),
            Just("- dash".to_string()),
            Just(". ordered".to_string()),
            Just("a. alpha".to_string()),
            Just("1. one".to_string()),
            Just("term:: definition".to_string()),
            Just("+".to_string()),
            Just("  indented literal".to_string()),
            Just("[source,rust]".to_string()),
            Just("[[anchor]]".to_string()),
            Just(".Block title".to_string()),
            Just(":name: value".to_string()),
            Just(":!name:".to_string()),
            Just("ifdef::name[]".to_string()),
            Just("ifeval::[{counter:n} > 1]".to_string()),
            Just("endif::[]".to_string()),
            Just("include::missing.adoc[]".to_string()),
            Just("NOTE: careful".to_string()),
            Just("image::photo.png[Alt]".to_string()),
            Just("'''".to_string()),
            Just("<<<".to_string()),
            Just("**bold _and italic_** {name} {undefined}".to_string()),
            Just("+++**raw**+++ pass:[<b>] `code` ^sup^ ~sub~".to_string()),
            Just("https://example.org[link] footnote:[note] <<anchor>>".to_string()),
            prop::string::string_regex(r"[a-zA-Z0-9 .,!?*_`#+<>&{}\[\]|:;-]{0,40}")
                .expect("Failed to create text line strategy"),
        ],
        0..40,
    )
    .prop_map(|lines| lines.join("\n"))
}

/// Text with markup-significant characters and character references mixed in.
pub fn entity_text() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just("&lt;".to_string()),
            Just("&amp;".to_string()),
            Just("&#169;".to_string()),
            Just("&#x2014;".to_string()),
            Just("&".to_string()),
            Just("<".to_string()),
            Just(">".to_string()),
            Just(";".to_string()),
            Just("#".to_string()),
            prop::string::string_regex(r"[a-z0-9 ]{0,8}").expect("Failed to create word strategy"),
        ],
        0..30,
    )
    .prop_map(|parts| parts.concat())
}

/// Multi-byte and zero-width characters.
pub fn unicode_stress_test() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just("\u{1F600}"),
            Just("\u{05D0}"),
            Just("\u{4E00}"),
            Just("e\u{0301}"),
            Just("\u{200B}"),
            Just("\u{FEFF}"),
            Just("*"),
            Just("_"),
            Just(" "),
            Just("\n"),
            Just("|"),
        ],
        0..60,
    )
    .prop_map(|parts| parts.concat())
}
