//! Parser invariants checked with property-based testing.
//!
//! - P0: the parse is total and never panics
//! - P1: structural invariants (locations, serialization)
//! - P2: behavioral invariants (escaping, safe mode)

use proptest::prelude::*;

use crate::{
    Document, Options, SafeMode, parse, parse_with_diagnostics,
    substitution::escape_special_chars,
};

use super::generators::*;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 500,
        max_shrink_iters: 10000,
        .. ProptestConfig::default()
    })]

    // ====================================================================
    // P0: CRITICAL INVARIANTS
    // ====================================================================

    /// Outside strict mode, any text parses to a document.
    #[test]
    fn parse_is_total(input in any_document_string()) {
        prop_assert!(parse(input.as_str(), &Options::default()).is_ok());
    }

    /// Unbalanced constructs are recovered from, never fatal.
    #[test]
    fn parse_is_total_on_line_soup(input in line_soup()) {
        prop_assert!(parse(input.as_str(), &Options::default()).is_ok());
    }

    /// The same holds with the permissive switches turned off.
    #[test]
    fn parse_is_total_with_strict_compliance(input in line_soup()) {
        let mut options = Options::default();
        options.compliance.block_terminates_paragraph = false;
        options.compliance.markdown_syntax = false;
        options.compliance.underline_style_section_titles = false;
        prop_assert!(parse(input.as_str(), &options).is_ok());
    }

    #[test]
    fn multibyte_input_does_not_split_chars(input in unicode_stress_test()) {
        prop_assert!(parse(input.as_str(), &Options::default()).is_ok());
    }

    // ====================================================================
    // P1: STRUCTURAL INVARIANTS
    // ====================================================================

    /// Every node points at a line of the source.
    #[test]
    fn locations_are_within_the_source(input in ascii_document()) {
        let document = parsed(&input, &Options::default())?;
        let line_count = input.lines().count().max(1);
        verify_locations(&document, line_count)?;
    }

    /// The tree always serializes.
    #[test]
    fn document_serializes(input in line_soup()) {
        let document = parsed(&input, &Options::default())?;
        prop_assert!(document.to_json().is_ok());
    }

    // ====================================================================
    // P2: BEHAVIORAL INVARIANTS
    // ====================================================================

    /// Escaping escaped text changes nothing.
    #[test]
    fn special_chars_escaping_is_idempotent(input in entity_text()) {
        let once = escape_special_chars(&input);
        prop_assert_eq!(escape_special_chars(&once), once.clone());
        prop_assert!(!once.contains('<') && !once.contains('>'));
    }

    /// Without a resolver, includes never pull in content, whatever the safe mode.
    #[test]
    fn includes_without_resolver_are_dropped(
        target in "[a-z]{1,8}\\.adoc",
        safe_mode in prop_oneof![
            Just(SafeMode::Unsafe),
            Just(SafeMode::Safe),
            Just(SafeMode::Server),
            Just(SafeMode::Secure),
        ],
    ) {
        let options = Options::builder().with_safe_mode(safe_mode).build();
        let parsed = parse_with_diagnostics(format!("include::{target}[]"), &options)
            .map_err(|error| TestCaseError::fail(error.to_string()))?;
        let text = parsed.document.to_json().unwrap_or_default();
        prop_assert!(!text.contains("include::"));
    }
}

fn parsed(input: &str, options: &Options) -> Result<Document, TestCaseError> {
    parse(input, options).map_err(|error| TestCaseError::fail(error.to_string()))
}

fn verify_locations(document: &Document, line_count: usize) -> Result<(), TestCaseError> {
    let mut outside = None;
    document.walk(|node, _| {
        let line = node.location().line;
        if outside.is_none() && !(1..=line_count).contains(&line) {
            outside = Some((node.context(), line));
        }
    });
    prop_assert_eq!(outside, None, "source has {} lines", line_count);
    Ok(())
}
