use std::{path::PathBuf, sync::Arc};

use ascribe_parser::{
    CellContent, Context, DiagnosticKind, Document, ListKind, MemoryResolver, Node, Options,
    OrderedStyle, SafeMode, Severity, parse, parse_with_diagnostics,
};
use pretty_assertions::assert_eq;

type Error = Box<dyn std::error::Error>;

fn block_text(node: Option<&Node>) -> Option<&str> {
    if let Some(Node::Block(block)) = node {
        block.text()
    } else {
        None
    }
}

fn first_text(document: &Document) -> Option<&str> {
    block_text(document.children.first())
}

fn with_resolver(resolver: MemoryResolver, safe_mode: SafeMode) -> Options {
    Options::builder()
        .with_safe_mode(safe_mode)
        .with_include_resolver(Arc::new(resolver))
        .build()
}

#[rstest::rstest]
#[tracing_test::traced_test]
fn test_fixtures_parse_cleanly(#[files("tests/fixtures/*.adoc")] path: PathBuf) -> Result<(), Error> {
    let source = std::fs::read_to_string(&path)?;
    let options = Options::builder().with_strict().build();
    let parsed = parse_with_diagnostics(source, &options)?;
    assert!(!parsed.document.children.is_empty(), "{}", path.display());
    let json = parsed.document.to_json()?;
    let value: serde_json::Value = serde_json::from_str(&json)?;
    assert!(value.is_object());
    Ok(())
}

#[test]
fn test_document_header_and_body() -> Result<(), Error> {
    let source = "= User Guide\nKismet Chameleon <kismet@example.com>\nv2.0, 2025-01-15\n:toc:\n\n== Install\n\nRun the *installer*.";
    let document = parse(source, &Options::default())?;
    assert_eq!(document.title(), Some("User Guide"));
    let header = document.header.as_ref().ok_or("expected a header")?;
    assert_eq!(
        header.authors.first().and_then(|author| author.email.as_deref()),
        Some("kismet@example.com")
    );
    assert_eq!(document.attributes.get("revnumber"), Some("2.0"));
    assert!(document.attributes.contains("toc"));

    let Some(Node::Section(section)) = document.children.first() else {
        return Err("expected a section".into());
    };
    assert_eq!(section.title, "Install");
    assert_eq!(section.id(), Some("_install"));
    assert_eq!(
        block_text(section.children.first()),
        Some("Run the <strong>installer</strong>.")
    );
    assert!(document.find_by_id("_install").is_some());
    Ok(())
}

#[test]
fn test_closing_delimiter_must_match_length() -> Result<(), Error> {
    let parsed = parse_with_diagnostics("----\ncode\n-----\nmore\n----", &Options::default())?;
    let Some(Node::Block(listing)) = parsed.document.children.first() else {
        return Err("expected a listing block".into());
    };
    assert_eq!(listing.context, Context::Listing);
    assert_eq!(listing.text(), Some("code\n-----\nmore"));
    assert!(parsed.diagnostics.is_empty());
    Ok(())
}

#[test]
fn test_unterminated_block_is_recovered() -> Result<(), Error> {
    let parsed = parse_with_diagnostics("====\nnever closed", &Options::default())?;
    assert_eq!(parsed.document.children.len(), 1);
    let diagnostic = parsed.diagnostics.first().ok_or("expected a diagnostic")?;
    assert_eq!(diagnostic.severity, Severity::Error);
    assert_eq!(diagnostic.kind, DiagnosticKind::Structural);
    assert_eq!(diagnostic.message, "unterminated example block");
    Ok(())
}

#[rstest::rstest]
#[case("**bold _and italic_**", "<strong>bold <em>and italic</em></strong>")]
#[case("+++**not bold**+++", "**not bold**")]
#[case("&lt; stays &amp; <b> escapes", "&lt; stays &amp; &lt;b&gt; escapes")]
#[case("Hello {nope} world", "Hello  world")]
#[case("a `literal *x*` here", "a <code>literal *x*</code> here")]
fn test_paragraph_substitutions(#[case] source: &str, #[case] expected: &str) -> Result<(), Error> {
    let document = parse(source, &Options::default())?;
    assert_eq!(first_text(&document), Some(expected));
    Ok(())
}

#[test]
fn test_attribute_missing_drop_line() -> Result<(), Error> {
    let source = ":attribute-missing: drop-line\n\nfirst\nHello {nope}\nlast";
    let document = parse(source, &Options::default())?;
    assert_eq!(first_text(&document), Some("first\nlast"));
    Ok(())
}

#[test]
fn test_attribute_references_use_document_values() -> Result<(), Error> {
    let options = Options::builder().with_attribute("product", "Widget").build();
    let document = parse(":version: 1.2\n\n{product} {version}", &options)?;
    assert_eq!(first_text(&document), Some("Widget 1.2"));
    Ok(())
}

#[test]
fn test_marker_change_nests_a_list() -> Result<(), Error> {
    let document = parse("* a\n* b\n- c", &Options::default())?;
    assert_eq!(document.children.len(), 1);
    let Some(Node::List(outer)) = document.children.first() else {
        return Err("expected a list".into());
    };
    assert_eq!(outer.kind, ListKind::Unordered);
    let texts: Vec<_> = outer.items.iter().filter_map(|item| item.text.as_deref()).collect();
    assert_eq!(texts, vec!["a", "b"]);
    let Some(Node::List(nested)) = outer.items.get(1).and_then(|item| item.blocks.first()) else {
        return Err("expected a nested list".into());
    };
    assert_eq!(nested.marker, "-");
    Ok(())
}

#[test]
fn test_first_ordered_style_wins() -> Result<(), Error> {
    let document = parse("a. alpha\n1. one", &Options::default())?;
    let Some(Node::List(outer)) = document.children.first() else {
        return Err("expected a list".into());
    };
    assert_eq!(
        outer.kind,
        ListKind::Ordered {
            style: OrderedStyle::LowerAlpha,
            start: None
        }
    );
    assert_eq!(outer.items.len(), 1);
    let Some(Node::List(nested)) = outer.items.first().and_then(|item| item.blocks.first()) else {
        return Err("expected a nested list".into());
    };
    assert!(matches!(
        nested.kind,
        ListKind::Ordered {
            style: OrderedStyle::Arabic,
            ..
        }
    ));
    Ok(())
}

#[test]
fn test_one_letter_cells_stay_text() -> Result<(), Error> {
    let document = parse("|===\n|a|b\n|===", &Options::default())?;
    let Some(Node::Table(table)) = document.children.first() else {
        return Err("expected a table".into());
    };
    let sources: Vec<_> = table.rows().flatten().map(|cell| cell.source.as_str()).collect();
    assert_eq!(sources, vec!["a", "b"]);
    assert!(table.rows().flatten().all(|cell| matches!(cell.content, CellContent::Paragraphs(_))));
    Ok(())
}

#[test]
fn test_huge_spans_do_not_exhaust_memory() -> Result<(), Error> {
    let document = parse("|===\n18446744073709551615+|a\n|===", &Options::default())?;
    assert!(matches!(document.children.first(), Some(Node::Table(_))));
    Ok(())
}

#[test]
fn test_table_with_implicit_header() -> Result<(), Error> {
    let document = parse("|===\n|Name |Value\n\n|a |1\n|b |2\n|===", &Options::default())?;
    let Some(Node::Table(table)) = document.children.first() else {
        return Err("expected a table".into());
    };
    assert_eq!(table.columns.len(), 2);
    assert_eq!(table.head.len(), 1);
    assert_eq!(table.body.len(), 2);
    let sources: Vec<_> = table.rows().flatten().map(|cell| cell.source.as_str()).collect();
    assert_eq!(sources, vec!["Name", "Value", "a", "1", "b", "2"]);
    assert!(table.rows().flatten().all(|cell| matches!(cell.content, CellContent::Paragraphs(_))));
    Ok(())
}

#[rstest::rstest]
#[case("ifdef::flag[]\nshown\nendif::[]\nifndef::flag[]\nhidden\nendif::[]", "shown")]
#[case("ifndef::other[]\nshown\nendif::[]", "shown")]
#[case("ifdef::flag[shown inline]", "shown inline")]
#[case("ifeval::[{level} > 1]\nshown\nendif::[]\nifeval::[{level} > 5]\nhidden\nendif::[]", "shown")]
fn test_conditionals(#[case] source: &str, #[case] expected: &str) -> Result<(), Error> {
    let options = Options::builder()
        .with_attribute("flag", "")
        .with_attribute("level", "2")
        .build();
    let document = parse(source, &options)?;
    assert_eq!(document.children.len(), 1);
    assert_eq!(first_text(&document), Some(expected));
    Ok(())
}

#[test]
fn test_includes_splice_resolved_lines() -> Result<(), Error> {
    let resolver = MemoryResolver::new().with_file("chapter.adoc", "== Chapter\n\nIncluded *text*.");
    let options = with_resolver(resolver, SafeMode::Safe);
    let document = parse("Intro.\n\ninclude::chapter.adoc[]", &options)?;
    assert_eq!(first_text(&document), Some("Intro."));
    let Some(Node::Section(section)) = document.children.get(1) else {
        return Err("expected the included section".into());
    };
    assert_eq!(section.title, "Chapter");
    assert_eq!(section.location.file.as_deref(), Some("chapter.adoc"));
    assert_eq!(
        block_text(section.children.first()),
        Some("Included <strong>text</strong>.")
    );
    Ok(())
}

#[test]
fn test_include_tag_selection() -> Result<(), Error> {
    let resolver = MemoryResolver::new().with_file(
        "sample.adoc",
        "skipped\n// tag::keep[]\nkept line\n// end::keep[]\nskipped too",
    );
    let options = with_resolver(resolver, SafeMode::Server);
    let document = parse("include::sample.adoc[tag=keep]", &options)?;
    assert_eq!(first_text(&document), Some("kept line"));
    Ok(())
}

#[test]
fn test_secure_mode_turns_includes_into_links() -> Result<(), Error> {
    let resolver = MemoryResolver::new().with_file("chapter.adoc", "secret");
    let parsed = parse_with_diagnostics(
        "include::chapter.adoc[]",
        &with_resolver(resolver, SafeMode::Secure),
    )?;
    let text = block_text(parsed.document.children.first()).ok_or("expected a paragraph")?;
    assert!(text.contains("href=\"chapter.adoc\""), "{text}");
    assert!(!text.contains("secret"));
    assert!(
        parsed
            .diagnostics
            .iter()
            .any(|diagnostic| diagnostic.kind == DiagnosticKind::Security)
    );
    Ok(())
}

#[test]
fn test_include_outside_the_jail_is_fatal() {
    let options = with_resolver(MemoryResolver::new(), SafeMode::Safe);
    let result = parse("a\ninclude::../etc/passwd[]\nb", &options);
    assert!(matches!(result, Err(ascribe_parser::Error::Security(..))));
}

#[test]
fn test_strict_mode_promotes_the_first_error() {
    let options = Options::builder().with_strict().build();
    let result = parse("----\nnever closed", &options);
    assert!(matches!(result, Err(ascribe_parser::Error::UnterminatedBlock(..))));
}
