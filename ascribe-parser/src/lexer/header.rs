use std::sync::LazyLock;

use ascribe_core::Doctype;
use regex::Regex;

use super::{
    AttributeEntry, Lexer, Scope,
    delimited::{DelimitedKind, Delimiter},
    metadata::is_line_comment,
};
use crate::{
    diagnostic::{Diagnostic, DiagnosticKind},
    model::{Author, Header, Revision},
    pattern::compile,
    substitution::NORMAL,
};

/// `name(volume)`
static MANPAGE_TITLE: LazyLock<Regex> = LazyLock::new(|| compile(r"^(\S.*?)[ \t]*\((\S+?)\)$"));

/// `name - purpose`
static MANPAGE_NAME_PURPOSE: LazyLock<Regex> = LazyLock::new(|| compile(r"^(.+?)[ \t]+-[ \t]+(.+)$"));

peg::parser! {
    grammar header_parser() for str {
        /// Authors separated by `;`, each `First [Middle] [Last] [<email>]`.
        pub(crate) rule authors() -> Vec<Author>
            = blank()* authors:(author() ++ (";" blank()*)) blank()* ";"? blank()* { authors }

        rule author() -> Author
            = names:(name() ++ (blank()+)) email:email()? blank()* { build_author(&names, email) }

        rule name() -> &'input str
            = n:$([^ ' ' | '\t' | '<' | '>' | ';']+) { n }

        rule email() -> &'input str
            = blank()* "<" e:$([^ '>']*) ">" { e }

        /// `[v]number, date: remark`; every part is optional.
        pub(crate) rule revision() -> (Option<&'input str>, &'input str, Option<&'input str>)
            = number:number()? blank()* component:$((!(blank()* ":") [_])*) remark:remark()? {
                (number, component.trim(), remark)
            }

        rule number() -> &'input str
            = [^ '0'..='9' | ',']* n:$(['0'..='9'] [^ ',']*) "," { n.trim_end() }

        rule remark() -> &'input str
            = blank()* ":" blank()* r:$([_]*) { r.trim_end() }

        rule blank() = quiet!{[' ' | '\t']}
    }
}

fn build_author(names: &[&str], email: Option<&str>) -> Author {
    let name = |part: &str| part.replace('_', " ");
    let mut parts = names.iter().copied();
    let firstname = parts.next().map(name).unwrap_or_default();
    let rest: Vec<&str> = parts.collect();
    let (middlename, lastname) = match rest.as_slice() {
        [] => (None, None),
        [last] => (None, Some(name(last))),
        [middle, last @ ..] => (Some(name(middle)), Some(name(&last.join(" ")))),
    };
    let initials = [Some(&firstname), middlename.as_ref(), lastname.as_ref()]
        .into_iter()
        .flatten()
        .filter_map(|part| part.chars().next())
        .collect();
    Author {
        firstname,
        middlename,
        lastname,
        initials,
        email: email.map(str::to_string),
    }
}

/// Parse an author line. A line the grammar rejects names a single author.
fn parse_authors(line: &str) -> Vec<Author> {
    match header_parser::authors(line) {
        Ok(authors) => authors,
        Err(error) => {
            tracing::trace!(?error, %line, "author line kept as a single name");
            vec![Author {
                firstname: line.trim().to_string(),
                initials: line.trim().chars().next().map(String::from).unwrap_or_default(),
                ..Author::default()
            }]
        }
    }
}

fn parse_revision(line: &str) -> Option<Revision> {
    let (number, component, remark) = header_parser::revision(line).ok()?;
    let mut revision = Revision {
        number: number.map(str::to_string),
        remark: remark.filter(|remark| !remark.is_empty()).map(str::to_string),
        ..Revision::default()
    };
    if !component.is_empty() {
        match component.strip_prefix('v') {
            Some(version) if number.is_none() => revision.number = Some(version.to_string()),
            Some(_) | None => revision.date = Some(component.to_string()),
        }
    }
    (revision != Revision::default()).then_some(revision)
}

impl Lexer<'_, '_> {
    /// Parse the document header: the attribute entries and comments ahead of the
    /// title, the title, the author and revision lines and the header's own attribute
    /// entries. Entries read here lock the names they assign.
    ///
    /// Returns `None` when the document has no title.
    #[tracing::instrument(level = "trace", skip(self))]
    pub(super) fn parse_header(&mut self) -> Option<Header> {
        if self.state.doctype() == Doctype::Inline {
            return None;
        }
        self.skip_header_lines(false);
        let title = self.peek_section_title().filter(|title| title.level == 0)?;
        let location = self.location();
        for _ in 0..title.lines {
            self.reader.read_line(self.state);
        }
        let rendered = self.state.substitute(&title.text, NORMAL);
        self.state.attributes.assign("doctitle", Some(rendered.clone()));
        let mut header = Header {
            title: Some(rendered),
            location,
            ..Header::default()
        };

        if let Some(line) = self.header_line() {
            let resolved = self.state.attributes.resolve(&line);
            self.state.collect_attribute_diagnostics();
            header.authors = parse_authors(&resolved);
            self.set_author_attributes(&header.authors);
            if let Some(line) = self.header_line() {
                header.revision = parse_revision(&line);
                if let Some(revision) = &header.revision {
                    self.set_revision_attributes(revision);
                }
            }
        }
        self.skip_header_lines(true);

        if self.state.doctype() == Doctype::Manpage {
            self.parse_manpage_header(&title.text);
        }
        tracing::trace!(title = ?header.title, authors = header.authors.len(), "header parsed");
        Some(header)
    }

    /// Consume comments and attribute entries. Ahead of the title blank lines are
    /// skipped too; below it a blank line ends the header.
    fn skip_header_lines(&mut self, below_title: bool) {
        loop {
            if !below_title {
                self.reader.skip_blank_lines(self.state);
            }
            let Some(text) = self.reader.peek_text(self.state) else {
                return;
            };
            if text.trim().is_empty() {
                return;
            }
            if let Some(delimiter) = Delimiter::detect(&text, false)
                && delimiter.kind == DelimitedKind::Comment
            {
                self.skip_comment_block(&delimiter.close);
            } else if is_line_comment(&text) {
                self.reader.read_line(self.state);
            } else if let Some(entry) = AttributeEntry::parse(&text) {
                self.read_attribute_entry(entry, true);
            } else {
                return;
            }
        }
    }

    /// The next line of the header block when it is neither blank, a comment nor an
    /// attribute entry.
    fn header_line(&mut self) -> Option<String> {
        let text = self.reader.peek_text(self.state)?;
        if text.trim().is_empty() || is_line_comment(&text) || AttributeEntry::parse(&text).is_some() {
            return None;
        }
        self.reader.read_line(self.state).map(|line| line.text)
    }

    /// Set an attribute derived from the header lines unless an attribute entry already
    /// did.
    fn set_header_attribute(&mut self, name: &str, value: &str) {
        if self.state.attributes.contains(name) {
            tracing::warn!(%name, "found in the header lines but ignored, already set through an attribute entry");
            return;
        }
        self.state.attributes.set(name, value, false);
    }

    fn set_author_attributes(&mut self, authors: &[Author]) {
        for (index, author) in authors.iter().enumerate() {
            let name = author.name();
            let mut fields = vec![
                ("author", name.as_str()),
                ("firstname", author.firstname.as_str()),
                ("authorinitials", author.initials.as_str()),
            ];
            if let Some(middlename) = &author.middlename {
                fields.push(("middlename", middlename));
            }
            if let Some(lastname) = &author.lastname {
                fields.push(("lastname", lastname));
            }
            if let Some(email) = &author.email {
                fields.push(("email", email));
            }
            for (field, value) in fields {
                if index == 0 {
                    self.set_header_attribute(field, value);
                }
                self.set_header_attribute(&format!("{field}_{}", index + 1), value);
            }
        }
        let names: Vec<String> = authors.iter().map(Author::name).collect();
        self.set_header_attribute("authors", &names.join(", "));
        self.set_header_attribute("authorcount", &authors.len().to_string());
    }

    fn set_revision_attributes(&mut self, revision: &Revision) {
        let fields = [
            ("revnumber", &revision.number),
            ("revdate", &revision.date),
            ("revremark", &revision.remark),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                self.set_header_attribute(name, value);
            }
        }
    }

    /// A manpage title reads `name(volume)` and the first section is `NAME`, holding
    /// `name - purpose`. Both are turned into attributes and the section is consumed.
    fn parse_manpage_header(&mut self, title: &str) {
        let location = self.location();
        match MANPAGE_TITLE.captures(title) {
            Some(captures) => {
                let name = captures.get(1).map_or("", |m| m.as_str()).to_lowercase();
                let volume = captures.get(2).map_or("", |m| m.as_str());
                self.state.attributes.set("mantitle", name, false);
                self.state.attributes.set("manvolnum", volume, false);
            }
            None => {
                self.state.report(
                    Diagnostic::error(
                        DiagnosticKind::Structural,
                        "non-conforming manpage title",
                    )
                    .at(location.clone()),
                );
                self.state.attributes.set("mantitle", title, false);
                self.state.attributes.set("manvolnum", "1", false);
            }
        }

        self.reader.skip_blank_lines(self.state);
        let name_section = self
            .peek_section_title()
            .filter(|section| self.effective_level(section.level) == 1);
        let Some(section) = name_section else {
            self.state.report(
                Diagnostic::error(
                    DiagnosticKind::Structural,
                    "non-conforming manpage: name section expected",
                )
                .at(location),
            );
            return;
        };
        for _ in 0..section.lines {
            self.reader.read_line(self.state);
        }
        self.reader.skip_blank_lines(self.state);
        let lines = self.read_paragraph_lines(Scope::Section, false);
        let text = lines
            .iter()
            .map(|line| line.text.trim())
            .collect::<Vec<_>>()
            .join(" ");
        match MANPAGE_NAME_PURPOSE.captures(&text) {
            Some(captures) => {
                let name = captures.get(1).map_or("", |m| m.as_str());
                let name = self.state.attributes.resolve(name);
                let purpose = captures.get(2).map_or("", |m| m.as_str());
                let purpose = self.state.substitute(purpose, NORMAL);
                self.state.attributes.set("manname", name, false);
                self.state.attributes.set("manpurpose", purpose, false);
            }
            None => self.state.report(
                Diagnostic::error(
                    DiagnosticKind::Structural,
                    "non-conforming manpage: name section must read `name - purpose`",
                )
                .at(location),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::{Options, lexer::tests::lex, model::Node};

    #[rstest]
    #[case("Kismet R. Lee <kismet@example.com>", "Kismet", Some("R."), Some("Lee"), "KRL", Some("kismet@example.com"))]
    #[case("Mary_Sue Brontë", "Mary Sue", None, Some("Brontë"), "MB", None)]
    #[case("Ada", "Ada", None, None, "A", None)]
    #[case("Jan van der Berg", "Jan", Some("van"), Some("der Berg"), "Jvd", None)]
    fn test_author(
        #[case] line: &str,
        #[case] firstname: &str,
        #[case] middlename: Option<&str>,
        #[case] lastname: Option<&str>,
        #[case] initials: &str,
        #[case] email: Option<&str>,
    ) {
        let authors = parse_authors(line);
        assert_eq!(
            authors,
            vec![Author {
                firstname: firstname.to_string(),
                middlename: middlename.map(str::to_string),
                lastname: lastname.map(str::to_string),
                initials: initials.to_string(),
                email: email.map(str::to_string),
            }]
        );
    }

    #[test]
    fn test_multiple_authors() {
        let authors = parse_authors("Doc Writer <doc@example.com>; Junior Writer");
        let names: Vec<String> = authors.iter().map(Author::name).collect();
        assert_eq!(names, vec!["Doc Writer", "Junior Writer"]);
    }

    #[rstest]
    #[case("v1.0, 2024-10-01: First draft", Some("1.0"), Some("2024-10-01"), Some("First draft"))]
    #[case("2.3, October 2024", Some("2.3"), Some("October 2024"), None)]
    #[case("v7.1", Some("7.1"), None, None)]
    #[case("2024-10-01", None, Some("2024-10-01"), None)]
    #[case("2024-10-01: Just a remark", None, Some("2024-10-01"), Some("Just a remark"))]
    fn test_revision(
        #[case] line: &str,
        #[case] number: Option<&str>,
        #[case] date: Option<&str>,
        #[case] remark: Option<&str>,
    ) {
        assert_eq!(
            parse_revision(line),
            Some(Revision {
                number: number.map(str::to_string),
                date: date.map(str::to_string),
                remark: remark.map(str::to_string),
            })
        );
    }

    #[test]
    fn test_header_sets_attributes() {
        let options = Options::default();
        let source = "// leading comment\n:product: Widget\n= The {product} Guide\nDoc Writer <doc@example.com>\nv1.2, 2024-05-01\n:toc:\n\nBody text.";
        let (header, children, state) = lex(source, &options);
        let header = header.unwrap_or_default();
        assert_eq!(header.title.as_deref(), Some("The Widget Guide"));
        let attributes = &state.attributes;
        assert_eq!(attributes.get("doctitle"), Some("The Widget Guide"));
        assert_eq!(attributes.get("author"), Some("Doc Writer"));
        assert_eq!(attributes.get("author_1"), Some("Doc Writer"));
        assert_eq!(attributes.get("authorinitials"), Some("DW"));
        assert_eq!(attributes.get("email"), Some("doc@example.com"));
        assert_eq!(attributes.get("authorcount"), Some("1"));
        assert_eq!(attributes.get("revnumber"), Some("1.2"));
        assert_eq!(attributes.get("revdate"), Some("2024-05-01"));
        assert!(attributes.is_locked("toc"));
        assert!(attributes.is_locked("product"));
        assert_eq!(children.len(), 1);
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_attribute_entries_and_header_lines() {
        let options = Options::default();
        let source = "= Title\nAuthor Name\n:author: Someone Else\n\ntext";
        let (_, _, state) = lex(source, &options);
        assert_eq!(state.attributes.get("author"), Some("Someone Else"));
        assert_eq!(state.attributes.get("firstname"), Some("Author"));

        let source = ":revnumber: 9.9\n= Title\nAuthor Name\nv1.0\n\ntext";
        let (header, _, state) = lex(source, &options);
        assert_eq!(state.attributes.get("revnumber"), Some("9.9"));
        assert_eq!(
            header.and_then(|header| header.revision).and_then(|revision| revision.number),
            Some("1.0".to_string())
        );
        assert!(logs_contain("already set through an attribute entry"));
    }

    #[test]
    fn test_no_title_means_no_header() {
        let options = Options::default();
        let (header, children, state) = lex(":lang: en\n\nJust text.", &options);
        assert_eq!(header, None);
        assert_eq!(children.len(), 1);
        assert!(state.attributes.is_locked("lang"));
    }

    #[test]
    fn test_setext_document_title() {
        let options = Options::default();
        let (header, _, _) = lex("Document Title\n==============\n\ntext", &options);
        assert_eq!(header.and_then(|header| header.title).as_deref(), Some("Document Title"));
    }

    #[test]
    fn test_manpage_header() {
        let options = Options::builder().with_doctype(Doctype::Manpage).build();
        let source = "= GIT-COMMIT(1)\n\n== NAME\n\ngit-commit - Record *changes*\n\n== SYNOPSIS\n\ngit commit";
        let (_, children, state) = lex(source, &options);
        let attributes = &state.attributes;
        assert_eq!(attributes.get("mantitle"), Some("git-commit"));
        assert_eq!(attributes.get("manvolnum"), Some("1"));
        assert_eq!(attributes.get("manname"), Some("git-commit"));
        assert_eq!(attributes.get("manpurpose"), Some("Record <strong>changes</strong>"));
        let titles: Vec<&str> = children
            .iter()
            .filter_map(|node| match node {
                Node::Section(section) => Some(section.title.as_str()),
                Node::Block(_) | Node::List(_) | Node::Table(_) => None,
            })
            .collect();
        assert_eq!(titles, vec!["SYNOPSIS"]);
        assert_eq!(state.diagnostics.len(), 0);
    }

    #[test]
    fn test_manpage_without_name_section() {
        let options = Options::builder().with_doctype(Doctype::Manpage).build();
        let (_, _, state) = lex("= tool(8)\n\nNo name section.", &options);
        assert_eq!(state.diagnostics.len(), 1);
        assert_eq!(state.attributes.get("mantitle"), Some("tool"));
    }
}
