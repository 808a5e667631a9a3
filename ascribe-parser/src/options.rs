use std::sync::Arc;

use ascribe_core::{Doctype, SafeMode};

use crate::{
    attributes::{AttributeMissing, AttributeUndefined, AttributeValue},
    inline::InlineConverter,
    reader::IncludeResolver,
};

/// Grammar leniency switches, fixed for the duration of one parse.
///
/// Every field defaults to the permissive, widely used behavior. The value is threaded
/// through the reader, lexer and substitutor, so concurrent parses may use different
/// settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct Compliance {
    /// A line that starts a block (delimiter, list marker, attribute line, ...) ends an
    /// open paragraph even without a blank line in between.
    pub block_terminates_paragraph: bool,
    /// A paragraph styled `[source]`, `[listing]` or `[literal]` becomes a verbatim block.
    pub strict_verbatim_paragraphs: bool,
    /// Recognize two-line section titles (text followed by an underline).
    pub underline_style_section_titles: bool,
    /// Default policy for references to undefined attributes.
    pub attribute_missing: AttributeMissing,
    /// Default policy for `{set:name!}` directives.
    pub attribute_undefined: AttributeUndefined,
    /// Accept Markdown-style headings (`#`), fenced code (```` ``` ````) and
    /// thematic breaks (`---`, `***`).
    pub markdown_syntax: bool,
}

impl Default for Compliance {
    fn default() -> Self {
        Self {
            block_terminates_paragraph: true,
            strict_verbatim_paragraphs: true,
            underline_style_section_titles: true,
            attribute_missing: AttributeMissing::Skip,
            attribute_undefined: AttributeUndefined::DropLine,
            markdown_syntax: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct Options {
    pub safe_mode: SafeMode,
    pub doctype: Doctype,
    /// Initial attributes, in order. Locked unless the name ends with `@`.
    pub attributes: Vec<(String, AttributeValue)>,
    pub compliance: Compliance,
    /// Strict mode - fail on the first recoverable error instead of warn-and-continue.
    pub strict: bool,
    /// Where include directives fetch their lines from. Without a resolver every
    /// include is reported and dropped.
    pub include_resolver: Option<Arc<dyn IncludeResolver>>,
    /// Produces the markup for inline nodes. Defaults to HTML5.
    pub inline_converter: Option<Arc<dyn InlineConverter>>,
    /// Name of the primary source, used for locations and the `docfile`/`docname`
    /// attributes.
    pub source_name: Option<String>,
}

impl Options {
    /// Create a new `OptionsBuilder` for fluent configuration.
    ///
    /// # Example
    ///
    /// ```
    /// use ascribe_parser::Options;
    /// use ascribe_core::SafeMode;
    ///
    /// let options = Options::builder()
    ///     .with_safe_mode(SafeMode::Safe)
    ///     .with_attribute("toc", "left")
    ///     .build();
    /// ```
    #[must_use]
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }

    /// Create a new `Options` with default settings.
    ///
    /// Equivalent to `Options::default()`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Builder for `Options`.
///
/// # Example
///
/// ```
/// use ascribe_parser::Options;
/// use ascribe_core::{Doctype, SafeMode};
///
/// let options = Options::builder()
///     .with_safe_mode(SafeMode::Server)
///     .with_doctype(Doctype::Book)
///     .with_attribute("sectnums", true)
///     .with_attributes_str("icons=font source-highlighter@=rouge")
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    /// Set the safe mode for parsing.
    #[must_use]
    pub fn with_safe_mode(mut self, safe_mode: SafeMode) -> Self {
        self.options.safe_mode = safe_mode;
        self
    }

    #[must_use]
    pub fn with_doctype(mut self, doctype: Doctype) -> Self {
        self.options.doctype = doctype;
        self
    }

    /// Add an initial attribute.
    ///
    /// The attribute is locked: the document cannot reassign it. A trailing `@` on the
    /// name (`"toc@"`) makes it soft instead. A trailing `!` on the name, or a `false`
    /// value, unsets the attribute and locks it unset.
    ///
    /// ```
    /// use ascribe_parser::Options;
    ///
    /// let options = Options::builder()
    ///     .with_attribute("toc", "left")
    ///     .with_attribute("sectnums", true)
    ///     .with_attribute("icons@", "font")
    ///     .build();
    /// ```
    #[must_use]
    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.options.attributes.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_attributes<N, V>(mut self, attributes: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<AttributeValue>,
    {
        self.options.attributes.extend(
            attributes
                .into_iter()
                .map(|(name, value)| (name.into(), value.into())),
        );
        self
    }

    /// Add initial attributes from a space-separated `name=value` string.
    ///
    /// A backslash escapes a space inside a value. A bare `name` sets the attribute
    /// to the empty string; `name!` unsets it.
    ///
    /// ```
    /// use ascribe_parser::Options;
    ///
    /// let options = Options::builder()
    ///     .with_attributes_str(r"product=Ascribe\ Parser sectnums toc!")
    ///     .build();
    /// assert_eq!(options.attributes.len(), 3);
    /// ```
    #[must_use]
    pub fn with_attributes_str(mut self, attributes: &str) -> Self {
        for entry in split_escaped_spaces(attributes) {
            let (name, value) = match entry.split_once('=') {
                Some((name, value)) => (name.to_string(), AttributeValue::String(value.into())),
                None => (entry, AttributeValue::Bool(true)),
            };
            self.options.attributes.push((name, value));
        }
        self
    }

    #[must_use]
    pub fn with_compliance(mut self, compliance: Compliance) -> Self {
        self.options.compliance = compliance;
        self
    }

    /// Enable strict mode.
    ///
    /// When enabled, issues that would normally result in a warning and fallback
    /// behavior will instead cause parsing to fail.
    #[must_use]
    pub fn with_strict(mut self) -> Self {
        self.options.strict = true;
        self
    }

    #[must_use]
    pub fn with_include_resolver(mut self, resolver: Arc<dyn IncludeResolver>) -> Self {
        self.options.include_resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn with_inline_converter(mut self, converter: Arc<dyn InlineConverter>) -> Self {
        self.options.inline_converter = Some(converter);
        self
    }

    #[must_use]
    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.options.source_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn build(self) -> Options {
        self.options
    }
}

fn split_escaped_spaces(source: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&' ') => {
                current.push(' ');
                chars.next();
            }
            ' ' | '\t' => {
                if !current.is_empty() {
                    entries.push(std::mem::take(&mut current));
                }
            }
            other => current.push(other),
        }
    }
    if !current.is_empty() {
        entries.push(current);
    }
    entries
}
