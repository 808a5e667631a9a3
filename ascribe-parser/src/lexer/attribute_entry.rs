use std::sync::LazyLock;

use regex::Regex;

use crate::{
    constants::is_protected,
    diagnostic::{Diagnostic, DiagnosticKind},
    error::SourceLocation,
    pattern::compile,
    state::ParserState,
    substitution::{HEADER, resolve_subs},
};

/// A value wrapped in `pass:subs[...]` gets only the listed substitutions.
static PASS_VALUE: LazyLock<Regex> = LazyLock::new(|| compile(r"^pass:([a-z,]*)\[(.*)\]$"));

peg::parser! {
    grammar entry_parser() for str {
        pub(crate) rule attribute_entry() -> (&'input str, Option<&'input str>)
            = ":" unset() name:name() ":" blank()* { (name, None) }
            / ":" name:name() unset() ":" blank()* { (name, None) }
            / ":" name:name() ":" value:value()? { (name, Some(value.unwrap_or_default())) }

        rule unset()
            = "!"

        rule name() -> &'input str
            = n:$(['a'..='z' | 'A'..='Z' | '0'..='9' | '_'] ['a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_']*) { n }

        rule value() -> &'input str
            = blank()+ v:$([_]*) { v.trim_end() }

        rule blank() = quiet!{[' ' | '\t']}
    }
}

/// `:name: value`, `:name!:` or `:!name:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AttributeEntry {
    pub(crate) name: String,
    /// `None` unsets the attribute.
    pub(crate) value: Option<String>,
}

impl AttributeEntry {
    /// Parse one line. Lines that are not attribute entries yield `None`.
    #[tracing::instrument(level = "trace")]
    pub(crate) fn parse(line: &str) -> Option<Self> {
        if !line.starts_with(':') {
            return None;
        }
        match entry_parser::attribute_entry(line) {
            Ok((name, value)) => Some(Self {
                name: name.to_lowercase(),
                value: value.map(str::to_string),
            }),
            Err(error) => {
                tracing::trace!(?error, "not an attribute entry");
                None
            }
        }
    }

    /// The value without its trailing line continuation (` \` or ` +`), if it has one.
    pub(crate) fn continued_value(&self) -> Option<&str> {
        let value = self.value.as_deref()?;
        value
            .strip_suffix(" \\")
            .or_else(|| value.strip_suffix(" +"))
            .or_else(|| (value == "\\" || value == "+").then_some(""))
    }

    /// Join the next source line onto a continued value, collapsing the break to a
    /// single space.
    pub(crate) fn continue_with(&mut self, line: &str) {
        if let Some(value) = self.continued_value() {
            let value = value.trim_end();
            let joined = if value.is_empty() {
                line.trim().to_string()
            } else {
                format!("{value} {}", line.trim())
            };
            self.value = Some(joined);
        }
    }

    /// Apply the entry to the document attributes.
    ///
    /// Entries in the header lock the names they assign. Names protected by the safe
    /// mode are never assigned.
    pub(crate) fn apply(self, state: &mut ParserState, in_header: bool, location: &SourceLocation) {
        let safe_mode = state.safe_mode();
        if is_protected(&self.name, safe_mode) {
            state.report(
                Diagnostic::error(
                    DiagnosticKind::Security,
                    format!(
                        "attribute {} is protected at the {} safe mode",
                        self.name,
                        safe_mode.name()
                    ),
                )
                .at(location.clone()),
            );
            return;
        }
        let value = self
            .value
            .map(|value| substitute_value(state, &self.name, &value));
        if state.attributes.assign(&self.name, value) {
            tracing::trace!(name = %self.name, in_header, "attribute assigned");
            if in_header {
                state.attributes.lock(&self.name);
            }
        }
    }
}

fn substitute_value(state: &mut ParserState, name: &str, value: &str) -> String {
    let value = if let Some(captures) = PASS_VALUE.captures(value) {
        let spec = captures.get(1).map_or("", |m| m.as_str());
        let text = captures.get(2).map_or("", |m| m.as_str());
        let (subs, diagnostics) = resolve_subs(spec, &[]);
        for diagnostic in diagnostics {
            state.report(diagnostic);
        }
        state.substitute(text, &subs)
    } else {
        state.substitute(value, HEADER)
    };
    if name == "leveloffset" {
        return relative_level_offset(state, &value);
    }
    value
}

/// `+1` and `-1` shift the current offset; anything else is absolute.
fn relative_level_offset(state: &ParserState, value: &str) -> String {
    let delta = match value.strip_prefix('+') {
        Some(delta) => delta.parse::<i32>().ok(),
        None if value.starts_with('-') => value.parse::<i32>().ok(),
        None => return value.to_string(),
    };
    let Some(delta) = delta else {
        return value.to_string();
    };
    let current = state
        .attributes
        .get("leveloffset")
        .and_then(|offset| offset.parse::<i32>().ok())
        .unwrap_or_default();
    (current + delta).to_string()
}
