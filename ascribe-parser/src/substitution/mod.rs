//! The inline substitution passes.
//!
//! A block's text goes through up to six passes, always in this order whatever order
//! they were requested in:
//!
//! 1. special characters (`<`, `>`, `&`)
//! 2. quoted text
//! 3. attribute references
//! 4. typographic replacements
//! 5. macros
//! 6. post replacements (hard line breaks)
//!
//! When macros are enabled, passthroughs are pulled out of the text before the first
//! pass and put back, with their own substitutions, after the last one.
use std::{fmt, str::FromStr};

use serde::Serialize;

use crate::{
    diagnostic::{Diagnostic, DiagnosticKind},
    inline::Inline,
    state::ParserState,
};

mod macros;
mod passthrough;
mod quotes;
mod replacements;
mod specialchars;

pub(crate) use macros::default_alt;
pub(crate) use specialchars::escape_special_chars;

use passthrough::Passthroughs;

/// One substitution pass.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Substitution {
    #[serde(rename = "specialcharacters")]
    SpecialChars,
    Quotes,
    Attributes,
    Replacements,
    Macros,
    PostReplacements,
}

impl Substitution {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::SpecialChars => "specialcharacters",
            Self::Quotes => "quotes",
            Self::Attributes => "attributes",
            Self::Replacements => "replacements",
            Self::Macros => "macros",
            Self::PostReplacements => "post_replacements",
        }
    }
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Substitution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "specialcharacters" | "specialchars" | "c" => Self::SpecialChars,
            "quotes" | "q" => Self::Quotes,
            "attributes" | "a" => Self::Attributes,
            "replacements" | "r" => Self::Replacements,
            "macros" | "m" => Self::Macros,
            "post_replacements" | "p" => Self::PostReplacements,
            unknown => return Err(format!("unknown substitution: {unknown}")),
        })
    }
}

pub const NONE: &[Substitution] = &[];
pub const NORMAL: &[Substitution] = &[
    Substitution::SpecialChars,
    Substitution::Quotes,
    Substitution::Attributes,
    Substitution::Replacements,
    Substitution::Macros,
    Substitution::PostReplacements,
];
pub const VERBATIM: &[Substitution] = &[Substitution::SpecialChars];
pub const HEADER: &[Substitution] = &[Substitution::SpecialChars, Substitution::Attributes];

/// Expand a group name (`none`, `normal`, `verbatim`) or a single pass name.
fn expand(name: &str) -> Result<Vec<Substitution>, String> {
    match name {
        "none" => Ok(NONE.to_vec()),
        "normal" | "n" => Ok(NORMAL.to_vec()),
        "verbatim" | "v" => Ok(VERBATIM.to_vec()),
        name => name.parse().map(|sub| vec![sub]),
    }
}

/// Put `subs` in pass order and drop duplicates.
pub(crate) fn canonical(mut subs: Vec<Substitution>) -> Vec<Substitution> {
    subs.sort_unstable();
    subs.dedup();
    subs
}

/// Resolve a `subs` attribute value against the block's default passes.
///
/// A plain list (`quotes,macros`) replaces the defaults. Once the first entry is an
/// incremental one (`+quotes`, `quotes+`, `-specialchars`), every entry must be: the
/// defaults are modified and plain entries are rejected.
pub(crate) fn resolve_subs(
    spec: &str,
    defaults: &[Substitution],
) -> (Vec<Substitution>, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();
    let mut candidates: Vec<Substitution> = Vec::new();
    let mut incremental = None;

    for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (operation, key) = if let Some(key) = entry.strip_prefix('+') {
            (Some(Operation::Append), key)
        } else if let Some(key) = entry.strip_prefix('-') {
            (Some(Operation::Remove), key)
        } else if let Some(key) = entry.strip_suffix('+') {
            (Some(Operation::Prepend), key)
        } else {
            (None, entry)
        };
        match (incremental, operation) {
            (None, Some(_)) => {
                candidates = defaults.to_vec();
                incremental = Some(true);
            }
            (None, None) => incremental = Some(false),
            (Some(true), None) => {
                diagnostics.push(Diagnostic::warning(
                    DiagnosticKind::Structural,
                    format!("disallowed substitution operation {entry} in {spec}"),
                ));
                continue;
            }
            (Some(_), _) => {}
        }
        let resolved = match expand(key.trim()) {
            Ok(resolved) => resolved,
            Err(message) => {
                diagnostics.push(Diagnostic::warning(DiagnosticKind::Structural, message));
                continue;
            }
        };
        match operation {
            Some(Operation::Remove) => candidates.retain(|sub| !resolved.contains(sub)),
            Some(Operation::Append | Operation::Prepend) | None => candidates.extend(resolved),
        }
    }
    (canonical(candidates), diagnostics)
}

#[derive(Clone, Copy)]
enum Operation {
    Append,
    Prepend,
    Remove,
}

/// Applies substitution passes to text on behalf of one block.
pub(crate) struct Substitutor<'s, 'o> {
    state: &'s mut ParserState<'o>,
    hardbreaks: bool,
}

impl<'s, 'o> Substitutor<'s, 'o> {
    pub(crate) fn new(state: &'s mut ParserState<'o>) -> Self {
        let hardbreaks = state.attributes.contains("hardbreaks");
        Self { state, hardbreaks }
    }

    /// Break every line, as for a block with the `hardbreaks` option.
    pub(crate) fn with_hardbreaks(mut self, hardbreaks: bool) -> Self {
        self.hardbreaks = self.hardbreaks || hardbreaks;
        self
    }

    /// Run `subs` over `text`, in pass order.
    #[tracing::instrument(level = "trace", skip(self))]
    pub(crate) fn apply(&mut self, text: &str, subs: &[Substitution]) -> String {
        if subs.is_empty() || text.is_empty() {
            return text.to_string();
        }
        let subs = canonical(subs.to_vec());

        let mut passthroughs = Passthroughs::default();
        let mut text = if subs.contains(&Substitution::Macros) {
            passthroughs.extract(text, self.state)
        } else {
            text.to_string()
        };

        for sub in &subs {
            text = match sub {
                Substitution::SpecialChars => escape_special_chars(&text),
                Substitution::Quotes => quotes::substitute(&text, self.state.converter.as_ref()),
                Substitution::Attributes => {
                    let resolved = self.state.attributes.resolve(&text);
                    self.state.collect_attribute_diagnostics();
                    resolved
                }
                Substitution::Replacements => replacements::substitute(&text),
                Substitution::Macros => macros::substitute(&text, self.state, &mut passthroughs),
                Substitution::PostReplacements => self.post_replacements(&text),
            };
        }

        passthroughs.restore(&text, self.state)
    }

    fn post_replacements(&self, text: &str) -> String {
        let line_break = self.state.converter.convert(&Inline::LineBreak);
        if self.hardbreaks {
            let mut lines: Vec<&str> = text.split('\n').collect();
            let last = lines.pop().unwrap_or_default();
            let mut out: Vec<String> = lines
                .into_iter()
                .map(|line| {
                    let line = line.trim_end();
                    let line = line.strip_suffix(" +").unwrap_or(line);
                    format!("{line}{line_break}")
                })
                .collect();
            out.push(last.to_string());
            return out.join("\n");
        }
        if !text.contains('+') {
            return text.to_string();
        }
        text.split('\n')
            .map(|line| match line.strip_suffix('+') {
                Some(rest) if rest.ends_with(char::is_whitespace) => {
                    let mut chars = rest.chars();
                    chars.next_back();
                    format!("{}{line_break}", chars.as_str())
                }
                Some(_) | None => line.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::Options;

    fn normal(text: &str) -> String {
        let options = Options::default();
        let mut state = ParserState::new(&options);
        state.substitute(text, NORMAL)
    }

    #[rstest]
    #[case("quotes,macros", NORMAL, vec![Substitution::Quotes, Substitution::Macros])]
    #[case("+quotes", VERBATIM, vec![Substitution::SpecialChars, Substitution::Quotes])]
    #[case("quotes+", VERBATIM, vec![Substitution::SpecialChars, Substitution::Quotes])]
    #[case("-specialchars", VERBATIM, vec![])]
    #[case("none", NORMAL, vec![])]
    #[case("verbatim,attributes", NORMAL, vec![Substitution::SpecialChars, Substitution::Attributes])]
    #[case("macros,specialcharacters", NONE, vec![Substitution::SpecialChars, Substitution::Macros])]
    fn test_resolve_subs(
        #[case] spec: &str,
        #[case] defaults: &[Substitution],
        #[case] expected: Vec<Substitution>,
    ) {
        let (subs, diagnostics) = resolve_subs(spec, defaults);
        assert_eq!(subs, expected);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_resolve_subs_rejects_mixed_and_unknown() {
        let (subs, diagnostics) = resolve_subs("+quotes,macros,bogus", VERBATIM);
        assert_eq!(subs, vec![Substitution::SpecialChars, Substitution::Quotes]);
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn test_passes_run_in_fixed_order() {
        let options = Options::builder().with_attribute("name", "*x*").build();
        let mut state = ParserState::new(&options);
        // attributes run after quotes, so the value's markup is not interpreted
        let out = state.substitute(
            "{name} and *y*",
            &[Substitution::Attributes, Substitution::Quotes],
        );
        assert_eq!(out, "*x* and <strong>y</strong>");
    }

    #[test]
    fn test_nested_quotes() {
        assert_eq!(
            normal("**bold _and italic_**"),
            "<strong>bold <em>and italic</em></strong>"
        );
    }

    #[test]
    fn test_passthrough_is_protected() {
        assert_eq!(normal("+++**not bold**+++"), "**not bold**");
        assert_eq!(normal("$$<b>$$ *x*"), "&lt;b&gt; <strong>x</strong>");
        assert_eq!(normal("pass:q[*x* <b>]"), "<strong>x</strong> <b>");
    }

    #[test]
    fn test_backtick_literal() {
        assert_eq!(normal("use `a*b*c` here"), "use <code>a*b*c</code> here");
        assert_eq!(normal("`<tag>`"), "<code>&lt;tag&gt;</code>");
    }

    #[test]
    fn test_line_breaks() {
        assert_eq!(normal("one +\ntwo"), "one<br>\ntwo");
        let options = Options::default();
        let mut state = ParserState::new(&options);
        let out = Substitutor::new(&mut state)
            .with_hardbreaks(true)
            .apply("one\ntwo\nthree", NORMAL);
        assert_eq!(out, "one<br>\ntwo<br>\nthree");
    }

    #[test]
    fn test_specialchars_idempotent() {
        let once = escape_special_chars("a < b && c &lt; d");
        assert_eq!(once, "a &lt; b &amp;&amp; c &lt; d");
        assert_eq!(escape_special_chars(&once), once);
    }
}
