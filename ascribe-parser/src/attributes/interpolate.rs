use std::{borrow::Cow, str::FromStr, sync::LazyLock};

use regex::Regex;

use super::{AttributeStore, intrinsic};
use crate::{
    diagnostic::{Diagnostic, DiagnosticKind},
    pattern::{compile, slice, tail},
};

/// `{name}`, `{set:name:value}`, `{counter:name}`, `{counter2:name:start}`, with an
/// optional backslash before the opening or the closing brace to escape it.
///
/// Groups: 1 leading escape, 2 reference body, 3 trailing escape.
static ATTRIBUTE_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(\\)?\{((?:set|counter2?):[^}\n]+?|\w+(?:-\w+)*)(\\)?\}"));

/// What to do with a reference to an attribute that is not defined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AttributeMissing {
    /// Drop the reference, keep the line.
    #[default]
    Skip,
    /// Drop the whole line containing the reference.
    DropLine,
    /// Leave the reference in the text.
    Keep,
    /// Leave the reference in the text and report it.
    Warn,
}

impl AttributeMissing {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::DropLine => "drop-line",
            Self::Keep => "keep",
            Self::Warn => "warn",
        }
    }
}

impl FromStr for AttributeMissing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "skip" | "drop" => Ok(Self::Skip),
            "drop-line" => Ok(Self::DropLine),
            "keep" | "literal" => Ok(Self::Keep),
            "warn" => Ok(Self::Warn),
            other => Err(format!(
                "invalid attribute-missing policy: '{other}', expected: skip, drop-line, keep, warn"
            )),
        }
    }
}

/// What to do with a line that undefines an attribute through `{set:name!}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AttributeUndefined {
    /// Drop the directive only.
    Drop,
    /// Drop the whole line containing the directive.
    #[default]
    DropLine,
}

impl AttributeUndefined {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Drop => "drop",
            Self::DropLine => "drop-line",
        }
    }
}

impl FromStr for AttributeUndefined {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "drop" | "skip" => Ok(Self::Drop),
            "drop-line" => Ok(Self::DropLine),
            other => Err(format!(
                "invalid attribute-undefined policy: '{other}', expected: drop, drop-line"
            )),
        }
    }
}

enum Expansion {
    Value(String),
    Literal,
    DropLine,
}

impl AttributeStore {
    /// Replace every attribute reference in `text`.
    ///
    /// The replacement is single-pass: a substituted value is never scanned again, so a
    /// value referring to itself is left unexpanded. Lines are resolved independently so
    /// the `drop-line` policies remove only the offending line.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn resolve(&mut self, text: &str) -> String {
        if !text.contains('{') {
            return text.to_string();
        }
        let missing = self.attribute_missing();
        let undefined = self.attribute_undefined();
        let mut kept: Vec<String> = Vec::new();
        for line in text.split('\n') {
            if !line.contains('{') {
                kept.push(line.to_string());
            } else if let Some(resolved) = self.resolve_line(line, missing, undefined) {
                kept.push(resolved);
            }
        }
        kept.join("\n")
    }

    /// The value of an intrinsic, or its bracketed `{name}` form when unknown.
    ///
    /// Each unknown name is logged once per store.
    pub fn intrinsic_or_fallback(&mut self, name: &str) -> Cow<'static, str> {
        match intrinsic(name) {
            Ok(value) => Cow::Borrowed(value),
            Err(error) => {
                if self.warned_intrinsics.insert(name.to_string()) {
                    tracing::warn!(%error, "falling back to the literal reference");
                }
                Cow::Owned(format!("{{{name}}}"))
            }
        }
    }

    fn resolve_line(
        &mut self,
        line: &str,
        missing: AttributeMissing,
        undefined: AttributeUndefined,
    ) -> Option<String> {
        let mut result = String::with_capacity(line.len());
        let mut last = 0;
        for captures in ATTRIBUTE_REFERENCE.captures_iter(line) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            result.push_str(slice(line, last, whole.start()));
            last = whole.end();
            let reference = captures.get(2).map_or("", |m| m.as_str());
            if captures.get(1).is_some() || captures.get(3).is_some() {
                result.push('{');
                result.push_str(reference);
                result.push('}');
                continue;
            }
            match self.expand(reference, missing, undefined) {
                Expansion::Value(value) => result.push_str(&value),
                Expansion::Literal => result.push_str(whole.as_str()),
                Expansion::DropLine => return None,
            }
        }
        result.push_str(tail(line, last));
        Some(result)
    }

    fn expand(
        &mut self,
        reference: &str,
        missing: AttributeMissing,
        undefined: AttributeUndefined,
    ) -> Expansion {
        if let Some(args) = reference.strip_prefix("set:") {
            let (name, value) = match args.split_once(':') {
                Some((name, value)) => (name, Some(value)),
                None => (args, None),
            };
            let (name, value) = match name.strip_suffix('!') {
                Some(name) => (name, None),
                None => (name, Some(value.unwrap_or_default().to_string())),
            };
            let unsetting = value.is_none();
            self.assign(name, value);
            if unsetting && undefined == AttributeUndefined::DropLine {
                tracing::trace!(%name, "undefining attribute, dropping line");
                return Expansion::DropLine;
            }
            return Expansion::Value(String::new());
        }
        if let Some(args) = reference.strip_prefix("counter2:") {
            self.counter(args);
            return Expansion::Value(String::new());
        }
        if let Some(args) = reference.strip_prefix("counter:") {
            return Expansion::Value(self.counter(args));
        }

        let name = reference.to_lowercase();
        if let Some(value) = self.get(&name) {
            return Expansion::Value(value.to_string());
        }
        if let Ok(value) = intrinsic(&name) {
            return Expansion::Value(value.to_string());
        }
        match missing {
            AttributeMissing::Skip => {
                tracing::trace!(%name, "dropping reference to missing attribute");
                Expansion::Value(String::new())
            }
            AttributeMissing::DropLine => {
                self.diagnostics.push(Diagnostic::warning(
                    DiagnosticKind::Attribute,
                    format!("dropping line containing reference to missing attribute: {name}"),
                ));
                Expansion::DropLine
            }
            AttributeMissing::Keep => Expansion::Literal,
            AttributeMissing::Warn => {
                self.diagnostics.push(Diagnostic::warning(
                    DiagnosticKind::Attribute,
                    format!("skipping reference to missing attribute: {name}"),
                ));
                Expansion::Literal
            }
        }
    }

    /// Advance the counter `name` (`name:seed` seeds it) and return the new value.
    fn counter(&mut self, args: &str) -> String {
        let (name, seed) = match args.split_once(':') {
            Some((name, seed)) => (name, seed),
            None => (args, "1"),
        };
        let next = self
            .get(name)
            .and_then(next_counter_value)
            .unwrap_or_else(|| seed.to_string());
        if self.assign(name, Some(next.clone())) {
            next
        } else {
            self.get(name).unwrap_or_default().to_string()
        }
    }
}

fn next_counter_value(current: &str) -> Option<String> {
    if let Ok(number) = current.parse::<i64>() {
        return Some((number + 1).to_string());
    }
    let mut chars = current.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), None) if letter.is_ascii_alphabetic() && !matches!(letter, 'z' | 'Z') => {
            char::from_u32(u32::from(letter) + 1).map(String::from)
        }
        _ => None,
    }
}
