//! A rewindable cursor over source lines that resolves preprocessor directives
//! (conditionals and includes) as lines are pulled from it.
mod conditional;
mod include;
mod tag;

use std::collections::VecDeque;

use ascribe_core::{SafeMode, is_source_file};

pub use include::{
    IncludeError, IncludeRequest, IncludeResolver, IncludeSelector, LineRange, MemoryResolver,
};
pub use tag::TagFilter;

use crate::{
    diagnostic::{Diagnostic, DiagnosticKind},
    error::{Error, SourceLocation},
    reader::{
        conditional::Directive,
        include::{IncludeDirective, LevelOffset, jail},
    },
    state::ParserState,
};

/// One source line and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    pub location: SourceLocation,
}

impl Line {
    pub(crate) fn new(text: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            text: text.into(),
            location,
        }
    }

    pub(crate) fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// The lines of one source (the primary document or an included file).
#[derive(Debug)]
struct Frame {
    file: Option<String>,
    lines: VecDeque<String>,
    line_number: usize,
    preprocess: bool,
    /// Emitted after the last line, without preprocessing.
    epilogue: Option<String>,
    depth: usize,
}

#[derive(Debug)]
struct OpenConditional {
    target: String,
    was_skipping: bool,
}

enum Preprocessed {
    Emit(Line),
    Consumed,
}

/// The line cursor driven by the lexer.
///
/// Lines handed out by [`Reader::peek_line`] and [`Reader::read_line`] have already
/// been through the preprocessor: conditionals are evaluated against the current
/// attributes at the moment a line is first pulled, and include directives are replaced
/// by the included lines. Lines given back through [`Reader::unshift`] are not
/// preprocessed again.
#[derive(Debug)]
pub(crate) struct Reader {
    frames: Vec<Frame>,
    lookahead: Vec<Line>,
    conditionals: Vec<OpenConditional>,
    skipping: bool,
    last_location: SourceLocation,
}

impl Reader {
    /// A reader over the primary document, with preprocessing enabled.
    pub(crate) fn new(lines: Vec<String>, file: Option<String>) -> Self {
        Self::with_frame(Frame {
            file,
            lines: lines.into(),
            line_number: 0,
            preprocess: true,
            epilogue: None,
            depth: 0,
        })
    }

    /// A reader over lines that were already preprocessed (the body of a delimited
    /// block, a list item, a table cell). `location` is the location of the first line.
    pub(crate) fn from_lines(lines: Vec<Line>, location: SourceLocation) -> Self {
        let mut reader = Self::with_frame(Frame {
            file: location.file.clone(),
            lines: VecDeque::new(),
            line_number: location.line.saturating_sub(1),
            preprocess: false,
            epilogue: None,
            depth: 0,
        });
        reader.lookahead = lines.into_iter().rev().collect();
        reader.last_location = location;
        reader
    }

    fn with_frame(frame: Frame) -> Self {
        let last_location = SourceLocation::new(frame.file.as_deref(), frame.line_number);
        Self {
            frames: vec![frame],
            lookahead: Vec::new(),
            conditionals: Vec::new(),
            skipping: false,
            last_location,
        }
    }

    /// Look at the next line without consuming it.
    pub(crate) fn peek_line(&mut self, state: &mut ParserState) -> Option<&Line> {
        if self.lookahead.is_empty() {
            let line = self.next_preprocessed(state)?;
            self.lookahead.push(line);
        }
        self.lookahead.last()
    }

    /// The text of the next line, cloned, for callers that need to keep using `self`.
    pub(crate) fn peek_text(&mut self, state: &mut ParserState) -> Option<String> {
        self.peek_line(state).map(|line| line.text.clone())
    }

    pub(crate) fn read_line(&mut self, state: &mut ParserState) -> Option<Line> {
        let line = match self.lookahead.pop() {
            Some(line) => line,
            None => self.next_preprocessed(state)?,
        };
        self.last_location = line.location.clone();
        Some(line)
    }

    /// Push a line back; it will be the next line returned.
    pub(crate) fn unshift(&mut self, line: Line) {
        self.lookahead.push(line);
    }

    pub(crate) fn has_more_lines(&mut self, state: &mut ParserState) -> bool {
        self.peek_line(state).is_some()
    }

    /// Consume blank lines, returning how many were skipped.
    pub(crate) fn skip_blank_lines(&mut self, state: &mut ParserState) -> usize {
        let mut skipped = 0;
        while self.peek_line(state).is_some_and(Line::is_blank) {
            self.read_line(state);
            skipped += 1;
        }
        skipped
    }

    /// Consume lines up to (not including) the first one matching `stop`.
    pub(crate) fn read_lines_until(
        &mut self,
        state: &mut ParserState,
        mut stop: impl FnMut(&Line) -> bool,
    ) -> Vec<Line> {
        let mut lines = Vec::new();
        while let Some(line) = self.peek_line(state) {
            if stop(line) {
                break;
            }
            if let Some(line) = self.read_line(state) {
                lines.push(line);
            }
        }
        lines
    }

    /// The location of the next line, or of the last line read at end of input.
    pub(crate) fn location(&mut self, state: &mut ParserState) -> SourceLocation {
        match self.peek_line(state) {
            Some(line) => line.location.clone(),
            None => self.last_location.clone(),
        }
    }

    fn next_preprocessed(&mut self, state: &mut ParserState) -> Option<Line> {
        loop {
            if state.fatal.is_some() {
                return None;
            }
            let (line, preprocess) = self.next_raw()?;
            if !preprocess {
                return Some(line);
            }
            match self.preprocess(line, state) {
                Preprocessed::Emit(line) => return Some(line),
                Preprocessed::Consumed => {}
            }
        }
    }

    fn next_raw(&mut self) -> Option<(Line, bool)> {
        loop {
            let frame = self.frames.last_mut()?;
            if let Some(text) = frame.lines.pop_front() {
                frame.line_number += 1;
                let location = SourceLocation::new(frame.file.as_deref(), frame.line_number);
                return Some((Line::new(text, location), frame.preprocess));
            }
            if let Some(epilogue) = frame.epilogue.take() {
                let location = SourceLocation::new(frame.file.as_deref(), frame.line_number);
                return Some((Line::new(epilogue, location), false));
            }
            if self.frames.len() == 1 {
                return None;
            }
            if let Some(finished) = self.frames.pop() {
                tracing::trace!(file = ?finished.file, "include finished");
            }
        }
    }

    fn preprocess(&mut self, line: Line, state: &mut ParserState) -> Preprocessed {
        if conditional::is_directive(&line.text) {
            if let Some(unescaped) = line.text.strip_prefix('\\') {
                return if self.skipping {
                    Preprocessed::Consumed
                } else {
                    Preprocessed::Emit(Line::new(unescaped, line.location))
                };
            }
            return self.process_conditional(line, state);
        }
        if self.skipping {
            return Preprocessed::Consumed;
        }
        if include::is_directive(&line.text) {
            if let Some(unescaped) = line.text.strip_prefix('\\') {
                return Preprocessed::Emit(Line::new(unescaped, line.location));
            }
            return self.process_include(line, state);
        }
        Preprocessed::Emit(line)
    }

    #[tracing::instrument(level = "trace", skip(self, state), fields(line = %line.text))]
    fn process_conditional(&mut self, line: Line, state: &mut ParserState) -> Preprocessed {
        let directive = match conditional::parse_line(&line.text) {
            Ok(directive) => directive,
            Err(error) => {
                if !self.skipping {
                    state.report(
                        Diagnostic::warning(DiagnosticKind::Conditional, error.to_string())
                            .at(line.location),
                    );
                }
                return Preprocessed::Consumed;
            }
        };

        if let Directive::Endif { target } = &directive {
            match self.conditionals.last() {
                None => state.report(
                    Diagnostic::warning(
                        DiagnosticKind::Conditional,
                        format!("unmatched preprocessor directive: {}", line.text),
                    )
                    .at(line.location),
                ),
                Some(open) if target.as_ref().is_some_and(|target| *target != open.target) => {
                    state.report(
                        Diagnostic::warning(
                            DiagnosticKind::Conditional,
                            format!(
                                "mismatched preprocessor directive: {}, expected endif::{}[]",
                                line.text, open.target
                            ),
                        )
                        .at(line.location),
                    );
                }
                Some(_) => {
                    if let Some(open) = self.conditionals.pop() {
                        self.skipping = open.was_skipping;
                    }
                }
            }
            return Preprocessed::Consumed;
        }

        let (target, content) = match &directive {
            Directive::Test {
                target, content, ..
            } => (target.clone(), content.clone()),
            Directive::Eval(_) | Directive::Endif { .. } => (String::new(), None),
        };

        if self.skipping {
            if content.is_none() {
                self.conditionals.push(OpenConditional {
                    target,
                    was_skipping: true,
                });
            }
            return Preprocessed::Consumed;
        }

        let result = match directive.evaluate(&mut state.attributes) {
            Ok(result) => result,
            Err(error) => {
                state.report(
                    Diagnostic::warning(DiagnosticKind::Conditional, error.to_string())
                        .at(line.location.clone()),
                );
                false
            }
        };
        tracing::trace!(result, "conditional evaluated");

        if let Some(content) = content {
            return if result {
                Preprocessed::Emit(Line::new(content, line.location))
            } else {
                Preprocessed::Consumed
            };
        }
        self.conditionals.push(OpenConditional {
            target,
            was_skipping: false,
        });
        self.skipping = !result;
        Preprocessed::Consumed
    }

    #[tracing::instrument(level = "trace", skip(self, state), fields(line = %line.text))]
    fn process_include(&mut self, line: Line, state: &mut ParserState) -> Preprocessed {
        let directive = match IncludeDirective::parse(&line.text) {
            Ok(directive) => directive,
            Err(Error::InvalidIncludeDirective(_)) => return Preprocessed::Emit(line),
            Err(error) => {
                state.report(
                    Diagnostic::error(DiagnosticKind::Include, error.to_string())
                        .at(line.location),
                );
                return Preprocessed::Consumed;
            }
        };

        let target = state.attributes.resolve(&directive.target);
        if target.trim().is_empty() {
            state.report(
                Diagnostic::warning(
                    DiagnosticKind::Include,
                    format!("dropping include with empty target: {}", line.text),
                )
                .at(line.location),
            );
            return Preprocessed::Consumed;
        }

        let safe_mode = state.options.safe_mode;
        if safe_mode >= SafeMode::Secure {
            state.report(
                Diagnostic::warning(
                    DiagnosticKind::Security,
                    format!("include directive replaced by a link in secure mode: {target}"),
                )
                .at(line.location.clone()),
            );
            return Preprocessed::Emit(Line::new(format!("link:{target}[]"), line.location));
        }

        let parent = self.frames.last().and_then(|frame| frame.file.clone());
        let path = if is_uri(&target) {
            if !state.attributes.contains("allow-uri-read") {
                state.report(
                    Diagnostic::warning(
                        DiagnosticKind::Security,
                        format!("cannot include {target}: allow-uri-read is not set"),
                    )
                    .at(line.location),
                );
                return Preprocessed::Consumed;
            }
            target.clone()
        } else {
            match jail(parent.as_deref(), &target) {
                Some(path) => path,
                None if safe_mode >= SafeMode::Safe => {
                    state.abort(Error::Security(
                        Box::new(line.location),
                        format!("include target escapes the base directory: {target}"),
                    ));
                    return Preprocessed::Consumed;
                }
                None => target.clone(),
            }
        };

        let depth = self.frames.last().map_or(0, |frame| frame.depth) + 1;
        let max_depth = state
            .attributes
            .get("max-include-depth")
            .and_then(|value| value.parse::<usize>().ok())
            .unwrap_or(64);
        if depth > max_depth {
            state.report(
                Diagnostic::error(
                    DiagnosticKind::Include,
                    format!("maximum include depth of {max_depth} exceeded: {target}"),
                )
                .at(line.location),
            );
            return Preprocessed::Consumed;
        }
        if self
            .frames
            .iter()
            .any(|frame| frame.file.as_deref() == Some(path.as_str()))
        {
            state.report(
                Diagnostic::error(
                    DiagnosticKind::Include,
                    format!("include cycle detected: {path}"),
                )
                .at(line.location),
            );
            return Preprocessed::Consumed;
        }

        let Some(resolver) = state.options.include_resolver.clone() else {
            state.report(
                Diagnostic::error(
                    DiagnosticKind::Include,
                    format!("no include resolver configured, dropping include: {target}"),
                )
                .at(line.location),
            );
            return Preprocessed::Consumed;
        };
        let request = IncludeRequest {
            target: target.clone(),
            path: path.clone(),
            parent,
            selector: directive.selector,
        };
        let lines = match resolver.resolve(&request) {
            Ok(lines) => lines,
            Err(error) => {
                state.report(
                    Diagnostic::error(DiagnosticKind::Include, error.to_string())
                        .at(line.location),
                );
                return Preprocessed::Consumed;
            }
        };

        let mut prologue = None;
        let mut epilogue = None;
        if let Some(offset) = directive.level_offset {
            let (set, restore) = match offset {
                LevelOffset::Relative(delta) => (
                    format!(":leveloffset: {delta:+}"),
                    format!(":leveloffset: {:+}", -delta),
                ),
                LevelOffset::Absolute(level) => (
                    format!(":leveloffset: {level}"),
                    match state.attributes.get("leveloffset") {
                        Some(previous) => format!(":leveloffset: {previous}"),
                        None => ":leveloffset!:".to_string(),
                    },
                ),
            };
            prologue = Some(Line::new(set, line.location.clone()));
            epilogue = Some(restore);
        }

        tracing::trace!(%path, lines = lines.len(), "include pushed");
        self.frames.push(Frame {
            preprocess: is_source_file(&path),
            file: Some(path),
            lines: lines
                .into_iter()
                .map(|line| line.trim_end().to_string())
                .collect(),
            line_number: 0,
            epilogue,
            depth,
        });
        match prologue {
            Some(prologue) => Preprocessed::Emit(prologue),
            None => Preprocessed::Consumed,
        }
    }
}

fn is_uri(target: &str) -> bool {
    url::Url::parse(target)
        .is_ok_and(|url| matches!(url.scheme(), "http" | "https" | "ftp" | "irc"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::Options;

    fn read_all<'o>(source: &str, options: &'o Options) -> (Vec<String>, ParserState<'o>) {
        let mut state = ParserState::new(options);
        let mut reader = Reader::new(source.lines().map(str::to_string).collect(), None);
        let mut lines = Vec::new();
        while let Some(line) = reader.read_line(&mut state) {
            lines.push(line.text);
        }
        (lines, state)
    }

    #[test]
    fn test_peek_read_unshift() {
        let options = Options::default();
        let mut state = ParserState::new(&options);
        let mut reader = Reader::new(vec!["a".into(), String::new(), "b".into()], None);
        assert_eq!(reader.peek_text(&mut state).as_deref(), Some("a"));
        let first = reader.read_line(&mut state);
        assert_eq!(first.as_ref().map(|l| l.location.line), Some(1));
        assert_eq!(reader.skip_blank_lines(&mut state), 1);
        let second = reader.read_line(&mut state);
        assert_eq!(second.as_ref().map(|l| l.text.as_str()), Some("b"));
        if let Some(second) = second {
            reader.unshift(second);
        }
        if let Some(first) = first {
            reader.unshift(first);
        }
        assert_eq!(reader.read_line(&mut state).map(|l| l.text), Some("a".into()));
        assert_eq!(reader.read_line(&mut state).map(|l| l.text), Some("b".into()));
        assert!(!reader.has_more_lines(&mut state));
        assert_eq!(reader.location(&mut state).line, 3);
    }

    #[test]
    fn test_false_conditional_skips_nested_lines() {
        let options = Options::default();
        let (lines, _) = read_all(
            "a\nifdef::missing[]\nb\nifndef::other[]\nc\nendif::other[]\nd\nendif::missing[]\ne",
            &options,
        );
        assert_eq!(lines, vec!["a", "e"]);
    }

    #[test]
    fn test_conditional_sees_attributes_set_while_reading() {
        let options = Options::builder().with_attribute("flag", true).build();
        let (lines, _) = read_all(
            "ifdef::flag[]\nyes\nendif::[]\nifndef::flag[]\nno\nendif::[]\nifdef::flag[inline text]",
            &options,
        );
        assert_eq!(lines, vec!["yes", "inline text"]);
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_unmatched_endif_is_reported() {
        let options = Options::default();
        let (lines, state) = read_all("a\nendif::nothing[]\nb", &options);
        assert_eq!(lines, vec!["a", "b"]);
        assert_eq!(state.diagnostics.len(), 1);
        assert!(logs_contain("unmatched preprocessor directive"));
    }

    #[test]
    fn test_escaped_directives_are_literal() {
        let options = Options::default();
        let (lines, _) = read_all("\\ifdef::x[]\n\\include::y.adoc[]", &options);
        assert_eq!(lines, vec!["ifdef::x[]", "include::y.adoc[]"]);
    }

    #[test]
    fn test_include_splices_lines_with_locations() {
        let resolver = MemoryResolver::new()
            .with_file("parts/a.adoc", "A1\ninclude::b.adoc[]\nA3")
            .with_file("parts/b.adoc", "B1");
        let options = Options::builder()
            .with_safe_mode(SafeMode::Safe)
            .with_include_resolver(Arc::new(resolver))
            .build();
        let mut state = ParserState::new(&options);
        let mut reader = Reader::new(
            vec!["before".into(), "include::parts/a.adoc[]".into(), "after".into()],
            None,
        );
        let mut seen = Vec::new();
        while let Some(line) = reader.read_line(&mut state) {
            seen.push((line.text, line.location.file, line.location.line));
        }
        assert_eq!(
            seen,
            vec![
                ("before".to_string(), None, 1),
                ("A1".to_string(), Some("parts/a.adoc".to_string()), 1),
                ("B1".to_string(), Some("parts/b.adoc".to_string()), 1),
                ("A3".to_string(), Some("parts/a.adoc".to_string()), 3),
                ("after".to_string(), None, 3),
            ]
        );
    }

    #[test]
    fn test_include_cycle_terminates() {
        let resolver = MemoryResolver::new().with_file("loop.adoc", "x\ninclude::loop.adoc[]");
        let options = Options::builder()
            .with_safe_mode(SafeMode::Safe)
            .with_include_resolver(Arc::new(resolver))
            .build();
        let (lines, state) = read_all("include::loop.adoc[]", &options);
        assert_eq!(lines, vec!["x"]);
        assert_eq!(state.diagnostics.len(), 1);
    }

    #[test]
    fn test_include_missing_target_is_dropped() {
        let options = Options::builder()
            .with_safe_mode(SafeMode::Unsafe)
            .with_include_resolver(Arc::new(MemoryResolver::new()))
            .build();
        let (lines, state) = read_all("a\ninclude::nope.adoc[]\nb", &options);
        assert_eq!(lines, vec!["a", "b"]);
        assert_eq!(state.diagnostics.len(), 1);
    }

    #[test]
    fn test_secure_mode_turns_include_into_link() {
        let options = Options::default();
        let (lines, _) = read_all("include::chapter.adoc[]", &options);
        assert_eq!(lines, vec!["link:chapter.adoc[]"]);
    }

    #[test]
    fn test_jailbreak_aborts_in_safe_mode() {
        let options = Options::builder()
            .with_safe_mode(SafeMode::Safe)
            .with_include_resolver(Arc::new(MemoryResolver::new()))
            .build();
        let (lines, state) = read_all("a\ninclude::../etc/passwd[]\nb", &options);
        assert_eq!(lines, vec!["a"]);
        assert!(matches!(state.fatal, Some(Error::Security(..))));
    }

    #[test]
    fn test_leveloffset_wraps_included_lines() {
        let resolver = MemoryResolver::new().with_file("sub.adoc", "== Sub");
        let options = Options::builder()
            .with_safe_mode(SafeMode::Safe)
            .with_include_resolver(Arc::new(resolver))
            .build();
        let (lines, _) = read_all("include::sub.adoc[leveloffset=+1]", &options);
        assert_eq!(
            lines,
            vec![":leveloffset: +1", "== Sub", ":leveloffset: -1"]
        );
    }

    #[test]
    fn test_non_source_includes_are_not_preprocessed() {
        let resolver = MemoryResolver::new().with_file("script.sh", "ifdef::x[]\necho");
        let options = Options::builder()
            .with_safe_mode(SafeMode::Safe)
            .with_include_resolver(Arc::new(resolver))
            .build();
        let (lines, _) = read_all("include::script.sh[]", &options);
        assert_eq!(lines, vec!["ifdef::x[]", "echo"]);
    }
}
