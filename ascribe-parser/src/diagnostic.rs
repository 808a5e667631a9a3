use serde::Serialize;

use crate::error::{Error, SourceLocation};

/// How bad a recovered problem was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// The family a diagnostic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    /// Unterminated blocks, section level skips, malformed cellspecs, inconsistent markers.
    Structural,
    /// An operation the active safe mode forbids.
    Security,
    /// Missing, unreadable or cyclic include targets.
    Include,
    /// Undefined attribute references and rejected assignments.
    Attribute,
    /// Unbalanced or malformed preprocessor conditionals.
    Conditional,
}

/// A recoverable problem found while parsing.
///
/// Diagnostics are advisory: the document is still produced, and none of them is part
/// of the returned tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl Diagnostic {
    #[must_use]
    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            message: message.into(),
            location: None,
        }
    }

    #[must_use]
    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            message: message.into(),
            location: None,
        }
    }

    #[must_use]
    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Promote this diagnostic to a fatal error, used by strict mode.
    #[must_use]
    pub fn into_error(self) -> Error {
        let location = Box::new(self.location.unwrap_or_default());
        match self.kind {
            DiagnosticKind::Security => Error::Security(location, self.message),
            DiagnosticKind::Structural
            | DiagnosticKind::Include
            | DiagnosticKind::Attribute
            | DiagnosticKind::Conditional => Error::Structural(location, self.message),
        }
    }
}

/// Collects diagnostics for one parse and mirrors each one to the log.
#[derive(Debug, Default)]
pub(crate) struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub(crate) fn push(&mut self, diagnostic: Diagnostic) {
        let location = diagnostic
            .location
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        match (diagnostic.severity, diagnostic.kind) {
            (_, DiagnosticKind::Security) | (Severity::Error, _) => {
                tracing::error!(kind = ?diagnostic.kind, %location, "{}", diagnostic.message);
            }
            (Severity::Warning, _) => {
                tracing::warn!(kind = ?diagnostic.kind, %location, "{}", diagnostic.message);
            }
        }
        self.entries.push(diagnostic);
    }

    pub(crate) fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.push(diagnostic);
        }
    }

    /// The first diagnostic that strict mode refuses to recover from.
    pub(crate) fn first_error(&self) -> Option<&Diagnostic> {
        self.entries
            .iter()
            .find(|diagnostic| diagnostic.severity == Severity::Error)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[tracing_test::traced_test]
    fn test_push_logs_and_collects() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.push(
            Diagnostic::warning(DiagnosticKind::Structural, "list marker changed")
                .at(SourceLocation::new(None, 7)),
        );
        diagnostics.push(Diagnostic::error(
            DiagnosticKind::Include,
            "include target not found: missing.adoc",
        ));
        assert!(logs_contain("list marker changed"));
        assert!(logs_contain("include target not found"));
        assert_eq!(
            diagnostics.first_error().map(|d| d.kind),
            Some(DiagnosticKind::Include)
        );
        assert_eq!(diagnostics.into_vec().len(), 2);
    }

    #[test]
    fn test_into_error_keeps_location() {
        let error = Diagnostic::error(DiagnosticKind::Security, "protected attribute: backend")
            .at(SourceLocation::new(Some("doc.adoc"), 2))
            .into_error();
        assert!(matches!(error, Error::Security(..)));
        assert_eq!(error.location(), Some(&SourceLocation::new(Some("doc.adoc"), 2)));
    }
}
