use std::fmt;

use serde::Serialize;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Unsupported input: {0}")]
    Input(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("security violation: {1}, position: {0}")]
    Security(Box<SourceLocation>, String),

    #[error("unterminated {1} block, position: {0}")]
    UnterminatedBlock(Box<SourceLocation>, String),

    #[error("structural error: {1}, position: {0}")]
    Structural(Box<SourceLocation>, String),

    #[error("Invalid conditional directive: {0}")]
    InvalidConditionalDirective(String),

    #[error("Invalid include directive: {0}")]
    InvalidIncludeDirective(String),

    #[error("Invalid line range: {0}")]
    InvalidLineRange(String),

    #[error("Invalid level offset: {0}")]
    InvalidLevelOffset(String),

    #[error("Invalid ifeval directive: cannot compare {0} with {1}")]
    InvalidIfEvalDirectiveMismatchedTypes(String, String),

    #[error("Unknown intrinsic attribute: {0}")]
    UnknownIntrinsic(String),

    #[error("ParseInt error: {0}")]
    ParseInt(#[from] std::num::ParseIntError),
}

impl Error {
    /// Extract location information from this error if available.
    #[must_use]
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            Self::Security(location, ..)
            | Self::UnterminatedBlock(location, ..)
            | Self::Structural(location, ..) => Some(location),
            Self::Input(..)
            | Self::Io(..)
            | Self::InvalidConditionalDirective(..)
            | Self::InvalidIncludeDirective(..)
            | Self::InvalidLineRange(..)
            | Self::InvalidLevelOffset(..)
            | Self::InvalidIfEvalDirectiveMismatchedTypes(..)
            | Self::UnknownIntrinsic(..)
            | Self::ParseInt(..) => None,
        }
    }

    /// Get advice for this error if available.
    /// Returns helpful information for resolving the error.
    #[must_use]
    pub fn advice(&self) -> Option<&'static str> {
        match self {
            Self::UnterminatedBlock(..) => Some(
                "Delimited blocks must be closed by the exact line that opened them (e.g., '====' to open, '====' to close)",
            ),
            Self::Security(..) => Some(
                "Lower the safe mode (or pass the setting as an API attribute) to allow this operation",
            ),
            Self::InvalidIfEvalDirectiveMismatchedTypes(..) => Some(
                "ifeval expressions must compare values of the same type (both numbers or both strings)",
            ),
            Self::InvalidLineRange(..) => {
                Some("Line ranges look like `lines=1;3..5;7..-1` (1-based, -1 means end of file)")
            }
            Self::Input(..)
            | Self::Io(..)
            | Self::Structural(..)
            | Self::InvalidConditionalDirective(..)
            | Self::InvalidIncludeDirective(..)
            | Self::InvalidLevelOffset(..)
            | Self::UnknownIntrinsic(..)
            | Self::ParseInt(..) => None,
        }
    }
}

/// Where a line came from: the include frame's file (`None` for the primary source)
/// and the 1-based line number inside it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct SourceLocation {
    pub file: Option<String>,
    pub line: usize,
}

impl SourceLocation {
    #[must_use]
    pub fn new(file: Option<&str>, line: usize) -> Self {
        Self {
            file: file.map(str::to_string),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{file}: line {}", self.line),
            None => write!(f, "line {}", self.line),
        }
    }
}
