use std::{fmt, str::FromStr};

use serde::Serialize;

/// Safe mode to use when processing a document.
///
/// The levels are ordered: every level forbids everything the levels below it forbid.
/// Their numeric values are part of the public contract and are what the
/// `safe-mode-level` document attribute exposes.
#[derive(Debug, Clone, Default, PartialOrd, Ord, PartialEq, Eq, Hash, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SafeMode {
    /// The `UNSAFE` safe mode level disables all security measures.
    Unsafe = 0,

    /// The `SAFE` safe mode level prevents access to files which reside outside of the
    /// parent directory of the source file. Include directives (`include::[]`) are
    /// enabled, but targets must not escape that directory.
    Safe = 1,

    /// The `SERVER` safe mode level disallows the document from setting attributes that
    /// would affect conversion of the document:
    ///
    /// - setting source-highlighter, doctype, docinfo and backend
    /// - seeing docdir (as it can reveal information about the host filesystem)
    ///
    /// No includes from a url are allowed unless the `allow-uri-read` attribute is set.
    Server = 10,

    /// The `SECURE` safe mode level disallows the document from attempting to read files
    /// from the file system and including their contents into the document. Include
    /// directives are turned into links to their target.
    ///
    /// This is the default level for API use.
    #[default]
    Secure = 20,
}

impl SafeMode {
    /// The integer level of this safe mode.
    #[must_use]
    pub fn level(self) -> u8 {
        self as u8
    }

    /// The lowercase name of this safe mode.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Unsafe => "unsafe",
            Self::Safe => "safe",
            Self::Server => "server",
            Self::Secure => "secure",
        }
    }
}

impl fmt::Display for SafeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SafeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unsafe" | "0" => Ok(Self::Unsafe),
            "safe" | "1" => Ok(Self::Safe),
            "server" | "10" => Ok(Self::Server),
            "secure" | "20" => Ok(Self::Secure),
            _ => Err(format!(
                "invalid safe mode: '{s}', expected: unsafe, safe, server, secure"
            )),
        }
    }
}

impl TryFrom<u8> for SafeMode {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(Self::Unsafe),
            1 => Ok(Self::Safe),
            10 => Ok(Self::Server),
            20 => Ok(Self::Secure),
            other => Err(format!(
                "invalid safe mode level: {other}, expected: 0, 1, 10, 20"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() -> Result<(), String> {
        assert_eq!(SafeMode::from_str("unsafe")?, SafeMode::Unsafe);
        assert_eq!(SafeMode::from_str("UNSAFE")?, SafeMode::Unsafe);
        assert_eq!(SafeMode::from_str("safe")?, SafeMode::Safe);
        assert_eq!(SafeMode::from_str("server")?, SafeMode::Server);
        assert_eq!(SafeMode::from_str("secure")?, SafeMode::Secure);
        assert_eq!(SafeMode::from_str("10")?, SafeMode::Server);
        assert!(SafeMode::from_str("invalid").is_err());
        Ok(())
    }

    #[test]
    fn test_levels() -> Result<(), String> {
        assert_eq!(SafeMode::Unsafe.level(), 0);
        assert_eq!(SafeMode::Safe.level(), 1);
        assert_eq!(SafeMode::Server.level(), 10);
        assert_eq!(SafeMode::Secure.level(), 20);
        assert_eq!(SafeMode::try_from(20)?, SafeMode::Secure);
        assert!(SafeMode::try_from(5).is_err());
        Ok(())
    }

    #[test]
    fn test_ordering() {
        assert!(SafeMode::Unsafe < SafeMode::Safe);
        assert!(SafeMode::Safe < SafeMode::Server);
        assert!(SafeMode::Server < SafeMode::Secure);
        assert_eq!(SafeMode::default(), SafeMode::Secure);
    }
}
