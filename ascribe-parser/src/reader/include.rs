use std::{fmt, str::FromStr};

use rustc_hash::FxHashMap;

use super::tag::{TagFilter, select_tagged};
use crate::{attributes::AttributeList, error::Error};

/// The text of an include directive, split into its target and its options.
///
/// `include::target[leveloffset=offset,lines=ranges,tag(s)=name(s)]`
///
/// The target may contain attribute references; they are resolved by the reader before
/// the target is checked against the safe mode.
#[derive(Debug, PartialEq)]
pub(crate) struct IncludeDirective {
    pub(crate) target: String,
    pub(crate) level_offset: Option<LevelOffset>,
    pub(crate) selector: Option<IncludeSelector>,
}

/// A `leveloffset` include option: `+1`/`-1` shift relative to the current offset, a
/// bare number replaces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LevelOffset {
    Relative(i32),
    Absolute(i32),
}

peg::parser! {
    grammar include_parser() for str {
        pub(crate) rule directive() -> (&'input str, &'input str)
            = "include::" target:$((!['['] [_])+) "[" attrs:$((!("]" ![_]) [_])*) "]" ![_] {
                (target, attrs)
            }
    }
}

/// Whether `line` looks like an include directive, escaped or not.
pub(crate) fn is_directive(line: &str) -> bool {
    let line = line.strip_prefix('\\').unwrap_or(line);
    line.starts_with("include::") && line.ends_with(']')
}

impl IncludeDirective {
    #[tracing::instrument(level = "trace")]
    pub(crate) fn parse(line: &str) -> Result<Self, Error> {
        let (target, attrs) = include_parser::directive(line).map_err(|error| {
            tracing::trace!(?error, "failed to parse include directive");
            Error::InvalidIncludeDirective(line.to_string())
        })?;
        let attrs = AttributeList::parse(attrs);

        let level_offset = attrs
            .named("leveloffset")
            .map(LevelOffset::from_str)
            .transpose()?;
        let selector = if let Some(lines) = attrs.named("lines") {
            Some(IncludeSelector::Lines(LineRange::parse_list(lines)?))
        } else {
            let tags: Vec<TagFilter> = attrs
                .named("tags")
                .into_iter()
                .flat_map(|tags| tags.split([';', ',']))
                .chain(attrs.named("tag"))
                .filter(|tag| !tag.trim().is_empty())
                .map(TagFilter::parse)
                .collect();
            (!tags.is_empty()).then_some(IncludeSelector::Tags(tags))
        };

        Ok(Self {
            target: target.trim().to_string(),
            level_offset,
            selector,
        })
    }
}

impl FromStr for LevelOffset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = |_| Error::InvalidLevelOffset(s.to_string());
        if let Some(relative) = s.strip_prefix('+') {
            Ok(Self::Relative(relative.parse().map_err(invalid)?))
        } else if s.starts_with('-') {
            Ok(Self::Relative(s.parse().map_err(invalid)?))
        } else {
            Ok(Self::Absolute(s.parse().map_err(invalid)?))
        }
    }
}

/// One entry of a `lines=` option. Line numbers are 1-based and inclusive; an open end
/// (`7..-1` or `7..`) runs to the end of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRange {
    Single(usize),
    Range(usize, Option<usize>),
}

impl FromStr for LineRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || Error::InvalidLineRange(s.to_string());
        match s.split_once("..") {
            Some((start, end)) => {
                let start = if start.is_empty() {
                    1
                } else {
                    start.parse().map_err(|_| invalid())?
                };
                let end = match end {
                    "" | "-1" => None,
                    end => Some(end.parse().map_err(|_| invalid())?),
                };
                Ok(Self::Range(start, end))
            }
            None => Ok(Self::Single(s.parse().map_err(|_| invalid())?)),
        }
    }
}

impl LineRange {
    fn parse_list(value: &str) -> Result<Vec<Self>, Error> {
        value
            .split([';', ','])
            .filter(|part| !part.trim().is_empty())
            .map(Self::from_str)
            .collect()
    }

    fn contains(self, line_number: usize) -> bool {
        match self {
            Self::Single(line) => line == line_number,
            Self::Range(start, end) => {
                line_number >= start && end.is_none_or(|end| line_number <= end)
            }
        }
    }
}

/// Which part of an include target to keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncludeSelector {
    Lines(Vec<LineRange>),
    Tags(Vec<TagFilter>),
}

impl IncludeSelector {
    /// Apply this selector to the full content of an include target.
    #[must_use]
    pub fn apply(&self, lines: Vec<String>) -> Vec<String> {
        match self {
            Self::Lines(ranges) => lines
                .into_iter()
                .enumerate()
                .filter(|(index, _)| ranges.iter().any(|range| range.contains(index + 1)))
                .map(|(_, line)| line)
                .collect(),
            Self::Tags(filters) => select_tagged(&lines, filters)
                .into_iter()
                .filter_map(|index| lines.get(index).cloned())
                .collect(),
        }
    }
}

/// What the reader asks an [`IncludeResolver`] for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeRequest {
    /// The target as written, after attribute interpolation.
    pub target: String,
    /// The target normalized against the including file's directory, relative to the
    /// primary document.
    pub path: String,
    /// The file containing the directive (`None` for the primary source).
    pub parent: Option<String>,
    pub selector: Option<IncludeSelector>,
}

#[non_exhaustive]
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IncludeError {
    #[error("include target not found: {0}")]
    NotFound(String),

    #[error("unable to read include target {target}: {reason}")]
    Unreadable { target: String, reason: String },
}

/// Fetches the lines an include directive splices into the document.
///
/// The reader never touches a filesystem or the network itself; every include goes
/// through this trait. Implementations are expected to honor the request's selector,
/// which [`IncludeSelector::apply`] implements.
pub trait IncludeResolver: Send + Sync + fmt::Debug {
    /// # Errors
    ///
    /// Returns an [`IncludeError`] when the target is missing or cannot be read.
    fn resolve(&self, request: &IncludeRequest) -> Result<Vec<String>, IncludeError>;
}

/// An [`IncludeResolver`] backed by an in-memory map from path to content.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    files: FxHashMap<String, String>,
}

impl MemoryResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }
}

impl IncludeResolver for MemoryResolver {
    fn resolve(&self, request: &IncludeRequest) -> Result<Vec<String>, IncludeError> {
        let content = self
            .files
            .get(&request.path)
            .or_else(|| self.files.get(&request.target))
            .ok_or_else(|| IncludeError::NotFound(request.target.clone()))?;
        let lines = content.lines().map(str::to_string).collect();
        Ok(match &request.selector {
            Some(selector) => selector.apply(lines),
            None => lines,
        })
    }
}

/// Normalize `target` against the directory of `parent`.
///
/// Returns `None` when the result would leave the primary document's directory (an
/// absolute target, or one with too many `..` segments).
pub(crate) fn jail(parent: Option<&str>, target: &str) -> Option<String> {
    let is_absolute = target.starts_with('/')
        || target.starts_with('\\')
        || target.chars().nth(1) == Some(':');
    if is_absolute {
        return None;
    }
    let mut segments: Vec<&str> = parent
        .and_then(|parent| parent.rsplit_once('/'))
        .map(|(directory, _)| directory.split('/').collect())
        .unwrap_or_default();
    for segment in target.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            segment => segments.push(segment),
        }
    }
    Some(segments.join("/"))
}
