use rustc_hash::FxHashSet;

use crate::pattern::{head, tail};

/// One entry of a `tag=`/`tags=` include option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagFilter {
    /// `name`: keep the region tagged `name`
    Include(String),
    /// `!name`: drop the region tagged `name`
    Exclude(String),
    /// `*`: keep every tagged region
    AllTagged,
    /// `**`: keep every line
    Everything,
    /// `!*`: keep only lines outside any tagged region
    Untagged,
}

impl TagFilter {
    pub(crate) fn parse(tag: &str) -> Self {
        match tag.trim() {
            "**" => Self::Everything,
            "*" => Self::AllTagged,
            "!*" => Self::Untagged,
            tag => match tag.strip_prefix('!') {
                Some(name) => Self::Exclude(name.to_string()),
                None => Self::Include(tag.to_string()),
            },
        }
    }
}

enum Marker<'a> {
    Start(&'a str),
    End(&'a str),
}

/// Find a `tag::name[]` or `end::name[]` marker anywhere on the line, typically inside
/// a comment of the included language.
fn marker(line: &str) -> Option<Marker<'_>> {
    for (keyword, start) in [("tag::", true), ("end::", false)] {
        let Some(at) = line.find(keyword) else {
            continue;
        };
        if head(line, at)
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            continue;
        }
        let rest = tail(line, at + keyword.len());
        let Some((name, _)) = rest.split_once("[]") else {
            continue;
        };
        if name.is_empty() || name.contains(char::is_whitespace) || name.contains(['[', ']']) {
            continue;
        }
        return Some(if start {
            Marker::Start(name)
        } else {
            Marker::End(name)
        });
    }
    None
}

/// The indices of the lines selected by `filters`. Marker lines are never selected.
///
/// Regions may nest: a line is kept when the innermost open region that the filters
/// mention is included, or, when no open region is mentioned, according to the
/// wildcard filters.
pub(crate) fn select_tagged(lines: &[String], filters: &[TagFilter]) -> Vec<usize> {
    let mut included: FxHashSet<&str> = FxHashSet::default();
    let mut excluded: FxHashSet<&str> = FxHashSet::default();
    let mut all_tagged = false;
    let mut untagged = false;
    for filter in filters {
        match filter {
            TagFilter::Include(name) => {
                included.insert(name);
            }
            TagFilter::Exclude(name) => {
                excluded.insert(name);
            }
            TagFilter::AllTagged => all_tagged = true,
            TagFilter::Untagged => untagged = true,
            TagFilter::Everything => {
                all_tagged = true;
                untagged = true;
            }
        }
    }

    let mut open: Vec<&str> = Vec::new();
    let mut selected = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        match marker(line) {
            Some(Marker::Start(name)) => {
                open.push(name);
                continue;
            }
            Some(Marker::End(name)) => {
                if let Some(at) = open.iter().rposition(|open_name| *open_name == name) {
                    open.truncate(at);
                } else {
                    tracing::warn!(tag = %name, "unexpected end of tag region");
                }
                continue;
            }
            None => {}
        }
        let keep = open
            .iter()
            .rev()
            .find_map(|name| {
                if excluded.contains(name) {
                    Some(false)
                } else if included.contains(name) {
                    Some(true)
                } else {
                    None
                }
            })
            .unwrap_or(if open.is_empty() { untagged } else { all_tagged });
        if keep {
            selected.push(index);
        }
    }
    for name in open {
        tracing::warn!(tag = %name, "unclosed tag region");
    }
    selected
}
