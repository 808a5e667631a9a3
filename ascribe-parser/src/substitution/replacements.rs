use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::quotes::{is_word_char, next_boundary};
use crate::pattern::{compile, slice, tail};

/// What survives of the match besides the replacement text.
#[derive(Debug, Clone, Copy)]
enum Restore {
    /// The whole match is replaced.
    None,
    /// Group 1 (the character in front of the trigger) is kept.
    Leading,
    /// Groups 1 and 2 surround the replacement.
    Bounding,
}

#[derive(Debug)]
struct Replacement {
    pattern: Regex,
    replacement: &'static str,
    restore: Restore,
    /// Checked against the character after the match, standing in for a lookahead.
    followed_by: Option<fn(Option<char>) -> bool>,
}

fn replacement(
    pattern: &str,
    replacement: &'static str,
    restore: Restore,
    followed_by: Option<fn(Option<char>) -> bool>,
) -> Replacement {
    Replacement {
        pattern: compile(pattern),
        replacement,
        restore,
        followed_by,
    }
}

/// Order matters: the arrows need the escaped `&gt;`/`&lt;` forms and must run before
/// entity restoration.
static REPLACEMENTS: LazyLock<Vec<Replacement>> = LazyLock::new(|| {
    vec![
        replacement(r"\\?\(C\)", "&#169;", Restore::None, None),
        replacement(r"\\?\(R\)", "&#174;", Restore::None, None),
        replacement(r"\\?\(TM\)", "&#8482;", Restore::None, None),
        // spaced em-dash
        replacement(
            r"(?m)(^|\n| |\\)--( |\n|$)",
            "&#8201;&#8212;&#8201;",
            Restore::None,
            None,
        ),
        // word--word
        replacement(
            r"(\w)\\?--",
            "&#8212;",
            Restore::Leading,
            Some(|next| next.is_some_and(is_word_char)),
        ),
        replacement(r"\\?\.\.\.", "&#8230;", Restore::None, None),
        // apostrophe
        replacement(
            r"(\p{Alphabetic})\\?'",
            "&#8217;",
            Restore::Leading,
            Some(|next| next != Some('\'')),
        ),
        replacement(r"\\?-&gt;", "&#8594;", Restore::None, None),
        replacement(r"\\?=&gt;", "&#8658;", Restore::None, None),
        replacement(r"\\?&lt;-", "&#8592;", Restore::None, None),
        replacement(r"\\?&lt;=", "&#8656;", Restore::None, None),
        // restore entities escaped by the special characters pass
        replacement(
            r"\\?(&)amp;((?:[a-zA-Z]+|#\d{2,4}|#x[a-fA-F0-9]{2,4});)",
            "",
            Restore::Bounding,
            None,
        ),
    ]
});

pub(crate) fn substitute(text: &str) -> String {
    let mut text = text.to_string();
    for rule in REPLACEMENTS.iter() {
        text = apply(&text, rule);
    }
    text
}

fn apply(text: &str, rule: &Replacement) -> String {
    let mut out = String::new();
    let mut copied = 0;
    let mut search = 0;
    while search < text.len() {
        let Some(captures) = rule.pattern.captures_at(text, search) else {
            break;
        };
        let Some(whole) = captures.get(0) else {
            break;
        };
        if let Some(followed_by) = rule.followed_by
            && !followed_by(tail(text, whole.end()).chars().next())
        {
            search = next_boundary(text, whole.start());
            continue;
        }
        out.push_str(slice(text, copied, whole.start()));
        out.push_str(&render(&captures, rule));
        copied = whole.end();
        search = whole.end().max(next_boundary(text, whole.start()));
    }
    if copied == 0 {
        return text.to_string();
    }
    out.push_str(tail(text, copied));
    out
}

fn render(captures: &Captures<'_>, rule: &Replacement) -> String {
    let group = |index| captures.get(index).map_or("", |m| m.as_str());
    let matched = group(0);
    // an escaped trigger is kept as written, minus the escape
    if matched.contains('\\') {
        return matched.replace('\\', "");
    }
    match rule.restore {
        Restore::None => rule.replacement.to_string(),
        Restore::Leading => format!("{}{}", group(1), rule.replacement),
        Restore::Bounding => format!("{}{}{}", group(1), rule.replacement, group(2)),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("(C) 2024", "&#169; 2024")]
    #[case("Acme(TM) and (R)", "Acme&#8482; and &#174;")]
    #[case("a -- b", "a&#8201;&#8212;&#8201;b")]
    #[case("self--contained", "self&#8212;contained")]
    #[case("trailing--", "trailing--")]
    #[case("wait...", "wait&#8230;")]
    #[case("it's", "it&#8217;s")]
    #[case("''", "''")]
    #[case("a -&gt; b =&gt; c &lt;- d &lt;= e", "a &#8594; b &#8658; c &#8592; d &#8656; e")]
    #[case("&amp;copy; &amp;#169;", "&copy; &#169;")]
    fn test_replacements(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(substitute(input), expected);
    }

    #[rstest]
    #[case(r"\(C)", "(C)")]
    #[case(r"\...", "...")]
    #[case(r"foo\--bar", "foo--bar")]
    #[case(r"\&amp;copy;", "&amp;copy;")]
    fn test_escaped_replacements(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(substitute(input), expected);
    }
}
