/// The attributes between the brackets of a block attribute line (`[quote, Author]`)
/// or an inline macro (`image:logo.png[Logo, 64]`).
///
/// Entries are either positional (`quote`) or named (`width=64`). Values may be wrapped
/// in double or single quotes, which protects commas and `=`; a backslash escapes the
/// quote character inside such a value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeList {
    positional: Vec<String>,
    named: Vec<(String, String)>,
}

impl AttributeList {
    #[tracing::instrument(level = "trace")]
    pub fn parse(source: &str) -> Self {
        let mut list = Self::default();
        let chars: Vec<char> = source.chars().collect();
        let mut position = 0;
        skip_blanks(&chars, &mut position);
        if position >= chars.len() {
            return list;
        }
        loop {
            list.parse_entry(&chars, &mut position);
            skip_blanks(&chars, &mut position);
            match chars.get(position) {
                Some(',') => {
                    position += 1;
                    skip_blanks(&chars, &mut position);
                    if position >= chars.len() {
                        list.positional.push(String::new());
                        break;
                    }
                }
                Some(_) => {
                    // stray characters after a quoted value belong to no entry
                    while chars.get(position).is_some_and(|c| *c != ',') {
                        position += 1;
                    }
                    if position >= chars.len() {
                        break;
                    }
                }
                None => break,
            }
        }
        list
    }

    fn parse_entry(&mut self, chars: &[char], position: &mut usize) {
        if let Some(quote @ ('"' | '\'')) = chars.get(*position).copied()
            && let Some(value) = scan_quoted(chars, position, quote)
        {
            self.positional.push(value);
            return;
        }
        let start = *position;
        while chars.get(*position).is_some_and(|c| !matches!(c, '=' | ',')) {
            *position += 1;
        }
        let name: String = chars
            .get(start..*position)
            .map(|slice| slice.iter().collect::<String>())
            .unwrap_or_default()
            .trim()
            .to_string();
        if chars.get(*position) != Some(&'=') {
            self.positional.push(name);
            return;
        }
        *position += 1;
        skip_blanks(chars, position);
        let value = match chars.get(*position).copied() {
            Some(quote @ ('"' | '\'')) => scan_quoted(chars, position, quote),
            Some(_) | None => None,
        };
        let value = value.unwrap_or_else(|| {
            let start = *position;
            while chars.get(*position).is_some_and(|c| *c != ',') {
                *position += 1;
            }
            chars
                .get(start..*position)
                .map(|slice| slice.iter().collect::<String>())
                .unwrap_or_default()
                .trim()
                .to_string()
        });
        self.named.push((name.to_lowercase(), value));
    }

    /// The positional entry at `index` (0-based). Empty entries count as absent.
    #[must_use]
    pub fn positional(&self, index: usize) -> Option<&str> {
        self.positional
            .get(index)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    #[must_use]
    pub fn positionals(&self) -> &[String] {
        &self.positional
    }

    /// The last value given for `name`.
    #[must_use]
    pub fn named(&self, name: &str) -> Option<&str> {
        self.named
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn named_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.named
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// A named entry, falling back to the positional entry at `index`.
    #[must_use]
    pub fn named_or_positional(&self, name: &str, index: usize) -> Option<&str> {
        self.named(name).or_else(|| self.positional(index))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positional.iter().all(String::is_empty) && self.named.is_empty()
    }
}

fn skip_blanks(chars: &[char], position: &mut usize) {
    while chars.get(*position).is_some_and(|c| matches!(c, ' ' | '\t')) {
        *position += 1;
    }
}

/// Scan a quoted value starting at the opening quote. Leaves `position` untouched and
/// returns `None` if the quote is never closed.
fn scan_quoted(chars: &[char], position: &mut usize, quote: char) -> Option<String> {
    let mut cursor = *position + 1;
    let mut value = String::new();
    loop {
        match chars.get(cursor).copied() {
            None => return None,
            Some('\\') if chars.get(cursor + 1) == Some(&quote) => {
                value.push(quote);
                cursor += 2;
            }
            Some(c) if c == quote => {
                *position = cursor + 1;
                return Some(value);
            }
            Some(c) => {
                value.push(c);
                cursor += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_positional_and_named() {
        let list = AttributeList::parse("quote, Abraham Lincoln, role=famous");
        assert_eq!(list.positional(0), Some("quote"));
        assert_eq!(list.positional(1), Some("Abraham Lincoln"));
        assert_eq!(list.named("role"), Some("famous"));
        assert_eq!(list.positional(2), None);
    }

    #[test]
    fn test_quoted_values_protect_commas() {
        let list = AttributeList::parse(r#""Hello, world", title="A \"quoted\" title", alt='x,y'"#);
        assert_eq!(list.positional(0), Some("Hello, world"));
        assert_eq!(list.named("title"), Some(r#"A "quoted" title"#));
        assert_eq!(list.named("alt"), Some("x,y"));
    }

    #[test]
    fn test_empty_positionals_keep_their_index() {
        let list = AttributeList::parse(", 200");
        assert_eq!(list.positional(0), None);
        assert_eq!(list.positional(1), Some("200"));
        assert_eq!(list.named_or_positional("width", 1), Some("200"));
    }

    #[test]
    fn test_empty_list() {
        assert!(AttributeList::parse("").is_empty());
        assert!(AttributeList::parse("   ").is_empty());
    }

    #[test]
    fn test_unterminated_quote_is_plain_text() {
        let list = AttributeList::parse(r#""open, close"#);
        assert_eq!(list.positional(0), Some("\"open"));
        assert_eq!(list.positional(1), Some("close"));
    }
}
