/// Escape `<`, `>` and `&`.
///
/// An `&` that already starts a character reference (`&lt;`, `&#169;`, `&#x2014;`) is
/// left alone, so escaping escaped text changes nothing.
pub(crate) fn escape_special_chars(text: &str) -> String {
    if !text.contains(['<', '>', '&']) {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for (index, c) in text.char_indices() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' if text.get(index + 1..).is_some_and(starts_entity) => out.push('&'),
            '&' => out.push_str("&amp;"),
            c => out.push(c),
        }
    }
    out
}

/// Whether `rest` (the text after an `&`) is the body of a character reference:
/// a name of two or more letters, `#` and 2-4 digits, or `#x` and 2-4 hex digits,
/// terminated by `;`.
pub(crate) fn starts_entity(rest: &str) -> bool {
    let Some(body) = rest.find(';').and_then(|end| rest.get(..end)) else {
        return false;
    };
    if let Some(hex) = body.strip_prefix("#x") {
        (2..=4).contains(&hex.len()) && hex.chars().all(|c| c.is_ascii_hexdigit())
    } else if let Some(digits) = body.strip_prefix('#') {
        (2..=4).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
    } else {
        body.len() >= 2 && body.chars().all(|c| c.is_ascii_alphabetic())
    }
}
