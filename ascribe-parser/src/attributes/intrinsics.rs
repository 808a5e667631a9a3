use crate::error::Error;

/// Look up an intrinsic (character replacement) attribute.
///
/// Intrinsics are consulted after the document's own attributes, so a document can
/// shadow any of them.
///
/// # Errors
///
/// Returns [`Error::UnknownIntrinsic`] if `name` is not an intrinsic.
pub fn intrinsic(name: &str) -> Result<&'static str, Error> {
    Ok(match name {
        "startsb" => "[",
        "endsb" => "]",
        "vbar" => "|",
        "caret" => "^",
        "asterisk" => "*",
        "tilde" => "~",
        "plus" => "&#43;",
        "apostrophe" => "'",
        "backslash" => "\\",
        "backtick" => "`",
        "empty" => "",
        "sp" | "space" => " ",
        "two-colons" => "::",
        "two-semicolons" => ";;",
        "nbsp" => "&#160;",
        "deg" => "&#176;",
        "zwsp" => "&#8203;",
        "quot" => "&#34;",
        "apos" => "&#39;",
        "lsquo" => "&#8216;",
        "rsquo" => "&#8217;",
        "ldquo" => "&#8220;",
        "rdquo" => "&#8221;",
        "wj" => "&#8288;",
        "brvbar" => "&#166;",
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        unknown => return Err(Error::UnknownIntrinsic(unknown.to_string())),
    })
}
