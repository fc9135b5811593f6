/// Look up `key` in a raw `a=1&b=2` query string.
///
/// Returns the raw, undecoded value of the first pair whose key matches.
/// Only the first `=` separates key from value, so `a=b=c` yields `b=c`.
/// A matching pair with no `=` or an empty value counts as absent.
pub fn query_variable<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    let query = query.strip_prefix('?').unwrap_or(query);
    query
        .split('&')
        .find_map(|pair| match pair.find('=') {
            Some(eq_pos) if &pair[..eq_pos] == key => Some(Some(&pair[eq_pos + 1..])),
            None if pair == key => Some(None),
            _ => None,
        })
        .flatten()
        .filter(|value| !value.is_empty())
}

/// Decode a frame payload the way a browser hands text to the page.
pub fn lossy_text(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}
