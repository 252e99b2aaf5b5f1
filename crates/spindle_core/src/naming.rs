//! Display names derived from method identifiers.

/// Derive a human-readable display name from a method identifier.
///
/// ## Rules
/// - every `_` becomes a space;
/// - every `\uXXXX` escape (a backslash, a lowercase `u`, exactly four hex digits of either case) becomes the
///   character it encodes; an unpaired surrogate becomes U+FFFD;
/// - everything else is copied unchanged, so identifiers without underscores or escapes are returned as-is.
///
/// ## Examples
/// ```rust
/// use spindle_core::display_name;
/// assert_eq!(display_name("Foo_Bar"), "Foo Bar");
/// let escaped = format!("Test{}u0041B", '\\');
/// assert_eq!(display_name(&escaped), "TestAB");
/// assert_eq!(display_name("Plain"), "Plain");
/// ```
pub fn display_name(identifier: &str) -> String {
    let mut out = String::with_capacity(identifier.len());
    let mut rest = identifier;

    while let Some(ch) = rest.chars().next() {
        if ch == '_' {
            out.push(' ');
            rest = &rest[1..];
            continue;
        }
        if let Some(decoded) = decode_escape(rest) {
            out.push(decoded);
            rest = &rest[6..];
            continue;
        }
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }

    out
}

/// Decode a `\uXXXX` escape at the start of `s`.
fn decode_escape(s: &str) -> Option<char> {
    let bytes = s.as_bytes();
    if bytes.len() < 6 || bytes[0] != b'\\' || bytes[1] != b'u' {
        return None;
    }
    let digits = &bytes[2..6];
    if !digits.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    // All four bytes are ASCII hex digits, so the slice is valid UTF-8 and in range.
    let code = u32::from_str_radix(&s[2..6], 16).ok()?;
    Some(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
}
