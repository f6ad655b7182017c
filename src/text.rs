//! Small string helpers shared by the tokenizer, the decode pipeline and the
//! value modifiers. All of them borrow the input when nothing changes.

use std::borrow::Cow;

use regex::Regex;

/// Decodes backslash escapes: `\t`, `\n`, `\r`, `\\` and `\uXXXX`.
///
/// Unknown or truncated sequences are kept verbatim.
pub fn decode_escapes(input: &str) -> Cow<'_, str> {
    if !input.contains('\\') {
        return Cow::Borrowed(input);
    }
    let mut decoded = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        if ch != '\\' {
            decoded.push(ch);
            continue;
        }
        match chars.peek().map(|(_, next)| *next) {
            Some('t') => {
                decoded.push('\t');
                chars.next();
            }
            Some('n') => {
                decoded.push('\n');
                chars.next();
            }
            Some('r') => {
                decoded.push('\r');
                chars.next();
            }
            Some('\\') => {
                decoded.push('\\');
                chars.next();
            }
            Some('u') => match decode_unicode_at(input, idx + 2) {
                Some(unicode) => {
                    decoded.push(unicode);
                    // consume 'u' plus four hex digits
                    for _ in 0..5 {
                        chars.next();
                    }
                }
                None => decoded.push('\\'),
            },
            _ => decoded.push('\\'),
        }
    }
    Cow::Owned(decoded)
}

fn decode_unicode_at(input: &str, start: usize) -> Option<char> {
    let digits = input.get(start..start + 4)?;
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(digits, 16).ok().and_then(char::from_u32)
}

/// Returns a substring using character indices to stay UTF-8 safe.
pub fn substring(value: &str, start: usize, length: Option<usize>) -> Cow<'_, str> {
    let start_byte = match value.char_indices().nth(start) {
        Some((idx, _)) => idx,
        None => return Cow::Owned(String::new()),
    };
    let end_byte = match length {
        Some(0) => return Cow::Owned(String::new()),
        Some(len) => value[start_byte..]
            .char_indices()
            .nth(len)
            .map(|(idx, _)| start_byte + idx)
            .unwrap_or(value.len()),
        None => value.len(),
    };
    if start_byte == 0 && end_byte == value.len() {
        Cow::Borrowed(value)
    } else {
        Cow::Borrowed(&value[start_byte..end_byte])
    }
}

/// Applies a regex replacement while avoiding allocation when there are no matches.
pub fn regex_replace<'a>(value: &'a str, regex: &Regex, replacement: &str) -> Cow<'a, str> {
    if regex.is_match(value) {
        Cow::Owned(regex.replace_all(value, replacement).into_owned())
    } else {
        Cow::Borrowed(value)
    }
}

/// Renders a delimiter so control characters stay visible in logs.
pub fn printable_delimiter(delimiter: &str) -> String {
    delimiter
        .chars()
        .map(|c| match c {
            '\t' => "\\t".to_string(),
            '\n' => "\\n".to_string(),
            '\r' => "\\r".to_string(),
            other => other.to_string(),
        })
        .collect()
}
