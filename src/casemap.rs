//! IRC case-mapping functions.
//!
//! IRC uses a special case-insensitive comparison where some characters
//! are considered equivalent (e.g., `[` and `{`). This implements the
//! `rfc1459` case mapping which is the most common. Channel and nickname
//! map keys in this crate are normalized to IRC uppercase.

/// Convert a string to IRC uppercase using RFC 1459 case mapping.
///
/// In addition to ASCII uppercase conversion, this maps:
/// - `{` → `[`
/// - `}` → `]`
/// - `|` → `\`
/// - `^` → `~`
pub fn irc_to_upper(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '{' => '[',
            '}' => ']',
            '|' => '\\',
            '^' => '~',

            'a'..='z' => c.to_ascii_uppercase(),

            _ => c,
        })
        .collect()
}

/// Compare two strings using IRC case-insensitive comparison.
///
/// Uses the RFC 1459 case mapping where certain characters are equivalent.
pub fn irc_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.chars().zip(b.chars()).all(|(ca, cb)| {
        let ca_upper = match ca {
            '{' => '[',
            '}' => ']',
            '|' => '\\',
            '^' => '~',
            'a'..='z' => ca.to_ascii_uppercase(),
            _ => ca,
        };
        let cb_upper = match cb {
            '{' => '[',
            '}' => ']',
            '|' => '\\',
            '^' => '~',
            'a'..='z' => cb.to_ascii_uppercase(),
            _ => cb,
        };
        ca_upper == cb_upper
    })
}
