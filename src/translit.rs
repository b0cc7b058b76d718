//! ASCII folding for search.
//!
//! Search tokens are restricted to `[A-Za-z0-9 :]`, so anything typed in a
//! non-Latin script is stripped away entirely. With `search.fold` enabled the
//! query and the contact text are folded to ASCII first, which keeps those
//! contacts reachable (`"Иван"` folds to `"Ivan"`).

use deunicode::deunicode;
use unicode_script::{Script, UnicodeScript};

/// True when every character is ASCII, Latin, or script-neutral (digits,
/// punctuation, combining marks).
pub fn is_all_latin(s: &str) -> bool {
    s.chars().all(|c| {
        c.is_ascii()
            || c.script() == Script::Latin
            || c.script() == Script::Common
            || c.script() == Script::Inherited
    })
}

/// Fold a string to ASCII, collapsing runs of whitespace.
pub fn transliterate(s: &str) -> String {
    let result = deunicode(s);
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fold only when needed. Pure-ASCII input comes back untouched, whitespace
/// included.
pub fn fold(s: &str) -> String {
    if s.is_ascii() {
        return s.to_string();
    }
    if is_all_latin(s) {
        // Accented Latin: strip diacritics without collapsing separators.
        return s
            .chars()
            .map(|c| {
                if c.is_ascii() {
                    c.to_string()
                } else {
                    deunicode(c.encode_utf8(&mut [0; 4]))
                }
            })
            .collect();
    }
    transliterate(s)
}
