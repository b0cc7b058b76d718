//! Label ranking and key inference.
//!
//! Labels are the `key` half of an [`Entry`]. The index counts how often each
//! key is used across the whole address book and offers the most common ones
//! first when a contact is being edited.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use sha1::{Digest, Sha1};

use crate::contact::Entry;

/// Display categories a label is bucketed into for color-coding.
pub const CATEGORIES: [&str; 6] = ["red", "orange", "yellow", "green", "blue", "purple"];

pub const KEY_EMAIL: &str = "Email";
pub const KEY_PHONE: &str = "Phone";
pub const KEY_WEBSITE: &str = "Website";
pub const KEY_HANDLE: &str = "Handle";
pub const KEY_OTHER: &str = "Other";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub value: String,
    pub description: String,
}

impl Suggestion {
    pub fn for_key(key: &str) -> Self {
        Self {
            value: key.to_string(),
            description: category(key).to_string(),
        }
    }
}

/// Stable bucket for `key`. SHA-1 rather than `DefaultHasher`, whose output is
/// allowed to change between Rust releases.
pub fn category(key: &str) -> &'static str {
    let digest = Sha1::digest(key.as_bytes());
    CATEGORIES[digest[0] as usize % CATEGORIES.len()]
}

#[derive(Debug, Clone)]
struct LabelStat {
    key: String,
    count: usize,
    /// Number of values under this key that look like `@handle`.
    handle_values: usize,
}

/// Frequency table over every entry key in the address book.
#[derive(Debug, Clone, Default)]
pub struct LabelIndex {
    /// Descending by count; ties keep first-seen order.
    ranked: Vec<LabelStat>,
}

impl LabelIndex {
    pub fn build<'a, I, E>(all_entries: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: IntoIterator<Item = &'a Entry>,
    {
        let mut positions: HashMap<&'a str, usize> = HashMap::new();
        let mut stats: Vec<LabelStat> = Vec::new();

        for entries in all_entries {
            for entry in entries {
                let idx = *positions.entry(entry.key.as_str()).or_insert_with(|| {
                    stats.push(LabelStat {
                        key: entry.key.clone(),
                        count: 0,
                        handle_values: 0,
                    });
                    stats.len() - 1
                });
                let stat = &mut stats[idx];
                stat.count += 1;
                if is_handle(&entry.value) {
                    stat.handle_values += 1;
                }
            }
        }

        // sort_by is stable, so equal counts stay in first-seen order.
        stats.sort_by(|a, b| b.count.cmp(&a.count));
        Self { ranked: stats }
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn count(&self, key: &str) -> usize {
        self.ranked
            .iter()
            .find(|s| s.key == key)
            .map(|s| s.count)
            .unwrap_or(0)
    }

    /// Keys with their counts, most used first.
    pub fn counts(&self) -> impl Iterator<Item = (&str, usize)> {
        self.ranked.iter().map(|s| (s.key.as_str(), s.count))
    }

    pub fn ranked(&self) -> Vec<Suggestion> {
        self.ranked.iter().map(|s| Suggestion::for_key(&s.key)).collect()
    }

    /// Ranked labels minus the ones `existing` already uses.
    pub fn suggest_for(&self, existing: &[Entry]) -> Vec<Suggestion> {
        let used: HashSet<&str> = existing.iter().map(|e| e.key.as_str()).collect();
        self.ranked
            .iter()
            .filter(|s| !used.contains(s.key.as_str()))
            .map(|s| Suggestion::for_key(&s.key))
            .collect()
    }

    /// Guess a key for `value`, preferring labels the user already uses.
    pub fn infer_key(&self, value: &str) -> String {
        let value = value.trim();

        if let Some(host) = url_host(value) {
            let host = host.to_ascii_lowercase();
            let known = self.ranked.iter().find(|s| {
                let key = s.key.to_ascii_lowercase();
                !key.is_empty() && host.contains(key.as_str())
            });
            if let Some(stat) = known {
                return stat.key.clone();
            }
        }

        if is_handle(value) {
            // ranked is already ordered by usage
            if let Some(stat) = self.ranked.iter().find(|s| s.handle_values > 0) {
                return stat.key.clone();
            }
        }

        suggest_key(value)
    }
}

/// Labels in descending frequency across all contacts.
pub fn rank_labels(all_entries: &[Vec<Entry>]) -> Vec<Suggestion> {
    LabelIndex::build(all_entries).ranked()
}

/// [`rank_labels`] without the keys one contact already has.
pub fn suggest_labels(all_entries: &[Vec<Entry>], existing: &[Entry]) -> Vec<Suggestion> {
    LabelIndex::build(all_entries).suggest_for(existing)
}

/// Infer a key from a raw value.
///
/// Rules are tried top to bottom:
///
/// | value                                  | key       |
/// |----------------------------------------|-----------|
/// | `http://`, `https://`, `www.` prefix   | `Website` |
/// | `local@domain.tld`                     | `Email`   |
/// | 7-15 digits, phone punctuation allowed, not a `yyyy-mm-dd` / `dd-mm-yyyy` date | `Phone`   |
/// | `@name`                                | `Handle`  |
/// | anything else                          | `Other`   |
pub fn suggest_key(value: &str) -> String {
    let value = value.trim();
    let key = if url_host(value).is_some() {
        KEY_WEBSITE
    } else if is_email(value) {
        KEY_EMAIL
    } else if is_phone(value) {
        KEY_PHONE
    } else if is_handle(value) {
        KEY_HANDLE
    } else {
        KEY_OTHER
    };
    key.to_string()
}

fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || value.chars().any(char::is_whitespace) || domain.contains('@') {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty() && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
}

fn is_phone(value: &str) -> bool {
    let mut digits = 0;
    for (i, c) in value.chars().enumerate() {
        match c {
            '0'..='9' => digits += 1,
            '+' if i == 0 => {}
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return false,
        }
    }
    (7..=15).contains(&digits) && !is_date(value)
}

/// Three digit groups split by `-` or `.`, shaped 4-2-2 or 2-2-4.
fn is_date(value: &str) -> bool {
    let groups: Vec<&str> = value.split(['-', '.']).collect();
    let [a, b, c] = groups.as_slice() else {
        return false;
    };
    if !groups
        .iter()
        .all(|g| !g.is_empty() && g.chars().all(|ch| ch.is_ascii_digit()))
    {
        return false;
    }
    matches!((a.len(), b.len(), c.len()), (4, 2, 2) | (2, 2, 4))
}

fn is_handle(value: &str) -> bool {
    let Some(rest) = value.strip_prefix('@') else {
        return false;
    };
    !rest.is_empty()
        && !rest.contains('@')
        && rest
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

fn url_host(value: &str) -> Option<&str> {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"))
        .or_else(|| value.strip_prefix("www.").map(|_| value))?;
    let rest = rest.strip_prefix("www.").unwrap_or(rest);
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() || value.chars().any(char::is_whitespace) {
        None
    } else {
        Some(host)
    }
}
