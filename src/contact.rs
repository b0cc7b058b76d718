use serde::{Deserialize, Serialize};

/// Placeholder shown for a contact with no name components set.
pub const NO_NAME: &str = "No Name";
/// Placeholder shown when there is no contact at all.
pub const NO_CONTACT: &str = "null";

/// One labeled identifier attached to a contact, e.g. `Twitter` / `@handle`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entry {
    pub key: String,
    pub value: String,
}

impl Entry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// An entry with a blank value is a deleted or half-typed row.
    pub fn is_complete(&self) -> bool {
        !self.value.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default)]
    pub entries: Vec<Entry>,
}

impl Contact {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_entries(id: impl Into<String>, entries: Vec<Entry>) -> Self {
        Self {
            id: id.into(),
            entries,
            ..Self::default()
        }
    }

    /// Name components in display order, skipping blanks.
    fn name_parts(&self) -> impl Iterator<Item = &str> {
        [
            &self.prefix,
            &self.given_name,
            &self.middle_name,
            &self.family_name,
            &self.suffix,
        ]
        .into_iter()
        .filter_map(|part| part.as_deref())
        .map(str::trim)
        .filter(|part| !part.is_empty())
    }

    /// Full name, `"No Name"` when nothing is set.
    pub fn display_name(&self) -> String {
        let full = self.name_parts().collect::<Vec<_>>().join(" ");
        if full.is_empty() {
            NO_NAME.to_string()
        } else {
            full
        }
    }

    /// The string search matches against: `"{key}:{value} "` per entry in
    /// order, then each identifying text field followed by a space.
    pub fn canonical_text(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.key);
            out.push(':');
            out.push_str(&entry.value);
            out.push(' ');
        }
        let extra = [&self.nickname, &self.organization];
        for part in self
            .name_parts()
            .chain(extra.into_iter().filter_map(|v| v.as_deref()))
        {
            if part.is_empty() {
                continue;
            }
            out.push_str(part);
            out.push(' ');
        }
        out
    }

    /// Drop incomplete entries, returning how many were removed.
    pub fn prune_entries(&mut self) -> usize {
        prune_entries(&mut self.entries)
    }
}

/// Remove entries with a blank value, keeping the order of the rest.
pub fn prune_entries(entries: &mut Vec<Entry>) -> usize {
    let before = entries.len();
    entries.retain(Entry::is_complete);
    before - entries.len()
}

/// Display name for an optional contact.
pub fn format_display_name(contact: Option<&Contact>) -> String {
    match contact {
        Some(contact) => contact.display_name(),
        None => NO_CONTACT.to_string(),
    }
}
