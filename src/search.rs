use crate::contact::Contact;
use crate::translit;

/// How query tokens decide whether a contact is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchMode {
    /// Keep a contact when every token occurs in its text.
    #[default]
    Include,
    /// Keep a contact when no token occurs in its text.
    Exclude,
}

impl MatchMode {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "include" => Some(MatchMode::Include),
            "exclude" => Some(MatchMode::Exclude),
            _ => None,
        }
    }
}

/// Lowercase text for case-insensitive matching.
pub fn normalize(s: &str) -> String {
    s.to_lowercase()
}

/// Normalize with ASCII folding: `"Renée"` becomes `"renee"`.
pub fn normalize_folded(s: &str) -> String {
    translit::fold(s).to_lowercase()
}

/// Strip everything outside `[A-Za-z0-9 :]`.
pub fn sanitize_query(query: &str) -> String {
    query
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ' || *c == ':')
        .collect()
}

/// Sanitized, lowercased tokens; empty when the query carries nothing
/// searchable.
pub fn tokenize(query: &str) -> Vec<String> {
    split_tokens(&sanitize_query(query))
}

/// Like [`tokenize`], but folds the query to ASCII before sanitizing so
/// accented and non-Latin words survive.
pub fn tokenize_folded(query: &str) -> Vec<String> {
    split_tokens(&sanitize_query(&translit::fold(query)))
}

fn split_tokens(sanitized: &str) -> Vec<String> {
    sanitized
        .split_whitespace()
        .map(str::to_lowercase)
        .collect()
}

/// A parsed query, ready to test contacts against.
#[derive(Debug, Clone)]
pub struct Matcher {
    tokens: Vec<String>,
    mode: MatchMode,
    fold: bool,
}

impl Matcher {
    /// `None` when the query has no tokens, in which case every contact passes.
    ///
    /// `fold` only applies to [`MatchMode::Include`]; exclusion always
    /// compares the raw text.
    pub fn new(query: &str, mode: MatchMode, fold: bool) -> Option<Self> {
        let fold = fold && mode == MatchMode::Include;
        let tokens = if fold {
            tokenize_folded(query)
        } else {
            tokenize(query)
        };
        if tokens.is_empty() {
            return None;
        }
        Some(Self { tokens, mode, fold })
    }

    pub fn matches(&self, contact: &Contact) -> bool {
        let text = contact.canonical_text();
        let haystack = if self.fold {
            normalize_folded(&text)
        } else {
            normalize(&text)
        };
        let tokens = &self.tokens;
        match self.mode {
            MatchMode::Include => tokens.iter().all(|t| haystack.contains(t.as_str())),
            MatchMode::Exclude => !tokens.iter().any(|t| haystack.contains(t.as_str())),
        }
    }
}

/// Whether a single contact passes `query`.
pub fn matches(contact: &Contact, query: &str, mode: MatchMode) -> bool {
    Matcher::new(query, mode, false).map_or(true, |m| m.matches(contact))
}

/// Filter `contacts` by `query`, preserving input order.
pub fn filter<'a>(query: &str, contacts: &'a [Contact], mode: MatchMode) -> Vec<&'a Contact> {
    filter_with(query, contacts, mode, false)
}

/// [`filter`] with optional ASCII folding of query and contact text.
pub fn filter_with<'a>(
    query: &str,
    contacts: &'a [Contact],
    mode: MatchMode,
    fold: bool,
) -> Vec<&'a Contact> {
    if query.trim().is_empty() {
        return contacts.iter().collect();
    }
    match Matcher::new(query, mode, fold) {
        Some(matcher) => contacts.iter().filter(|c| matcher.matches(c)).collect(),
        None => contacts.iter().collect(),
    }
}

/// Owned variant of [`filter`].
pub fn search(query: &str, contacts: &[Contact], mode: MatchMode) -> Vec<Contact> {
    filter(query, contacts, mode).into_iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::Entry;

    fn sample() -> Vec<Contact> {
        vec![
            Contact::with_entries("a", vec![Entry::new("Twitter", "@a")]),
            Contact::with_entries("b", vec![Entry::new("Email", "b@x.com")]),
        ]
    }

    fn ids(found: &[Contact]) -> Vec<&str> {
        found.iter().map(|c| c.id.as_str()).collect()
    }

    fn ref_ids<'a>(found: &[&'a Contact]) -> Vec<&'a str> {
        found.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn empty_query_returns_input_unchanged() {
        let contacts = sample();
        for mode in [MatchMode::Include, MatchMode::Exclude] {
            assert_eq!(search("", &contacts, mode), contacts);
            assert_eq!(search("   ", &contacts, mode), contacts);
        }
    }

    #[test]
    fn query_of_only_punctuation_returns_input() {
        let contacts = sample();
        assert_eq!(search("!!@@", &contacts, MatchMode::Include), contacts);
    }

    #[test]
    fn include_keeps_contacts_with_every_token() {
        let contacts = sample();
        assert_eq!(ids(&search("twitter", &contacts, MatchMode::Include)), ["a"]);
        assert_eq!(ids(&search("EMAIL xcom", &contacts, MatchMode::Include)), Vec::<&str>::new());
        assert_eq!(ids(&search("email x", &contacts, MatchMode::Include)), ["b"]);
    }

    #[test]
    fn exclude_keeps_contacts_with_no_token() {
        let contacts = sample();
        assert_eq!(ids(&search("twitter", &contacts, MatchMode::Exclude)), ["b"]);
        assert_eq!(ids(&search("twitter email", &contacts, MatchMode::Exclude)), Vec::<&str>::new());
        assert_eq!(ids(&search("zzz", &contacts, MatchMode::Exclude)), ["a", "b"]);
    }

    #[test]
    fn every_result_satisfies_its_mode() {
        let contacts = vec![
            Contact::with_entries("a", vec![Entry::new("Twitter", "@alice")]),
            Contact::with_entries("b", vec![Entry::new("GitHub", "bob")]),
            Contact::with_entries("c", vec![Entry::new("Twitter", "@carol"), Entry::new("GitHub", "c")]),
        ];
        let query = "twitter git";
        let tokens = tokenize(query);

        for c in search(query, &contacts, MatchMode::Include) {
            let text = normalize(&c.canonical_text());
            assert!(tokens.iter().all(|t| text.contains(t.as_str())));
        }
        for c in search(query, &contacts, MatchMode::Exclude) {
            let text = normalize(&c.canonical_text());
            assert!(tokens.iter().all(|t| !text.contains(t.as_str())));
        }
    }

    #[test]
    fn colon_tokens_match_key_value_pairs() {
        let contacts = vec![
            Contact::with_entries("a", vec![Entry::new("Twitter", "ada")]),
            Contact::with_entries("b", vec![Entry::new("Mastodon", "twitter")]),
        ];
        assert_eq!(ids(&search("twitter:ada", &contacts, MatchMode::Include)), ["a"]);
    }

    #[test]
    fn sanitize_strips_disallowed_characters() {
        assert_eq!(sanitize_query("b@x.com, hi!"), "bxcom hi");
        assert_eq!(tokenize("  Twitter:  @A  "), ["twitter:", "a"]);
    }

    fn named(id: &str, given: &str) -> Contact {
        Contact {
            given_name: Some(given.into()),
            ..Contact::new(id)
        }
    }

    #[test]
    fn non_ascii_is_stripped_from_queries() {
        assert_eq!(tokenize("Renée Иван"), ["rene"]);
        assert!(tokenize("Иван").is_empty());

        let contacts = vec![named("bob", "Bob")];
        assert_eq!(ids(&search("Иван", &contacts, MatchMode::Include)), ["bob"]);
        assert_eq!(ids(&search("Иван", &contacts, MatchMode::Exclude)), ["bob"]);
    }

    #[test]
    fn accented_text_is_not_folded_by_default() {
        let contacts = vec![named("renee", "Renée")];
        assert_eq!(ids(&search("Renée", &contacts, MatchMode::Exclude)), ["renee"]);
        assert!(search("Renée", &contacts, MatchMode::Include).is_empty());
    }

    #[test]
    fn folding_makes_non_latin_names_searchable() {
        assert_eq!(tokenize_folded("Renée Иван"), ["renee", "ivan"]);

        let contacts = vec![named("ivan", "Иван"), named("renee", "Renée"), named("bob", "Bob")];
        let found = filter_with("Иван", &contacts, MatchMode::Include, true);
        assert_eq!(ref_ids(&found), ["ivan"]);
        let found = filter_with("renee", &contacts, MatchMode::Include, true);
        assert_eq!(ref_ids(&found), ["renee"]);
    }

    #[test]
    fn folding_never_applies_to_exclude() {
        let contacts = vec![named("renee", "Renée"), named("bob", "Bob")];
        let found = filter_with("Renée", &contacts, MatchMode::Exclude, true);
        assert_eq!(ref_ids(&found), ["renee", "bob"]);
        assert_eq!(filter_with("Иван", &contacts, MatchMode::Exclude, true).len(), 2);
    }

    #[test]
    fn search_does_not_mutate_or_reorder() {
        let contacts = vec![
            Contact::with_entries("z", vec![Entry::new("Twitter", "@z")]),
            Contact::with_entries("a", vec![Entry::new("Twitter", "@a")]),
        ];
        let before = contacts.clone();
        assert_eq!(ids(&search("twitter", &contacts, MatchMode::Include)), ["z", "a"]);
        assert_eq!(contacts, before);
    }

    #[test]
    fn matches_single_contact() {
        let contact = Contact::with_entries("a", vec![Entry::new("Twitter", "@a")]);
        assert!(matches(&contact, "TWITTER", MatchMode::Include));
        assert!(!matches(&contact, "twitter", MatchMode::Exclude));
        assert!(matches(&contact, "", MatchMode::Exclude));
    }
}
