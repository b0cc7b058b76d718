//! Application state.
//!
//! `App` owns the in-memory contact list, the navigation session and the store.
//! Every mutation goes through its methods, which take `&mut self`, so at most
//! one change is in flight at a time and changes apply in call order. Store
//! writes are optimistic: the local list is updated first and restored when the
//! store rejects the write.

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, error, warn};

use crate::config::{Config, ContactOrder};
use crate::contact::Contact;
use crate::nav::{EditorInput, EditorPane, NavError, NavEvent, NavigationSession, Page};
use crate::search::{self, MatchMode};
use crate::store::{ContactStore, StoreError};
use crate::suggest::{LabelIndex, Suggestion};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Warning,
    Error,
}

/// A non-fatal, user-visible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        write!(f, "{}: {}", level, self.message)
    }
}

/// What happened to an editor's changes when it was closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Commit {
    Unchanged,
    Saved,
    RolledBack(StoreError),
}

pub struct App<S: ContactStore> {
    store: S,
    contacts: Vec<Contact>,
    labels: LabelIndex,
    nav: NavigationSession,
    order: ContactOrder,
    mode: MatchMode,
    fold: bool,
    notices: Vec<Notice>,
}

impl<S: ContactStore> App<S> {
    pub fn new(store: S, config: &Config) -> Self {
        let mut app = Self::with_options(store, config.order, config.search.mode);
        app.fold = config.search.fold;
        app
    }

    pub fn with_options(store: S, order: ContactOrder, mode: MatchMode) -> Self {
        Self {
            store,
            contacts: Vec::new(),
            labels: LabelIndex::default(),
            nav: NavigationSession::new(),
            order,
            mode,
            fold: false,
            notices: Vec::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn contact(&self, id: &str) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.id == id)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.contacts.iter().position(|c| c.id == id)
    }

    pub fn labels(&self) -> &LabelIndex {
        &self.labels
    }

    pub fn navigation(&self) -> &NavigationSession {
        &self.nav
    }

    pub fn active_page(&self) -> Page {
        self.nav.active_page()
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: MatchMode) {
        self.mode = mode;
    }

    /// Fold accented and non-Latin text to ASCII when searching. Has no effect
    /// in [`MatchMode::Exclude`].
    pub fn set_fold(&mut self, fold: bool) {
        self.fold = fold;
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&NavEvent) + 'static) {
        self.nav.subscribe(observer);
    }

    pub fn display_name(&self, contact: Option<&Contact>) -> String {
        self.store.format_display_name(contact)
    }

    /// Drain pending notices, oldest first.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn notice(&mut self, level: NoticeLevel, message: String) {
        match level {
            NoticeLevel::Warning => warn!("{}", message),
            NoticeLevel::Error => error!("{}", message),
        }
        self.notices.push(Notice { level, message });
    }

    fn reindex_labels(&mut self) {
        self.labels = LabelIndex::build(self.contacts.iter().map(|c| &c.entries));
    }

    /// Replace the contact list from the store. A failed read leaves an empty
    /// list and a warning; it is never fatal.
    pub async fn load(&mut self) -> usize {
        match self.store.enumerate().await {
            Ok(mut contacts) => {
                if self.order == ContactOrder::NewestFirst {
                    contacts.reverse();
                }
                self.contacts = contacts;
            }
            Err(err) => {
                self.contacts.clear();
                self.notice(NoticeLevel::Warning, err.to_string());
            }
        }
        let contacts = &self.contacts;
        self.nav
            .retain_contacts(|id| contacts.iter().any(|c| c.id == id));
        self.reindex_labels();
        debug!(count = self.contacts.len(), "contacts loaded");
        self.contacts.len()
    }

    /// Contacts passing `query` under the current match mode.
    pub fn search(&self, query: &str) -> Vec<&Contact> {
        search::filter_with(query, &self.contacts, self.mode, self.fold)
    }

    pub fn rank_labels(&self) -> Vec<Suggestion> {
        self.labels.ranked()
    }

    /// Labels to offer in the editor at `index`.
    pub fn suggestions_for(&self, index: usize) -> Result<Vec<Suggestion>, NavError> {
        self.nav
            .editor(index)
            .map(|editor| editor.suggestions(&self.labels))
            .ok_or(NavError::IndexOutOfRange {
                index,
                len: self.nav.len(),
            })
    }

    pub fn infer_key(&self, value: &str) -> String {
        self.labels.infer_key(value)
    }

    /// Create a blank contact and open an editor for it.
    pub async fn open_new_editor(&mut self) -> Result<usize, StoreError> {
        let contact = match self.store.create().await {
            Ok(contact) => contact,
            Err(err) => {
                self.notice(NoticeLevel::Error, format!("could not create contact: {}", err));
                return Err(err);
            }
        };
        // The contact is listed before observers hear about its editor.
        let pos = match self.order {
            ContactOrder::NewestFirst => {
                self.contacts.insert(0, contact);
                0
            }
            ContactOrder::Store => {
                self.contacts.push(contact);
                self.contacts.len() - 1
            }
        };
        Ok(self.nav.open(&self.contacts[pos]))
    }

    /// Open (or switch to) the editor for `contact_id`.
    pub fn open_editor(&mut self, contact_id: &str) -> Result<usize, StoreError> {
        let contact = self
            .contact(contact_id)
            .ok_or_else(|| StoreError::NotFound(contact_id.to_string()))?;
        let contact = contact.clone();
        Ok(self.nav.open(&contact))
    }

    pub fn editor(&self, index: usize) -> Option<&EditorPane> {
        self.nav.editor(index)
    }

    pub fn handle_input(&mut self, index: usize, input: EditorInput) -> Result<bool, NavError> {
        let len = self.nav.len();
        let editor = self
            .nav
            .editor_mut(index)
            .ok_or(NavError::IndexOutOfRange { index, len })?;
        Ok(editor.handle_input(input))
    }

    /// Close the editor at `index`, persisting its entries when it was edited.
    /// The editor closes even if the write fails; the contact then keeps its
    /// previous entries.
    pub async fn close_editor(&mut self, index: usize) -> Result<Commit, NavError> {
        let editor = self.nav.close(index)?;
        if !editor.is_dirty() {
            return Ok(Commit::Unchanged);
        }

        let Some(mut contact) = self.contact(editor.contact_id()).cloned() else {
            let err = StoreError::NotFound(editor.contact_id().to_string());
            self.notice(NoticeLevel::Error, err.to_string());
            return Ok(Commit::RolledBack(err));
        };
        contact.entries = editor.committed_entries();

        Ok(match self.save_contact(contact).await {
            Ok(()) => Commit::Saved,
            Err(err) => Commit::RolledBack(err),
        })
    }

    /// Persist `contact`, restoring the previous in-memory copy on failure.
    pub async fn save_contact(&mut self, mut contact: Contact) -> Result<(), StoreError> {
        let Some(pos) = self.position(&contact.id) else {
            return Err(StoreError::NotFound(contact.id));
        };
        contact.prune_entries();
        let previous = std::mem::replace(&mut self.contacts[pos], contact);
        self.reindex_labels();

        let result = self.store.update(&self.contacts[pos]).await;
        if let Err(err) = result {
            self.contacts[pos] = previous;
            self.reindex_labels();
            let message = format!(
                "changes to {} were not saved: {}",
                self.contacts[pos].display_name(),
                err
            );
            self.notice(NoticeLevel::Error, message);
            return Err(err);
        }

        let title = self.contacts[pos].display_name();
        if let Some(editor_pos) = self.nav.position_of(&self.contacts[pos].id) {
            if let Some(editor) = self.nav.editor_mut(editor_pos) {
                editor.retitle(title);
            }
        }
        Ok(())
    }

    /// Show the editor at `index`. Out-of-range indexes are pinned to the last
    /// open editor.
    pub fn select_page(&mut self, index: usize) -> Page {
        match self.nav.select(index) {
            Ok(page) => page,
            Err(err) => {
                let page = self.nav.select_clamped(index);
                warn!(%err, %page, "clamping page selection");
                page
            }
        }
    }

    pub fn go_home(&mut self) {
        self.nav.go_home();
    }

    /// Delete contacts. On failure they are put back where they were.
    pub async fn delete_contacts(&mut self, ids: &HashSet<String>) -> Result<usize, StoreError> {
        let mut removed: Vec<(usize, Contact)> = Vec::new();
        let mut kept = Vec::with_capacity(self.contacts.len());
        for (pos, contact) in std::mem::take(&mut self.contacts).into_iter().enumerate() {
            if ids.contains(&contact.id) {
                removed.push((pos, contact));
            } else {
                kept.push(contact);
            }
        }
        self.contacts = kept;
        self.reindex_labels();

        let result = self.store.delete(ids).await;
        if let Err(err) = result {
            for (pos, contact) in removed {
                self.contacts.insert(pos, contact);
            }
            self.reindex_labels();
            self.notice(NoticeLevel::Error, format!("could not delete contacts: {}", err));
            return Err(err);
        }

        let contacts = &self.contacts;
        self.nav
            .retain_contacts(|id| contacts.iter().any(|c| c.id == id));
        Ok(removed.len())
    }
}
