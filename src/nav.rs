//! Page navigation across open contact editors.
//!
//! Page 0 of the pager is always the search list ([`Page::Home`]); every open
//! editor sits to its right in the order it was opened. Observers are invoked
//! synchronously, in the order transitions are applied.

use std::fmt;

use thiserror::Error;

use crate::contact::{prune_entries, Contact, Entry};
use crate::suggest::{LabelIndex, Suggestion};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Home,
    Editing(usize),
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Page::Home => write!(f, "home"),
            Page::Editing(i) => write!(f, "editor {}", i),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavError {
    #[error("editor index {index} out of range ({len} open)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Emitted to observers after each transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavEvent {
    Opened { index: usize, contact_id: String },
    Closed { index: usize, contact_id: String },
    Activated(Page),
}

/// Edits a user can make inside an editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorInput {
    AddEntry(Entry),
    SetKey { index: usize, key: String },
    SetValue { index: usize, value: String },
    RemoveEntry(usize),
    /// Remove every entry carrying `key`.
    RemoveKey(String),
}

/// One open editor: a contact id plus the entries being edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorPane {
    contact_id: String,
    title: String,
    draft: Vec<Entry>,
    dirty: bool,
}

impl EditorPane {
    pub fn new(contact: &Contact) -> Self {
        Self {
            contact_id: contact.id.clone(),
            title: contact.display_name(),
            draft: contact.entries.clone(),
            dirty: false,
        }
    }

    pub fn contact_id(&self) -> &str {
        &self.contact_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn entries(&self) -> &[Entry] {
        &self.draft
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn retitle(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Labels to offer next, skipping those already in the draft.
    pub fn suggestions(&self, labels: &LabelIndex) -> Vec<Suggestion> {
        labels.suggest_for(&self.draft)
    }

    /// Apply one edit. Returns false when the input referred to a row that does
    /// not exist or changed nothing.
    pub fn handle_input(&mut self, input: EditorInput) -> bool {
        let changed = match input {
            EditorInput::AddEntry(entry) => {
                self.draft.push(entry);
                true
            }
            EditorInput::SetKey { index, key } => match self.draft.get_mut(index) {
                Some(entry) => {
                    entry.key = key;
                    true
                }
                None => false,
            },
            EditorInput::SetValue { index, value } => match self.draft.get_mut(index) {
                Some(entry) => {
                    entry.value = value;
                    true
                }
                None => false,
            },
            EditorInput::RemoveEntry(index) => {
                if index < self.draft.len() {
                    self.draft.remove(index);
                    true
                } else {
                    false
                }
            }
            EditorInput::RemoveKey(key) => {
                let before = self.draft.len();
                self.draft.retain(|e| e.key != key);
                before != self.draft.len()
            }
        };
        self.dirty |= changed;
        changed
    }

    /// Draft with incomplete rows dropped, ready to persist.
    pub fn committed_entries(&self) -> Vec<Entry> {
        let mut entries = self.draft.clone();
        prune_entries(&mut entries);
        entries
    }

    pub fn render(&self) -> Vec<String> {
        let mut lines = vec![self.title.clone()];
        lines.extend(
            self.draft
                .iter()
                .map(|e| format!("  {}: {}", e.key, e.value)),
        );
        lines
    }
}

/// What occupies a page: the search list or an editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pane {
    Search,
    Editor(EditorPane),
}

impl Pane {
    pub fn title(&self) -> &str {
        match self {
            Pane::Search => "Search",
            Pane::Editor(editor) => editor.title(),
        }
    }

    pub fn render(&self) -> Vec<String> {
        match self {
            Pane::Search => vec![self.title().to_string()],
            Pane::Editor(editor) => editor.render(),
        }
    }

    pub fn handle_input(&mut self, input: EditorInput) -> bool {
        match self {
            Pane::Search => false,
            Pane::Editor(editor) => editor.handle_input(input),
        }
    }
}

type Observer = Box<dyn FnMut(&NavEvent)>;

#[derive(Default)]
pub struct NavigationSession {
    editors: Vec<EditorPane>,
    active: Option<usize>,
    observers: Vec<Observer>,
}

impl fmt::Debug for NavigationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationSession")
            .field("editors", &self.editors)
            .field("active", &self.active_page())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl NavigationSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&NavEvent) + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn notify(&mut self, event: NavEvent) {
        tracing::debug!(?event, "navigation");
        for observer in &mut self.observers {
            observer(&event);
        }
    }

    pub fn len(&self) -> usize {
        self.editors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.editors.is_empty()
    }

    pub fn active_page(&self) -> Page {
        match self.active {
            Some(i) => Page::Editing(i),
            None => Page::Home,
        }
    }

    pub fn editors(&self) -> &[EditorPane] {
        &self.editors
    }

    pub fn editor(&self, index: usize) -> Option<&EditorPane> {
        self.editors.get(index)
    }

    pub fn editor_mut(&mut self, index: usize) -> Option<&mut EditorPane> {
        self.editors.get_mut(index)
    }

    pub fn position_of(&self, contact_id: &str) -> Option<usize> {
        self.editors.iter().position(|e| e.contact_id == contact_id)
    }

    /// The pane shown at a page.
    pub fn pane(&self, page: Page) -> Option<Pane> {
        match page {
            Page::Home => Some(Pane::Search),
            Page::Editing(i) => self.editors.get(i).cloned().map(Pane::Editor),
        }
    }

    fn activate(&mut self, active: Option<usize>) {
        if self.active != active {
            self.active = active;
            let page = self.active_page();
            self.notify(NavEvent::Activated(page));
        }
    }

    /// Append an editor for `contact` and activate it, or activate the
    /// existing one. Returns its position.
    pub fn open(&mut self, contact: &Contact) -> usize {
        if let Some(index) = self.position_of(&contact.id) {
            self.activate(Some(index));
            return index;
        }
        self.editors.push(EditorPane::new(contact));
        let index = self.editors.len() - 1;
        self.notify(NavEvent::Opened {
            index,
            contact_id: contact.id.clone(),
        });
        self.activate(Some(index));
        index
    }

    /// Remove the editor at `index` and return to the home page.
    pub fn close(&mut self, index: usize) -> Result<EditorPane, NavError> {
        if index >= self.editors.len() {
            return Err(NavError::IndexOutOfRange {
                index,
                len: self.editors.len(),
            });
        }
        let editor = self.editors.remove(index);
        // Back to home before anyone can observe the shorter list.
        let previous = self.active.take();
        self.notify(NavEvent::Closed {
            index,
            contact_id: editor.contact_id.clone(),
        });
        if previous.is_some() {
            self.notify(NavEvent::Activated(Page::Home));
        }
        Ok(editor)
    }

    /// Activate the editor at `index`.
    pub fn select(&mut self, index: usize) -> Result<Page, NavError> {
        if index >= self.editors.len() {
            return Err(NavError::IndexOutOfRange {
                index,
                len: self.editors.len(),
            });
        }
        self.activate(Some(index));
        Ok(self.active_page())
    }

    /// Like [`select`](Self::select), but pins an out-of-range index to the
    /// last editor (or home when none are open).
    pub fn select_clamped(&mut self, index: usize) -> Page {
        let target = match self.editors.len() {
            0 => None,
            len => Some(index.min(len - 1)),
        };
        self.activate(target);
        self.active_page()
    }

    pub fn go_home(&mut self) {
        self.activate(None);
    }

    /// Drop editors whose contact no longer exists, e.g. after a delete.
    pub fn retain_contacts(&mut self, mut exists: impl FnMut(&str) -> bool) {
        let mut index = 0;
        while index < self.editors.len() {
            if exists(&self.editors[index].contact_id) {
                index += 1;
            } else {
                // close() cannot fail here: index < len
                let _ = self.close(index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn contact(id: &str) -> Contact {
        Contact::with_entries(id, vec![Entry::new("Twitter", format!("@{id}"))])
    }

    fn assert_in_bounds(nav: &NavigationSession) {
        match nav.active_page() {
            Page::Home => {}
            Page::Editing(i) => assert!(i < nav.len(), "{i} >= {}", nav.len()),
        }
    }

    #[test]
    fn open_two_close_first() {
        let mut nav = NavigationSession::new();
        assert_eq!(nav.open(&contact("x")), 0);
        assert_eq!(nav.open(&contact("y")), 1);
        assert_eq!(nav.len(), 2);
        assert_eq!(nav.active_page(), Page::Editing(1));

        let closed = nav.close(0).unwrap();
        assert_eq!(closed.contact_id(), "x");
        assert_eq!(nav.len(), 1);
        assert_eq!(nav.editors()[0].contact_id(), "y");
        assert_eq!(nav.active_page(), Page::Home);
    }

    #[test]
    fn reopening_switches_instead_of_duplicating() {
        let mut nav = NavigationSession::new();
        nav.open(&contact("x"));
        nav.open(&contact("y"));
        assert_eq!(nav.open(&contact("x")), 0);
        assert_eq!(nav.len(), 2);
        assert_eq!(nav.active_page(), Page::Editing(0));
    }

    #[test]
    fn close_out_of_range_is_an_error() {
        let mut nav = NavigationSession::new();
        nav.open(&contact("x"));
        assert_eq!(
            nav.close(3).unwrap_err(),
            NavError::IndexOutOfRange { index: 3, len: 1 }
        );
        assert_eq!(nav.len(), 1);
        assert_eq!(nav.active_page(), Page::Editing(0));
    }

    #[test]
    fn select_strict_and_clamped() {
        let mut nav = NavigationSession::new();
        assert!(nav.select(0).is_err());
        assert_eq!(nav.select_clamped(4), Page::Home);

        nav.open(&contact("x"));
        nav.open(&contact("y"));
        nav.go_home();
        assert_eq!(nav.select(1), Ok(Page::Editing(1)));
        assert!(nav.select(2).is_err());
        assert_eq!(nav.active_page(), Page::Editing(1));
        assert_eq!(nav.select_clamped(9), Page::Editing(1));
        assert_eq!(nav.select_clamped(0), Page::Editing(0));
    }

    #[test]
    fn active_page_stays_in_bounds() {
        let mut nav = NavigationSession::new();
        let script: &[(bool, usize)] = &[
            (true, 0),
            (true, 1),
            (true, 2),
            (false, 2),
            (true, 3),
            (false, 0),
            (false, 0),
            (false, 5),
            (false, 0),
            (true, 4),
        ];
        for (step, &(open, n)) in script.iter().enumerate() {
            if open {
                nav.open(&contact(&format!("c{n}")));
            } else {
                let _ = nav.close(n);
            }
            assert_in_bounds(&nav);
            if step == 2 {
                let _ = nav.select(1);
            }
        }
    }

    #[test]
    fn observers_see_transitions_in_order() {
        let seen: Rc<RefCell<Vec<NavEvent>>> = Rc::default();
        let mut nav = NavigationSession::new();
        let sink = Rc::clone(&seen);
        nav.subscribe(move |event| sink.borrow_mut().push(event.clone()));

        nav.open(&contact("x"));
        nav.open(&contact("y"));
        nav.select(0).unwrap();
        nav.close(0).unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![
                NavEvent::Opened { index: 0, contact_id: "x".into() },
                NavEvent::Activated(Page::Editing(0)),
                NavEvent::Opened { index: 1, contact_id: "y".into() },
                NavEvent::Activated(Page::Editing(1)),
                NavEvent::Activated(Page::Editing(0)),
                NavEvent::Closed { index: 0, contact_id: "x".into() },
                NavEvent::Activated(Page::Home),
            ]
        );
    }

    #[test]
    fn editor_input_and_commit() {
        let mut editor = EditorPane::new(&contact("x"));
        assert!(!editor.is_dirty());
        assert!(editor.handle_input(EditorInput::AddEntry(Entry::new("Email", ""))));
        assert!(editor.handle_input(EditorInput::AddEntry(Entry::new("GitHub", "x"))));
        assert!(editor.handle_input(EditorInput::SetKey { index: 2, key: "Code".into() }));
        assert!(!editor.handle_input(EditorInput::SetValue { index: 9, value: "v".into() }));
        assert!(editor.is_dirty());
        assert_eq!(
            editor.committed_entries(),
            vec![Entry::new("Twitter", "@x"), Entry::new("Code", "x")]
        );
        assert!(editor.handle_input(EditorInput::RemoveKey("Twitter".into())));
        assert!(editor.handle_input(EditorInput::RemoveEntry(0)));
        assert_eq!(editor.entries(), [Entry::new("Code", "x")]);
    }

    #[test]
    fn editor_suggestions_skip_own_keys() {
        let all = vec![vec![Entry::new("Twitter", "@a"), Entry::new("Email", "a@b.co")]];
        let labels = LabelIndex::build(&all);
        let editor = EditorPane::new(&contact("x"));
        let suggested = editor.suggestions(&labels);
        assert_eq!(suggested.len(), 1);
        assert_eq!(suggested[0].value, "Email");
    }

    #[test]
    fn panes_render_and_route_input() {
        let mut nav = NavigationSession::new();
        nav.open(&contact("x"));
        assert_eq!(nav.pane(Page::Home), Some(Pane::Search));
        assert!(nav.pane(Page::Editing(5)).is_none());

        let mut pane = nav.pane(Page::Editing(0)).unwrap();
        assert_eq!(pane.title(), "No Name");
        assert_eq!(pane.render(), vec!["No Name".to_string(), "  Twitter: @x".to_string()]);
        assert!(!Pane::Search.handle_input(EditorInput::RemoveEntry(0)));
        assert!(pane.handle_input(EditorInput::RemoveEntry(0)));
    }

    #[test]
    fn retain_contacts_closes_missing_editors() {
        let mut nav = NavigationSession::new();
        nav.open(&contact("x"));
        nav.open(&contact("y"));
        nav.open(&contact("z"));
        nav.retain_contacts(|id| id != "x" && id != "z");
        assert_eq!(nav.len(), 1);
        assert_eq!(nav.editors()[0].contact_id(), "y");
        assert_eq!(nav.active_page(), Page::Home);
    }
}
