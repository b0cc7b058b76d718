//! Contact browsing and tagging.
//!
//! Contacts carry free-form `key:value` entries (`Twitter:@handle`,
//! `Email:someone@example.com`). This crate filters contacts by those entries,
//! ranks labels for reuse, and tracks the set of open contact editors.

pub mod app;
pub mod config;
pub mod contact;
pub mod nav;
pub mod search;
pub mod store;
pub mod suggest;
pub mod translit;

pub use app::{App, Commit, Notice, NoticeLevel};
pub use contact::{Contact, Entry};
pub use nav::{EditorInput, NavError, NavEvent, NavigationSession, Page};
pub use search::MatchMode;
pub use store::{ContactStore, MemoryStore, SqliteStore, StoreError};
pub use suggest::{LabelIndex, Suggestion};
