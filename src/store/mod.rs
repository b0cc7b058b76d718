//! Contact store abstraction.
//!
//! This module provides:
//! - `ContactStore` trait, the system of record for contacts
//! - `MemoryStore`, a process-local store with failure injection
//! - `SqliteStore`, the on-disk store used by the CLI

pub mod memory;
pub mod sqlite;

use std::collections::HashSet;
use std::fmt::Display;

use thiserror::Error;

use crate::contact::{self, Contact};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Enumeration failed
    #[error("failed to read contacts: {0}")]
    Read(String),
    /// Create, update or delete failed
    #[error("failed to write contacts: {0}")]
    Write(String),
    #[error("contact {0} not found")]
    NotFound(String),
}

impl StoreError {
    pub fn read(err: impl Display) -> Self {
        StoreError::Read(err.to_string())
    }

    pub fn write(err: impl Display) -> Self {
        StoreError::Write(err.to_string())
    }
}

/// Trait for contact store implementations
#[allow(async_fn_in_trait)]
pub trait ContactStore {
    /// Load every contact, in store order (oldest first)
    async fn enumerate(&self) -> Result<Vec<Contact>, StoreError>;

    /// Persist a new empty contact and return it
    async fn create(&self) -> Result<Contact, StoreError>;

    /// Persist names and entries of an existing contact
    async fn update(&self, contact: &Contact) -> Result<(), StoreError>;

    /// Remove contacts; unknown ids are ignored
    async fn delete(&self, ids: &HashSet<String>) -> Result<(), StoreError>;

    /// Full name for display, `"No Name"` / `"null"` placeholders
    fn format_display_name(&self, contact: Option<&Contact>) -> String {
        contact::format_display_name(contact)
    }
}

pub(crate) fn new_contact_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
