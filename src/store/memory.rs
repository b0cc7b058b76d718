use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use crate::contact::Contact;
use crate::store::{new_contact_id, ContactStore, StoreError};

#[derive(Debug, Default)]
struct Inner {
    contacts: Vec<Contact>,
    fail_reads: bool,
    fail_writes: bool,
}

/// Contacts held in process memory.
///
/// Reads and writes can be made to fail on demand so callers can exercise
/// their error paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contacts(contacts: Vec<Contact>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                contacts,
                ..Inner::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Snapshot of what is currently persisted.
    pub fn contacts(&self) -> Vec<Contact> {
        self.lock().contacts.clone()
    }

    fn writable(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        let inner = self.lock();
        if inner.fail_writes {
            return Err(StoreError::write("store is read-only"));
        }
        Ok(inner)
    }
}

impl ContactStore for MemoryStore {
    async fn enumerate(&self) -> Result<Vec<Contact>, StoreError> {
        let inner = self.lock();
        if inner.fail_reads {
            return Err(StoreError::read("store is unavailable"));
        }
        Ok(inner.contacts.clone())
    }

    async fn create(&self) -> Result<Contact, StoreError> {
        let mut inner = self.writable()?;
        let contact = Contact::new(new_contact_id());
        inner.contacts.push(contact.clone());
        Ok(contact)
    }

    async fn update(&self, contact: &Contact) -> Result<(), StoreError> {
        let mut inner = self.writable()?;
        let slot = inner
            .contacts
            .iter_mut()
            .find(|c| c.id == contact.id)
            .ok_or_else(|| StoreError::NotFound(contact.id.clone()))?;
        *slot = contact.clone();
        Ok(())
    }

    async fn delete(&self, ids: &HashSet<String>) -> Result<(), StoreError> {
        let mut inner = self.writable()?;
        inner.contacts.retain(|c| !ids.contains(&c.id));
        Ok(())
    }
}
