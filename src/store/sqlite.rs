//! SQLite-backed contact store.
//!
//! rusqlite is synchronous, so every call runs on the tokio blocking pool and
//! the owning task only awaits the result.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::contact::{Contact, Entry};
use crate::store::{new_contact_id, ContactStore, StoreError};

#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create data dir: {}", parent.display())
                })?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        setup(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// When the contact was first created.
    pub fn created_at(&self, id: &str) -> Result<Option<OffsetDateTime>> {
        let conn = lock(&self.conn);
        let raw: Option<String> = conn
            .query_row(
                "SELECT created_at FROM contacts WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|s| {
            OffsetDateTime::parse(&s, &Rfc3339)
                .with_context(|| format!("invalid created_at timestamp `{}`", s))
        })
        .transpose()
    }

    /// Run `work` against the connection off the async thread.
    async fn with_conn<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&conn);
            work(&mut guard)
        })
        .await
        .context("store task panicked")?
    }
}

fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn setup(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "FULL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS contacts (
          id TEXT PRIMARY KEY,
          prefix TEXT,
          given_name TEXT,
          middle_name TEXT,
          family_name TEXT,
          suffix TEXT,
          nickname TEXT,
          organization TEXT,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS entries (
          contact_id TEXT NOT NULL REFERENCES contacts(id) ON DELETE CASCADE,
          seq   INTEGER NOT NULL,
          key   TEXT NOT NULL,
          value TEXT NOT NULL,
          PRIMARY KEY (contact_id, seq)
        );

        CREATE INDEX IF NOT EXISTS idx_entries_key ON entries(key);
    "#,
    )?;
    Ok(())
}

fn now() -> Result<String> {
    Ok(OffsetDateTime::now_utc().format(&Rfc3339)?)
}

fn row_to_contact(row: &Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get(0)?,
        prefix: row.get(1)?,
        given_name: row.get(2)?,
        middle_name: row.get(3)?,
        family_name: row.get(4)?,
        suffix: row.get(5)?,
        nickname: row.get(6)?,
        organization: row.get(7)?,
        entries: Vec::new(),
    })
}

fn load_all(conn: &Connection) -> Result<Vec<Contact>> {
    let mut entries: HashMap<String, Vec<Entry>> = HashMap::new();
    {
        let mut stmt =
            conn.prepare("SELECT contact_id, key, value FROM entries ORDER BY contact_id, seq")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                Entry::new(row.get::<_, String>(1)?, row.get::<_, String>(2)?),
            ))
        })?;
        for row in rows {
            let (id, entry) = row?;
            entries.entry(id).or_default().push(entry);
        }
    }

    let mut stmt = conn.prepare(
        "SELECT id, prefix, given_name, middle_name, family_name, suffix, nickname, organization
         FROM contacts ORDER BY rowid",
    )?;
    let rows = stmt.query_map([], row_to_contact)?;

    let mut out = Vec::new();
    for row in rows {
        let mut contact = row?;
        contact.entries = entries.remove(&contact.id).unwrap_or_default();
        out.push(contact);
    }
    Ok(out)
}

fn insert_empty(conn: &Connection) -> Result<Contact> {
    let contact = Contact::new(new_contact_id());
    let stamp = now()?;
    conn.execute(
        "INSERT INTO contacts (id, created_at, updated_at) VALUES (?1, ?2, ?2)",
        params![contact.id, stamp],
    )?;
    Ok(contact)
}

/// Returns false when the contact does not exist.
fn save(conn: &mut Connection, contact: &Contact) -> Result<bool> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let changed = tx.execute(
        r#"
        UPDATE contacts SET
          prefix = ?2,
          given_name = ?3,
          middle_name = ?4,
          family_name = ?5,
          suffix = ?6,
          nickname = ?7,
          organization = ?8,
          updated_at = ?9
        WHERE id = ?1
    "#,
        params![
            contact.id,
            contact.prefix,
            contact.given_name,
            contact.middle_name,
            contact.family_name,
            contact.suffix,
            contact.nickname,
            contact.organization,
            now()?,
        ],
    )?;
    if changed == 0 {
        return Ok(false);
    }

    tx.execute("DELETE FROM entries WHERE contact_id = ?1", params![contact.id])?;
    {
        let mut stmt =
            tx.prepare("INSERT INTO entries (contact_id, seq, key, value) VALUES (?1, ?2, ?3, ?4)")?;
        for (seq, entry) in contact.entries.iter().enumerate() {
            stmt.execute(params![contact.id, seq as i64, entry.key, entry.value])?;
        }
    }

    tx.commit()?;
    Ok(true)
}

fn delete_ids(conn: &mut Connection, ids: &HashSet<String>) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    {
        let mut stmt = tx.prepare("DELETE FROM contacts WHERE id = ?1")?;
        for id in ids {
            stmt.execute(params![id])?;
        }
    }
    tx.commit()?;
    Ok(())
}

impl ContactStore for SqliteStore {
    async fn enumerate(&self) -> Result<Vec<Contact>, StoreError> {
        self.with_conn(|conn| load_all(conn))
            .await
            .map_err(|e| StoreError::read(format!("{:#}", e)))
    }

    async fn create(&self) -> Result<Contact, StoreError> {
        self.with_conn(|conn| insert_empty(conn))
            .await
            .map_err(|e| StoreError::write(format!("{:#}", e)))
    }

    async fn update(&self, contact: &Contact) -> Result<(), StoreError> {
        let owned = contact.clone();
        let found = self
            .with_conn(move |conn| save(conn, &owned))
            .await
            .map_err(|e| StoreError::write(format!("{:#}", e)))?;
        if found {
            Ok(())
        } else {
            Err(StoreError::NotFound(contact.id.clone()))
        }
    }

    async fn delete(&self, ids: &HashSet<String>) -> Result<(), StoreError> {
        let ids = ids.clone();
        self.with_conn(move |conn| delete_ids(conn, &ids))
            .await
            .map_err(|e| StoreError::write(format!("{:#}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("contacts.db");

        let id = {
            let store = SqliteStore::open(&path).unwrap();
            let mut contact = store.create().await.unwrap();
            contact.given_name = Some("Ada".into());
            contact.family_name = Some("Lovelace".into());
            contact.entries = vec![
                Entry::new("Twitter", "@ada"),
                Entry::new("Email", "ada@example.com"),
                Entry::new("Twitter", "@ada_alt"),
            ];
            store.update(&contact).await.unwrap();
            contact.id
        };

        let store = SqliteStore::open(&path).unwrap();
        let contacts = store.enumerate().await.unwrap();
        assert_eq!(contacts.len(), 1);
        let contact = &contacts[0];
        assert_eq!(contact.id, id);
        assert_eq!(contact.display_name(), "Ada Lovelace");
        assert_eq!(
            contact.entries,
            vec![
                Entry::new("Twitter", "@ada"),
                Entry::new("Email", "ada@example.com"),
                Entry::new("Twitter", "@ada_alt"),
            ]
        );
        assert!(store.created_at(&id).unwrap().is_some());
    }

    #[tokio::test]
    async fn enumerates_in_creation_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.create().await.unwrap();
        let b = store.create().await.unwrap();
        let c = store.create().await.unwrap();
        let ids: Vec<String> = store
            .enumerate()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
    }

    #[tokio::test]
    async fn delete_cascades_entries() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut keep = store.create().await.unwrap();
        let mut gone = store.create().await.unwrap();
        keep.entries.push(Entry::new("GitHub", "keep"));
        gone.entries.push(Entry::new("GitHub", "gone"));
        store.update(&keep).await.unwrap();
        store.update(&gone).await.unwrap();

        store
            .delete(&HashSet::from([gone.id.clone(), "unknown".to_string()]))
            .await
            .unwrap();

        let contacts = store.enumerate().await.unwrap();
        assert_eq!(contacts, vec![keep]);
        let orphans: i64 = lock(&store.conn)
            .query_row("SELECT COUNT(*) FROM entries WHERE contact_id = ?1", params![gone.id], |r| r.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn update_missing_contact() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store.update(&Contact::new("nope")).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound("nope".into()));
        assert!(store.created_at("nope").unwrap().is_none());
    }
}
