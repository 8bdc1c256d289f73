// src/data/mod.rs — Data layer: database manager + DataController

pub mod schema;
pub mod store;

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::infra::errors::RengloError;

pub use store::{Document, EntityRow, Page, Store};

/// Central database manager owning the SQLite connection. Controllers share
/// it through cheap clones.
#[derive(Clone)]
pub struct Database {
    store: Arc<Mutex<Store>>,
}

impl Database {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> Result<Self, RengloError> {
        let conn = Connection::open(path)?;
        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        schema::run_migrations(&conn)?;

        Ok(Self {
            store: Arc::new(Mutex::new(Store::new(conn))),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, RengloError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::run_migrations(&conn)?;
        Ok(Self {
            store: Arc::new(Mutex::new(Store::new(conn))),
        })
    }

    pub fn store(&self) -> Arc<Mutex<Store>> {
        Arc::clone(&self.store)
    }
}

/// Document access facade over the ring-data store.
///
/// A document is addressed by a composite key: the collection (portfolio),
/// the organization, the ring within it, and the document index.
#[derive(Clone)]
pub struct DataController {
    store: Arc<Mutex<Store>>,
}

impl DataController {
    pub fn new(db: &Database) -> Self {
        Self { store: db.store() }
    }

    /// Fetch one document by its composite key.
    pub fn get_document(
        &self,
        portfolio: &str,
        org: &str,
        ring: &str,
        index: &str,
    ) -> Result<Document, RengloError> {
        let store = self.store.lock().expect("store lock poisoned");
        store
            .get_ring_doc(portfolio, org, ring, index)?
            .ok_or_else(|| RengloError::NotFound {
                portfolio: portfolio.to_string(),
                org: org.to_string(),
                ring: ring.to_string(),
                index: index.to_string(),
            })
    }

    /// Store a new document under a generated id; returns the stored path
    /// `portfolio/org/ring/id`.
    pub fn post_document(
        &self,
        portfolio: &str,
        org: &str,
        ring: &str,
        body: serde_json::Value,
    ) -> Result<String, RengloError> {
        let id = uuid::Uuid::new_v4().to_string();
        let store = self.store.lock().expect("store lock poisoned");
        store.put_ring_doc(portfolio, org, ring, &id, &body)?;
        Ok(format!("{portfolio}/{org}/{ring}/{id}"))
    }

    /// Merge `changes` into an existing document. Top-level keys overwrite;
    /// everything else in the body is preserved.
    pub fn put_document(
        &self,
        portfolio: &str,
        org: &str,
        ring: &str,
        index: &str,
        changes: serde_json::Value,
    ) -> Result<Document, RengloError> {
        let mut doc = self.get_document(portfolio, org, ring, index)?;

        match (&mut doc.body, changes) {
            (serde_json::Value::Object(body), serde_json::Value::Object(changes)) => {
                for (k, v) in changes {
                    body.insert(k, v);
                }
            }
            (body, changes) => *body = changes,
        }

        let store = self.store.lock().expect("store lock poisoned");
        doc.modified = store.put_ring_doc(portfolio, org, ring, index, &doc.body)?;
        Ok(doc)
    }

    pub fn delete_document(
        &self,
        portfolio: &str,
        org: &str,
        ring: &str,
        index: &str,
    ) -> Result<(), RengloError> {
        let store = self.store.lock().expect("store lock poisoned");
        if store.delete_ring_doc(portfolio, org, ring, index)? {
            Ok(())
        } else {
            Err(RengloError::NotFound {
                portfolio: portfolio.to_string(),
                org: org.to_string(),
                ring: ring.to_string(),
                index: index.to_string(),
            })
        }
    }

    /// Fetch one entity by its (idx, id) key.
    pub fn get_entity(&self, idx: &str, id: &str) -> Result<EntityRow, RengloError> {
        let store = self.store.lock().expect("store lock poisoned");
        store
            .get_entity(idx, id)?
            .ok_or_else(|| RengloError::EntityNotFound {
                idx: idx.to_string(),
                id: id.to_string(),
            })
    }

    /// List one page of a ring. Feed the returned `lastkey` back in to
    /// continue where the page ended.
    pub fn list_documents(
        &self,
        portfolio: &str,
        org: &str,
        ring: &str,
        limit: u32,
        lastkey: Option<&str>,
    ) -> Result<Page<Document>, RengloError> {
        let store = self.store.lock().expect("store lock poisoned");
        Ok(store.list_ring_docs(portfolio, org, ring, limit, lastkey)?)
    }
}
