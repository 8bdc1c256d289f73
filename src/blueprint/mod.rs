// src/blueprint/mod.rs — Versioned blueprint catalog
//
// Blueprints describe ring layouts and UI forms for a portfolio. Each
// version is a rel row under idx `blueprints_{portfolio}` with the sort key
// `{name}:{version:06}`, so a prefix query lists versions in order and the
// last row is the newest.

use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::data::{Database, Store};
use crate::infra::errors::RengloError;

/// Version selector that resolves to the newest stored version.
pub const LAST_VERSION: &str = "last";

#[derive(Debug, Clone, Serialize)]
pub struct Blueprint {
    pub portfolio: String,
    pub name: String,
    pub version: u32,
    pub body: Value,
}

pub struct BlueprintController {
    store: Arc<Mutex<Store>>,
}

impl BlueprintController {
    pub fn new(db: &Database) -> Self {
        Self { store: db.store() }
    }

    fn idx(portfolio: &str) -> String {
        format!("blueprints_{portfolio}")
    }

    fn sort_key(name: &str, version: u32) -> String {
        format!("{name}:{version:06}")
    }

    /// Store one version of a blueprint. Writing an existing version
    /// replaces it.
    pub fn put_blueprint(
        &self,
        portfolio: &str,
        name: &str,
        version: u32,
        body: Value,
    ) -> Result<(), RengloError> {
        let store = self.store.lock().expect("store lock poisoned");
        store.create_rel(&Self::idx(portfolio), &Self::sort_key(name, version), &body)?;
        debug!("Stored blueprint {portfolio}/{name} v{version}");
        Ok(())
    }

    /// Fetch a blueprint. `version` is a number, or `"last"` for the newest
    /// stored version.
    pub fn get_blueprint(
        &self,
        portfolio: &str,
        name: &str,
        version: &str,
    ) -> Result<Blueprint, RengloError> {
        let not_found = || RengloError::BlueprintNotFound {
            portfolio: portfolio.to_string(),
            name: name.to_string(),
            version: version.to_string(),
        };

        let store = self.store.lock().expect("store lock poisoned");

        let row = if version == LAST_VERSION {
            store
                .list_rels_prefix(&Self::idx(portfolio), &format!("{name}:"))?
                .into_iter()
                .next_back()
        } else {
            let v: u32 = version.parse().map_err(|_| not_found())?;
            store.get_rel(&Self::idx(portfolio), &Self::sort_key(name, v))?
        };

        let row = row.ok_or_else(not_found)?;
        let resolved: u32 = row
            .rel
            .rsplit(':')
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(not_found)?;

        Ok(Blueprint {
            portfolio: portfolio.to_string(),
            name: name.to_string(),
            version: resolved,
            body: row.body,
        })
    }

    /// All stored versions of a blueprint, oldest first.
    pub fn list_versions(&self, portfolio: &str, name: &str) -> Result<Vec<u32>, RengloError> {
        let store = self.store.lock().expect("store lock poisoned");
        let rows = store.list_rels_prefix(&Self::idx(portfolio), &format!("{name}:"))?;
        Ok(rows
            .into_iter()
            .filter_map(|r| r.rel.rsplit(':').next().and_then(|v| v.parse().ok()))
            .collect())
    }
}

/// Read facade over the blueprint catalog of one workspace.
pub struct StateController {
    portfolio: String,
    blueprints: BlueprintController,
}

impl StateController {
    pub fn new(db: &Database, portfolio: impl Into<String>) -> Self {
        Self {
            portfolio: portfolio.into(),
            blueprints: BlueprintController::new(db),
        }
    }

    pub fn get_state(&self, name: &str, version: &str) -> Result<Blueprint, RengloError> {
        self.blueprints.get_blueprint(&self.portfolio, name, version)
    }
}
