// src/data/store.rs — SQLite operations

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

/// A ring-scoped document identified by (portfolio, org, ring, id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub portfolio: String,
    pub org: String,
    pub ring: String,
    pub id: String,
    pub body: serde_json::Value,
    pub modified: String,
}

impl Document {
    /// `portfolio/org/ring/id`, the path format returned by writes.
    pub fn path(&self) -> String {
        format!("{}/{}/{}/{}", self.portfolio, self.org, self.ring, self.id)
    }
}

/// One page of results plus the cursor for the next page.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Sort-key of the last item when more rows remain; feed back in as the
    /// exclusive start key of the next query.
    pub lastkey: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EntityRow {
    pub idx: String,
    pub id: String,
    pub body: serde_json::Value,
    pub modified: String,
}

#[derive(Debug, Clone)]
pub struct RelRow {
    pub idx: String,
    pub rel: String,
    pub body: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: Option<String>,
    pub password_salt: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct RuleRow {
    pub name: String,
    pub schedule_expression: String,
    pub payload: serde_json::Value,
    pub enabled: bool,
}

/// Low-level SQLite operations for all data types.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // -- Ring data --

    pub fn get_ring_doc(
        &self,
        portfolio: &str,
        org: &str,
        ring: &str,
        id: &str,
    ) -> anyhow::Result<Option<Document>> {
        let row = self
            .conn
            .query_row(
                "SELECT body, modified FROM ring_data
                 WHERE portfolio = ?1 AND org = ?2 AND ring = ?3 AND id = ?4",
                params![portfolio, org, ring, id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        match row {
            Some((body, modified)) => Ok(Some(Document {
                portfolio: portfolio.to_string(),
                org: org.to_string(),
                ring: ring.to_string(),
                id: id.to_string(),
                body: serde_json::from_str(&body)?,
                modified,
            })),
            None => Ok(None),
        }
    }

    /// Insert or replace, stamping `modified`.
    pub fn put_ring_doc(
        &self,
        portfolio: &str,
        org: &str,
        ring: &str,
        id: &str,
        body: &serde_json::Value,
    ) -> anyhow::Result<String> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR REPLACE INTO ring_data (portfolio, org, ring, id, body, modified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![portfolio, org, ring, id, serde_json::to_string(body)?, now],
        )?;
        Ok(now)
    }

    pub fn delete_ring_doc(
        &self,
        portfolio: &str,
        org: &str,
        ring: &str,
        id: &str,
    ) -> anyhow::Result<bool> {
        let n = self.conn.execute(
            "DELETE FROM ring_data
             WHERE portfolio = ?1 AND org = ?2 AND ring = ?3 AND id = ?4",
            params![portfolio, org, ring, id],
        )?;
        Ok(n > 0)
    }

    /// Page through a ring ordered by id. `lastkey` is the exclusive start
    /// key returned by the previous page.
    pub fn list_ring_docs(
        &self,
        portfolio: &str,
        org: &str,
        ring: &str,
        limit: u32,
        lastkey: Option<&str>,
    ) -> anyhow::Result<Page<Document>> {
        let start = lastkey.unwrap_or("");
        let mut stmt = self.conn.prepare(
            "SELECT id, body, modified FROM ring_data
             WHERE portfolio = ?1 AND org = ?2 AND ring = ?3 AND id > ?4
             ORDER BY id LIMIT ?5",
        )?;

        // Fetch one extra row to know whether another page exists.
        let rows = stmt.query_map(
            params![portfolio, org, ring, start, limit.saturating_add(1)],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )?;

        let mut items = Vec::new();
        for row in rows {
            let (id, body, modified) = row?;
            items.push(Document {
                portfolio: portfolio.to_string(),
                org: org.to_string(),
                ring: ring.to_string(),
                id,
                body: serde_json::from_str(&body)?,
                modified,
            });
        }

        let lastkey = if items.len() as u32 > limit {
            items.truncate(limit as usize);
            items.last().map(|d| d.id.clone())
        } else {
            None
        };

        Ok(Page { items, lastkey })
    }

    // -- Entities --

    pub fn get_entity(&self, idx: &str, id: &str) -> anyhow::Result<Option<EntityRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT body, modified FROM entities WHERE idx = ?1 AND id = ?2",
                params![idx, id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        match row {
            Some((body, modified)) => Ok(Some(EntityRow {
                idx: idx.to_string(),
                id: id.to_string(),
                body: serde_json::from_str(&body)?,
                modified,
            })),
            None => Ok(None),
        }
    }

    /// Create and update are the same write, as in the original model.
    pub fn put_entity(
        &self,
        idx: &str,
        id: &str,
        body: &serde_json::Value,
    ) -> anyhow::Result<String> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR REPLACE INTO entities (idx, id, body, modified)
             VALUES (?1, ?2, ?3, ?4)",
            params![idx, id, serde_json::to_string(body)?, now],
        )?;
        Ok(now)
    }

    pub fn delete_entity(&self, idx: &str, id: &str) -> anyhow::Result<bool> {
        let n = self.conn.execute(
            "DELETE FROM entities WHERE idx = ?1 AND id = ?2",
            params![idx, id],
        )?;
        Ok(n > 0)
    }

    pub fn list_entities(
        &self,
        idx: &str,
        limit: u32,
        lastkey: Option<&str>,
    ) -> anyhow::Result<Page<EntityRow>> {
        let start = lastkey.unwrap_or("");
        let mut stmt = self.conn.prepare(
            "SELECT id, body, modified FROM entities
             WHERE idx = ?1 AND id > ?2 ORDER BY id LIMIT ?3",
        )?;

        let rows = stmt.query_map(params![idx, start, limit.saturating_add(1)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut items = Vec::new();
        for row in rows {
            let (id, body, modified) = row?;
            items.push(EntityRow {
                idx: idx.to_string(),
                id,
                body: serde_json::from_str(&body)?,
                modified,
            });
        }

        let lastkey = if items.len() as u32 > limit {
            items.truncate(limit as usize);
            items.last().map(|e| e.id.clone())
        } else {
            None
        };

        Ok(Page { items, lastkey })
    }

    // -- Rels --

    pub fn get_rel(&self, idx: &str, rel: &str) -> anyhow::Result<Option<RelRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT body FROM rels WHERE idx = ?1 AND rel = ?2",
                params![idx, rel],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match row {
            Some(body) => Ok(Some(RelRow {
                idx: idx.to_string(),
                rel: rel.to_string(),
                body: serde_json::from_str(&body)?,
            })),
            None => Ok(None),
        }
    }

    pub fn create_rel(
        &self,
        idx: &str,
        rel: &str,
        body: &serde_json::Value,
    ) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO rels (idx, rel, body) VALUES (?1, ?2, ?3)",
            params![idx, rel, serde_json::to_string(body)?],
        )?;
        Ok(())
    }

    pub fn delete_rel(&self, idx: &str, rel: &str) -> anyhow::Result<bool> {
        let n = self.conn.execute(
            "DELETE FROM rels WHERE idx = ?1 AND rel = ?2",
            params![idx, rel],
        )?;
        Ok(n > 0)
    }

    pub fn list_rels(
        &self,
        idx: &str,
        limit: u32,
        lastkey: Option<&str>,
    ) -> anyhow::Result<Page<RelRow>> {
        let start = lastkey.unwrap_or("");
        let mut stmt = self.conn.prepare(
            "SELECT rel, body FROM rels
             WHERE idx = ?1 AND rel > ?2 ORDER BY rel LIMIT ?3",
        )?;

        let rows = stmt.query_map(params![idx, start, limit.saturating_add(1)], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut items = Vec::new();
        for row in rows {
            let (rel, body) = row?;
            items.push(RelRow {
                idx: idx.to_string(),
                rel,
                body: serde_json::from_str(&body)?,
            });
        }

        let lastkey = if items.len() as u32 > limit {
            items.truncate(limit as usize);
            items.last().map(|r| r.rel.clone())
        } else {
            None
        };

        Ok(Page { items, lastkey })
    }

    /// Sort-key begins_with query.
    pub fn list_rels_prefix(&self, idx: &str, prefix: &str) -> anyhow::Result<Vec<RelRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT rel, body FROM rels
             WHERE idx = ?1 AND substr(rel, 1, length(?2)) = ?2
             ORDER BY rel",
        )?;

        let rows = stmt.query_map(params![idx, prefix], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut items = Vec::new();
        for row in rows {
            let (rel, body) = row?;
            items.push(RelRow {
                idx: idx.to_string(),
                rel,
                body: serde_json::from_str(&body)?,
            });
        }
        Ok(items)
    }

    // -- Users --

    pub fn insert_user(
        &self,
        id: &str,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO users (id, email, first_name, last_name, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?5)",
            params![id, email, first_name, last_name, now],
        )?;
        Ok(())
    }

    pub fn get_user_by_email(&self, email: &str) -> anyhow::Result<Option<UserRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, email, first_name, last_name, password_hash, password_salt, status
                 FROM users WHERE email = ?1",
                params![email],
                |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        first_name: row.get(2)?,
                        last_name: row.get(3)?,
                        password_hash: row.get(4)?,
                        password_salt: row.get(5)?,
                        status: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn set_user_password(
        &self,
        email: &str,
        hash: &str,
        salt: &str,
    ) -> anyhow::Result<bool> {
        let now = Utc::now().to_rfc3339();
        let n = self.conn.execute(
            "UPDATE users SET password_hash = ?1, password_salt = ?2,
             status = 'confirmed', updated_at = ?3
             WHERE email = ?4",
            params![hash, salt, now, email],
        )?;
        Ok(n > 0)
    }

    // -- Scheduler rules --

    pub fn insert_rule(
        &self,
        name: &str,
        schedule_expression: &str,
        payload: &serde_json::Value,
    ) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR REPLACE INTO schd_rules (name, schedule_expression, payload, enabled, created_at)
             VALUES (?1, ?2, ?3, 1, ?4)",
            params![name, schedule_expression, serde_json::to_string(payload)?, now],
        )?;
        Ok(())
    }

    pub fn get_rule(&self, name: &str) -> anyhow::Result<Option<RuleRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT name, schedule_expression, payload, enabled
                 FROM schd_rules WHERE name = ?1",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, bool>(3)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((name, schedule_expression, payload, enabled)) => Ok(Some(RuleRow {
                name,
                schedule_expression,
                payload: serde_json::from_str(&payload)?,
                enabled,
            })),
            None => Ok(None),
        }
    }

    pub fn list_rules_prefix(&self, prefix: &str) -> anyhow::Result<Vec<RuleRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, schedule_expression, payload, enabled FROM schd_rules
             WHERE substr(name, 1, length(?1)) = ?1 ORDER BY name",
        )?;

        let rows = stmt.query_map(params![prefix], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, bool>(3)?,
            ))
        })?;

        let mut items = Vec::new();
        for row in rows {
            let (name, schedule_expression, payload, enabled) = row?;
            items.push(RuleRow {
                name,
                schedule_expression,
                payload: serde_json::from_str(&payload)?,
                enabled,
            });
        }
        Ok(items)
    }

    pub fn delete_rule(&self, name: &str) -> anyhow::Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM schd_rules WHERE name = ?1", params![name])?;
        Ok(n > 0)
    }
}
