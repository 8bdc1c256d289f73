// src/agent/chat.rs — ChatController: conversation threads and turns
//
// Threads live in the `chat_threads` ring and turns in `chat_messages`,
// keyed by the entity the conversation is about. Each stored message is
// wrapped in a {_out, _type, _next} envelope; _out holds the raw
// role/content message the model sees.

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::agent::ws::WebSocketClient;
use crate::data::{DataController, Database, Document};
use crate::infra::errors::RengloError;

#[derive(Clone)]
pub struct ChatController {
    data: DataController,
    ws: WebSocketClient,
}

impl ChatController {
    pub fn new(db: &Database, ws: WebSocketClient) -> Self {
        Self {
            data: DataController::new(db),
            ws,
        }
    }

    // -- Threads --

    /// Return the entity's current thread, creating one when none exists.
    pub fn ensure_thread(
        &self,
        portfolio: &str,
        org: &str,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Value, RengloError> {
        let threads = self.list_threads(portfolio, org, entity_type, entity_id)?;
        if let Some(thread) = threads.into_iter().next() {
            return Ok(thread);
        }

        debug!("No thread for {entity_type}/{entity_id}, creating one");
        self.create_thread(portfolio, org, entity_type, entity_id)
    }

    pub fn create_thread(
        &self,
        portfolio: &str,
        org: &str,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Value, RengloError> {
        let body = json!({
            "entity_type": entity_type,
            "entity_id": entity_id,
            "is_active": true,
            "time": Utc::now().timestamp_micros().to_string(),
        });
        let path = self
            .data
            .post_document(portfolio, org, "chat_threads", body.clone())?;
        let id = last_segment(&path);

        let mut thread = body;
        if let Some(obj) = thread.as_object_mut() {
            obj.insert("_id".into(), json!(id));
        }
        Ok(thread)
    }

    /// Threads belonging to one entity, oldest first.
    pub fn list_threads(
        &self,
        portfolio: &str,
        org: &str,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<Value>, RengloError> {
        let mut threads: Vec<Value> = self
            .fetch_ring(portfolio, org, "chat_threads")?
            .into_iter()
            .filter(|doc| {
                doc.body.get("entity_type").and_then(Value::as_str) == Some(entity_type)
                    && doc.body.get("entity_id").and_then(Value::as_str) == Some(entity_id)
            })
            .map(|doc| {
                let mut body = doc.body;
                if let Some(obj) = body.as_object_mut() {
                    obj.insert("_id".into(), json!(doc.id));
                }
                body
            })
            .collect();

        threads.sort_by(|a, b| time_field(a).cmp(&time_field(b)));
        Ok(threads)
    }

    /// Drain every page of a ring. Thread and turn lookups filter
    /// client-side, so the cursor must be followed to the end.
    fn fetch_ring(
        &self,
        portfolio: &str,
        org: &str,
        ring: &str,
    ) -> Result<Vec<Document>, RengloError> {
        let mut items = Vec::new();
        let mut lastkey: Option<String> = None;

        loop {
            let page = self
                .data
                .list_documents(portfolio, org, ring, 100, lastkey.as_deref())?;
            items.extend(page.items);
            match page.lastkey {
                Some(key) => lastkey = Some(key),
                None => break,
            }
        }

        Ok(items)
    }

    // -- Turns --

    /// Record a user message as a new turn; returns the turn document id.
    pub fn new_user_turn(
        &self,
        portfolio: &str,
        org: &str,
        entity_type: &str,
        entity_id: &str,
        thread_id: &str,
        message: &str,
    ) -> Result<String, RengloError> {
        let envelope = json!({
            "_out": {"role": "user", "content": message},
            "_type": "text",
            "_next": Value::Null,
        });
        self.append_turn(portfolio, org, entity_type, entity_id, thread_id, envelope)
    }

    /// Append any pre-built message envelope as a turn.
    pub fn append_turn(
        &self,
        portfolio: &str,
        org: &str,
        entity_type: &str,
        entity_id: &str,
        thread_id: &str,
        envelope: Value,
    ) -> Result<String, RengloError> {
        let body = json!({
            "thread": thread_id,
            "entity_type": entity_type,
            "entity_id": entity_id,
            // Microsecond resolution keeps turns ordered within one second.
            "time": Utc::now().timestamp_micros().to_string(),
            "messages": [sanitize(envelope)],
        });
        let path = self
            .data
            .post_document(portfolio, org, "chat_messages", body)?;
        Ok(last_segment(&path))
    }

    /// All message envelopes of a thread, oldest first.
    pub fn history(
        &self,
        portfolio: &str,
        org: &str,
        thread_id: &str,
    ) -> Result<Vec<Value>, RengloError> {
        let mut turns: Vec<Value> = self
            .fetch_ring(portfolio, org, "chat_messages")?
            .into_iter()
            .filter(|doc| doc.body.get("thread").and_then(Value::as_str) == Some(thread_id))
            .map(|doc| doc.body)
            .collect();
        turns.sort_by(|a, b| time_field(a).cmp(&time_field(b)));

        let mut messages = Vec::new();
        for turn in turns {
            if let Some(items) = turn.get("messages").and_then(Value::as_array) {
                messages.extend(items.iter().cloned());
            }
        }
        Ok(messages)
    }

    /// Persist an agent output as a turn and push it to the live connection,
    /// when one is attached. The push is best-effort; the stored turn is the
    /// source of truth.
    pub async fn save_chat(
        &self,
        portfolio: &str,
        org: &str,
        entity_type: &str,
        entity_id: &str,
        thread_id: &str,
        output: Value,
        msg_type: &str,
        connection_id: Option<&str>,
    ) -> Result<String, RengloError> {
        let envelope = json!({
            "_out": sanitize(output),
            "_type": msg_type,
            "_next": Value::Null,
        });

        let turn_id = self.append_turn(
            portfolio,
            org,
            entity_type,
            entity_id,
            thread_id,
            envelope.clone(),
        )?;

        if let Some(connection_id) = connection_id {
            if !self.ws.send_message(connection_id, &envelope).await {
                warn!("Live push failed for turn {turn_id}, message is persisted");
            }
        }

        Ok(turn_id)
    }
}

fn last_segment(path: &str) -> String {
    path.rsplit('/').next().unwrap_or_default().to_string()
}

fn time_field(body: &Value) -> String {
    body.get("time")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Normalize a value for storage: non-integer numbers become strings (the
/// store keeps message content textual), containers are walked recursively.
pub fn sanitize(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k, sanitize(v));
            }
            Value::Object(out)
        }
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                Value::Number(n)
            } else {
                Value::String(n.to_string())
            }
        }
        other => other,
    }
}

/// Keep only the most recent item per `key`, preserving the list order
/// (newest entries at the bottom).
pub fn prune_history(history: &[Value]) -> Vec<Value> {
    let mut seen = std::collections::HashSet::new();
    let mut pruned: Vec<Value> = Vec::new();

    for item in history.iter().rev() {
        let key = item
            .get("key")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if seen.insert(key) {
            pruned.push(item.clone());
        }
    }

    pruned.reverse();
    pruned
}
