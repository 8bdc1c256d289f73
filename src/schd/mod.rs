// src/schd/mod.rs — SchdController: cron rules, job runs, handler dispatch

pub mod external;
pub mod registry;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::data::{DataController, Database, Store};
use crate::docs::DocsController;
use crate::infra::errors::RengloError;
use crate::schd::external::ExternalHandlers;
use crate::schd::registry::{split_handler_name, HandlerRegistry};

pub use crate::data::store::RuleRow;

const VALID_TRIGGERS: &[&str] = &["manual", "call", "cron"];

/// One step in a job-run pipeline, kept for the caller's audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct ActionRecord {
    pub success: bool,
    pub action: String,
    pub input: Value,
    pub output: Value,
}

/// Outcome of `create_job_run`: overall success plus the step log.
#[derive(Debug, Clone, Serialize)]
pub struct JobRunReport {
    pub success: bool,
    pub run_id: Option<String>,
    pub actions: Vec<ActionRecord>,
}

/// Normalized handler result: the canonical output plus the UI interface the
/// handler asked for, when any.
#[derive(Debug, Clone, Serialize)]
pub struct HandlerCallResult {
    pub success: bool,
    pub handler: String,
    pub interface: Option<Value>,
    pub output: Value,
}

pub struct SchdController {
    store: Arc<Mutex<Store>>,
    data: DataController,
    docs: DocsController,
    registry: Arc<HandlerRegistry>,
    external: ExternalHandlers,
}

impl SchdController {
    pub fn new(
        db: &Database,
        docs: DocsController,
        registry: Arc<HandlerRegistry>,
        external: ExternalHandlers,
    ) -> Self {
        Self {
            store: db.store(),
            data: DataController::new(db),
            docs,
            registry,
            external,
        }
    }

    // -- Rules --

    fn rule_name(portfolio: &str, org: &str, name: &str) -> String {
        format!("cron_{portfolio}_{org}_{name}")
    }

    pub fn find_rule(
        &self,
        portfolio: &str,
        org: &str,
        timer: &str,
    ) -> Result<RuleRow, RengloError> {
        let rule_name = Self::rule_name(portfolio, org, timer);
        let store = self.store.lock().expect("store lock poisoned");
        store
            .get_rule(&rule_name)?
            .ok_or(RengloError::RuleNotFound(rule_name))
    }

    pub fn create_rule(
        &self,
        portfolio: &str,
        org: &str,
        name: &str,
        schedule_expression: &str,
        payload: Value,
    ) -> Result<RuleRow, RengloError> {
        let rule_name = Self::rule_name(portfolio, org, name);
        let store = self.store.lock().expect("store lock poisoned");
        store.insert_rule(&rule_name, schedule_expression, &payload)?;
        info!("Created rule {rule_name}");
        Ok(RuleRow {
            name: rule_name,
            schedule_expression: schedule_expression.to_string(),
            payload,
            enabled: true,
        })
    }

    pub fn remove_rule(&self, portfolio: &str, org: &str, name: &str) -> Result<(), RengloError> {
        let rule_name = Self::rule_name(portfolio, org, name);
        let store = self.store.lock().expect("store lock poisoned");
        if store.delete_rule(&rule_name)? {
            info!("Removed rule {rule_name}");
            Ok(())
        } else {
            Err(RengloError::RuleNotFound(rule_name))
        }
    }

    /// All rules registered for an org.
    pub fn list_rules(&self, portfolio: &str, org: &str) -> Result<Vec<RuleRow>, RengloError> {
        let prefix = format!("cron_{portfolio}_{org}_");
        let store = self.store.lock().expect("store lock poisoned");
        Ok(store.list_rules_prefix(&prefix)?)
    }

    // -- Job runs --

    /// The entry point a cron rule fires: create a `schd_runs` document for
    /// the job, execute its handler, persist the output blob, and record the
    /// result back on the run document.
    ///
    /// Handler failures are reported in the step log (success=false), not as
    /// errors; the run document still records the attempt.
    pub async fn create_job_run(
        &self,
        portfolio: &str,
        org: &str,
        mut payload: Value,
    ) -> Result<JobRunReport, RengloError> {
        debug!("Action: create_job_run");
        let mut actions = Vec::new();

        // 1. The payload must point at an existing job document.
        let job_id = payload
            .get("schd_jobs_id")
            .and_then(Value::as_str)
            .ok_or(RengloError::MissingField("schd_jobs_id"))?
            .to_string();

        let jobdoc = self.data.get_document(portfolio, org, "schd_jobs", &job_id)?;
        actions.push(ActionRecord {
            success: true,
            action: "get_job_document".into(),
            input: payload.clone(),
            output: jobdoc.body.clone(),
        });

        // 2. Validate the trigger and stamp the run document fields.
        let trigger = payload
            .get("trigger")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        if !VALID_TRIGGERS.contains(&trigger.as_str()) {
            return Err(RengloError::InvalidTrigger(trigger));
        }

        let obj = payload
            .as_object_mut()
            .ok_or_else(|| RengloError::InvalidPayload("payload must be a JSON object".into()))?;
        obj.entry("author").or_insert(json!(""));
        obj.insert("status".into(), json!("new"));
        obj.insert("time_queued".into(), json!(Utc::now().timestamp().to_string()));
        obj.insert("time_executed".into(), json!("."));
        obj.insert("output".into(), json!("."));

        let run_path = self
            .data
            .post_document(portfolio, org, "schd_runs", payload.clone())?;
        let run_id = run_path
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        debug!("Created run document {run_path}");
        actions.push(ActionRecord {
            success: true,
            action: "create_run".into(),
            input: payload.clone(),
            output: json!({"path": run_path}),
        });

        // 3. Run the handler named in the job document.
        let Some(handler_name) = jobdoc.body.get("handler").and_then(Value::as_str) else {
            actions.push(ActionRecord {
                success: false,
                action: "call_handler".into(),
                input: payload.clone(),
                output: json!("No handler in the job document"),
            });
            return Ok(JobRunReport {
                success: false,
                run_id: Some(run_id),
                actions,
            });
        };
        let handler_name = handler_name.to_string();

        let handler_input = json!({
            "portfolio": portfolio,
            "org": org,
            "handler": handler_name,
        });
        let handler_result = self.dispatch(&handler_name, handler_input.clone(), false).await;

        let (handler_ok, handler_output) = match handler_result {
            Ok(output) => (true, json!({"success": true, "output": output})),
            Err(e) => (false, json!({"success": false, "error": e.to_string()})),
        };
        actions.push(ActionRecord {
            success: handler_ok,
            action: "call_handler".into(),
            input: handler_input,
            output: handler_output.clone(),
        });

        // 4. Persist the handler output as a blob under a date partition.
        let iso_date = Utc::now().format("%Y-%m-%d").to_string();
        let output_doc = match self
            .docs
            .post(
                portfolio,
                org,
                &format!("schd_runs/{iso_date}"),
                &handler_output.to_string(),
                "application/json",
            )
            .await
        {
            Ok(path) => path,
            Err(e) => {
                warn!("Could not store handler output: {e}");
                "Could not store handler output".to_string()
            }
        };

        // 5. Record the result on the run document.
        let changes = json!({
            "output": output_doc,
            "status": "executed",
            "time_executed": Utc::now().timestamp().to_string(),
        });
        let updated = self
            .data
            .put_document(portfolio, org, "schd_runs", &run_id, changes.clone())?;
        debug!("Recorded handler output in run document {run_id}");
        actions.push(ActionRecord {
            success: true,
            action: "record_results".into(),
            input: changes,
            output: updated.body,
        });

        Ok(JobRunReport {
            success: handler_ok,
            run_id: Some(run_id),
            actions,
        })
    }

    // -- Direct handler invocation --

    /// Run a handler outside any job context. `handler` is
    /// `extension/handler`.
    pub async fn direct_run(
        &self,
        handler: &str,
        mut payload: Value,
    ) -> Result<HandlerCallResult, RengloError> {
        let (extension, _name) = split_handler_name(handler)?;

        if let Some(obj) = payload.as_object_mut() {
            obj.insert("tool".into(), json!(extension));
        }

        let output = self.dispatch(handler, payload, false).await?;
        Ok(normalize_result(handler, output))
    }

    /// Run a handler on behalf of an org. Portfolio, org and tool in the
    /// payload are overridden with the caller's values.
    pub async fn handler_call(
        &self,
        portfolio: &str,
        org: &str,
        extension: &str,
        handler: &str,
        payload: Value,
    ) -> Result<HandlerCallResult, RengloError> {
        self.scoped_call(portfolio, org, extension, handler, payload, false)
            .await
    }

    /// Dry-run variant of `handler_call`.
    pub async fn handler_check(
        &self,
        portfolio: &str,
        org: &str,
        extension: &str,
        handler: &str,
        payload: Value,
    ) -> Result<HandlerCallResult, RengloError> {
        self.scoped_call(portfolio, org, extension, handler, payload, true)
            .await
    }

    async fn scoped_call(
        &self,
        portfolio: &str,
        org: &str,
        extension: &str,
        handler: &str,
        mut payload: Value,
        check: bool,
    ) -> Result<HandlerCallResult, RengloError> {
        let obj = payload
            .as_object_mut()
            .ok_or_else(|| RengloError::InvalidPayload("payload must be a JSON object".into()))?;
        obj.insert("portfolio".into(), json!(portfolio));
        obj.insert("org".into(), json!(org));
        obj.insert("tool".into(), json!(extension));

        let qualified = format!("{extension}/{handler}");
        let output = self.dispatch(&qualified, payload, check).await?;
        Ok(normalize_result(&qualified, output))
    }

    /// External-vs-internal switch. Externally configured extensions go over
    /// HTTP unless deactivated, in which case the in-process handler runs.
    /// Check calls always run in-process.
    async fn dispatch(
        &self,
        handler: &str,
        payload: Value,
        check: bool,
    ) -> Result<Value, RengloError> {
        let (extension, name) = split_handler_name(handler)?;

        if !check && self.external.is_external(extension) {
            if self.external.is_active(extension) {
                debug!("Calling external handler {handler}");
                return self.external.run(extension, name, &payload).await;
            }
            info!("External handlers for {extension} are deactivated, using internal handler");
        }

        self.registry.run(handler, payload, check).await
    }
}

/// Handlers may wrap their canonical output in `{output, interface}`;
/// unwrap it so callers always see the same shape.
fn normalize_result(handler: &str, output: Value) -> HandlerCallResult {
    let (canonical, interface) = match &output {
        Value::Object(map) if map.contains_key("output") => (
            map.get("output").cloned().unwrap_or(Value::Null),
            map.get("interface").cloned(),
        ),
        _ => (output, None),
    };

    HandlerCallResult {
        success: true,
        handler: handler.to_string(),
        interface,
        output: canonical,
    }
}
