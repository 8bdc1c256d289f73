// tests/schd_test.rs — Integration test: scheduler pipeline end to end

use async_trait::async_trait;
use renglo::data::{DataController, Database};
use renglo::docs::DocsController;
use renglo::infra::config::HandlersConfig;
use renglo::infra::errors::RengloError;
use renglo::schd::external::ExternalHandlers;
use renglo::schd::registry::{Handler, HandlerRegistry};
use renglo::schd::SchdController;
use serde_json::{json, Value};
use std::sync::Arc;

struct ReportHandler;

#[async_trait]
impl Handler for ReportHandler {
    fn name(&self) -> &str {
        "demo/report"
    }

    async fn run(&self, payload: Value) -> anyhow::Result<Value> {
        Ok(json!({"rows": 3, "org": payload["org"]}))
    }

    async fn check(&self, _payload: Value) -> anyhow::Result<Value> {
        Ok(json!({"output": "would run", "interface": "preview"}))
    }
}

struct BrokenHandler;

#[async_trait]
impl Handler for BrokenHandler {
    fn name(&self) -> &str {
        "demo/broken"
    }

    async fn run(&self, _payload: Value) -> anyhow::Result<Value> {
        anyhow::bail!("upstream unavailable")
    }
}

fn setup(docs_root: &std::path::Path) -> (Database, SchdController) {
    let db = Database::in_memory().unwrap();

    let mut registry = HandlerRegistry::new();
    registry.register(Box::new(ReportHandler));
    registry.register(Box::new(BrokenHandler));

    let schd = SchdController::new(
        &db,
        DocsController::new(docs_root.to_path_buf()),
        Arc::new(registry),
        ExternalHandlers::from_config(&HandlersConfig::default()),
    );
    (db, schd)
}

fn create_job(db: &Database, handler: Option<&str>) -> String {
    let mut body = json!({"name": "nightly report"});
    if let Some(handler) = handler {
        body["handler"] = json!(handler);
    }
    let path = DataController::new(db)
        .post_document("p1", "o1", "schd_jobs", body)
        .unwrap();
    path.rsplit('/').next().unwrap().to_string()
}

#[tokio::test]
async fn test_create_job_run_executes_handler() {
    let tmp = tempfile::tempdir().unwrap();
    let (db, schd) = setup(tmp.path());
    let job_id = create_job(&db, Some("demo/report"));

    let report = schd
        .create_job_run("p1", "o1", json!({"schd_jobs_id": job_id, "trigger": "manual"}))
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.actions.len(), 4);
    assert!(report.actions.iter().all(|a| a.success));

    // The run document records the executed state and the output blob path
    let run_id = report.run_id.unwrap();
    let run = DataController::new(&db)
        .get_document("p1", "o1", "schd_runs", &run_id)
        .unwrap();
    assert_eq!(run.body["status"], "executed");
    assert_ne!(run.body["time_executed"], ".");

    let output_path = run.body["output"].as_str().unwrap().to_string();
    let stored = DocsController::new(tmp.path().to_path_buf())
        .get(&output_path)
        .await
        .unwrap();
    let stored: Value = serde_json::from_str(&stored).unwrap();
    assert_eq!(stored["success"], true);
    assert_eq!(stored["output"]["rows"], 3);
}

#[tokio::test]
async fn test_create_job_run_records_handler_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let (db, schd) = setup(tmp.path());
    let job_id = create_job(&db, Some("demo/broken"));

    let report = schd
        .create_job_run("p1", "o1", json!({"schd_jobs_id": job_id, "trigger": "cron"}))
        .await
        .unwrap();

    assert!(!report.success);
    let call = report
        .actions
        .iter()
        .find(|a| a.action == "call_handler")
        .unwrap();
    assert!(!call.success);
    assert!(call.output["error"]
        .as_str()
        .unwrap()
        .contains("upstream unavailable"));

    // The run is still persisted and marked executed
    let run_id = report.run_id.unwrap();
    let run = DataController::new(&db)
        .get_document("p1", "o1", "schd_runs", &run_id)
        .unwrap();
    assert_eq!(run.body["status"], "executed");
}

#[tokio::test]
async fn test_create_job_run_without_handler_field() {
    let tmp = tempfile::tempdir().unwrap();
    let (db, schd) = setup(tmp.path());
    let job_id = create_job(&db, None);

    let report = schd
        .create_job_run("p1", "o1", json!({"schd_jobs_id": job_id, "trigger": "call"}))
        .await
        .unwrap();

    assert!(!report.success);
    assert!(report.run_id.is_some());
}

#[tokio::test]
async fn test_create_job_run_validation() {
    let tmp = tempfile::tempdir().unwrap();
    let (db, schd) = setup(tmp.path());

    let err = schd
        .create_job_run("p1", "o1", json!({"trigger": "manual"}))
        .await
        .unwrap_err();
    assert!(matches!(err, RengloError::MissingField("schd_jobs_id")));

    let err = schd
        .create_job_run("p1", "o1", json!({"schd_jobs_id": "missing", "trigger": "manual"}))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let job_id = create_job(&db, Some("demo/report"));
    let err = schd
        .create_job_run("p1", "o1", json!({"schd_jobs_id": job_id, "trigger": "webhook"}))
        .await
        .unwrap_err();
    assert!(matches!(err, RengloError::InvalidTrigger(_)));
}

#[tokio::test]
async fn test_handler_call_scopes_payload() {
    let tmp = tempfile::tempdir().unwrap();
    let (_db, schd) = setup(tmp.path());

    let result = schd
        .handler_call("p1", "o1", "demo", "report", json!({"extra": 1}))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.handler, "demo/report");
    // The handler saw the injected org
    assert_eq!(result.output["org"], "o1");
}

#[tokio::test]
async fn test_handler_check_uses_check_path() {
    let tmp = tempfile::tempdir().unwrap();
    let (_db, schd) = setup(tmp.path());

    let result = schd
        .handler_check("p1", "o1", "demo", "report", json!({}))
        .await
        .unwrap();

    assert_eq!(result.output, json!("would run"));
    assert_eq!(result.interface, Some(json!("preview")));
}

#[tokio::test]
async fn test_direct_run_and_unknown_handler() {
    let tmp = tempfile::tempdir().unwrap();
    let (_db, schd) = setup(tmp.path());

    let result = schd
        .direct_run("demo/report", json!({"org": "direct"}))
        .await
        .unwrap();
    assert_eq!(result.output["rows"], 3);

    let err = schd
        .direct_run("demo/missing", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, RengloError::HandlerNotFound(_)));

    let err = schd.direct_run("noslash", json!({})).await.unwrap_err();
    assert!(matches!(err, RengloError::InvalidHandlerName(_)));
}

#[test]
fn test_rule_lifecycle() {
    let tmp = tempfile::tempdir().unwrap();
    let (_db, schd) = setup(tmp.path());

    schd.create_rule("p1", "o1", "nightly", "rate(1 day)", json!({"trigger": "cron"}))
        .unwrap();
    schd.create_rule("p1", "o1", "weekly", "rate(7 days)", json!({"trigger": "cron"}))
        .unwrap();
    schd.create_rule("p1", "o2", "nightly", "rate(1 day)", json!({}))
        .unwrap();

    let rule = schd.find_rule("p1", "o1", "nightly").unwrap();
    assert_eq!(rule.name, "cron_p1_o1_nightly");
    assert_eq!(rule.schedule_expression, "rate(1 day)");

    assert_eq!(schd.list_rules("p1", "o1").unwrap().len(), 2);

    schd.remove_rule("p1", "o1", "weekly").unwrap();
    assert!(schd
        .remove_rule("p1", "o1", "weekly")
        .unwrap_err()
        .is_not_found());
    assert!(schd
        .find_rule("p1", "o1", "weekly")
        .unwrap_err()
        .is_not_found());
}
