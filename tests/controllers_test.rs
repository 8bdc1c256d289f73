// tests/controllers_test.rs — Integration test: controllers over one database

use pretty_assertions::assert_eq;
use renglo::agent::ChatController;
use renglo::agent::WebSocketClient;
use renglo::blueprint::{BlueprintController, StateController};
use renglo::data::{DataController, Database};
use renglo::infra::config::WebSocketConfig;
use serde_json::json;

#[test]
fn test_document_facade_round_trip() {
    let db = Database::in_memory().unwrap();
    let dac = DataController::new(&db);

    let path = dac
        .post_document("p1", "o1", "deals", json!({"amount": 100, "stage": "new"}))
        .unwrap();
    let id = path.rsplit('/').next().unwrap().to_string();

    // Partial update keeps untouched keys
    let doc = dac
        .put_document("p1", "o1", "deals", &id, json!({"stage": "won"}))
        .unwrap();
    assert_eq!(doc.body["amount"], 100);
    assert_eq!(doc.body["stage"], "won");

    let page = dac.list_documents("p1", "o1", "deals", 10, None).unwrap();
    assert_eq!(page.items.len(), 1);
    assert!(page.lastkey.is_none());

    dac.delete_document("p1", "o1", "deals", &id).unwrap();
    assert!(dac
        .get_document("p1", "o1", "deals", &id)
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn test_chat_thread_and_save() {
    let db = Database::in_memory().unwrap();
    let chc = ChatController::new(
        &db,
        WebSocketClient::from_config(&WebSocketConfig::default()),
    );

    let thread = chc.ensure_thread("p1", "o1", "deal", "d-1").unwrap();
    let tid = thread["_id"].as_str().unwrap().to_string();

    chc.new_user_turn("p1", "o1", "deal", "d-1", &tid, "what is the status?")
        .unwrap();
    chc.save_chat(
        "p1",
        "o1",
        "deal",
        "d-1",
        &tid,
        json!({"role": "assistant", "content": "stage is won"}),
        "text",
        None,
    )
    .await
    .unwrap();

    let history = chc.history("p1", "o1", &tid).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["_out"]["role"], "user");
    assert_eq!(history[1]["_out"]["content"], "stage is won");
    assert_eq!(history[1]["_type"], "text");
}

#[test]
fn test_ensure_thread_scans_past_first_page() {
    let db = Database::in_memory().unwrap();
    let chc = ChatController::new(
        &db,
        WebSocketClient::from_config(&WebSocketConfig::default()),
    );

    let mut ids = Vec::new();
    for i in 0..150 {
        let thread = chc
            .ensure_thread("p1", "o1", "deal", &format!("d-{i}"))
            .unwrap();
        ids.push(thread["_id"].as_str().unwrap().to_string());
    }

    // A second pass must find every existing thread, not create duplicates
    for (i, id) in ids.iter().enumerate() {
        let thread = chc
            .ensure_thread("p1", "o1", "deal", &format!("d-{i}"))
            .unwrap();
        assert_eq!(thread["_id"].as_str().unwrap(), id.as_str());
    }

    let dac = DataController::new(&db);
    let mut total = 0;
    let mut lastkey: Option<String> = None;
    loop {
        let page = dac
            .list_documents("p1", "o1", "chat_threads", 100, lastkey.as_deref())
            .unwrap();
        total += page.items.len();
        match page.lastkey {
            Some(key) => lastkey = Some(key),
            None => break,
        }
    }
    assert_eq!(total, 150);
}

#[test]
fn test_history_spans_multiple_pages() {
    let db = Database::in_memory().unwrap();
    let chc = ChatController::new(
        &db,
        WebSocketClient::from_config(&WebSocketConfig::default()),
    );

    let thread = chc.ensure_thread("p1", "o1", "deal", "d-1").unwrap();
    let tid = thread["_id"].as_str().unwrap().to_string();

    for i in 0..120 {
        chc.new_user_turn("p1", "o1", "deal", "d-1", &tid, &format!("message {i}"))
            .unwrap();
    }

    let history = chc.history("p1", "o1", &tid).unwrap();
    assert_eq!(history.len(), 120);
    assert_eq!(history[0]["_out"]["content"], "message 0");
    assert_eq!(history[119]["_out"]["content"], "message 119");
}

#[test]
fn test_blueprint_state_over_shared_db() {
    let db = Database::in_memory().unwrap();
    let bpc = BlueprintController::new(&db);

    bpc.put_blueprint("p1", "deal", 1, json!({"fields": ["amount"]}))
        .unwrap();
    bpc.put_blueprint("p1", "deal", 2, json!({"fields": ["amount", "stage"]}))
        .unwrap();

    let stc = StateController::new(&db, "p1");
    let state = stc.get_state("deal", "last").unwrap();
    assert_eq!(state.version, 2);
    assert_eq!(state.body["fields"], json!(["amount", "stage"]));
}
