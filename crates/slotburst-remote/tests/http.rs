//! HTTP clients against a local stand-in for the ledger and task services.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::sync::Mutex;

use slotburst_core::{CommitmentKind, Grant, Scope};
use slotburst_remote::{
    HttpLedger, HttpTaskQueue, LedgerClient, RemoteError, TaskQueue, TaskSubmission,
};

const TOKEN: &str = "ledger-secret";
const GRANTS: &str = "/v1/domains/analytics/regions/US/grants";

#[derive(Clone, Default)]
struct Recorded {
    tasks: Arc<Mutex<Vec<Value>>>,
    list_tokens: Arc<Mutex<Vec<Option<String>>>>,
}

fn grant(id: &str, size: i64) -> Value {
    json!({
        "id": id,
        "size": size,
        "scope": {"domain": "analytics", "region": "US"},
        "kind": "annual",
    })
}

async fn list_grants(
    State(rec): State<Recorded>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if bearer != format!("Bearer {TOKEN}") {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthenticated"}))).into_response();
    }
    let token = query.get("page_token").cloned();
    rec.list_tokens.lock().await.push(token.clone());
    match token.as_deref() {
        None => Json(json!({"grants": [grant("g-1", 100)], "next_page_token": "p2"})).into_response(),
        Some("p2") => Json(json!({"grants": [grant("g-2", 40)], "next_page_token": ""})).into_response(),
        Some(_) => (StatusCode::BAD_REQUEST, Json(json!({"error": "bad token"}))).into_response(),
    }
}

async fn create_grant(Json(body): Json<Value>) -> Response {
    let size = body["size"].as_i64().unwrap_or_default();
    let mut created = grant("g-new", size);
    created["kind"] = body["kind"].clone();
    Json(created).into_response()
}

async fn release_grant(Json(body): Json<Value>) -> Response {
    match body["grant_id"].as_str().unwrap_or_default() {
        "gone" => (StatusCode::NOT_FOUND, Json(json!({"error": "no such grant"}))).into_response(),
        "expired" => (StatusCode::GONE, "expired").into_response(),
        "busy" => (StatusCode::CONFLICT, "é".repeat(600)).into_response(),
        "misrouted" => (StatusCode::NOT_FOUND, "404 page not found").into_response(),
        _ => Json(json!({})).into_response(),
    }
}

async fn create_task(State(rec): State<Recorded>, Json(body): Json<Value>) -> Response {
    rec.tasks.lock().await.push(body);
    Json(json!({"name": "tasks/1"})).into_response()
}

async fn start(rec: Recorded) -> String {
    let app = Router::new()
        .route(GRANTS, get(list_grants).post(create_grant))
        .route("/v1/grants:release", post(release_grant))
        .route(
            "/v1/locations/us-central1/queues/slot-reversals/tasks",
            post(create_task),
        )
        .with_state(rec);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn scope() -> Scope {
    Scope::new("analytics", "US").unwrap()
}

fn ledger(base: &str) -> HttpLedger {
    HttpLedger::new(base, Some(TOKEN.into()), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn lists_pages_with_bearer_token() {
    let rec = Recorded::default();
    let base = start(rec.clone()).await;
    let ledger = ledger(&base);

    let first = ledger.list_grants(&scope(), None).await.unwrap();
    assert_eq!(first.grants.len(), 1);
    assert_eq!(first.grants[0].kind, CommitmentKind::Annual);
    assert_eq!(first.next_token(), Some("p2"));

    let last = ledger.list_grants(&scope(), first.next_token()).await.unwrap();
    assert_eq!(last.grants[0].id, "g-2");
    assert_eq!(last.next_token(), None);

    assert_eq!(*rec.list_tokens.lock().await, vec![None, Some("p2".to_string())]);
}

#[tokio::test]
async fn missing_token_is_status_error() {
    let base = start(Recorded::default()).await;
    let anonymous = HttpLedger::new(&base, None, Duration::from_secs(5)).unwrap();
    let err = anonymous.list_grants(&scope(), None).await.unwrap_err();
    assert!(matches!(err, RemoteError::Status { status: 401, .. }));
}

#[tokio::test]
async fn create_returns_ledger_grant() {
    let base = start(Recorded::default()).await;
    let created = ledger(&base)
        .create_grant(&scope(), 75, CommitmentKind::Flex)
        .await
        .unwrap();
    assert_eq!(
        created,
        Grant {
            id: "g-new".into(),
            size: 75,
            scope: scope(),
            kind: CommitmentKind::Flex,
        }
    );
}

#[tokio::test]
async fn release_maps_service_statuses() {
    let base = start(Recorded::default()).await;
    let ledger = ledger(&base);

    ledger.release_grant("g-1", false).await.unwrap();
    assert!(ledger.release_grant("gone", false).await.unwrap_err().is_not_found());
    assert!(ledger.release_grant("expired", false).await.unwrap_err().is_not_found());

    match ledger.release_grant("busy", false).await.unwrap_err() {
        RemoteError::Status { status, body } => {
            assert_eq!(status, 409);
            assert!(body.len() <= 512);
            assert!(!body.is_empty());
            assert!(body.chars().all(|c| c == 'é'));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn plain_404_is_not_treated_as_released() {
    let base = start(Recorded::default()).await;
    let err = ledger(&base)
        .release_grant("misrouted", false)
        .await
        .unwrap_err();
    assert!(!err.is_not_found());
    assert!(matches!(err, RemoteError::Status { status: 404, .. }));

    // A base URL that misses every route gets axum's bare 404.
    let wrong_base = ledger(&format!("{base}/ledger-v2"));
    let err = wrong_base.release_grant("g-1", false).await.unwrap_err();
    assert!(!err.is_not_found());
}

#[tokio::test]
async fn task_submission_body_shape() {
    let rec = Recorded::default();
    let base = start(rec.clone()).await;
    let queue = HttpTaskQueue::new(
        &base,
        None,
        "us-central1",
        "slot-reversals",
        Duration::from_secs(5),
    )
    .unwrap();

    let handle = queue
        .schedule_task(TaskSubmission {
            target_url: "https://burst.example.com/del_capacity".into(),
            body: json!({"grant_id": "g-7"}),
            schedule_time: 1_700_000_600,
        })
        .await
        .unwrap();
    assert_eq!(handle.name, "tasks/1");

    let tasks = rec.tasks.lock().await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(
        tasks[0],
        json!({
            "target_url": "https://burst.example.com/del_capacity",
            "http_method": "POST",
            "headers": {"Content-Type": "application/json"},
            "body": {"grant_id": "g-7"},
            "schedule_time": 1_700_000_600u64,
        })
    );
}
