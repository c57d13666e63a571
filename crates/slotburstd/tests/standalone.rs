//! End-to-end run against in-memory backends: config file to router,
//! burst, then the reversal delivered back over HTTP when it falls due.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use slotburst_api::{ApiState, build_router};
use slotburst_controller::{CapacityController, ControllerConfig, ReleaseExecutor};
use slotburst_core::config::Backend;
use slotburst_core::{BurstConfig, CommitmentKind, Grant, Scope};
use slotburst_remote::{InMemoryLedger, InMemoryTaskQueue};

const CONFIG: &str = r#"
[budget]
max_slots = 500
domain = "analytics-admin"
default_region = "US"
default_reversal_delay = "10m"

[ledger]
url = "memory"

[tasks]
url = "memory"
queue_id = "slot-reversals"
queue_location = "us-central1"

[callback]
public_base_url = "https://burst.example.com/"
"#;

fn request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn burst_then_reversal_restores_pool() {
    let settings = BurstConfig::from_toml_str(CONFIG).unwrap().validate().unwrap();
    assert_eq!(settings.ledger, Backend::Memory);

    let ledger = InMemoryLedger::new();
    let queue = InMemoryTaskQueue::new();
    let scope = Scope::new("analytics-admin", "US").unwrap();
    ledger
        .insert(Grant {
            id: "baseline".into(),
            size: 300,
            scope: scope.clone(),
            kind: CommitmentKind::Annual,
        })
        .await;

    let config = ControllerConfig::from_settings(&settings);
    let app = build_router(ApiState {
        controller: CapacityController::new(
            config.clone(),
            Arc::new(ledger.clone()),
            Arc::new(queue.clone()),
        ),
        releaser: ReleaseExecutor::new(config, Arc::new(ledger.clone())),
        callback: settings.callback.clone(),
        default_domain: settings.domain.clone(),
        default_region: settings.default_region.clone(),
    });

    // First burst fits; the second is clamped; the third is refused.
    let mut committed = Vec::new();
    for (increment, expected) in [(150, Some(150)), (150, Some(50)), (10, None)] {
        let resp = app
            .clone()
            .oneshot(request("/add_capacity", json!({"requested_increment": increment})))
            .await
            .unwrap();
        match expected {
            Some(size) => {
                assert_eq!(resp.status(), StatusCode::OK);
                let body = json_body(resp).await;
                assert_eq!(body["data"]["committed_size"], size);
                committed.push(body["data"].clone());
            }
            None => assert_eq!(resp.status(), StatusCode::CONFLICT),
        }
    }
    assert_eq!(ledger.total(&scope).await, 500);

    // Reversals are due ten minutes out and point at the public address.
    let fire_time = committed[1]["reversal_fire_time"].as_u64().unwrap();
    let due = queue.take_due(fire_time).await;
    assert_eq!(due.len(), 2);

    for (_, task) in due {
        assert_eq!(task.target_url, "https://burst.example.com/del_capacity");
        let resp = app
            .clone()
            .oneshot(request("/del_capacity", task.body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    assert_eq!(ledger.total(&scope).await, 300);
}
