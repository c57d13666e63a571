//! REST API handlers.
//!
//! Each handler returns the same JSON envelope. Failures carry the error
//! `kind` so benign rejections can be told apart from remote failures, and
//! an orphaned grant id when a reversal could not be scheduled.

use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header::HOST;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use slotburst_controller::{AddCapacity, CallbackTarget};
use slotburst_core::{CapacityError, CapacityResult, ReleaseOutcome, ReleasePayload, Scope};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    grant_id: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
            kind: None,
            grant_id: None,
        })
    }
}

/// HTTP status for each outcome class.
pub fn status_for(err: &CapacityError) -> StatusCode {
    match err {
        CapacityError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        CapacityError::BudgetExhausted { .. } => StatusCode::CONFLICT,
        CapacityError::QueryError(_)
        | CapacityError::IssueError(_)
        | CapacityError::SizeMismatch { .. }
        | CapacityError::ReleaseError { .. } => StatusCode::BAD_GATEWAY,
        CapacityError::SchedulingError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &CapacityError) -> impl IntoResponse {
    (
        status_for(err),
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(err.to_string()),
            kind: Some(err.kind()),
            grant_id: err.grant_id().map(str::to_string),
        }),
    )
}

/// Undecodable bodies get the same envelope as any other invalid input.
fn rejected(rejection: JsonRejection) -> Response {
    debug!(status = %rejection.status(), "request body rejected");
    error_response(&CapacityError::InvalidInput(rejection.body_text())).into_response()
}

// ── Add capacity ───────────────────────────────────────────────────

/// Scope as sent by callers; missing parts fall back to defaults.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ScopeBody {
    pub domain: Option<String>,
    pub region: Option<String>,
}

/// Add-capacity request body.
///
/// `extra_slot`, top-level `region`, and `minutes` are accepted for
/// callers still using the older payload. Sending both `extra_slot` and
/// `requested_increment` is a duplicate field and rejected.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AddCapacityBody {
    #[serde(default)]
    pub scope: Option<ScopeBody>,
    #[serde(default, alias = "extra_slot")]
    pub requested_increment: Option<i64>,
    #[serde(default)]
    pub reversal_delay_secs: Option<u64>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub minutes: Option<i64>,
}

impl AddCapacityBody {
    fn into_request(self, state: &ApiState) -> CapacityResult<AddCapacity> {
        let requested_increment = self.requested_increment.ok_or_else(|| {
            CapacityError::InvalidInput("requested_increment is required".into())
        })?;

        let scope_body = self.scope.unwrap_or_default();
        let domain = scope_body
            .domain
            .unwrap_or_else(|| state.default_domain.clone());
        let region = scope_body
            .region
            .or(self.region)
            .unwrap_or_else(|| state.default_region.clone());

        // Older callers send `minutes`, where a non-positive value means "default".
        let reversal_delay = match (self.reversal_delay_secs, self.minutes) {
            (Some(secs), _) => Some(Duration::from_secs(secs)),
            (None, Some(m)) if m > 0 => Some(Duration::from_secs((m as u64).saturating_mul(60))),
            _ => None,
        };

        Ok(AddCapacity {
            scope: Scope::new(domain, region)?,
            requested_increment,
            reversal_delay,
        })
    }
}

/// POST /add_capacity
pub async fn add_capacity(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Result<Json<AddCapacityBody>, JsonRejection>,
) -> impl IntoResponse {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(rejection),
    };
    let host = headers.get(HOST).and_then(|v| v.to_str().ok());
    debug!(?body, ?host, "add-capacity request");

    let result = match body.into_request(&state).and_then(|request| {
        CallbackTarget::resolve(&state.callback, host).map(|target| (request, target))
    }) {
        Ok((request, target)) => state.controller.add_capacity(request, &target).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(committed) => ApiResponse::ok(committed).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

// ── Release ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Released {
    grant_id: String,
    outcome: ReleaseOutcome,
}

/// POST /del_capacity
pub async fn release_capacity(
    State(state): State<ApiState>,
    payload: Result<Json<ReleasePayload>, JsonRejection>,
) -> impl IntoResponse {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejected(rejection),
    };
    match state.releaser.release(&payload.grant_id).await {
        Ok(outcome) => ApiResponse::ok(Released {
            grant_id: payload.grant_id,
            outcome,
        })
        .into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

// ── Health ─────────────────────────────────────────────────────────

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
