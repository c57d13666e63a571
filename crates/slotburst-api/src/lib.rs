//! slotburst-api — REST API for slotburst.
//!
//! Thin axum layer over the controller: decodes triggers, picks the
//! release callback address, and maps outcomes to status codes.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/add_capacity` | Grant capacity and schedule its reversal |
//! | POST | `/del_capacity` | Release a grant (reversal callback) |
//! | GET | `/healthz` | Liveness check |

pub mod handlers;

use axum::Router;
use axum::routing::{get, post};

use slotburst_controller::{CapacityController, RELEASE_PATH, ReleaseExecutor};
use slotburst_core::config::CallbackSettings;

/// Path of the add-capacity trigger.
pub const ADD_PATH: &str = "/add_capacity";

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub controller: CapacityController,
    pub releaser: ReleaseExecutor,
    pub callback: CallbackSettings,
    /// Domain used when a request omits one.
    pub default_domain: String,
    /// Region used when a request omits one.
    pub default_region: String,
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route(ADD_PATH, post(handlers::add_capacity))
        .route(RELEASE_PATH, post(handlers::release_capacity))
        .route("/healthz", get(handlers::healthz))
        .with_state(state)
}
