use std::sync::Arc;

use axum::extract::FromRef;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::entitlements::{EntitlementService, LicenseError};

#[derive(Clone)]
pub struct AppState {
    pub ents: Arc<EntitlementService>,
}

impl AppState {
    pub fn new(ents: Arc<EntitlementService>) -> Self { Self { ents } }
}

impl FromRef<AppState> for Arc<EntitlementService> {
    fn from_ref(s: &AppState) -> Arc<EntitlementService> { s.ents.clone() }
}

pub mod health;
pub mod subscription;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/healthz", get(health::healthz))
        .route(
            "/api/v1/subscription",
            get(subscription::get_subscription).patch(subscription::update_subscription),
        )
        .route("/api/v1/features/:feature", get(subscription::feature))
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorBody { error: String }

pub struct ApiError(LicenseError);

impl From<LicenseError> for ApiError {
    fn from(err: LicenseError) -> Self { Self(err) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            LicenseError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            LicenseError::Denied(_) => StatusCode::FORBIDDEN,
            LicenseError::Decode(_) | LicenseError::Transport(_) => StatusCode::BAD_GATEWAY,
            LicenseError::Settings(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}
