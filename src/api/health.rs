use std::sync::Arc;

use axum::{Json, extract::State};
use serde::Serialize;

use crate::entitlements::{EntitlementService, PlanType};

#[derive(Serialize)]
pub struct Health { status: &'static str, plan: PlanType }

pub async fn healthz(State(ents): State<Arc<EntitlementService>>) -> Json<Health> {
    Json(Health { status: "ok", plan: ents.current().plan })
}
