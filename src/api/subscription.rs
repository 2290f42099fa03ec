use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;

use super::ApiError;
use crate::entitlements::{EntitlementService, PlanType, Subscription};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    plan: PlanType,
    expires_at: Option<String>,
}

impl From<Subscription> for SubscriptionView {
    fn from(sub: Subscription) -> Self {
        Self {
            plan: sub.plan,
            expires_at: sub.expires_at.and_then(|at| at.format(&Rfc3339).ok()),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubscriptionRequest {
    pub license_key: String,
}

#[derive(Serialize)]
pub struct FeatureView {
    feature: String,
    enabled: bool,
}

pub async fn get_subscription(State(ents): State<Arc<EntitlementService>>) -> Json<SubscriptionView> {
    Json(ents.get_subscription().await.into())
}

pub async fn update_subscription(
    State(ents): State<Arc<EntitlementService>>,
    Json(req): Json<UpdateSubscriptionRequest>,
) -> Result<Json<SubscriptionView>, ApiError> {
    let sub = ents.update_subscription(&req.license_key).await?;
    Ok(Json(sub.into()))
}

pub async fn feature(
    State(ents): State<Arc<EntitlementService>>,
    Path(feature): Path<String>,
) -> Json<FeatureView> {
    let enabled = ents.is_feature_enabled(&feature);
    Json(FeatureView { feature, enabled })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    use crate::api::{router, AppState};
    use crate::entitlements::testing::{service_with, Script, ScriptedRemote};
    use crate::entitlements::Denial;

    async fn serve(script: Script) -> String {
        let (svc, _) = service_with(ScriptedRemote::new(script), Duration::from_secs(60));
        let app = router(AppState::new(std::sync::Arc::new(svc)));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    async fn patch(base: &str, key: &str) -> (u16, Value) {
        let resp = reqwest::Client::new()
            .patch(format!("{base}/api/v1/subscription"))
            .json(&json!({"licenseKey": key}))
            .send()
            .await
            .unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }

    async fn get(url: String) -> Value {
        reqwest::get(url).await.unwrap().json().await.unwrap()
    }

    #[tokio::test]
    async fn update_then_read_back() {
        let base = serve(Script::Pro).await;
        assert_eq!(get(format!("{base}/api/v1/subscription")).await, json!({"plan": "FREE", "expiresAt": null}));

        let (status, body) = patch(&base, "KEY-123").await;
        assert_eq!(status, 200);
        assert_eq!(body, json!({"plan": "PRO", "expiresAt": null}));

        assert_eq!(get(format!("{base}/api/v1/subscription")).await["plan"], "PRO");
        assert_eq!(get(format!("{base}/api/healthz")).await, json!({"status": "ok", "plan": "PRO"}));
        assert_eq!(
            get(format!("{base}/api/v1/features/custom_branding")).await,
            json!({"feature": "custom_branding", "enabled": true})
        );
        assert_eq!(get(format!("{base}/api/v1/features/teleport")).await["enabled"], false);
    }

    #[tokio::test]
    async fn errors_map_to_status_codes() {
        let base = serve(Script::Deny(Denial::Chargebacked)).await;
        let (status, body) = patch(&base, "KEY-123").await;
        assert_eq!(status, 403);
        assert_eq!(body["error"], "purchase was charged back");

        let (status, _) = patch(&base, "").await;
        assert_eq!(status, 400);

        let base = serve(Script::Offline).await;
        let (status, _) = patch(&base, "KEY-123").await;
        assert_eq!(status, 502);
    }
}
