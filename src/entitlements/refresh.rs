use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::EntitlementService;

/// Reloads the subscription every `period` until `cancel` fires.
///
/// Errors are logged and the loop keeps going. A reload already in flight
/// when `cancel` fires is allowed to finish.
pub fn spawn_refresh(
    service: Arc<EntitlementService>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(err) = service.load_subscription().await {
                        tracing::warn!(error = %err, transient = err.is_transient(), "subscription refresh failed");
                    }
                }
            }
        }
        tracing::debug!("subscription refresh stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entitlements::testing::{service_with, Script, ScriptedRemote};
    use crate::entitlements::PlanType;
    use crate::settings::{GeneralSetting, SettingsStore, WorkspaceSetting};

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test(start_paused = true)]
    async fn reloads_on_every_period_until_cancelled() {
        let remote = ScriptedRemote::new(Script::Pro);
        // Cache shorter than the period so each tick reaches the validator.
        let (svc, settings) = service_with(remote.clone(), Duration::from_millis(1));
        settings
            .upsert_workspace_setting(WorkspaceSetting::General(GeneralSetting {
                license_key: "OPAQUE-KEY".into(),
                ..Default::default()
            }))
            .await
            .unwrap();
        let svc = Arc::new(svc);
        let cancel = CancellationToken::new();
        let handle = spawn_refresh(svc.clone(), 12 * HOUR, cancel.clone());

        tokio::time::sleep(11 * HOUR).await;
        assert_eq!(remote.calls(), 0);
        assert_eq!(svc.current().plan, PlanType::Free);

        tokio::time::sleep(2 * HOUR).await;
        assert_eq!(remote.calls(), 1);
        assert_eq!(svc.current().plan, PlanType::Pro);

        cancel.cancel();
        handle.await.unwrap();
        let before = remote.calls();
        tokio::time::sleep(48 * HOUR).await;
        assert_eq!(remote.calls(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_swallowed_and_loop_continues() {
        let remote = ScriptedRemote::new(Script::Offline);
        let (svc, settings) = service_with(remote.clone(), Duration::from_millis(1));
        settings
            .upsert_workspace_setting(WorkspaceSetting::General(GeneralSetting {
                license_key: "OPAQUE-KEY".into(),
                ..Default::default()
            }))
            .await
            .unwrap();
        let cancel = CancellationToken::new();
        let handle = spawn_refresh(Arc::new(svc), HOUR, cancel.clone());

        tokio::time::sleep(3 * HOUR + Duration::from_secs(1)).await;
        assert_eq!(remote.calls(), 3);
        assert!(!handle.is_finished());

        cancel.cancel();
        handle.await.unwrap();
    }
}
