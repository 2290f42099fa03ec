
use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkspaceSettingKey {
    General,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralSetting {
    #[serde(default)]
    pub license_key: String,
    #[serde(default)]
    pub branding: Option<String>,
    #[serde(default)]
    pub custom_style: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "key", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkspaceSetting {
    General(GeneralSetting),
}

impl WorkspaceSetting {
    pub fn key(&self) -> WorkspaceSettingKey {
        match self {
            WorkspaceSetting::General(_) => WorkspaceSettingKey::General,
        }
    }
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_workspace_setting(&self, key: WorkspaceSettingKey) -> Result<Option<WorkspaceSetting>>;

    /// Replaces the record stored under `setting.key()`.
    async fn upsert_workspace_setting(&self, setting: WorkspaceSetting) -> Result<WorkspaceSetting>;
}

#[derive(Default)]
pub struct InMemorySettingsStore {
    records: RwLock<HashMap<WorkspaceSettingKey, WorkspaceSetting>>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn get_workspace_setting(&self, key: WorkspaceSettingKey) -> Result<Option<WorkspaceSetting>> {
        Ok(self.records.read().get(&key).cloned())
    }

    async fn upsert_workspace_setting(&self, setting: WorkspaceSetting) -> Result<WorkspaceSetting> {
        self.records.write().insert(setting.key(), setting.clone());
        Ok(setting)
    }
}
