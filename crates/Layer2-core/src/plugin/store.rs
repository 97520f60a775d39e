//! Plugin Store - 플러그인 상태 영속화
//!
//! `plugin_config.json` 구조:
//!
//! ```json
//! {
//!   "enabled_plugins": ["CSVReportPlugin"],
//!   "plugin_configs": { "CSVReportPlugin": { "output_dir": "reports" } }
//! }
//! ```

use super::descriptor::PluginConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{error, info};
use volley_foundation::{JsonStore, Result};

/// 영속 상태 - 활성화된 이름과 플러그인별 설정만 저장 (인스턴스는 저장하지 않음)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub enabled_plugins: BTreeSet<String>,

    #[serde(default)]
    pub plugin_configs: BTreeMap<String, PluginConfig>,
}

impl PersistedState {
    /// 파일에서 로드
    ///
    /// 파일이 없거나 손상된 경우 빈 상태로 시작합니다.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(Some(state)) => {
                info!(
                    "Loaded plugin state from {:?}: {} enabled plugins",
                    path,
                    state.enabled_plugins.len()
                );
                state
            }
            Ok(None) => {
                info!("Plugin state file {:?} not found, using defaults", path);
                Self::default()
            }
            Err(e) => {
                error!("Failed to load plugin state {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// 파일에서 로드 (에러 전파)
    pub fn try_load(path: &Path) -> Result<Option<Self>> {
        let (store, filename) = JsonStore::for_file(path)?;
        store.load_optional(&filename)
    }

    /// 파일에 저장
    pub fn save(&self, path: &Path) -> Result<()> {
        let (store, filename) = JsonStore::for_file(path)?;
        store.save(&filename, self)?;
        info!("Saved plugin state to {:?}", path);
        Ok(())
    }
}
