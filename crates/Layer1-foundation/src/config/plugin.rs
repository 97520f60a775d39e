//! Plugin Settings - 플러그인 서브시스템 설정
//!
//! JSON(`JsonStore`) 또는 TOML 문서에서 로드할 수 있습니다.

use crate::storage::JsonStore;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 설정 파일명
pub const PLUGIN_SETTINGS_FILE: &str = "plugins.json";

/// 기본 상태 파일명 (enabled_plugins / plugin_configs)
pub const DEFAULT_STATE_FILE: &str = "plugin_config.json";

/// 플러그인 서브시스템 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSettings {
    /// 메타데이터 사이드카 검색 경로 (순서대로 검색)
    #[serde(default = "default_search_roots")]
    pub search_roots: Vec<PathBuf>,

    /// 영속 상태 파일 경로
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// 사이드카 확장자
    #[serde(default = "default_metadata_extension")]
    pub metadata_extension: String,

    /// 저장된 enabled 목록에 따라 자동 활성화
    #[serde(default = "default_true")]
    pub auto_enable: bool,

    /// shutdown 시 상태 저장
    #[serde(default = "default_true")]
    pub save_on_shutdown: bool,
}

fn default_search_roots() -> Vec<PathBuf> {
    vec![PathBuf::from("plugins"), PathBuf::from("src/plugins/builtin")]
}

fn default_state_file() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_FILE)
}

fn default_metadata_extension() -> String {
    "json".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            search_roots: default_search_roots(),
            state_file: default_state_file(),
            metadata_extension: default_metadata_extension(),
            auto_enable: true,
            save_on_shutdown: true,
        }
    }
}

impl PluginSettings {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// 디렉토리의 plugins.json 로드 (없으면 기본값)
    pub fn load_from(dir: impl AsRef<Path>) -> Result<Self> {
        let store = JsonStore::new(dir.as_ref());
        Ok(store
            .load_optional::<PluginSettings>(PLUGIN_SETTINGS_FILE)?
            .unwrap_or_default())
    }

    /// TOML 문서에서 로드
    ///
    /// 최상위 키 또는 `[plugins]` 테이블 모두 허용합니다.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct Wrapped {
            plugins: PluginSettings,
        }

        if let Ok(wrapped) = toml::from_str::<Wrapped>(content) {
            return Ok(wrapped.plugins);
        }
        Ok(toml::from_str(content)?)
    }

    /// 디렉토리에 plugins.json 저장
    pub fn save_to(&self, dir: impl AsRef<Path>) -> Result<()> {
        JsonStore::new(dir.as_ref()).save(PLUGIN_SETTINGS_FILE, self)
    }

    // ========================================================================
    // Builder
    // ========================================================================

    /// 검색 경로를 주어진 목록으로 교체
    pub fn with_search_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.search_roots = roots;
        self
    }

    /// 검색 경로 추가
    pub fn with_search_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.search_roots.push(root.into());
        self
    }

    /// 상태 파일 경로 설정
    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_file = path.into();
        self
    }

    /// 자동 활성화 설정
    pub fn with_auto_enable(mut self, auto_enable: bool) -> Self {
        self.auto_enable = auto_enable;
        self
    }
}
