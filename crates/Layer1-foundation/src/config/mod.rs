//! Config - 설정 관리
//!
//! - `plugin.rs` - 플러그인 서브시스템 설정 (검색 경로, 상태 파일)

mod plugin;

pub use plugin::{PluginSettings, DEFAULT_STATE_FILE, PLUGIN_SETTINGS_FILE};
