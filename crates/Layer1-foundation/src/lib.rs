//! # volley-foundation
//!
//! Foundation layer for Volley:
//! - Error: 플러그인 서브시스템 에러 분류 (Discovery, Load, Dependency, ...)
//! - Storage: JsonStore (플러그인 상태 영속화)
//! - Config: PluginSettings (검색 경로, 상태 파일, 자동 활성화)

pub mod config;
pub mod error;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{PluginSettings, DEFAULT_STATE_FILE, PLUGIN_SETTINGS_FILE};

// ============================================================================
// Storage (저장소)
// ============================================================================
pub use storage::JsonStore;
