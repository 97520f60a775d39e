//! volley-core: Plugin Runtime for Volley
//!
//! Layer2 - 플러그인 발견/로드/라이프사이클/이벤트 라우팅
//!
//! # 주요 모듈
//!
//! - `plugin`: 플러그인 계약, 카탈로그, 로더, 매니저, 내장 플러그인
//!
//! # 사용 예시
//!
//! ```ignore
//! use volley_core::{register_builtins, PluginCatalog, PluginLoader, PluginManager};
//! use volley_foundation::PluginSettings;
//!
//! let mut catalog = PluginCatalog::new();
//! register_builtins(&mut catalog);
//!
//! let settings = PluginSettings::load_from(".")?;
//! let manager = PluginManager::new(PluginLoader::with_settings(catalog, &settings), settings);
//! manager.discover_and_enable();
//!
//! // 테스트 드라이버에서 이벤트 발행
//! let report = manager.trigger("test_start", &serde_json::json!({}));
//! assert!(report.is_clean());
//!
//! manager.shutdown()?;
//! ```

pub mod plugin;

// Re-exports: Plugin
pub use plugin::{
    // Builtins
    register_builtins,
    // Capabilities
    Capability,
    CsvReportPlugin,
    // Events
    DispatchReport,
    EventHandler,
    HandlerFailure,
    MetricsMonitor,
    Notifier,
    PersistedState,
    // Traits
    Plugin,
    // Catalog
    PluginCatalog,
    PluginConfig,
    // Descriptor
    PluginDescriptor,
    // Loader
    PluginLoader,
    // Manager
    PluginManager,
    PluginMetadata,
    PluginState,
    PluginStatus,
    PluginVersion,
    ReportGenerator,
    RequestRecord,
    SidecarResolver,
    TestLifecycle,
};

// Layer1 re-exports
pub use volley_foundation::{Error, PluginSettings, Result};

/// Layer2 버전
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
