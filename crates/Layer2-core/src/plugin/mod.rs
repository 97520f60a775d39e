//! # Plugin System
//!
//! 부하 테스트 실행기를 위한 플러그인 런타임
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     PluginManager                           │
//! │  enabled set · plugin configs · EventRoutes  (Mutex)        │
//! │                          │                                  │
//! │  ┌───────────────────────┼───────────────────────────────┐ │
//! │  │                 PluginLoader                           │ │
//! │  │  PluginCatalog ──▶ LoadedType ──▶ Arc<dyn Plugin>      │ │
//! │  │  SidecarResolver (search roots, <unit>.json)           │ │
//! │  └───────────────────────────────────────────────────────┘ │
//! │                          │                                  │
//! │              PersistedState (plugin_config.json)            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 라이프사이클
//!
//! `Discovered → Loaded → Instantiated → Enabled → Disabled → [Enabled | Unloaded]`
//!
//! ## 예시
//!
//! ```ignore
//! let mut catalog = PluginCatalog::new();
//! register_builtins(&mut catalog);
//!
//! let settings = PluginSettings::default();
//! let loader = PluginLoader::with_settings(catalog, &settings);
//! let manager = PluginManager::new(loader, settings);
//!
//! manager.loader().load("csv_report_plugin", None)?;
//! manager.enable("csv_report_plugin", None);
//!
//! let report = manager.trigger(names::TEST_START, &json!({"host": "localhost"}));
//! for failure in &report.failures {
//!     eprintln!("{:?}: {}", failure.owner, failure.error);
//! }
//! ```

pub mod builtin;
mod catalog;
mod descriptor;
mod discovery;
mod events;
mod guard;
mod loader;
mod manager;
mod store;
mod traits;

pub use builtin::{register_builtins, CsvReportPlugin};
pub use catalog::{PluginCatalog, PluginFactory, PluginType, SourceUnit};
pub use descriptor::{MetadataSidecar, PluginConfig, PluginDescriptor, PluginMetadata, PluginVersion};
pub use discovery::SidecarResolver;
pub use events::{
    capability_handlers, handler, names, DispatchReport, EventHandler, EventRoutes,
    HandlerFailure,
};
pub use loader::{PluginLoader, Reloaded};
pub use manager::{PluginManager, PluginStatus};
pub use store::PersistedState;
pub use traits::{
    Authenticator, Capability, DataGenerator, LoadShapeProvider, MetricsMonitor, Notifier,
    Plugin, PluginState, ProtocolClient, ProtocolClientFactory, ReportGenerator, RequestRecord,
    ResultAnalyzer, ResultStore, ShapeTick, TestLifecycle,
};
