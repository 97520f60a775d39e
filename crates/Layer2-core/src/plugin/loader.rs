//! Plugin Loader - 타입/인스턴스 소유자
//!
//! 카탈로그에서 소스 단위를 발견하고, 구현 타입을 검증하여 로드하며,
//! 인스턴스의 생성과 정리를 담당합니다. 이름당 인스턴스는 최대 하나입니다.
//!
//! 내부 락은 플러그인 코드(생성자, `initialize`, `cleanup`)를 호출하는 동안
//! 잡고 있지 않습니다.

use super::catalog::{PluginCatalog, PluginType, SourceUnit};
use super::descriptor::{PluginConfig, PluginDescriptor, PluginMetadata};
use super::discovery::SidecarResolver;
use super::guard::guarded;
use super::traits::Plugin;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use volley_foundation::{Error, PluginSettings, Result};

/// 로드된 타입 레코드
struct LoadedType {
    plugin_type: PluginType,
    metadata: PluginMetadata,
}

#[derive(Default)]
struct LoaderState {
    /// 이름 -> 로드된 타입
    loaded: HashMap<String, LoadedType>,

    /// 로드 순서
    order: Vec<String>,

    /// 이름 -> 인스턴스
    instances: HashMap<String, Arc<dyn Plugin>>,
}

/// `reload` 결과
#[derive(Debug, Clone)]
pub struct Reloaded {
    /// 새로 로드된 디스크립터
    pub descriptor: PluginDescriptor,

    /// 언로드 직전 인스턴스의 설정 (인스턴스가 있었던 경우)
    pub previous_config: Option<PluginConfig>,
}

/// 플러그인 로더
pub struct PluginLoader {
    catalog: PluginCatalog,
    resolver: SidecarResolver,
    state: Mutex<LoaderState>,
}

impl PluginLoader {
    /// 새 로더 생성
    pub fn new(catalog: PluginCatalog, resolver: SidecarResolver) -> Self {
        Self {
            catalog,
            resolver,
            state: Mutex::new(LoaderState::default()),
        }
    }

    /// 설정으로 생성
    pub fn with_settings(catalog: PluginCatalog, settings: &PluginSettings) -> Self {
        Self::new(catalog, SidecarResolver::from_settings(settings))
    }

    pub fn catalog(&self) -> &PluginCatalog {
        &self.catalog
    }

    pub fn resolver(&self) -> &SidecarResolver {
        &self.resolver
    }

    // ========================================================================
    // 발견
    // ========================================================================

    /// 후보 단위 발견
    ///
    /// 비공개 단위는 건너뛰고, 각 단위를 시험 생성하여 유효한 구현 타입이
    /// 정확히 하나인 경우만 반환합니다. 실패한 단위는 경고 후 건너뜁니다.
    pub fn discover(&self) -> Vec<String> {
        let mut discovered = Vec::new();

        for unit in self.catalog.units() {
            if unit.is_private() {
                debug!("Skipping private unit: {}", unit.name);
                continue;
            }

            match Self::trial_load(unit) {
                Ok((_, descriptor)) => {
                    debug!("Discovered plugin: {} ({})", unit.name, descriptor.name);
                    discovered.push(unit.name.clone());
                }
                Err(e) => {
                    warn!("Failed to inspect plugin unit {}: {}", unit.name, e);
                }
            }
        }

        info!("Discovered {} plugins", discovered.len());
        discovered
    }

    /// 단위에서 유일한 구현 타입을 찾아 시험 생성 후 디스크립터 검증
    fn trial_load(unit: &SourceUnit) -> Result<(PluginType, PluginDescriptor)> {
        let plugin_type = match unit.types.as_slice() {
            [only] => only.clone(),
            [] => return Err(Error::discovery(&unit.name, "no plugin type defined")),
            many => {
                return Err(Error::discovery(
                    &unit.name,
                    format!("{} plugin types defined, expected exactly one", many.len()),
                ))
            }
        };

        let descriptor = guarded(|| {
            let trial = plugin_type.construct()?;
            Ok(trial.descriptor())
        })
        .map_err(|message| Error::discovery(&unit.name, message))?;

        descriptor
            .validate()
            .map_err(|message| Error::discovery(&unit.name, message))?;

        Ok((plugin_type, descriptor))
    }

    // ========================================================================
    // 로드 / 언로드
    // ========================================================================

    /// 단일 플러그인 로드
    ///
    /// `path`는 소스 단위 위치이며, 같은 이름의 사이드카가 있으면 적용됩니다.
    /// 없으면 검색 경로에서 해석합니다. 이미 로드된 이름이면 기존 디스크립터를 반환합니다.
    pub fn load(&self, name: &str, path: Option<&Path>) -> Result<PluginDescriptor> {
        if let Some(existing) = self.descriptor(name) {
            warn!("Plugin already loaded: {}", name);
            return Ok(existing);
        }

        let unit = self
            .catalog
            .find_unit(name)
            .ok_or_else(|| Error::load(name, "no source unit found"))?;

        let (plugin_type, mut descriptor) = Self::trial_load(unit).map_err(|e| match e {
            Error::Discovery { message, .. } => Error::load(name, message),
            other => other,
        })?;

        // 사이드카 적용
        let sidecar_path = match path {
            Some(p) => Some(self.resolver.sidecar_for(p)).filter(|p| p.is_file()),
            None => self.resolver.resolve(&unit.name),
        };
        let mut extra = serde_json::Map::new();
        let mut applied: Option<PathBuf> = None;
        if let Some(sidecar_path) = sidecar_path {
            if let Some(sidecar) = self.resolver.read_lenient(&sidecar_path) {
                sidecar.overlay(&mut descriptor);
                extra = sidecar.extra;
                applied = Some(sidecar_path);
            }
        }

        descriptor.validate().map_err(|message| Error::load(name, message))?;

        let metadata = PluginMetadata {
            descriptor: descriptor.clone(),
            unit: unit.name.clone(),
            type_name: plugin_type.type_name.clone(),
            sidecar_path: applied,
            extra,
        };

        let mut state = self.state.lock();

        if let Some(existing) = state.loaded.get(name) {
            warn!("Plugin already loaded: {}", name);
            return Ok(existing.metadata.descriptor.clone());
        }

        // 로드된 타입 사이에서 디스크립터 이름은 유일
        if let Some((other, _)) = state
            .loaded
            .iter()
            .find(|(_, t)| t.metadata.descriptor.name == descriptor.name)
        {
            return Err(Error::load(
                name,
                format!("descriptor name {} already used by {}", descriptor.name, other),
            ));
        }

        state.loaded.insert(
            name.to_string(),
            LoadedType {
                plugin_type,
                metadata,
            },
        );
        state.order.push(name.to_string());

        info!("Loaded plugin: {} (v{})", name, descriptor.version);
        Ok(descriptor)
    }

    /// 발견된 모든 플러그인 로드 (일부 실패 허용)
    pub fn load_all(&self) -> HashMap<String, PluginDescriptor> {
        let discovered = self.discover();
        let mut loaded_count = 0;

        for name in &discovered {
            match self.load(name, None) {
                Ok(_) => loaded_count += 1,
                Err(e) => error!("Failed to load plugin {}: {}", name, e),
            }
        }

        info!("Loaded {}/{} plugins", loaded_count, discovered.len());
        self.loaded_descriptors().into_iter().collect()
    }

    /// 플러그인 언로드 - 인스턴스 정리(best-effort) 후 타입/메타데이터 제거
    ///
    /// 로드된 타입이나 인스턴스가 있었으면 true.
    pub fn unload(&self, name: &str) -> bool {
        let (instance, removed_type) = {
            let mut state = self.state.lock();
            let instance = state.instances.remove(name);
            let removed_type = state.loaded.remove(name).is_some();
            state.order.retain(|n| n != name);
            (instance, removed_type)
        };

        if let Some(instance) = &instance {
            if let Err(message) = guarded(|| instance.cleanup()) {
                error!("Failed to clean up plugin instance {}: {}", name, message);
            }
        }

        if instance.is_some() || removed_type {
            info!("Unloaded plugin: {}", name);
            true
        } else {
            debug!("Unload requested for unknown plugin: {}", name);
            false
        }
    }

    /// 플러그인 리로드
    ///
    /// 이전 인스턴스 설정을 보존해 반환하지만, 인스턴스를 다시 만들지는 않습니다.
    /// 설정과 활성화 상태의 재적용은 호출자(매니저)의 몫입니다.
    pub fn reload(&self, name: &str) -> Result<Reloaded> {
        let (previous_config, sidecar_path) = {
            let state = self.state.lock();
            let loaded = state.loaded.get(name).ok_or_else(|| {
                error!("Plugin not loaded: {}", name);
                Error::NotFound(format!("Plugin {} is not loaded", name))
            })?;
            (
                state.instances.get(name).map(|i| Arc::clone(i)),
                loaded.metadata.sidecar_path.clone(),
            )
        };
        let previous_config = previous_config.map(|instance| instance.config());

        self.unload(name);

        match self.load(name, sidecar_path.as_deref()) {
            Ok(descriptor) => {
                info!("Reloaded plugin: {}", name);
                Ok(Reloaded {
                    descriptor,
                    previous_config,
                })
            }
            Err(e) => {
                error!("Failed to reload plugin {}: {}", name, e);
                Err(e)
            }
        }
    }

    // ========================================================================
    // 인스턴스
    // ========================================================================

    /// 인스턴스 생성 및 초기화
    ///
    /// 이미 인스턴스가 있으면 경고 후 기존 인스턴스를 반환합니다.
    /// 초기화에 성공한 경우에만 등록됩니다.
    pub fn create_instance(&self, name: &str, config: &PluginConfig) -> Result<Arc<dyn Plugin>> {
        let plugin_type = {
            let state = self.state.lock();
            let loaded = state.loaded.get(name).ok_or_else(|| {
                error!("Plugin not loaded: {}", name);
                Error::NotFound(format!("Plugin {} is not loaded", name))
            })?;
            if let Some(existing) = state.instances.get(name) {
                warn!("Plugin instance already exists: {}", name);
                return Ok(Arc::clone(existing));
            }
            loaded.plugin_type.clone()
        };

        let instance = guarded(|| {
            let instance = plugin_type.construct()?;
            instance.initialize(config)?;
            Ok(instance)
        })
        .map_err(|message| {
            error!("Failed to initialize plugin {}: {}", name, message);
            Error::initialization(name, message)
        })?;

        let mut state = self.state.lock();
        if !state.loaded.contains_key(name) {
            drop(state);
            if let Err(message) = guarded(|| instance.cleanup()) {
                error!("Failed to clean up plugin instance {}: {}", name, message);
            }
            return Err(Error::load(name, "unloaded during initialization"));
        }
        if let Some(existing) = state.instances.get(name) {
            let existing = Arc::clone(existing);
            drop(state);
            warn!("Plugin instance already exists: {}", name);
            if let Err(message) = guarded(|| instance.cleanup()) {
                error!("Failed to clean up plugin instance {}: {}", name, message);
            }
            return Ok(existing);
        }
        state.instances.insert(name.to_string(), Arc::clone(&instance));

        info!("Created plugin instance: {}", name);
        Ok(instance)
    }

    /// 인스턴스만 제거하고 정리 (타입은 로드된 상태로 유지)
    ///
    /// 제거된 인스턴스가 있었으면 true.
    pub fn discard_instance(&self, name: &str) -> bool {
        let Some(instance) = self.state.lock().instances.remove(name) else {
            return false;
        };
        if let Err(message) = guarded(|| instance.cleanup()) {
            error!("Failed to clean up plugin instance {}: {}", name, message);
        }
        info!("Discarded plugin instance: {}", name);
        true
    }

    /// 인스턴스 조회
    pub fn instance(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.state.lock().instances.get(name).map(Arc::clone)
    }

    pub fn has_instance(&self, name: &str) -> bool {
        self.state.lock().instances.contains_key(name)
    }

    // ========================================================================
    // 조회
    // ========================================================================

    /// 로드된 타입의 디스크립터 (사이드카 적용)
    pub fn descriptor(&self, name: &str) -> Option<PluginDescriptor> {
        self.state
            .lock()
            .loaded
            .get(name)
            .map(|t| t.metadata.descriptor.clone())
    }

    /// 메타데이터 레코드
    pub fn metadata(&self, name: &str) -> Option<PluginMetadata> {
        self.state.lock().loaded.get(name).map(|t| t.metadata.clone())
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.state.lock().loaded.contains_key(name)
    }

    /// 로드된 이름 (로드 순서)
    pub fn loaded_names(&self) -> Vec<String> {
        self.state.lock().order.clone()
    }

    /// 로드된 (이름, 디스크립터) 목록 (로드 순서)
    pub fn loaded_descriptors(&self) -> Vec<(String, PluginDescriptor)> {
        let state = self.state.lock();
        state
            .order
            .iter()
            .filter_map(|name| {
                state
                    .loaded
                    .get(name)
                    .map(|t| (name.clone(), t.metadata.descriptor.clone()))
            })
            .collect()
    }

    /// 카테고리별 이름
    pub fn names_by_category(&self, category: &str) -> Vec<String> {
        self.loaded_descriptors()
            .into_iter()
            .filter(|(_, d)| d.category == category)
            .map(|(name, _)| name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::traits::PluginState;
    use serde_json::json;
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    static CLEANUPS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Default)]
    struct ReportStub {
        state: PluginState,
    }

    impl Plugin for ReportStub {
        fn descriptor(&self) -> PluginDescriptor {
            PluginDescriptor::new("ReportStub", "report").with_description("stub")
        }

        fn initialize(&self, config: &PluginConfig) -> Result<()> {
            if config.get("fail").is_some() {
                return Err(Error::Validation("fail requested".into()));
            }
            self.configure(config)
        }

        fn cleanup(&self) -> Result<()> {
            CLEANUPS.fetch_add(1, Ordering::SeqCst);
            Err(Error::Internal("cleanup always complains".into()))
        }

        fn state(&self) -> &PluginState {
            &self.state
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Default)]
    struct Nameless {
        state: PluginState,
    }

    impl Plugin for Nameless {
        fn descriptor(&self) -> PluginDescriptor {
            PluginDescriptor::new("", "general")
        }

        fn initialize(&self, _config: &PluginConfig) -> Result<()> {
            Ok(())
        }

        fn cleanup(&self) -> Result<()> {
            Ok(())
        }

        fn state(&self) -> &PluginState {
            &self.state
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn loader_with(roots: Vec<PathBuf>) -> PluginLoader {
        let mut catalog = PluginCatalog::new();
        catalog
            .register::<ReportStub>("report_stub")
            .register::<Nameless>("nameless")
            .register::<ReportStub>("_private_stub")
            .register_factory("exploding", "Exploding", || panic!("constructor blew up"));
        PluginLoader::new(catalog, SidecarResolver::new(roots, "json"))
    }

    fn cfg(value: serde_json::Value) -> PluginConfig {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_discover_skips_bad_and_private_units() {
        let loader = loader_with(vec![]);
        assert_eq!(loader.discover(), vec!["report_stub".to_string()]);
    }

    #[test]
    fn test_load_is_idempotent() {
        let loader = loader_with(vec![]);
        let first = loader.load("report_stub", None).unwrap();
        let second = loader.load("report_stub", None).unwrap();

        assert_eq!(first, second);
        assert_eq!(loader.loaded_names(), vec!["report_stub".to_string()]);
    }

    #[test]
    fn test_load_rejects_invalid_descriptor() {
        let loader = loader_with(vec![]);
        assert!(matches!(loader.load("nameless", None), Err(Error::Load { .. })));
        assert!(matches!(loader.load("exploding", None), Err(Error::Load { .. })));
        assert!(matches!(loader.load("unknown", None), Err(Error::Load { .. })));
        assert!(!loader.is_loaded("nameless"));
    }

    #[test]
    fn test_duplicate_descriptor_name_refused() {
        let loader = loader_with(vec![]);
        loader.load("report_stub", None).unwrap();
        // "report" 부분 일치로 같은 단위를 다른 이름으로 로드 시도
        assert!(matches!(loader.load("report", None), Err(Error::Load { .. })));
    }

    #[test]
    fn test_sidecar_overlay_on_load() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("report_stub.json"),
            json!({"description": "external", "owner": "qa"}).to_string(),
        )
        .unwrap();

        let loader = loader_with(vec![temp.path().to_path_buf()]);
        let descriptor = loader.load("report_stub", None).unwrap();
        assert_eq!(descriptor.description, "external");

        let metadata = loader.metadata("report_stub").unwrap();
        assert_eq!(metadata.sidecar_path, Some(temp.path().join("report_stub.json")));
        assert_eq!(metadata.extra["owner"], json!("qa"));
        assert_eq!(metadata.unit, "report_stub");
    }

    #[test]
    fn test_load_all_tolerates_failures() {
        let loader = loader_with(vec![]);
        let loaded = loader.load_all();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loader.names_by_category("report"), vec!["report_stub".to_string()]);
    }

    #[test]
    fn test_create_instance() {
        let loader = loader_with(vec![]);
        assert!(matches!(
            loader.create_instance("report_stub", &PluginConfig::new()),
            Err(Error::NotFound(_))
        ));

        loader.load("report_stub", None).unwrap();
        let failed = loader.create_instance("report_stub", &cfg(json!({"fail": true})));
        assert!(matches!(failed, Err(Error::Initialization { .. })));
        assert!(!loader.has_instance("report_stub"));

        let first = loader
            .create_instance("report_stub", &cfg(json!({"out": "a"})))
            .unwrap();
        let second = loader
            .create_instance("report_stub", &cfg(json!({"out": "b"})))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.config()["out"], json!("a"));
    }

    #[test]
    fn test_unload_runs_cleanup_best_effort() {
        let loader = loader_with(vec![]);
        loader.load("report_stub", None).unwrap();
        loader.create_instance("report_stub", &PluginConfig::new()).unwrap();

        let before = CLEANUPS.load(Ordering::SeqCst);
        assert!(loader.unload("report_stub"));
        assert!(CLEANUPS.load(Ordering::SeqCst) > before);
        assert!(!loader.is_loaded("report_stub"));
        assert!(!loader.has_instance("report_stub"));
        assert!(loader.metadata("report_stub").is_none());
        assert!(!loader.unload("report_stub"));
    }

    #[test]
    fn test_discard_instance_keeps_type() {
        let loader = loader_with(vec![]);
        loader.load("report_stub", None).unwrap();
        loader.create_instance("report_stub", &PluginConfig::new()).unwrap();

        let before = CLEANUPS.load(Ordering::SeqCst);
        assert!(loader.discard_instance("report_stub"));
        assert!(CLEANUPS.load(Ordering::SeqCst) > before);
        assert!(!loader.has_instance("report_stub"));
        assert!(loader.is_loaded("report_stub"));
        assert!(!loader.discard_instance("report_stub"));
    }

    #[test]
    fn test_reload_captures_config() {
        let loader = loader_with(vec![]);
        assert!(loader.reload("report_stub").is_err());

        loader.load("report_stub", None).unwrap();
        loader
            .create_instance("report_stub", &cfg(json!({"out": "reports"})))
            .unwrap();

        let reloaded = loader.reload("report_stub").unwrap();
        assert_eq!(reloaded.descriptor.name, "ReportStub");
        assert_eq!(reloaded.previous_config.unwrap()["out"], json!("reports"));
        assert!(loader.is_loaded("report_stub"));
        assert!(!loader.has_instance("report_stub"));
    }
}
