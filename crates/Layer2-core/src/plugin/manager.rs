//! Plugin Manager - 플러그인 라이프사이클 및 이벤트 관리
//!
//! - 활성화/비활성화 (의존성 검사, 인스턴스 생성, 핸들러 등록)
//! - 설정 병합 및 영속화 (`PersistedState`)
//! - 이벤트 발행 (`trigger`) - 핸들러별 실패를 `DispatchReport`로 수집
//!
//! 매니저 락은 플러그인 콜백이나 로더 호출 중에는 잡고 있지 않습니다.
//! 따라서 핸들러 안에서 매니저를 다시 호출해도 교착되지 않습니다.

use super::descriptor::{PluginConfig, PluginDescriptor};
use super::events::{capability_handlers, dispatch, DispatchReport, EventHandler, EventRoutes};
use super::guard::guarded;
use super::loader::PluginLoader;
use super::store::PersistedState;
use super::traits::Plugin;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use volley_foundation::{Error, PluginSettings, Result};

/// `status()` 항목
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginStatus {
    pub enabled: bool,
    pub version: String,
    pub category: String,
    pub description: String,
    pub has_instance: bool,
    pub config: PluginConfig,
}

#[derive(Default)]
struct ManagerState {
    /// 현재 활성화된 이름 (로드된 이름의 부분집합)
    enabled: BTreeSet<String>,

    /// 플러그인별 영속 설정
    configs: BTreeMap<String, PluginConfig>,

    /// 상태 파일에서 복원된 활성화 목록 (`discover_and_enable`에서 사용)
    restored: BTreeSet<String>,

    /// 저장할 활성화 목록 - 복원된 목록에서 시작해 `enable`/`disable`로 갱신
    persisted: BTreeSet<String>,

    routes: EventRoutes,
}

/// 플러그인 매니저
pub struct PluginManager {
    loader: PluginLoader,
    settings: PluginSettings,
    state: Mutex<ManagerState>,
}

impl PluginManager {
    /// 새 매니저 생성 - 설정된 상태 파일에서 영속 상태를 읽음
    pub fn new(loader: PluginLoader, settings: PluginSettings) -> Self {
        let persisted = PersistedState::load(&settings.state_file);
        Self::with_state(loader, settings, persisted)
    }

    /// 주어진 영속 상태로 생성
    pub fn with_state(
        loader: PluginLoader,
        settings: PluginSettings,
        persisted: PersistedState,
    ) -> Self {
        Self {
            loader,
            settings,
            state: Mutex::new(ManagerState {
                configs: persisted.plugin_configs,
                persisted: persisted.enabled_plugins.clone(),
                restored: persisted.enabled_plugins,
                ..Default::default()
            }),
        }
    }

    pub fn loader(&self) -> &PluginLoader {
        &self.loader
    }

    pub fn settings(&self) -> &PluginSettings {
        &self.settings
    }

    /// 모든 플러그인 로드 후, 상태 파일에 활성화로 기록된 플러그인 재활성화
    ///
    /// 활성화된 이름 목록을 반환합니다.
    pub fn discover_and_enable(&self) -> Vec<String> {
        self.loader.load_all();

        if !self.settings.auto_enable {
            debug!("Auto-enable disabled, skipping restore");
            return vec![];
        }

        let restored = self.state.lock().restored.clone();
        let mut enabled = Vec::new();
        for name in restored {
            if !self.loader.is_loaded(&name) {
                warn!("Previously enabled plugin not available: {}", name);
                continue;
            }
            if self.enable(&name, None) {
                enabled.push(name);
            }
        }

        info!("Auto-enabled {} plugins", enabled.len());
        enabled
    }

    // ========================================================================
    // 활성화 / 비활성화
    // ========================================================================

    /// 플러그인 활성화
    ///
    /// 설정 우선순위: 명시적 인자 → 영속 설정 → 빈 설정.
    /// 실패 시 상태는 변경되지 않습니다.
    pub fn enable(&self, name: &str, config: Option<PluginConfig>) -> bool {
        match self.try_enable(name, config) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to enable plugin {}: {}", name, e);
                false
            }
        }
    }

    /// 플러그인 활성화 (에러 반환)
    pub fn try_enable(&self, name: &str, config: Option<PluginConfig>) -> Result<()> {
        let config = {
            let state = self.state.lock();
            if state.enabled.contains(name) {
                debug!("Plugin already enabled: {}", name);
                return Ok(());
            }
            config
                .or_else(|| state.configs.get(name).cloned())
                .unwrap_or_default()
        };

        if !self.loader.is_loaded(name) {
            return Err(Error::NotFound(format!("Plugin {} is not loaded", name)));
        }

        let missing = self.missing_dependencies(name);
        if !missing.is_empty() {
            return Err(Error::dependency(name, missing));
        }

        let instance = self.loader.create_instance(name, &config)?;
        if let Err(message) = guarded(|| {
            instance.enable();
            Ok(())
        }) {
            self.loader.discard_instance(name);
            return Err(Error::initialization(name, message));
        }

        let handlers = capability_handlers(&instance);

        let mut state = self.state.lock();
        if state.enabled.contains(name) {
            debug!("Plugin enabled concurrently: {}", name);
            return Ok(());
        }
        let handler_count = handlers.len();
        for (event, handler) in handlers {
            state.routes.register(event, Some(name), handler);
        }
        state.enabled.insert(name.to_string());
        state.persisted.insert(name.to_string());

        info!("Enabled plugin: {} ({} handlers)", name, handler_count);
        Ok(())
    }

    /// 플러그인 비활성화
    ///
    /// 핸들러를 먼저 제거한 뒤 인스턴스의 `disable`/`cleanup`을 호출합니다 (best-effort).
    /// 인스턴스는 로더에 남아 있으며 `unload`에서만 제거됩니다.
    /// 저장될 활성화 목록에서도 빠집니다.
    pub fn disable(&self, name: &str) -> bool {
        self.state.lock().persisted.remove(name);
        self.deactivate(name)
    }

    /// 저장될 활성화 목록은 건드리지 않는 비활성화 (`reload`, `shutdown`)
    fn deactivate(&self, name: &str) -> bool {
        {
            let mut state = self.state.lock();
            if !state.enabled.remove(name) {
                debug!("Plugin not enabled: {}", name);
                return true;
            }
            let removed = state.routes.remove_owner(name);
            debug!("Removed {} handlers for {}", removed, name);
        }

        if let Some(instance) = self.loader.instance(name) {
            if let Err(message) = guarded(|| {
                instance.disable();
                Ok(())
            }) {
                error!("Failed to disable plugin instance {}: {}", name, message);
            }
            if let Err(message) = guarded(|| instance.cleanup()) {
                error!("{}", Error::cleanup(name, message));
            }
        }

        info!("Disabled plugin: {}", name);
        true
    }

    /// 설정 저장 및 (인스턴스가 있으면) 적용
    pub fn configure(&self, name: &str, config: PluginConfig) -> Result<()> {
        self.state
            .lock()
            .configs
            .insert(name.to_string(), config.clone());

        if let Some(instance) = self.loader.instance(name) {
            guarded(|| instance.configure(&config)).map_err(|message| {
                error!("Failed to configure plugin {}: {}", name, message);
                Error::Config(format!("{}: {}", name, message))
            })?;
        }

        info!("Configured plugin: {}", name);
        Ok(())
    }

    /// 플러그인 리로드 - 이전 활성화 상태와 설정을 재적용
    pub fn reload(&self, name: &str) -> bool {
        let was_enabled = self.is_enabled(name);
        let snapshot = self
            .loader
            .instance(name)
            .map(|instance| instance.config())
            .or_else(|| self.state.lock().configs.get(name).cloned());

        if was_enabled {
            self.deactivate(name);
        }

        let reloaded = match self.loader.reload(name) {
            Ok(reloaded) => reloaded,
            Err(e) => {
                error!("Failed to reload plugin {}: {}", name, e);
                return false;
            }
        };

        if was_enabled {
            let config = snapshot.or(reloaded.previous_config);
            return self.enable(name, config);
        }

        info!("Reloaded plugin: {}", name);
        true
    }

    // ========================================================================
    // 이벤트
    // ========================================================================

    /// 이벤트 발행 - 등록 순서대로 모든 핸들러 실행
    pub fn trigger(&self, event: &str, payload: &Value) -> DispatchReport {
        let handlers = self.state.lock().routes.snapshot(event);
        if handlers.is_empty() {
            debug!("No handlers for event: {}", event);
        }
        dispatch(event, handlers, payload)
    }

    /// 외부 핸들러 등록 (소유자 없음)
    pub fn register_handler(&self, event: &str, handler: EventHandler) {
        self.state.lock().routes.register(event, None, handler);
        debug!("Registered external handler for {}", event);
    }

    /// 핸들러 해제 (포인터 동일성으로 비교)
    pub fn unregister_handler(&self, event: &str, handler: &EventHandler) -> bool {
        self.state.lock().routes.unregister(event, handler)
    }

    /// 이벤트에 등록된 핸들러 수
    pub fn handler_count(&self, event: &str) -> usize {
        self.state.lock().routes.handler_count(event)
    }

    /// 플러그인이 핸들러를 등록한 이벤트 목록
    pub fn events_for(&self, name: &str) -> Vec<String> {
        self.state.lock().routes.events_for(name)
    }

    // ========================================================================
    // 의존성
    // ========================================================================

    /// 모든 의존성이 로드되어 있는지 (활성화 여부는 보지 않음)
    pub fn validate_dependencies(&self, name: &str) -> bool {
        self.loader.is_loaded(name) && self.missing_dependencies(name).is_empty()
    }

    /// 로드되지 않은 의존성 목록
    pub fn missing_dependencies(&self, name: &str) -> Vec<String> {
        match self.loader.descriptor(name) {
            Some(descriptor) => descriptor
                .dependencies
                .into_iter()
                .filter(|dep| !self.loader.is_loaded(dep))
                .collect(),
            None => vec![],
        }
    }

    // ========================================================================
    // 영속화
    // ========================================================================

    /// 현재 상태 스냅샷
    ///
    /// 활성화 목록은 이번 실행에서 활성화된 이름과, 복원되었지만 명시적으로
    /// 비활성화되지 않은 이름의 합집합입니다.
    pub fn persisted_state(&self) -> PersistedState {
        let state = self.state.lock();
        PersistedState {
            enabled_plugins: state.persisted.clone(),
            plugin_configs: state.configs.clone(),
        }
    }

    /// 지정 경로에 저장
    pub fn save_config(&self, path: &Path) -> Result<()> {
        self.persisted_state().save(path)
    }

    /// 설정된 상태 파일에 저장
    pub fn save(&self) -> Result<()> {
        self.save_config(&self.settings.state_file)
    }

    /// 상태 파일에서 복원된 활성화 목록
    pub fn restored_enabled(&self) -> BTreeSet<String> {
        self.state.lock().restored.clone()
    }

    /// 영속 설정 조회
    pub fn plugin_config(&self, name: &str) -> Option<PluginConfig> {
        self.state.lock().configs.get(name).cloned()
    }

    pub fn plugin_configs(&self) -> BTreeMap<String, PluginConfig> {
        self.state.lock().configs.clone()
    }

    /// 모든 플러그인 비활성화 후 (설정 시) 상태 저장
    ///
    /// 종료에 의한 비활성화는 저장될 활성화 목록을 바꾸지 않습니다.
    pub fn shutdown(&self) -> Result<()> {
        let running = self.list_enabled();
        info!("Shutting down plugin manager ({} enabled)", running.len());

        for name in &running {
            self.deactivate(name);
        }

        let snapshot = self.persisted_state();

        if self.settings.save_on_shutdown {
            snapshot.save(&self.settings.state_file)?;
        }
        Ok(())
    }

    // ========================================================================
    // 조회
    // ========================================================================

    pub fn is_enabled(&self, name: &str) -> bool {
        self.state.lock().enabled.contains(name)
    }

    /// 활성화된 플러그인의 인스턴스
    pub fn instance(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        if !self.is_enabled(name) {
            return None;
        }
        self.loader.instance(name)
    }

    /// 디스크립터 - 로더 메타데이터(사이드카 적용) 우선, 없으면 인스턴스
    pub fn descriptor(&self, name: &str) -> Option<PluginDescriptor> {
        self.loader
            .descriptor(name)
            .or_else(|| self.loader.instance(name).map(|i| i.descriptor()))
    }

    /// 활성화된 이름 (정렬)
    pub fn list_enabled(&self) -> Vec<String> {
        self.state.lock().enabled.iter().cloned().collect()
    }

    /// 로드된 이름 (로드 순서)
    pub fn list_available(&self) -> Vec<String> {
        self.loader.loaded_names()
    }

    pub fn list_by_category(&self, category: &str) -> Vec<String> {
        self.loader.names_by_category(category)
    }

    /// 진단용 상태 스냅샷
    pub fn status(&self) -> BTreeMap<String, PluginStatus> {
        let (enabled, configs) = {
            let state = self.state.lock();
            (state.enabled.clone(), state.configs.clone())
        };

        self.loader
            .loaded_descriptors()
            .into_iter()
            .map(|(name, descriptor)| {
                let instance = self.loader.instance(&name);
                let config = match &instance {
                    Some(instance) => instance.config(),
                    None => configs.get(&name).cloned().unwrap_or_default(),
                };
                let status = PluginStatus {
                    enabled: enabled.contains(&name),
                    version: descriptor.version.to_string(),
                    category: descriptor.category,
                    description: descriptor.description,
                    has_instance: instance.is_some(),
                    config,
                };
                (name, status)
            })
            .collect()
    }
}
