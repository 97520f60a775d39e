//! Plugin traits - 기본 계약과 기능(capability) 계약
//!
//! 모든 플러그인은 [`Plugin`]을 구현하고, 참여하려는 기능마다 해당 trait을
//! 구현한 뒤 `as_*` 접근자로 자신을 바인딩합니다.
//!
//! ```ignore
//! impl Plugin for MyMonitor {
//!     fn as_metrics_monitor(&self) -> Option<&dyn MetricsMonitor> {
//!         Some(self)
//!     }
//!     ...
//! }
//! ```

use super::descriptor::{PluginConfig, PluginDescriptor};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use volley_foundation::Result;

// ============================================================================
// PluginState - 인스턴스별 가변 상태
// ============================================================================

/// 플러그인 인스턴스가 내장하는 가변 상태 (활성화 플래그 + 설정)
#[derive(Debug, Default)]
pub struct PluginState {
    enabled: AtomicBool,
    config: RwLock<PluginConfig>,
}

impl PluginState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// 병합: 새 키는 덮어쓰고 나머지는 유지
    pub fn merge_config(&self, config: &PluginConfig) {
        let mut current = self.config.write();
        for (key, value) in config {
            current.insert(key.clone(), value.clone());
        }
    }

    /// 설정 스냅샷
    pub fn config(&self) -> PluginConfig {
        self.config.read().clone()
    }

    /// 단일 설정 값
    pub fn get(&self, key: &str) -> Option<Value> {
        self.config.read().get(key).cloned()
    }
}

// ============================================================================
// Capability - 기능 분류
// ============================================================================

/// 플러그인이 바인딩할 수 있는 기능
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    TestLifecycle,
    ReportGenerator,
    MetricsMonitor,
    DataGenerator,
    Notifier,
    LoadShapeProvider,
    ResultAnalyzer,
    ResultStore,
    Authenticator,
    ProtocolClientFactory,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TestLifecycle => write!(f, "test_lifecycle"),
            Self::ReportGenerator => write!(f, "report_generator"),
            Self::MetricsMonitor => write!(f, "metrics_monitor"),
            Self::DataGenerator => write!(f, "data_generator"),
            Self::Notifier => write!(f, "notifier"),
            Self::LoadShapeProvider => write!(f, "load_shape_provider"),
            Self::ResultAnalyzer => write!(f, "result_analyzer"),
            Self::ResultStore => write!(f, "result_store"),
            Self::Authenticator => write!(f, "authenticator"),
            Self::ProtocolClientFactory => write!(f, "protocol_client_factory"),
        }
    }
}

// ============================================================================
// Plugin Trait - 모든 플러그인이 구현해야 하는 기본 계약
// ============================================================================

/// 플러그인 기본 trait
///
/// 모든 메서드는 `&self`를 받습니다. 인스턴스는 `Arc`로 공유되며
/// 가변 상태는 [`PluginState`]에 둡니다.
pub trait Plugin: Send + Sync {
    /// 플러그인 디스크립터 반환
    fn descriptor(&self) -> PluginDescriptor;

    /// 초기화 - 실패 시 인스턴스는 등록되지 않음
    fn initialize(&self, config: &PluginConfig) -> Result<()>;

    /// 리소스 정리
    fn cleanup(&self) -> Result<()>;

    /// 내장 상태 접근
    fn state(&self) -> &PluginState;

    fn enable(&self) {
        self.state().set_enabled(true);
    }

    fn disable(&self) {
        self.state().set_enabled(false);
    }

    fn is_enabled(&self) -> bool {
        self.state().is_enabled()
    }

    /// 설정 병합 (새 키는 덮어쓰고 기존 키는 유지)
    fn configure(&self, config: &PluginConfig) -> Result<()> {
        self.state().merge_config(config);
        Ok(())
    }

    /// 현재 설정 스냅샷
    fn config(&self) -> PluginConfig {
        self.state().config()
    }

    /// 설정 검증
    fn validate_config(&self, _config: &PluginConfig) -> bool {
        true
    }

    // ========================================================================
    // 기능 바인딩 - 구현한 기능만 Some(self) 반환
    // ========================================================================

    fn as_test_lifecycle(&self) -> Option<&dyn TestLifecycle> {
        None
    }

    fn as_report_generator(&self) -> Option<&dyn ReportGenerator> {
        None
    }

    fn as_metrics_monitor(&self) -> Option<&dyn MetricsMonitor> {
        None
    }

    fn as_data_generator(&self) -> Option<&dyn DataGenerator> {
        None
    }

    fn as_notifier(&self) -> Option<&dyn Notifier> {
        None
    }

    fn as_load_shape_provider(&self) -> Option<&dyn LoadShapeProvider> {
        None
    }

    fn as_result_analyzer(&self) -> Option<&dyn ResultAnalyzer> {
        None
    }

    fn as_result_store(&self) -> Option<&dyn ResultStore> {
        None
    }

    fn as_authenticator(&self) -> Option<&dyn Authenticator> {
        None
    }

    fn as_protocol_client_factory(&self) -> Option<&dyn ProtocolClientFactory> {
        None
    }

    /// 바인딩된 기능 목록
    fn capabilities(&self) -> Vec<Capability> {
        let mut caps = Vec::new();
        if self.as_test_lifecycle().is_some() {
            caps.push(Capability::TestLifecycle);
        }
        if self.as_report_generator().is_some() {
            caps.push(Capability::ReportGenerator);
        }
        if self.as_metrics_monitor().is_some() {
            caps.push(Capability::MetricsMonitor);
        }
        if self.as_data_generator().is_some() {
            caps.push(Capability::DataGenerator);
        }
        if self.as_notifier().is_some() {
            caps.push(Capability::Notifier);
        }
        if self.as_load_shape_provider().is_some() {
            caps.push(Capability::LoadShapeProvider);
        }
        if self.as_result_analyzer().is_some() {
            caps.push(Capability::ResultAnalyzer);
        }
        if self.as_result_store().is_some() {
            caps.push(Capability::ResultStore);
        }
        if self.as_authenticator().is_some() {
            caps.push(Capability::Authenticator);
        }
        if self.as_protocol_client_factory().is_some() {
            caps.push(Capability::ProtocolClientFactory);
        }
        caps
    }

    /// 다운캐스팅 헬퍼
    fn as_any(&self) -> &dyn Any;
}

// ============================================================================
// 기능 계약
// ============================================================================

/// 요청 이벤트 페이로드 (`request_success` / `request_failure`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub request_type: String,
    pub name: String,
    /// 응답 시간 (ms)
    pub response_time: f64,
    #[serde(default)]
    pub response_length: u64,
    /// 실패 사유 (`request_failure`에서만)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 테스트 라이프사이클 관찰자
pub trait TestLifecycle: Send + Sync {
    fn on_test_start(&self, environment: &Value) -> Result<()>;

    fn on_test_stop(&self, environment: &Value) -> Result<()>;

    fn on_user_start(&self, _user: &Value) -> Result<()> {
        Ok(())
    }

    fn on_user_stop(&self, _user: &Value) -> Result<()> {
        Ok(())
    }

    fn on_request_success(&self, _request: &RequestRecord) -> Result<()> {
        Ok(())
    }

    fn on_request_failure(&self, _request: &RequestRecord) -> Result<()> {
        Ok(())
    }
}

/// 리포트 생성기
pub trait ReportGenerator: Send + Sync {
    fn generate(&self, test_data: &Value, output_path: &Path) -> Result<()>;

    fn supported_formats(&self) -> BTreeSet<String>;

    fn customize_report_data(&self, test_data: Value) -> Value {
        test_data
    }

    fn report_template(&self) -> Option<String> {
        None
    }
}

/// 메트릭 모니터
pub trait MetricsMonitor: Send + Sync {
    fn start_monitoring(&self) -> Result<()>;

    fn stop_monitoring(&self) -> Result<()>;

    fn metrics(&self) -> Map<String, Value>;

    fn on_threshold_exceeded(&self, _metric: &str, _current: f64, _threshold: f64) {}

    fn configure_thresholds(&self, _thresholds: &BTreeMap<String, f64>) {}
}

/// 테스트 데이터 생성기
pub trait DataGenerator: Send + Sync {
    fn generate_data(&self, data_type: &str, count: usize, options: &PluginConfig)
        -> Result<Vec<Value>>;

    fn supported_data_types(&self) -> BTreeSet<String>;

    fn validate_data(&self, _data: &[Value]) -> bool {
        true
    }

    fn transform_data(&self, data: Vec<Value>, _transformation: &str) -> Vec<Value> {
        data
    }
}

/// 알림 발송기
pub trait Notifier: Send + Sync {
    fn send_notification(&self, message: &str, options: &PluginConfig) -> Result<()>;

    fn channels(&self) -> BTreeSet<String>;

    fn format_message(&self, message: &str, _message_type: &str) -> String {
        message.to_string()
    }

    fn test_connection(&self) -> bool {
        true
    }
}

/// 부하 모양의 한 틱
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeTick {
    pub user_count: u32,
    pub spawn_rate: f64,
}

/// 부하 모양 제공자
pub trait LoadShapeProvider: Send + Sync {
    /// 경과 시간에 대한 목표 부하 (None이면 테스트 종료)
    fn tick(&self, run_time: Duration) -> Option<ShapeTick>;

    fn shape_parameters(&self) -> PluginConfig;

    fn validate_parameters(&self, _parameters: &PluginConfig) -> bool {
        true
    }

    fn shape_description(&self) -> String {
        String::new()
    }
}

/// 결과 분석기
pub trait ResultAnalyzer: Send + Sync {
    fn analyze(&self, results: &Value) -> Result<Value>;

    fn analysis_types(&self) -> BTreeSet<String>;

    fn insights(&self, _analysis: &Value) -> Vec<String> {
        vec![]
    }

    fn compare(&self, _current: &Value, _historical: &[Value]) -> Value {
        Value::Object(Map::new())
    }
}

/// 결과 저장소
pub trait ResultStore: Send + Sync {
    fn save_results(&self, results: &Value, test_id: &str) -> Result<()>;

    fn load_results(&self, test_id: &str) -> Result<Option<Value>>;

    fn list_results(&self, limit: usize) -> Result<Vec<Value>>;

    fn delete_results(&self, _test_id: &str) -> Result<bool> {
        Ok(false)
    }

    fn search_results(&self, _criteria: &PluginConfig) -> Result<Vec<Value>> {
        Ok(vec![])
    }
}

/// 자격 증명 인증기
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, credentials: &PluginConfig) -> Result<bool>;

    fn auth_token(&self, credentials: &PluginConfig) -> Result<Option<String>>;

    fn refresh_token(&self, _token: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn validate_token(&self, _token: &str) -> bool {
        true
    }

    fn logout(&self, _token: &str) -> bool {
        true
    }
}

/// 프로토콜 클라이언트 (팩토리가 생성)
pub trait ProtocolClient: Send + Sync {
    fn protocol(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

/// 프로토콜 클라이언트 팩토리
pub trait ProtocolClientFactory: Send + Sync {
    fn create_client(&self, options: &PluginConfig) -> Result<Box<dyn ProtocolClient>>;

    fn supported_protocols(&self) -> BTreeSet<String>;

    fn validate_connection(&self, _client: &dyn ProtocolClient) -> bool {
        true
    }

    fn close_connection(&self, _client: &dyn ProtocolClient) -> Result<()> {
        Ok(())
    }
}
