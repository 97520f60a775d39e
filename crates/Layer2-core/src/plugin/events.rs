//! Plugin Events - 이벤트 라우팅 테이블
//!
//! 이벤트 이름 → (소유 플러그인, 핸들러) 목록. 발행은 동기식이며 등록 순서대로
//! 실행됩니다. 한 핸들러의 실패는 기록만 되고 나머지 핸들러 실행을 막지 않습니다.

use super::guard::guarded;
use super::traits::{Plugin, RequestRecord};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};
use volley_foundation::{Error, Result};

/// 이벤트 핸들러
pub type EventHandler = Arc<dyn Fn(&Value) -> Result<()> + Send + Sync>;

/// 외부 드라이버가 발행하는 이벤트 이름
pub mod names {
    pub const TEST_START: &str = "test_start";
    pub const TEST_STOP: &str = "test_stop";
    pub const USER_START: &str = "user_start";
    pub const USER_STOP: &str = "user_stop";
    pub const REQUEST_SUCCESS: &str = "request_success";
    pub const REQUEST_FAILURE: &str = "request_failure";
    pub const START_MONITORING: &str = "start_monitoring";
    pub const STOP_MONITORING: &str = "stop_monitoring";
}

/// 클로저를 핸들러로 변환
pub fn handler<F>(f: F) -> EventHandler
where
    F: Fn(&Value) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn same_handler(a: &EventHandler, b: &EventHandler) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

// ============================================================================
// EventRoutes - 라우팅 테이블
// ============================================================================

#[derive(Clone)]
struct Route {
    owner: Option<String>,
    handler: EventHandler,
}

/// 이벤트 라우팅 테이블
#[derive(Default)]
pub struct EventRoutes {
    routes: HashMap<String, Vec<Route>>,
}

impl EventRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    /// 핸들러 등록 (owner가 None이면 플러그인이 아닌 외부 협력자)
    pub fn register(&mut self, event: &str, owner: Option<&str>, handler: EventHandler) {
        self.routes.entry(event.to_string()).or_default().push(Route {
            owner: owner.map(str::to_string),
            handler,
        });
        debug!("Registered handler for {} (owner: {:?})", event, owner);
    }

    /// 핸들러 제거 (포인터 동일성, 첫 번째 일치 항목)
    pub fn unregister(&mut self, event: &str, handler: &EventHandler) -> bool {
        let Some(routes) = self.routes.get_mut(event) else {
            return false;
        };
        let Some(index) = routes.iter().position(|r| same_handler(&r.handler, handler)) else {
            return false;
        };
        routes.remove(index);
        if routes.is_empty() {
            self.routes.remove(event);
        }
        debug!("Unregistered handler for {}", event);
        true
    }

    /// 특정 플러그인 소유의 모든 핸들러 제거
    pub fn remove_owner(&mut self, owner: &str) -> usize {
        let mut removed = 0;
        self.routes.retain(|_, routes| {
            let before = routes.len();
            routes.retain(|r| r.owner.as_deref() != Some(owner));
            removed += before - routes.len();
            !routes.is_empty()
        });
        removed
    }

    /// 발행용 스냅샷 (등록 순서)
    pub fn snapshot(&self, event: &str) -> Vec<(Option<String>, EventHandler)> {
        self.routes
            .get(event)
            .map(|routes| {
                routes
                    .iter()
                    .map(|r| (r.owner.clone(), Arc::clone(&r.handler)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 이벤트의 소유자 목록 (등록 순서)
    pub fn owners(&self, event: &str) -> Vec<Option<String>> {
        self.routes
            .get(event)
            .map(|routes| routes.iter().map(|r| r.owner.clone()).collect())
            .unwrap_or_default()
    }

    /// 플러그인이 하나 이상의 핸들러를 소유하는지
    pub fn has_owner(&self, owner: &str) -> bool {
        self.routes
            .values()
            .flatten()
            .any(|r| r.owner.as_deref() == Some(owner))
    }

    /// 플러그인이 핸들러를 가진 이벤트 이름
    pub fn events_for(&self, owner: &str) -> Vec<String> {
        let mut events: Vec<String> = self
            .routes
            .iter()
            .filter(|(_, routes)| routes.iter().any(|r| r.owner.as_deref() == Some(owner)))
            .map(|(event, _)| event.clone())
            .collect();
        events.sort();
        events
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.routes.get(event).map(Vec::len).unwrap_or(0)
    }
}

// ============================================================================
// 발행 결과
// ============================================================================

/// 핸들러 하나의 실패
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerFailure {
    /// 소유 플러그인 (외부 핸들러면 None)
    pub owner: Option<String>,
    pub event: String,
    pub error: String,
}

/// `trigger` 결과
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchReport {
    pub event: String,
    /// 실행된 핸들러 수
    pub invoked: usize,
    pub failures: Vec<HandlerFailure>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// 실패를 Handler 에러로 변환
    pub fn errors(&self) -> Vec<Error> {
        self.failures
            .iter()
            .map(|f| {
                Error::handler(
                    f.owner.clone().unwrap_or_else(|| "<external>".to_string()),
                    &f.event,
                    &f.error,
                )
            })
            .collect()
    }
}

/// 스냅샷의 핸들러를 순서대로 실행
pub(crate) fn dispatch(
    event: &str,
    handlers: Vec<(Option<String>, EventHandler)>,
    payload: &Value,
) -> DispatchReport {
    let mut report = DispatchReport {
        event: event.to_string(),
        ..Default::default()
    };

    for (owner, handler) in handlers {
        report.invoked += 1;
        if let Err(message) = guarded(|| handler(payload)) {
            error!(
                event = event,
                owner = owner.as_deref().unwrap_or("<external>"),
                "Event handler failed: {}",
                message
            );
            report.failures.push(HandlerFailure {
                owner,
                event: event.to_string(),
                error: message,
            });
        }
    }

    report
}

// ============================================================================
// 기능별 핸들러 연결
// ============================================================================

fn request_record(payload: &Value) -> Result<RequestRecord> {
    serde_json::from_value(payload.clone())
        .map_err(|e| Error::InvalidInput(format!("request payload: {}", e)))
}

/// 인스턴스가 바인딩한 기능에 따라 (이벤트, 핸들러) 목록 생성
///
/// TestLifecycle → test_start, test_stop, user_start, user_stop,
/// request_success, request_failure.
/// MetricsMonitor → start_monitoring, stop_monitoring.
pub fn capability_handlers(instance: &Arc<dyn Plugin>) -> Vec<(&'static str, EventHandler)> {
    let mut handlers: Vec<(&'static str, EventHandler)> = Vec::new();

    if instance.as_test_lifecycle().is_some() {
        let lifecycle = |f: fn(&dyn Plugin, &Value) -> Result<()>| -> EventHandler {
            let plugin = Arc::clone(instance);
            Arc::new(move |payload: &Value| f(plugin.as_ref(), payload))
        };

        handlers.push((
            names::TEST_START,
            lifecycle(|p, v| match p.as_test_lifecycle() {
                Some(c) => c.on_test_start(v),
                None => Ok(()),
            }),
        ));
        handlers.push((
            names::TEST_STOP,
            lifecycle(|p, v| match p.as_test_lifecycle() {
                Some(c) => c.on_test_stop(v),
                None => Ok(()),
            }),
        ));
        handlers.push((
            names::USER_START,
            lifecycle(|p, v| match p.as_test_lifecycle() {
                Some(c) => c.on_user_start(v),
                None => Ok(()),
            }),
        ));
        handlers.push((
            names::USER_STOP,
            lifecycle(|p, v| match p.as_test_lifecycle() {
                Some(c) => c.on_user_stop(v),
                None => Ok(()),
            }),
        ));
        handlers.push((
            names::REQUEST_SUCCESS,
            lifecycle(|p, v| match p.as_test_lifecycle() {
                Some(c) => c.on_request_success(&request_record(v)?),
                None => Ok(()),
            }),
        ));
        handlers.push((
            names::REQUEST_FAILURE,
            lifecycle(|p, v| match p.as_test_lifecycle() {
                Some(c) => c.on_request_failure(&request_record(v)?),
                None => Ok(()),
            }),
        ));
    }

    if instance.as_metrics_monitor().is_some() {
        let plugin = Arc::clone(instance);
        handlers.push((
            names::START_MONITORING,
            Arc::new(move |_: &Value| match plugin.as_metrics_monitor() {
                Some(m) => m.start_monitoring(),
                None => Ok(()),
            }),
        ));
        let plugin = Arc::clone(instance);
        handlers.push((
            names::STOP_MONITORING,
            Arc::new(move |_: &Value| match plugin.as_metrics_monitor() {
                Some(m) => m.stop_monitoring(),
                None => Ok(()),
            }),
        ));
    }

    handlers
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    fn recording(log: &Arc<Mutex<Vec<String>>>, label: &str) -> EventHandler {
        let log = Arc::clone(log);
        let label = label.to_string();
        handler(move |_| {
            log.lock().push(label.clone());
            Ok(())
        })
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut routes = EventRoutes::new();
        routes.register(names::TEST_START, Some("A"), recording(&log, "A"));
        routes.register(names::TEST_START, None, recording(&log, "ext"));
        routes.register(names::TEST_START, Some("B"), recording(&log, "B"));

        let report = dispatch(names::TEST_START, routes.snapshot(names::TEST_START), &json!({}));

        assert!(report.is_clean());
        assert_eq!(report.invoked, 3);
        assert_eq!(*log.lock(), vec!["A", "ext", "B"]);
    }

    #[test]
    fn test_failure_does_not_stop_dispatch() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut routes = EventRoutes::new();
        routes.register(
            names::REQUEST_FAILURE,
            Some("A"),
            handler(|_| Err(Error::Internal("boom".into()))),
        );
        routes.register(names::REQUEST_FAILURE, Some("B"), recording(&log, "B"));

        let report = dispatch(
            names::REQUEST_FAILURE,
            routes.snapshot(names::REQUEST_FAILURE),
            &Value::Null,
        );

        assert_eq!(report.invoked, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].owner.as_deref(), Some("A"));
        assert_eq!(*log.lock(), vec!["B"]);
        assert!(matches!(report.errors()[0], Error::Handler { .. }));
    }

    #[test]
    fn test_unregister_by_identity() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = recording(&log, "first");
        let second = recording(&log, "second");

        let mut routes = EventRoutes::new();
        routes.register(names::TEST_STOP, None, Arc::clone(&first));
        routes.register(names::TEST_STOP, None, Arc::clone(&second));

        assert!(routes.unregister(names::TEST_STOP, &first));
        assert!(!routes.unregister(names::TEST_STOP, &first));
        assert_eq!(routes.handler_count(names::TEST_STOP), 1);

        dispatch(names::TEST_STOP, routes.snapshot(names::TEST_STOP), &Value::Null);
        assert_eq!(*log.lock(), vec!["second"]);
    }

    #[test]
    fn test_remove_owner() {
        let mut routes = EventRoutes::new();
        routes.register(names::TEST_START, Some("A"), handler(|_| Ok(())));
        routes.register(names::TEST_STOP, Some("A"), handler(|_| Ok(())));
        routes.register(names::TEST_STOP, Some("B"), handler(|_| Ok(())));

        assert_eq!(routes.events_for("A"), vec!["test_start", "test_stop"]);
        assert_eq!(routes.remove_owner("A"), 2);
        assert!(!routes.has_owner("A"));
        assert_eq!(routes.handler_count(names::TEST_START), 0);
        assert_eq!(routes.owners(names::TEST_STOP), vec![Some("B".to_string())]);
    }

    #[test]
    fn test_unknown_event_is_empty() {
        let routes = EventRoutes::new();
        let report = dispatch("custom_event", routes.snapshot("custom_event"), &Value::Null);
        assert_eq!(report.invoked, 0);
        assert!(report.is_clean());
    }
}
