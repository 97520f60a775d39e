//! Plugin Catalog - 명시적 플러그인 등록부
//!
//! 런타임 파일 스캔이나 동적 코드 실행 대신, 각 플러그인 패키지가 초기화 시점에
//! 자신의 소스 단위(unit)와 구현 타입 팩토리를 등록합니다.
//! 로더는 이 카탈로그를 대상으로 발견/로드를 수행합니다.

use super::traits::Plugin;
use std::sync::Arc;
use volley_foundation::Result;

/// 구현 타입 생성자
pub type PluginFactory = Arc<dyn Fn() -> Result<Arc<dyn Plugin>> + Send + Sync>;

/// 카탈로그에 등록된 구현 타입
#[derive(Clone)]
pub struct PluginType {
    /// 타입 이름 (진단용)
    pub type_name: String,

    /// 생성자
    pub factory: PluginFactory,
}

impl PluginType {
    /// 인스턴스 생성
    pub fn construct(&self) -> Result<Arc<dyn Plugin>> {
        (self.factory)()
    }
}

impl std::fmt::Debug for PluginType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginType")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// 소스 단위 - 하나의 플러그인 구현을 담는 등록 단위
#[derive(Debug, Clone)]
pub struct SourceUnit {
    /// 단위 이름 (플러그인 이름의 기본 키)
    pub name: String,

    /// 이 단위에서 정의된 구현 타입
    pub types: Vec<PluginType>,
}

impl SourceUnit {
    /// `_`로 시작하는 비공개 단위 또는 `.`으로 시작하는 숨김 단위
    pub fn is_private(&self) -> bool {
        self.name.starts_with('_') || self.name.starts_with('.')
    }
}

/// 플러그인 카탈로그
#[derive(Debug, Clone, Default)]
pub struct PluginCatalog {
    /// 등록 순서를 유지
    units: Vec<SourceUnit>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Default`로 생성 가능한 타입 등록
    pub fn register<P>(&mut self, unit: impl Into<String>) -> &mut Self
    where
        P: Plugin + Default + 'static,
    {
        self.register_factory(unit, std::any::type_name::<P>(), || {
            Ok(Arc::new(P::default()) as Arc<dyn Plugin>)
        })
    }

    /// 임의의 생성자 등록
    pub fn register_factory<F>(
        &mut self,
        unit: impl Into<String>,
        type_name: impl Into<String>,
        factory: F,
    ) -> &mut Self
    where
        F: Fn() -> Result<Arc<dyn Plugin>> + Send + Sync + 'static,
    {
        let unit = unit.into();
        let plugin_type = PluginType {
            type_name: type_name.into(),
            factory: Arc::new(factory),
        };

        match self.units.iter_mut().find(|u| u.name == unit) {
            Some(existing) => existing.types.push(plugin_type),
            None => self.units.push(SourceUnit {
                name: unit,
                types: vec![plugin_type],
            }),
        }
        self
    }

    /// 단위 조회 (정확히 일치)
    pub fn unit(&self, name: &str) -> Option<&SourceUnit> {
        self.units.iter().find(|u| u.name == name)
    }

    /// 단위 조회 - 정확히 일치하지 않으면 대소문자 무시 부분 일치
    pub fn find_unit(&self, name: &str) -> Option<&SourceUnit> {
        if let Some(unit) = self.unit(name) {
            return Some(unit);
        }
        let needle = name.to_lowercase();
        self.units
            .iter()
            .filter(|u| !u.is_private())
            .find(|u| u.name.to_lowercase().contains(&needle))
    }

    /// 모든 단위 (등록 순서)
    pub fn units(&self) -> &[SourceUnit] {
        &self.units
    }

    pub fn contains(&self, name: &str) -> bool {
        self.unit(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::descriptor::{PluginConfig, PluginDescriptor};
    use crate::plugin::traits::PluginState;
    use std::any::Any;

    #[derive(Default)]
    struct EchoPlugin {
        state: PluginState,
    }

    impl Plugin for EchoPlugin {
        fn descriptor(&self) -> PluginDescriptor {
            PluginDescriptor::new("Echo", "general")
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

    #[test]
    fn test_register_keeps_order() {
        let mut catalog = PluginCatalog::new();
        catalog
            .register::<EchoPlugin>("echo_plugin")
            .register::<EchoPlugin>("_helpers");

        let names: Vec<_> = catalog.units().iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["echo_plugin", "_helpers"]);
        assert!(catalog.unit("_helpers").unwrap().is_private());
    }

    #[test]
    fn test_same_unit_accumulates_types() {
        let mut catalog = PluginCatalog::new();
        catalog.register::<EchoPlugin>("echo_plugin");
        catalog.register::<EchoPlugin>("echo_plugin");

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.unit("echo_plugin").unwrap().types.len(), 2);
    }

    #[test]
    fn test_find_unit_fuzzy() {
        let mut catalog = PluginCatalog::new();
        catalog.register::<EchoPlugin>("csv_report_plugin");

        assert!(catalog.find_unit("csv_report_plugin").is_some());
        assert_eq!(catalog.find_unit("CSV_Report").unwrap().name, "csv_report_plugin");
        assert!(catalog.find_unit("webhook").is_none());
    }

    #[test]
    fn test_construct() {
        let mut catalog = PluginCatalog::new();
        catalog.register::<EchoPlugin>("echo_plugin");

        let plugin = catalog.unit("echo_plugin").unwrap().types[0].construct().unwrap();
        assert_eq!(plugin.descriptor().name, "Echo");
    }
}
