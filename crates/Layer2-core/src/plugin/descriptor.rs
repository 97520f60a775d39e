//! Plugin Descriptor - 플러그인 메타데이터 정의

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// 플러그인 설정 (임의의 key/value)
pub type PluginConfig = Map<String, Value>;

/// 플러그인 버전
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PluginVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl PluginVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// 버전 문자열 파싱 (예: "1.2.3")
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return None;
        }

        Some(Self {
            major: parts[0].parse().ok()?,
            minor: parts[1].parse().ok()?,
            patch: parts[2].parse().ok()?,
        })
    }

    /// 호환성 검사
    pub fn is_compatible_with(&self, other: &PluginVersion) -> bool {
        // 같은 메이저 버전이면 호환
        self.major == other.major
    }
}

impl std::fmt::Display for PluginVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Default for PluginVersion {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

// 사이드카/상태 파일에서는 "1.2.3" 문자열로 표현
impl Serialize for PluginVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PluginVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PluginVersion::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid version: {}", raw)))
    }
}

/// 플러그인 디스크립터 - 로드된 타입에서 생성되는 불변 메타데이터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// 고유 이름 (로드된 타입 사이에서 유일)
    pub name: String,

    /// 버전
    pub version: PluginVersion,

    /// 설명
    #[serde(default)]
    pub description: String,

    /// 작성자
    #[serde(default)]
    pub author: String,

    /// 카테고리 태그 (예: "report", "monitor")
    #[serde(default = "default_category")]
    pub category: String,

    /// 의존하는 플러그인 이름 목록
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// 설정 스키마
    #[serde(default)]
    pub config_schema: Map<String, Value>,
}

fn default_category() -> String {
    "general".to_string()
}

impl PluginDescriptor {
    /// 새 디스크립터 생성
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: PluginVersion::default(),
            description: String::new(),
            author: String::new(),
            category: category.into(),
            dependencies: vec![],
            config_schema: Map::new(),
        }
    }

    /// 빌더 패턴: 버전 설정
    pub fn with_version(mut self, version: PluginVersion) -> Self {
        self.version = version;
        self
    }

    /// 빌더 패턴: 설명 설정
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// 빌더 패턴: 작성자 설정
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// 빌더 패턴: 의존성 추가
    pub fn with_dependency(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }

    /// 빌더 패턴: 설정 스키마 항목 추가
    pub fn with_config_field(mut self, key: impl Into<String>, schema: Value) -> Self {
        self.config_schema.insert(key.into(), schema);
        self
    }

    /// 구조 검증 - 잘못된 경우 사유 반환
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("descriptor name is empty".into());
        }
        if self.category.trim().is_empty() {
            return Err("descriptor category is empty".into());
        }
        if self.dependencies.iter().any(|dep| dep == &self.name) {
            return Err(format!("{} depends on itself", self.name));
        }
        if self.dependencies.iter().any(|dep| dep.trim().is_empty()) {
            return Err("empty dependency name".into());
        }
        Ok(())
    }
}

// ============================================================================
// Sidecar - 외부 메타데이터 문서
// ============================================================================

/// 소스 단위와 같은 이름의 외부 메타데이터 문서
///
/// 모든 필드는 선택적이며, 존재하는 필드만 디스크립터를 덮어씁니다.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataSidecar {
    pub name: Option<String>,
    pub version: Option<PluginVersion>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub dependencies: Option<Vec<String>>,
    pub config_schema: Option<Map<String, Value>>,

    /// 알 수 없는 키 (그대로 보존)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MetadataSidecar {
    /// 디스크립터 위에 덮어쓰기 (사이드카 우선)
    pub fn overlay(&self, descriptor: &mut PluginDescriptor) {
        if let Some(name) = &self.name {
            descriptor.name = name.clone();
        }
        if let Some(version) = self.version {
            descriptor.version = version;
        }
        if let Some(description) = &self.description {
            descriptor.description = description.clone();
        }
        if let Some(author) = &self.author {
            descriptor.author = author.clone();
        }
        if let Some(category) = &self.category {
            descriptor.category = category.clone();
        }
        if let Some(dependencies) = &self.dependencies {
            descriptor.dependencies = dependencies.clone();
        }
        if let Some(schema) = &self.config_schema {
            descriptor.config_schema = schema.clone();
        }
    }
}

/// 로더가 보관하는 플러그인 메타데이터 레코드
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginMetadata {
    /// 사이드카가 적용된 디스크립터
    pub descriptor: PluginDescriptor,

    /// 소스 단위 이름
    pub unit: String,

    /// 구현 타입 이름
    pub type_name: String,

    /// 적용된 사이드카 경로
    pub sidecar_path: Option<PathBuf>,

    /// 사이드카의 추가 키
    pub extra: Map<String, Value>,
}
