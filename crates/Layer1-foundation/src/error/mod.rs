//! Error types for Volley
//!
//! 플러그인 서브시스템의 모든 에러를 중앙에서 관리합니다.
//! 플러그인 범위 에러(Discovery ~ Cleanup)는 호스트 프로세스를 중단시키지 않고
//! 해당 플러그인 하나만 격하시킵니다.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Volley 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 플러그인 관련
    // ========================================================================
    #[error("Discovery error: {unit} - {message}")]
    Discovery { unit: String, message: String },

    #[error("Load error: {plugin} - {message}")]
    Load { plugin: String, message: String },

    #[error("Dependency error: {plugin} requires {missing:?}")]
    Dependency { plugin: String, missing: Vec<String> },

    #[error("Initialization error: {plugin} - {message}")]
    Initialization { plugin: String, message: String },

    #[error("Handler error: {plugin} on {event} - {message}")]
    Handler {
        plugin: String,
        event: String,
        message: String,
    },

    #[error("Cleanup error: {plugin} - {message}")]
    Cleanup { plugin: String, message: String },

    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // 일반
    // ========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation error: {0}")]
    Validation(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 플러그인 하나에 국한되는 에러인지 확인
    pub fn is_plugin_scoped(&self) -> bool {
        matches!(
            self,
            Error::Discovery { .. }
                | Error::Load { .. }
                | Error::Dependency { .. }
                | Error::Initialization { .. }
                | Error::Handler { .. }
                | Error::Cleanup { .. }
        )
    }

    /// 사용자에게 보여줄 수 있는 에러인지 확인
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::InvalidInput(_)
                | Error::Validation(_)
                | Error::Dependency { .. }
        )
    }

    /// Discovery 에러 생성 헬퍼
    pub fn discovery(unit: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Discovery {
            unit: unit.into(),
            message: message.into(),
        }
    }

    /// Load 에러 생성 헬퍼
    pub fn load(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Load {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Dependency 에러 생성 헬퍼
    pub fn dependency(plugin: impl Into<String>, missing: Vec<String>) -> Self {
        Error::Dependency {
            plugin: plugin.into(),
            missing,
        }
    }

    /// Initialization 에러 생성 헬퍼
    pub fn initialization(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Initialization {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Handler 에러 생성 헬퍼
    pub fn handler(
        plugin: impl Into<String>,
        event: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Handler {
            plugin: plugin.into(),
            event: event.into(),
            message: message.into(),
        }
    }

    /// Cleanup 에러 생성 헬퍼
    pub fn cleanup(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Cleanup {
            plugin: plugin.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_scoped() {
        assert!(Error::load("csv", "no factory").is_plugin_scoped());
        assert!(Error::handler("csv", "test_start", "boom").is_plugin_scoped());
        assert!(!Error::Config("bad".into()).is_plugin_scoped());
    }

    #[test]
    fn test_dependency_message() {
        let err = Error::dependency("Notifier", vec!["MissingPlugin".into()]);
        assert_eq!(
            err.to_string(),
            "Dependency error: Notifier requires [\"MissingPlugin\"]"
        );
        assert!(err.is_user_facing());
    }

    #[test]
    fn test_anyhow_conversion() {
        let err: Error = anyhow::anyhow!("webhook unreachable").into();
        assert_eq!(err.to_string(), "webhook unreachable");
    }
}
