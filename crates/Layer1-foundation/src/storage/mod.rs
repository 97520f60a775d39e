//! Storage module for Volley
//!
//! - `json`: JSON - 범용 파일 저장/로드 (플러그인 상태, 설정)

mod json;

pub use json::JsonStore;
