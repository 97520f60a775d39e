//! Plugin Discovery - 메타데이터 사이드카 탐색
//!
//! 검색 경로(search roots)를 재귀적으로 탐색하여 소스 단위와 같은 이름의
//! 사이드카 문서(`<unit>.json`)를 찾습니다.
//!
//! 해석 순서:
//! 1. 각 검색 경로 바로 아래의 정확한 파일명
//! 2. 하위 디렉토리의 정확한 파일명
//! 3. 파일명(stem)에 단위 이름이 포함된 파일 (대소문자 무시)
//!
//! 숨김(`.`) 또는 비공개(`_`) 파일/디렉토리는 후보에서 제외됩니다.

use super::descriptor::MetadataSidecar;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use volley_foundation::{Error, PluginSettings, Result};

/// 사이드카 탐색기
#[derive(Debug, Clone)]
pub struct SidecarResolver {
    /// 검색 경로들 (우선순위 순)
    roots: Vec<PathBuf>,

    /// 사이드카 확장자 (점 제외)
    extension: String,
}

impl SidecarResolver {
    /// 새 탐색기 생성
    pub fn new(roots: Vec<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            roots,
            extension: extension.into().trim_start_matches('.').to_string(),
        }
    }

    /// 설정에서 생성
    pub fn from_settings(settings: &PluginSettings) -> Self {
        Self::new(settings.search_roots.clone(), settings.metadata_extension.clone())
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// 소스 단위 위치에 대응하는 사이드카 경로
    pub fn sidecar_for(&self, unit_path: &Path) -> PathBuf {
        unit_path.with_extension(&self.extension)
    }

    // ========================================================================
    // 해석
    // ========================================================================

    /// 단위 이름으로 사이드카 경로 해석
    pub fn resolve(&self, unit: &str) -> Option<PathBuf> {
        let file_name = format!("{}.{}", unit, self.extension);

        for root in &self.roots {
            if !root.is_dir() {
                continue;
            }

            // 1. 정확한 파일명
            let direct = root.join(&file_name);
            if direct.is_file() && is_public(&direct) {
                return Some(direct);
            }

            let candidates = self.candidates(root);

            // 2. 하위 디렉토리 정확한 파일명
            if let Some(found) = candidates
                .iter()
                .find(|p| p.file_name().and_then(|n| n.to_str()) == Some(file_name.as_str()))
            {
                return Some(found.clone());
            }

            // 3. 부분 일치
            let needle = unit.to_lowercase();
            if let Some(found) = candidates.iter().find(|p| {
                p.file_stem()
                    .and_then(|s| s.to_str())
                    .map(|s| s.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            }) {
                return Some(found.clone());
            }
        }

        None
    }

    /// 모든 검색 경로의 사이드카 단위 이름 (stem)
    pub fn list_units(&self) -> Vec<String> {
        let mut units = Vec::new();
        for root in &self.roots {
            for path in self.candidates(root) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if !units.iter().any(|u| u == stem) {
                        units.push(stem.to_string());
                    }
                }
            }
        }
        units
    }

    /// 검색 경로 아래의 후보 파일 (파일명 순)
    fn candidates(&self, root: &Path) -> Vec<PathBuf> {
        if !root.is_dir() {
            return vec![];
        }

        let walker = WalkBuilder::new(root)
            .hidden(true) // 숨김 파일 제외
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .filter_entry(|entry| {
                entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('_')
            })
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut found = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!("Skipping unreadable entry under {:?}: {}", root, e);
                    continue;
                }
            };

            let path = entry.path();
            if path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(self.extension.as_str())
            {
                found.push(path.to_path_buf());
            }
        }
        found
    }

    // ========================================================================
    // 읽기
    // ========================================================================

    /// 사이드카 파싱
    pub fn read(&self, path: &Path) -> Result<MetadataSidecar> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            Error::discovery(
                path.display().to_string(),
                format!("invalid metadata document: {}", e),
            )
        })
    }

    /// 사이드카 파싱 - 실패는 경고 후 None
    pub fn read_lenient(&self, path: &Path) -> Option<MetadataSidecar> {
        match self.read(path) {
            Ok(sidecar) => Some(sidecar),
            Err(e) => {
                warn!("Ignoring metadata sidecar {:?}: {}", path, e);
                None
            }
        }
    }
}

fn is_public(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| !n.starts_with('_') && !n.starts_with('.'))
        .unwrap_or(false)
}
