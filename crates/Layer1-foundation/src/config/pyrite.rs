//! Pyrite Config - 통합 설정
//!
//! 글로벌 (`<config_dir>/pyrite/config.json`) + 프로젝트 (`.pyrite/config.json`)
//! 병합. 프로젝트 설정이 우선한다.

use crate::storage::ConfigDir;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 설정 파일명
pub const PYRITE_CONFIG_FILE: &str = "config.json";

// ============================================================================
// Pyrite Config (통합)
// ============================================================================

/// Pyrite 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PyriteConfig {
    /// 버전 (마이그레이션용)
    #[serde(default = "default_version")]
    pub version: u32,

    /// 데이터베이스 설정
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Hook dispatch 설정
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// ACL 설정
    #[serde(default)]
    pub acl: AclConfig,

    /// 감사 로그 설정
    #[serde(default)]
    pub audit: AuditConfig,
}

impl PyriteConfig {
    pub fn new() -> Self {
        Self {
            version: default_version(),
            ..Default::default()
        }
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// 글로벌 + 프로젝트 병합 로드
    pub fn load() -> Result<Self> {
        let mut config = Self::new();

        // 1. 글로벌 설정
        if let Ok(global) = ConfigDir::global() {
            if let Some(global_config) = global.read_optional::<PartialConfig>(PYRITE_CONFIG_FILE)? {
                config.merge(global_config);
            }
        }

        // 2. 프로젝트 설정
        if let Ok(project) = ConfigDir::current_project() {
            if let Some(project_config) =
                project.read_optional::<PartialConfig>(PYRITE_CONFIG_FILE)?
            {
                config.merge(project_config);
            }
        }

        Ok(config)
    }

    /// 특정 디렉토리의 설정만 로드
    pub fn load_from(dir: &ConfigDir) -> Result<Self> {
        let mut config = Self::new();
        if let Some(partial) = dir.read_optional::<PartialConfig>(PYRITE_CONFIG_FILE)? {
            config.merge(partial);
        }
        Ok(config)
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// 부분 설정과 병합 (other 가 우선)
    pub fn merge(&mut self, other: PartialConfig) {
        if let Some(db) = other.database {
            if db.path.is_some() {
                self.database.path = db.path;
            }
        }

        if let Some(dispatch) = other.dispatch {
            if let Some(timeout) = dispatch.listener_timeout_ms {
                self.dispatch.listener_timeout_ms = timeout;
            }
            if let Some(depth) = dispatch.max_depth {
                self.dispatch.max_depth = depth;
            }
            if let Some(strict) = dispatch.strict_event_names {
                self.dispatch.strict_event_names = strict;
            }
            if let Some(legacy) = dispatch.legacy_false_passes {
                self.dispatch.legacy_false_passes = legacy;
            }
        }

        if let Some(acl) = other.acl {
            if let Some(invalidate) = acl.invalidate_on_change {
                self.acl.invalidate_on_change = invalidate;
            }
        }

        if let Some(audit) = other.audit {
            if let Some(addr) = audit.default_remote_addr {
                self.audit.default_remote_addr = addr;
            }
            if let Some(max) = audit.history_max {
                self.audit.history_max = max;
            }
        }
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database.path = Some(path.into());
        self
    }

    pub fn listener_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch.listener_timeout_ms = timeout.as_millis() as u64;
        self
    }
}

fn default_version() -> u32 {
    1
}

// ============================================================================
// Database
// ============================================================================

/// 데이터베이스 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    /// SQLite 파일 경로 (None 이면 기본 경로)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl DatabaseConfig {
    /// 실제 사용할 경로
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("pyrite")
                .join("pyrite.db")
        })
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Hook dispatch 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchConfig {
    /// listener 하나당 타임아웃 (ms)
    #[serde(default = "default_listener_timeout_ms")]
    pub listener_timeout_ms: u64,

    /// 중첩 dispatch 최대 깊이
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// 알 수 없는 이벤트 이름을 freeze 시점에 에러로 처리
    #[serde(default)]
    pub strict_event_names: bool,

    /// chain_first 에서 `false` 값을 "결과 없음" 으로 취급
    #[serde(default)]
    pub legacy_false_passes: bool,
}

impl DispatchConfig {
    pub fn listener_timeout(&self) -> Duration {
        Duration::from_millis(self.listener_timeout_ms)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            listener_timeout_ms: default_listener_timeout_ms(),
            max_depth: default_max_depth(),
            strict_event_names: false,
            legacy_false_passes: false,
        }
    }
}

fn default_listener_timeout_ms() -> u64 {
    30_000
}

fn default_max_depth() -> u32 {
    16
}

// ============================================================================
// ACL
// ============================================================================

/// ACL 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AclConfig {
    /// 권한 변경 시 영향받는 세션 캐시를 즉시 무효화
    #[serde(default)]
    pub invalidate_on_change: bool,
}

// ============================================================================
// Audit
// ============================================================================

/// 감사 로그 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditConfig {
    /// 요청 정보가 없을 때 기록할 주소
    #[serde(default = "default_remote_addr")]
    pub default_remote_addr: String,

    /// history 조회 최대 행 수
    #[serde(default = "default_history_max")]
    pub history_max: u32,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            default_remote_addr: default_remote_addr(),
            history_max: default_history_max(),
        }
    }
}

fn default_remote_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_history_max() -> u32 {
    1000
}

// ============================================================================
// Partial (병합용)
// ============================================================================

/// 파일에서 읽은 부분 설정 (명시된 값만 덮어쓴다)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialConfig {
    pub database: Option<PartialDatabase>,
    pub dispatch: Option<PartialDispatch>,
    pub acl: Option<PartialAcl>,
    pub audit: Option<PartialAudit>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialDatabase {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialDispatch {
    pub listener_timeout_ms: Option<u64>,
    pub max_depth: Option<u32>,
    pub strict_event_names: Option<bool>,
    pub legacy_false_passes: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialAcl {
    pub invalidate_on_change: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialAudit {
    pub default_remote_addr: Option<String>,
    pub history_max: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PyriteConfig::new();
        assert_eq!(config.version, 1);
        assert_eq!(config.dispatch.listener_timeout(), Duration::from_secs(30));
        assert_eq!(config.dispatch.max_depth, 16);
        assert!(!config.dispatch.strict_event_names);
        assert!(!config.acl.invalidate_on_change);
        assert_eq!(config.audit.default_remote_addr, "127.0.0.1");
    }

    #[test]
    fn test_merge_only_overrides_present_fields() {
        let mut config = PyriteConfig::new();
        let partial: PartialConfig = serde_json::from_str(
            r#"{ "dispatch": { "strictEventNames": true }, "acl": { "invalidateOnChange": true } }"#,
        )
        .unwrap();

        config.merge(partial);

        assert!(config.dispatch.strict_event_names);
        assert_eq!(config.dispatch.max_depth, 16);
        assert!(config.acl.invalidate_on_change);
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = ConfigDir::new(dir.path());
        std::fs::write(
            config_dir.file_path(PYRITE_CONFIG_FILE),
            r#"{ "database": { "path": "/tmp/app.db" }, "audit": { "historyMax": 20 } }"#,
        )
        .unwrap();

        let config = PyriteConfig::load_from(&config_dir).unwrap();
        assert_eq!(config.database.resolved_path(), PathBuf::from("/tmp/app.db"));
        assert_eq!(config.audit.history_max, 20);
    }
}
