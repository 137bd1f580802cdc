//! 설정 디렉토리 - JSON 설정 파일 읽기 전용 접근
//!
//! 파일이 없으면 `None`, 있는데 깨져 있으면 경로를 담은 `Error::Config`.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 설정 파일이 놓이는 디렉토리
#[derive(Debug, Clone)]
pub struct ConfigDir {
    root: PathBuf,
}

impl ConfigDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 사용자 전역 디렉토리 (`<config_dir>/pyrite`)
    pub fn global() -> Result<Self> {
        dirs::config_dir()
            .map(|dir| Self::new(dir.join("pyrite")))
            .ok_or_else(|| Error::Config("no user config directory on this platform".to_string()))
    }

    /// 작업 디렉토리 아래 `.pyrite`
    pub fn current_project() -> Result<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| Error::Config(format!("working directory unavailable: {}", e)))?;
        Ok(Self::new(cwd.join(".pyrite")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    /// 파일이 있으면 역직렬화
    pub fn read_optional<T: DeserializeOwned>(&self, filename: &str) -> Result<Option<T>> {
        let path = self.file_path(filename);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Config(format!("{}: {}", path.display(), e))),
        };

        let value = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Config file read");
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Sample {
        name: String,
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = ConfigDir::new(dir.path().join("absent"));
        assert!(config_dir.read_optional::<Sample>("config.json").unwrap().is_none());
    }

    #[test]
    fn test_read_present_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = ConfigDir::new(dir.path());
        std::fs::write(config_dir.file_path("config.json"), r#"{ "name": "pyrite" }"#).unwrap();

        let sample = config_dir.read_optional::<Sample>("config.json").unwrap();
        assert_eq!(sample, Some(Sample { name: "pyrite".to_string() }));
    }

    #[test]
    fn test_malformed_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = ConfigDir::new(dir.path());
        std::fs::write(config_dir.file_path("config.json"), "{ not json").unwrap();

        match config_dir.read_optional::<Sample>("config.json") {
            Err(Error::Config(message)) => assert!(message.contains("config.json")),
            other => panic!("expected config error, got {:?}", other),
        }
    }
}
