//! Error types for Pyrite
//!
//! 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Pyrite 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 설정 / 프로비저닝 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid event name: {0}")]
    InvalidEvent(String),

    // ========================================================================
    // 저장소 관련
    // ========================================================================
    #[error("Storage error: {0}")]
    Storage(String),

    // ========================================================================
    // Dispatch 관련
    // ========================================================================
    #[error("Listener failed: {event} / {listener} - {message}")]
    Listener {
        event: String,
        listener: String,
        message: String,
    },

    #[error("Dispatch depth exceeded: {event} at depth {depth} (max {max})")]
    DepthExceeded { event: String, depth: u32, max: u32 },

    // ========================================================================
    // 일반
    // ========================================================================
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

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 프로비저닝 단계에서만 치명적인 설정 에러인지 확인
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_) | Error::InvalidEvent(_))
    }

    /// 사용자에게 보여줄 수 있는 에러인지 확인
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Error::InvalidInput(_) | Error::Validation(_))
    }

    /// Listener 실패 에러 생성 헬퍼
    pub fn listener(
        event: impl Into<String>,
        listener: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Listener {
            event: event.into(),
            listener: listener.into(),
            message: message.into(),
        }
    }

    /// Lock poisoning 에러
    pub fn poisoned() -> Self {
        Error::Internal("Lock poisoned".to_string())
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
    fn test_error_categories() {
        assert!(Error::Config("dup".into()).is_config());
        assert!(Error::InvalidEvent("Bad Name".into()).is_config());
        assert!(!Error::Storage("x".into()).is_config());

        assert!(Error::Validation("email is required".into()).is_user_facing());
        assert!(!Error::listener("can", "acl.can", "boom").is_user_facing());
        assert!(!Error::Internal("x".into()).is_user_facing());
    }

    #[test]
    fn test_listener_error_display() {
        let err = Error::listener("can", "acl.can", "boom");
        assert_eq!(err.to_string(), "Listener failed: can / acl.can - boom");
    }
}
