//! Grant 타입 정의
//!
//! 권한 triplet `(action, objectType, objectId)` 과 각 단계의 와일드카드.
//! 저장소 표현은 `'*'` / `0` 마커를 쓰지만 메모리에서는 `Scope` 로만 다룬다.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 저장소에서 "모든 action / objectType" 을 뜻하는 마커
pub const ANY_MARKER: &str = "*";

/// 저장소에서 "모든 objectId" 를 뜻하는 마커
pub const ANY_ID: i64 = 0;

// ============================================================================
// Scope
// ============================================================================

/// 한 단계의 권한 범위
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope<T> {
    /// 모든 값과 매칭
    Any,
    /// 특정 값만 매칭
    Specific(T),
}

impl<T> Scope<T> {
    pub fn is_any(&self) -> bool {
        matches!(self, Scope::Any)
    }

    pub fn specific(&self) -> Option<&T> {
        match self {
            Scope::Any => None,
            Scope::Specific(value) => Some(value),
        }
    }
}

impl Scope<String> {
    /// 저장소 문자열에서 변환 (`'*'` → Any)
    pub fn from_marker(value: impl Into<String>) -> Self {
        let value = value.into();
        if value == ANY_MARKER {
            Scope::Any
        } else {
            Scope::Specific(value)
        }
    }

    /// 저장소 문자열로 변환
    pub fn to_marker(&self) -> String {
        match self {
            Scope::Any => ANY_MARKER.to_string(),
            Scope::Specific(value) => value.clone(),
        }
    }
}

impl Scope<i64> {
    /// 저장소 id 에서 변환 (`0` → Any)
    pub fn from_id(id: i64) -> Self {
        if id == ANY_ID {
            Scope::Any
        } else {
            Scope::Specific(id)
        }
    }

    pub fn to_id(&self) -> i64 {
        match self {
            Scope::Any => ANY_ID,
            Scope::Specific(id) => *id,
        }
    }
}

// ============================================================================
// Grant
// ============================================================================

/// 권한 부여 단위
///
/// - `action = Any`: 모든 것에 대한 무제한 권한 (super-admin)
/// - `object_type = Any`: 해당 action 의 모든 타입, 모든 id
/// - `object_id = Any`: 해당 타입의 모든 인스턴스
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "GrantRow", from = "GrantRow")]
pub struct Grant {
    pub action: Scope<String>,
    pub object_type: Scope<String>,
    pub object_id: Scope<i64>,
}

impl Grant {
    /// 무제한 권한 `(*, *, 0)`
    pub fn everything() -> Self {
        Self {
            action: Scope::Any,
            object_type: Scope::Any,
            object_id: Scope::Any,
        }
    }

    /// 특정 action 의 모든 타입에 대한 권한 `(action, *, 0)`
    pub fn action(action: impl Into<String>) -> Self {
        Self {
            action: Scope::from_marker(action),
            object_type: Scope::Any,
            object_id: Scope::Any,
        }
    }

    /// 타입 한정
    pub fn of_type(mut self, object_type: impl Into<String>) -> Self {
        self.object_type = Scope::from_marker(object_type);
        self
    }

    /// id 한정
    pub fn with_id(mut self, object_id: i64) -> Self {
        self.object_id = Scope::from_id(object_id);
        self
    }

    /// 저장소 행에서 변환
    pub fn from_row(action: impl Into<String>, object_type: impl Into<String>, object_id: i64) -> Self {
        Self {
            action: Scope::from_marker(action),
            object_type: Scope::from_marker(object_type),
            object_id: Scope::from_id(object_id),
        }
    }

    /// 저장소 행으로 변환
    pub fn to_row(&self) -> (String, String, i64) {
        (
            self.action.to_marker(),
            self.object_type.to_marker(),
            self.object_id.to_id(),
        )
    }

    /// super-admin 권한인지
    pub fn is_unrestricted(&self) -> bool {
        self.action.is_any()
    }
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (action, object_type, object_id) = self.to_row();
        write!(f, "({}, {}, {})", action, object_type, object_id)
    }
}

/// 직렬화용 행 표현
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantRow {
    pub action: String,
    pub object_type: String,
    pub object_id: i64,
}

impl From<Grant> for GrantRow {
    fn from(grant: Grant) -> Self {
        let (action, object_type, object_id) = grant.to_row();
        Self {
            action,
            object_type,
            object_id,
        }
    }
}

impl From<GrantRow> for Grant {
    fn from(row: GrantRow) -> Self {
        Grant::from_row(row.action, row.object_type, row.object_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers_become_scopes() {
        let grant = Grant::from_row("*", "*", 0);
        assert_eq!(grant, Grant::everything());
        assert!(grant.is_unrestricted());

        let grant = Grant::from_row("edit", "document", 42);
        assert_eq!(grant.action, Scope::Specific("edit".to_string()));
        assert_eq!(grant.object_type.specific().map(String::as_str), Some("document"));
        assert_eq!(grant.object_id, Scope::Specific(42));
    }

    #[test]
    fn test_builder_and_display() {
        let grant = Grant::action("publish").of_type("article");
        assert_eq!(grant.to_string(), "(publish, article, 0)");

        let grant = Grant::action("edit").of_type("document").with_id(7);
        assert_eq!(grant.to_row(), ("edit".to_string(), "document".to_string(), 7));
    }

    #[test]
    fn test_serde_uses_row_form() {
        let grant = Grant::action("edit").of_type("document").with_id(42);
        let json = serde_json::to_value(&grant).unwrap();
        assert_eq!(json["objectType"], "document");
        assert_eq!(json["objectId"], 42);

        let back: Grant = serde_json::from_value(json).unwrap();
        assert_eq!(back, grant);
    }
}
