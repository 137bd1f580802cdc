//! Audit Trail Types - 감사 기록 타입 정의
//!
//! `log` / `history` 이벤트 인자는 두 가지 형태를 모두 받는다:
//! 이름 있는 인자 객체 하나, 또는 순서 있는 인자 목록.

use pyrite_foundation::{HookArgs, JsonRow};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// AuditRecord - 기록할 트랜잭션
// ============================================================================

/// 새로 기록할 감사 항목
///
/// 순서 인자 형태: `(objectType, objectId, action, fieldName, oldValue, newValue, userId)`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub object_type: Option<String>,
    pub object_id: Option<i64>,
    pub action: String,
    pub field_name: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    /// 행위자. 없으면 세션 사용자.
    pub user_id: Option<i64>,
}

impl AuditRecord {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Default::default()
        }
    }

    pub fn object(mut self, object_type: impl Into<String>, object_id: Option<i64>) -> Self {
        self.object_type = Some(object_type.into());
        self.object_id = object_id;
        self
    }

    pub fn field(
        mut self,
        field_name: impl Into<String>,
        old_value: Option<String>,
        new_value: Option<String>,
    ) -> Self {
        self.field_name = Some(field_name.into());
        self.old_value = old_value;
        self.new_value = new_value;
        self
    }

    pub fn by(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// 이벤트 인자에서 변환
    pub fn from_args(args: &HookArgs) -> Self {
        if let Some(named) = args.object_at(0) {
            return Self {
                object_type: text(named.get("objectType")),
                object_id: integer(named.get("objectId")),
                action: text(named.get("action")).unwrap_or_default(),
                field_name: text(named.get("fieldName")),
                old_value: text(named.get("oldValue")),
                new_value: text(named.get("newValue")),
                user_id: integer(named.get("userId")),
            };
        }

        Self {
            object_type: text(args.get(0)),
            object_id: integer(args.get(1)),
            action: text(args.get(2)).unwrap_or_default(),
            field_name: text(args.get(3)),
            old_value: text(args.get(4)),
            new_value: text(args.get(5)),
            user_id: integer(args.get(6)),
        }
    }

    /// 이름 있는 인자 형태로 변환 (`log` emit 용)
    pub fn to_args(&self) -> HookArgs {
        HookArgs::new().with(serde_json::to_value(self).unwrap_or(Value::Null))
    }
}

// ============================================================================
// AuditEntry - 저장된 트랜잭션
// ============================================================================

/// 저장된 감사 항목
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: i64,
    /// UTC (`YYYY-MM-DD HH:MM:SS`)
    pub timestamp: String,
    /// 서버 로컬 시간
    pub local_timestamp: String,
    pub user_id: i64,
    pub ip: String,
    pub object_type: Option<String>,
    pub object_id: Option<i64>,
    pub action: String,
    pub field_name: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

// ============================================================================
// HistoryQuery - 조회 필터
// ============================================================================

/// 정렬 방향 (id 기준)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    fn parse(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some(s) if s.eq_ignore_ascii_case("desc") => SortOrder::Desc,
            _ => SortOrder::Asc,
        }
    }
}

/// history 조회 조건
///
/// 순서 인자 형태: `(userId, objectType, objectId, action, fieldName, order, max)`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryQuery {
    pub user_id: Option<i64>,
    pub object_type: Option<String>,
    pub object_id: Option<i64>,
    pub action: Option<String>,
    pub field_name: Option<String>,
    pub order: SortOrder,
    pub max: Option<u32>,
}

impl HistoryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn object(mut self, object_type: impl Into<String>, object_id: Option<i64>) -> Self {
        self.object_type = Some(object_type.into());
        self.object_id = object_id;
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.order = SortOrder::Desc;
        self
    }

    pub fn limit(mut self, max: u32) -> Self {
        self.max = Some(max);
        self
    }

    /// 필터가 하나라도 있는지 (전체 조회는 허용하지 않음)
    pub fn has_filters(&self) -> bool {
        self.user_id.is_some()
            || self.object_type.is_some()
            || self.object_id.is_some()
            || self.action.is_some()
            || self.field_name.is_some()
    }

    /// 이벤트 인자에서 변환
    pub fn from_args(args: &HookArgs) -> Self {
        if let Some(named) = args.object_at(0) {
            return Self::from_named(named);
        }

        Self {
            user_id: integer(args.get(0)),
            object_type: text(args.get(1)),
            object_id: integer(args.get(2)),
            action: text(args.get(3)),
            field_name: text(args.get(4)),
            order: SortOrder::parse(args.get(5)),
            max: integer(args.get(6)).and_then(|m| u32::try_from(m).ok()),
        }
    }

    fn from_named(named: &JsonRow) -> Self {
        Self {
            user_id: integer(named.get("userId")),
            object_type: text(named.get("objectType")),
            object_id: integer(named.get("objectId")),
            action: text(named.get("action")),
            field_name: text(named.get("fieldName")),
            order: SortOrder::parse(named.get("order")),
            max: integer(named.get("max")).and_then(|m| u32::try_from(m).ok()),
        }
    }
}

// ============================================================================
// 인자 변환
// ============================================================================

/// 문자열 컬럼 값 (숫자/불리언은 문자열로)
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// 정수 컬럼 값 (숫자 문자열 허용)
fn integer(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
