//! Hook 타입 정의
//!
//! 인자, 응답, 호출 컨텍스트, handler trait.

use super::dispatcher::Dispatcher;
use crate::session::Session;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;

// ============================================================================
// HookArgs - 호출 인자
// ============================================================================

/// 순서가 있는 이벤트 인자 목록
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookArgs(Vec<Value>);

impl HookArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// 인자 추가
    pub fn with(mut self, value: impl Into<Value>) -> Self {
        self.0.push(value.into());
        self
    }

    /// Option 인자 추가 (None → null)
    pub fn with_opt<T: Into<Value>>(mut self, value: Option<T>) -> Self {
        self.0.push(value.map(Into::into).unwrap_or(Value::Null));
        self
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.0.get(idx)
    }

    /// 문자열 인자 (null/누락 → None)
    pub fn str_at(&self, idx: usize) -> Option<&str> {
        self.0.get(idx).and_then(Value::as_str)
    }

    /// 정수 인자. 숫자 문자열도 허용한다.
    pub fn i64_at(&self, idx: usize) -> Option<i64> {
        match self.0.get(idx)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// 객체 인자
    pub fn object_at(&self, idx: usize) -> Option<&Map<String, Value>> {
        self.0.get(idx).and_then(Value::as_object)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }
}

impl From<Vec<Value>> for HookArgs {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl FromIterator<Value> for HookArgs {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ============================================================================
// HookReply - handler 응답
// ============================================================================

/// handler 응답
///
/// `NoResult` 는 "의견 없음" 전용 sentinel 이며 `false` 와 구분된다.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum HookReply {
    /// 의견 없음 (다음 listener 로)
    #[default]
    NoResult,
    /// 값
    Value(Value),
}

impl HookReply {
    pub fn value(value: impl Into<Value>) -> Self {
        HookReply::Value(value.into())
    }

    pub fn bool(value: bool) -> Self {
        HookReply::Value(Value::Bool(value))
    }

    /// Option → Some 이면 값, None 이면 NoResult
    pub fn from_option<T: Into<Value>>(value: Option<T>) -> Self {
        match value {
            Some(v) => HookReply::Value(v.into()),
            None => HookReply::NoResult,
        }
    }

    pub fn is_no_result(&self) -> bool {
        matches!(self, HookReply::NoResult)
    }

    /// chain_all 에서 명시적 거부인지 (`false`, `null`, `0`, `""`)
    pub fn is_falsy(&self) -> bool {
        match self {
            HookReply::NoResult => false,
            HookReply::Value(value) => !is_truthy(value),
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            HookReply::NoResult => None,
            HookReply::Value(value) => Some(value),
        }
    }
}

/// JSON 값의 진리값 (빈 배열/객체는 참)
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ============================================================================
// HookContext - 호출 컨텍스트
// ============================================================================

/// 요청 메타데이터 (감사 로그 등에 전달)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestInfo {
    /// 클라이언트 주소
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_addr: Option<String>,
    /// 애플리케이션 base URL
    #[serde(default)]
    pub base: String,
    /// 요청 경로
    #[serde(default)]
    pub path: String,
}

impl RequestInfo {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }
}

/// 한 번의 dispatch 에 전달되는 컨텍스트
///
/// 세션과 요청 정보를 공유 참조로 들고 다니므로 clone 비용이 낮다.
#[derive(Debug, Clone, Default)]
pub struct HookContext {
    session: Option<Arc<Session>>,
    request: Option<Arc<RequestInfo>>,
    depth: u32,
}

impl HookContext {
    /// 세션/요청 없는 컨텍스트 (프로비저닝, CLI)
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn for_session(session: Arc<Session>) -> Self {
        Self {
            session: Some(session),
            ..Default::default()
        }
    }

    pub fn with_request(mut self, request: RequestInfo) -> Self {
        self.request = Some(Arc::new(request));
        self
    }

    pub fn session(&self) -> Option<&Arc<Session>> {
        self.session.as_ref()
    }

    pub fn request(&self) -> Option<&RequestInfo> {
        self.request.as_deref()
    }

    /// 현재 세션 사용자 id
    pub fn user_id(&self) -> Option<i64> {
        self.session.as_ref().and_then(|s| s.user_id())
    }

    /// 중첩 dispatch 깊이
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub(crate) fn nested(&self) -> Self {
        Self {
            session: self.session.clone(),
            request: self.request.clone(),
            depth: self.depth + 1,
        }
    }
}

// ============================================================================
// HookInvocation / HookHandler
// ============================================================================

/// handler 에 전달되는 호출 정보
///
/// `dispatcher` 를 통해 handler 안에서 다른 이벤트를 dispatch 할 수 있다.
#[derive(Clone)]
pub struct HookInvocation {
    pub event: String,
    pub dispatcher: Dispatcher,
    pub ctx: HookContext,
    pub args: HookArgs,
}

/// 이벤트 handler
#[async_trait]
pub trait HookHandler: Send + Sync {
    async fn handle(&self, call: HookInvocation) -> Result<HookReply>;
}

/// 클로저 handler 어댑터
struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> HookHandler for FnHandler<F>
where
    F: Fn(HookInvocation) -> Fut + Send + Sync,
    Fut: Future<Output = Result<HookReply>> + Send + 'static,
{
    async fn handle(&self, call: HookInvocation) -> Result<HookReply> {
        (self.0)(call).await
    }
}

/// 클로저를 handler 로 변환
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn HookHandler>
where
    F: Fn(HookInvocation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HookReply>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

// ============================================================================
// ListenerId / ListenerInfo
// ============================================================================

/// 리스너 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// 등록된 리스너 정보 (조회용)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerInfo {
    pub id: ListenerId,
    pub name: String,
    pub priority: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_args_accessors() {
        let args = HookArgs::new()
            .with("edit")
            .with("42")
            .with_opt::<i64>(None)
            .with(json!({ "objectType": "user" }));

        assert_eq!(args.len(), 4);
        assert_eq!(args.str_at(0), Some("edit"));
        assert_eq!(args.i64_at(1), Some(42));
        assert_eq!(args.str_at(2), None);
        assert_eq!(args.i64_at(2), None);
        assert_eq!(args.object_at(3).unwrap()["objectType"], "user");
        assert!(args.get(9).is_none());
    }

    #[test]
    fn test_reply_truthiness() {
        assert!(!HookReply::NoResult.is_falsy());
        assert!(HookReply::bool(false).is_falsy());
        assert!(HookReply::value(Value::Null).is_falsy());
        assert!(HookReply::value(0).is_falsy());
        assert!(HookReply::value("").is_falsy());
        assert!(!HookReply::bool(true).is_falsy());
        assert!(!HookReply::value(json!([])).is_falsy());
        assert!(!HookReply::value("yes").is_falsy());
    }

    #[test]
    fn test_reply_from_option() {
        assert!(HookReply::from_option::<i64>(None).is_no_result());
        assert_eq!(HookReply::from_option(Some(3)).into_value(), Some(json!(3)));
    }

    #[test]
    fn test_context_nesting() {
        let session = Arc::new(Session::new());
        let ctx = HookContext::for_session(session.clone())
            .with_request(RequestInfo::new("/login").with_remote_addr("10.0.0.1"));

        let nested = ctx.nested().nested();
        assert_eq!(nested.depth(), 2);
        assert_eq!(nested.request().unwrap().remote_addr.as_deref(), Some("10.0.0.1"));
        assert_eq!(nested.session().unwrap().id(), session.id());
        assert_eq!(HookContext::detached().user_id(), None);
    }

    #[test]
    fn test_listener_id_display() {
        assert_eq!(ListenerId::new(3).to_string(), "listener-3");
    }
}
