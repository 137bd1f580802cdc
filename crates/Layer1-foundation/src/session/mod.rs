//! Session - 세션별 신원 및 권한 캐시
//!
//! 세션 상태 전이:
//!
//! ```text
//! Anonymous ──identify──► Identified ──reload──► Ready
//!     ▲                                            │
//!     └──────────── clear_identity ◄── Stale ◄─────┘ (invalidate)
//! ```
//!
//! 권한 캐시는 세션이 단독 소유하며 세션 간 공유되지 않는다.

use crate::acl::CapabilityCache;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// Identity
// ============================================================================

/// 세션에 연결된 사용자
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: i64,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
}

impl SessionUser {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            email: String::new(),
            name: String::new(),
        }
    }
}

// ============================================================================
// ACL state
// ============================================================================

/// 세션 권한 캐시 상태
#[derive(Debug, Clone, Default)]
pub enum AclState {
    /// 아직 빌드되지 않음
    #[default]
    Absent,
    /// 빌드 완료
    Ready(CapabilityCache),
    /// 무효화됨 (다음 질의 시 재빌드 대상)
    Stale,
}

/// 세션 단계 (상태 머신 관찰용)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Anonymous,
    Identified,
    Ready,
    Stale,
}

#[derive(Debug, Default)]
struct SessionInner {
    user: Option<SessionUser>,
    acl: AclState,
}

// ============================================================================
// Session
// ============================================================================

/// 하나의 인증 세션
#[derive(Debug)]
pub struct Session {
    id: String,
    created_at: chrono::DateTime<chrono::Utc>,
    inner: Mutex<SessionInner>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: chrono::Utc::now(),
            inner: Mutex::new(SessionInner::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.created_at
    }

    // ========================================================================
    // Identity
    // ========================================================================

    pub fn user(&self) -> Option<SessionUser> {
        self.inner.lock().user.clone()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.inner.lock().user.as_ref().map(|u| u.id)
    }

    pub fn is_identified(&self) -> bool {
        self.inner.lock().user.is_some()
    }

    /// 신원 설정. 기존 권한 캐시는 버린다.
    pub fn identify(&self, user: SessionUser) {
        let mut inner = self.inner.lock();
        debug!(session_id = %self.id, user_id = user.id, "Session identified");
        inner.user = Some(user);
        inner.acl = AclState::Absent;
    }

    /// 신원 해제 (로그아웃)
    pub fn clear_identity(&self) {
        let mut inner = self.inner.lock();
        inner.user = None;
        inner.acl = AclState::Absent;
    }

    // ========================================================================
    // Capability cache
    // ========================================================================

    pub fn phase(&self) -> SessionPhase {
        let inner = self.inner.lock();
        match (&inner.user, &inner.acl) {
            (None, _) => SessionPhase::Anonymous,
            (Some(_), AclState::Absent) => SessionPhase::Identified,
            (Some(_), AclState::Ready(_)) => SessionPhase::Ready,
            (Some(_), AclState::Stale) => SessionPhase::Stale,
        }
    }

    /// 무효화 상태 여부 (캐시를 복사하지 않는다)
    pub fn is_stale(&self) -> bool {
        matches!(self.inner.lock().acl, AclState::Stale)
    }

    /// 캐시 교체 (전체 재빌드 결과)
    pub fn set_capabilities(&self, cache: CapabilityCache) {
        self.inner.lock().acl = AclState::Ready(cache);
    }

    /// 빈 캐시로 초기화 (세션 시작)
    pub fn reset_capabilities(&self) {
        self.inner.lock().acl = AclState::Ready(CapabilityCache::new());
    }

    /// 캐시 제거 (신원 없음)
    pub fn clear_capabilities(&self) {
        self.inner.lock().acl = AclState::Absent;
    }

    /// 무효화 표시
    pub fn mark_stale(&self) {
        let mut inner = self.inner.lock();
        if !matches!(inner.acl, AclState::Absent) {
            inner.acl = AclState::Stale;
        }
    }

    /// 캐시가 준비된 경우에만 질의 실행
    pub fn with_capabilities<R>(&self, f: impl FnOnce(&CapabilityCache) -> R) -> Option<R> {
        match &self.inner.lock().acl {
            AclState::Ready(cache) => Some(f(cache)),
            AclState::Absent | AclState::Stale => None,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SessionStore
// ============================================================================

/// 살아있는 세션 목록
///
/// 권한 변경 시 영향받는 세션을 찾기 위해 사용한다.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 새 세션 생성 및 등록
    pub fn create(&self) -> Arc<Session> {
        let session = Arc::new(Session::new());
        self.insert(session.clone());
        session
    }

    pub fn insert(&self, session: Arc<Session>) {
        self.sessions
            .write()
            .insert(session.id().to_string(), session);
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    /// 세션 종료
    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        let removed = self.sessions.write().remove(id);
        if let Some(ref session) = removed {
            session.clear_identity();
        }
        removed
    }

    /// 특정 사용자의 세션들
    pub fn for_user(&self, user_id: i64) -> Vec<Arc<Session>> {
        self.sessions
            .read()
            .values()
            .filter(|s| s.user_id() == Some(user_id))
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<Arc<Session>> {
        self.sessions.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::Grant;

    #[test]
    fn test_session_phases() {
        let session = Session::new();
        assert_eq!(session.phase(), SessionPhase::Anonymous);

        session.identify(SessionUser::new(7));
        assert_eq!(session.phase(), SessionPhase::Identified);
        assert_eq!(session.user_id(), Some(7));

        session.set_capabilities(CapabilityCache::from_grants(&[Grant::everything()]));
        assert_eq!(session.phase(), SessionPhase::Ready);

        session.mark_stale();
        assert_eq!(session.phase(), SessionPhase::Stale);
        assert!(session.with_capabilities(|c| c.is_unrestricted()).is_none());

        session.clear_identity();
        assert_eq!(session.phase(), SessionPhase::Anonymous);
    }

    #[test]
    fn test_identify_drops_previous_cache() {
        let session = Session::new();
        session.identify(SessionUser::new(1));
        session.set_capabilities(CapabilityCache::from_grants(&[Grant::everything()]));

        session.identify(SessionUser::new(2));
        assert_eq!(session.phase(), SessionPhase::Identified);
        assert!(session.with_capabilities(|_| ()).is_none());
    }

    #[test]
    fn test_is_stale_tracks_acl_state() {
        let session = Session::new();
        assert!(!session.is_stale());

        // 캐시 없는 세션은 무효화 표시가 남지 않음
        session.mark_stale();
        assert!(!session.is_stale());

        session.identify(SessionUser::new(7));
        let grants: Vec<Grant> = (0..1_000)
            .map(|id| Grant::action("edit").of_type("document").with_id(id))
            .collect();
        session.set_capabilities(CapabilityCache::from_grants(&grants));
        assert!(!session.is_stale());

        session.mark_stale();
        assert!(session.is_stale());
        assert_eq!(session.phase(), SessionPhase::Stale);

        session.reset_capabilities();
        assert!(!session.is_stale());
    }

    #[test]
    fn test_store_for_user() {
        let store = SessionStore::new();
        let a = store.create();
        let b = store.create();
        let _anon = store.create();
        a.identify(SessionUser::new(7));
        b.identify(SessionUser::new(7));

        assert_eq!(store.len(), 3);
        assert_eq!(store.for_user(7).len(), 2);
        assert!(store.for_user(8).is_empty());

        let removed = store.remove(a.id()).unwrap();
        assert!(!removed.is_identified());
        assert_eq!(store.for_user(7).len(), 1);
    }
}
