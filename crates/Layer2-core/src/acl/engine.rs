//! ACL Engine - 세션 권한 캐시 빌드 및 질의
//!
//! 세션 상태 전이:
//! `Anonymous -> Identified -> Ready (reload) -> Stale (logout / invalidate) -> Anonymous`
//!
//! 캐시가 없거나 비어 있으면 모든 질의를 거부한다 (fail-closed).

use super::store::GrantStore;
use pyrite_foundation::{
    events, handler_fn, AclConfig, CapabilityCache, Dispatcher, Error, Grant,
    HookArgs, HookContext, HookInvocation, HookRegistry, HookReply, Result, Session, SessionStore,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// `install` 리스너 우선순위 (사용자 테이블보다 뒤)
pub const INSTALL_PRIORITY: i32 = 20;

/// ACL 해석 엔진
pub struct AclEngine {
    store: Arc<dyn GrantStore>,
    sessions: Arc<SessionStore>,
    config: AclConfig,
}

impl AclEngine {
    pub fn new(store: Arc<dyn GrantStore>, sessions: Arc<SessionStore>, config: AclConfig) -> Self {
        Self {
            store,
            sessions,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn GrantStore> {
        &self.store
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// 스키마 생성 + 기본 관리자 시드 (멱등)
    pub async fn install(&self) -> Result<()> {
        self.store.ensure_schema().await?;
        self.store.seed_default_admin().await?;
        info!("ACL installed");
        Ok(())
    }

    /// 사용자 id 에 대한 캐시 빌드 (직접 grant + 역할 grant)
    pub async fn build_cache(&self, user_id: i64) -> Result<CapabilityCache> {
        let grants = self.store.load_effective_grants(user_id).await?;
        Ok(CapabilityCache::from_grants(grants.iter()))
    }

    /// 세션 캐시 재빌드
    ///
    /// 신원이 없는 세션은 캐시를 비운다.
    pub async fn reload(&self, session: &Session) -> Result<()> {
        let Some(user_id) = session.user_id() else {
            session.clear_capabilities();
            debug!(session_id = %session.id(), "ACL reload without identity, cache cleared");
            return Ok(());
        };

        match self.build_cache(user_id).await {
            Ok(cache) => {
                debug!(
                    session_id = %session.id(),
                    user_id,
                    unrestricted = cache.is_unrestricted(),
                    "ACL reloaded"
                );
                session.set_capabilities(cache);
                Ok(())
            }
            Err(e) => {
                // 이전 캐시가 남아있지 않도록 비운다
                session.clear_capabilities();
                Err(e)
            }
        }
    }

    /// 세션 캐시 무효화. 다음 질의에서 신원이 있으면 다시 빌드한다.
    pub fn invalidate(&self, session: &Session) {
        session.mark_stale();
        debug!(session_id = %session.id(), "ACL invalidated");
    }

    // ========================================================================
    // Query
    // ========================================================================

    /// 세션 권한 질의
    pub async fn can(
        &self,
        session: Option<&Session>,
        action: &str,
        object_type: Option<&str>,
        object_id: Option<i64>,
    ) -> bool {
        let Some(session) = session else {
            return false;
        };

        if session.is_stale() && session.is_identified() {
            if let Err(e) = self.reload(session).await {
                warn!(session_id = %session.id(), error = %e, "ACL rebuild failed, denying");
                return false;
            }
        }

        session
            .with_capabilities(|cache| cache.allows(action, object_type, object_id))
            .unwrap_or(false)
    }

    /// 세션 없이 특정 사용자 권한 질의 (관리 도구용)
    pub async fn user_can(
        &self,
        user_id: i64,
        action: &str,
        object_type: Option<&str>,
        object_id: Option<i64>,
    ) -> Result<bool> {
        let cache = self.build_cache(user_id).await?;
        Ok(cache.allows(action, object_type, object_id))
    }

    // ========================================================================
    // Administration
    // ========================================================================

    /// 역할에 grant 추가
    pub async fn grant_role(
        &self,
        hooks: &Dispatcher,
        ctx: &HookContext,
        role: &str,
        grant: &Grant,
    ) -> Result<bool> {
        let changed = self.store.add_role_grant(role, grant).await?;
        if changed {
            self.after_role_change(hooks, ctx, role, "acl_grant", grant.to_string())
                .await;
        }
        Ok(changed)
    }

    /// 역할에서 grant 제거
    pub async fn revoke_role(
        &self,
        hooks: &Dispatcher,
        ctx: &HookContext,
        role: &str,
        grant: &Grant,
    ) -> Result<bool> {
        let changed = self.store.remove_role_grant(role, grant).await?;
        if changed {
            self.after_role_change(hooks, ctx, role, "acl_revoke", grant.to_string())
                .await;
        }
        Ok(changed)
    }

    /// 사용자에게 직접 grant 추가
    pub async fn grant_user(
        &self,
        hooks: &Dispatcher,
        ctx: &HookContext,
        user_id: i64,
        grant: &Grant,
    ) -> Result<bool> {
        let changed = self.store.add_user_grant(user_id, grant).await?;
        if changed {
            self.after_user_change(hooks, ctx, user_id, "acl_grant", grant.to_string())
                .await;
        }
        Ok(changed)
    }

    /// 사용자 직접 grant 제거
    pub async fn revoke_user(
        &self,
        hooks: &Dispatcher,
        ctx: &HookContext,
        user_id: i64,
        grant: &Grant,
    ) -> Result<bool> {
        let changed = self.store.remove_user_grant(user_id, grant).await?;
        if changed {
            self.after_user_change(hooks, ctx, user_id, "acl_revoke", grant.to_string())
                .await;
        }
        Ok(changed)
    }

    /// 사용자를 역할에 추가
    pub async fn add_user_role(
        &self,
        hooks: &Dispatcher,
        ctx: &HookContext,
        user_id: i64,
        role: &str,
    ) -> Result<bool> {
        let changed = self.store.add_user_role(user_id, role).await?;
        if changed {
            self.after_user_change(hooks, ctx, user_id, "role_add", role.to_string())
                .await;
        }
        Ok(changed)
    }

    /// 사용자를 역할에서 제거
    pub async fn remove_user_role(
        &self,
        hooks: &Dispatcher,
        ctx: &HookContext,
        user_id: i64,
        role: &str,
    ) -> Result<bool> {
        let changed = self.store.remove_user_role(user_id, role).await?;
        if changed {
            self.after_user_change(hooks, ctx, user_id, "role_remove", role.to_string())
                .await;
        }
        Ok(changed)
    }

    pub async fn role_grants(&self, role: &str) -> Result<Vec<Grant>> {
        self.store.role_grants(role).await
    }

    pub async fn user_roles(&self, user_id: i64) -> Result<Vec<String>> {
        self.store.user_roles(user_id).await
    }

    async fn after_role_change(
        &self,
        hooks: &Dispatcher,
        ctx: &HookContext,
        role: &str,
        action: &str,
        value: String,
    ) {
        info!(role = %role, action = %action, value = %value, "Role grants changed");

        let entry = json!({
            "objectType": "role",
            "action": action,
            "fieldName": role,
            "newValue": value,
        });
        hooks.emit(ctx, events::LOG, HookArgs::new().with(entry)).await;

        if self.config.invalidate_on_change {
            for session in self.sessions.all() {
                self.invalidate(&session);
            }
        }
    }

    async fn after_user_change(
        &self,
        hooks: &Dispatcher,
        ctx: &HookContext,
        user_id: i64,
        action: &str,
        value: String,
    ) {
        info!(user_id, action = %action, value = %value, "User grants changed");

        let entry = json!({
            "objectType": "user",
            "objectId": user_id,
            "action": action,
            "newValue": value,
        });
        hooks.emit(ctx, events::LOG, HookArgs::new().with(entry)).await;

        if self.config.invalidate_on_change {
            for session in self.sessions.for_user(user_id) {
                self.invalidate(&session);
            }
        }
    }

    // ========================================================================
    // Hook 등록
    // ========================================================================

    /// 리스너 등록: install, session_start, newuser, logout, can
    pub fn register(self: &Arc<Self>, registry: &mut HookRegistry) {
        let engine = self.clone();
        registry.register(
            events::INSTALL,
            "acl.install",
            INSTALL_PRIORITY,
            handler_fn(move |_call: HookInvocation| {
                let engine = engine.clone();
                async move {
                    engine
                        .install()
                        .await
                        .map_err(|e| Error::Config(format!("ACL install failed: {}", e)))?;
                    Ok(HookReply::NoResult)
                }
            }),
        );

        registry.register_default(
            events::SESSION_START,
            "acl.session_start",
            handler_fn(|call: HookInvocation| async move {
                if let Some(session) = call.ctx.session() {
                    session.reset_capabilities();
                }
                Ok(HookReply::NoResult)
            }),
        );

        let engine = self.clone();
        registry.register_default(
            events::NEWUSER,
            "acl.reload",
            handler_fn(move |call: HookInvocation| {
                let engine = engine.clone();
                async move {
                    if let Some(session) = call.ctx.session() {
                        engine.reload(session).await?;
                    }
                    Ok(HookReply::NoResult)
                }
            }),
        );

        let engine = self.clone();
        registry.register_default(
            events::LOGOUT,
            "acl.invalidate",
            handler_fn(move |call: HookInvocation| {
                let engine = engine.clone();
                async move {
                    if let Some(session) = call.ctx.session() {
                        engine.invalidate(session);
                    }
                    Ok(HookReply::NoResult)
                }
            }),
        );

        let engine = self.clone();
        registry.register_default(
            events::CAN,
            "acl.can",
            handler_fn(move |call: HookInvocation| {
                let engine = engine.clone();
                async move {
                    let Some(action) = call.args.str_at(0) else {
                        return Err(Error::InvalidInput("can: missing action".to_string()));
                    };
                    let allowed = engine
                        .can(
                            call.ctx.session().map(Arc::as_ref),
                            action,
                            call.args.str_at(1),
                            call.args.i64_at(2),
                        )
                        .await;
                    Ok(HookReply::bool(allowed))
                }
            }),
        );
    }
}

impl std::fmt::Debug for AclEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AclEngine")
            .field("config", &self.config)
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::store::SqliteGrantStore;
    use pyrite_foundation::{Database, DispatchConfig, SessionPhase, SessionUser};

    async fn engine_with(config: AclConfig) -> (Arc<AclEngine>, Arc<SessionStore>) {
        let store = Arc::new(SqliteGrantStore::new(Database::in_memory().unwrap()));
        let sessions = Arc::new(SessionStore::new());
        let engine = Arc::new(AclEngine::new(store, sessions.clone(), config));
        engine.install().await.unwrap();
        (engine, sessions)
    }

    async fn engine() -> Arc<AclEngine> {
        engine_with(AclConfig::default()).await.0
    }

    fn dispatcher(engine: &Arc<AclEngine>) -> Dispatcher {
        let mut registry = HookRegistry::new();
        engine.register(&mut registry);
        registry.freeze(DispatchConfig::default()).unwrap()
    }

    async fn identified(engine: &AclEngine, user_id: i64) -> Session {
        let session = Session::new();
        session.identify(SessionUser::new(user_id));
        engine.reload(&session).await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_admin_role_allows_everything() {
        let engine = engine().await;
        let session = identified(&engine, 1).await;

        assert!(engine.can(Some(&session), "delete", Some("article"), Some(5)).await);
        assert!(engine.can(Some(&session), "anything", None, None).await);
    }

    #[tokio::test]
    async fn test_type_wide_grant() {
        let engine = engine().await;
        engine
            .store()
            .add_user_grant(7, &Grant::action("edit").of_type("document"))
            .await
            .unwrap();
        let session = identified(&engine, 7).await;

        assert!(engine.can(Some(&session), "edit", Some("document"), Some(42)).await);
        assert!(engine.can(Some(&session), "edit", Some("document"), None).await);
        assert!(!engine.can(Some(&session), "edit", None, None).await);
        assert!(!engine.can(Some(&session), "delete", Some("document"), Some(42)).await);
    }

    #[tokio::test]
    async fn test_specific_id_grant() {
        let engine = engine().await;
        engine
            .store()
            .add_user_grant(7, &Grant::action("edit").of_type("document").with_id(42))
            .await
            .unwrap();
        let session = identified(&engine, 7).await;

        assert!(engine.can(Some(&session), "edit", Some("document"), Some(42)).await);
        assert!(!engine.can(Some(&session), "edit", Some("document"), Some(43)).await);
        assert!(!engine.can(Some(&session), "edit", Some("document"), None).await);
    }

    #[tokio::test]
    async fn test_anonymous_denies() {
        let engine = engine().await;
        let session = Session::new();

        assert!(!engine.can(None, "login", None, None).await);
        assert!(!engine.can(Some(&session), "login", None, None).await);

        engine.reload(&session).await.unwrap();
        assert!(!engine.can(Some(&session), "login", None, None).await);
        assert_eq!(session.phase(), SessionPhase::Anonymous);
    }

    #[tokio::test]
    async fn test_stale_cache_rebuilds_lazily() {
        let engine = engine().await;
        let session = identified(&engine, 7).await;
        assert!(!engine.can(Some(&session), "publish", None, None).await);

        engine.store().add_user_grant(7, &Grant::action("publish")).await.unwrap();
        // 무효화 전에는 이전 캐시 유지
        assert!(!engine.can(Some(&session), "publish", None, None).await);

        engine.invalidate(&session);
        assert_eq!(session.phase(), SessionPhase::Stale);
        assert!(engine.can(Some(&session), "publish", None, None).await);
        assert_eq!(session.phase(), SessionPhase::Ready);
    }

    #[tokio::test]
    async fn test_can_cost_independent_of_grant_count() {
        let engine = engine().await;
        let session = Session::new();
        session.identify(SessionUser::new(7));

        let grants: Vec<Grant> = (0..50_000)
            .map(|i| Grant::action("edit").of_type(format!("type{}", i)).with_id(i))
            .collect();
        session.set_capabilities(CapabilityCache::from_grants(&grants));

        let started = std::time::Instant::now();
        for i in 0..1_000 {
            let object_type = format!("type{}", i);
            assert!(engine.can(Some(&session), "edit", Some(object_type.as_str()), Some(i)).await);
        }
        assert!(!engine.can(Some(&session), "edit", Some("type1"), Some(2)).await);
        assert!(
            started.elapsed() < std::time::Duration::from_secs(2),
            "1000 queries took {:?}",
            started.elapsed()
        );
        assert_eq!(session.phase(), SessionPhase::Ready);
    }

    #[tokio::test]
    async fn test_stale_without_identity_denies() {
        let engine = engine().await;
        let session = identified(&engine, 1).await;
        engine.invalidate(&session);
        session.clear_identity();

        assert!(!engine.can(Some(&session), "anything", None, None).await);
    }

    #[tokio::test]
    async fn test_invalidate_on_change() {
        let (engine, sessions) = engine_with(AclConfig {
            invalidate_on_change: true,
        })
        .await;
        let hooks = dispatcher(&engine);

        let session = sessions.create();
        session.identify(SessionUser::new(9));
        engine.reload(&session).await.unwrap();
        assert!(!engine.can(Some(&session), "publish", Some("article"), Some(1)).await);

        engine
            .grant_user(&hooks, &HookContext::detached(), 9, &Grant::action("publish"))
            .await
            .unwrap();
        assert_eq!(session.phase(), SessionPhase::Stale);
        assert!(engine.can(Some(&session), "publish", Some("article"), Some(1)).await);

        engine
            .add_user_role(&hooks, &HookContext::detached(), 9, "editor")
            .await
            .unwrap();
        engine
            .revoke_role(&hooks, &HookContext::detached(), "editor", &Grant::action("none"))
            .await
            .unwrap();
        assert_eq!(engine.user_roles(9).await.unwrap(), vec!["editor".to_string()]);
    }

    #[tokio::test]
    async fn test_hooks_drive_session_cache() {
        let engine = engine().await;
        let hooks = dispatcher(&engine);

        let session = Arc::new(Session::new());
        let ctx = HookContext::for_session(session.clone());

        hooks.emit(&ctx, events::SESSION_START, HookArgs::new()).await;
        assert!(!hooks.can(&ctx, "login", None, None).await);

        session.identify(SessionUser::new(1));
        hooks.emit(&ctx, events::NEWUSER, HookArgs::new()).await;
        assert!(hooks.can(&ctx, "login", None, None).await);

        hooks.emit(&ctx, events::LOGOUT, HookArgs::new()).await;
        session.clear_identity();
        assert!(!hooks.can(&ctx, "login", None, None).await);
    }

    #[tokio::test]
    async fn test_user_can() {
        let engine = engine().await;
        engine.store().add_user_role(4, "admin").await.unwrap();

        assert!(engine.user_can(4, "delete", Some("user"), Some(1)).await.unwrap());
        assert!(!engine.user_can(5, "delete", Some("user"), Some(1)).await.unwrap());
    }
}
