//! Application - 모듈 조립
//!
//! 데이터베이스를 열고 ACL / 감사 로그 / 사용자 / 세션 / 라우터 모듈을
//! 레지스트리에 등록한 뒤 freeze 한다. 이후 listener 테이블은 불변이다.

use crate::acl::{AclEngine, SqliteGrantStore};
use crate::audit::AuditTrail;
use crate::router;
use crate::user::{self, AdminCredentials, UserStore};
use pyrite_foundation::{
    events, Database, Dispatcher, Error, HookArgs, HookContext, HookRegistry, PyriteConfig,
    RequestInfo, Result, Session, SessionStore,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

type ExtraListeners = Box<dyn FnOnce(&mut HookRegistry) -> Result<()> + Send>;

// ============================================================================
// Builder
// ============================================================================

/// Application 빌더
pub struct ApplicationBuilder {
    config: PyriteConfig,
    database: Option<Database>,
    extras: Vec<ExtraListeners>,
}

impl ApplicationBuilder {
    fn new(config: PyriteConfig) -> Self {
        Self {
            config,
            database: None,
            extras: Vec::new(),
        }
    }

    /// 이미 열린 데이터베이스 사용 (테스트 등)
    pub fn database(mut self, db: Database) -> Self {
        self.database = Some(db);
        self
    }

    /// 추가 listener 등록 (애플리케이션 라우트 등)
    pub fn listeners<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut HookRegistry) -> Result<()> + Send + 'static,
    {
        self.extras.push(Box::new(f));
        self
    }

    pub fn build(self) -> Result<Application> {
        let db = match self.database {
            Some(db) => db,
            None => Database::open(self.config.database.resolved_path())?,
        };

        let sessions = Arc::new(SessionStore::new());
        let users = Arc::new(UserStore::new(db.clone()));
        let audit = Arc::new(AuditTrail::new(db.clone(), self.config.audit.clone()));
        let acl = Arc::new(AclEngine::new(
            Arc::new(SqliteGrantStore::new(db.clone())),
            sessions.clone(),
            self.config.acl.clone(),
        ));

        let mut registry = HookRegistry::new();
        users.register(&mut registry);
        audit.register(&mut registry);
        acl.register(&mut registry);
        user::session::register(&mut registry);
        router::register(&mut registry);
        for extra in self.extras {
            extra(&mut registry)?;
        }

        let hooks = registry.freeze(self.config.dispatch.clone())?;
        info!(events = hooks.event_names().len(), "Application ready");

        Ok(Application {
            config: self.config,
            db,
            hooks,
            acl,
            audit,
            users,
            sessions,
        })
    }
}

// ============================================================================
// Application
// ============================================================================

/// 조립된 애플리케이션
pub struct Application {
    config: PyriteConfig,
    db: Database,
    hooks: Dispatcher,
    acl: Arc<AclEngine>,
    audit: Arc<AuditTrail>,
    users: Arc<UserStore>,
    sessions: Arc<SessionStore>,
}

impl Application {
    pub fn builder(config: PyriteConfig) -> ApplicationBuilder {
        ApplicationBuilder::new(config)
    }

    pub fn config(&self) -> &PyriteConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn hooks(&self) -> &Dispatcher {
        &self.hooks
    }

    pub fn acl(&self) -> &Arc<AclEngine> {
        &self.acl
    }

    pub fn audit(&self) -> &Arc<AuditTrail> {
        &self.audit
    }

    pub fn users(&self) -> &Arc<UserStore> {
        &self.users
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    // ========================================================================
    // Provisioning
    // ========================================================================

    /// `install` 이벤트 실행
    ///
    /// 모든 모듈이 스키마를 만들고 시드 데이터를 넣는다. 하나라도 실패하면 에러.
    pub async fn install(&self, admin: Option<AdminCredentials>) -> Result<()> {
        let args = match admin {
            Some(admin) => HookArgs::new().with(serde_json::to_value(admin)?),
            None => HookArgs::new().with(Value::Null),
        };

        if !self
            .hooks
            .chain_all(&HookContext::detached(), events::INSTALL, args)
            .await
        {
            return Err(Error::Config(
                "install failed, see log for the failing module".to_string(),
            ));
        }
        info!("Install complete");
        Ok(())
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// 새 세션 시작 (`session_start`)
    pub async fn start_session(&self) -> Arc<Session> {
        let session = self.sessions.create();
        self.hooks
            .emit(&self.context(&session), events::SESSION_START, HookArgs::new())
            .await;
        debug!(session_id = %session.id(), "Session started");
        session
    }

    /// 세션 종료
    pub async fn end_session(&self, session: &Arc<Session>) {
        if session.is_identified() {
            self.logout(session).await;
        }
        self.sessions.remove(session.id());
    }

    /// 세션 컨텍스트
    pub fn context(&self, session: &Arc<Session>) -> HookContext {
        HookContext::for_session(session.clone())
    }

    /// 로그인 (`login` 게이트)
    pub async fn login(
        &self,
        session: &Arc<Session>,
        email: &str,
        password: &str,
        onetime: Option<&str>,
    ) -> bool {
        let args = HookArgs::new()
            .with(email)
            .with(password)
            .with_opt(onetime);
        self.hooks
            .chain_all(&self.context(session), events::LOGIN, args)
            .await
    }

    /// 로그아웃 (`logout`)
    pub async fn logout(&self, session: &Arc<Session>) {
        self.hooks
            .emit(&self.context(session), events::LOGOUT, HookArgs::new())
            .await;
    }

    /// 세션 권한 질의
    pub async fn can(
        &self,
        session: &Arc<Session>,
        action: &str,
        object_type: Option<&str>,
        object_id: Option<i64>,
    ) -> bool {
        self.hooks
            .can(&self.context(session), action, object_type, object_id)
            .await
    }

    /// 요청 처리 (`startup` → 라우터)
    pub async fn handle(&self, session: &Arc<Session>, request: RequestInfo) {
        let ctx = self.context(session).with_request(request);
        self.hooks.emit(&ctx, events::STARTUP, HookArgs::new()).await;
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("database", &self.db)
            .field("hooks", &self.hooks)
            .field("sessions", &self.sessions.len())
            .finish()
    }
}
