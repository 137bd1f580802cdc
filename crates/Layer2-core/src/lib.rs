//! pyrite-core: Core modules for Pyrite
//!
//! Layer2 - hook 위에 올라가는 기능 모듈
//!
//! # 주요 모듈
//!
//! - `acl`: 역할/사용자 grant 저장소 + 세션 권한 엔진 (`can`)
//! - `audit`: 변경 이력 기록 (`log`, `history`)
//! - `user`: 사용자 저장소, 비밀번호, 로그인/로그아웃
//! - `router`: 경로 → `route/<base>` dispatch
//! - `app`: 모듈 조립 (`Application`)
//!
//! # 사용 예시
//!
//! ```ignore
//! use pyrite_core::{Application, AdminCredentials};
//! use pyrite_foundation::PyriteConfig;
//!
//! let app = Application::builder(PyriteConfig::load()?).build()?;
//! app.install(Some(AdminCredentials::new("admin@example.com", "secret-pass"))).await?;
//!
//! let session = app.start_session().await;
//! if app.login(&session, "admin@example.com", "secret-pass", None).await {
//!     assert!(app.can(&session, "edit", Some("page"), Some(3)).await);
//! }
//! ```

pub mod acl;
pub mod app;
pub mod audit;
pub mod router;
pub mod user;

// ============================================================================
// Re-exports
// ============================================================================

pub use acl::{
    AclEngine, EffectiveGrants, GrantStore, SqliteGrantStore, ADMIN_ROLE, ADMIN_USER_ID,
};
pub use app::{Application, ApplicationBuilder};
pub use audit::{AuditEntry, AuditRecord, AuditTrail, HistoryQuery, SortOrder};
pub use router::Route;
pub use user::{AdminCredentials, Created, Updated, User, UserStore};
