//! ACL - 권한 해석 엔진
//!
//! - `store` - Grant Store (SQLite)
//! - `engine` - 세션 캐시 빌드, `can` 질의, 관리 API

mod engine;
mod store;

pub use engine::{AclEngine, INSTALL_PRIORITY};
pub use store::{EffectiveGrants, GrantStore, SqliteGrantStore, ADMIN_ROLE, ADMIN_USER_ID};
