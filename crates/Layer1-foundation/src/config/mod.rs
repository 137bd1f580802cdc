//! Config - 통합 설정 관리
//!
//! - `pyrite.rs` - PyriteConfig 통합 설정 (database, dispatch, acl, audit)

mod pyrite;

pub use pyrite::{
    AclConfig, AuditConfig, DatabaseConfig, DispatchConfig, PartialConfig, PyriteConfig,
    PYRITE_CONFIG_FILE,
};
