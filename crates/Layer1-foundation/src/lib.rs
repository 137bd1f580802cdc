//! # pyrite-foundation
//!
//! Foundation layer for Pyrite:
//! - Hook: 이벤트 레지스트리 + dispatch (emit / chain_all / chain_first)
//! - ACL: grant 타입과 세션 권한 캐시
//! - Session: 세션 신원 및 권한 캐시 상태
//! - Storage: SQLite (모듈 공유), ConfigDir (설정)
//! - Config: 통합 설정 (PyriteConfig)
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  HookRegistry (초기화 단계, 가변)                         │
//! │  ├── ACL      (install, newuser, logout, can)           │
//! │  ├── Audit    (install, log, history)                   │
//! │  └── User     (authenticate, user_*, login)             │
//! │                     │ freeze                            │
//! │                     ▼                                   │
//! │          Dispatcher (불변, Arc 공유)                      │
//! │                     │                                   │
//! │          ┌─────────┴─────────┐                         │
//! │          ▼                   ▼                         │
//! │   HookContext           CapabilityCache                │
//! │   (session, request)    (세션 단독 소유)                  │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod acl;
pub mod config;
pub mod error;
pub mod hook;
pub mod session;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{
    AclConfig, AuditConfig, DatabaseConfig, DispatchConfig, PartialConfig, PyriteConfig,
    PYRITE_CONFIG_FILE,
};

// ============================================================================
// Hook (이벤트 dispatch)
// ============================================================================
pub use hook::{
    // Catalogue
    events,
    // Handler
    handler_fn,
    is_truthy,
    // Dispatch
    Dispatcher,
    HookArgs,
    HookContext,
    HookHandler,
    HookInvocation,
    // Registry
    HookRegistry,
    HookReply,
    ListenerId,
    ListenerInfo,
    RequestInfo,
    DEFAULT_PRIORITY,
};

// ============================================================================
// ACL (권한 타입)
// ============================================================================
pub use acl::{CapabilityCache, Grant, GrantRow, Scope, ANY_ID, ANY_MARKER};

// ============================================================================
// Session (세션)
// ============================================================================
pub use session::{AclState, Session, SessionPhase, SessionStore, SessionUser};

// ============================================================================
// Storage (저장소)
// ============================================================================
pub use storage::{json_to_sql, select_rows_with, ConfigDir, Database, JsonRow};
