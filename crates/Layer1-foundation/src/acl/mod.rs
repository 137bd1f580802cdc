//! ACL types for Pyrite
//!
//! - `grant`: 권한 triplet 과 단계별 와일드카드 (`Scope`)
//! - `cache`: 세션별 평탄화 권한 캐시 (`CapabilityCache`)
//!
//! 해석 엔진 (`AclEngine`) 과 저장소는 `pyrite-core` 에 있다.

mod cache;
mod grant;

pub use cache::CapabilityCache;
pub use grant::{Grant, GrantRow, Scope, ANY_ID, ANY_MARKER};
