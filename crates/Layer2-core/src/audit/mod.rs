//! Audit - 감사 로그 (`log` / `history` 이벤트)
//!
//! - `types` - AuditRecord, AuditEntry, HistoryQuery
//! - `trail` - SQLite `transactions` 테이블 기록/조회

mod trail;
mod types;

pub use trail::{AuditTrail, INSTALLED_ACTION};
pub use types::{AuditEntry, AuditRecord, HistoryQuery, SortOrder};
