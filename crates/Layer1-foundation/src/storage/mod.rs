//! Storage module for Pyrite
//!
//! - `db`: SQLite - 모듈 공유 데이터베이스 (ACL, 감사 로그, 사용자)
//! - `json`: JSON - 설정 파일 읽기

mod db;
mod json;

// SQLite Storage
pub use db::{json_to_sql, select_rows_with, Database, JsonRow};

// JSON 설정 디렉토리
pub use json::ConfigDir;
