//! SQLite Database wrapper
//!
//! 모듈들이 공유하는 얇은 rusqlite 래퍼:
//! - 커넥션 공유 (`Arc<Mutex<Connection>>`)
//! - 트랜잭션 헬퍼 (grant 조회 스냅샷 등)
//! - 컬럼 whitelist 기반 insert/update (폼 데이터를 그대로 넘겨도 안전)
//! - 행 → JSON 객체 변환
//!
//! 스키마는 각 모듈이 `install` 이벤트에서 직접 만든다.

use crate::{Error, Result};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, Row, ToSql, Transaction};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// JSON 객체 행
pub type JsonRow = Map<String, Value>;

/// 공유 SQLite 커넥션
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    /// 테이블별 컬럼 목록 캐시
    columns: Arc<Mutex<HashMap<String, Vec<String>>>>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}

impl Database {
    /// 파일 데이터베이스 열기
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Storage(format!("Failed to create data directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::Storage(format!("Failed to open database: {}", e)))?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| Error::Storage(format!("Failed to set pragmas: {}", e)))?;

        info!(db_path = %path.display(), "Database opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            columns: Arc::new(Mutex::new(HashMap::new())),
            path: Some(path.to_path_buf()),
        })
    }

    /// 인메모리 데이터베이스 (테스트용)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("Failed to create in-memory database: {}", e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            columns: Arc::new(Mutex::new(HashMap::new())),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // ========================================================================
    // Raw access
    // ========================================================================

    /// 커넥션으로 작업 실행
    pub fn with_conn<R>(&self, f: impl FnOnce(&Connection) -> Result<R>) -> Result<R> {
        let conn = self.conn.lock().map_err(|_| Error::poisoned())?;
        f(&conn)
    }

    /// 트랜잭션 안에서 작업 실행 (에러 시 롤백)
    pub fn transaction<R>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<R>) -> Result<R> {
        let mut conn = self.conn.lock().map_err(|_| Error::poisoned())?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::Storage(format!("Failed to begin transaction: {}", e)))?;
        let result = f(&tx)?;
        tx.commit()
            .map_err(|e| Error::Storage(format!("Failed to commit transaction: {}", e)))?;
        Ok(result)
    }

    /// 여러 문장 실행 (스키마 생성 등)
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(sql)
                .map_err(|e| Error::Storage(format!("Failed to execute batch: {}", e)))
        })?;
        self.forget_columns();
        Ok(())
    }

    /// 결과 없는 문장 실행, 영향받은 행 수 반환
    pub fn execute(&self, sql: &str, params: &[&dyn ToSql]) -> Result<usize> {
        self.with_conn(|conn| Ok(conn.execute(sql, params)?))
    }

    // ========================================================================
    // Select helpers
    // ========================================================================

    /// 단일 값 조회 (첫 행, 첫 컬럼)
    pub fn select_atom(&self, sql: &str, params: &[&dyn ToSql]) -> Result<Option<Value>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let mut rows = stmt.query(params)?;
            match rows.next()? {
                Some(row) => Ok(Some(value_ref_to_json(row.get_ref(0)?))),
                None => Ok(None),
            }
        })
    }

    /// 모든 행을 JSON 객체로 조회
    pub fn select_rows(&self, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<JsonRow>> {
        self.with_conn(|conn| select_rows_with(conn, sql, params))
    }

    /// 첫 행만 JSON 객체로 조회
    pub fn select_row(&self, sql: &str, params: &[&dyn ToSql]) -> Result<Option<JsonRow>> {
        Ok(self.select_rows(sql, params)?.into_iter().next())
    }

    // ========================================================================
    // Whitelisted insert / update
    // ========================================================================

    /// 테이블 컬럼 목록 (캐시)
    pub fn columns(&self, table: &str) -> Result<Vec<String>> {
        {
            let cache = self.columns.lock().map_err(|_| Error::poisoned())?;
            if let Some(cols) = cache.get(table) {
                return Ok(cols.clone());
            }
        }

        let cols = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
            let cols = stmt
                .query_map([], |row| row.get::<_, String>(1))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(cols)
        })?;

        if cols.is_empty() {
            return Err(Error::Storage(format!("Unknown table: {}", table)));
        }

        self.columns
            .lock()
            .map_err(|_| Error::poisoned())?
            .insert(table.to_string(), cols.clone());
        Ok(cols)
    }

    /// 알려진 컬럼만 골라 INSERT, 새 rowid 반환
    pub fn insert(&self, table: &str, values: &JsonRow) -> Result<i64> {
        let known = self.columns(table)?;
        let (cols, args): (Vec<&String>, Vec<SqlValue>) = values
            .iter()
            .filter(|(key, _)| known.contains(key))
            .map(|(key, value)| (key, json_to_sql(value)))
            .unzip();

        let sql = if cols.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table))
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(table),
                cols.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "),
                vec!["?"; cols.len()].join(", ")
            )
        };

        debug!(table, columns = cols.len(), "Whitelisted insert");

        self.with_conn(|conn| {
            conn.execute(&sql, params_from_iter(args.iter()))?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// 알려진 컬럼만 골라 UPDATE, 영향받은 행 수 반환
    ///
    /// `tail` 은 WHERE 절 등 쿼리 뒷부분, `tail_args` 는 그 placeholder 값.
    pub fn update(
        &self,
        table: &str,
        values: &JsonRow,
        tail: &str,
        tail_args: &[SqlValue],
    ) -> Result<usize> {
        let known = self.columns(table)?;
        let mut sets = Vec::new();
        let mut args = Vec::new();
        for (key, value) in values.iter().filter(|(key, _)| known.contains(key)) {
            sets.push(format!("{}=?", quote_ident(key)));
            args.push(json_to_sql(value));
        }

        if sets.is_empty() {
            return Ok(0);
        }
        args.extend(tail_args.iter().cloned());

        let sql = format!("UPDATE {} SET {} {}", quote_ident(table), sets.join(", "), tail);
        self.with_conn(|conn| Ok(conn.execute(&sql, params_from_iter(args.iter()))?))
    }

    fn forget_columns(&self) {
        if let Ok(mut cache) = self.columns.lock() {
            cache.clear();
        }
    }
}

// ============================================================================
// Conversion helpers
// ============================================================================

/// 쿼리 결과 전체를 JSON 객체 목록으로
pub fn select_rows_with(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<JsonRow>> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let rows = stmt
        .query_map(params, |row| row_to_json(row, &names))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn row_to_json(row: &Row<'_>, names: &[String]) -> rusqlite::Result<JsonRow> {
    let mut map = Map::with_capacity(names.len());
    for (idx, name) in names.iter().enumerate() {
        map.insert(name.clone(), value_ref_to_json(row.get_ref(idx)?));
    }
    Ok(map)
}

fn value_ref_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}

/// JSON 값을 SQLite 값으로 (bool → 0/1, 배열/객체 → JSON 텍스트)
pub fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
