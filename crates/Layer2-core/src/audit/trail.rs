//! Audit Trail - 트랜잭션 기록 및 조회
//!
//! `transactions` 테이블에 누가 (userId, ip) 무엇을 (objectType, objectId)
//! 어떻게 (action, fieldName, oldValue, newValue) 했는지 기록한다.

use super::types::{AuditEntry, AuditRecord, HistoryQuery};
use pyrite_foundation::{
    events, handler_fn, AuditConfig, Database, Error, HookContext, HookInvocation, HookRegistry,
    HookReply, Result,
};
use rusqlite::{params, ToSql};
use std::sync::Arc;
use tracing::{debug, info};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp  TIMESTAMP   NOT NULL DEFAULT CURRENT_TIMESTAMP,
    userId     INTEGER     NOT NULL DEFAULT 0,
    ip         VARCHAR(16) NOT NULL DEFAULT '127.0.0.1',
    objectType VARCHAR(64) DEFAULT NULL,
    objectId   INTEGER     DEFAULT NULL,
    action     VARCHAR(64) NOT NULL DEFAULT '',
    fieldName  VARCHAR(64) DEFAULT NULL,
    oldValue   VARCHAR(255) DEFAULT NULL,
    newValue   VARCHAR(255) DEFAULT NULL
);
"#;

/// 설치 시 기록되는 action
pub const INSTALLED_ACTION: &str = "installed";

/// 감사 기록기
#[derive(Debug, Clone)]
pub struct AuditTrail {
    db: Database,
    config: AuditConfig,
}

impl AuditTrail {
    pub fn new(db: Database, config: AuditConfig) -> Self {
        Self { db, config }
    }

    /// 테이블 생성 후 `installed` 항목 기록
    pub async fn install(&self, ctx: &HookContext) -> Result<()> {
        self.db
            .execute_batch(SCHEMA)
            .map_err(|e| Error::Config(format!("Failed to create audit schema: {}", e)))?;
        self.add(ctx, &AuditRecord::new(INSTALLED_ACTION)).await?;
        info!("Audit trail installed");
        Ok(())
    }

    /// 항목 기록, 새 id 반환
    ///
    /// 행위자가 없으면 세션 사용자 (없으면 0), ip 는 요청 주소 (없으면 기본값).
    pub async fn add(&self, ctx: &HookContext, record: &AuditRecord) -> Result<i64> {
        if record.action.is_empty() {
            return Err(Error::InvalidInput("audit record requires an action".to_string()));
        }

        let user_id = record
            .user_id
            .filter(|id| *id != 0)
            .or_else(|| ctx.user_id())
            .unwrap_or(0);
        let ip = ctx
            .request()
            .and_then(|r| r.remote_addr.clone())
            .unwrap_or_else(|| self.config.default_remote_addr.clone());

        let id = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO transactions
                 (userId, ip, objectType, objectId, action, fieldName, oldValue, newValue)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    user_id,
                    ip,
                    record.object_type,
                    record.object_id,
                    record.action,
                    record.field_name,
                    record.old_value,
                    record.new_value,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        debug!(
            id,
            user_id,
            action = %record.action,
            object_type = ?record.object_type,
            object_id = ?record.object_id,
            "Audit entry recorded"
        );
        Ok(id)
    }

    /// 필터에 맞는 기록 조회
    ///
    /// 필터가 하나도 없으면 빈 목록. 최대 행 수는 설정값으로 제한된다.
    pub async fn history(&self, query: &HistoryQuery) -> Result<Vec<AuditEntry>> {
        if !query.has_filters() {
            debug!("History query without filters, returning nothing");
            return Ok(Vec::new());
        }

        let mut sql = String::from(
            "SELECT id, timestamp, datetime(timestamp, 'localtime') AS localTimestamp,
                    userId, ip, objectType, objectId, action, fieldName, oldValue, newValue
             FROM transactions WHERE 1=1",
        );
        let mut params_vec: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(user_id) = query.user_id {
            sql.push_str(" AND userId = ?");
            params_vec.push(Box::new(user_id));
        }
        if let Some(ref object_type) = query.object_type {
            sql.push_str(" AND objectType = ?");
            params_vec.push(Box::new(object_type.clone()));
        }
        if let Some(object_id) = query.object_id {
            sql.push_str(" AND objectId = ?");
            params_vec.push(Box::new(object_id));
        }
        if let Some(ref action) = query.action {
            sql.push_str(" AND action = ?");
            params_vec.push(Box::new(action.clone()));
        }
        if let Some(ref field_name) = query.field_name {
            sql.push_str(" AND fieldName = ?");
            params_vec.push(Box::new(field_name.clone()));
        }

        let max = query
            .max
            .map_or(self.config.history_max, |m| m.min(self.config.history_max));
        sql.push_str(&format!(" ORDER BY id {} LIMIT {}", query.order.as_sql(), max));

        let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();

        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let entries = stmt
                .query_map(params_refs.as_slice(), |row| {
                    Ok(AuditEntry {
                        id: row.get(0)?,
                        timestamp: row.get(1)?,
                        local_timestamp: row.get(2)?,
                        user_id: row.get(3)?,
                        ip: row.get(4)?,
                        object_type: row.get(5)?,
                        object_id: row.get(6)?,
                        action: row.get(7)?,
                        field_name: row.get(8)?,
                        old_value: row.get(9)?,
                        new_value: row.get(10)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
    }

    // ========================================================================
    // Hook 등록
    // ========================================================================

    /// 리스너 등록: install, log, history
    pub fn register(self: &Arc<Self>, registry: &mut HookRegistry) {
        let trail = self.clone();
        registry.register_default(
            events::INSTALL,
            "audit.install",
            handler_fn(move |call: HookInvocation| {
                let trail = trail.clone();
                async move {
                    trail.install(&call.ctx).await?;
                    Ok(HookReply::NoResult)
                }
            }),
        );

        let trail = self.clone();
        registry.register_default(
            events::LOG,
            "audit.add",
            handler_fn(move |call: HookInvocation| {
                let trail = trail.clone();
                async move {
                    let record = AuditRecord::from_args(&call.args);
                    trail.add(&call.ctx, &record).await?;
                    Ok(HookReply::NoResult)
                }
            }),
        );

        let trail = self.clone();
        registry.register_default(
            events::HISTORY,
            "audit.history",
            handler_fn(move |call: HookInvocation| {
                let trail = trail.clone();
                async move {
                    let query = HistoryQuery::from_args(&call.args);
                    let entries = trail.history(&query).await?;
                    Ok(HookReply::value(serde_json::to_value(entries)?))
                }
            }),
        );
    }
}
