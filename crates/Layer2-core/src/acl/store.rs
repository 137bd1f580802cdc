//! Grant Store - 권한 저장소
//!
//! 세 테이블을 사용한다:
//! - `acl_roles (role, action, objectType, objectId)` - 역할별 grant
//! - `acl_users (userId, action, objectType, objectId)` - 사용자 직접 grant
//! - `users_roles (userId, role)` - 역할 소속
//!
//! 각 테이블은 전체 컬럼에 unique index 가 있어 중복 grant 는 무시된다.

use async_trait::async_trait;
use pyrite_foundation::{Database, Error, Grant, Result};
use rusqlite::{params, Connection};
use tracing::{debug, info};

/// 기본 관리자 역할
pub const ADMIN_ROLE: &str = "admin";

/// 기본 관리자 사용자 id
pub const ADMIN_USER_ID: i64 = 1;

/// reload 한 번에 읽은 grant 묶음
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectiveGrants {
    /// 사용자 직접 grant
    pub direct: Vec<Grant>,
    /// 역할을 통해 상속된 grant
    pub inherited: Vec<Grant>,
}

impl EffectiveGrants {
    pub fn iter(&self) -> impl Iterator<Item = &Grant> {
        self.direct.iter().chain(self.inherited.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.direct.is_empty() && self.inherited.is_empty()
    }
}

// ============================================================================
// GrantStore trait
// ============================================================================

/// 권한 저장소 인터페이스
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// 스키마 생성 (멱등)
    async fn ensure_schema(&self) -> Result<()>;

    /// `admin` 역할 `(*, *, 0)` 생성 및 사용자 1 바인딩 (멱등)
    async fn seed_default_admin(&self) -> Result<()>;

    /// 사용자 직접 grant
    async fn query_user_grants(&self, user_id: i64) -> Result<Vec<Grant>>;

    /// 역할을 통해 상속된 grant
    async fn query_role_grants_for_user(&self, user_id: i64) -> Result<Vec<Grant>>;

    /// 직접 + 상속 grant 를 하나의 일관된 스냅샷으로 조회
    async fn load_effective_grants(&self, user_id: i64) -> Result<EffectiveGrants> {
        Ok(EffectiveGrants {
            direct: self.query_user_grants(user_id).await?,
            inherited: self.query_role_grants_for_user(user_id).await?,
        })
    }

    // ========================================================================
    // 관리
    // ========================================================================

    /// 역할에 grant 추가. 새로 추가되면 true.
    async fn add_role_grant(&self, role: &str, grant: &Grant) -> Result<bool>;

    async fn remove_role_grant(&self, role: &str, grant: &Grant) -> Result<bool>;

    /// 사용자에게 직접 grant 추가. 새로 추가되면 true.
    async fn add_user_grant(&self, user_id: i64, grant: &Grant) -> Result<bool>;

    async fn remove_user_grant(&self, user_id: i64, grant: &Grant) -> Result<bool>;

    /// 사용자를 역할에 추가. 새로 추가되면 true.
    async fn add_user_role(&self, user_id: i64, role: &str) -> Result<bool>;

    async fn remove_user_role(&self, user_id: i64, role: &str) -> Result<bool>;

    /// 역할의 grant 목록
    async fn role_grants(&self, role: &str) -> Result<Vec<Grant>>;

    /// 사용자의 역할 목록
    async fn user_roles(&self, user_id: i64) -> Result<Vec<String>>;
}

// ============================================================================
// SQLite 구현
// ============================================================================

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS acl_roles (
    role       VARCHAR(64) NOT NULL DEFAULT '',
    action     VARCHAR(64) NOT NULL DEFAULT '*',
    objectType VARCHAR(64) NOT NULL DEFAULT '*',
    objectId   INTEGER     NOT NULL DEFAULT 0
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_acl_roles
    ON acl_roles (role, action, objectType, objectId);

CREATE TABLE IF NOT EXISTS acl_users (
    userId     INTEGER     NOT NULL DEFAULT 0,
    action     VARCHAR(64) NOT NULL DEFAULT '*',
    objectType VARCHAR(64) NOT NULL DEFAULT '*',
    objectId   INTEGER     NOT NULL DEFAULT 0
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_acl_users
    ON acl_users (userId, action, objectType, objectId);

CREATE TABLE IF NOT EXISTS users_roles (
    userId     INTEGER     NOT NULL DEFAULT 0,
    role       VARCHAR(64) NOT NULL DEFAULT ''
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_users_roles
    ON users_roles (userId, role);
"#;

const USER_GRANTS_SQL: &str = "
    SELECT action, objectType, objectId
    FROM acl_users
    WHERE userId = ?1
    ORDER BY rowid";

const ROLE_GRANTS_FOR_USER_SQL: &str = "
    SELECT acl_roles.action, acl_roles.objectType, acl_roles.objectId
    FROM users_roles
    INNER JOIN acl_roles ON acl_roles.role = users_roles.role
    WHERE users_roles.userId = ?1
    ORDER BY acl_roles.rowid";

/// SQLite 기반 grant 저장소
#[derive(Debug, Clone)]
pub struct SqliteGrantStore {
    db: Database,
}

impl SqliteGrantStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

fn query_grants(conn: &Connection, sql: &str, user_id: i64) -> Result<Vec<Grant>> {
    let mut stmt = conn.prepare(sql)?;
    let grants = stmt
        .query_map([user_id], |row| {
            Ok(Grant::from_row(
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(grants)
}

fn validate_role(role: &str) -> Result<()> {
    if role.trim().is_empty() {
        return Err(Error::InvalidInput("role name must not be empty".to_string()));
    }
    Ok(())
}

#[async_trait]
impl GrantStore for SqliteGrantStore {
    async fn ensure_schema(&self) -> Result<()> {
        self.db
            .execute_batch(SCHEMA)
            .map_err(|e| Error::Config(format!("Failed to create ACL schema: {}", e)))?;
        debug!("ACL schema ready");
        Ok(())
    }

    async fn seed_default_admin(&self) -> Result<()> {
        self.db.transaction(|tx| {
            let (action, object_type, object_id) = Grant::everything().to_row();
            let role_rows = tx.execute(
                "INSERT OR IGNORE INTO acl_roles (role, action, objectType, objectId)
                 VALUES (?1, ?2, ?3, ?4)",
                params![ADMIN_ROLE, action, object_type, object_id],
            )?;
            let member_rows = tx.execute(
                "INSERT OR IGNORE INTO users_roles (userId, role) VALUES (?1, ?2)",
                params![ADMIN_USER_ID, ADMIN_ROLE],
            )?;

            if role_rows + member_rows > 0 {
                info!(role = ADMIN_ROLE, user_id = ADMIN_USER_ID, "Default admin seeded");
            }
            Ok(())
        })
    }

    async fn query_user_grants(&self, user_id: i64) -> Result<Vec<Grant>> {
        self.db
            .with_conn(|conn| query_grants(conn, USER_GRANTS_SQL, user_id))
    }

    async fn query_role_grants_for_user(&self, user_id: i64) -> Result<Vec<Grant>> {
        self.db
            .with_conn(|conn| query_grants(conn, ROLE_GRANTS_FOR_USER_SQL, user_id))
    }

    async fn load_effective_grants(&self, user_id: i64) -> Result<EffectiveGrants> {
        // 한 트랜잭션 안에서 읽어 중간 변경이 섞이지 않게 한다
        self.db.transaction(|tx| {
            Ok(EffectiveGrants {
                direct: query_grants(tx, USER_GRANTS_SQL, user_id)?,
                inherited: query_grants(tx, ROLE_GRANTS_FOR_USER_SQL, user_id)?,
            })
        })
    }

    async fn add_role_grant(&self, role: &str, grant: &Grant) -> Result<bool> {
        validate_role(role)?;
        let (action, object_type, object_id) = grant.to_row();
        let rows = self.db.execute(
            "INSERT OR IGNORE INTO acl_roles (role, action, objectType, objectId)
             VALUES (?1, ?2, ?3, ?4)",
            &[&role, &action, &object_type, &object_id],
        )?;
        Ok(rows > 0)
    }

    async fn remove_role_grant(&self, role: &str, grant: &Grant) -> Result<bool> {
        let (action, object_type, object_id) = grant.to_row();
        let rows = self.db.execute(
            "DELETE FROM acl_roles
             WHERE role = ?1 AND action = ?2 AND objectType = ?3 AND objectId = ?4",
            &[&role, &action, &object_type, &object_id],
        )?;
        Ok(rows > 0)
    }

    async fn add_user_grant(&self, user_id: i64, grant: &Grant) -> Result<bool> {
        let (action, object_type, object_id) = grant.to_row();
        let rows = self.db.execute(
            "INSERT OR IGNORE INTO acl_users (userId, action, objectType, objectId)
             VALUES (?1, ?2, ?3, ?4)",
            &[&user_id, &action, &object_type, &object_id],
        )?;
        Ok(rows > 0)
    }

    async fn remove_user_grant(&self, user_id: i64, grant: &Grant) -> Result<bool> {
        let (action, object_type, object_id) = grant.to_row();
        let rows = self.db.execute(
            "DELETE FROM acl_users
             WHERE userId = ?1 AND action = ?2 AND objectType = ?3 AND objectId = ?4",
            &[&user_id, &action, &object_type, &object_id],
        )?;
        Ok(rows > 0)
    }

    async fn add_user_role(&self, user_id: i64, role: &str) -> Result<bool> {
        validate_role(role)?;
        let rows = self.db.execute(
            "INSERT OR IGNORE INTO users_roles (userId, role) VALUES (?1, ?2)",
            &[&user_id, &role],
        )?;
        Ok(rows > 0)
    }

    async fn remove_user_role(&self, user_id: i64, role: &str) -> Result<bool> {
        let rows = self.db.execute(
            "DELETE FROM users_roles WHERE userId = ?1 AND role = ?2",
            &[&user_id, &role],
        )?;
        Ok(rows > 0)
    }

    async fn role_grants(&self, role: &str) -> Result<Vec<Grant>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT action, objectType, objectId FROM acl_roles WHERE role = ?1 ORDER BY rowid",
            )?;
            let grants = stmt
                .query_map([role], |row| {
                    Ok(Grant::from_row(
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(grants)
        })
    }

    async fn user_roles(&self, user_id: i64) -> Result<Vec<String>> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT role FROM users_roles WHERE userId = ?1 ORDER BY role")?;
            let roles = stmt
                .query_map([user_id], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(roles)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteGrantStore {
        let store = SqliteGrantStore::new(Database::in_memory().unwrap());
        store.ensure_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let store = store().await;
        store.ensure_schema().await.unwrap();
        store.seed_default_admin().await.unwrap();
        store.seed_default_admin().await.unwrap();

        assert_eq!(store.role_grants(ADMIN_ROLE).await.unwrap(), vec![Grant::everything()]);
        assert_eq!(store.user_roles(ADMIN_USER_ID).await.unwrap(), vec!["admin".to_string()]);
    }

    #[tokio::test]
    async fn test_duplicate_grants_ignored() {
        let store = store().await;
        let grant = Grant::action("edit").of_type("document");

        assert!(store.add_role_grant("editor", &grant).await.unwrap());
        assert!(!store.add_role_grant("editor", &grant).await.unwrap());
        assert!(store.add_user_grant(7, &grant).await.unwrap());
        assert!(!store.add_user_grant(7, &grant).await.unwrap());
        assert!(store.add_user_role(7, "editor").await.unwrap());
        assert!(!store.add_user_role(7, "editor").await.unwrap());
    }

    #[tokio::test]
    async fn test_effective_grants_join_roles() {
        let store = store().await;
        store
            .add_role_grant("editor", &Grant::action("publish").of_type("article"))
            .await
            .unwrap();
        store
            .add_role_grant("viewer", &Grant::action("read"))
            .await
            .unwrap();
        store.add_user_role(7, "editor").await.unwrap();
        store
            .add_user_grant(7, &Grant::action("edit").of_type("article").with_id(99))
            .await
            .unwrap();

        let effective = store.load_effective_grants(7).await.unwrap();
        assert_eq!(
            effective.direct,
            vec![Grant::action("edit").of_type("article").with_id(99)]
        );
        assert_eq!(
            effective.inherited,
            vec![Grant::action("publish").of_type("article")]
        );
        assert_eq!(effective.iter().count(), 2);

        assert!(store.load_effective_grants(8).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove() {
        let store = store().await;
        let grant = Grant::action("delete").of_type("article").with_id(5);
        store.add_user_grant(3, &grant).await.unwrap();
        store.add_user_role(3, "editor").await.unwrap();

        assert!(store.remove_user_grant(3, &grant).await.unwrap());
        assert!(!store.remove_user_grant(3, &grant).await.unwrap());
        assert!(store.remove_user_role(3, "editor").await.unwrap());
        assert!(store.user_roles(3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_role_rejected() {
        let store = store().await;
        assert!(store.add_user_role(3, " ").await.is_err());
        assert!(store.add_role_grant("", &Grant::everything()).await.is_err());
    }
}
