//! User Store - 사용자 계정
//!
//! 이벤트: `install`, `authenticate`, `user_create`, `user_update`,
//! `user_fromemail`. 비밀번호/토큰 해시는 절대 밖으로 내보내지 않는다.

use super::password::{generate_onetime, hash_password, verify_password, MIN_PASSWORD_LEN};
use pyrite_foundation::{
    events, handler_fn, is_truthy, Database, Error, HookArgs, HookInvocation, HookRegistry,
    HookReply, JsonRow, Result, SessionUser,
};
use rusqlite::ErrorCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    email        VARCHAR(255) NOT NULL DEFAULT '',
    passwordHash VARCHAR(255) NOT NULL DEFAULT '',
    onetimeHash  VARCHAR(255) NOT NULL DEFAULT '',
    name         VARCHAR(255) NOT NULL DEFAULT ''
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users (email);
"#;

/// 관리자 계정 이름
pub const ADMIN_NAME: &str = "Administrator";

/// 입력 컬럼에서 직접 받지 않는 필드
const PROTECTED_COLUMNS: &[&str] = &["id", "passwordHash", "onetimeHash"];

// ============================================================================
// Types
// ============================================================================

/// 사용자 (공개 필드만)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
}

impl From<User> for SessionUser {
    fn from(user: User) -> Self {
        SessionUser {
            id: user.id,
            email: user.email,
            name: user.name,
        }
    }
}

/// 설치 시 생성할 관리자 계정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCredentials {
    pub email: String,
    pub password: String,
}

impl AdminCredentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// 사용자 생성 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    pub id: i64,
    /// `onetime` 요청 시 발급된 토큰
    pub onetime: Option<String>,
}

/// 사용자 수정 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Updated {
    pub changed: bool,
    /// `onetime` 요청 시 발급된 토큰
    pub onetime: Option<String>,
}

struct UserRow {
    user: User,
    password_hash: String,
    onetime_hash: String,
}

// ============================================================================
// UserStore
// ============================================================================

/// 사용자 저장소
#[derive(Debug, Clone)]
pub struct UserStore {
    db: Database,
}

impl UserStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// 테이블 생성, 관리자 계정 (id 1) 이 없으면 생성
    pub async fn install(&self, admin: Option<&AdminCredentials>) -> Result<()> {
        self.db
            .execute_batch(SCHEMA)
            .map_err(|e| Error::Config(format!("Failed to create users schema: {}", e)))?;

        if self.get(1).await?.is_some() {
            debug!("Admin user already present");
            return Ok(());
        }

        let Some(admin) = admin else {
            warn!("No admin user and no admin credentials supplied, skipping");
            return Ok(());
        };
        let email = admin.email.trim();
        if email.is_empty() || admin.password.is_empty() {
            return Err(Error::Config(
                "admin credentials require an email and a password".to_string(),
            ));
        }

        let hash = hash_password(&admin.password)?;
        self.db.execute(
            "INSERT INTO users (id, email, passwordHash, name) VALUES (1, ?1, ?2, ?3)",
            &[&email, &hash, &ADMIN_NAME],
        )?;
        info!(email = %email, "Admin user created");
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<Option<User>> {
        Ok(self
            .row("SELECT id, email, name, passwordHash, onetimeHash FROM users WHERE id = ?1", &id)?
            .map(|row| row.user))
    }

    pub async fn from_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.row_by_email(email)?.map(|row| row.user))
    }

    /// 로그인 검증
    ///
    /// 일회용 토큰이 주어지면 토큰이 맞아야 하며 사용 후 폐기된다.
    /// 일반 비밀번호는 대기 중인 토큰이 없을 때만 통한다.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
        onetime: Option<&str>,
    ) -> Result<Option<User>> {
        let Some(row) = self.row_by_email(email)? else {
            debug!("Authentication failed: unknown email");
            return Ok(None);
        };

        match onetime.filter(|t| !t.is_empty()) {
            Some(token) => {
                if !verify_password(token, &row.onetime_hash) {
                    return Ok(None);
                }
                self.db.execute(
                    "UPDATE users SET onetimeHash = '' WHERE id = ?1",
                    &[&row.user.id],
                )?;
                debug!(user_id = row.user.id, "One-time token consumed");
                Ok(Some(row.user))
            }
            None => {
                if row.onetime_hash.is_empty() && verify_password(password, &row.password_hash) {
                    Ok(Some(row.user))
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// 사용자 생성
    ///
    /// `password` 는 해시되어 저장되고, `onetime` 이 참이면 토큰을 발급한다.
    /// 이메일 중복이면 `None`.
    pub async fn create(&self, mut cols: JsonRow) -> Result<Option<Created>> {
        strip_protected(&mut cols);

        let email = cols
            .get("email")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        if email.is_empty() {
            return Err(Error::Validation("email is required".to_string()));
        }
        cols.insert("email".to_string(), Value::String(email));

        if let Some(password) = cols.get("password").and_then(Value::as_str) {
            let hash = hash_password(password)?;
            cols.insert("passwordHash".to_string(), Value::String(hash));
        }

        let onetime = if cols.get("onetime").is_some_and(is_truthy) {
            let token = generate_onetime();
            cols.insert("onetimeHash".to_string(), Value::String(hash_password(&token)?));
            Some(token)
        } else {
            None
        };

        match self.db.insert("users", &cols) {
            Ok(id) => {
                info!(user_id = id, "User created");
                Ok(Some(Created { id, onetime }))
            }
            Err(e) if is_constraint_violation(&e) => {
                debug!("User creation rejected: duplicate email");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// 사용자 수정
    ///
    /// `newpassword1`/`newpassword2` 가 같고 충분히 길면 비밀번호를 바꾼다.
    pub async fn update(&self, id: i64, mut cols: JsonRow) -> Result<Updated> {
        strip_protected(&mut cols);

        let new_password = match (
            cols.get("newpassword1").and_then(Value::as_str),
            cols.get("newpassword2").and_then(Value::as_str),
        ) {
            (Some(p1), Some(p2)) if p1.len() >= MIN_PASSWORD_LEN && p1 == p2 => Some(p1.to_string()),
            _ => None,
        };
        if let Some(password) = new_password {
            cols.insert("passwordHash".to_string(), Value::String(hash_password(&password)?));
        }

        let onetime = if cols.get("onetime").is_some_and(is_truthy) {
            let token = generate_onetime();
            cols.insert("onetimeHash".to_string(), Value::String(hash_password(&token)?));
            Some(token)
        } else {
            None
        };

        let changed = match self.db.update(
            "users",
            &cols,
            "WHERE id = ?",
            &[rusqlite::types::Value::Integer(id)],
        ) {
            Ok(rows) => rows > 0,
            Err(e) if is_constraint_violation(&e) => false,
            Err(e) => return Err(e),
        };

        if changed {
            info!(user_id = id, "User updated");
        }
        Ok(Updated {
            changed,
            onetime: onetime.filter(|_| changed),
        })
    }

    fn row_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.row(
            "SELECT id, email, name, passwordHash, onetimeHash FROM users WHERE email = ?1",
            &email.trim(),
        )
    }

    fn row(&self, sql: &str, key: &dyn rusqlite::ToSql) -> Result<Option<UserRow>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let mut rows = stmt.query([key])?;
            match rows.next()? {
                Some(row) => Ok(Some(UserRow {
                    user: User {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        name: row.get(2)?,
                    },
                    password_hash: row.get(3)?,
                    onetime_hash: row.get(4)?,
                })),
                None => Ok(None),
            }
        })
    }

    // ========================================================================
    // Hook 등록
    // ========================================================================

    /// 리스너 등록: install, authenticate, user_create, user_update, user_fromemail
    pub fn register(self: &Arc<Self>, registry: &mut HookRegistry) {
        let store = self.clone();
        registry.register_default(
            events::INSTALL,
            "user.install",
            handler_fn(move |call: HookInvocation| {
                let store = store.clone();
                async move {
                    let admin = call
                        .args
                        .get(0)
                        .filter(|v| v.is_object())
                        .map(|v| serde_json::from_value::<AdminCredentials>(v.clone()))
                        .transpose()?;
                    store.install(admin.as_ref()).await?;
                    Ok(HookReply::NoResult)
                }
            }),
        );

        let store = self.clone();
        registry.register_default(
            events::AUTHENTICATE,
            "user.authenticate",
            handler_fn(move |call: HookInvocation| {
                let store = store.clone();
                async move {
                    let email = call.args.str_at(0).unwrap_or_default();
                    let password = call.args.str_at(1).unwrap_or_default();
                    let user = store
                        .authenticate(email, password, call.args.str_at(2))
                        .await?;
                    user_reply(user)
                }
            }),
        );

        let store = self.clone();
        registry.register_default(
            events::USER_CREATE,
            "user.create",
            handler_fn(move |call: HookInvocation| {
                let store = store.clone();
                async move {
                    let cols = call.args.object_at(0).cloned().unwrap_or_default();
                    Ok(match store.create(cols).await? {
                        Some(Created {
                            onetime: Some(token),
                            ..
                        }) => HookReply::value(token),
                        Some(Created { id, .. }) => HookReply::value(id),
                        None => HookReply::NoResult,
                    })
                }
            }),
        );

        let store = self.clone();
        registry.register_default(
            events::USER_UPDATE,
            "user.update",
            handler_fn(move |call: HookInvocation| {
                let store = store.clone();
                async move {
                    let Some(id) = call.args.i64_at(0) else {
                        return Err(Error::InvalidInput("user_update: missing id".to_string()));
                    };
                    let cols = call.args.object_at(1).cloned().unwrap_or_default();
                    let updated = store.update(id, cols).await?;

                    if updated.changed {
                        if let Some(user) = store.get(id).await? {
                            let args = HookArgs::new().with(serde_json::to_value(&user)?);
                            call.dispatcher
                                .emit(&call.ctx, events::USER_CHANGED, args)
                                .await;
                        }
                    }

                    Ok(match updated.onetime {
                        Some(token) => HookReply::value(token),
                        None => HookReply::bool(updated.changed),
                    })
                }
            }),
        );

        let store = self.clone();
        registry.register_default(
            events::USER_FROMEMAIL,
            "user.fromemail",
            handler_fn(move |call: HookInvocation| {
                let store = store.clone();
                async move {
                    let email = call.args.str_at(0).unwrap_or_default();
                    user_reply(store.from_email(email).await?)
                }
            }),
        );
    }
}

fn user_reply(user: Option<User>) -> Result<HookReply> {
    match user {
        Some(user) => Ok(HookReply::value(serde_json::to_value(user)?)),
        None => Ok(HookReply::NoResult),
    }
}

fn strip_protected(cols: &mut JsonRow) {
    for key in PROTECTED_COLUMNS {
        cols.remove(*key);
    }
}

fn is_constraint_violation(error: &Error) -> bool {
    matches!(
        error,
        Error::Sqlite(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cols(value: Value) -> JsonRow {
        value.as_object().cloned().unwrap()
    }

    async fn store() -> UserStore {
        let store = UserStore::new(Database::in_memory().unwrap());
        store
            .install(Some(&AdminCredentials {
                email: "admin@example.com".into(),
                password: "s3cret-admin".into(),
            }))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_install_creates_admin_once() {
        let store = store().await;
        let admin = store.get(1).await.unwrap().unwrap();
        assert_eq!(admin.name, ADMIN_NAME);

        store.install(None).await.unwrap();
        assert!(store
            .authenticate("admin@example.com", "s3cret-admin", None)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_install_without_credentials() {
        let store = UserStore::new(Database::in_memory().unwrap());
        store.install(None).await.unwrap();
        assert!(store.get(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_and_authenticate() {
        let store = store().await;
        let created = store
            .create(cols(json!({ "email": "ann@example.com", "password": "hunter22", "name": "Ann" })))
            .await
            .unwrap()
            .unwrap();
        assert!(created.onetime.is_none());

        let user = store
            .authenticate("ann@example.com", "hunter22", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.id, created.id);
        assert!(store
            .authenticate("ann@example.com", "wrong", None)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_none() {
        let store = store().await;
        let first = store.create(cols(json!({ "email": "bob@example.com" }))).await.unwrap();
        let second = store.create(cols(json!({ "email": "bob@example.com" }))).await.unwrap();
        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_protected_columns_ignored() {
        let store = store().await;
        let created = store
            .create(cols(json!({ "id": 1, "email": "eve@example.com", "passwordHash": "x" })))
            .await
            .unwrap()
            .unwrap();
        assert_ne!(created.id, 1);
        assert!(store.authenticate("eve@example.com", "x", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_onetime_login_flow() {
        let store = store().await;
        let created = store
            .create(cols(json!({ "email": "cy@example.com", "password": "password1", "onetime": true })))
            .await
            .unwrap()
            .unwrap();
        let token = created.onetime.unwrap();

        // 토큰 대기 중에는 일반 비밀번호 거부
        assert!(store.authenticate("cy@example.com", "password1", None).await.unwrap().is_none());
        assert!(store
            .authenticate("cy@example.com", "", Some("bad-token"))
            .await
            .unwrap()
            .is_none());

        assert!(store
            .authenticate("cy@example.com", "", Some(&token))
            .await
            .unwrap()
            .is_some());
        // 토큰은 한 번만
        assert!(store
            .authenticate("cy@example.com", "", Some(&token))
            .await
            .unwrap()
            .is_none());
        assert!(store.authenticate("cy@example.com", "password1", None).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_password_rules() {
        let store = store().await;
        let id = store
            .create(cols(json!({ "email": "dee@example.com", "password": "original1" })))
            .await
            .unwrap()
            .unwrap()
            .id;

        // 너무 짧음 → 다른 컬럼이 없으므로 변경 없음
        let short = store
            .update(id, cols(json!({ "newpassword1": "short", "newpassword2": "short" })))
            .await
            .unwrap();
        assert!(!short.changed);

        // 불일치
        store
            .update(id, cols(json!({ "name": "Dee", "newpassword1": "longenough", "newpassword2": "different1" })))
            .await
            .unwrap();
        assert!(store.authenticate("dee@example.com", "original1", None).await.unwrap().is_some());

        let ok = store
            .update(id, cols(json!({ "id": 99, "newpassword1": "longenough", "newpassword2": "longenough" })))
            .await
            .unwrap();
        assert!(ok.changed);
        assert!(store.authenticate("dee@example.com", "longenough", None).await.unwrap().is_some());
        assert_eq!(store.get(id).await.unwrap().unwrap().name, "Dee");
    }

    #[tokio::test]
    async fn test_update_issues_onetime() {
        let store = store().await;
        let updated = store.update(1, cols(json!({ "onetime": true }))).await.unwrap();
        let token = updated.onetime.unwrap();

        assert!(store
            .authenticate("admin@example.com", "", Some(&token))
            .await
            .unwrap()
            .is_some());
    }
}
