//! Application 통합 테스트 - install → login → can → audit
//!
//! `cargo test -p pyrite-core --test app_flow`

use pyrite_core::{AdminCredentials, Application, HistoryQuery};
use pyrite_foundation::{
    events, handler_fn, Database, Grant, HookArgs, HookContext, HookInvocation, HookReply,
    PyriteConfig, RequestInfo, SessionPhase,
};
use serde_json::{json, Value};
use std::sync::Arc;

const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "admin-password";

async fn app_with(config: PyriteConfig) -> Application {
    let app = Application::builder(config)
        .database(Database::in_memory().expect("in-memory db"))
        .build()
        .expect("build");
    app.install(Some(AdminCredentials::new(ADMIN_EMAIL, ADMIN_PASSWORD)))
        .await
        .expect("install");
    app
}

async fn app() -> Application {
    app_with(PyriteConfig::default()).await
}

async fn create_user(app: &Application, email: &str, password: &str) -> i64 {
    let cols = json!({ "email": email, "name": "Tester", "password": password });
    app.hooks()
        .chain_first(
            &HookContext::detached(),
            events::USER_CREATE,
            HookArgs::new().with(cols),
        )
        .await
        .and_then(|v| v.as_i64())
        .expect("user id")
}

#[tokio::test]
async fn test_install_is_idempotent() {
    let app = app().await;
    app.install(None).await.unwrap();

    let admin = app.users().get(1).await.unwrap().unwrap();
    assert_eq!(admin.email, ADMIN_EMAIL);

    let installed = app
        .audit()
        .history(&HistoryQuery::new().action("installed"))
        .await
        .unwrap();
    assert_eq!(installed.len(), 2);
}

#[tokio::test]
async fn test_admin_login_and_logout() {
    let app = app().await;
    let session = app.start_session().await;
    assert!(!app.can(&session, "view", None, None).await);

    assert!(app.login(&session, ADMIN_EMAIL, ADMIN_PASSWORD, None).await);
    assert_eq!(session.user_id(), Some(1));
    assert_eq!(session.phase(), SessionPhase::Ready);
    assert!(app.can(&session, "delete", Some("user"), Some(5)).await);

    app.logout(&session).await;
    assert!(!session.is_identified());
    assert!(!app.can(&session, "delete", Some("user"), Some(5)).await);
}

#[tokio::test]
async fn test_wrong_password_rejected() {
    let app = app().await;
    let session = app.start_session().await;

    assert!(!app.login(&session, ADMIN_EMAIL, "nope", None).await);
    assert!(!app.login(&session, "ghost@example.com", ADMIN_PASSWORD, None).await);
    assert!(!session.is_identified());
}

#[tokio::test]
async fn test_grant_audit_and_invalidate() {
    let app = app().await;
    let user_id = create_user(&app, "editor@example.com", "editor-password").await;

    let admin = app.start_session().await;
    assert!(app.login(&admin, ADMIN_EMAIL, ADMIN_PASSWORD, None).await);

    let editor = app.start_session().await;
    assert!(app.login(&editor, "editor@example.com", "editor-password", None).await);
    assert!(!app.can(&editor, "publish", Some("article"), Some(99)).await);

    let grant = Grant::action("publish").of_type("article");
    let changed = app
        .acl()
        .grant_user(app.hooks(), &app.context(&admin), user_id, &grant)
        .await
        .unwrap();
    assert!(changed);

    // 기본 설정은 명시적 무효화 전까지 기존 캐시 유지
    assert!(!app.can(&editor, "publish", Some("article"), Some(99)).await);
    app.acl().invalidate(&editor);
    assert!(app.can(&editor, "publish", Some("article"), Some(99)).await);

    let entries = app
        .audit()
        .history(&HistoryQuery::new().object("user", Some(user_id)))
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, "acl_grant");
    assert_eq!(entries[0].user_id, 1);
    assert_eq!(entries[0].new_value.as_deref(), Some(grant.to_string().as_str()));
}

#[tokio::test]
async fn test_invalidate_on_change_config() {
    let mut config = PyriteConfig::default();
    config.acl.invalidate_on_change = true;
    let app = app_with(config).await;
    let user_id = create_user(&app, "editor@example.com", "editor-password").await;

    let editor = app.start_session().await;
    assert!(app.login(&editor, "editor@example.com", "editor-password", None).await);

    app.acl()
        .add_user_role(app.hooks(), &app.context(&editor), user_id, "admin")
        .await
        .unwrap();
    assert!(app.can(&editor, "anything", None, None).await);
}

#[tokio::test]
async fn test_onetime_login_consumed() {
    let app = app().await;
    let token = app
        .hooks()
        .chain_first(
            &HookContext::detached(),
            events::USER_CREATE,
            HookArgs::new().with(json!({ "email": "new@example.com", "onetime": true })),
        )
        .await
        .and_then(|v| v.as_str().map(str::to_string))
        .expect("token");

    let session = app.start_session().await;
    assert!(!app.login(&session, "new@example.com", "", None).await);
    assert!(app.login(&session, "new@example.com", "", Some(&token)).await);

    app.logout(&session).await;
    assert!(!app.login(&session, "new@example.com", "", Some(&token)).await);
}

#[tokio::test]
async fn test_duplicate_user_yields_no_result() {
    let app = app().await;
    create_user(&app, "dup@example.com", "dup-password").await;

    let second = app
        .hooks()
        .chain_first(
            &HookContext::detached(),
            events::USER_CREATE,
            HookArgs::new().with(json!({ "email": "dup@example.com" })),
        )
        .await;
    assert!(second.is_none());
}

#[tokio::test]
async fn test_request_routing() {
    let seen = Arc::new(parking_lot::Mutex::new(Vec::<Value>::new()));
    let routes = seen.clone();
    let statuses = seen.clone();

    let app = Application::builder(PyriteConfig::default())
        .database(Database::in_memory().unwrap())
        .listeners(move |registry| {
            registry.register_default(
                "route/hello",
                "test.hello",
                handler_fn(move |call: HookInvocation| {
                    routes.lock().push(json!({ "route": call.args.get(0).cloned() }));
                    async move { Ok(HookReply::bool(true)) }
                }),
            );
            registry.register_default(
                events::HTTP_STATUS,
                "test.status",
                handler_fn(move |call: HookInvocation| {
                    statuses.lock().push(json!({ "status": call.args.get(0).cloned() }));
                    async move { Ok(HookReply::NoResult) }
                }),
            );
            Ok(())
        })
        .build()
        .unwrap();
    app.install(None).await.unwrap();

    let session = app.start_session().await;
    app.handle(&session, RequestInfo::new("/hello/world")).await;
    app.handle(&session, RequestInfo::new("/missing")).await;

    assert_eq!(
        *seen.lock(),
        vec![
            json!({ "route": ["world"] }),
            json!({ "status": 404 }),
        ]
    );
}

#[tokio::test]
async fn test_on_disk_database_persists() {
    let dir = tempfile::tempdir().unwrap();
    let config = PyriteConfig::default().database_path(dir.path().join("data").join("pyrite.db"));

    {
        let app = Application::builder(config.clone()).build().unwrap();
        app.install(Some(AdminCredentials::new(ADMIN_EMAIL, ADMIN_PASSWORD)))
            .await
            .unwrap();
        create_user(&app, "kept@example.com", "kept-password").await;
    }

    let app = Application::builder(config).build().unwrap();
    app.install(None).await.unwrap();
    let kept = app.users().from_email("kept@example.com").await.unwrap();
    assert!(kept.is_some());

    let session = app.start_session().await;
    assert!(app.login(&session, ADMIN_EMAIL, ADMIN_PASSWORD, None).await);
}
