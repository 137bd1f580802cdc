//! Session listeners - 로그인 / 로그아웃
//!
//! `login` 은 `authenticate` 로 사용자를 찾고, 성공하면 세션에 신원을
//! 연결한 뒤 `newuser` 를 발생시킨다 (ACL 캐시 재빌드).

use super::store::User;
use pyrite_foundation::{
    events, handler_fn, HookInvocation, HookRegistry, HookReply, DEFAULT_PRIORITY,
};
use tracing::{debug, info};

/// `logout` 에서 신원 제거는 ACL 무효화 이후에 실행
pub const LOGOUT_PRIORITY: i32 = DEFAULT_PRIORITY + 10;

/// 리스너 등록: login, logout
pub fn register(registry: &mut HookRegistry) {
    registry.register_default(
        events::LOGIN,
        "session.login",
        handler_fn(|call: HookInvocation| async move {
            let Some(session) = call.ctx.session().cloned() else {
                debug!("Login without session");
                return Ok(HookReply::bool(false));
            };

            let found = call
                .dispatcher
                .chain_first(&call.ctx, events::AUTHENTICATE, call.args.clone())
                .await;
            let user = match found {
                Some(value) if value.is_object() => serde_json::from_value::<User>(value)?,
                _ => {
                    debug!(session_id = %session.id(), "Login rejected");
                    return Ok(HookReply::bool(false));
                }
            };

            info!(session_id = %session.id(), user_id = user.id, "User logged in");
            let reply = HookReply::value(serde_json::to_value(&user)?);
            session.identify(user.into());
            call.dispatcher
                .emit(&call.ctx, events::NEWUSER, Default::default())
                .await;
            Ok(reply)
        }),
    );

    registry.register(
        events::LOGOUT,
        "session.logout",
        LOGOUT_PRIORITY,
        handler_fn(|call: HookInvocation| async move {
            if let Some(session) = call.ctx.session() {
                info!(session_id = %session.id(), user_id = ?session.user_id(), "User logged out");
                session.clear_identity();
            }
            Ok(HookReply::NoResult)
        }),
    );
}
