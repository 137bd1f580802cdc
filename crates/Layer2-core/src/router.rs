//! Router - 경로를 `route/<base>` 이벤트로 연결
//!
//! `/a/b/c` 는 `route/a+b` 가 등록되어 있으면 그쪽으로 (나머지 `[c]`),
//! 아니면 `route/a` (나머지 `[b, c]`) 로 간다. 빈 경로는 `route/main`.
//! 대상이 없으면 `http_status(404)`, 라우트가 거부하면 `http_status(500)`.

use pyrite_foundation::{
    events, handler_fn, Dispatcher, HookArgs, HookContext, HookInvocation, HookRegistry,
    HookReply,
};
use serde_json::Value;
use tracing::debug;

/// `startup` 리스너 우선순위 (다른 startup 작업 이후)
pub const STARTUP_PRIORITY: i32 = 50;

/// 해석된 라우트
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// `a` 또는 `a+b`
    pub base: String,
    /// base 이후 경로 조각
    pub rest: Vec<String>,
}

impl Route {
    /// 이벤트 이름
    pub fn event(&self) -> String {
        events::route(&self.base)
    }
}

/// 경로 조각 (앞쪽 빈 조각 제거)
pub fn segments(path: &str) -> Vec<String> {
    path.split('/')
        .skip_while(|s| s.is_empty())
        .map(str::to_string)
        .collect()
}

/// 경로 해석. 대상이 없으면 404 를 emit 하고 `None`.
pub async fn resolve(hooks: &Dispatcher, ctx: &HookContext, path: &str) -> Option<Route> {
    let parts = segments(path);
    let pair = (parts.len() >= 2).then(|| format!("{}+{}", parts[0], parts[1]));

    let route = if let Some(base) = pair.filter(|b| hooks.has_listeners(&events::route(b))) {
        Some(Route {
            base,
            rest: parts[2..].to_vec(),
        })
    } else if let Some(first) = parts.first() {
        hooks.has_listeners(&events::route(first)).then(|| Route {
            base: first.clone(),
            rest: parts[1..].to_vec(),
        })
    } else {
        hooks
            .has_listeners(&events::route(events::ROUTE_MAIN))
            .then(|| Route {
                base: events::ROUTE_MAIN.to_string(),
                rest: Vec::new(),
            })
    };

    if route.is_none() {
        debug!(path = %path, "No route");
        hooks
            .emit(ctx, events::HTTP_STATUS, HookArgs::new().with(404))
            .await;
    }
    route
}

/// 라우트 실행. 실패하면 500 을 emit 하고 false.
pub async fn run(hooks: &Dispatcher, ctx: &HookContext, route: &Route) -> bool {
    let rest: Vec<Value> = route.rest.iter().cloned().map(Value::String).collect();
    let ok = hooks
        .chain_all(ctx, &route.event(), HookArgs::new().with(rest))
        .await;

    if !ok {
        debug!(route = %route.base, "Route failed");
        hooks
            .emit(ctx, events::HTTP_STATUS, HookArgs::new().with(500))
            .await;
    }
    ok
}

/// 해석 + 실행
pub async fn dispatch(hooks: &Dispatcher, ctx: &HookContext, path: &str) -> bool {
    match resolve(hooks, ctx, path).await {
        Some(route) => run(hooks, ctx, &route).await,
        None => false,
    }
}

/// `startup` 에서 요청 경로를 라우팅하도록 등록
pub fn register(registry: &mut HookRegistry) {
    registry.register(
        events::STARTUP,
        "router.startup",
        STARTUP_PRIORITY,
        handler_fn(|call: HookInvocation| async move {
            let Some(path) = call.ctx.request().map(|r| r.path.clone()) else {
                return Ok(HookReply::NoResult);
            };
            dispatch(&call.dispatcher, &call.ctx, &path).await;
            Ok(HookReply::NoResult)
        }),
    );
}
