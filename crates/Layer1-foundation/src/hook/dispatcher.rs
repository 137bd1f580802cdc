//! Hook Dispatcher - 세 가지 호출 방식
//!
//! - `emit`: 브로드캐스트. 반환값 무시, 실패한 listener 는 로그만 남기고 계속.
//! - `chain_all`: 게이트. 첫 거부에서 중단하며 실패는 거부로 취급 (fail-closed).
//! - `chain_first`: 값 해석. 첫 번째 `Value` 응답을 반환.
//!
//! listener 는 항상 우선순위 순서대로 하나씩 실행된다. 병렬 실행은 없다.

use super::registry::{Listener, ListenerTable};
use super::types::{HookArgs, HookContext, HookInvocation, HookReply, ListenerInfo};
use crate::config::DispatchConfig;
use crate::{Error, Result};
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, trace, warn};

struct DispatcherInner {
    listeners: ListenerTable,
    config: DispatchConfig,
}

/// 불변 listener 테이블 위의 dispatcher
///
/// `HookRegistry::freeze` 로만 만들어지며, clone 은 같은 테이블을 공유한다.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    pub(crate) fn new(listeners: ListenerTable, config: DispatchConfig) -> Self {
        Self {
            inner: Arc::new(DispatcherInner { listeners, config }),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.inner.config
    }

    // ========================================================================
    // 조회
    // ========================================================================

    /// 이벤트의 listener 목록 (실행 순서). 모르는 이벤트면 빈 목록.
    pub fn listeners_for(&self, event: &str) -> Vec<ListenerInfo> {
        self.listeners(event).iter().map(Listener::info).collect()
    }

    pub fn has_listeners(&self, event: &str) -> bool {
        !self.listeners(event).is_empty()
    }

    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.inner.listeners.keys().cloned().collect();
        names.sort();
        names
    }

    fn listeners(&self, event: &str) -> &[Listener] {
        self.inner
            .listeners
            .get(event)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    // ========================================================================
    // 호출 방식
    // ========================================================================

    /// 모든 listener 호출, 반환값 무시
    pub async fn emit(&self, ctx: &HookContext, event: &str, args: HookArgs) {
        if let Err(e) = self.check_depth(ctx, event) {
            warn!(error = %e, "Listeners skipped");
            return;
        }

        for listener in self.listeners(event) {
            if let Err(e) = self.invoke(listener, ctx, event, &args).await {
                log_failure(event, listener, &e);
            }
        }
    }

    /// 모든 listener 가 허용해야 true
    ///
    /// - listener 가 없으면 true
    /// - falsy 값 (`false`, `null`, `0`, `""`) 에서 즉시 false
    /// - `NoResult` 는 기권 (체인 계속)
    /// - 에러/타임아웃/패닉은 false
    pub async fn chain_all(&self, ctx: &HookContext, event: &str, args: HookArgs) -> bool {
        if let Err(e) = self.check_depth(ctx, event) {
            warn!(error = %e, "Chain denied");
            return false;
        }

        for listener in self.listeners(event) {
            match self.invoke(listener, ctx, event, &args).await {
                Ok(reply) if reply.is_falsy() => {
                    debug!(event = %event, listener = %listener.name, "Chain denied");
                    return false;
                }
                Ok(_) => {}
                Err(e) => {
                    log_failure(event, listener, &e);
                    return false;
                }
            }
        }
        true
    }

    /// 첫 번째 값 응답 반환
    ///
    /// `NoResult` 와 실패한 listener 는 건너뛴다. 모두 건너뛰면 `None`.
    /// `legacy_false_passes` 설정 시 `false` 값도 건너뛴다.
    pub async fn chain_first(
        &self,
        ctx: &HookContext,
        event: &str,
        args: HookArgs,
    ) -> Option<Value> {
        if let Err(e) = self.check_depth(ctx, event) {
            warn!(error = %e, "Listeners skipped");
            return None;
        }

        let legacy = self.inner.config.legacy_false_passes;
        for listener in self.listeners(event) {
            match self.invoke(listener, ctx, event, &args).await {
                Ok(HookReply::NoResult) => {}
                Ok(HookReply::Value(Value::Bool(false))) if legacy => {}
                Ok(HookReply::Value(value)) => return Some(value),
                Err(e) => log_failure(event, listener, &e),
            }
        }
        None
    }

    /// 권한 질의 (`chain_first("can", ...)`)
    ///
    /// 명시적인 `true` 만 허용한다. 응답이 없거나 다른 값이면 거부.
    pub async fn can(
        &self,
        ctx: &HookContext,
        action: &str,
        object_type: Option<&str>,
        object_id: Option<i64>,
    ) -> bool {
        let args = HookArgs::new()
            .with(action)
            .with_opt(object_type)
            .with_opt(object_id);

        let allowed = matches!(
            self.chain_first(ctx, super::events::CAN, args).await,
            Some(Value::Bool(true))
        );

        trace!(
            action = %action,
            object_type = ?object_type,
            object_id = ?object_id,
            user_id = ?ctx.user_id(),
            allowed,
            "can"
        );
        allowed
    }

    // ========================================================================
    // 내부
    // ========================================================================

    fn check_depth(&self, ctx: &HookContext, event: &str) -> Result<()> {
        let max = self.inner.config.max_depth;
        if ctx.depth() < max {
            return Ok(());
        }
        Err(Error::DepthExceeded {
            event: event.to_string(),
            depth: ctx.depth(),
            max,
        })
    }

    /// listener 하나 실행 (타임아웃 + 패닉 포착)
    async fn invoke(
        &self,
        listener: &Listener,
        ctx: &HookContext,
        event: &str,
        args: &HookArgs,
    ) -> Result<HookReply> {
        let call = HookInvocation {
            event: event.to_string(),
            dispatcher: self.clone(),
            ctx: ctx.nested(),
            args: args.clone(),
        };

        trace!(event = %event, listener = %listener.name, id = %listener.id, "Invoking listener");

        let timeout = self.inner.config.listener_timeout();
        let fut = AssertUnwindSafe(listener.handler.handle(call)).catch_unwind();

        match tokio::time::timeout(timeout, fut).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(Error::listener(
                event,
                listener.name.clone(),
                format!("panicked: {}", panic_message(panic.as_ref())),
            )),
            Err(_) => Err(Error::listener(
                event,
                listener.name.clone(),
                format!("timed out after {}ms", timeout.as_millis()),
            )),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("events", &self.event_names())
            .field("config", &self.inner.config)
            .finish()
    }
}

fn log_failure(event: &str, listener: &Listener, error: &Error) {
    warn!(
        event = %event,
        listener = %listener.name,
        id = %listener.id,
        error = %error,
        "Listener failed"
    );
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
