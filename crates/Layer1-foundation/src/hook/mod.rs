//! Hook - 이벤트 레지스트리와 dispatch
//!
//! - `events` - 이벤트 이름 카탈로그 및 검증
//! - `types` - 인자/응답/컨텍스트/handler
//! - `registry` - 초기화 단계 listener 등록
//! - `dispatcher` - emit / chain_all / chain_first

pub mod events;
mod dispatcher;
mod registry;
mod types;

pub use dispatcher::Dispatcher;
pub use registry::{HookRegistry, DEFAULT_PRIORITY};
pub use types::{
    handler_fn, is_truthy, HookArgs, HookContext, HookHandler, HookInvocation, HookReply,
    ListenerId, ListenerInfo, RequestInfo,
};
