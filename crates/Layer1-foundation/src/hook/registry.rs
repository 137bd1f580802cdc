//! Hook Registry - 초기화 단계의 listener 테이블
//!
//! 모듈들은 초기화 단계에서 `HookRegistry` 에 listener 를 등록하고,
//! `freeze` 로 불변 `Dispatcher` 를 얻는다. freeze 이후에는 등록이 불가능하다.

use super::dispatcher::Dispatcher;
use super::events;
use super::types::{HookHandler, ListenerId, ListenerInfo};
use crate::config::DispatchConfig;
use crate::{Error, Result};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// 기본 우선순위
pub const DEFAULT_PRIORITY: i32 = 10;

/// 등록된 listener
#[derive(Clone)]
pub(crate) struct Listener {
    pub(crate) id: ListenerId,
    pub(crate) name: String,
    pub(crate) priority: i32,
    pub(crate) handler: Arc<dyn HookHandler>,
}

impl Listener {
    pub(crate) fn info(&self) -> ListenerInfo {
        ListenerInfo {
            id: self.id,
            name: self.name.clone(),
            priority: self.priority,
        }
    }
}

/// 이벤트 이름 → 우선순위 정렬된 listener 목록
pub(crate) type ListenerTable = HashMap<String, Vec<Listener>>;

/// 이벤트별 listener 레지스트리
#[derive(Default)]
pub struct HookRegistry {
    listeners: ListenerTable,
    /// 카탈로그 외에 허용할 이벤트 이름
    declared: BTreeSet<String>,
    next_id: u64,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// listener 등록
    ///
    /// 우선순위가 낮을수록 먼저 실행되며, 같은 우선순위는 등록 순서를 유지한다.
    /// 같은 handler 를 여러 번 등록해도 모두 실행된다.
    pub fn register(
        &mut self,
        event: impl Into<String>,
        name: impl Into<String>,
        priority: i32,
        handler: Arc<dyn HookHandler>,
    ) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId::new(self.next_id);
        let event = event.into();
        let listener = Listener {
            id,
            name: name.into(),
            priority,
            handler,
        };

        debug!(event = %event, listener = %listener.name, priority, id = %id, "Listener registered");

        let list = self.listeners.entry(event).or_default();
        // 같은 우선순위의 마지막 뒤에 삽입 (stable)
        let pos = list.partition_point(|l| l.priority <= priority);
        list.insert(pos, listener);
        id
    }

    /// 기본 우선순위로 등록
    pub fn register_default(
        &mut self,
        event: impl Into<String>,
        name: impl Into<String>,
        handler: Arc<dyn HookHandler>,
    ) -> ListenerId {
        self.register(event, name, DEFAULT_PRIORITY, handler)
    }

    /// 등록 해제
    pub fn unregister(&mut self, id: ListenerId) -> bool {
        let mut removed = false;
        self.listeners.retain(|_, list| {
            let before = list.len();
            list.retain(|l| l.id != id);
            removed |= list.len() != before;
            !list.is_empty()
        });
        removed
    }

    /// 카탈로그에 없는 이벤트 이름 선언 (애플리케이션 고유 이벤트)
    pub fn declare_event(&mut self, event: impl Into<String>) -> Result<()> {
        let event = event.into();
        events::validate_syntax(&event)?;
        self.declared.insert(event);
        Ok(())
    }

    /// 이벤트의 listener 목록 (실행 순서). 모르는 이벤트면 빈 목록.
    pub fn listeners_for(&self, event: &str) -> Vec<ListenerInfo> {
        self.listeners
            .get(event)
            .map(|list| list.iter().map(Listener::info).collect())
            .unwrap_or_default()
    }

    pub fn has_listeners(&self, event: &str) -> bool {
        self.listeners.get(event).is_some_and(|list| !list.is_empty())
    }

    /// 등록된 이벤트 이름 (정렬)
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.listeners.keys().cloned().collect();
        names.sort();
        names
    }

    /// 전체 listener 수
    pub fn len(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// 이벤트 이름 검증
    fn validate(&self, config: &DispatchConfig) -> Result<()> {
        for event in self.listeners.keys() {
            events::validate_syntax(event)?;

            if events::is_known(event) || self.declared.contains(event) {
                continue;
            }

            if config.strict_event_names {
                return Err(Error::InvalidEvent(format!("unknown event '{}'", event)));
            }
            warn!(event = %event, "Listener registered for unknown event name");
        }
        Ok(())
    }

    /// 초기화 단계 종료
    ///
    /// 이벤트 이름을 검증한 뒤 listener 테이블을 불변으로 만든다.
    pub fn freeze(self, config: DispatchConfig) -> Result<Dispatcher> {
        self.validate(&config)?;

        debug!(
            events = self.listeners.len(),
            listeners = self.len(),
            "Hook registry frozen"
        );

        Ok(Dispatcher::new(self.listeners, config))
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("events", &self.event_names())
            .field("listeners", &self.len())
            .finish()
    }
}
