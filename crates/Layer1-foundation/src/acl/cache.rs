//! Capability Cache - 세션별 평탄화된 권한 트리
//!
//! `action -> objectType -> objectId` 3단계 트리. 각 단계의 와일드카드는
//! 별도 플래그로 표현하므로 실제 식별자와 충돌하지 않는다.

use super::grant::{Grant, Scope};
use std::collections::{BTreeSet, HashMap};

/// objectType 하나에 대한 id 집합
#[derive(Debug, Clone, Default)]
struct IdSet {
    all: bool,
    ids: BTreeSet<i64>,
}

/// action 하나에 대한 타입별 권한
#[derive(Debug, Clone, Default)]
struct ActionGrants {
    all_types: bool,
    types: HashMap<String, IdSet>,
}

/// 세션 권한 캐시
///
/// 한 번에 전체를 다시 만들고, 부분 갱신은 하지 않는다.
#[derive(Debug, Clone, Default)]
pub struct CapabilityCache {
    unrestricted: bool,
    actions: HashMap<String, ActionGrants>,
}

impl CapabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// grant 목록으로부터 생성
    pub fn from_grants<'a>(grants: impl IntoIterator<Item = &'a Grant>) -> Self {
        let mut cache = Self::new();
        cache.extend(grants);
        cache
    }

    /// grant 하나 추가 (중복은 무시)
    pub fn insert(&mut self, grant: &Grant) {
        let action = match &grant.action {
            Scope::Any => {
                self.unrestricted = true;
                return;
            }
            Scope::Specific(action) => action,
        };

        let entry = self.actions.entry(action.clone()).or_default();
        let object_type = match &grant.object_type {
            Scope::Any => {
                entry.all_types = true;
                return;
            }
            Scope::Specific(object_type) => object_type,
        };

        let ids = entry.types.entry(object_type.clone()).or_default();
        match grant.object_id {
            Scope::Any => ids.all = true,
            Scope::Specific(id) => {
                ids.ids.insert(id);
            }
        }
    }

    pub fn extend<'a>(&mut self, grants: impl IntoIterator<Item = &'a Grant>) {
        for grant in grants {
            self.insert(grant);
        }
    }

    /// 비어있는지 (비어있으면 모든 질의 거부)
    pub fn is_empty(&self) -> bool {
        !self.unrestricted && self.actions.is_empty()
    }

    /// super-admin 권한 보유 여부
    pub fn is_unrestricted(&self) -> bool {
        self.unrestricted
    }

    /// 권한 질의
    ///
    /// 평가 순서 (첫 매칭에서 종료):
    /// 1. `action = *` grant → 허용
    /// 2. action 키 존재 시
    ///    a. objectType `*` → 허용
    ///    b. objectType 키 존재 + (모든 id 또는 해당 id) → 허용
    /// 3. 그 외 거부
    ///
    /// objectType 없이 질의하면 `*` 타입 grant 만 통과하고,
    /// objectId 없이 질의하면 모든-id grant 만 통과한다.
    pub fn allows(&self, action: &str, object_type: Option<&str>, object_id: Option<i64>) -> bool {
        if self.unrestricted {
            return true;
        }

        let Some(grants) = self.actions.get(action) else {
            return false;
        };
        if grants.all_types {
            return true;
        }

        let Some(ids) = object_type.and_then(|t| grants.types.get(t)) else {
            return false;
        };
        ids.all || object_id.is_some_and(|id| ids.ids.contains(&id))
    }

    /// 평탄화된 grant 목록 (정렬된 결과)
    pub fn grants(&self) -> Vec<Grant> {
        let mut grants = Vec::new();
        if self.unrestricted {
            grants.push(Grant::everything());
        }

        let mut actions: Vec<_> = self.actions.iter().collect();
        actions.sort_by(|a, b| a.0.cmp(b.0));

        for (action, entry) in actions {
            if entry.all_types {
                grants.push(Grant::action(action.clone()));
            }

            let mut types: Vec<_> = entry.types.iter().collect();
            types.sort_by(|a, b| a.0.cmp(b.0));

            for (object_type, ids) in types {
                let base = Grant::action(action.clone()).of_type(object_type.clone());
                if ids.all {
                    grants.push(base.clone());
                }
                for id in &ids.ids {
                    grants.push(base.clone().with_id(*id));
                }
            }
        }

        grants
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cache_denies() {
        let cache = CapabilityCache::new();
        assert!(cache.is_empty());
        assert!(!cache.allows("edit", Some("document"), Some(1)));
        assert!(!cache.allows("edit", None, None));
    }

    #[test]
    fn test_unrestricted() {
        let cache = CapabilityCache::from_grants(&[Grant::everything()]);
        assert!(cache.is_unrestricted());
        assert!(cache.allows("anything", Some("any_type"), Some(99)));
        assert!(cache.allows("anything", None, None));
    }

    #[test]
    fn test_all_ids_grant() {
        let cache = CapabilityCache::from_grants(&[Grant::action("edit").of_type("document")]);
        assert!(cache.allows("edit", Some("document"), Some(42)));
        assert!(cache.allows("edit", Some("document"), None));
        assert!(!cache.allows("edit", None, None));
        assert!(!cache.allows("delete", Some("document"), Some(42)));
    }

    #[test]
    fn test_specific_id_grant() {
        let cache =
            CapabilityCache::from_grants(&[Grant::action("edit").of_type("document").with_id(42)]);
        assert!(cache.allows("edit", Some("document"), Some(42)));
        assert!(!cache.allows("edit", Some("document"), Some(43)));
        assert!(!cache.allows("edit", Some("document"), None));
    }

    #[test]
    fn test_any_type_grant_ignores_id() {
        // (edit, *, 42): 타입이 와일드카드면 id 도 암묵적으로 전체
        let cache = CapabilityCache::from_grants(&[Grant::from_row("edit", "*", 42)]);
        assert!(cache.allows("edit", None, None));
        assert!(cache.allows("edit", Some("page"), Some(1)));
    }

    #[test]
    fn test_literal_star_type_is_not_a_wildcard_query() {
        let cache = CapabilityCache::from_grants(&[Grant::action("edit").of_type("document")]);
        assert!(!cache.allows("edit", Some("*"), None));
    }

    #[test]
    fn test_grants_listing_is_deduplicated() {
        let grant = Grant::action("edit").of_type("document").with_id(1);
        let cache = CapabilityCache::from_grants(&[grant.clone(), grant.clone()]);
        assert_eq!(cache.grants(), vec![grant]);
    }
}
