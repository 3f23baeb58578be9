//! Cache of resolved policies keyed by `(data source, role set)`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tessera_core::{DataSourceId, RoleSet};

use crate::resolver::EffectivePolicy;

type Key = (DataSourceId, RoleSet);

/// Resolved policies, shared across requests.
///
/// Entries never expire on their own; whoever changes the catalog calls
/// [`invalidate_all`](Self::invalidate_all) or
/// [`invalidate_data_source`](Self::invalidate_data_source).
#[derive(Debug, Default)]
pub struct PolicyCache {
    enabled: bool,
    entries: RwLock<HashMap<Key, Arc<EffectivePolicy>>>,
}

impl PolicyCache {
    /// A disabled cache stores nothing and never hits.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn get(&self, data_source: DataSourceId, roles: &RoleSet) -> Option<Arc<EffectivePolicy>> {
        if !self.enabled {
            return None;
        }
        let entries = self.entries.read().ok()?;
        entries.get(&(data_source, roles.clone())).cloned()
    }

    pub fn insert(&self, policy: Arc<EffectivePolicy>) {
        if !self.enabled {
            return;
        }
        if let Ok(mut entries) = self.entries.write() {
            entries.insert((policy.data_source, policy.roles.clone()), policy);
        }
    }

    pub fn invalidate_data_source(&self, data_source: DataSourceId) {
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|(ds, _), _| *ds != data_source);
            tracing::debug!(data_source = %data_source, "Policy cache invalidated for data source");
        }
    }

    pub fn invalidate_all(&self) {
        if let Ok(mut entries) = self.entries.write() {
            let dropped = entries.len();
            entries.clear();
            tracing::debug!(dropped, "Policy cache cleared");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn policy(ds: i64, roles: &[&str]) -> Arc<EffectivePolicy> {
        Arc::new(EffectivePolicy {
            data_source: DataSourceId(ds),
            roles: roles.iter().copied().collect(),
            tables: vec![],
            columns: vec![],
            filters: BTreeMap::new(),
        })
    }

    #[test]
    fn test_get_after_insert() {
        let cache = PolicyCache::new(true);
        cache.insert(policy(1, &["sales"]));

        let roles: RoleSet = ["sales"].into_iter().collect();
        assert!(cache.get(DataSourceId(1), &roles).is_some());
        assert!(cache.get(DataSourceId(2), &roles).is_none());
        assert!(cache.get(DataSourceId(1), &RoleSet::new()).is_none());
    }

    #[test]
    fn test_invalidate_data_source_keeps_others() {
        let cache = PolicyCache::new(true);
        cache.insert(policy(1, &["sales"]));
        cache.insert(policy(1, &["finance"]));
        cache.insert(policy(2, &["sales"]));

        cache.invalidate_data_source(DataSourceId(1));
        assert_eq!(cache.len(), 1);

        cache.invalidate_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_disabled_cache_never_hits() {
        let cache = PolicyCache::new(false);
        cache.insert(policy(1, &[]));
        assert!(cache.get(DataSourceId(1), &RoleSet::new()).is_none());
        assert_eq!(cache.len(), 0);
    }
}
