use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use stockval_core::TenantId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record store lock poisoned")]
    Poisoned,
}

/// Tenant-isolated map of records keyed by record identifier.
pub trait TenantStore<K, V>: Send + Sync {
    fn get(&self, tenant_id: TenantId, key: &K) -> Result<Option<V>, StoreError>;

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) -> Result<(), StoreError>;
}

impl<K, V, S> TenantStore<K, V> for Arc<S>
where
    S: TenantStore<K, V> + ?Sized,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Result<Option<V>, StoreError> {
        (**self).get(tenant_id, key)
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) -> Result<(), StoreError> {
        (**self).upsert(tenant_id, key, value)
    }
}

/// In-memory store for tests and the command-line tool.
#[derive(Debug)]
pub struct InMemoryTenantStore<K, V> {
    inner: RwLock<HashMap<(TenantId, K), V>>,
}

impl<K, V> InMemoryTenantStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryTenantStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TenantStore<K, V> for InMemoryTenantStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Result<Option<V>, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map.get(&(tenant_id, key.clone())).cloned())
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        map.insert((tenant_id, key), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenants_do_not_see_each_other() {
        let store = InMemoryTenantStore::<u32, &'static str>::new();
        let a = TenantId::new();
        let b = TenantId::new();

        store.upsert(a, 1, "a-one").unwrap();
        store.upsert(b, 1, "b-one").unwrap();

        assert_eq!(store.get(a, &1).unwrap(), Some("a-one"));
        assert_eq!(store.get(b, &1).unwrap(), Some("b-one"));
        assert_eq!(store.get(TenantId::new(), &1).unwrap(), None);
    }

    #[test]
    fn upsert_replaces_the_stored_value() {
        let store = InMemoryTenantStore::<u32, u32>::new();
        let t = TenantId::new();

        store.upsert(t, 7, 1).unwrap();
        store.upsert(t, 7, 2).unwrap();
        assert_eq!(store.get(t, &7).unwrap(), Some(2));
        assert_eq!(store.get(t, &8).unwrap(), None);
    }
}
