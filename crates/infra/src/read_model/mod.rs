//! Tenant-isolated record storage.

pub mod tenant_store;

pub use tenant_store::{InMemoryTenantStore, StoreError, TenantStore};
