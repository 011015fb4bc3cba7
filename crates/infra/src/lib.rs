//! Infrastructure layer: record storage, the shipment service wiring the
//! valuation rules to lifecycle transitions, and settings.

pub mod read_model;
pub mod settings;
pub mod shipment_service;

pub use read_model::{InMemoryTenantStore, StoreError, TenantStore};
pub use settings::{Settings, SettingsError};
pub use shipment_service::{SHIPMENT_AGGREGATE_TYPE, ServiceError, ShipmentService};
