//! `stockval-core`: domain foundation building blocks.
//!
//! Pure domain primitives shared by the stock and accounting crates
//! (no infrastructure concerns).

pub mod aggregate;
pub mod currency;
pub mod entity;
pub mod error;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot};
pub use currency::Currency;
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, TenantId};
