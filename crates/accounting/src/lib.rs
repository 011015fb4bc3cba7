//! Accounting collaborators needed to value stock: taxes and the taxable
//! mixin that groups them per document.
//!
//! Deterministic domain logic only (no IO).

pub mod tax;
pub mod taxable;

pub use tax::{ComputedTax, StandardTaxEngine, Tax, TaxEngine, TaxId, TaxRate, TaxType};
pub use taxable::{TaxGroup, TaxKey, TaxRounding, Taxable, TaxableLine};
