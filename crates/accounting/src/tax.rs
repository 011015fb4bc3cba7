use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockval_core::{AggregateId, DomainError, DomainResult};

/// Tax identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxId(pub AggregateId);

impl TaxId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for TaxId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// How a tax amount is derived from a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum TaxRate {
    /// Fraction of the line base (`0.21` for 21%).
    Percentage(Decimal),
    /// Fixed amount per unit.
    Fixed(Decimal),
}

/// Which side of the books the taxed document lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxType {
    Invoice,
    CreditNote,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tax {
    pub id: TaxId,
    pub name: String,
    pub rate: TaxRate,
}

impl Tax {
    pub fn percentage(name: impl Into<String>, rate: Decimal) -> Self {
        Self {
            id: TaxId::new(AggregateId::new()),
            name: name.into(),
            rate: TaxRate::Percentage(rate),
        }
    }

    pub fn fixed(name: impl Into<String>, amount: Decimal) -> Self {
        Self {
            id: TaxId::new(AggregateId::new()),
            name: name.into(),
            rate: TaxRate::Fixed(amount),
        }
    }
}

/// One tax applied to one line, unrounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedTax {
    pub tax: TaxId,
    pub base: Decimal,
    pub amount: Decimal,
}

/// Tax computation routine.
///
/// The full engine (child taxes, tax rules, price-included taxes) belongs to
/// the accounting system; valuation only needs this seam.
pub trait TaxEngine: Send + Sync {
    fn compute(
        &self,
        taxes: &[Tax],
        unit_price: Decimal,
        quantity: Decimal,
    ) -> DomainResult<Vec<ComputedTax>>;
}

/// Flat percentage/fixed taxes, each computed on the untaxed line base.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardTaxEngine;

impl TaxEngine for StandardTaxEngine {
    fn compute(
        &self,
        taxes: &[Tax],
        unit_price: Decimal,
        quantity: Decimal,
    ) -> DomainResult<Vec<ComputedTax>> {
        let base = unit_price
            .checked_mul(quantity)
            .ok_or_else(|| DomainError::overflow(format!("tax base {unit_price} x {quantity}")))?;
        taxes
            .iter()
            .map(|tax| -> DomainResult<ComputedTax> {
                let amount = match tax.rate {
                    TaxRate::Percentage(rate) => base.checked_mul(rate),
                    TaxRate::Fixed(per_unit) => per_unit.checked_mul(quantity),
                }
                .ok_or_else(|| DomainError::overflow(format!("tax {} on {base}", tax.name)))?;
                Ok(ComputedTax {
                    tax: tax.id,
                    base,
                    amount,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn percentage_applies_to_line_base() {
        let vat = Tax::percentage("VAT 21%", d("0.21"));
        let lines = StandardTaxEngine
            .compute(&[vat.clone()], d("10.00"), d("3"))
            .unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].tax, vat.id);
        assert_eq!(lines[0].base, d("30.00"));
        assert_eq!(lines[0].amount, d("6.30"));
    }

    #[test]
    fn fixed_tax_scales_with_quantity_only() {
        let eco = Tax::fixed("Eco fee", d("0.50"));
        let lines = StandardTaxEngine.compute(&[eco], d("99.99"), d("4")).unwrap();
        assert_eq!(lines[0].amount, d("2.00"));
    }

    #[test]
    fn no_taxes_no_lines() {
        assert!(StandardTaxEngine.compute(&[], d("1"), d("1")).unwrap().is_empty());
    }

    #[test]
    fn oversized_base_is_an_error() {
        let vat = Tax::percentage("VAT", d("0.21"));
        let err = StandardTaxEngine
            .compute(&[vat], Decimal::MAX, d("2"))
            .unwrap_err();
        assert!(matches!(err, DomainError::Overflow(_)));
    }
}
