//! Taxable mixin: turns a document's lines into grouped tax totals.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockval_core::{Currency, DomainError, DomainResult};

use crate::tax::{Tax, TaxEngine, TaxId, TaxType};

/// When tax amounts are rounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxRounding {
    /// Sum unrounded line taxes, round each group once.
    #[default]
    Document,
    /// Round every line's base and amount before summing.
    Line,
}

/// Input line of a taxable document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxableLine {
    pub taxes: Vec<Tax>,
    pub unit_price: Decimal,
    pub quantity: Decimal,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaxKey {
    pub tax: TaxId,
    pub tax_type: TaxType,
}

/// Accumulated base and amount for one tax on one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxGroup {
    pub tax: TaxId,
    pub tax_type: TaxType,
    pub base: Decimal,
    pub amount: Decimal,
}

pub trait Taxable {
    fn taxable_lines(&self) -> Vec<TaxableLine>;

    fn tax_type(&self) -> TaxType;

    /// Currency used to round tax lines; `None` leaves them unrounded.
    fn tax_currency(&self) -> Option<Currency>;

    /// Compute every line's taxes and group them by tax and tax type.
    fn taxes(
        &self,
        engine: &dyn TaxEngine,
        rounding: TaxRounding,
    ) -> DomainResult<BTreeMap<TaxKey, TaxGroup>> {
        let currency = self.tax_currency();
        let round = |value: Decimal| match &currency {
            Some(c) => c.round(value),
            None => Ok(value),
        };
        let tax_type = self.tax_type();

        let mut groups: BTreeMap<TaxKey, TaxGroup> = BTreeMap::new();
        for line in self.taxable_lines() {
            for computed in engine.compute(&line.taxes, line.unit_price, line.quantity)? {
                let (base, amount) = match rounding {
                    TaxRounding::Line => (round(computed.base)?, round(computed.amount)?),
                    TaxRounding::Document => (computed.base, computed.amount),
                };
                let key = TaxKey {
                    tax: computed.tax,
                    tax_type,
                };
                match groups.get_mut(&key) {
                    Some(group) => {
                        group.base = checked_add(group.base, base)?;
                        group.amount = checked_add(group.amount, amount)?;
                    }
                    None => {
                        groups.insert(
                            key,
                            TaxGroup {
                                tax: computed.tax,
                                tax_type,
                                base,
                                amount,
                            },
                        );
                    }
                }
            }
        }

        if rounding == TaxRounding::Document {
            for group in groups.values_mut() {
                group.base = round(group.base)?;
                group.amount = round(group.amount)?;
            }
        }
        Ok(groups)
    }
}

fn checked_add(total: Decimal, value: Decimal) -> DomainResult<Decimal> {
    total
        .checked_add(value)
        .ok_or_else(|| DomainError::overflow(format!("tax total {total} + {value}")))
}
