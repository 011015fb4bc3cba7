//! Shipment totals: untaxed, tax and total amounts over the valued moves,
//! served from the amounts cache once the shipment is done or cancelled.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockval_accounting::{TaxType, Taxable, TaxableLine};
use stockval_core::{Currency, DomainError, DomainResult};

use crate::config::ValuationContext;
use crate::shipment::{Shipment, ShipmentId};
use crate::stock_move::{MoveState, StockMove};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentAmounts {
    pub untaxed_amount: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

impl ShipmentAmounts {
    pub fn zero() -> Self {
        Self {
            untaxed_amount: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
        }
    }

    pub fn get(&self, field: AmountField) -> Decimal {
        match field {
            AmountField::UntaxedAmount => self.untaxed_amount,
            AmountField::TaxAmount => self.tax_amount,
            AmountField::TotalAmount => self.total_amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountField {
    UntaxedAmount,
    TaxAmount,
    TotalAmount,
}

impl AmountField {
    pub const ALL: [AmountField; 3] = [
        AmountField::UntaxedAmount,
        AmountField::TaxAmount,
        AmountField::TotalAmount,
    ];
}

impl Shipment {
    /// Moves carrying the shipment's value, per shipment kind.
    pub fn valued_moves(&self) -> impl Iterator<Item = &StockMove> {
        let role = self.kind.valued_role();
        self.moves
            .iter()
            .filter(move |m| role.is_none_or(|r| m.role == r))
            .map(|m| &m.stock_move)
    }

    /// Currency of the first valued move that has one, else the company's.
    pub fn currency(&self) -> Option<Currency> {
        self.valued_moves()
            .find_map(|m| m.currency.clone())
            .or_else(|| self.company.as_ref().map(|c| c.currency.clone()))
    }

    pub fn currency_digits(&self) -> u32 {
        self.company
            .as_ref()
            .map_or(stockval_core::currency::DEFAULT_DIGITS, |c| c.currency.digits)
    }

    fn round_company(&self, amount: Decimal) -> DomainResult<Decimal> {
        match &self.company {
            Some(company) => company.currency.round(amount),
            None => Ok(amount),
        }
    }

    /// Compute the totals from the moves, ignoring any cached values. Every
    /// amount carries the company currency's precision.
    pub fn calc_amounts(&self, ctx: &ValuationContext<'_>) -> DomainResult<ShipmentAmounts> {
        let mut untaxed = Decimal::ZERO;
        for stock_move in self.valued_moves().filter(|m| m.state != MoveState::Cancelled) {
            untaxed = checked_add(untaxed, stock_move.amount(ctx.config)?)?;
        }
        let untaxed_amount = self.round_company(untaxed)?;

        let mut tax = Decimal::ZERO;
        for group in self.taxes(ctx.engine, ctx.tax_rounding)?.values() {
            tax = checked_add(tax, self.round_company(group.amount)?)?;
        }
        let tax_amount = self.round_company(tax)?;
        let total_amount = self.round_company(checked_add(untaxed_amount, tax_amount)?)?;

        Ok(ShipmentAmounts {
            untaxed_amount,
            tax_amount,
            total_amount,
        })
    }

    /// Cached totals, when the shipment is in a cached state and the cache is
    /// complete.
    pub fn cached_amounts(&self) -> Option<ShipmentAmounts> {
        if !self.state.is_cached() {
            return None;
        }
        Some(ShipmentAmounts {
            untaxed_amount: self.untaxed_amount_cache?,
            tax_amount: self.tax_amount_cache?,
            total_amount: self.total_amount_cache?,
        })
    }

    pub fn amounts(&self, ctx: &ValuationContext<'_>) -> DomainResult<ShipmentAmounts> {
        match self.cached_amounts() {
            Some(cached) => Ok(cached),
            None => self.calc_amounts(ctx),
        }
    }
}

fn checked_add(total: Decimal, value: Decimal) -> DomainResult<Decimal> {
    total
        .checked_add(value)
        .ok_or_else(|| DomainError::overflow(format!("shipment total {total} + {value}")))
}

impl Taxable for Shipment {
    fn taxable_lines(&self) -> Vec<TaxableLine> {
        self.valued_moves()
            .filter(|m| m.state != MoveState::Cancelled)
            .map(|m| TaxableLine {
                taxes: m.taxes(),
                unit_price: m.unit_price.unwrap_or(Decimal::ZERO),
                quantity: m.quantity,
            })
            .collect()
    }

    fn tax_type(&self) -> TaxType {
        self.kind.tax_type()
    }

    fn tax_currency(&self) -> Option<Currency> {
        self.currency()
    }
}

/// Requested amount fields for a batch of shipments, keyed by shipment id.
pub type AmountValues = BTreeMap<AmountField, HashMap<ShipmentId, Decimal>>;

/// Batch getter: every requested field gets a value for every shipment.
pub fn get_amounts<'s>(
    shipments: impl IntoIterator<Item = &'s Shipment>,
    fields: &[AmountField],
    ctx: &ValuationContext<'_>,
) -> DomainResult<AmountValues> {
    let mut result: AmountValues = fields.iter().map(|f| (*f, HashMap::new())).collect();
    if result.is_empty() {
        return Ok(result);
    }
    for shipment in shipments {
        let amounts = shipment.amounts(ctx)?;
        for (field, values) in result.iter_mut() {
            values.insert(shipment.id_typed(), amounts.get(*field));
        }
    }
    Ok(result)
}
