//! Valued stock moves: price, amount and taxes of a single move.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockval_accounting::{Tax, TaxId};
use stockval_core::currency::DEFAULT_DIGITS;
use stockval_core::{AggregateId, Currency, DomainError, DomainResult, Entity};

use crate::config::{Company, StockConfiguration};

/// Stock move identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoveId(pub AggregateId);

impl MoveId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for MoveId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveState {
    Staging,
    #[default]
    Draft,
    Assigned,
    Done,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginKind {
    SaleLine,
    PurchaseLine,
}

/// Snapshot of the priced document line a move was created from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginLine {
    pub kind: OriginKind,
    pub reference: String,
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub gross_unit_price: Option<Decimal>,
    #[serde(default)]
    pub discount: Option<Decimal>,
    #[serde(default)]
    pub taxes: Vec<Tax>,
}

/// Record a move originates from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum MoveOrigin {
    /// A sale or purchase line: carries price, discount and taxes.
    Line(OriginLine),
    /// Another stock move (e.g. the supplier move behind an inventory move).
    Move(Box<StockMove>),
    /// Any other document (inventory, production, ...) without prices.
    Other { reference: String },
}

impl MoveOrigin {
    /// `None` when the origin has no unit price at all, `Some(None)` when it
    /// has one that is unset.
    fn unit_price(&self) -> Option<Option<Decimal>> {
        match self {
            MoveOrigin::Line(line) => Some(line.unit_price),
            MoveOrigin::Move(parent) => Some(parent.unit_price),
            MoveOrigin::Other { .. } => None,
        }
    }

    fn taxes(&self) -> Option<Vec<Tax>> {
        match self {
            MoveOrigin::Line(line) => Some(line.taxes.clone()),
            MoveOrigin::Move(parent) => Some(parent.taxes()),
            MoveOrigin::Other { .. } => None,
        }
    }

    fn gross_unit_price(&self) -> Option<Decimal> {
        match self {
            MoveOrigin::Line(line) => line.gross_unit_price,
            _ => None,
        }
    }

    fn discount(&self) -> Option<Decimal> {
        match self {
            MoveOrigin::Line(line) => line.discount,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMove {
    pub id: MoveId,
    pub product: String,
    pub quantity: Decimal,
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<Currency>,
    #[serde(default)]
    pub state: MoveState,
    #[serde(default)]
    pub origin: Option<MoveOrigin>,
}

impl Entity for StockMove {
    type Id = MoveId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Computed valuation fields of a move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveValuation {
    pub gross_unit_price: Decimal,
    pub amount: Decimal,
    pub discount: Decimal,
    pub taxes: Vec<TaxId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveField {
    GrossUnitPrice,
    Amount,
    Discount,
    Taxes,
}

impl MoveField {
    pub const ALL: [MoveField; 4] = [
        MoveField::GrossUnitPrice,
        MoveField::Amount,
        MoveField::Discount,
        MoveField::Taxes,
    ];
}

/// Default digits for a new move: the context company's currency, else 2.
pub fn default_currency_digits(company: Option<&Company>) -> u32 {
    company.map_or(DEFAULT_DIGITS, |c| c.currency.digits)
}

impl StockMove {
    pub fn new(product: impl Into<String>, quantity: Decimal, unit_price: Option<Decimal>) -> Self {
        Self {
            id: MoveId::new(AggregateId::new()),
            product: product.into(),
            quantity,
            unit_price,
            currency: None,
            state: MoveState::Draft,
            origin: None,
        }
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    pub fn with_origin(mut self, origin: MoveOrigin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn currency_digits(&self) -> u32 {
        self.currency.as_ref().map_or(DEFAULT_DIGITS, |c| c.digits)
    }

    /// Gross price and discount are only meaningful once the move is done.
    pub fn valuation_visible(&self) -> bool {
        self.state == MoveState::Done
    }

    /// Origin used for pricing: a move's origin, looked through one level when
    /// that origin is itself a move.
    fn pricing_origin(&self) -> Option<&MoveOrigin> {
        match &self.origin {
            Some(MoveOrigin::Move(parent)) => parent.origin.as_ref(),
            other => other.as_ref(),
        }
    }

    /// Unit price the amount is computed from.
    ///
    /// With `valued_origin`, an origin that carries a unit price wins even when
    /// that price is unset.
    pub fn valuation_unit_price(&self, config: &StockConfiguration) -> Option<Decimal> {
        if config.valued_origin {
            if let Some(origin_price) = self.pricing_origin().and_then(MoveOrigin::unit_price) {
                return origin_price;
            }
        }
        self.unit_price
    }

    /// `quantity × unit price`, rounded to the move currency when it has one.
    pub fn amount(&self, config: &StockConfiguration) -> DomainResult<Decimal> {
        match self.valuation_unit_price(config) {
            Some(price) if !price.is_zero() => {
                let value = self.quantity.checked_mul(price).ok_or_else(|| {
                    DomainError::overflow(format!("move {}: {} x {price}", self.id, self.quantity))
                })?;
                match &self.currency {
                    Some(currency) => currency.round(value),
                    None => Ok(value),
                }
            }
            _ => Ok(Decimal::ZERO),
        }
    }

    pub fn taxes(&self) -> Vec<Tax> {
        self.pricing_origin()
            .and_then(MoveOrigin::taxes)
            .unwrap_or_default()
    }

    pub fn gross_unit_price(&self, config: &StockConfiguration) -> Decimal {
        let from_origin = if config.valued_origin {
            self.pricing_origin().and_then(MoveOrigin::gross_unit_price)
        } else {
            None
        };
        from_origin
            .or_else(|| self.valuation_unit_price(config))
            .unwrap_or(Decimal::ZERO)
    }

    pub fn discount(&self) -> Decimal {
        self.pricing_origin()
            .and_then(MoveOrigin::discount)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn valuation(&self, config: &StockConfiguration) -> DomainResult<MoveValuation> {
        Ok(MoveValuation {
            gross_unit_price: self.gross_unit_price(config),
            amount: self.amount(config)?,
            discount: self.discount(),
            taxes: self.taxes().iter().map(|t| t.id).collect(),
        })
    }
}

/// Per-field values for a batch of moves, keyed by move id.
///
/// Only requested fields are filled; each requested field has an entry for
/// every move.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveFieldValues {
    pub gross_unit_price: HashMap<MoveId, Decimal>,
    pub amount: HashMap<MoveId, Decimal>,
    pub discount: HashMap<MoveId, Decimal>,
    pub taxes: HashMap<MoveId, Vec<TaxId>>,
}

pub fn value_moves<'m>(
    moves: impl IntoIterator<Item = &'m StockMove>,
    fields: &[MoveField],
    config: &StockConfiguration,
) -> DomainResult<MoveFieldValues> {
    let mut values = MoveFieldValues::default();
    for mv in moves {
        for field in fields {
            match field {
                MoveField::GrossUnitPrice => {
                    values.gross_unit_price.insert(mv.id, mv.gross_unit_price(config));
                }
                MoveField::Amount => {
                    values.amount.insert(mv.id, mv.amount(config)?);
                }
                MoveField::Discount => {
                    values.discount.insert(mv.id, mv.discount());
                }
                MoveField::Taxes => {
                    values
                        .taxes
                        .insert(mv.id, mv.taxes().iter().map(|t| t.id).collect());
                }
            }
        }
    }
    Ok(values)
}
