use serde::{Deserialize, Serialize};

use stockval_accounting::{TaxEngine, TaxRounding};
use stockval_core::Currency;

/// Stock configuration (singleton per company database).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockConfiguration {
    /// Value moves with the unit price of their origin line (sale or purchase
    /// line) instead of the move's own unit price.
    #[serde(default, alias = "valued_sale_line")]
    pub valued_origin: bool,
}

/// The company owning a shipment; its currency rounds shipment totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub name: String,
    pub currency: Currency,
}

impl Company {
    pub fn new(name: impl Into<String>, currency: Currency) -> Self {
        Self {
            name: name.into(),
            currency,
        }
    }
}

/// Everything amount computation needs besides the records themselves.
#[derive(Clone, Copy)]
pub struct ValuationContext<'a> {
    pub config: &'a StockConfiguration,
    pub engine: &'a dyn TaxEngine,
    pub tax_rounding: TaxRounding,
}

impl<'a> ValuationContext<'a> {
    pub fn new(config: &'a StockConfiguration, engine: &'a dyn TaxEngine) -> Self {
        Self {
            config,
            engine,
            tax_rounding: TaxRounding::default(),
        }
    }

    pub fn with_tax_rounding(mut self, tax_rounding: TaxRounding) -> Self {
        self.tax_rounding = tax_rounding;
        self
    }
}

impl core::fmt::Debug for ValuationContext<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ValuationContext")
            .field("config", self.config)
            .field("tax_rounding", &self.tax_rounding)
            .finish_non_exhaustive()
    }
}
