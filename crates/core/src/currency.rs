//! Currency precision and rounding.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Digits used when neither the record nor its company carries a currency.
pub const DEFAULT_DIGITS: u32 = 2;

/// Largest scale a `Decimal` can carry.
pub const MAX_DIGITS: u32 = 28;

/// A currency as far as amount computation is concerned: a code, a number of
/// displayed digits and a rounding step.
///
/// When `rounding` is omitted the step is `10^-digits` (0.01 for two digits).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "CurrencyRecord")]
pub struct Currency {
    pub code: String,
    pub digits: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rounding: Option<Decimal>,
}

#[derive(Deserialize)]
struct CurrencyRecord {
    code: String,
    digits: u32,
    #[serde(default)]
    rounding: Option<Decimal>,
}

impl TryFrom<CurrencyRecord> for Currency {
    type Error = DomainError;

    fn try_from(record: CurrencyRecord) -> Result<Self, Self::Error> {
        let currency = Currency {
            code: record.code,
            digits: record.digits,
            rounding: record.rounding,
        };
        currency.validate()?;
        Ok(currency)
    }
}

impl Currency {
    pub fn new(code: impl Into<String>, digits: u32) -> Self {
        Self {
            code: code.into(),
            digits,
            rounding: None,
        }
    }

    /// Currency with an explicit rounding step (e.g. 0.05 for cash rounding).
    pub fn with_rounding(code: impl Into<String>, digits: u32, rounding: Decimal) -> Self {
        Self {
            code: code.into(),
            digits,
            rounding: Some(rounding),
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.digits > MAX_DIGITS {
            return Err(DomainError::validation(format!(
                "currency {} has {} digits (at most {MAX_DIGITS})",
                self.code, self.digits
            )));
        }
        if self.rounding.is_some_and(|step| step.is_sign_negative()) {
            return Err(DomainError::validation(format!(
                "currency {} has a negative rounding step",
                self.code
            )));
        }
        Ok(())
    }

    /// Effective rounding step.
    pub fn rounding(&self) -> DomainResult<Decimal> {
        self.validate()?;
        match self.rounding {
            Some(step) if !step.is_zero() => Ok(step),
            _ => Ok(Decimal::new(1, self.digits)),
        }
    }

    /// Round `amount` to a multiple of the rounding step, half to even, then
    /// express it with exactly `digits` decimal places.
    pub fn round(&self, amount: Decimal) -> DomainResult<Decimal> {
        self.validate()?;
        let mut rounded = match self.rounding {
            Some(step) if !step.is_zero() => amount
                .checked_div(step)
                .map(|units| units.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven))
                .and_then(|units| units.checked_mul(step))
                .ok_or_else(|| {
                    DomainError::overflow(format!("{amount} rounded to steps of {step}"))
                })?,
            _ => amount.round_dp_with_strategy(self.digits, RoundingStrategy::MidpointNearestEven),
        };
        rounded.rescale(self.digits);
        Ok(rounded)
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
    fn rounds_half_to_even() {
        let eur = Currency::new("EUR", 2);
        assert_eq!(eur.round(d("1.005")).unwrap(), d("1.00"));
        assert_eq!(eur.round(d("1.015")).unwrap(), d("1.02"));
        assert_eq!(eur.round(d("1.0151")).unwrap(), d("1.02"));
        assert_eq!(eur.round(d("-2.345")).unwrap(), d("-2.34"));
    }

    #[test]
    fn result_carries_currency_scale() {
        let eur = Currency::new("EUR", 2);
        assert_eq!(eur.round(d("3")).unwrap().scale(), 2);
        let jpy = Currency::new("JPY", 0);
        assert_eq!(jpy.round(d("12.5")).unwrap(), d("12"));
        assert_eq!(jpy.round(d("13.5")).unwrap(), d("14"));
    }

    #[test]
    fn explicit_rounding_step_is_honoured() {
        let chf = Currency::with_rounding("CHF", 2, d("0.05"));
        assert_eq!(chf.round(d("1.02")).unwrap(), d("1.00"));
        assert_eq!(chf.round(d("1.03")).unwrap(), d("1.05"));
        assert_eq!(chf.round(d("1.075")).unwrap(), d("1.10"));
    }

    #[test]
    fn zero_step_falls_back_to_digits() {
        let odd = Currency::with_rounding("XXX", 3, Decimal::ZERO);
        assert_eq!(odd.rounding().unwrap(), d("0.001"));
        assert_eq!(odd.round(d("0.0004")).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn deserializes_without_rounding() {
        let usd: Currency = serde_json::from_str(r#"{"code":"USD","digits":2}"#).unwrap();
        assert_eq!(usd.rounding().unwrap(), d("0.01"));
    }

    #[test]
    fn rejects_more_digits_than_a_decimal_holds() {
        assert!(serde_json::from_str::<Currency>(r#"{"code":"X","digits":29}"#).is_err());

        let built = Currency::new("X", 29);
        assert!(matches!(built.round(Decimal::ONE), Err(DomainError::Validation(_))));
    }

    #[test]
    fn huge_amounts_do_not_panic() {
        let eur = Currency::new("EUR", 2);
        let big = Decimal::from_i128_with_scale(10_i128.pow(27), 0);
        assert_eq!(eur.round(big).unwrap(), big);

        let chf = Currency::with_rounding("CHF", 2, d("0.05"));
        assert!(matches!(chf.round(Decimal::MAX), Err(DomainError::Overflow(_))));
    }
}
