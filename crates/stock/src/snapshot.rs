//! Serializable image of a shipment record, used to import and export
//! shipments outside the event stream.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockval_core::{DomainError, DomainResult, TenantId};

use crate::config::Company;
use crate::shipment::{Shipment, ShipmentId, ShipmentKind, ShipmentMove, ShipmentState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentSnapshot {
    pub id: ShipmentId,
    pub tenant_id: TenantId,
    pub kind: ShipmentKind,
    pub company: Company,
    pub reference: String,
    #[serde(default)]
    pub state: ShipmentState,
    #[serde(default)]
    pub moves: Vec<ShipmentMove>,
    // Older records stored the cache under the plain field names.
    #[serde(default, alias = "untaxed_amount")]
    pub untaxed_amount_cache: Option<Decimal>,
    #[serde(default, alias = "tax_amount")]
    pub tax_amount_cache: Option<Decimal>,
    #[serde(default, alias = "total_amount")]
    pub total_amount_cache: Option<Decimal>,
}

impl Shipment {
    pub fn to_snapshot(&self) -> DomainResult<ShipmentSnapshot> {
        let (Some(tenant_id), Some(company)) = (self.tenant_id, self.company.clone()) else {
            return Err(DomainError::not_found());
        };
        Ok(ShipmentSnapshot {
            id: self.id,
            tenant_id,
            kind: self.kind,
            company,
            reference: self.reference.clone(),
            state: self.state,
            moves: self.moves.clone(),
            untaxed_amount_cache: self.untaxed_amount_cache,
            tax_amount_cache: self.tax_amount_cache,
            total_amount_cache: self.total_amount_cache,
        })
    }

    /// Restore a shipment record. The version starts at zero: a restored
    /// record has no event history in this process.
    pub fn from_snapshot(snapshot: ShipmentSnapshot) -> DomainResult<Self> {
        if snapshot.reference.trim().is_empty() {
            return Err(DomainError::validation("reference cannot be empty"));
        }
        snapshot.company.currency.validate()?;
        let mut seen = std::collections::HashSet::new();
        for m in &snapshot.moves {
            if !seen.insert(m.stock_move.id) {
                return Err(DomainError::validation(format!(
                    "move {} appears twice",
                    m.stock_move.id
                )));
            }
            // moves of a done or cancelled record carry their final state
            match snapshot.state {
                ShipmentState::Draft => Shipment::validate_move(&m.stock_move)?,
                _ => Shipment::validate_values(&m.stock_move)?,
            }
        }
        Ok(Self {
            id: snapshot.id,
            tenant_id: Some(snapshot.tenant_id),
            kind: snapshot.kind,
            company: Some(snapshot.company),
            reference: snapshot.reference,
            state: snapshot.state,
            moves: snapshot.moves,
            untaxed_amount_cache: snapshot.untaxed_amount_cache,
            tax_amount_cache: snapshot.tax_amount_cache,
            total_amount_cache: snapshot.total_amount_cache,
            version: 0,
            created: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::str::FromStr;

    use serde_json::{Value, json};

    fn record(state: &str, moves: Value) -> Value {
        json!({
            "id": "01890a5d-ac96-774b-bcce-b302099a8057",
            "tenant_id": "01890a5d-ac96-774b-bcce-b302099a8058",
            "kind": "outgoing",
            "company": {"name": "ACME", "currency": {"code": "EUR", "digits": 2}},
            "reference": "OUT-12",
            "state": state,
            "moves": moves
        })
    }

    fn restore(json: Value) -> DomainResult<Shipment> {
        let snapshot: ShipmentSnapshot = serde_json::from_value(json).unwrap();
        Shipment::from_snapshot(snapshot)
    }

    fn stock_move(id: &str, quantity: &str, state: &str) -> Value {
        json!({
            "role": "outgoing",
            "move": {
                "id": id,
                "product": "widget",
                "quantity": quantity,
                "unit_price": "1.00",
                "state": state
            }
        })
    }

    #[test]
    fn legacy_cache_names_are_accepted() {
        let json = serde_json::json!({
            "id": "01890a5d-ac96-774b-bcce-b302099a8057",
            "tenant_id": "01890a5d-ac96-774b-bcce-b302099a8058",
            "kind": "outgoing",
            "company": {"name": "ACME", "currency": {"code": "EUR", "digits": 2}},
            "reference": "OUT-12",
            "state": "done",
            "untaxed_amount": "100.00",
            "tax_amount": "21.00",
            "total_amount": "121.00"
        });

        let snapshot: ShipmentSnapshot = serde_json::from_value(json).unwrap();
        let shipment = Shipment::from_snapshot(snapshot).unwrap();

        let cached = shipment.cached_amounts().unwrap();
        assert_eq!(cached.untaxed_amount, Decimal::from_str("100.00").unwrap());
        assert_eq!(cached.total_amount, Decimal::from_str("121.00").unwrap());
    }

    #[test]
    fn snapshot_of_empty_shipment_is_not_found() {
        let shipment = Shipment::empty(ShipmentId::new(stockval_core::AggregateId::new()));
        assert_eq!(shipment.to_snapshot().unwrap_err(), DomainError::NotFound);
    }

    #[test]
    fn restored_moves_are_validated() {
        let id = "01890a5d-ac96-774b-bcce-b302099a8059";

        let negative = record("draft", json!([stock_move(id, "-1", "draft")]));
        assert!(matches!(restore(negative).unwrap_err(), DomainError::Validation(_)));

        let done_in_draft = record("draft", json!([stock_move(id, "1", "done")]));
        assert!(matches!(restore(done_in_draft).unwrap_err(), DomainError::Validation(_)));

        let done = record("done", json!([stock_move(id, "1", "done")]));
        assert_eq!(restore(done).unwrap().moves().len(), 1);
    }

    #[test]
    fn oversized_currency_digits_are_rejected() {
        let mut json = record("draft", json!([]));
        json["company"]["currency"]["digits"] = json!(29);
        assert!(serde_json::from_value::<ShipmentSnapshot>(json).is_err());
    }
}
