//! Valued stock: amounts and taxes on stock moves, and shipment totals with
//! an amounts cache written when a shipment is done or cancelled.
//!
//! Deterministic domain logic only (no IO, no storage).

pub mod config;
pub mod shipment;
pub mod snapshot;
pub mod stock_move;
pub mod valuation;

pub use config::{Company, StockConfiguration, ValuationContext};
pub use shipment::{
    AddMove, AmountsCached, CACHED_STATES, CreateShipment, MoveChanged, MoveRemoved, MoveRole,
    RemoveMove, Shipment, ShipmentCommand, ShipmentCreated, ShipmentEvent, ShipmentId,
    ShipmentKind, ShipmentMove, ShipmentState, ShipmentTransitioned, StoreAmountsCache,
    Transition, UpdateMove,
};
pub use snapshot::ShipmentSnapshot;
pub use stock_move::{
    MoveField, MoveFieldValues, MoveId, MoveOrigin, MoveState, MoveValuation, OriginKind,
    OriginLine, StockMove, default_currency_digits, value_moves,
};
pub use valuation::{AmountField, AmountValues, ShipmentAmounts, get_amounts};
