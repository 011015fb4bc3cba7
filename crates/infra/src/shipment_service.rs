//! Shipment application service.
//!
//! Every write follows the same pipeline:
//!
//! ```text
//! load record → execute command → (done/cancel: compute totals, store cache)
//!             → save record → publish events
//! ```
//!
//! Writes are serialized by a service-wide lock so a totals snapshot can never
//! be taken from a record another writer is changing.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::Value as JsonValue;
use thiserror::Error;

use stockval_accounting::TaxEngine;
use stockval_core::{AggregateRoot, DomainError, TenantId};
use stockval_events::{EventBus, EventEnvelope, execute};
use stockval_stock::{
    AddMove, AmountField, AmountValues, CreateShipment, MoveField, MoveFieldValues, RemoveMove,
    Shipment, ShipmentAmounts, ShipmentCommand, ShipmentEvent, ShipmentId, ShipmentSnapshot,
    StoreAmountsCache, Transition, UpdateMove, ValuationContext, get_amounts, value_moves,
};

use crate::read_model::{StoreError, TenantStore};
use crate::settings::Settings;

pub const SHIPMENT_AGGREGATE_TYPE: &str = "stock.shipment";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to serialize event: {0}")]
    Serialize(String),

    /// The record was saved but its events could not be published.
    #[error("event publication failed: {0}")]
    Publish(String),
}

pub struct ShipmentService<S, B> {
    store: S,
    bus: B,
    engine: Arc<dyn TaxEngine>,
    settings: Settings,
    write_lock: Mutex<()>,
}

impl<S, B> core::fmt::Debug for ShipmentService<S, B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ShipmentService")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<S, B> ShipmentService<S, B>
where
    S: TenantStore<ShipmentId, Shipment>,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(store: S, bus: B, engine: Arc<dyn TaxEngine>, settings: Settings) -> Self {
        Self {
            store,
            bus,
            engine,
            settings,
            write_lock: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn context(&self) -> ValuationContext<'_> {
        ValuationContext::new(&self.settings.stock, self.engine.as_ref())
            .with_tax_rounding(self.settings.tax_rounding)
    }

    pub fn get(
        &self,
        tenant_id: TenantId,
        shipment_id: ShipmentId,
    ) -> Result<Shipment, ServiceError> {
        self.store
            .get(tenant_id, &shipment_id)?
            .ok_or(ServiceError::Domain(DomainError::NotFound))
    }

    pub fn create(&self, cmd: CreateShipment) -> Result<Shipment, ServiceError> {
        let (tenant_id, shipment_id) = (cmd.tenant_id, cmd.shipment_id);
        self.run(tenant_id, shipment_id, ShipmentCommand::CreateShipment(cmd))
    }

    pub fn add_move(&self, cmd: AddMove) -> Result<Shipment, ServiceError> {
        let (tenant_id, shipment_id) = (cmd.tenant_id, cmd.shipment_id);
        self.run(tenant_id, shipment_id, ShipmentCommand::AddMove(cmd))
    }

    pub fn update_move(&self, cmd: UpdateMove) -> Result<Shipment, ServiceError> {
        let (tenant_id, shipment_id) = (cmd.tenant_id, cmd.shipment_id);
        self.run(tenant_id, shipment_id, ShipmentCommand::UpdateMove(cmd))
    }

    pub fn remove_move(&self, cmd: RemoveMove) -> Result<Shipment, ServiceError> {
        let (tenant_id, shipment_id) = (cmd.tenant_id, cmd.shipment_id);
        self.run(tenant_id, shipment_id, ShipmentCommand::RemoveMove(cmd))
    }

    /// Mark the shipment done and cache its totals.
    pub fn done(
        &self,
        tenant_id: TenantId,
        shipment_id: ShipmentId,
    ) -> Result<Shipment, ServiceError> {
        let cmd = ShipmentCommand::Done(transition(tenant_id, shipment_id));
        self.run(tenant_id, shipment_id, cmd)
    }

    /// Cancel the shipment and cache its totals.
    pub fn cancel(
        &self,
        tenant_id: TenantId,
        shipment_id: ShipmentId,
    ) -> Result<Shipment, ServiceError> {
        let cmd = ShipmentCommand::Cancel(transition(tenant_id, shipment_id));
        self.run(tenant_id, shipment_id, cmd)
    }

    pub fn reset_to_draft(
        &self,
        tenant_id: TenantId,
        shipment_id: ShipmentId,
    ) -> Result<Shipment, ServiceError> {
        let cmd = ShipmentCommand::ResetToDraft(transition(tenant_id, shipment_id));
        self.run(tenant_id, shipment_id, cmd)
    }

    /// Save a restored record as is. No events are published.
    pub fn import(&self, snapshot: ShipmentSnapshot) -> Result<Shipment, ServiceError> {
        let tenant_id = snapshot.tenant_id;
        let shipment = Shipment::from_snapshot(snapshot)?;
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        if self.store.get(tenant_id, &shipment.id_typed())?.is_some() {
            return Err(DomainError::conflict("shipment already exists").into());
        }
        self.store.upsert(tenant_id, shipment.id_typed(), shipment.clone())?;
        tracing::info!(
            tenant_id = %tenant_id,
            shipment_id = %shipment.id_typed(),
            state = ?shipment.state(),
            "shipment imported"
        );
        Ok(shipment)
    }

    /// Snapshot of a stored record, cache fields included.
    pub fn export(
        &self,
        tenant_id: TenantId,
        shipment_id: ShipmentId,
    ) -> Result<ShipmentSnapshot, ServiceError> {
        Ok(self.get(tenant_id, shipment_id)?.to_snapshot()?)
    }

    /// Totals of one shipment (cached in done/cancelled states).
    pub fn amounts(
        &self,
        tenant_id: TenantId,
        shipment_id: ShipmentId,
    ) -> Result<ShipmentAmounts, ServiceError> {
        let shipment = self.get(tenant_id, shipment_id)?;
        tracing::debug!(
            shipment_id = %shipment_id,
            from_cache = shipment.cached_amounts().is_some(),
            "reading shipment amounts"
        );
        Ok(shipment.amounts(&self.context())?)
    }

    /// Batch read of the requested amount fields. Unknown ids are an error.
    pub fn amounts_many(
        &self,
        tenant_id: TenantId,
        shipment_ids: &[ShipmentId],
        fields: &[AmountField],
    ) -> Result<AmountValues, ServiceError> {
        let mut seen = HashSet::new();
        let mut shipments = Vec::with_capacity(shipment_ids.len());
        for id in shipment_ids {
            if seen.insert(*id) {
                shipments.push(self.get(tenant_id, *id)?);
            }
        }
        Ok(get_amounts(&shipments, fields, &self.context())?)
    }

    /// Valuation fields of every move on a shipment.
    pub fn move_values(
        &self,
        tenant_id: TenantId,
        shipment_id: ShipmentId,
        fields: &[MoveField],
    ) -> Result<MoveFieldValues, ServiceError> {
        let shipment = self.get(tenant_id, shipment_id)?;
        Ok(value_moves(
            shipment.moves().iter().map(|m| &m.stock_move),
            fields,
            &self.settings.stock,
        )?)
    }

    fn run(
        &self,
        tenant_id: TenantId,
        shipment_id: ShipmentId,
        command: ShipmentCommand,
    ) -> Result<Shipment, ServiceError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;

        let mut shipment = self
            .store
            .get(tenant_id, &shipment_id)?
            .unwrap_or_else(|| Shipment::empty(shipment_id));
        let base_version = shipment.version();

        let mut events = execute(&mut shipment, &command).inspect_err(|e| {
            tracing::warn!(
                tenant_id = %tenant_id,
                shipment_id = %shipment_id,
                error = %e,
                "shipment command rejected"
            );
        })?;

        if matches!(command, ShipmentCommand::Done(_) | ShipmentCommand::Cancel(_)) {
            events.extend(self.store_cache(tenant_id, &mut shipment)?);
        }

        self.store.upsert(tenant_id, shipment_id, shipment.clone())?;
        tracing::info!(
            tenant_id = %tenant_id,
            shipment_id = %shipment_id,
            state = ?shipment.state(),
            event_count = events.len(),
            "shipment saved"
        );

        self.publish(tenant_id, shipment_id, base_version, events)?;
        Ok(shipment)
    }

    /// Write the freshly computed totals into the cache fields.
    fn store_cache(
        &self,
        tenant_id: TenantId,
        shipment: &mut Shipment,
    ) -> Result<Vec<ShipmentEvent>, ServiceError> {
        let amounts = shipment.calc_amounts(&self.context())?;
        tracing::debug!(
            shipment_id = %shipment.id_typed(),
            untaxed = %amounts.untaxed_amount,
            tax = %amounts.tax_amount,
            total = %amounts.total_amount,
            "caching shipment amounts"
        );
        let cmd = ShipmentCommand::StoreAmountsCache(StoreAmountsCache {
            tenant_id,
            shipment_id: shipment.id_typed(),
            amounts,
            occurred_at: Utc::now(),
        });
        Ok(execute(shipment, &cmd)?)
    }

    fn publish(
        &self,
        tenant_id: TenantId,
        shipment_id: ShipmentId,
        base_version: u64,
        events: Vec<ShipmentEvent>,
    ) -> Result<(), ServiceError> {
        for (seq, event) in (base_version + 1..).zip(events) {
            let envelope =
                EventEnvelope::wrap(tenant_id, shipment_id.0, SHIPMENT_AGGREGATE_TYPE, seq, event)
                    .try_map_payload(serde_json::to_value)
                    .map_err(|e| ServiceError::Serialize(e.to_string()))?;
            self.bus.publish(envelope).map_err(|e| {
                tracing::error!(
                    shipment_id = %shipment_id,
                    seq,
                    "failed to publish shipment event: {e:?}"
                );
                ServiceError::Publish(format!("{e:?}"))
            })?;
        }
        Ok(())
    }
}

fn transition(tenant_id: TenantId, shipment_id: ShipmentId) -> Transition {
    Transition {
        tenant_id,
        shipment_id,
        occurred_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::str::FromStr;
    use rust_decimal::Decimal;

    use stockval_accounting::StandardTaxEngine;
    use stockval_core::{AggregateId, Currency};
    use stockval_events::InMemoryEventBus;
    use stockval_stock::{Company, ShipmentKind, ShipmentState};

    use crate::read_model::InMemoryTenantStore;

    type TestService = ShipmentService<
        Arc<InMemoryTenantStore<ShipmentId, Shipment>>,
        Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>,
    >;

    fn service() -> (TestService, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>) {
        let bus = Arc::new(InMemoryEventBus::new());
        let svc = ShipmentService::new(
            Arc::new(InMemoryTenantStore::new()),
            bus.clone(),
            Arc::new(StandardTaxEngine),
            Settings::default(),
        );
        (svc, bus)
    }

    fn create(svc: &TestService, tenant_id: TenantId) -> ShipmentId {
        let shipment_id = ShipmentId::new(AggregateId::new());
        svc.create(CreateShipment {
            tenant_id,
            shipment_id,
            kind: ShipmentKind::Incoming,
            company: Company::new("ACME", Currency::new("EUR", 2)),
            reference: "IN-1".to_string(),
            occurred_at: Utc::now(),
        })
        .unwrap();
        shipment_id
    }

    #[test]
    fn unknown_shipment_is_not_found() {
        let (svc, _) = service();
        let err = svc
            .amounts(TenantId::new(), ShipmentId::new(AggregateId::new()))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::NotFound)));
    }

    #[test]
    fn rejected_command_leaves_record_and_bus_untouched() {
        let (svc, bus) = service();
        let tenant_id = TenantId::new();
        let shipment_id = create(&svc, tenant_id);
        let sub = bus.subscribe();

        assert!(svc.reset_to_draft(tenant_id, shipment_id).is_err());

        assert!(sub.drain().is_empty());
        assert_eq!(svc.get(tenant_id, shipment_id).unwrap().version(), 1);
    }

    #[test]
    fn cancel_publishes_transition_then_cache() {
        let (svc, bus) = service();
        let tenant_id = TenantId::new();
        let shipment_id = create(&svc, tenant_id);
        let sub = bus.subscribe();

        let shipment = svc.cancel(tenant_id, shipment_id).unwrap();

        assert_eq!(shipment.state(), ShipmentState::Cancelled);
        let envs = sub.drain();
        let kinds: Vec<_> = envs.iter().map(|e| e.event_type().to_string()).collect();
        assert_eq!(kinds, vec!["stock.shipment.cancelled", "stock.shipment.amounts_cached"]);
        let seqs: Vec<_> = envs.iter().map(|e| e.sequence_number()).collect();
        assert_eq!(seqs, vec![2, 3]);
        assert_eq!(envs[0].aggregate_type(), SHIPMENT_AGGREGATE_TYPE);
        assert_eq!(
            shipment.total_amount_cache(),
            Some(Decimal::from_str("0").unwrap())
        );
    }

    #[test]
    fn export_carries_the_stored_cache() {
        let (svc, _) = service();
        let tenant_id = TenantId::new();
        let shipment_id = create(&svc, tenant_id);
        svc.done(tenant_id, shipment_id).unwrap();

        let snapshot = svc.export(tenant_id, shipment_id).unwrap();

        assert_eq!(snapshot.state, ShipmentState::Done);
        assert_eq!(snapshot.total_amount_cache.map(|v| v.to_string()), Some("0.00".into()));
        assert!(matches!(
            svc.export(TenantId::new(), shipment_id).unwrap_err(),
            ServiceError::Domain(DomainError::NotFound)
        ));
    }

    #[test]
    fn overflowing_totals_reject_the_transition() {
        let (svc, bus) = service();
        let tenant_id = TenantId::new();
        let shipment_id = create(&svc, tenant_id);
        for _ in 0..2 {
            svc.add_move(AddMove {
                tenant_id,
                shipment_id,
                role: stockval_stock::MoveRole::Incoming,
                stock_move: stockval_stock::StockMove::new("w", Decimal::MAX, Some(Decimal::ONE)),
                occurred_at: Utc::now(),
            })
            .unwrap();
        }
        let sub = bus.subscribe();

        let err = svc.done(tenant_id, shipment_id).unwrap_err();

        assert!(matches!(err, ServiceError::Domain(DomainError::Overflow(_))));
        assert!(sub.drain().is_empty());
        let stored = svc.get(tenant_id, shipment_id).unwrap();
        assert_eq!(stored.state(), ShipmentState::Draft);
    }

    #[test]
    fn batch_read_deduplicates_ids() {
        let (svc, _) = service();
        let tenant_id = TenantId::new();
        let shipment_id = create(&svc, tenant_id);

        let values = svc
            .amounts_many(tenant_id, &[shipment_id, shipment_id], &AmountField::ALL)
            .unwrap();

        assert_eq!(values.len(), 3);
        assert_eq!(values[&AmountField::TotalAmount].len(), 1);
    }
}
