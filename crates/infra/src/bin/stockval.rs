//! Value or close a shipment record.
//!
//! ```text
//! stockval [value|done|cancel] [SNAPSHOT.json]
//! ```
//!
//! Reads a shipment snapshot (from the file, or stdin when no path or `-` is
//! given). `value`, the default, prints its totals and per-move valuation as
//! JSON. `done` and `cancel` apply the transition and print the resulting
//! snapshot with its amounts cache. Settings come from `$STOCKVAL_CONFIG` or
//! `./stockval.yaml`.

use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde_json::json;

use stockval_accounting::StandardTaxEngine;
use stockval_events::{EventBus, EventEnvelope, InMemoryEventBus};
use stockval_infra::{InMemoryTenantStore, Settings, ShipmentService};
use stockval_stock::{MoveValuation, Shipment, ShipmentId, ShipmentSnapshot};

type Service = ShipmentService<
    InMemoryTenantStore<ShipmentId, Shipment>,
    Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>,
>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Value,
    Done,
    Cancel,
}

fn main() -> Result<()> {
    let settings = Settings::from_env().context("loading settings")?;
    stockval_observability::init_with_filter(settings.log_filter.as_deref());

    let mut args = std::env::args().skip(1).peekable();
    let mode = match args.peek().map(String::as_str) {
        Some("value") => Some(Mode::Value),
        Some("done") => Some(Mode::Done),
        Some("cancel") => Some(Mode::Cancel),
        _ => None,
    };
    if mode.is_some() {
        args.next();
    }
    let mode = mode.unwrap_or(Mode::Value);

    let raw = read_input(args.next())?;
    let snapshot: ShipmentSnapshot =
        serde_json::from_str(&raw).context("parsing shipment snapshot")?;

    let bus = Arc::new(InMemoryEventBus::new());
    let service: Service = ShipmentService::new(
        InMemoryTenantStore::new(),
        bus.clone(),
        Arc::new(StandardTaxEngine),
        settings,
    );
    let events = bus.subscribe();

    let output = match mode {
        Mode::Value => value(&service, snapshot)?,
        Mode::Done | Mode::Cancel => {
            let (tenant_id, shipment_id) = (snapshot.tenant_id, snapshot.id);
            service.import(snapshot)?;
            if mode == Mode::Done {
                service.done(tenant_id, shipment_id)?;
            } else {
                service.cancel(tenant_id, shipment_id)?;
            }
            serde_json::to_value(service.export(tenant_id, shipment_id)?)?
        }
    };
    for envelope in events.drain() {
        tracing::info!(
            event_type = envelope.event_type(),
            seq = envelope.sequence_number(),
            "shipment event"
        );
    }
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn value(service: &Service, snapshot: ShipmentSnapshot) -> Result<serde_json::Value> {
    let tenant_id = snapshot.tenant_id;
    let shipment = service.import(snapshot)?;
    let shipment_id = shipment.id_typed();
    let amounts = service.amounts(tenant_id, shipment_id)?;

    let config = &service.settings().stock;
    let mut moves = Vec::with_capacity(shipment.moves().len());
    for m in shipment.moves() {
        let valuation: MoveValuation = m.stock_move.valuation(config)?;
        moves.push(json!({
            "id": m.stock_move.id,
            "role": m.role,
            "state": m.stock_move.state,
            "valuation_visible": m.stock_move.valuation_visible(),
            "valuation": valuation,
        }));
    }

    tracing::info!(shipment_id = %shipment_id, "shipment valued");
    Ok(json!({
        "shipment": shipment_id,
        "kind": shipment.kind(),
        "state": shipment.state(),
        "currency": shipment.currency(),
        "amounts": amounts,
        "from_cache": shipment.cached_amounts().is_some(),
        "moves": moves,
    }))
}

fn read_input(path: Option<String>) -> Result<String> {
    match path.as_deref() {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading snapshot from stdin")?;
            if buf.trim().is_empty() {
                bail!("no shipment snapshot on stdin");
            }
            Ok(buf)
        }
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {path}")),
    }
}
