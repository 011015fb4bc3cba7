use chrono::{DateTime, Utc};

/// A fact emitted by an aggregate.
///
/// Events are immutable and versioned so their serialized payloads can be
/// replayed after the schema evolves.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name (e.g. "stock.shipment.done").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// Business time of the event.
    fn occurred_at(&self) -> DateTime<Utc>;
}
