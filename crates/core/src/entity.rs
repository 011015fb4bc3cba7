//! Entity trait: identity that survives state changes.

/// Entity marker + minimal interface.
///
/// Stock moves are entities owned by a shipment aggregate: they are looked up
/// and replaced by id, never compared by value.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
