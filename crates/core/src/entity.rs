//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Every persisted document implements this so stores can key it without
/// knowing the concrete type.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone
        + Eq
        + core::hash::Hash
        + core::fmt::Debug
        + core::fmt::Display
        + Send
        + Sync
        + 'static;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
