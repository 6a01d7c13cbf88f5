//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Repositories key their records by `Entity::id` and use it as the stable
/// ordering for paginated reads.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Ord + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}
