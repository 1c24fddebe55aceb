//! Stable identifier of a unit slot inside a [`UnitArena`](crate::UnitArena).

use serde::{Deserialize, Serialize};

/// Index of a unit or redirect in a program's [`UnitArena`](crate::UnitArena).
///
/// Ids are only meaningful within the arena that issued them; they are not
/// stable across program generations. Cross-generation identity uses
/// canonical paths.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct UnitId(u32);

impl UnitId {
    /// Creates a `UnitId` from a raw `u32` value.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw `u32` value of this `UnitId`.
    pub fn as_raw(self) -> u32 {
        self.0
    }

    /// Returns the id as a slot index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_as_raw_roundtrip() {
        let id = UnitId::from_raw(42);
        assert_eq!(id.as_raw(), 42);
        assert_eq!(id.index(), 42);
    }

    #[test]
    fn ordering_follows_raw() {
        assert!(UnitId::from_raw(1) < UnitId::from_raw(2));
    }
}
