//! Arena of compilation units and redirects, addressed by [`UnitId`].

use crate::unit::CompilationUnit;
use crate::unit_id::UnitId;
use keel_common::CanonicalPath;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// A thin alias for a unit that shares its package identity with another.
///
/// The redirect owns its own name and path, but every semantic query is
/// answered by the target unit.
#[derive(Debug, Clone)]
pub struct Redirect {
    /// The name the redirect was requested by.
    pub file_name: String,
    /// The redirect's own canonical path.
    pub path: CanonicalPath,
    /// The unit that answers for this redirect.
    pub target: UnitId,
    /// The unit as read from disk before redirection, kept so a later
    /// generation can tell whether the underlying file changed.
    pub unredirected: Arc<CompilationUnit>,
}

/// One arena entry.
#[derive(Debug, Clone)]
pub enum UnitSlot {
    /// A unit with its own semantic data.
    Source(Arc<CompilationUnit>),
    /// An alias delegating to another slot.
    Redirect(Redirect),
}

impl UnitSlot {
    /// The canonical path this slot is registered under.
    pub fn path(&self) -> &CanonicalPath {
        match self {
            UnitSlot::Source(unit) => &unit.path,
            UnitSlot::Redirect(redirect) => &redirect.path,
        }
    }

    /// The requested file name of this slot.
    pub fn file_name(&self) -> &str {
        match self {
            UnitSlot::Source(unit) => &unit.file_name,
            UnitSlot::Redirect(redirect) => &redirect.file_name,
        }
    }

    /// Returns `true` for redirect slots.
    pub fn is_redirect(&self) -> bool {
        matches!(self, UnitSlot::Redirect(_))
    }
}

/// Raised when a slot would share its path with an existing slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("a unit is already registered at `{path}`")]
pub struct DuplicatePath {
    /// The conflicting path.
    pub path: CanonicalPath,
    /// The slot already registered under it.
    pub existing: UnitId,
}

/// Ordered storage for a program's units.
///
/// At most one slot exists per canonical path. Redirects store the id of
/// their target, and [`unit`](Self::unit) follows that single indirection.
#[derive(Debug, Clone, Default)]
pub struct UnitArena {
    slots: Vec<UnitSlot>,
    by_path: HashMap<CanonicalPath, UnitId>,
}

impl UnitArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a slot, failing if its path is already taken.
    pub fn insert(&mut self, slot: UnitSlot) -> Result<UnitId, DuplicatePath> {
        if let Some(&existing) = self.by_path.get(slot.path()) {
            return Err(DuplicatePath {
                path: slot.path().clone(),
                existing,
            });
        }
        let id = UnitId::from_raw(self.slots.len() as u32);
        self.by_path.insert(slot.path().clone(), id);
        self.slots.push(slot);
        Ok(id)
    }

    /// Returns the slot for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this arena.
    pub fn slot(&self, id: UnitId) -> &UnitSlot {
        &self.slots[id.index()]
    }

    /// Returns the slot registered under `path`.
    pub fn lookup(&self, path: &CanonicalPath) -> Option<UnitId> {
        self.by_path.get(path).copied()
    }

    /// Returns the unit answering for `id`, following a redirect once.
    pub fn unit(&self, id: UnitId) -> &Arc<CompilationUnit> {
        match self.slot(id) {
            UnitSlot::Source(unit) => unit,
            UnitSlot::Redirect(redirect) => match self.slot(redirect.target) {
                UnitSlot::Source(unit) => unit,
                // Targets are always source slots.
                UnitSlot::Redirect(inner) => &inner.unredirected,
            },
        }
    }

    /// Returns the unit registered under `path`, following a redirect once.
    pub fn unit_at(&self, path: &CanonicalPath) -> Option<&Arc<CompilationUnit>> {
        self.lookup(path).map(|id| self.unit(id))
    }

    /// Iterates over slots in order.
    pub fn iter(&self) -> impl Iterator<Item = (UnitId, &UnitSlot)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (UnitId::from_raw(i as u32), slot))
    }

    /// Number of slots, redirects included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the arena holds no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_common::Canonicalizer;

    fn unit(name: &str) -> Arc<CompilationUnit> {
        let path = Canonicalizer::new(true).canonical(name);
        Arc::new(CompilationUnit::new(name, path, "export {};".into(), None))
    }

    #[test]
    fn insert_and_lookup() {
        let mut arena = UnitArena::new();
        let a = arena.insert(UnitSlot::Source(unit("/a.ts"))).unwrap();
        let b = arena.insert(UnitSlot::Source(unit("/b.ts"))).unwrap();
        assert_ne!(a, b);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.lookup(&unit("/b.ts").path), Some(b));
        assert_eq!(arena.unit(a).file_name, "/a.ts");
    }

    #[test]
    fn duplicate_path_rejected() {
        let mut arena = UnitArena::new();
        let a = arena.insert(UnitSlot::Source(unit("/a.ts"))).unwrap();
        let err = arena.insert(UnitSlot::Source(unit("/a.ts"))).unwrap_err();
        assert_eq!(err.existing, a);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn redirect_resolves_to_target() {
        let mut arena = UnitArena::new();
        let target_unit = unit("/node_modules/x/index.d.ts");
        let target = arena.insert(UnitSlot::Source(target_unit.clone())).unwrap();
        let copy = unit("/node_modules/y/node_modules/x/index.d.ts");
        let redirect = arena
            .insert(UnitSlot::Redirect(Redirect {
                file_name: copy.file_name.clone(),
                path: copy.path.clone(),
                target,
                unredirected: copy.clone(),
            }))
            .unwrap();
        assert!(arena.slot(redirect).is_redirect());
        assert!(Arc::ptr_eq(arena.unit(redirect), &target_unit));
        assert_eq!(arena.slot(redirect).path(), &copy.path);
        assert!(Arc::ptr_eq(arena.unit_at(&copy.path).unwrap(), &target_unit));
    }
}
