//! Two-phase re-resolution of a changed unit's specifiers.
//!
//! Phase one classifies every specifier without touching the filesystem:
//! names satisfied by an ambient module declaration are *predicted*, and
//! successful resolutions of an unchanged, non-invalidated unit are reused.
//! Phase two resolves everything left in a single batch. The result is
//! reassembled in specifier order with predictions collapsed to "no
//! resolution needed".

use keel_resolve::{Resolution, TypeReferenceResolution};
use keel_source::{CompilationUnit, ModuleFormat};

/// The state of one specifier between the two phases.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Slot<T> {
    /// Satisfied by an ambient module declaration; nothing to resolve.
    Predicted,
    /// Known without resolving.
    Resolved(T),
    /// Needs resolving.
    Pending,
}

/// What phase one may consult about the previous generation.
pub(crate) struct PriorState<'a> {
    /// The previous generation's resolutions for this unit, when the unit is
    /// identical to the previous one and its resolutions were not
    /// invalidated. Indexed like the unit's import list.
    pub reusable_modules: Option<&'a [Option<Resolution>]>,
    /// As `reusable_modules`, for type-reference directives.
    pub reusable_type_references: Option<&'a [TypeReferenceResolution]>,
    /// Returns `true` if the previous generation declares `name` as an
    /// ambient module in a file that has not been modified.
    pub ambient_in_unmodified_file: &'a dyn Fn(&str) -> bool,
}

/// Re-resolves `unit`'s imports. `resolve` is called once, with the
/// pending `(specifier, mode)` pairs in specifier order.
pub(crate) fn reresolve_modules(
    unit: &CompilationUnit,
    prior: &PriorState<'_>,
    resolve: impl FnOnce(&[(&str, Option<ModuleFormat>)]) -> Vec<Resolution>,
) -> Vec<Option<Resolution>> {
    let mut slots: Vec<Slot<Resolution>> = Vec::with_capacity(unit.imports.len());
    for (index, import) in unit.imports.iter().enumerate() {
        let reused = prior
            .reusable_modules
            .and_then(|old| old.get(index))
            .and_then(|old| old.as_ref())
            .filter(|old| old.is_resolved());
        let slot = if let Some(old) = reused {
            Slot::Resolved(old.clone())
        } else if unit.ambient_modules.iter().any(|name| *name == import.text)
            || (prior.ambient_in_unmodified_file)(&import.text)
        {
            Slot::Predicted
        } else {
            Slot::Pending
        };
        slots.push(slot);
    }

    let pending: Vec<(&str, Option<ModuleFormat>)> = unit
        .imports
        .iter()
        .zip(&slots)
        .filter(|(_, slot)| matches!(slot, Slot::Pending))
        .map(|(import, _)| (import.text.as_str(), unit.mode_for_import(import)))
        .collect();
    tracing::trace!(
        unit = %unit.path,
        imports = slots.len(),
        pending = pending.len(),
        "re-resolving module specifiers"
    );
    let resolved = if pending.is_empty() {
        Vec::new()
    } else {
        resolve(&pending)
    };
    fill(slots, resolved)
        .into_iter()
        .map(|slot| match slot {
            Slot::Resolved(resolution) => Some(resolution),
            Slot::Predicted | Slot::Pending => None,
        })
        .collect()
}

/// Re-resolves `unit`'s type-reference directives; there are no ambient
/// predictions for these.
pub(crate) fn reresolve_type_references(
    unit: &CompilationUnit,
    prior: &PriorState<'_>,
    resolve: impl FnOnce(&[(&str, Option<ModuleFormat>)]) -> Vec<TypeReferenceResolution>,
) -> Vec<TypeReferenceResolution> {
    let slots: Vec<Slot<TypeReferenceResolution>> = unit
        .type_reference_directives
        .iter()
        .enumerate()
        .map(|(index, _)| {
            prior
                .reusable_type_references
                .and_then(|old| old.get(index))
                .filter(|old| old.resolved().is_some())
                .map_or(Slot::Pending, |old| Slot::Resolved(old.clone()))
        })
        .collect();
    let pending: Vec<(&str, Option<ModuleFormat>)> = unit
        .type_reference_directives
        .iter()
        .zip(&slots)
        .filter(|(_, slot)| matches!(slot, Slot::Pending))
        .map(|(directive, _)| (directive.file_name.as_str(), unit.mode_for_reference(directive)))
        .collect();
    let resolved = if pending.is_empty() {
        Vec::new()
    } else {
        resolve(&pending)
    };
    fill(slots, resolved)
        .into_iter()
        .filter_map(|slot| match slot {
            Slot::Resolved(resolution) => Some(resolution),
            Slot::Predicted | Slot::Pending => None,
        })
        .collect()
}

/// Merges batch results positionally into the pending slots.
fn fill<T>(slots: Vec<Slot<T>>, resolved: Vec<T>) -> Vec<Slot<T>> {
    let mut resolved = resolved.into_iter();
    slots
        .into_iter()
        .map(|slot| match slot {
            Slot::Pending => resolved.next().map_or(Slot::Pending, Slot::Resolved),
            other => other,
        })
        .collect()
}
