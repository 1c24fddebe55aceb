//! Deciding how much of a previous program a new request can keep.
//!
//! The verdict starts at [`ReuseVerdict::Completely`] and only ever moves
//! down. Request-level differences (roots, resolution options, references,
//! files that used to be missing) force a full rebuild; per-unit changes
//! force the builder to run again, reusing unchanged units and their
//! resolutions.

use crate::graph::ProgramGraph;
use crate::host::{ChangeOracle, CompilerHost, UnitRequest};
use crate::references::{same_references, ResolvedProjectReference};
use keel_common::{CanonicalPath, KeelResult};
use keel_config::affects::{affects_program_structure, diff_options};
use keel_config::{CompilerOptions, OptionEffect};
use keel_resolve::{FileSystem, HostError, Resolution, ResolutionCache, UnresolvedReason};
use keel_source::reference::{same_references as same_directives, same_specifiers};
use keel_source::{CompilationUnit, UnitSlot};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// How much of the previous program was kept, ordered
/// `Not < SafeModules < Completely`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReuseVerdict {
    /// Everything was rebuilt.
    Not,
    /// Files were rediscovered; unchanged units kept their resolutions.
    SafeModules,
    /// The previous program was carried over as is.
    Completely,
}

impl ReuseVerdict {
    /// The lower of `self` and `to`. A verdict never moves up.
    #[must_use]
    pub fn downgrade(self, to: ReuseVerdict) -> ReuseVerdict {
        self.min(to)
    }
}

/// The first structural difference found in a changed unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSignal {
    /// The module format the unit is interpreted under.
    ImpliedFormat,
    /// `/// <reference lib>` directives.
    LibReferences,
    /// The `no-default-lib` directive.
    NoDefaultLib,
    /// `/// <reference path>` directives.
    FileReferences,
    /// Import specifiers.
    Imports,
    /// Module augmentations.
    ModuleAugmentations,
    /// `/// <reference types>` directives.
    TypeReferences,
    /// Only the text changed.
    Content,
    /// The unit did not change but the host invalidated its resolutions.
    InvalidatedResolutions,
}

/// Returns the first signal that distinguishes `new` from `old`.
pub fn change_signal(old: &CompilationUnit, new: &CompilationUnit) -> ChangeSignal {
    if old.implied_format != new.implied_format {
        ChangeSignal::ImpliedFormat
    } else if !same_directives(&old.lib_reference_directives, &new.lib_reference_directives) {
        ChangeSignal::LibReferences
    } else if old.flags.has_no_default_lib != new.flags.has_no_default_lib {
        ChangeSignal::NoDefaultLib
    } else if !same_directives(&old.referenced_files, &new.referenced_files) {
        ChangeSignal::FileReferences
    } else if !same_specifiers(&old.imports, &new.imports) {
        ChangeSignal::Imports
    } else if old.module_augmentations != new.module_augmentations {
        ChangeSignal::ModuleAugmentations
    } else if !same_directives(&old.type_reference_directives, &new.type_reference_directives) {
        ChangeSignal::TypeReferences
    } else {
        ChangeSignal::Content
    }
}

/// What happened when a program was derived from its predecessor.
#[derive(Clone, Debug, Serialize)]
pub struct ReuseReport {
    /// The final verdict.
    pub verdict: ReuseVerdict,
    /// Why the verdict is below `Completely`.
    pub reason: Option<String>,
    /// Changed or invalidated units with the signal that queued them.
    pub signals: Vec<(CanonicalPath, ChangeSignal)>,
    /// Units whose specifiers went through re-resolution.
    pub reresolved: Vec<CanonicalPath>,
    /// Units whose resolutions differ from the previous program.
    pub changed_resolutions: Vec<CanonicalPath>,
    /// Number of units whose cached diagnostics were dropped.
    pub evicted_diagnostics: usize,
}

impl ReuseReport {
    /// A report for a program built from scratch.
    pub fn rebuilt(reason: impl Into<String>) -> Self {
        Self {
            verdict: ReuseVerdict::Not,
            reason: Some(reason.into()),
            signals: Vec::new(),
            reresolved: Vec::new(),
            changed_resolutions: Vec::new(),
            evicted_diagnostics: 0,
        }
    }
}

/// The request-level facts the decision compares.
pub(crate) struct NewRequest<'a> {
    pub root_names: &'a [String],
    pub options: &'a CompilerOptions,
    pub project_dir: &'a str,
    pub lib_dir: &'a str,
    pub references: &'a [Option<Arc<ResolvedProjectReference>>],
}

/// The outcome of [`decide`].
pub(crate) struct Decision {
    pub verdict: ReuseVerdict,
    pub reason: Option<String>,
    pub signals: Vec<(CanonicalPath, ChangeSignal)>,
    /// Units as the host returns them now, by path.
    pub units: HashMap<CanonicalPath, Arc<CompilationUnit>>,
    /// Units whose content changed.
    pub modified: HashSet<CanonicalPath>,
    /// Units that must be re-resolved.
    pub queued: HashSet<CanonicalPath>,
}

impl Decision {
    fn new() -> Self {
        Self {
            verdict: ReuseVerdict::Completely,
            reason: None,
            signals: Vec::new(),
            units: HashMap::new(),
            modified: HashSet::new(),
            queued: HashSet::new(),
        }
    }

    fn downgrade(&mut self, to: ReuseVerdict, reason: impl FnOnce() -> String) {
        if to < self.verdict {
            self.verdict = self.verdict.downgrade(to);
            self.reason = Some(reason());
        }
    }

    fn not(mut self, reason: impl Into<String>) -> Self {
        self.verdict = ReuseVerdict::Not;
        self.reason = Some(reason.into());
        self
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum SeenPackage {
    Exists,
    Modified,
}

/// Compares `old` with a new request.
///
/// `cache` is the next generation's cache; it supplies implied formats for
/// re-requested units. Only cancellation fails.
pub(crate) fn decide(
    old: &ProgramGraph,
    new: &NewRequest<'_>,
    host: &dyn CompilerHost,
    cache: &mut ResolutionCache,
    oracle: &dyn ChangeOracle,
) -> KeelResult<Decision> {
    let mut decision = Decision::new();
    if old.root_names != new.root_names {
        return Ok(decision.not("root file names changed"));
    }
    if let Some(change) = diff_options(&old.options, new.options)
        .into_iter()
        .find(|c| c.effect == OptionEffect::ModuleResolution)
    {
        return Ok(decision.not(format!("option `{}` affects module resolution", change.name)));
    }
    if old.options.types != new.options.types {
        return Ok(decision.not("option `types` changed"));
    }
    if old.project_dir != new.project_dir || old.lib_dir != new.lib_dir {
        return Ok(decision.not("project or library directory changed"));
    }
    if !same_references(&old.project_references, new.references) {
        return Ok(decision.not("project references changed"));
    }
    let fs = host.file_system();
    if let Some(found) = old.missing.iter().find(|path| fs.file_exists(path.as_str())) {
        return Ok(decision.not(format!("missing file `{found}` now exists")));
    }

    let mut seen_packages: HashMap<&str, SeenPackage> = HashMap::new();
    for slot in old.units() {
        let path = slot.path();
        host.check_cancelled()?;
        let request = UnitRequest {
            file_name: slot.file_name().to_string(),
            path: path.clone(),
            implied_format: cache.implied_format(fs, slot.file_name()),
        };
        let current = match host.get_unit(&request) {
            Ok(Some(unit)) => unit,
            Ok(None) => return Ok(decision.not(format!("`{}` no longer exists", slot.file_name()))),
            Err(HostError::Cancelled(c)) => return Err(c),
            Err(HostError::Io { message, .. }) => {
                return Ok(decision.not(format!("cannot read `{}`: {message}", slot.file_name())))
            }
        };
        let changed = match slot {
            UnitSlot::Source(old_unit) => !Arc::ptr_eq(old_unit, &current),
            UnitSlot::Redirect(redirect) => !Arc::ptr_eq(&redirect.unredirected, &current),
        };

        if let Some(name) = old.package_names.get(path) {
            // Two files of one package where either changed may now collapse
            // into a redirect, or stop being one.
            let kind = if changed { SeenPackage::Modified } else { SeenPackage::Exists };
            match seen_packages.get(name.as_str()) {
                Some(SeenPackage::Modified) => {
                    return Ok(decision.not(format!("files of package `{name}` changed")))
                }
                Some(SeenPackage::Exists) if kind == SeenPackage::Modified => {
                    return Ok(decision.not(format!("files of package `{name}` changed")))
                }
                _ => {}
            }
            seen_packages.insert(name.as_str(), kind);
        }

        match slot {
            UnitSlot::Redirect(_) if changed => {
                return Ok(decision.not(format!("redirected file `{}` changed", slot.file_name())));
            }
            UnitSlot::Source(old_unit) if changed => {
                if old.redirect_targets.contains_key(path) {
                    return Ok(decision.not(format!("redirect target `{}` changed", slot.file_name())));
                }
                let signal = change_signal(old_unit, &current);
                tracing::trace!(unit = %path, ?signal, "unit changed");
                decision.downgrade(ReuseVerdict::SafeModules, || {
                    format!("`{}` changed ({signal:?})", slot.file_name())
                });
                decision.signals.push((path.clone(), signal));
                decision.modified.insert(path.clone());
                decision.queued.insert(path.clone());
            }
            UnitSlot::Source(old_unit)
                if oracle.has_invalidated_resolutions(path)
                    || failed_lookup_now_resolves(old, old_unit, fs, cache) =>
            {
                decision.downgrade(ReuseVerdict::SafeModules, || {
                    format!("resolutions of `{}` were invalidated", slot.file_name())
                });
                decision
                    .signals
                    .push((path.clone(), ChangeSignal::InvalidatedResolutions));
                decision.queued.insert(path.clone());
            }
            _ => {}
        }
        decision.units.insert(path.clone(), current);
    }

    if decision.verdict == ReuseVerdict::Completely {
        if affects_program_structure(&old.options, new.options) {
            decision.downgrade(ReuseVerdict::SafeModules, || {
                "an option affecting program structure changed".to_string()
            });
        } else if oracle.has_changed_automatic_type_directive_names() {
            decision.downgrade(ReuseVerdict::SafeModules, || {
                "automatic type directive names changed".to_string()
            });
        }
    }
    Ok(decision)
}

/// Returns `true` if an import of `unit` that found nothing last time
/// resolves now. The cache has dropped its negative entries, so this looks
/// at the filesystem again.
fn failed_lookup_now_resolves(
    old: &ProgramGraph,
    unit: &CompilationUnit,
    fs: &dyn FileSystem,
    cache: &mut ResolutionCache,
) -> bool {
    let Some(resolutions) = old.resolutions.get(&unit.path) else {
        return false;
    };
    unit.imports
        .iter()
        .zip(&resolutions.modules)
        .any(|(import, module)| {
            matches!(module, Some(Resolution::Unresolved(UnresolvedReason::NotFound)))
                && cache
                    .resolve_module(fs, &import.text, &unit.file_name, unit.mode_for_import(import))
                    .is_resolved()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_common::Canonicalizer;

    fn unit(text: &str) -> CompilationUnit {
        CompilationUnit::new("/a.ts", Canonicalizer::new(true).canonical("/a.ts"), text.to_string(), None)
    }

    #[test]
    fn verdict_only_moves_down() {
        use ReuseVerdict::*;
        assert!(Not < SafeModules && SafeModules < Completely);
        assert_eq!(Completely.downgrade(SafeModules), SafeModules);
        assert_eq!(SafeModules.downgrade(Completely), SafeModules);
        assert_eq!(Not.downgrade(Completely), Not);
    }

    #[test]
    fn decision_downgrade_keeps_first_reason() {
        let mut d = Decision::new();
        d.downgrade(ReuseVerdict::SafeModules, || "first".into());
        d.downgrade(ReuseVerdict::SafeModules, || "second".into());
        d.downgrade(ReuseVerdict::Completely, || "up".into());
        assert_eq!(d.verdict, ReuseVerdict::SafeModules);
        assert_eq!(d.reason.as_deref(), Some("first"));
    }

    #[test]
    fn signals_in_precedence_order() {
        let base = unit("/// <reference path=\"x.ts\" />\nimport './b';\n");
        assert_eq!(
            change_signal(&base, &unit("/// <reference path=\"x.ts\" />\nimport './b';\nlet x = 1;\n")),
            ChangeSignal::Content
        );
        assert_eq!(
            change_signal(&base, &unit("/// <reference path=\"x.ts\" />\nimport './c';\n")),
            ChangeSignal::Imports
        );
        assert_eq!(
            change_signal(&base, &unit("/// <reference path=\"y.ts\" />\nimport './c';\n")),
            ChangeSignal::FileReferences
        );
        assert_eq!(
            change_signal(
                &base,
                &unit("/// <reference lib=\"dom\" />\n/// <reference path=\"y.ts\" />\nimport './c';\n")
            ),
            ChangeSignal::LibReferences
        );
        assert_eq!(
            change_signal(
                &base,
                &unit("/// <reference path=\"x.ts\" />\nimport './b';\ndeclare module 'm' {}\n")
            ),
            ChangeSignal::ModuleAugmentations
        );
        assert_eq!(
            change_signal(
                &base,
                &unit("/// <reference path=\"x.ts\" />\n/// <reference types=\"node\" />\nimport './b';\n")
            ),
            ChangeSignal::TypeReferences
        );
    }

    #[test]
    fn rebuilt_report() {
        let report = ReuseReport::rebuilt("no previous program");
        assert_eq!(report.verdict, ReuseVerdict::Not);
        assert_eq!(report.reason.as_deref(), Some("no previous program"));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["verdict"], "not");
    }
}
