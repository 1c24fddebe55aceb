//! Classification of option differences between two program generations.
//!
//! Each option belongs to the narrowest group it can invalidate. A change in
//! a resolution-affecting option makes every cached resolution suspect, a
//! structure-affecting one changes which files are in the program without
//! touching resolutions, and a semantic one only invalidates cached
//! diagnostics.

use crate::types::CompilerOptions;

/// What a difference in an option invalidates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OptionEffect {
    /// Output only; nothing about the program changes.
    Emit,
    /// Cached diagnostics.
    SemanticDiagnostics,
    /// The set of files in the program.
    ProgramStructure,
    /// Every module and type-reference resolution.
    ModuleResolution,
}

/// One option whose value differs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OptionChange {
    /// The option's `keel.toml` key.
    pub name: &'static str,
    /// What the change invalidates.
    pub effect: OptionEffect,
}

/// Lists every option that differs between `old` and `new`.
pub fn diff_options(old: &CompilerOptions, new: &CompilerOptions) -> Vec<OptionChange> {
    use OptionEffect::*;

    let mut changes = Vec::new();
    let mut check = |name: &'static str, effect: OptionEffect, differs: bool| {
        if differs {
            changes.push(OptionChange { name, effect });
        }
    };

    check("target", ModuleResolution, old.target != new.target);
    check("module", ModuleResolution, old.module != new.module);
    check(
        "module_resolution",
        ModuleResolution,
        old.module_resolution != new.module_resolution,
    );
    check("base_url", ModuleResolution, old.base_url != new.base_url);
    check("paths", ModuleResolution, old.paths != new.paths);
    check("type_roots", ModuleResolution, old.type_roots != new.type_roots);
    check("allow_js", ModuleResolution, old.allow_js != new.allow_js);
    check(
        "resolve_json_module",
        ModuleResolution,
        old.resolve_json_module != new.resolve_json_module,
    );
    check(
        "preserve_symlinks",
        ModuleResolution,
        old.preserve_symlinks != new.preserve_symlinks,
    );
    check("no_resolve", ModuleResolution, old.no_resolve != new.no_resolve);
    check(
        "max_package_depth",
        ModuleResolution,
        old.max_package_depth != new.max_package_depth,
    );
    check(
        "force_consistent_casing",
        ModuleResolution,
        old.force_consistent_casing != new.force_consistent_casing,
    );

    check("types", ProgramStructure, old.types != new.types);
    check("lib", ProgramStructure, old.lib != new.lib);
    check("no_lib", ProgramStructure, old.no_lib != new.no_lib);

    check("strict", SemanticDiagnostics, old.strict != new.strict);
    check(
        "isolated_modules",
        SemanticDiagnostics,
        old.isolated_modules != new.isolated_modules,
    );
    check(
        "skip_lib_check",
        SemanticDiagnostics,
        old.skip_lib_check != new.skip_lib_check,
    );
    check("composite", SemanticDiagnostics, old.composite != new.composite);
    check("declaration", SemanticDiagnostics, old.declaration != new.declaration);
    check("root_dir", SemanticDiagnostics, old.root_dir != new.root_dir);

    check("out_file", Emit, old.out_file != new.out_file);
    check("out_dir", Emit, old.out_dir != new.out_dir);
    check(
        "declaration_dir",
        Emit,
        old.declaration_dir != new.declaration_dir,
    );
    check(
        "emit_declaration_only",
        Emit,
        old.emit_declaration_only != new.emit_declaration_only,
    );
    check("no_emit", Emit, old.no_emit != new.no_emit);

    changes
}

/// Returns `true` if any resolution-affecting option differs.
pub fn affects_module_resolution(old: &CompilerOptions, new: &CompilerOptions) -> bool {
    any_with(old, new, OptionEffect::ModuleResolution)
}

/// Returns `true` if any structure-affecting option differs.
pub fn affects_program_structure(old: &CompilerOptions, new: &CompilerOptions) -> bool {
    any_with(old, new, OptionEffect::ProgramStructure)
}

/// Returns `true` if any option that can change diagnostics differs.
///
/// Resolution and structure changes count, since they change what the
/// checker sees.
pub fn affects_semantic_diagnostics(old: &CompilerOptions, new: &CompilerOptions) -> bool {
    diff_options(old, new)
        .iter()
        .any(|c| c.effect >= OptionEffect::SemanticDiagnostics)
}

fn any_with(old: &CompilerOptions, new: &CompilerOptions, effect: OptionEffect) -> bool {
    diff_options(old, new).iter().any(|c| c.effect == effect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModuleResolution;

    #[test]
    fn identical_options_have_no_changes() {
        let opts = CompilerOptions::default();
        assert!(diff_options(&opts, &opts.clone()).is_empty());
        assert!(!affects_semantic_diagnostics(&opts, &opts));
    }

    #[test]
    fn resolution_options() {
        let old = CompilerOptions::default();
        let mut new = old.clone();
        new.module_resolution = Some(ModuleResolution::Bundler);
        assert!(affects_module_resolution(&old, &new));
        assert!(!affects_program_structure(&old, &new));
        assert!(affects_semantic_diagnostics(&old, &new));

        let mut paths = old.clone();
        paths.paths.insert("@x/*".into(), vec!["src/*".into()]);
        assert_eq!(
            diff_options(&old, &paths),
            vec![OptionChange {
                name: "paths",
                effect: OptionEffect::ModuleResolution
            }]
        );
    }

    #[test]
    fn structure_options() {
        let old = CompilerOptions::default();
        let mut new = old.clone();
        new.lib = Some(vec!["es2015".into()]);
        assert!(affects_program_structure(&old, &new));
        assert!(!affects_module_resolution(&old, &new));
    }

    #[test]
    fn emit_options_do_not_touch_diagnostics() {
        let old = CompilerOptions::default();
        let mut new = old.clone();
        new.out_dir = Some("dist".into());
        assert_eq!(diff_options(&old, &new).len(), 1);
        assert!(!affects_semantic_diagnostics(&old, &new));
    }

    #[test]
    fn strict_is_semantic_only() {
        let old = CompilerOptions::default();
        let mut new = old.clone();
        new.strict = true;
        assert!(affects_semantic_diagnostics(&old, &new));
        assert!(!affects_program_structure(&old, &new));
    }
}
