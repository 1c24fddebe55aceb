//! Option combinations validated once the file set is known.

use crate::errors::{self, option_error};
use crate::libs::{closest_lib_name, lib_file_name};
use crate::references::{for_each_reference, ResolvedProjectReference};
use keel_common::path::{combine_paths, is_rooted};
use keel_common::{CanonicalPath, Canonicalizer};
use keel_config::{CompilerOptions, ModuleKind, ModuleResolution};
use keel_diagnostics::Diagnostic;
use keel_source::{CompilationUnit, Extension};
use std::collections::HashSet;
use std::sync::Arc;

/// What the option checks look at besides the options themselves.
pub(crate) struct CheckInput<'a> {
    pub options: &'a CompilerOptions,
    pub project_dir: &'a str,
    pub canon: Canonicalizer,
    pub root_paths: &'a HashSet<CanonicalPath>,
    /// Non-library source units in program order.
    pub units: Vec<&'a Arc<CompilationUnit>>,
    /// Units found by searching package directories.
    pub external_paths: &'a HashSet<CanonicalPath>,
    pub references: &'a [Option<Arc<ResolvedProjectReference>>],
}

/// Runs every option check.
pub(crate) fn check_options(input: &CheckInput<'_>) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    let options = input.options;

    if options.lib.is_some() && options.no_lib {
        out.push(option_error(
            errors::O101,
            "option `lib` cannot be specified with option `no_lib`",
        ));
    }
    if options.emit_declaration_only {
        if options.no_emit {
            out.push(option_error(
                errors::O102,
                "option `emit_declaration_only` cannot be specified with option `no_emit`",
            ));
        }
        if !options.emits_declarations() {
            out.push(option_error(
                errors::O103,
                "option `emit_declaration_only` requires `declaration` or `composite`",
            ));
        }
    }
    if options.composite && options.declaration == Some(false) {
        out.push(option_error(
            errors::O104,
            "composite projects may not disable declaration emit",
        ));
    }
    check_out_file(input, &mut out);
    if options.resolve_json_module && options.effective_module_resolution() == ModuleResolution::Classic {
        out.push(option_error(
            errors::O106,
            "option `resolve_json_module` cannot be used with `classic` module resolution",
        ));
    }
    check_paths(options, &mut out);
    check_lib_names(options, &mut out);
    check_emitted_files(input, &mut out);

    for_each_reference(input.references, &mut |reference| {
        if !reference.options.composite {
            out.push(option_error(
                errors::P102,
                format!(
                    "referenced project `{}` must have `composite = true`",
                    reference.config_file
                ),
            ));
        }
    });
    out
}

fn check_out_file(input: &CheckInput<'_>, out: &mut Vec<Diagnostic>) {
    let options = input.options;
    if options.out_file.is_none() {
        return;
    }
    let message = "cannot concatenate modules into `out_file` unless `module` is `amd` or `system`";
    match options.module {
        Some(ModuleKind::None | ModuleKind::Amd | ModuleKind::System) => {}
        Some(_) => out.push(option_error(errors::O105, message)),
        None => {
            if let Some(first) = input
                .units
                .iter()
                .find(|unit| unit.flags.is_external_module && !unit.is_declaration())
            {
                out.push(option_error(errors::O105, message).with_note(format!(
                    "`{}` is a module",
                    first.file_name
                )));
            }
        }
    }
}

fn check_paths(options: &CompilerOptions, out: &mut Vec<Diagnostic>) {
    for (pattern, substitutions) in &options.paths {
        if pattern.matches('*').count() > 1 {
            out.push(option_error(
                errors::O107,
                format!("pattern `{pattern}` can have at most one `*` character"),
            ));
        }
        if substitutions.is_empty() {
            out.push(option_error(
                errors::O107,
                format!("substitutions for pattern `{pattern}` must not be empty"),
            ));
        }
        for substitution in substitutions {
            if substitution.matches('*').count() > 1 {
                out.push(option_error(
                    errors::O107,
                    format!(
                        "substitution `{substitution}` in pattern `{pattern}` can have at most one `*` character"
                    ),
                ));
            }
            let relative = substitution.starts_with("./") || substitution.starts_with("../");
            if options.base_url.is_none() && !relative && !is_rooted(substitution) {
                out.push(option_error(
                    errors::O107,
                    format!("non-relative substitution `{substitution}` requires `base_url`"),
                ));
            }
        }
    }
}

fn check_lib_names(options: &CompilerOptions, out: &mut Vec<Diagnostic>) {
    for name in options.lib.iter().flatten() {
        if lib_file_name(name).is_none() {
            let d = option_error(errors::O110, format!("unknown library `{name}` in option `lib`"));
            out.push(match closest_lib_name(name) {
                Some(s) => d.with_help(format!("did you mean `{s}`?")),
                None => d,
            });
        }
    }
}

/// `root_dir` containment and `composite` file listing, for units that
/// produce output.
fn check_emitted_files(input: &CheckInput<'_>, out: &mut Vec<Diagnostic>) {
    let options = input.options;
    let root_dir = options
        .root_dir
        .as_ref()
        .map(|dir| input.canon.canonical(&combine_paths(input.project_dir, dir)));
    for unit in &input.units {
        if unit.is_declaration()
            || unit.flags.kind == Extension::Json
            || input.external_paths.contains(&unit.path)
        {
            continue;
        }
        if let Some(root_dir) = &root_dir {
            if !unit.path.is_under(root_dir) {
                out.push(option_error(
                    errors::O108,
                    format!("file `{}` is not under `root_dir` `{root_dir}`", unit.file_name),
                ));
            }
        }
        if options.composite && !input.root_paths.contains(&unit.path) {
            out.push(option_error(
                errors::O109,
                format!(
                    "file `{}` is not listed in the project's files; composite projects must list every file",
                    unit.file_name
                ),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn canon() -> Canonicalizer {
        Canonicalizer::new(true)
    }

    fn unit(path: &str, text: &str) -> Arc<CompilationUnit> {
        Arc::new(CompilationUnit::new(path, canon().canonical(path), text.to_string(), None))
    }

    fn run(options: &CompilerOptions, units: &[Arc<CompilationUnit>], roots: &[&str]) -> Vec<Diagnostic> {
        let root_paths: HashSet<CanonicalPath> = roots.iter().map(|r| canon().canonical(r)).collect();
        let external = HashSet::new();
        check_options(&CheckInput {
            options,
            project_dir: "/p",
            canon: canon(),
            root_paths: &root_paths,
            units: units.iter().collect(),
            external_paths: &external,
            references: &[],
        })
    }

    fn codes(diags: &[Diagnostic]) -> Vec<String> {
        diags.iter().map(|d| d.code.to_string()).collect()
    }

    #[test]
    fn default_options_are_valid() {
        assert!(run(&CompilerOptions::default(), &[unit("/p/a.ts", "")], &["/p/a.ts"]).is_empty());
    }

    #[test]
    fn conflicting_flags() {
        let options = CompilerOptions {
            lib: Some(vec!["es5".into()]),
            no_lib: true,
            emit_declaration_only: true,
            no_emit: true,
            composite: true,
            declaration: Some(false),
            ..CompilerOptions::default()
        };
        assert_eq!(codes(&run(&options, &[], &[])), ["O101", "O102", "O103", "O104"]);
    }

    #[test]
    fn out_file_with_modules() {
        let modules = [unit("/p/a.ts", "export const a = 1;\n")];
        let mut options = CompilerOptions {
            out_file: Some("out.js".into()),
            ..CompilerOptions::default()
        };
        assert_eq!(codes(&run(&options, &modules, &["/p/a.ts"])), ["O105"]);
        let scripts = [unit("/p/a.ts", "const a = 1;\n")];
        assert!(run(&options, &scripts, &["/p/a.ts"]).is_empty());
        options.module = Some(ModuleKind::Amd);
        assert!(run(&options, &modules, &["/p/a.ts"]).is_empty());
        options.module = Some(ModuleKind::CommonJs);
        assert_eq!(codes(&run(&options, &scripts, &["/p/a.ts"])), ["O105"]);
    }

    #[test]
    fn json_under_classic() {
        let options = CompilerOptions {
            resolve_json_module: true,
            module_resolution: Some(ModuleResolution::Classic),
            ..CompilerOptions::default()
        };
        assert_eq!(codes(&run(&options, &[], &[])), ["O106"]);
    }

    #[test]
    fn malformed_paths() {
        let mut paths = BTreeMap::new();
        paths.insert("@a/*/*".to_string(), vec!["./src/*".to_string()]);
        paths.insert("@b/*".to_string(), vec![]);
        paths.insert("@c/*".to_string(), vec!["src/*".to_string(), "./x/*/*".to_string()]);
        let options = CompilerOptions {
            paths,
            ..CompilerOptions::default()
        };
        assert_eq!(codes(&run(&options, &[], &[])), ["O107", "O107", "O107", "O107"]);
    }

    #[test]
    fn unknown_lib_suggests() {
        let options = CompilerOptions {
            lib: Some(vec!["es5".into(), "dom.iterables".into()]),
            ..CompilerOptions::default()
        };
        let diags = run(&options, &[], &[]);
        assert_eq!(codes(&diags), ["O110"]);
        assert_eq!(diags[0].help, vec!["did you mean `dom.iterable`?".to_string()]);
    }

    #[test]
    fn root_dir_and_composite_listing() {
        let units = [
            unit("/p/src/a.ts", ""),
            unit("/p/other/b.ts", ""),
            unit("/p/src/types.d.ts", ""),
        ];
        let options = CompilerOptions {
            root_dir: Some("src".into()),
            composite: true,
            ..CompilerOptions::default()
        };
        let diags = run(&options, &units, &["/p/src/a.ts"]);
        assert_eq!(codes(&diags), ["O108", "O109"]);
        assert!(diags[0].message.contains("/p/other/b.ts"));
    }
}
