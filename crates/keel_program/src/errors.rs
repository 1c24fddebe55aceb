//! Diagnostic codes and helper functions for program construction.
//!
//! `R1xx` codes cover resolution failures, `F1xx` file discovery and graph
//! structure, `O1xx` option validation, `P1xx` project references and `H1xx`
//! host faults.

use keel_diagnostics::{Category, Diagnostic, DiagnosticCode, Label};
use keel_source::Span;

/// Module specifier has no target.
pub const R101: DiagnosticCode = DiagnosticCode::new(Category::Resolution, 101);
/// Module resolved to a file kind the options do not enable.
pub const R102: DiagnosticCode = DiagnosticCode::new(Category::Resolution, 102);
/// Resolution failed with a host fault.
pub const R103: DiagnosticCode = DiagnosticCode::new(Category::Resolution, 103);
/// Type-reference directive has no target.
pub const R104: DiagnosticCode = DiagnosticCode::new(Category::Resolution, 104);
/// Two different files define the same type library.
pub const R105: DiagnosticCode = DiagnosticCode::new(Category::Resolution, 105);

/// Referenced or root file does not exist.
pub const F101: DiagnosticCode = DiagnosticCode::new(Category::File, 101);
/// Referenced file has an unsupported extension.
pub const F102: DiagnosticCode = DiagnosticCode::new(Category::File, 102);
/// File names differ only in case.
pub const F103: DiagnosticCode = DiagnosticCode::new(Category::File, 103);
/// Unknown library name.
pub const F104: DiagnosticCode = DiagnosticCode::new(Category::File, 104);
/// Two units claim the same path.
pub const F105: DiagnosticCode = DiagnosticCode::new(Category::File, 105);

/// `lib` combined with `no_lib`.
pub const O101: DiagnosticCode = DiagnosticCode::new(Category::Options, 101);
/// `emit_declaration_only` combined with `no_emit`.
pub const O102: DiagnosticCode = DiagnosticCode::new(Category::Options, 102);
/// `emit_declaration_only` without declaration output.
pub const O103: DiagnosticCode = DiagnosticCode::new(Category::Options, 103);
/// `composite` with `declaration = false`.
pub const O104: DiagnosticCode = DiagnosticCode::new(Category::Options, 104);
/// `out_file` with a module system that cannot be concatenated.
pub const O105: DiagnosticCode = DiagnosticCode::new(Category::Options, 105);
/// `resolve_json_module` under classic resolution.
pub const O106: DiagnosticCode = DiagnosticCode::new(Category::Options, 106);
/// Malformed `paths` pattern or substitution.
pub const O107: DiagnosticCode = DiagnosticCode::new(Category::Options, 107);
/// Source file outside `root_dir`.
pub const O108: DiagnosticCode = DiagnosticCode::new(Category::Options, 108);
/// Composite project includes a file it does not list.
pub const O109: DiagnosticCode = DiagnosticCode::new(Category::Options, 109);
/// Unknown name in the `lib` option.
pub const O110: DiagnosticCode = DiagnosticCode::new(Category::Options, 110);

/// Referenced project does not exist.
pub const P101: DiagnosticCode = DiagnosticCode::new(Category::Project, 101);
/// Referenced project is not `composite`.
pub const P102: DiagnosticCode = DiagnosticCode::new(Category::Project, 102);
/// Project references form a cycle.
pub const P103: DiagnosticCode = DiagnosticCode::new(Category::Project, 103);
/// Output of a referenced project has not been built.
pub const P104: DiagnosticCode = DiagnosticCode::new(Category::Project, 104);
/// Referenced project's configuration is invalid.
pub const P105: DiagnosticCode = DiagnosticCode::new(Category::Project, 105);

/// I/O failure while reading a file.
pub const H101: DiagnosticCode = DiagnosticCode::new(Category::Host, 101);

/// Creates a diagnostic for an import with no target.
pub fn error_cannot_find_module(specifier: &str, span: Span) -> Diagnostic {
    Diagnostic::error(R101, format!("cannot find module `{specifier}`"), Some(span))
}

/// Creates a diagnostic for an import whose target kind is not enabled.
pub fn error_disallowed_extension(specifier: &str, found: &str, span: Span) -> Diagnostic {
    let help = if found == ".json" {
        "set `resolve_json_module = true` to import JSON files"
    } else {
        "set `allow_js = true` or add a declaration file for this module"
    };
    Diagnostic::error(
        R102,
        format!("module `{specifier}` resolved to a `{found}` file, which is not enabled"),
        Some(span),
    )
    .with_help(help)
}

/// Creates a diagnostic for a resolution that failed with a host fault.
pub fn error_resolution_host_failure(specifier: &str, message: &str, span: Span) -> Diagnostic {
    Diagnostic::error(
        R103,
        format!("resolving `{specifier}` failed: {message}"),
        Some(span),
    )
}

/// Creates a diagnostic for a type library that cannot be found.
pub fn error_cannot_find_type_definition(name: &str, span: Option<Span>) -> Diagnostic {
    Diagnostic::error(
        R104,
        format!("cannot find type definition file for `{name}`"),
        span,
    )
}

/// Creates a diagnostic for conflicting type library definitions.
pub fn error_conflicting_type_definitions(
    name: &str,
    first: &str,
    second: &str,
    span: Option<Span>,
) -> Diagnostic {
    Diagnostic::error(
        R105,
        format!("conflicting definitions for `{name}` found at `{second}` and `{first}`"),
        span,
    )
    .with_help("consider adding a `types` entry to the compiler options to pick one")
}

/// Creates a diagnostic for a missing file.
pub fn error_file_not_found(file_name: &str, span: Option<Span>) -> Diagnostic {
    Diagnostic::error(F101, format!("file `{file_name}` not found"), span)
}

/// Creates a diagnostic for a referenced file with an unsupported extension.
pub fn error_unsupported_extension(file_name: &str, supported: &[&str], span: Option<Span>) -> Diagnostic {
    Diagnostic::error(
        F102,
        format!("file `{file_name}` has an unsupported extension"),
        span,
    )
    .with_note(format!("supported extensions are {}", supported.join(", ")))
}

/// Creates a diagnostic for two names differing only in case.
pub fn error_casing_differs(requested: &str, existing: &str, span: Option<Span>) -> Diagnostic {
    Diagnostic::error(
        F103,
        format!("file name `{requested}` differs from already included file name `{existing}` only in casing"),
        span,
    )
}

/// Creates a diagnostic for an unknown library name.
pub fn error_unknown_lib(name: &str, suggestion: Option<&str>, span: Option<Span>) -> Diagnostic {
    let d = Diagnostic::error(F104, format!("cannot find lib definition for `{name}`"), span);
    match suggestion {
        Some(s) => d.with_help(format!("did you mean `{s}`?")),
        None => d,
    }
}

/// Creates a diagnostic for two units claiming one path.
pub fn error_duplicate_path(path: &str, span: Option<Span>, previous: Option<Span>) -> Diagnostic {
    let d = Diagnostic::error(
        F105,
        format!("`{path}` is already included with different content"),
        span,
    );
    match previous {
        Some(prev) => d.with_label(Label::related(prev, "first included here")),
        None => d,
    }
}

/// Creates a diagnostic for an I/O failure.
pub fn error_read_failed(file_name: &str, message: &str, span: Option<Span>) -> Diagnostic {
    Diagnostic::error(H101, format!("cannot read file `{file_name}`: {message}"), span)
}

/// Creates a diagnostic for an unbuilt referenced-project output.
pub fn error_output_not_built(output: &str, source: &str, span: Option<Span>) -> Diagnostic {
    Diagnostic::error(
        P104,
        format!("output file `{output}` has not been built from source file `{source}`"),
        span,
    )
    .with_help("build the referenced project first")
}

/// Creates an option diagnostic with no location.
pub fn option_error(code: DiagnosticCode, message: impl Into<String>) -> Diagnostic {
    Diagnostic::error(code, message, None)
}
