//! Configuration types deserialized from `keel.toml`.

use serde::Deserialize;
use std::collections::BTreeMap;

/// The top-level project configuration parsed from `keel.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Project metadata and root files.
    pub project: ProjectMeta,
    /// Compiler options.
    #[serde(default)]
    pub compiler: CompilerOptions,
    /// Other projects this one builds against.
    #[serde(default)]
    pub references: Vec<ProjectReference>,
}

/// Project metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// Root file names, relative to the project directory.
    #[serde(default)]
    pub files: Vec<String>,
    /// A brief description of the project.
    #[serde(default)]
    pub description: String,
}

/// A `[[references]]` entry naming another project.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectReference {
    /// Directory of the referenced project, or its `keel.toml`.
    pub path: String,
    /// Prepend the referenced project's `out_file` output.
    #[serde(default)]
    pub prepend: bool,
    /// The reference is allowed to form a cycle.
    #[serde(default)]
    pub circular: bool,
}

/// Language level the program is written against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptTarget {
    /// ES3.
    Es3,
    /// ES5.
    #[default]
    Es5,
    /// ES2015, also accepted as `es6`.
    #[serde(alias = "es6")]
    Es2015,
    /// ES2016.
    Es2016,
    /// ES2017.
    Es2017,
    /// ES2018.
    Es2018,
    /// ES2019.
    Es2019,
    /// ES2020.
    Es2020,
    /// ES2021.
    Es2021,
    /// ES2022.
    Es2022,
    /// The latest proposals.
    EsNext,
}

/// Module system emitted for the program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    /// No module system.
    None,
    /// CommonJS.
    CommonJs,
    /// AMD.
    Amd,
    /// UMD.
    Umd,
    /// SystemJS.
    System,
    /// ES2015 modules.
    Es2015,
    /// ES2020 modules.
    Es2020,
    /// ES2022 modules.
    Es2022,
    /// Latest ES modules.
    EsNext,
    /// Node 16 dual-format modules.
    Node16,
    /// Latest Node dual-format modules.
    NodeNext,
}

/// Strategy for mapping module specifiers to files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleResolution {
    /// Ancestor-directory probing, no `node_modules` lookup.
    Classic,
    /// CommonJS-era Node lookup, also accepted as `node`.
    #[serde(alias = "node")]
    Node10,
    /// Node 16 lookup with module-format-dependent rules.
    Node16,
    /// Latest Node lookup.
    NodeNext,
    /// Bundler-style lookup.
    Bundler,
}

impl ModuleResolution {
    /// Returns `true` if the strategy distinguishes CommonJS from ES module
    /// units when resolving.
    pub fn is_format_aware(self) -> bool {
        matches!(self, ModuleResolution::Node16 | ModuleResolution::NodeNext)
    }

    /// Returns `true` if the strategy searches `node_modules` directories.
    pub fn searches_packages(self) -> bool {
        self != ModuleResolution::Classic
    }
}

/// Compiler options that shape the program.
///
/// Every field has a default, so an empty `[compiler]` table is valid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Language level.
    pub target: ScriptTarget,
    /// Emitted module system. Defaults from `target`.
    pub module: Option<ModuleKind>,
    /// Resolution strategy. Defaults from `module`.
    pub module_resolution: Option<ModuleResolution>,
    /// Directory non-relative specifiers are resolved against.
    pub base_url: Option<String>,
    /// Specifier patterns mapped to substitution paths.
    pub paths: BTreeMap<String, Vec<String>>,
    /// Directories holding type packages. Defaults to every ancestor
    /// `node_modules/@types`.
    pub type_roots: Option<Vec<String>>,
    /// Type packages included automatically. `None` includes all packages
    /// found in the type roots.
    pub types: Option<Vec<String>>,
    /// Library names replacing the target's default library.
    pub lib: Option<Vec<String>>,
    /// Do not include any default library.
    pub no_lib: bool,
    /// Do not follow imports or reference directives.
    pub no_resolve: bool,
    /// Allow plain script files in the program.
    pub allow_js: bool,
    /// Allow importing `.json` files.
    pub resolve_json_module: bool,
    /// How many package boundaries deep plain scripts found in packages are
    /// followed.
    pub max_package_depth: u32,
    /// Report references that differ from a file's name only in case.
    pub force_consistent_casing: bool,
    /// Keep symlinked paths instead of using their real path.
    pub preserve_symlinks: bool,
    /// The project can be referenced by other projects.
    pub composite: bool,
    /// Emit declaration files.
    pub declaration: Option<bool>,
    /// Emit only declaration files.
    pub emit_declaration_only: bool,
    /// Do not emit anything.
    pub no_emit: bool,
    /// Concatenate output into one file.
    pub out_file: Option<String>,
    /// Output directory.
    pub out_dir: Option<String>,
    /// Root of the source tree.
    pub root_dir: Option<String>,
    /// Output directory for declaration files.
    pub declaration_dir: Option<String>,
    /// Enable all strict checks.
    pub strict: bool,
    /// Require each file to be transpilable on its own.
    pub isolated_modules: bool,
    /// Skip checking declaration files.
    pub skip_lib_check: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            target: ScriptTarget::default(),
            module: None,
            module_resolution: None,
            base_url: None,
            paths: BTreeMap::new(),
            type_roots: None,
            types: None,
            lib: None,
            no_lib: false,
            no_resolve: false,
            allow_js: false,
            resolve_json_module: false,
            max_package_depth: 0,
            force_consistent_casing: true,
            preserve_symlinks: false,
            composite: false,
            declaration: None,
            emit_declaration_only: false,
            no_emit: false,
            out_file: None,
            out_dir: None,
            root_dir: None,
            declaration_dir: None,
            strict: false,
            isolated_modules: false,
            skip_lib_check: false,
        }
    }
}

impl CompilerOptions {
    /// The module system in effect, defaulting from `target`.
    pub fn effective_module(&self) -> ModuleKind {
        self.module.unwrap_or(if self.target >= ScriptTarget::Es2015 {
            ModuleKind::Es2015
        } else {
            ModuleKind::CommonJs
        })
    }

    /// The resolution strategy in effect, defaulting from the module system.
    pub fn effective_module_resolution(&self) -> ModuleResolution {
        if let Some(explicit) = self.module_resolution {
            return explicit;
        }
        match self.effective_module() {
            ModuleKind::CommonJs => ModuleResolution::Node10,
            ModuleKind::Node16 => ModuleResolution::Node16,
            ModuleKind::NodeNext => ModuleResolution::NodeNext,
            _ => ModuleResolution::Classic,
        }
    }

    /// Whether declaration files are emitted, counting `composite`.
    pub fn emits_declarations(&self) -> bool {
        self.declaration.unwrap_or(self.composite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_compiler_table_uses_defaults() {
        let opts: CompilerOptions = toml::from_str("").unwrap();
        assert_eq!(opts, CompilerOptions::default());
        assert!(opts.force_consistent_casing);
        assert_eq!(opts.target, ScriptTarget::Es5);
    }

    #[test]
    fn enum_spellings() {
        let opts: CompilerOptions = toml::from_str(
            "target = \"es6\"\nmodule = \"nodenext\"\nmodule_resolution = \"node\"\n",
        )
        .unwrap();
        assert_eq!(opts.target, ScriptTarget::Es2015);
        assert_eq!(opts.module, Some(ModuleKind::NodeNext));
        assert_eq!(opts.module_resolution, Some(ModuleResolution::Node10));
    }

    #[test]
    fn module_defaults_follow_target() {
        let mut opts = CompilerOptions::default();
        assert_eq!(opts.effective_module(), ModuleKind::CommonJs);
        assert_eq!(opts.effective_module_resolution(), ModuleResolution::Node10);
        opts.target = ScriptTarget::Es2020;
        assert_eq!(opts.effective_module(), ModuleKind::Es2015);
        assert_eq!(opts.effective_module_resolution(), ModuleResolution::Classic);
        opts.module = Some(ModuleKind::Node16);
        assert!(opts.effective_module_resolution().is_format_aware());
    }

    #[test]
    fn composite_implies_declarations() {
        let mut opts = CompilerOptions::default();
        assert!(!opts.emits_declarations());
        opts.composite = true;
        assert!(opts.emits_declarations());
        opts.declaration = Some(false);
        assert!(!opts.emits_declarations());
    }

    #[test]
    fn paths_table() {
        let opts: CompilerOptions =
            toml::from_str("[paths]\n\"@app/*\" = [\"src/app/*\", \"gen/*\"]\n").unwrap();
        assert_eq!(opts.paths["@app/*"].len(), 2);
    }
}
