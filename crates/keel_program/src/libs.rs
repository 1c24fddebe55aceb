//! Library names, their declaration files and library ordering.

use keel_common::path::base_name;
use keel_config::ScriptTarget;

/// Known `lib` names and the file each maps to, in the order they are
/// offered as suggestions.
pub const LIBS: &[(&str, &str)] = &[
    ("es5", "lib.es5.d.ts"),
    ("es6", "lib.es2015.d.ts"),
    ("es2015", "lib.es2015.d.ts"),
    ("es7", "lib.es2016.d.ts"),
    ("es2016", "lib.es2016.d.ts"),
    ("es2017", "lib.es2017.d.ts"),
    ("es2018", "lib.es2018.d.ts"),
    ("es2019", "lib.es2019.d.ts"),
    ("es2020", "lib.es2020.d.ts"),
    ("es2021", "lib.es2021.d.ts"),
    ("es2022", "lib.es2022.d.ts"),
    ("esnext", "lib.esnext.d.ts"),
    ("dom", "lib.dom.d.ts"),
    ("dom.iterable", "lib.dom.iterable.d.ts"),
    ("dom.asynciterable", "lib.dom.asynciterable.d.ts"),
    ("webworker", "lib.webworker.d.ts"),
    ("webworker.importscripts", "lib.webworker.importscripts.d.ts"),
    ("webworker.iterable", "lib.webworker.iterable.d.ts"),
    ("scripthost", "lib.scripthost.d.ts"),
    ("es2015.core", "lib.es2015.core.d.ts"),
    ("es2015.collection", "lib.es2015.collection.d.ts"),
    ("es2015.generator", "lib.es2015.generator.d.ts"),
    ("es2015.iterable", "lib.es2015.iterable.d.ts"),
    ("es2015.promise", "lib.es2015.promise.d.ts"),
    ("es2015.proxy", "lib.es2015.proxy.d.ts"),
    ("es2015.reflect", "lib.es2015.reflect.d.ts"),
    ("es2015.symbol", "lib.es2015.symbol.d.ts"),
    ("es2015.symbol.wellknown", "lib.es2015.symbol.wellknown.d.ts"),
    ("es2016.array.include", "lib.es2016.array.include.d.ts"),
    ("es2017.object", "lib.es2017.object.d.ts"),
    ("es2017.string", "lib.es2017.string.d.ts"),
    ("es2017.intl", "lib.es2017.intl.d.ts"),
    ("es2018.asynciterable", "lib.es2018.asynciterable.d.ts"),
    ("es2018.promise", "lib.es2018.promise.d.ts"),
    ("es2019.array", "lib.es2019.array.d.ts"),
    ("es2019.string", "lib.es2019.string.d.ts"),
    ("es2020.bigint", "lib.es2020.bigint.d.ts"),
    ("es2020.promise", "lib.es2020.promise.d.ts"),
    ("es2020.string", "lib.es2020.string.d.ts"),
    ("es2021.promise", "lib.es2021.promise.d.ts"),
    ("es2021.string", "lib.es2021.string.d.ts"),
    ("es2022.array", "lib.es2022.array.d.ts"),
    ("es2022.error", "lib.es2022.error.d.ts"),
    ("esnext.array", "lib.es2023.array.d.ts"),
    ("decorators", "lib.decorators.d.ts"),
    ("decorators.legacy", "lib.decorators.legacy.d.ts"),
];

/// Returns the declaration file for a `lib` name. Names are matched
/// case-insensitively.
pub fn lib_file_name(name: &str) -> Option<&'static str> {
    let lowered = name.to_ascii_lowercase();
    LIBS.iter().find(|(n, _)| *n == lowered).map(|(_, file)| *file)
}

/// The library file included when no `lib` option is given.
pub fn default_lib_file_name(target: ScriptTarget) -> &'static str {
    match target {
        ScriptTarget::Es3 | ScriptTarget::Es5 => "lib.d.ts",
        ScriptTarget::Es2015 => "lib.es6.d.ts",
        ScriptTarget::Es2016 => "lib.es2016.full.d.ts",
        ScriptTarget::Es2017 => "lib.es2017.full.d.ts",
        ScriptTarget::Es2018 => "lib.es2018.full.d.ts",
        ScriptTarget::Es2019 => "lib.es2019.full.d.ts",
        ScriptTarget::Es2020 => "lib.es2020.full.d.ts",
        ScriptTarget::Es2021 => "lib.es2021.full.d.ts",
        ScriptTarget::Es2022 => "lib.es2022.full.d.ts",
        ScriptTarget::EsNext => "lib.esnext.full.d.ts",
    }
}

/// The closest known `lib` name to an unknown one, if any is close enough
/// to be worth suggesting.
pub fn closest_lib_name(name: &str) -> Option<&'static str> {
    let lowered = name.to_ascii_lowercase();
    let threshold = (lowered.len() / 3).max(1);
    LIBS.iter()
        .map(|(candidate, _)| (*candidate, levenshtein(&lowered, candidate)))
        .filter(|(_, distance)| *distance <= threshold)
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}

/// Sort key for library units.
///
/// The two core files sort first, files named by the `lib` option follow in
/// option order, and everything else sorts last. Files outside the library
/// directory always sort last.
pub fn lib_priority(file_name: &str, lib_dir: &str, libs: &[String]) -> usize {
    let last = libs.len() + 2;
    let Some(rest) = file_name.strip_prefix(lib_dir) else {
        return last;
    };
    if !(rest.starts_with('/') || lib_dir.ends_with('/')) {
        return last;
    }
    let base = base_name(file_name);
    if base == "lib.d.ts" || base == "lib.es6.d.ts" {
        return 0;
    }
    let name = base
        .strip_prefix("lib.")
        .and_then(|n| n.strip_suffix(".d.ts"))
        .unwrap_or(base);
    libs.iter()
        .position(|l| l.eq_ignore_ascii_case(name))
        .map_or(last, |index| index + 1)
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut current = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        previous = current;
    }
    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lib_table_lookup() {
        assert_eq!(lib_file_name("es5"), Some("lib.es5.d.ts"));
        assert_eq!(lib_file_name("DOM"), Some("lib.dom.d.ts"));
        assert_eq!(lib_file_name("es6"), Some("lib.es2015.d.ts"));
        assert_eq!(lib_file_name("nope"), None);
    }

    #[test]
    fn default_lib_by_target() {
        assert_eq!(default_lib_file_name(ScriptTarget::Es5), "lib.d.ts");
        assert_eq!(default_lib_file_name(ScriptTarget::Es2015), "lib.es6.d.ts");
        assert_eq!(default_lib_file_name(ScriptTarget::EsNext), "lib.esnext.full.d.ts");
    }

    #[test]
    fn suggestions() {
        assert_eq!(closest_lib_name("dom.iterables"), Some("dom.iterable"));
        assert_eq!(closest_lib_name("es20155"), Some("es2015"));
        assert_eq!(closest_lib_name("zzzzzzzz"), None);
    }

    #[test]
    fn priorities() {
        let libs = vec!["es5".to_string(), "dom".to_string()];
        let dir = "/lib";
        assert_eq!(lib_priority("/lib/lib.d.ts", dir, &libs), 0);
        assert_eq!(lib_priority("/lib/lib.es6.d.ts", dir, &libs), 0);
        assert_eq!(lib_priority("/lib/lib.es5.d.ts", dir, &libs), 1);
        assert_eq!(lib_priority("/lib/lib.dom.d.ts", dir, &libs), 2);
        assert_eq!(lib_priority("/lib/lib.decorators.d.ts", dir, &libs), 4);
        assert_eq!(lib_priority("/elsewhere/lib.d.ts", dir, &libs), 4);
        assert_eq!(lib_priority("/library/lib.d.ts", dir, &libs), 4);
    }
}
