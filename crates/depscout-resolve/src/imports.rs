//! Import collection over the recovered tree

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::package_name::{is_builtin_module, package_name_from_specifier};
use crate::tree::SourceTree;

/// Extracts bare import specifiers from a file
pub trait ImportExtractor: Send + Sync {
    /// Import specifiers found in `content`, as written
    fn extract(&self, content: &str, path: &str) -> Vec<String>;
}

static FROM_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\b(?:import|export)\s[^'";]*?\bfrom\s*['"]([^'"\n]+)['"]"#).unwrap()
});
static SIDE_EFFECT_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bimport\s*['"]([^'"\n]+)['"]"#).unwrap());
static CALL_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\b(?:require|import)\s*\(\s*['"]([^'"\n]+)['"]\s*\)"#).unwrap()
});

const SCRIPT_EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "cjs", "ts", "tsx", "mts", "cts", "vue", "svelte"];

/// Pattern-based extractor for ES module and CommonJS syntax.
///
/// Used when no syntax-tree extractor is supplied; it does not understand
/// comments or string contents, so it can over-report.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexImportExtractor;

impl RegexImportExtractor {
    /// Creates a new RegexImportExtractor
    pub fn new() -> Self {
        RegexImportExtractor
    }
}

impl ImportExtractor for RegexImportExtractor {
    fn extract(&self, content: &str, path: &str) -> Vec<String> {
        let is_script = path
            .rsplit_once('.')
            .is_some_and(|(_, ext)| SCRIPT_EXTENSIONS.contains(&ext));
        if !is_script {
            return Vec::new();
        }

        let mut found: Vec<(usize, String)> = Vec::new();
        for re in [&*FROM_IMPORT, &*SIDE_EFFECT_IMPORT, &*CALL_IMPORT] {
            for caps in re.captures_iter(content) {
                if let Some(m) = caps.get(1) {
                    found.push((m.start(), m.as_str().to_string()));
                }
            }
        }
        found.sort();
        found.dedup_by(|a, b| a.1 == b.1);
        found.into_iter().map(|(_, spec)| spec).collect()
    }
}

/// Imports gathered from the application's own files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportIndex {
    /// Package name to importing files, first-observed order
    pub by_name: BTreeMap<String, Vec<String>>,
    /// Application file to the package names it imports
    pub by_file: BTreeMap<String, Vec<String>>,
}

impl ImportIndex {
    /// Every imported package name
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }
}

/// Collect package imports from every application file.
///
/// Files under the third-party dir are skipped; their imports are the
/// dependencies' own dependencies. Specifiers are reduced to package names
/// and builtins are dropped.
pub fn collect_imports(tree: &SourceTree, extractor: &dyn ImportExtractor) -> ImportIndex {
    let mut index = ImportIndex::default();

    for file in tree.application_files() {
        let mut names: Vec<String> = Vec::new();
        for spec in extractor.extract(&file.content, &file.path) {
            if is_builtin_module(&spec) {
                continue;
            }
            let Some(name) = package_name_from_specifier(&spec) else {
                continue;
            };
            if !names.contains(&name) {
                names.push(name);
            }
        }

        for name in &names {
            let importers = index.by_name.entry(name.clone()).or_default();
            if !importers.contains(&file.path) {
                importers.push(file.path.clone());
            }
        }
        if !names.is_empty() {
            index.by_file.insert(file.path.clone(), names);
        }
    }

    debug!(
        packages = index.by_name.len(),
        files = index.by_file.len(),
        "Collected application imports"
    );
    index
}
