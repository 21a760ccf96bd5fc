//! Discovery of the packages that actually exist in an implementation tree.
//!
//! Source files are scraped for their `package` statement rather than
//! compiled. Kotlin files may live in directories that do not match their
//! package, so the statement wins; the directory path is only a fallback for
//! files without one.

use crate::descriptor::{MODULE_INFO_FILE, PackageName, is_skipped_dir};
use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SOURCE_EXTENSIONS: &[&str] = &["java", "kt"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Set of implementation packages plus the files that define them.
pub struct PackageTree {
    packages: BTreeMap<PackageName, BTreeSet<PathBuf>>,
}

impl PackageTree {
    /// Build a tree from known package names (no backing files).
    pub fn from_names<I>(names: I) -> Self
    where
        I: IntoIterator<Item = PackageName>,
    {
        Self {
            packages: names
                .into_iter()
                .map(|name| (name, BTreeSet::new()))
                .collect(),
        }
    }

    /// Walk every source root and collect the packages declared there.
    ///
    /// Missing roots are skipped so callers can pass the conventional
    /// candidates (`src/main/java`, `src/jvmMain/kotlin`, ...) unconditionally.
    pub fn discover(roots: &[PathBuf]) -> Result<Self> {
        let mut tree = Self::default();
        for root in roots {
            if !root.is_dir() {
                debug!(root = %root.display(), "source root missing, skipping");
                continue;
            }
            tree.collect_from_dir(root, root)?;
        }
        debug!(packages = tree.packages.len(), "discovered implementation packages");
        Ok(tree)
    }

    fn collect_from_dir(&mut self, root: &Path, dir: &Path) -> Result<()> {
        for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                if !is_skipped_dir(&path) {
                    self.collect_from_dir(root, &path)?;
                }
                continue;
            }
            if !is_source_file(&path) {
                continue;
            }
            let contents = match fs::read_to_string(&path) {
                Ok(contents) => contents,
                Err(err) => {
                    warn!(path = %path.display(), %err, "unreadable source file skipped");
                    continue;
                }
            };
            let package = parse_package_statement(&contents)
                .or_else(|| package_from_dir(root, &path));
            if let Some(package) = package {
                self.packages.entry(package).or_default().insert(path);
            }
        }
        Ok(())
    }

    pub fn contains(&self, package: &PackageName) -> bool {
        self.packages.contains_key(package)
    }

    /// Packages in stable order.
    pub fn packages(&self) -> impl Iterator<Item = &PackageName> {
        self.packages.keys()
    }

    /// Source files declaring `package`, if any were discovered.
    pub fn sources(&self, package: &PackageName) -> Option<&BTreeSet<PathBuf>> {
        self.packages.get(package)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

fn is_source_file(path: &Path) -> bool {
    if path.file_name().and_then(|name| name.to_str()) == Some(MODULE_INFO_FILE) {
        return false;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

/// First `package x.y` statement in a Java or Kotlin file.
///
/// Comments and annotations (`@file:JvmName(..)`) before the statement are
/// skipped; the scrape stops at the first `import` or type declaration.
pub(crate) fn parse_package_statement(contents: &str) -> Option<PackageName> {
    let mut in_block_comment = false;
    for raw_line in contents.lines() {
        let mut line = raw_line.trim();
        if in_block_comment {
            match line.find("*/") {
                Some(end) => {
                    in_block_comment = false;
                    line = line[end + 2..].trim();
                }
                None => continue,
            }
        }
        if line.starts_with("/*") {
            match line.find("*/") {
                Some(end) => line = line[end + 2..].trim(),
                None => {
                    in_block_comment = true;
                    continue;
                }
            }
        }
        if line.is_empty() || line.starts_with("//") || line.starts_with('@') {
            continue;
        }
        let rest = line.strip_prefix("package")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let name = rest
            .trim()
            .trim_end_matches(';')
            .split(|c: char| c.is_whitespace() || c == ';' || c == '/')
            .next()
            .unwrap_or("")
            .trim_matches('`');
        return PackageName::new(name).ok();
    }
    None
}

fn package_from_dir(root: &Path, file: &Path) -> Option<PackageName> {
    let parent = file.parent()?.strip_prefix(root).ok()?;
    let segments = parent
        .components()
        .map(|component| component.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    if segments.is_empty() {
        return None;
    }
    PackageName::new(segments.join(".")).ok()
}
