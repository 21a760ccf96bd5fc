//! Shared library for the modfence helpers.
//!
//! The crate models a module boundary: the named-export descriptor through
//! which a multi-package library exposes its capability packages while
//! keeping the rest private. Binaries (`boundary-check`, `boundary-render`,
//! `marker-scan`) are thin wrappers over the functions re-exported here:
//! project discovery, descriptor loading, boundary validation, surface
//! accounting and marker-annotation scanning.

use anyhow::{Result, bail};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

pub mod boundary;
pub mod check;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod markers;
pub mod package_tree;
mod schema_loader;
pub mod surface;
pub mod validation;

pub use boundary::ModuleBoundary;
pub use check::{CheckOutcome, CheckPlan, ModuleCheck, default_source_roots, run_check};
pub use descriptor::{
    ExportDecl, ModuleDescriptor, ModuleName, PackageName, ProvisionalNote, Visibility,
    collect_descriptor_files, load_descriptor, parse_module_info, render_module_info,
};
pub use error::{BoundaryError, DescriptorParseError};
pub use markers::{
    DeclarationIndex, MarkedDeclaration, ProcessorPlacement, export_obligations,
    scan_marked_declarations,
};
pub use package_tree::PackageTree;
pub use surface::{SurfaceEntry, build_surface_map, private_packages};
pub use validation::{ValidationReport, Violation, Warning, compare_descriptors};

// Build files that mark the top of a JVM project.
const ROOT_SENTINELS: &[&str] = &["settings.gradle.kts", "settings.gradle", "pom.xml"];

/// Returns true when `candidate` looks like a project root.
fn is_project_root(candidate: &Path) -> bool {
    ROOT_SENTINELS
        .iter()
        .any(|sentinel| candidate.join(sentinel).is_file())
}

fn search_upwards(start: &Path) -> Option<PathBuf> {
    let mut dir = fs::canonicalize(start).ok()?;
    loop {
        if is_project_root(&dir) {
            return Some(dir);
        }
        if !dir.pop() {
            break;
        }
    }
    None
}

/// Locate the project whose descriptors should be checked.
///
/// Honors `MODFENCE_ROOT` when it names an existing directory (no sentinel
/// required, so single-module layouts work), then climbs from `start` looking
/// for a Gradle settings file or `pom.xml`.
pub fn find_project_root(start: &Path) -> Result<PathBuf> {
    if let Ok(hint) = env::var(config::ROOT_ENV) {
        let hint = hint.trim();
        if !hint.is_empty() {
            let path = PathBuf::from(hint);
            if path.is_dir() {
                return Ok(fs::canonicalize(&path).unwrap_or(path));
            }
            bail!(
                "{} points at {}, which is not a directory",
                config::ROOT_ENV,
                path.display()
            );
        }
    }

    if let Some(root) = search_upwards(start) {
        return Ok(root);
    }

    bail!(
        "Unable to locate a project root above {}. Set {} or pass --root.",
        start.display(),
        config::ROOT_ENV
    );
}

/// Split comma- or whitespace-delimited configuration lists into tokens.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .replace(',', " ")
        .split_whitespace()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn split_list_accepts_commas_and_whitespace() {
        assert_eq!(
            split_list("src/main/java, src/jvmMain/kotlin  src/commonMain/kotlin,,"),
            ["src/main/java", "src/jvmMain/kotlin", "src/commonMain/kotlin"]
        );
        assert!(split_list(" , ").is_empty());
    }

    #[test]
    fn search_upwards_finds_gradle_settings() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("settings.gradle.kts"), "").unwrap();
        let nested = temp.path().join("codegentle-common/src/jvmMain/java");
        fs::create_dir_all(&nested).unwrap();

        let found = search_upwards(&nested).expect("root found");
        assert_eq!(found, fs::canonicalize(temp.path()).unwrap());
    }
}
