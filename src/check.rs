//! Descriptor checking shared by `boundary-check` and the integration tests.
//!
//! Loads every descriptor, groups copies by module name, discovers each
//! module's implementation tree and produces one report per module. Copies of
//! the same module are compared against each other; only semantic divergence
//! counts.

use crate::boundary::ModuleBoundary;
use crate::descriptor::{ModuleDescriptor, ModuleName, PackageName, load_descriptor};
use crate::package_tree::PackageTree;
use crate::surface::{SurfaceEntry, build_surface_map};
use crate::validation::{ValidationReport, validate_descriptor_copies};
use anyhow::{Result, bail};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

const SOURCE_DIR: &str = "src";

/// Inputs for one check run.
#[derive(Debug, Clone, Default)]
pub struct CheckPlan {
    pub descriptors: Vec<PathBuf>,
    /// Explicit source roots; empty means derive them per descriptor.
    pub source_roots: Vec<PathBuf>,
    pub descriptor_schema: Option<PathBuf>,
    pub strict: bool,
}

#[derive(Debug, Clone, Serialize)]
/// Report for one module plus its surface map.
pub struct ModuleCheck {
    pub descriptors: Vec<PathBuf>,
    #[serde(flatten)]
    pub report: ValidationReport,
    pub surface: BTreeMap<PackageName, SurfaceEntry>,
}

#[derive(Debug, Clone, Serialize)]
/// Aggregate result printed by `boundary-check`.
pub struct CheckOutcome {
    pub valid: bool,
    pub strict: bool,
    pub modules: Vec<ModuleCheck>,
}

impl CheckOutcome {
    pub fn is_fatal(&self) -> bool {
        self.modules
            .iter()
            .any(|module| module.report.is_fatal(self.strict))
    }
}

/// Default source roots for a descriptor: the nearest enclosing `src`
/// directory (covering every source set), else the descriptor's directory.
pub fn default_source_roots(descriptor: &Path) -> Vec<PathBuf> {
    let parent = descriptor.parent().unwrap_or(Path::new("."));
    let src = parent
        .ancestors()
        .find(|dir| dir.file_name().and_then(|name| name.to_str()) == Some(SOURCE_DIR));
    vec![src.unwrap_or(parent).to_path_buf()]
}

/// Directory owning a descriptor's module: the parent of its enclosing `src`
/// directory, else the descriptor's own directory.
fn module_dir(descriptor: &Path) -> PathBuf {
    let parent = descriptor.parent().unwrap_or(Path::new("."));
    parent
        .ancestors()
        .find(|dir| dir.file_name().and_then(|name| name.to_str()) == Some(SOURCE_DIR))
        .and_then(Path::parent)
        .unwrap_or(parent)
        .to_path_buf()
}

/// Explicit roots that lie inside one of the copies' module directories.
/// When none do, every explicit root applies.
fn roots_for_module(
    explicit: &[PathBuf],
    copies: &[(PathBuf, ModuleDescriptor)],
) -> Vec<PathBuf> {
    let dirs: Vec<PathBuf> = copies.iter().map(|(path, _)| module_dir(path)).collect();
    let owned: Vec<PathBuf> = explicit
        .iter()
        .filter(|root| dirs.iter().any(|dir| root.starts_with(dir)))
        .cloned()
        .collect();
    if owned.is_empty() { explicit.to_vec() } else { owned }
}

/// Run the full check described by `plan`.
pub fn run_check(plan: &CheckPlan) -> Result<CheckOutcome> {
    if plan.descriptors.is_empty() {
        bail!("no module descriptors to check");
    }

    let mut groups: BTreeMap<ModuleName, Vec<(PathBuf, ModuleDescriptor)>> = BTreeMap::new();
    for path in &plan.descriptors {
        let descriptor = load_descriptor(path, plan.descriptor_schema.as_deref())?;
        groups
            .entry(descriptor.name.clone())
            .or_default()
            .push((path.clone(), descriptor));
    }

    let mut modules = Vec::new();
    for (module, copies) in groups {
        let roots = if plan.source_roots.is_empty() {
            let mut roots: Vec<PathBuf> = copies
                .iter()
                .flat_map(|(path, _)| default_source_roots(path))
                .collect();
            roots.sort();
            roots.dedup();
            roots
        } else {
            roots_for_module(&plan.source_roots, &copies)
        };
        debug!(module = %module, roots = ?roots, "checking module");

        let tree = PackageTree::discover(&roots)?;
        let copy_violations = validate_descriptor_copies(&copies);
        let descriptors = copies.iter().map(|(path, _)| path.clone()).collect();
        let Some((_, first)) = copies.into_iter().next() else {
            continue;
        };

        let boundary = ModuleBoundary::from_descriptor(first, tree);
        let mut report = boundary.check();
        report.extend(copy_violations);
        modules.push(ModuleCheck {
            descriptors,
            surface: build_surface_map(&boundary),
            report,
        });
    }

    let valid = modules.iter().all(|module| module.report.is_valid());
    Ok(CheckOutcome {
        valid,
        strict: plan.strict,
        modules,
    })
}
