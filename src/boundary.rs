//! The module boundary: which implementation packages a module exposes.
//!
//! A boundary pairs a descriptor with the implementation tree it describes.
//! Authoring through [`ModuleBoundary::declare_export`] is strict and refuses
//! duplicates and unknown packages up front. Boundaries loaded from an
//! existing descriptor keep whatever was written so [`ModuleBoundary::validate`]
//! can report every problem at once. Once valid, [`ModuleBoundary::freeze`]
//! hands back the immutable descriptor for packaging.

use crate::descriptor::{
    ExportDecl, ModuleDescriptor, ModuleName, PackageName, ProvisionalNote, Visibility,
};
use crate::error::BoundaryError;
use crate::package_tree::PackageTree;
use crate::validation::{ValidationReport, Violation, Warning};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ModuleBoundary {
    descriptor: ModuleDescriptor,
    tree: PackageTree,
}

impl ModuleBoundary {
    /// Start an empty boundary for `module`.
    pub fn new(module: ModuleName, tree: PackageTree) -> Self {
        Self {
            descriptor: ModuleDescriptor::new(module),
            tree,
        }
    }

    /// Wrap an existing descriptor without checking it.
    pub fn from_descriptor(descriptor: ModuleDescriptor, tree: PackageTree) -> Self {
        Self { descriptor, tree }
    }

    /// Add `package` to the public surface.
    ///
    /// `restriction` of `None` exports to everyone; otherwise only the named
    /// modules may read the package.
    pub fn declare_export(
        &mut self,
        package: PackageName,
        restriction: Option<BTreeSet<ModuleName>>,
    ) -> Result<(), BoundaryError> {
        self.declare(package, restriction, None)
    }

    /// Like [`ModuleBoundary::declare_export`], but marks the export as
    /// pending a restriction decision.
    pub fn declare_provisional_export(
        &mut self,
        package: PackageName,
        note: impl Into<String>,
    ) -> Result<(), BoundaryError> {
        self.declare(package, None, Some(ProvisionalNote::new(&note.into())))
    }

    fn declare(
        &mut self,
        package: PackageName,
        restriction: Option<BTreeSet<ModuleName>>,
        provisional: Option<ProvisionalNote>,
    ) -> Result<(), BoundaryError> {
        let module = &self.descriptor.name;
        if self.descriptor.exported_packages().any(|p| p == &package) {
            return Err(BoundaryError::DuplicateExport {
                module: module.clone(),
                package,
            });
        }
        if !self.tree.contains(&package) {
            return Err(BoundaryError::UnknownPackage {
                module: module.clone(),
                package,
            });
        }
        let visibility = match restriction {
            None => Visibility::Public,
            Some(targets) if targets.is_empty() => {
                return Err(BoundaryError::EmptyRestriction { package });
            }
            Some(targets) if targets.contains(module) => {
                return Err(BoundaryError::SelfRestriction {
                    module: module.clone(),
                    package,
                });
            }
            Some(targets) => Visibility::RestrictedTo(targets),
        };
        debug!(
            module = %module,
            package = %package,
            visibility = %visibility.label(),
            "declared export"
        );
        self.descriptor.exports.push(ExportDecl {
            package,
            visibility,
            provisional,
        });
        Ok(())
    }

    /// Check every declaration; empty means valid.
    ///
    /// Each duplicated package is reported once regardless of how many times
    /// it repeats, and each distinct unknown package once.
    pub fn validate(&self) -> Vec<Violation> {
        let module = &self.descriptor.name;
        let mut counts: BTreeMap<&PackageName, usize> = BTreeMap::new();
        for package in self.descriptor.exported_packages() {
            *counts.entry(package).or_default() += 1;
        }

        let mut violations = Vec::new();
        let mut seen = BTreeSet::new();
        for export in &self.descriptor.exports {
            let package = &export.package;
            // Report each package at the position of its first declaration.
            if !seen.insert(package) {
                continue;
            }
            let occurrences = counts.get(package).copied().unwrap_or(1);
            if occurrences > 1 {
                violations.push(Violation::DuplicateExport {
                    package: package.clone(),
                    occurrences,
                });
            }
            if !self.tree.contains(package) {
                violations.push(Violation::UnknownPackage {
                    package: package.clone(),
                });
            }
            if let Visibility::RestrictedTo(targets) = &export.visibility {
                if targets.is_empty() {
                    violations.push(Violation::EmptyRestriction {
                        package: package.clone(),
                    });
                } else if targets.contains(module) {
                    violations.push(Violation::SelfRestriction {
                        package: package.clone(),
                    });
                }
            }
        }

        let mut required: BTreeMap<&ModuleName, usize> = BTreeMap::new();
        for requirement in &self.descriptor.requires {
            *required.entry(&requirement.module).or_default() += 1;
        }
        let mut reported = BTreeSet::new();
        for requirement in &self.descriptor.requires {
            let occurrences = required[&requirement.module];
            if occurrences > 1 && reported.insert(&requirement.module) {
                violations.push(Violation::DuplicateRequire {
                    module: requirement.module.clone(),
                    occurrences,
                });
            }
        }

        violations
    }

    /// Provisional exports, in declaration order.
    pub fn warnings(&self) -> Vec<Warning> {
        self.descriptor
            .provisional_exports()
            .map(|export| Warning::ProvisionalExport {
                package: export.package.clone(),
                note: export.provisional.clone().unwrap_or(ProvisionalNote(String::new())),
            })
            .collect()
    }

    /// Full report: violations plus warnings.
    pub fn check(&self) -> ValidationReport {
        ValidationReport {
            module: self.descriptor.name.clone(),
            violations: self.validate(),
            warnings: self.warnings(),
        }
    }

    /// Consume the boundary and return the frozen descriptor when valid.
    pub fn freeze(self) -> Result<ModuleDescriptor, ValidationReport> {
        let report = self.check();
        if report.is_valid() {
            Ok(self.descriptor)
        } else {
            Err(report)
        }
    }

    pub fn module(&self) -> &ModuleName {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    pub fn exports(&self) -> &[ExportDecl] {
        &self.descriptor.exports
    }

    pub fn tree(&self) -> &PackageTree {
        &self.tree
    }

    /// First export declaration for `package`, if exported.
    pub fn export_for(&self, package: &PackageName) -> Option<&ExportDecl> {
        self.descriptor
            .exports
            .iter()
            .find(|export| &export.package == package)
    }
}
