//! Reported findings for module boundaries.
//!
//! Nothing here raises: validation collects every problem so callers can
//! surface them all at once and decide what is fatal. Violations are fatal to
//! packaging; warnings are informational unless strict mode promotes them.

use crate::descriptor::{ModuleDescriptor, ModuleName, PackageName, ProvisionalNote};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
/// A fatal problem with a module descriptor.
pub enum Violation {
    /// Same package exported more than once.
    DuplicateExport {
        package: PackageName,
        occurrences: usize,
    },
    /// Export names a package with no sources in the implementation tree.
    UnknownPackage { package: PackageName },
    /// `exports p to ;` with no targets.
    EmptyRestriction { package: PackageName },
    /// Export restricted to the declaring module itself.
    SelfRestriction { package: PackageName },
    /// Same module required more than once.
    DuplicateRequire {
        module: ModuleName,
        occurrences: usize,
    },
    /// Two copies of the same module's descriptor disagree.
    DivergentCopy {
        module: ModuleName,
        first: PathBuf,
        second: PathBuf,
        differences: Vec<String>,
    },
    /// A package holds marker-tagged declarations for an external processor
    /// but is not exported.
    MarkerPackageNotExported {
        package: PackageName,
        marker: String,
        declarations: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
/// A non-fatal finding.
pub enum Warning {
    /// Export whose restriction is still undecided.
    ProvisionalExport {
        package: PackageName,
        note: ProvisionalNote,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::DuplicateExport {
                package,
                occurrences,
            } => write!(f, "package {package} is exported {occurrences} times"),
            Violation::UnknownPackage { package } => write!(
                f,
                "exported package {package} does not exist in the implementation tree"
            ),
            Violation::EmptyRestriction { package } => {
                write!(f, "export of {package} is restricted to no modules")
            }
            Violation::SelfRestriction { package } => {
                write!(f, "export of {package} is restricted to its own module")
            }
            Violation::DuplicateRequire {
                module,
                occurrences,
            } => write!(f, "module {module} is required {occurrences} times"),
            Violation::DivergentCopy {
                module,
                first,
                second,
                differences,
            } => write!(
                f,
                "descriptors for {module} at {} and {} differ: {}",
                first.display(),
                second.display(),
                differences.join("; ")
            ),
            Violation::MarkerPackageNotExported {
                package,
                marker,
                declarations,
            } => write!(
                f,
                "package {package} holds @{marker} declarations ({}) but is not exported",
                declarations.join(", ")
            ),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::ProvisionalExport { package, note } if note.0.is_empty() => {
                write!(f, "export of {package} is provisional")
            }
            Warning::ProvisionalExport { package, note } => {
                write!(f, "export of {package} is provisional: {}", note.0)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Violations and warnings for one module.
pub struct ValidationReport {
    pub module: ModuleName,
    pub violations: Vec<Violation>,
    pub warnings: Vec<Warning>,
}

impl ValidationReport {
    pub fn new(module: ModuleName) -> Self {
        Self {
            module,
            violations: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Whether the report should fail packaging.
    pub fn is_fatal(&self, strict: bool) -> bool {
        !self.violations.is_empty() || (strict && !self.warnings.is_empty())
    }

    pub fn extend(&mut self, violations: impl IntoIterator<Item = Violation>) {
        self.violations.extend(violations);
    }
}

/// Compare two descriptors for the same module, ignoring declaration order
/// and comment placement.
///
/// Returns human-readable differences; empty means the copies are
/// semantically identical.
pub fn compare_descriptors(first: &ModuleDescriptor, second: &ModuleDescriptor) -> Vec<String> {
    let mut differences = Vec::new();
    if first.name != second.name {
        differences.push(format!("module name {} vs {}", first.name, second.name));
    }
    if first.open != second.open {
        differences.push(format!("open {} vs {}", first.open, second.open));
    }

    let a = first.export_set();
    let b = second.export_set();
    for (package, (visibility, stable)) in &a {
        match b.get(package) {
            None => differences.push(format!("export {package} only in first copy")),
            Some((other_visibility, other_stable)) => {
                if visibility != other_visibility {
                    differences.push(format!(
                        "export {package} is {} vs {}",
                        visibility.label(),
                        other_visibility.label()
                    ));
                }
                if stable != other_stable {
                    differences.push(format!("export {package} provisional marking differs"));
                }
            }
        }
    }
    for package in b.keys().filter(|package| !a.contains_key(*package)) {
        differences.push(format!("export {package} only in second copy"));
    }

    let ra = first.requirement_set();
    let rb = second.requirement_set();
    for (module, modifiers) in &ra {
        match rb.get(module) {
            None => differences.push(format!("requires {module} only in first copy")),
            Some(other) if other != modifiers => {
                differences.push(format!("requires {module} modifiers differ"))
            }
            Some(_) => {}
        }
    }
    for module in rb.keys().filter(|module| !ra.contains_key(*module)) {
        differences.push(format!("requires {module} only in second copy"));
    }

    let opens_a: BTreeSet<_> = first.opens.iter().map(|o| (&o.package, o.visibility.label())).collect();
    let opens_b: BTreeSet<_> = second.opens.iter().map(|o| (&o.package, o.visibility.label())).collect();
    if opens_a != opens_b {
        differences.push("opens directives differ".to_string());
    }
    let uses_a: BTreeSet<_> = first.uses.iter().collect();
    let uses_b: BTreeSet<_> = second.uses.iter().collect();
    if uses_a != uses_b {
        differences.push("uses directives differ".to_string());
    }
    let provides_a: BTreeSet<_> = first
        .provides
        .iter()
        .map(|p| (&p.service, p.implementations.iter().collect::<BTreeSet<_>>()))
        .collect();
    let provides_b: BTreeSet<_> = second
        .provides
        .iter()
        .map(|p| (&p.service, p.implementations.iter().collect::<BTreeSet<_>>()))
        .collect();
    if provides_a != provides_b {
        differences.push("provides directives differ".to_string());
    }

    differences
}

/// Cross-check every pair of descriptor copies for the same module.
///
/// Copies are compared against the first one loaded; each divergent copy
/// yields one violation.
pub fn validate_descriptor_copies(copies: &[(PathBuf, ModuleDescriptor)]) -> Vec<Violation> {
    let Some((first_path, first)) = copies.first() else {
        return Vec::new();
    };
    copies[1..]
        .iter()
        .filter_map(|(path, descriptor)| {
            let differences = compare_descriptors(first, descriptor);
            if differences.is_empty() {
                None
            } else {
                Some(Violation::DivergentCopy {
                    module: first.name.clone(),
                    first: first_path.clone(),
                    second: path.clone(),
                    differences,
                })
            }
        })
        .collect()
}
