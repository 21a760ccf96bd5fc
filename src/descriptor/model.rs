//! In-memory representation of a module descriptor.
//!
//! The same types back both the `module-info.java` text form and the JSON
//! form. Declaration order is preserved exactly as written so duplicates stay
//! visible to validation; semantic comparison goes through
//! [`ModuleDescriptor::export_set`], which ignores order.

use crate::descriptor::identity::{ModuleName, PackageName, ProvisionalNote, TypeName, Visibility};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const DESCRIPTOR_SCHEMA_VERSION: &str = "module_descriptor_v1";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
/// Full module descriptor as authored.
pub struct ModuleDescriptor {
    #[serde(rename = "module")]
    pub name: ModuleName,
    #[serde(default)]
    pub open: bool,
    #[serde(default)]
    pub requires: Vec<Requirement>,
    #[serde(default)]
    pub exports: Vec<ExportDecl>,
    #[serde(default)]
    pub opens: Vec<OpensDecl>,
    #[serde(default)]
    pub uses: Vec<TypeName>,
    #[serde(default)]
    pub provides: Vec<ServiceProvision>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
/// A `requires` directive.
pub struct Requirement {
    pub module: ModuleName,
    #[serde(default)]
    pub modifiers: BTreeSet<RequiresModifier>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiresModifier {
    Transitive,
    Static,
}

impl RequiresModifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequiresModifier::Transitive => "transitive",
            RequiresModifier::Static => "static",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
/// One exported capability package.
pub struct ExportDecl {
    pub package: PackageName,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisional: Option<ProvisionalNote>,
}

impl ExportDecl {
    pub fn public(package: PackageName) -> Self {
        Self {
            package,
            visibility: Visibility::Public,
            provisional: None,
        }
    }

    /// Whether the export can be relied on for compatibility guarantees.
    pub fn stable(&self) -> bool {
        self.provisional.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
/// An `opens` directive (reflective access only).
pub struct OpensDecl {
    pub package: PackageName,
    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
/// A `provides <service> with <impl>, ...` directive.
pub struct ServiceProvision {
    pub service: TypeName,
    #[serde(rename = "with")]
    pub implementations: Vec<TypeName>,
}

/// Serialized wrapper carrying the schema version tag.
#[derive(Serialize, Deserialize)]
pub(crate) struct DescriptorDocument {
    pub schema_version: String,
    #[serde(flatten)]
    pub descriptor: ModuleDescriptor,
}

impl ModuleDescriptor {
    pub fn new(name: ModuleName) -> Self {
        Self {
            name,
            open: false,
            requires: Vec::new(),
            exports: Vec::new(),
            opens: Vec::new(),
            uses: Vec::new(),
            provides: Vec::new(),
        }
    }

    /// Order-insensitive view of the export pairs.
    ///
    /// Duplicate declarations collapse; use [`ModuleDescriptor::exports`]
    /// directly when duplicates matter.
    pub fn export_set(&self) -> BTreeMap<&PackageName, (&Visibility, bool)> {
        self.exports
            .iter()
            .map(|export| (&export.package, (&export.visibility, export.stable())))
            .collect()
    }

    pub fn requirement_set(&self) -> BTreeMap<&ModuleName, &BTreeSet<RequiresModifier>> {
        self.requires
            .iter()
            .map(|req| (&req.module, &req.modifiers))
            .collect()
    }

    pub fn exported_packages(&self) -> impl Iterator<Item = &PackageName> {
        self.exports.iter().map(|export| &export.package)
    }

    pub fn provisional_exports(&self) -> impl Iterator<Item = &ExportDecl> {
        self.exports.iter().filter(|export| !export.stable())
    }

    /// JSON form, tagged with the current schema version.
    pub fn to_json_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(DescriptorDocument {
            schema_version: DESCRIPTOR_SCHEMA_VERSION.to_string(),
            descriptor: self.clone(),
        })
    }
}
