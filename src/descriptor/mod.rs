//! Module descriptor model, text syntax and loading.
//!
//! Descriptors come in two on-disk forms: the `module-info.java` text form
//! and a schema-checked JSON form. Both load into [`ModuleDescriptor`];
//! [`load_descriptor`] picks the reader from the file extension.

pub mod identity;
pub mod model;
pub mod syntax;

pub use identity::{ModuleName, PackageName, ProvisionalNote, TypeName, Visibility};
pub use model::{
    DESCRIPTOR_SCHEMA_VERSION, ExportDecl, ModuleDescriptor, OpensDecl, Requirement,
    RequiresModifier, ServiceProvision,
};
pub use syntax::{parse_module_info, render_module_info};

use crate::schema_loader::{SchemaLoadOptions, load_json_schema, validate_instance};
use anyhow::{Context, Result, bail};
use model::DescriptorDocument;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const MODULE_INFO_FILE: &str = "module-info.java";

// Build output and VCS metadata never hold authored descriptors.
const SKIPPED_DIRS: &[&str] = &["build", "target", "out", "node_modules"];

/// Read a descriptor from disk, choosing the format by extension.
///
/// `schema_path` overrides the embedded JSON schema for `.json` files.
pub fn load_descriptor(path: &Path, schema_path: Option<&Path>) -> Result<ModuleDescriptor> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("java") => {
            debug!(path = %path.display(), "parsing module-info descriptor");
            parse_module_info(&contents).with_context(|| format!("parsing {}", path.display()))
        }
        Some("json") => {
            debug!(path = %path.display(), "parsing JSON descriptor");
            let value: Value = serde_json::from_str(&contents)
                .with_context(|| format!("parsing JSON {}", path.display()))?;
            descriptor_from_json(&value, schema_path, &path.display().to_string())
        }
        _ => bail!(
            "unsupported descriptor format for {}; expected .java or .json",
            path.display()
        ),
    }
}

/// Validate a JSON document against the descriptor schema and deserialize it.
pub fn descriptor_from_json(
    value: &Value,
    schema_path: Option<&Path>,
    label: &str,
) -> Result<ModuleDescriptor> {
    let schema = load_json_schema(
        schema_path,
        SchemaLoadOptions {
            expected_version: Some(DESCRIPTOR_SCHEMA_VERSION),
            ..Default::default()
        },
    )?;
    validate_instance(&schema, value, label)?;
    let document: DescriptorDocument = serde_json::from_value(value.clone())
        .with_context(|| format!("decoding descriptor {label}"))?;
    if document.schema_version != schema.schema_version {
        bail!(
            "{label} declares schema_version '{}', expected '{}'",
            document.schema_version,
            schema.schema_version
        );
    }
    Ok(document.descriptor)
}

/// Find every `module-info.java` below `root`, sorted.
pub fn collect_descriptor_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    collect_from_dir(root, &mut found)?;
    found.sort();
    Ok(found)
}

fn collect_from_dir(dir: &Path, acc: &mut Vec<PathBuf>) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            if is_skipped_dir(&path) {
                continue;
            }
            collect_from_dir(&path, acc)?;
        } else if path.file_name().and_then(|name| name.to_str()) == Some(MODULE_INFO_FILE) {
            acc.push(path);
        }
    }
    Ok(())
}

pub(crate) fn is_skipped_dir(path: &Path) -> bool {
    match path.file_name().and_then(|name| name.to_str()) {
        Some(name) => name.starts_with('.') || SKIPPED_DIRS.contains(&name),
        None => false,
    }
}
