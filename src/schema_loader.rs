//! JSON Schema loading for the JSON descriptor form.
//!
//! The canonical schema is embedded at build time; callers may point at an
//! on-disk copy instead (`MODFENCE_DESCRIPTOR_SCHEMA`). Either way the schema
//! must pin the `schema_version` const the loader expects before it is
//! compiled.

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::JSONSchema;
use serde_json::Value;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

const EMBEDDED_DESCRIPTOR_SCHEMA: &str = include_str!("../schema/module_descriptor.schema.json");

/// Result of loading and compiling a JSON Schema.
pub(crate) struct SchemaLoadResult {
    pub schema_version: String,
    pub compiled: JSONSchema,
}

/// Controls how schemas are checked before compilation.
pub(crate) struct SchemaLoadOptions<'a> {
    /// Where to find the schema_version const inside the schema payload.
    pub schema_version_pointer: &'a str,
    /// Reject schemas whose const differs from this version.
    pub expected_version: Option<&'a str>,
}

impl Default for SchemaLoadOptions<'_> {
    fn default() -> Self {
        Self {
            schema_version_pointer: "/properties/schema_version/const",
            expected_version: None,
        }
    }
}

/// Load a schema from disk, or the embedded descriptor schema when `path` is
/// `None`.
pub(crate) fn load_json_schema(
    path: Option<&Path>,
    options: SchemaLoadOptions<'_>,
) -> Result<SchemaLoadResult> {
    let (schema, label) = match path {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("opening schema {}", path.display()))?;
            let value: Value = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("parsing schema {}", path.display()))?;
            (value, path.display().to_string())
        }
        None => {
            let value: Value = serde_json::from_str(EMBEDDED_DESCRIPTOR_SCHEMA)
                .context("parsing embedded descriptor schema")?;
            (value, "embedded descriptor schema".to_string())
        }
    };
    compile_schema(schema, &label, &options)
}

fn compile_schema(
    schema: Value,
    label: &str,
    options: &SchemaLoadOptions<'_>,
) -> Result<SchemaLoadResult> {
    let schema_version = extract_schema_version(&schema, options.schema_version_pointer)
        .ok_or_else(|| anyhow!("schema {label} missing schema_version const"))?;

    if let Some(expected) = options.expected_version {
        if expected != schema_version {
            bail!(
                "schema {label} declares schema_version '{schema_version}', expected '{expected}'"
            );
        }
    }

    let compiled = JSONSchema::compile(&schema)
        .map_err(|err| anyhow!("compiling schema {label}: {err}"))?;

    Ok(SchemaLoadResult {
        schema_version,
        compiled,
    })
}

/// Validate `instance` and fold every schema error into one message.
pub(crate) fn validate_instance(
    schema: &SchemaLoadResult,
    instance: &Value,
    label: &str,
) -> Result<()> {
    if let Err(errors) = schema.compiled.validate(instance) {
        let details = errors
            .map(|err| format!("{}: {err}", err.instance_path))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("{label} failed schema validation:\n{details}");
    }
    Ok(())
}

fn extract_schema_version(schema: &Value, pointer: &str) -> Option<String> {
    let version = schema.pointer(pointer).and_then(Value::as_str)?;
    if version
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        Some(version.to_string())
    } else {
        None
    }
}
