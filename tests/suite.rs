// Integration suite for the boundary helpers; runs the built binaries against
// the codegentle fixture tree so CLI contracts and library behavior are
// exercised together.
mod support;

use anyhow::{Context, Result};
use modfence::{
    BoundaryError, CheckPlan, DeclarationIndex, ModuleBoundary, PackageName, PackageTree,
    ProcessorPlacement, Violation, Warning, build_surface_map, export_obligations,
    load_descriptor, parse_module_info, private_packages, run_check,
};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use support::{
    apt_sources, common_descriptor, common_sources, fixture_root, helper_command, run_command,
    run_failing, write_file,
};
use tempfile::TempDir;

const COMMON: &str = "love.forte.codegentle.common";

const REORDERED_COPY: &str = "\
module love.forte.codegentle.common {
    requires kotlin.stdlib;
    requires java.compiler;

    exports love.forte.codegentle.common.writer;
    exports love.forte.codegentle.common.utils;
    /*
     * TODO exports .. to .. Only?
     */
    exports love.forte.codegentle.common.codepoint;
    exports love.forte.codegentle.common.spec;
    exports love.forte.codegentle.common.ref;
    exports love.forte.codegentle.common.naming;
    exports love.forte.codegentle.common.code;
    exports love.forte.codegentle.common;
}
";

fn package(name: &str) -> PackageName {
    PackageName::new(name).unwrap()
}

fn parse_stdout(stdout: &[u8]) -> Result<Value> {
    serde_json::from_slice(stdout).context("stdout is not JSON")
}

fn kinds(list: &Value) -> Vec<String> {
    list.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("kind").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

// The observed descriptor is valid against its own sources; the TODO export
// surfaces as a warning only.
#[test]
fn boundary_check_accepts_observed_descriptor() -> Result<()> {
    let mut cmd = helper_command("boundary-check");
    cmd.arg("--root").arg(fixture_root());
    let output = run_command(cmd)?;
    let report = parse_stdout(&output.stdout)?;

    assert_eq!(report["valid"], Value::Bool(true));
    let modules = report["modules"].as_array().expect("modules array");
    assert_eq!(modules.len(), 1);
    let module = &modules[0];
    assert_eq!(module["module"], COMMON);
    assert!(kinds(&module["violations"]).is_empty());
    assert_eq!(kinds(&module["warnings"]), ["provisional_export"]);
    assert_eq!(
        module["warnings"][0]["package"],
        "love.forte.codegentle.common.codepoint"
    );
    assert_eq!(module["warnings"][0]["note"], "exports .. to .. Only?");

    let surface = module["surface"].as_object().expect("surface map");
    let exported = surface
        .values()
        .filter(|entry| entry["exported"] == Value::Bool(true))
        .count();
    assert_eq!(exported, 8);
    assert_eq!(
        surface["love.forte.codegentle.common.internal"]["exported"],
        Value::Bool(false)
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("warning"), "stderr: {stderr}");
    Ok(())
}

#[test]
fn boundary_check_strict_mode_promotes_warnings() -> Result<()> {
    let mut cmd = helper_command("boundary-check");
    cmd.arg("--strict").arg(common_descriptor());
    let output = run_failing(cmd)?;
    assert_eq!(output.status.code(), Some(2));
    let report = parse_stdout(&output.stdout)?;
    assert_eq!(report["strict"], Value::Bool(true));
    assert_eq!(report["valid"], Value::Bool(true));

    let mut env_cmd = helper_command("boundary-check");
    env_cmd.env("MODFENCE_STRICT", "1").arg(common_descriptor());
    assert_eq!(run_failing(env_cmd)?.status.code(), Some(2));
    Ok(())
}

#[test]
fn boundary_check_reports_duplicate_and_unknown_exports() -> Result<()> {
    let temp = TempDir::new()?;
    let src = temp.path().join("lib/src");
    write_file(&src.join("main/kotlin/m/code/Code.kt"), "package m.code\n")?;
    let descriptor = src.join("main/java/module-info.java");
    write_file(
        &descriptor,
        "module m {\n    exports m.code;\n    exports m.code;\n    exports m.ghost;\n}\n",
    )?;

    let mut cmd = helper_command("boundary-check");
    cmd.arg(&descriptor);
    let output = run_failing(cmd)?;
    assert_eq!(output.status.code(), Some(2));
    let report = parse_stdout(&output.stdout)?;
    let module = &report["modules"][0];
    assert_eq!(
        kinds(&module["violations"]),
        ["duplicate_export", "unknown_package"]
    );
    assert_eq!(module["violations"][0]["occurrences"], 2);
    assert_eq!(module["violations"][1]["package"], "m.ghost");
    Ok(())
}

// Two copies that only differ in order and comment style are one descriptor.
#[test]
fn boundary_check_accepts_reordered_copy() -> Result<()> {
    let temp = TempDir::new()?;
    let copy = temp.path().join("module-info.java");
    fs::write(&copy, REORDERED_COPY)?;

    let mut cmd = helper_command("boundary-check");
    cmd.arg("--source-root")
        .arg(common_sources())
        .arg(common_descriptor())
        .arg(&copy);
    let output = run_command(cmd)?;
    let report = parse_stdout(&output.stdout)?;
    let module = &report["modules"][0];
    assert_eq!(module["descriptors"].as_array().map(Vec::len), Some(2));
    assert!(kinds(&module["violations"]).is_empty());
    Ok(())
}

#[test]
fn boundary_check_flags_divergent_copy() -> Result<()> {
    let temp = TempDir::new()?;
    let copy = temp.path().join("module-info.java");
    let divergent = REORDERED_COPY.replace("    exports love.forte.codegentle.common.spec;\n", "");
    fs::write(&copy, divergent)?;

    let plan = CheckPlan {
        descriptors: vec![common_descriptor(), copy.clone()],
        source_roots: vec![common_sources()],
        ..Default::default()
    };
    let outcome = run_check(&plan)?;
    assert!(!outcome.valid);
    let violations = &outcome.modules[0].report.violations;
    assert_eq!(violations.len(), 1);
    match &violations[0] {
        Violation::DivergentCopy {
            second,
            differences,
            ..
        } => {
            assert_eq!(second, &copy);
            assert_eq!(
                differences,
                &vec!["export love.forte.codegentle.common.spec only in first copy".to_string()]
            );
        }
        other => panic!("unexpected violation {other:?}"),
    }

    let mut cmd = helper_command("boundary-check");
    cmd.arg("--source-root")
        .arg(common_sources())
        .arg(common_descriptor())
        .arg(&copy);
    let output = run_failing(cmd)?;
    assert_eq!(output.status.code(), Some(2));
    Ok(())
}

#[test]
fn boundary_check_errors_without_descriptors() -> Result<()> {
    let temp = TempDir::new()?;
    let mut cmd = helper_command("boundary-check");
    cmd.arg("--root").arg(temp.path());
    let output = run_failing(cmd)?;
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no module-info.java"), "stderr: {stderr}");
    Ok(())
}

// module-info.java -> JSON -> module-info.java reproduces the observed file.
#[test]
fn boundary_render_converts_both_ways() -> Result<()> {
    let temp = TempDir::new()?;
    let json_path = temp.path().join("module-info.json");

    let mut to_json = helper_command("boundary-render");
    to_json
        .arg(common_descriptor())
        .arg("--output")
        .arg(&json_path);
    run_command(to_json)?;

    let document: Value = serde_json::from_str(&fs::read_to_string(&json_path)?)?;
    assert_eq!(document["schema_version"], "module_descriptor_v1");
    assert_eq!(document["module"], COMMON);
    assert_eq!(document["requires"].as_array().map(Vec::len), Some(2));
    let exports = document["exports"].as_array().expect("exports");
    assert_eq!(exports.len(), 8);
    assert_eq!(exports[2]["provisional"], "exports .. to .. Only?");
    assert_eq!(exports[0]["visibility"], "public");

    let mut to_java = helper_command("boundary-render");
    to_java.arg(&json_path);
    let output = run_command(to_java)?;
    let rendered = String::from_utf8(output.stdout)?;
    let original = fs::read_to_string(common_descriptor())?;
    assert_eq!(rendered, original);
    assert_eq!(parse_module_info(&rendered)?, parse_module_info(&original)?);
    Ok(())
}

#[test]
fn boundary_render_rejects_schema_violations() -> Result<()> {
    let temp = TempDir::new()?;
    let missing_module = temp.path().join("missing.json");
    fs::write(
        &missing_module,
        r#"{"schema_version": "module_descriptor_v1", "exports": [{"package": "a.b"}]}"#,
    )?;
    let mut cmd = helper_command("boundary-render");
    cmd.arg(&missing_module);
    let output = run_failing(cmd)?;
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("module"), "stderr: {stderr}");

    let empty_with = temp.path().join("empty_with.json");
    fs::write(
        &empty_with,
        r#"{"schema_version": "module_descriptor_v1", "module": "a",
            "provides": [{"service": "a.Spi", "with": []}]}"#,
    )?;
    assert!(load_descriptor(&empty_with, None).is_err());
    Ok(())
}

#[test]
fn marker_scan_lists_factory_method() -> Result<()> {
    let mut cmd = helper_command("marker-scan");
    cmd.arg("--marker").arg("IncludeToFactory").arg(apt_sources());
    let output = run_command(cmd)?;
    let stdout = String::from_utf8(output.stdout)?;
    let lines: Vec<Value> = stdout
        .lines()
        .map(|line| serde_json::from_str::<Value>(line))
        .collect::<Result<_, _>>()?;
    assert_eq!(lines.len(), 1);
    let record = &lines[0];
    assert_eq!(record["name"], "createFoo");
    assert_eq!(record["enclosing_type"], "Foo");
    assert_eq!(record["package"], "love.forte.codegentle.test.apt.proj");
    assert_eq!(record["kind"], "method");
    assert_eq!(record["line"], 16);
    assert_eq!(record["tags"][0], "IncludeToFactory");
    Ok(())
}

// A processor outside the module needs the marked package exported to it.
#[test]
fn marker_scan_enforces_exports_for_external_processor() -> Result<()> {
    let temp = TempDir::new()?;
    let descriptor = temp.path().join("module-info.java");
    fs::write(&descriptor, "module love.forte.codegentle.test.apt.proj {\n}\n")?;

    let mut same_module = helper_command("marker-scan");
    same_module
        .arg("--descriptor")
        .arg(&descriptor)
        .arg(apt_sources());
    run_command(same_module)?;

    let mut external = helper_command("marker-scan");
    external
        .arg("--descriptor")
        .arg(&descriptor)
        .arg("--processor")
        .arg("love.forte.codegentle.test.apt.proc")
        .arg(apt_sources());
    let output = run_failing(external)?;
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("love.forte.codegentle.test.apt.proj"),
        "stderr: {stderr}"
    );

    fs::write(
        &descriptor,
        "module love.forte.codegentle.test.apt.proj {\n    exports love.forte.codegentle.test.apt.proj to love.forte.codegentle.test.apt.proc;\n}\n",
    )?;
    let mut restricted = helper_command("marker-scan");
    restricted
        .arg("--descriptor")
        .arg(&descriptor)
        .arg("--processor")
        .arg("love.forte.codegentle.test.apt.proc")
        .arg(apt_sources());
    run_command(restricted)?;
    Ok(())
}

#[test]
fn library_boundary_over_fixture_tree() -> Result<()> {
    let descriptor = load_descriptor(&common_descriptor(), None)?;
    assert_eq!(descriptor.exports.len(), 8);
    assert_eq!(descriptor.requires.len(), 2);

    let tree = PackageTree::discover(&[common_sources()])?;
    assert_eq!(tree.len(), 9);
    let boundary = ModuleBoundary::from_descriptor(descriptor, tree);
    let report = boundary.check();
    assert!(report.is_valid());
    assert!(!report.is_fatal(false));
    assert!(report.is_fatal(true));
    assert!(matches!(
        report.warnings.as_slice(),
        [Warning::ProvisionalExport { package: p, .. }] if p.as_str() == "love.forte.codegentle.common.codepoint"
    ));

    let surface = build_surface_map(&boundary);
    assert_eq!(
        private_packages(&surface),
        vec![&package("love.forte.codegentle.common.internal")]
    );

    let frozen = boundary.freeze().expect("warnings do not block freezing");
    assert_eq!(frozen.provisional_exports().count(), 1);
    Ok(())
}

// Re-declaring an export through the API is rejected up front; loading the
// same mistake from a file is reported by validation instead.
#[test]
fn declaring_exports_incrementally() -> Result<()> {
    let tree = PackageTree::discover(&[common_sources()])?;
    let module = modfence::ModuleName::new(COMMON)?;
    let mut boundary = ModuleBoundary::new(module, tree);

    for short in ["code", "naming", "ref", "spec", "utils", "writer"] {
        boundary.declare_export(package(&format!("{COMMON}.{short}")), None)?;
    }
    boundary.declare_export(package(COMMON), None)?;
    boundary.declare_provisional_export(
        package(&format!("{COMMON}.codepoint")),
        "exports .. to .. Only?",
    )?;
    assert!(boundary.validate().is_empty());

    let err = boundary
        .declare_export(package(&format!("{COMMON}.codepoint")), None)
        .unwrap_err();
    assert!(matches!(err, BoundaryError::DuplicateExport { .. }));

    let err = boundary
        .declare_export(package(&format!("{COMMON}.ghost")), None)
        .unwrap_err();
    assert!(matches!(err, BoundaryError::UnknownPackage { .. }));

    let err = boundary
        .declare_export(
            package(&format!("{COMMON}.internal")),
            Some(BTreeSet::new()),
        )
        .unwrap_err();
    assert!(matches!(err, BoundaryError::EmptyRestriction { .. }));
    assert_eq!(boundary.exports().len(), 8);
    Ok(())
}

#[test]
fn export_obligations_follow_processor_placement() -> Result<()> {
    let index = DeclarationIndex::scan(&[apt_sources()])?;
    assert_eq!(index.factory_candidates("IncludeToFactory").count(), 1);

    let tree = PackageTree::discover(&[apt_sources()])?;
    let boundary = ModuleBoundary::new(
        modfence::ModuleName::new("love.forte.codegentle.test.apt.proj")?,
        tree,
    );
    assert!(
        export_obligations(&index, "IncludeToFactory", &boundary, &ProcessorPlacement::SameModule)
            .is_empty()
    );
    let missing = export_obligations(
        &index,
        "IncludeToFactory",
        &boundary,
        &ProcessorPlacement::External { module: None },
    );
    assert_eq!(missing.len(), 1);
    assert!(matches!(
        &missing[0],
        Violation::MarkerPackageNotExported { declarations, .. } if declarations == &vec!["Foo.createFoo".to_string()]
    ));
    Ok(())
}
