#![allow(dead_code)]

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

pub fn fixture_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("codegentle")
}

pub fn common_descriptor() -> PathBuf {
    fixture_root().join("codegentle-common/src/jvmMain/java/module-info.java")
}

pub fn common_sources() -> PathBuf {
    fixture_root().join("codegentle-common/src")
}

pub fn apt_sources() -> PathBuf {
    fixture_root().join("tests/test-java-apt/proj/src")
}

/// Path of a built helper binary, as provided by Cargo for integration tests.
pub fn helper_binary(name: &str) -> PathBuf {
    let path = match name {
        "boundary-check" => env!("CARGO_BIN_EXE_boundary-check"),
        "boundary-render" => env!("CARGO_BIN_EXE_boundary-render"),
        "marker-scan" => env!("CARGO_BIN_EXE_marker-scan"),
        other => panic!("unknown helper {other}"),
    };
    PathBuf::from(path)
}

/// Command for `name` with the modfence environment cleared so the host
/// shell cannot change results.
pub fn helper_command(name: &str) -> Command {
    let mut cmd = Command::new(helper_binary(name));
    for var in [
        "MODFENCE_ROOT",
        "MODFENCE_SOURCE_ROOTS",
        "MODFENCE_STRICT",
        "MODFENCE_DESCRIPTOR_SCHEMA",
        "MODFENCE_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

pub fn run_command(mut cmd: Command) -> Result<Output> {
    let output = cmd
        .output()
        .with_context(|| format!("failed to run command: {:?}", cmd))?;
    if output.status.success() {
        Ok(output)
    } else {
        bail!(
            "command {:?} failed: status {:?}\nstdout: {}\nstderr: {}",
            cmd,
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    }
}

/// Run a command that is expected to fail and return its output.
pub fn run_failing(mut cmd: Command) -> Result<Output> {
    let output = cmd
        .output()
        .with_context(|| format!("failed to run command: {:?}", cmd))?;
    if output.status.success() {
        bail!(
            "command {:?} unexpectedly succeeded\nstdout: {}",
            cmd,
            String::from_utf8_lossy(&output.stdout)
        );
    }
    Ok(output)
}

pub fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}
