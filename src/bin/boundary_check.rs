//! Validates module descriptors against their implementation trees.
//!
//! With no descriptor arguments, every `module-info.java` under the project
//! root is checked. Copies of the same module (several descriptors declaring
//! one module name) are compared order-insensitively. The JSON report goes to
//! stdout; findings are echoed to stderr. Exit status is 0 when valid, 1 on
//! operational errors, 2 when violations (or warnings under `--strict`) are
//! fatal.

use anyhow::{Result, anyhow, bail};
use modfence::config::{self, Settings};
use modfence::{CheckPlan, collect_descriptor_files, find_project_root, run_check};
use std::env;
use std::path::PathBuf;
use tracing::info;

const FATAL_EXIT: i32 = 2;

fn main() {
    config::init_tracing();
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(FATAL_EXIT),
        Err(err) => {
            eprintln!("boundary-check: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<bool> {
    let cli = Cli::parse()?;
    let settings = Settings::from_env();

    let descriptors = if cli.descriptors.is_empty() {
        let root = match cli.root.clone().or_else(|| settings.root.clone()) {
            Some(root) => root,
            None => find_project_root(&env::current_dir()?)?,
        };
        let found = collect_descriptor_files(&root)?;
        if found.is_empty() {
            bail!("no module-info.java found under {}", root.display());
        }
        found
    } else {
        cli.descriptors.clone()
    };

    let source_roots = if !cli.source_roots.is_empty() {
        cli.source_roots.clone()
    } else if let Some(root) = cli.root.as_ref().or(settings.root.as_ref()) {
        settings.resolved_source_roots(root)
    } else {
        settings.resolved_source_roots(&env::current_dir()?)
    };

    let plan = CheckPlan {
        descriptors,
        source_roots,
        descriptor_schema: cli.schema.clone().or(settings.descriptor_schema.clone()),
        strict: cli.strict || settings.strict,
    };
    info!(descriptors = plan.descriptors.len(), strict = plan.strict, "running boundary check");
    let outcome = run_check(&plan)?;

    for module in &outcome.modules {
        for violation in &module.report.violations {
            eprintln!("boundary-check: {}: error: {violation}", module.report.module);
        }
        for warning in &module.report.warnings {
            eprintln!("boundary-check: {}: warning: {warning}", module.report.module);
        }
    }
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(!outcome.is_fatal())
}

struct Cli {
    root: Option<PathBuf>,
    source_roots: Vec<PathBuf>,
    schema: Option<PathBuf>,
    strict: bool,
    descriptors: Vec<PathBuf>,
}

impl Cli {
    fn parse() -> Result<Self> {
        let mut args = env::args_os();
        let _program = args.next();
        let mut cli = Cli {
            root: None,
            source_roots: Vec::new(),
            schema: None,
            strict: false,
            descriptors: Vec::new(),
        };

        while let Some(arg) = args.next() {
            let arg_str = arg
                .to_str()
                .ok_or_else(|| anyhow!("invalid UTF-8 in argument"))?;
            match arg_str {
                "--root" => cli.root = Some(next_path("--root", &mut args)?),
                "--source-root" => cli
                    .source_roots
                    .push(next_path("--source-root", &mut args)?),
                "--schema" => cli.schema = Some(next_path("--schema", &mut args)?),
                "--strict" => cli.strict = true,
                "--help" | "-h" => usage(0),
                other if other.starts_with("--") => bail!("unknown argument: {other}"),
                other => cli.descriptors.push(PathBuf::from(other)),
            }
        }

        Ok(cli)
    }
}

fn next_path(flag: &str, args: &mut env::ArgsOs) -> Result<PathBuf> {
    let value = args
        .next()
        .ok_or_else(|| anyhow!("{flag} requires a value"))?;
    let path = PathBuf::from(
        value
            .into_string()
            .map_err(|_| anyhow!("{flag} must be valid UTF-8"))?,
    );
    if path.as_os_str().is_empty() {
        bail!("{flag} must not be empty");
    }
    Ok(path)
}

fn usage(code: i32) -> ! {
    eprintln!(
        "Usage: boundary-check [--root DIR] [--source-root DIR]... [--schema PATH] [--strict] [DESCRIPTOR...]\n\nOptions:\n  --root DIR                Project root to search for module-info.java (or set MODFENCE_ROOT).\n  --source-root DIR         Implementation source root; repeatable (or set MODFENCE_SOURCE_ROOTS).\n  --schema PATH             Override the JSON descriptor schema (or set MODFENCE_DESCRIPTOR_SCHEMA).\n  --strict                  Treat provisional-export warnings as fatal (or set MODFENCE_STRICT=1).\n  --help                    Show this help text."
    );
    std::process::exit(code);
}
