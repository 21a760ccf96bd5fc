//! Lists declarations carrying a marker annotation as NDJSON.
//!
//! With `--descriptor`, the marked packages are also checked against that
//! module's boundary: when the consuming processor runs outside the module
//! (`--external`, optionally `--processor MODULE`), every package holding a
//! factory candidate must be exported to it. Missing exports exit with 2.

use anyhow::{Result, anyhow, bail};
use modfence::config::{self, Settings};
use modfence::{
    DeclarationIndex, ModuleBoundary, ModuleName, PackageTree, ProcessorPlacement,
    default_source_roots, export_obligations, find_project_root, load_descriptor,
};
use std::env;
use std::path::PathBuf;

const DEFAULT_MARKER: &str = "IncludeToFactory";
const FATAL_EXIT: i32 = 2;

fn main() {
    config::init_tracing();
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(FATAL_EXIT),
        Err(err) => {
            eprintln!("marker-scan: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<bool> {
    let cli = Cli::parse()?;
    let settings = Settings::from_env();

    let roots = if !cli.roots.is_empty() {
        cli.roots.clone()
    } else if let Some(descriptor) = &cli.descriptor {
        default_source_roots(descriptor)
    } else {
        let root = match settings.root.clone() {
            Some(root) => root,
            None => find_project_root(&env::current_dir()?)?,
        };
        let resolved = settings.resolved_source_roots(&root);
        if resolved.is_empty() { vec![root] } else { resolved }
    };

    let index = DeclarationIndex::scan(&roots)?;
    let selected: Vec<_> = if cli.candidates_only {
        index.factory_candidates(&cli.marker).collect()
    } else {
        index.find_tagged(&cli.marker).collect()
    };
    for declaration in &selected {
        println!("{}", serde_json::to_string(declaration)?);
    }

    let Some(descriptor_path) = &cli.descriptor else {
        return Ok(true);
    };
    let descriptor = load_descriptor(descriptor_path, settings.descriptor_schema.as_deref())?;
    let tree = PackageTree::discover(&roots)?;
    let boundary = ModuleBoundary::from_descriptor(descriptor, tree);
    let placement = if cli.external {
        let module = cli.processor.as_deref().map(ModuleName::new).transpose()?;
        ProcessorPlacement::External { module }
    } else {
        ProcessorPlacement::SameModule
    };

    let missing = export_obligations(&index, &cli.marker, &boundary, &placement);
    for violation in &missing {
        eprintln!("marker-scan: {}: error: {violation}", boundary.module());
    }
    Ok(missing.is_empty())
}

struct Cli {
    marker: String,
    roots: Vec<PathBuf>,
    descriptor: Option<PathBuf>,
    external: bool,
    processor: Option<String>,
    candidates_only: bool,
}

impl Cli {
    fn parse() -> Result<Self> {
        let mut args = env::args_os();
        let _program = args.next();
        let mut cli = Cli {
            marker: DEFAULT_MARKER.to_string(),
            roots: Vec::new(),
            descriptor: None,
            external: false,
            processor: None,
            candidates_only: false,
        };

        while let Some(arg) = args.next() {
            let arg_str = arg
                .to_str()
                .ok_or_else(|| anyhow!("invalid UTF-8 in argument"))?;
            match arg_str {
                "--marker" => cli.marker = next_value("--marker", &mut args)?,
                "--descriptor" => {
                    cli.descriptor = Some(PathBuf::from(next_value("--descriptor", &mut args)?))
                }
                "--external" => cli.external = true,
                "--processor" => {
                    cli.processor = Some(next_value("--processor", &mut args)?);
                    cli.external = true;
                }
                "--candidates" => cli.candidates_only = true,
                "--help" | "-h" => usage(0),
                other if other.starts_with("--") => bail!("unknown argument: {other}"),
                other => cli.roots.push(PathBuf::from(other)),
            }
        }

        if cli.external && cli.descriptor.is_none() {
            bail!("--external and --processor require --descriptor");
        }
        Ok(cli)
    }
}

fn next_value(flag: &str, args: &mut env::ArgsOs) -> Result<String> {
    let value = args
        .next()
        .ok_or_else(|| anyhow!("{flag} requires a value"))?
        .into_string()
        .map_err(|_| anyhow!("{flag} must be valid UTF-8"))?;
    if value.trim().is_empty() {
        bail!("{flag} must not be empty");
    }
    Ok(value)
}

fn usage(code: i32) -> ! {
    eprintln!(
        "Usage: marker-scan [--marker NAME] [--candidates] [--descriptor PATH [--external] [--processor MODULE]] [ROOT...]\n\nOptions:\n  --marker NAME             Annotation to look for (default: IncludeToFactory).\n  --candidates              Only list public static methods an external generator accepts.\n  --descriptor PATH         Check marked packages against this module descriptor.\n  --external                The processor runs outside the module; marked packages must be exported.\n  --processor MODULE        Module name of the external processor (implies --external).\n  --help                    Show this help text."
    );
    std::process::exit(code);
}
