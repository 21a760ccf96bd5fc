//! Converts a module descriptor between its text and JSON forms.
//!
//! `module-info.java` input renders to JSON by default and JSON input to the
//! canonical `module-info.java` layout; `--to` forces either. Rendering the
//! same format as the input re-serializes it canonically.

use anyhow::{Context, Result, anyhow, bail};
use modfence::config::{self, Settings};
use modfence::{load_descriptor, render_module_info};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    config::init_tracing();
    if let Err(err) = run() {
        eprintln!("boundary-render: {err:#}");
        std::process::exit(1);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Java,
    Json,
}

impl Format {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "java" => Ok(Format::Java),
            "json" => Ok(Format::Json),
            other => bail!("unsupported format '{other}'; expected java or json"),
        }
    }

    fn opposite_of(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Format::Java,
            _ => Format::Json,
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse()?;
    let settings = Settings::from_env();
    let schema = cli.schema.clone().or(settings.descriptor_schema);
    let descriptor = load_descriptor(&cli.input, schema.as_deref())?;

    let format = cli.format.unwrap_or_else(|| Format::opposite_of(&cli.input));
    let rendered = match format {
        Format::Java => render_module_info(&descriptor),
        Format::Json => {
            let mut text = serde_json::to_string_pretty(&descriptor.to_json_value()?)?;
            text.push('\n');
            text
        }
    };

    match cli.output {
        Some(path) => {
            fs::write(&path, rendered).with_context(|| format!("writing {}", path.display()))?
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

struct Cli {
    input: PathBuf,
    format: Option<Format>,
    output: Option<PathBuf>,
    schema: Option<PathBuf>,
}

impl Cli {
    fn parse() -> Result<Self> {
        let mut args = env::args_os();
        let _program = args.next();
        let mut input = None;
        let mut format = None;
        let mut output = None;
        let mut schema = None;

        while let Some(arg) = args.next() {
            let arg_str = arg
                .to_str()
                .ok_or_else(|| anyhow!("invalid UTF-8 in argument"))?;
            match arg_str {
                "--to" => {
                    let value = args
                        .next()
                        .and_then(|v| v.into_string().ok())
                        .ok_or_else(|| anyhow!("--to requires java or json"))?;
                    format = Some(Format::parse(&value)?);
                }
                "--output" | "-o" => output = Some(next_path(arg_str, &mut args)?),
                "--schema" => schema = Some(next_path("--schema", &mut args)?),
                "--help" | "-h" => usage(0),
                other if other.starts_with('-') => bail!("unknown argument: {other}"),
                other => {
                    if input.is_some() {
                        bail!("only one descriptor may be rendered at a time");
                    }
                    input = Some(PathBuf::from(other));
                }
            }
        }

        let Some(input) = input else {
            usage(1);
        };
        Ok(Self {
            input,
            format,
            output,
            schema,
        })
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
        "Usage: boundary-render [--to java|json] [--output PATH] [--schema PATH] DESCRIPTOR\n\nOptions:\n  --to FORMAT               Output format; defaults to the opposite of the input.\n  --output PATH             Write to PATH instead of stdout.\n  --schema PATH             Override the JSON descriptor schema (or set MODFENCE_DESCRIPTOR_SCHEMA).\n  --help                    Show this help text."
    );
    std::process::exit(code);
}
