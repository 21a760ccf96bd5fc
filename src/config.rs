//! Environment configuration shared across binaries.
//!
//! Every helper reads the same variables so behavior does not drift between
//! CLIs. Command-line flags override these values in each binary.

use crate::split_list;
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub const ROOT_ENV: &str = "MODFENCE_ROOT";
pub const SOURCE_ROOTS_ENV: &str = "MODFENCE_SOURCE_ROOTS";
pub const STRICT_ENV: &str = "MODFENCE_STRICT";
pub const DESCRIPTOR_SCHEMA_ENV: &str = "MODFENCE_DESCRIPTOR_SCHEMA";
pub const LOG_ENV: &str = "MODFENCE_LOG";

const DEFAULT_LOG_FILTER: &str = "warn";

/// Settings resolved from the environment before flags are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub root: Option<PathBuf>,
    pub source_roots: Vec<PathBuf>,
    pub strict: bool,
    pub descriptor_schema: Option<PathBuf>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            root: non_empty_var(ROOT_ENV).map(PathBuf::from),
            source_roots: non_empty_var(SOURCE_ROOTS_ENV)
                .map(|raw| split_list(&raw).into_iter().map(PathBuf::from).collect())
                .unwrap_or_default(),
            strict: flag_enabled(STRICT_ENV),
            descriptor_schema: non_empty_var(DESCRIPTOR_SCHEMA_ENV).map(PathBuf::from),
        }
    }

    /// Source roots anchored at `root`; absolute entries are kept as-is.
    pub fn resolved_source_roots(&self, root: &Path) -> Vec<PathBuf> {
        self.source_roots
            .iter()
            .map(|dir| {
                if dir.is_absolute() {
                    dir.clone()
                } else {
                    root.join(dir)
                }
            })
            .collect()
    }
}

/// Whether an env flag is set to something other than empty or `0`.
pub fn flag_enabled(name: &str) -> bool {
    env::var(name)
        .ok()
        .map(|v| !v.trim().is_empty() && v.trim() != "0")
        .unwrap_or(false)
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Install the stderr tracing subscriber used by every binary.
///
/// Filter comes from `MODFENCE_LOG`; stdout stays reserved for JSON output.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .try_init();
}
