//! Command line interface.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{BackendKind, Config};

/// Chunked file storage service.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[arg(
        short,
        long,
        value_name = "config file",
        default_value = "config.toml",
        help = "Path to config file"
    )]
    pub config: PathBuf,

    #[arg(
        short,
        long,
        value_name = "backend",
        help = "Storage backend: filesystem, sqlite, postgres or mongodb"
    )]
    pub backend: Option<BackendKind>,
}

impl Cli {
    /// Apply command line overrides to a loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(backend) = self.backend {
            config.storage.backend = backend;
        }
    }
}
