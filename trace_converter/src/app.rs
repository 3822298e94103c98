use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::ConverterConfig;
use crate::convert::{convert_file, default_destination};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "dmtrace2tptp",
    author,
    version,
    about = "Convert an Android method-trace capture into a TPTP XML trace",
    long_about = None
)]
pub struct Args {
    /// Capture file produced by the Android method tracer
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Output path; defaults to SOURCE with a .trcxml extension
    #[arg(value_name = "DEST")]
    pub dest: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub converter: ConverterConfig,
}

impl From<Args> for AppConfig {
    fn from(value: Args) -> Self {
        let dest = value
            .dest
            .unwrap_or_else(|| default_destination(&value.source));
        Self {
            source: value.source,
            dest,
            converter: ConverterConfig::default(),
        }
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

pub fn run(config: AppConfig) -> Result<()> {
    let summary = convert_file(&config.source, &config.dest, &config.converter).with_context(
        || {
            format!(
                "failed to convert {} into {}",
                config.source.display(),
                config.dest.display()
            )
        },
    )?;

    summary.log();
    info!(dest = %config.dest.display(), "trace written");
    Ok(())
}
