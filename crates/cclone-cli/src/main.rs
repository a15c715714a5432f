mod cli;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use directories::{BaseDirs, ProjectDirs};
use eyre::{bail, Context, Result};

use cclone_core::progress::{ProgressMonitor, ProgressSink};
use cclone_core::{interrupt, Config, CopyEngine};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = cli::Cli::parse();
    let code = match run(args) {
        Ok(code) => code,
        Err(err) => {
            log::error!("{err:#}");
            1
        }
    };
    std::process::exit(code);
}

fn run(args: cli::Cli) -> Result<i32> {
    let mut config = load_config_file()?;
    config.merge_with(&args.to_config());
    let quiet = config.quiet;

    if let Err(err) = interrupt::install_handler() {
        log::warn!("could not install signal handlers: {err}");
    }

    let (sources, destination) = split_paths(&args.paths)?;

    let monitor = Arc::new(ProgressMonitor::new(config.progress, config.quiet));
    let engine = CopyEngine::new(
        Arc::new(config),
        Arc::clone(&monitor) as Arc<dyn ProgressSink>,
    );

    match engine.run(&sources, &destination) {
        Ok(stats) => {
            drop(engine);
            drop(monitor);
            if !quiet {
                println!(
                    "cclone: {} files copied ({} bytes), {} skipped, {} errors",
                    stats.files_copied, stats.bytes_copied, stats.files_skipped, stats.errors
                );
            }
            Ok(if stats.errors > 0 { 1 } else { 0 })
        }
        Err(err) => {
            drop(engine);
            drop(monitor);
            eprintln!("cclone: {err}");
            Ok(err.exit_code())
        }
    }
}

fn split_paths(paths: &[PathBuf]) -> Result<(Vec<PathBuf>, PathBuf)> {
    let Some((destination, sources)) = paths.split_last() else {
        bail!("expected at least one source and a destination");
    };
    if sources.is_empty() {
        bail!("expected at least one source and a destination");
    }
    Ok((sources.to_vec(), destination.clone()))
}

/// Load the first configuration file found. A missing file is not an
/// error; the defaults apply.
fn load_config_file() -> Result<Config> {
    for path in config_file_candidates() {
        if !path.exists() {
            continue;
        }
        let text = fs::read_to_string(&path)
            .wrap_err_with(|| format!("failed to read config file {}", path.display()))?;
        let config = toml::from_str(&text)
            .wrap_err_with(|| format!("failed to parse config file {}", path.display()))?;
        log::debug!("loaded configuration from {}", path.display());
        return Ok(config);
    }
    Ok(Config::default())
}

/// Search order: working directory, then the platform config directory.
fn config_file_candidates() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(".cclone.toml")];
    if let Some(proj) = ProjectDirs::from("dev", "cclone", "cclone") {
        paths.push(proj.config_dir().join("config.toml"));
    } else if let Some(base) = BaseDirs::new() {
        paths.push(base.home_dir().join(".config").join("cclone").join("config.toml"));
    }
    paths
}
