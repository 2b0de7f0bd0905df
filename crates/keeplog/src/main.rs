//! keeplog CLI
#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use keeplog::{Cli, Commands, commands};
use keeplog_core::config::{Config, ConfigLoader};
use tracing::debug;

mod observability;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.color.apply();

    if let Some(ref dir) = cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }
    let cwd = utf8(
        std::env::current_dir().context("failed to determine current directory")?,
        "current directory",
    )?;

    let config = load_config(&cli, &cwd)?;
    let _guard = observability::init(
        &observability::LogSettings::from_config(&config),
        observability::env_filter(cli.quiet, cli.verbose, config.log_level.as_str()),
    )
    .context("failed to initialize logging")?;
    debug!(
        command = command_name(&cli.command),
        verbose = cli.verbose,
        quiet = cli.quiet,
        json = cli.json,
        %cwd,
        "CLI initialized"
    );

    let output = commands::Output {
        json: cli.json,
        quiet: cli.quiet,
    };
    let result = match cli.command {
        Commands::Bump(args) => commands::bump::cmd_bump(args, output, &config, &cwd),
        Commands::Query(args) => commands::query::cmd_query(args, output, &config, &cwd),
        Commands::Info(args) => commands::info::cmd_info(args, cli.json, &config, &cwd),
    };
    if let Err(ref err) = result {
        tracing::error!(error = format!("{err:#}"), "command failed");
    }
    result
}

/// Project config discovered from `cwd`, overlaid with `--config`.
fn load_config(cli: &Cli, cwd: &Utf8Path) -> anyhow::Result<Config> {
    let mut loader = ConfigLoader::new().with_project_search(cwd);
    if let Some(ref path) = cli.config {
        loader = loader.with_file(utf8(path.clone(), "config path")?);
    }
    loader.load().context("failed to load configuration")
}

fn utf8(path: PathBuf, what: &str) -> anyhow::Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path)
        .map_err(|path| anyhow!("{what} is not valid UTF-8: {}", path.display()))
}

const fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Bump(_) => "bump",
        Commands::Query(_) => "query",
        Commands::Info(_) => "info",
    }
}
