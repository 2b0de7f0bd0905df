//! Bump command, a thin CLI layer over `keeplog_core::bump`.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDate;
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, info, instrument};

use keeplog_core::config::Config;
use keeplog_core::{BumpKind, BumpOptions, BumpOutcome, RepositoryCoordinates, git};

use super::Output;

/// Arguments for the `bump` subcommand.
#[derive(Args, Debug)]
pub struct BumpArgs {
    /// major, minor, patch, premajor, preminor, prepatch, prerelease, or an
    /// explicit version such as 2.0.0
    #[arg(long = "version", value_name = "KIND|VERSION", default_value = "patch")]
    pub kind: BumpKind,

    /// Prerelease identifier for the pre* kinds (e.g. "beta")
    #[arg(long, value_name = "ID")]
    pub preid: Option<String>,

    /// Release date (default: today)
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub date: Option<NaiveDate>,

    /// Changelog to read (default: config or CHANGELOG.md)
    #[arg(long, value_name = "FILE")]
    pub changelog: Option<Utf8PathBuf>,

    /// Write the result here instead of overwriting the changelog
    #[arg(long, value_name = "FILE")]
    pub output: Option<Utf8PathBuf>,

    /// Prefix turning versions into git tags (default: "v")
    #[arg(long, value_name = "PREFIX")]
    pub tag_prefix: Option<String>,

    /// Repository owner for comparison links
    #[arg(long, requires = "repo")]
    pub owner: Option<String>,

    /// Repository name for comparison links
    #[arg(long, requires = "owner")]
    pub repo: Option<String>,

    /// Repository host for comparison links (default: github.com)
    #[arg(long, requires = "owner")]
    pub host: Option<String>,

    /// Write no comparison links
    #[arg(long, conflicts_with_all = ["owner", "repo", "host"])]
    pub no_links: bool,

    /// Add an empty Unreleased section above the new release
    #[arg(long)]
    pub keep_unreleased_section: bool,

    /// Fail if the Unreleased section is empty
    #[arg(long)]
    pub fail_on_empty_release_notes: bool,

    /// Show the result without writing anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Serialize)]
struct BumpReport<'a> {
    #[serde(flatten)]
    outcome: &'a BumpOutcome,
    output: &'a Utf8Path,
    dry_run: bool,
}

/// Execute the bump command.
#[instrument(name = "cmd_bump", skip_all, fields(kind = %args.kind, dry_run = args.dry_run))]
pub fn cmd_bump(
    args: BumpArgs,
    output: Output,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    let path = super::resolve_path(cwd, args.changelog.as_deref().unwrap_or(&config.changelog_path()));
    let target = args
        .output
        .as_deref()
        .or_else(|| config.changelog_output())
        .map_or_else(|| path.clone(), |out| super::resolve_path(cwd, out));
    debug!(%path, %target, "resolved changelog paths");

    let document = super::read_changelog(&path)?;
    let options = bump_options(&args, config);
    let outcome =
        keeplog_core::bump(document, &options).with_context(|| format!("cannot bump {path}"))?;

    if !args.dry_run {
        std::fs::write(&target, outcome.document.to_markdown())
            .with_context(|| format!("failed to write {target}"))?;
        info!(version = %outcome.version, %target, "changelog written");
    }

    super::print_warnings(&path, &outcome.warnings, output);

    if output.json {
        let report = BumpReport {
            outcome: &outcome,
            output: &target,
            dry_run: args.dry_run,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{}: {} → {}",
        "Version".bold(),
        outcome.previous.to_string().dimmed(),
        outcome.version.to_string().green().bold()
    );
    println!("{}: {}", "Date".dimmed(), outcome.release_date);
    if args.dry_run {
        println!("{}", format!("Dry run: {target} not written.").yellow());
    } else {
        println!("{}: {}", "Changelog".dimmed(), target.cyan());
    }
    if !outcome.release_notes.is_empty() {
        println!();
        print!("{}", outcome.release_notes);
    }

    Ok(())
}

fn bump_options(args: &BumpArgs, config: &Config) -> BumpOptions {
    let date = args
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let mut options = BumpOptions::new(args.kind.clone(), date);
    options.preid.clone_from(&args.preid);
    options.tag_prefix = args
        .tag_prefix
        .clone()
        .unwrap_or_else(|| config.tag_prefix().to_string());
    options.repository = repository(args, config);
    options.keep_unreleased_section =
        args.keep_unreleased_section || config.keep_unreleased_section();
    options.fail_on_empty_release_notes =
        args.fail_on_empty_release_notes || config.fail_on_empty_release_notes();
    options
}

/// `--no-links` > `--owner/--repo` > `[repository]` config > `origin` remote.
fn repository(args: &BumpArgs, config: &Config) -> Option<RepositoryCoordinates> {
    if args.no_links {
        return None;
    }
    if let (Some(owner), Some(repo)) = (&args.owner, &args.repo) {
        let coordinates = RepositoryCoordinates::new(owner, repo);
        return Some(match args.host {
            Some(ref host) => coordinates.with_host(host),
            None => coordinates,
        });
    }
    if let Some(coordinates) = config.repository() {
        return Some(coordinates);
    }
    match git::origin_coordinates() {
        Ok(coordinates) => coordinates,
        Err(err) => {
            debug!(error = %err, "could not read origin remote");
            None
        }
    }
}
