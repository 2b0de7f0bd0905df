//! Query command: print the notes of one release.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use tracing::instrument;

use keeplog_core::config::Config;
use keeplog_core::{QuerySelector, query};

use super::Output;

/// Arguments for the `query` subcommand.
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// A version, `latest`, `unreleased`, or `latest-or-unreleased`
    #[arg(value_name = "SELECTOR", default_value = "latest")]
    pub selector: QuerySelector,

    /// Changelog to read (default: config or CHANGELOG.md)
    #[arg(long, value_name = "FILE")]
    pub changelog: Option<Utf8PathBuf>,
}

/// Execute the query command.
///
/// Text output is the section body exactly as it appears in the changelog,
/// suitable for piping into a release description.
#[instrument(name = "cmd_query", skip_all, fields(selector = %args.selector))]
pub fn cmd_query(
    args: QueryArgs,
    output: Output,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    let path = super::resolve_path(cwd, args.changelog.as_deref().unwrap_or(&config.changelog_path()));
    let document = super::read_changelog(&path)?;
    let outcome =
        query(&document, &args.selector).with_context(|| format!("cannot query {path}"))?;

    if output.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print!("{}", outcome.release_notes);
    }
    Ok(())
}
