//! Command implementations

pub mod bump;

pub mod info;

pub mod query;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use owo_colors::OwoColorize;

use keeplog_core::{Diagnostic, Document};

/// How results are printed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    /// Print JSON to stdout instead of text.
    pub json: bool,
    /// Suppress warnings on stderr.
    pub quiet: bool,
}

/// `path` made absolute against `cwd`.
pub fn resolve_path(cwd: &Utf8Path, path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// Read and parse a changelog file.
pub fn read_changelog(path: &Utf8Path) -> anyhow::Result<Document> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read changelog {path}"))?;
    Document::parse(&text).with_context(|| format!("failed to parse changelog {path}"))
}

/// Print non-fatal diagnostics to stderr.
pub fn print_warnings(path: &Utf8Path, warnings: &[Diagnostic], output: Output) {
    if output.quiet {
        return;
    }
    for warning in warnings {
        eprintln!("{} {path}: {warning}", "warning:".yellow().bold());
    }
}
