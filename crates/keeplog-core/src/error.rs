//! Error types for keeplog-core

use thiserror::Error;

use crate::diagnostics::Diagnostic;
use crate::version::VersionError;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that abort a changelog pipeline run.
///
/// No output is produced when one of these is returned; the caller's
/// changelog file must be left untouched.
#[derive(Error, Debug)]
pub enum ChangelogError {
    /// The markdown parser rejected the input.
    #[error("failed to parse markdown: {0}")]
    Markdown(String),

    /// One or more fatal diagnostics were recorded.
    #[error("{}", render_fatal(.0))]
    Invalid(Vec<Diagnostic>),

    /// A stage aborted with a single message.
    #[error("{0}")]
    Fail(String),

    /// The selected release does not exist in the changelog.
    #[error("the specified release was not found")]
    ReleaseNotFound,

    /// The changelog has no release headings at all.
    #[error("no release headings in changelog")]
    NoReleases,

    /// Computing the next version failed.
    #[error(transparent)]
    Version(#[from] VersionError),

    /// A stage was handed state that contradicts its upstream stage.
    ///
    /// This is a bug in keeplog, not a problem with the changelog.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChangelogError {
    /// Fatal diagnostics carried by this error, if any.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Invalid(diagnostics) => diagnostics,
            _ => &[],
        }
    }
}

/// Result alias for changelog pipeline operations.
pub type ChangelogResult<T> = Result<T, ChangelogError>;

fn render_fatal(diagnostics: &[Diagnostic]) -> String {
    match diagnostics {
        [] => "changelog is invalid".to_string(),
        [only] => only.to_string(),
        many => {
            let lines: Vec<String> = many.iter().map(ToString::to_string).collect();
            format!(
                "changelog is invalid ({} problems):\n  {}",
                many.len(),
                lines.join("\n  ")
            )
        }
    }
}
