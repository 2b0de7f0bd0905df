//! Diagnostics collected while reading and transforming a changelog.
//!
//! Expected problems with the input (a malformed heading, versions out of
//! order) are recorded here rather than returned as errors, so a single run
//! can report every problem it finds. [`Diagnostics::check`] converts any
//! fatal entries into a [`ChangelogError`] once a stage has finished.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::document::Span;
use crate::error::{ChangelogError, ChangelogResult};

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Reported alongside successful output.
    Warning,
    /// Aborts the pipeline before any output is produced.
    Fatal,
}

/// A single message attached to an optional source location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Human-readable description.
    pub message: String,
    /// Warning or fatal.
    pub severity: Severity,
    /// Where in the changelog the problem is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    /// What the parser wanted to see.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    /// What it found instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

impl Diagnostic {
    /// Attach the expected/actual pair for reporting.
    #[must_use]
    pub fn with_context(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }

    /// Whether this diagnostic aborts the pipeline.
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(span) = self.span {
            write!(f, "{span}: ")?;
        }
        f.write_str(&self.message)?;
        if let (Some(expected), Some(actual)) = (&self.expected, &self.actual) {
            write!(f, " (expected {expected}, found {actual:?})")?;
        }
        Ok(())
    }
}

/// Ordered, per-document diagnostic sink.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_fatal() {
            debug!(%diagnostic, "fatal diagnostic");
        } else {
            warn!(%diagnostic, "changelog warning");
        }
        self.entries.push(diagnostic);
    }

    /// Record a fatal diagnostic.
    pub fn fatal(&mut self, message: impl Into<String>, span: Option<Span>) {
        self.push(Self::build(message, Severity::Fatal, span));
    }

    /// Record a warning.
    pub fn warn(&mut self, message: impl Into<String>, span: Option<Span>) {
        self.push(Self::build(message, Severity::Warning, span));
    }

    /// Build a fatal diagnostic without recording it, for callers that
    /// want to add expected/actual context first.
    pub fn error(message: impl Into<String>, span: Option<Span>) -> Diagnostic {
        Self::build(message, Severity::Fatal, span)
    }

    /// Abort the current operation with `message`.
    pub fn fail(message: impl Into<String>) -> ChangelogError {
        ChangelogError::Fail(message.into())
    }

    /// Whether any fatal diagnostic has been recorded.
    pub fn has_fatal(&self) -> bool {
        self.entries.iter().any(Diagnostic::is_fatal)
    }

    /// Fail with every fatal diagnostic recorded so far, if there are any.
    pub fn check(&self) -> ChangelogResult<()> {
        let fatal: Vec<Diagnostic> = self
            .entries
            .iter()
            .filter(|d| d.is_fatal())
            .cloned()
            .collect();
        if fatal.is_empty() {
            Ok(())
        } else {
            Err(ChangelogError::Invalid(fatal))
        }
    }

    /// All recorded diagnostics, in the order they were reported.
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Consume the sink, keeping only the warnings.
    pub fn into_warnings(self) -> Vec<Diagnostic> {
        self.entries.into_iter().filter(|d| !d.is_fatal()).collect()
    }

    fn build(message: impl Into<String>, severity: Severity, span: Option<Span>) -> Diagnostic {
        Diagnostic {
            message: message.into(),
            severity,
            span,
            expected: None,
            actual: None,
        }
    }
}
