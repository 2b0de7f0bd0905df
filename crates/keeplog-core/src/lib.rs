//! Core library for keeplog.
//!
//! Reads and rewrites "Keep a Changelog" documents. The `keeplog` CLI is a
//! thin layer over this crate: it handles files and terminal output, and
//! everything else happens here.
//!
//! # Modules
//!
//! - [`document`] - Flat markdown block tree (parse and serialize)
//! - [`heading`] - Release heading parser
//! - [`index`] - Release heading index and structural validation
//! - [`extract`] - Section lookup and body extraction
//! - [`version`] - Next-version computation
//! - [`promote`] - Unreleased-to-release promotion
//! - [`links`] - Comparison link regeneration
//! - [`bump`] / [`query`] - The two end-to-end pipelines
//! - [`config`] - Configuration loading and management
//! - [`diagnostics`] / [`error`] - Problem reporting and error types
//! - [`git`] - Repository coordinates from git remotes
//!
//! # Quick Start
//!
//! ```
//! use keeplog_core::{Document, QuerySelector, query};
//!
//! let changelog = "## [Unreleased]\n\n- Pending\n\n## [1.0.0] - 2022-01-01\n\n- First\n";
//! let document = Document::parse(changelog).unwrap();
//! let latest = query(&document, &QuerySelector::Latest).unwrap();
//! assert_eq!(latest.version, "1.0.0");
//! assert_eq!(latest.release_notes, "- First\n");
//! ```
#![deny(unsafe_code)]

pub mod bump;

pub mod config;

pub mod diagnostics;

pub mod document;

pub mod error;

pub mod extract;

pub mod git;

pub mod heading;

pub mod index;

pub mod links;

pub mod promote;

pub mod query;

pub mod release;

pub mod version;

pub use bump::{BumpOptions, BumpOutcome, bump};
pub use config::{Config, ConfigLoader, LogLevel};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use document::Document;
pub use error::{ChangelogError, ChangelogResult, ConfigError, ConfigResult};
pub use links::RepositoryCoordinates;
pub use query::{QueryOutcome, query};
pub use release::{QuerySelector, Release, ReleaseSpec};
pub use version::{BumpKind, VersionError};

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
