//! Configuration loading and discovery.
//!
//! Sources are merged with figment, lowest precedence first:
//! 1. Built-in defaults
//! 2. User config: `~/.config/keeplog/config.<ext>`
//! 3. Project config: `.keeplog.<ext>` or `keeplog.<ext>` in the current
//!    directory or the nearest parent (the search stops at a `.git` boundary)
//! 4. Files passed explicitly (`--config`)
//!
//! Where `<ext>` is one of: `toml`, `yaml`, `yml`, `json`.
//!
//! # Example
//! ```no_run
//! use camino::Utf8PathBuf;
//! use keeplog_core::config::ConfigLoader;
//!
//! let cwd = std::env::current_dir().unwrap();
//! let cwd = Utf8PathBuf::try_from(cwd).expect("current directory is not valid UTF-8");
//! let config = ConfigLoader::new()
//!     .with_project_search(&cwd)
//!     .load()
//!     .unwrap();
//! println!("changelog: {}", config.changelog_path());
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::bump::DEFAULT_TAG_PREFIX;
use crate::error::{ConfigError, ConfigResult};
use crate::links::RepositoryCoordinates;

/// Changelog file used when none is configured.
pub const DEFAULT_CHANGELOG: &str = "CHANGELOG.md";

/// The configuration for keeplog.
///
/// Every section is optional; command-line flags override whatever is set
/// here.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    pub log_level: LogLevel,
    /// Directory for JSONL log files (falls back to platform defaults if unset).
    pub log_dir: Option<Utf8PathBuf>,
    /// Where the changelog lives and how it is bumped.
    pub changelog: Option<ChangelogConfig>,
    /// Repository used for comparison links.
    pub repository: Option<RepositoryConfig>,
}

/// `[changelog]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ChangelogConfig {
    /// Changelog to read (default: `CHANGELOG.md`).
    pub path: Option<Utf8PathBuf>,
    /// Where `bump` writes the result (default: overwrite `path`).
    pub output: Option<Utf8PathBuf>,
    /// Prefix of release tags in comparison links (default: `v`).
    pub tag_prefix: Option<String>,
    /// Add an empty Unreleased section after each bump.
    pub keep_unreleased_section: Option<bool>,
    /// Refuse to bump when the Unreleased section is empty.
    pub fail_on_empty_release_notes: Option<bool>,
}

/// `[repository]` section.
///
/// Links are only written when both `owner` and `name` are known, either
/// from here or from the `origin` remote.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Owning user or organization.
    pub owner: Option<String>,
    /// Repository name.
    pub name: Option<String>,
    /// Hosting service (default: `github.com`).
    pub host: Option<String>,
}

impl RepositoryConfig {
    /// Coordinates, if both owner and name are set.
    pub fn coordinates(&self) -> Option<RepositoryCoordinates> {
        let (Some(owner), Some(name)) = (&self.owner, &self.name) else {
            return None;
        };
        let coordinates = RepositoryCoordinates::new(owner, name);
        Some(match self.host {
            Some(ref host) => coordinates.with_host(host),
            None => coordinates,
        })
    }
}

impl Config {
    /// Configured changelog path, or `CHANGELOG.md`.
    pub fn changelog_path(&self) -> Utf8PathBuf {
        self.changelog
            .as_ref()
            .and_then(|c| c.path.clone())
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_CHANGELOG))
    }

    /// Configured output path, if it differs from the input.
    pub fn changelog_output(&self) -> Option<&Utf8Path> {
        self.changelog.as_ref()?.output.as_deref()
    }

    /// Configured tag prefix, or `v`.
    pub fn tag_prefix(&self) -> &str {
        self.changelog
            .as_ref()
            .and_then(|c| c.tag_prefix.as_deref())
            .unwrap_or(DEFAULT_TAG_PREFIX)
    }

    /// Whether bumps keep an empty Unreleased section.
    pub fn keep_unreleased_section(&self) -> bool {
        self.changelog
            .as_ref()
            .and_then(|c| c.keep_unreleased_section)
            .unwrap_or(false)
    }

    /// Whether an empty Unreleased section aborts a bump.
    pub fn fail_on_empty_release_notes(&self) -> bool {
        self.changelog
            .as_ref()
            .and_then(|c| c.fail_on_empty_release_notes)
            .unwrap_or(false)
    }

    /// Repository coordinates from the `[repository]` section.
    pub fn repository(&self) -> Option<RepositoryCoordinates> {
        self.repository.as_ref()?.coordinates()
    }
}

/// Log level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose output for debugging and development.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Warnings about potential issues.
    Warn,
    /// Errors that indicate failures.
    Error,
}

impl LogLevel {
    /// Returns the log level as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Supported configuration file extensions (in order of preference).
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Application name for XDG directory lookup and config file names.
const APP_NAME: &str = "keeplog";

/// Builder for loading configuration from multiple sources.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    project_search_root: Option<Utf8PathBuf>,
    include_user_config: bool,
    /// Stop searching at a directory containing this file or directory.
    boundary_marker: Option<String>,
    explicit_files: Vec<Utf8PathBuf>,
}

impl ConfigLoader {
    /// Loader that reads user config and stops project search at `.git`.
    pub fn new() -> Self {
        Self {
            project_search_root: None,
            include_user_config: true,
            boundary_marker: Some(".git".to_string()),
            explicit_files: Vec::new(),
        }
    }

    /// Walk up from `path` looking for a project config file.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.project_search_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set whether to include user config from `~/.config/keeplog/`.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Search all the way to the filesystem root.
    pub fn without_boundary_marker(mut self) -> Self {
        self.boundary_marker = None;
        self
    }

    /// Add a config file to load after all discovered ones.
    /// Later files take precedence.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Merge every source into a [`Config`].
    #[tracing::instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<Config> {
        tracing::debug!("loading configuration");
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if self.include_user_config
            && let Some(user_config) = self.find_user_config()
        {
            figment = Self::merge_file(figment, &user_config);
        }

        if let Some(ref root) = self.project_search_root
            && let Some(project_config) = self.find_project_config(root)
        {
            figment = Self::merge_file(figment, &project_config);
        }

        for file in &self.explicit_files {
            figment = Self::merge_file(figment, file);
        }

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        tracing::info!(
            log_level = config.log_level.as_str(),
            changelog = %config.changelog_path(),
            "configuration loaded"
        );
        Ok(config)
    }

    fn find_project_config(&self, start: &Utf8Path) -> Option<Utf8PathBuf> {
        let mut current = Some(start.to_path_buf());

        while let Some(dir) = current {
            for ext in CONFIG_EXTENSIONS {
                let dotfile = dir.join(format!(".{APP_NAME}.{ext}"));
                if dotfile.is_file() {
                    return Some(dotfile);
                }
                let regular = dir.join(format!("{APP_NAME}.{ext}"));
                if regular.is_file() {
                    return Some(regular);
                }
            }

            // The repository root is the last directory searched.
            if let Some(ref marker) = self.boundary_marker
                && dir.join(marker).exists()
            {
                break;
            }

            current = dir.parent().map(Utf8Path::to_path_buf);
        }

        None
    }

    fn find_user_config(&self) -> Option<Utf8PathBuf> {
        let config_dir = user_config_dir()?;
        CONFIG_EXTENSIONS
            .iter()
            .map(|ext| config_dir.join(format!("config.{ext}")))
            .find(|path| path.is_file())
    }

    /// Merge a config file, picking the format from its extension.
    fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
        match path.extension() {
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
            Some("json") => figment.merge(Json::file_exact(path.as_str())),
            _ => figment.merge(Toml::file_exact(path.as_str())),
        }
    }
}

/// Find the project config file path without loading it.
pub fn find_project_config<P: AsRef<Utf8Path>>(start: P) -> Option<Utf8PathBuf> {
    ConfigLoader::new()
        .with_project_search(start.as_ref())
        .find_project_config(start.as_ref())
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// User config directory (`~/.config/keeplog/` on Linux).
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.config_dir().to_path_buf()).ok()
}

/// Machine-local data directory (`~/.local/share/keeplog/` on Linux).
///
/// Default parent of the log directory.
pub fn user_data_local_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.data_local_dir().to_path_buf()).ok()
}
