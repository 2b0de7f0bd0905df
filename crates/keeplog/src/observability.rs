//! Structured JSON-lines logging.
//!
//! Log entries never go to stdout: `keeplog query` prints release notes
//! there and scripts capture them. Entries are written to a daily rolling
//! file, or to stderr if no log location is writable.

use std::fs::OpenOptions;
use std::io::Write;

use anyhow::{Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::Event;
use tracing::field::{Field, Visit};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use keeplog_core::config::{self, Config};

const ENV_LOG_PATH: &str = "KEEPLOG_LOG_PATH";
const ENV_LOG_DIR: &str = "KEEPLOG_LOG_DIR";
const SYSTEM_LOG_DIR: &str = "/var/log";
const LOG_FILE_SUFFIX: &str = ".jsonl";

/// Where and as whom log entries are written.
#[derive(Clone, Debug)]
pub struct LogSettings {
    /// Value of the `service` field and stem of the log file name.
    pub service: String,
    /// `log_dir` from configuration, used when no environment override is set.
    pub log_dir: Option<Utf8PathBuf>,
}

impl LogSettings {
    /// Settings for this binary under `config`.
    pub fn from_config(config: &Config) -> Self {
        Self {
            service: env!("CARGO_PKG_NAME").to_string(),
            log_dir: config.log_dir.clone(),
        }
    }

    fn file_name(&self) -> String {
        format!("{}{LOG_FILE_SUFFIX}", self.service)
    }
}

/// A writable log file location.
#[derive(Clone, Debug, PartialEq, Eq)]
struct LogFile {
    dir: Utf8PathBuf,
    file_name: String,
}

/// Keeps the background log writer alive; drop it last.
pub struct LogGuard {
    _worker: WorkerGuard,
}

/// Install the global subscriber.
///
/// An unwritable log location is not an error: entries go to stderr
/// instead, after a one-line notice.
pub fn init(settings: &LogSettings, filter: EnvFilter) -> Result<LogGuard> {
    let (writer, worker) = match file_writer(settings) {
        Ok(pair) => pair,
        Err(err) => {
            eprintln!("Warning: {err}. Falling back to stderr logging.");
            tracing_appender::non_blocking(std::io::stderr())
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(JsonLines {
            service: settings.service.clone(),
            writer,
        })
        .try_init()
        .map_err(|err| anyhow!("failed to install log subscriber: {err}"))?;

    tracing::debug!(service = %settings.service, "logging initialized");
    Ok(LogGuard { _worker: worker })
}

/// Log filter for the given flags.
///
/// `--quiet` wins over `-v`, which wins over `RUST_LOG`, which wins over
/// the configured level.
pub fn env_filter(quiet: bool, verbose: u8, configured: &str) -> EnvFilter {
    match (quiet, verbose) {
        (true, _) => EnvFilter::new("error"),
        (false, 0) => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured))
        }
        (false, 1) => EnvFilter::new("debug"),
        (false, _) => EnvFilter::new("trace"),
    }
}

// ============================================================================
// JSON Lines Layer
// ============================================================================

#[derive(Serialize)]
struct LogRecord<'a> {
    timestamp: String,
    service: &'a str,
    level: String,
    target: &'a str,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

struct JsonLines<W> {
    service: String,
    writer: W,
}

/// Fields recorded on a span, inherited by every event inside it.
#[derive(Clone, Debug, Default)]
struct SpanFields(Map<String, Value>);

impl<S, W> tracing_subscriber::Layer<S> for JsonLines<W>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: LayerContext<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = FieldMap::default();
        attrs.record(&mut fields);
        span.extensions_mut().insert(SpanFields(fields.0));
    }

    fn on_record(
        &self,
        id: &tracing::span::Id,
        values: &tracing::span::Record<'_>,
        ctx: LayerContext<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = FieldMap::default();
        values.record(&mut fields);
        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<SpanFields>() {
            Some(existing) => existing.0.extend(fields.0),
            None => extensions.insert(SpanFields(fields.0)),
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: LayerContext<'_, S>) {
        let metadata = event.metadata();

        // Outer spans first so inner fields and the event's own win.
        let mut fields = Map::new();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(inherited) = span.extensions().get::<SpanFields>() {
                    fields.extend(inherited.0.clone());
                }
            }
        }
        let mut own = FieldMap::default();
        event.record(&mut own);
        fields.extend(own.0);

        let record = LogRecord {
            timestamp: timestamp(),
            service: &self.service,
            level: metadata.level().as_str().to_ascii_lowercase(),
            target: metadata.target(),
            fields,
        };
        let mut writer = self.writer.make_writer();
        if serde_json::to_writer(&mut writer, &record).is_ok() {
            let _ = writer.write_all(b"\n");
        }
    }
}

#[derive(Default)]
struct FieldMap(Map<String, Value>);

impl FieldMap {
    fn put(&mut self, field: &Field, value: impl Into<Value>) {
        self.0.insert(field.name().to_string(), value.into());
    }
}

impl Visit for FieldMap {
    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value);
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value);
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value);
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        // NaN and infinities have no JSON form.
        if let Some(number) = serde_json::Number::from_f64(value) {
            self.put(field, number);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value);
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, format!("{value:?}"));
    }
}

/// Current UTC time as RFC 3339 with millisecond precision.
fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// ============================================================================
// Log File Location
// ============================================================================

fn file_writer(settings: &LogSettings) -> Result<(NonBlocking, WorkerGuard)> {
    let log_file = locate(
        settings,
        env_path(ENV_LOG_PATH).as_deref(),
        env_path(ENV_LOG_DIR).as_deref(),
    )?;
    let appender = tracing_appender::rolling::daily(&log_file.dir, &log_file.file_name);
    Ok(tracing_appender::non_blocking(appender))
}

fn env_path(name: &str) -> Option<Utf8PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.is_empty())
        .map(Utf8PathBuf::from)
}

/// Pick the log file.
///
/// An explicit file path, then an explicit directory, then the configured
/// directory are used as given and must be writable. Without any of them
/// the first writable default wins: the system log directory, the user's
/// data directory, then the working directory.
fn locate(
    settings: &LogSettings,
    file_override: Option<&Utf8Path>,
    dir_override: Option<&Utf8Path>,
) -> Result<LogFile> {
    if let Some(path) = file_override {
        let file_name = path
            .file_name()
            .ok_or_else(|| anyhow!("{ENV_LOG_PATH} must include a file name"))?;
        let dir = path.parent().unwrap_or_else(|| Utf8Path::new("."));
        return writable(dir, file_name);
    }

    let file_name = settings.file_name();
    if let Some(dir) = dir_override.or(settings.log_dir.as_deref()) {
        return writable(dir, &file_name);
    }

    let mut defaults: Vec<Utf8PathBuf> = Vec::new();
    if cfg!(unix) {
        defaults.push(Utf8PathBuf::from(SYSTEM_LOG_DIR));
    }
    if let Some(dir) = config::user_data_local_dir() {
        defaults.push(dir.join("logs"));
    }
    if let Ok(cwd) = std::env::current_dir()
        && let Ok(cwd) = Utf8PathBuf::from_path_buf(cwd)
    {
        defaults.push(cwd);
    }

    defaults
        .iter()
        .find_map(|dir| writable(dir, &file_name).ok())
        .ok_or_else(|| anyhow!("no writable log directory found"))
}

fn writable(dir: &Utf8Path, file_name: &str) -> Result<LogFile> {
    std::fs::create_dir_all(dir).map_err(|e| anyhow!("cannot create log directory {dir}: {e}"))?;
    let path = dir.join(file_name);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| anyhow!("cannot open log file {path}: {e}"))?;
    Ok(LogFile {
        dir: dir.to_path_buf(),
        file_name: file_name.to_string(),
    })
}
