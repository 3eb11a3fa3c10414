//! Tracing/logging configuration for skill402
//!
//! Supports:
//! - Verbosity levels: default (WARN), verbose (INFO), debug (DEBUG), quiet (ERROR), silent (off)
//! - Pretty (colored), JSON or compact output on stderr
//! - An optional log file written at DEBUG level regardless of the terminal level

use std::path::PathBuf;
use std::sync::OnceLock;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Target used in every env-filter directive
const CRATE_TARGET: &str = "skill402";

/// Log output format
#[derive(Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Colored human-readable output
    #[default]
    Pretty,
    /// Structured JSON output (one JSON object per line)
    Json,
    /// Compact single-line format
    Compact,
}

/// Tracing configuration built from the merged GlobalConfig
#[derive(Debug, Default)]
pub struct TracingConfig {
    pub verbose: bool,
    pub debug: bool,
    pub quiet: bool,
    pub silent: bool,
    pub format: LogFormat,
    /// Optional log file path (writes DEBUG+ regardless of terminal level)
    pub log_file: Option<PathBuf>,
}

impl TracingConfig {
    /// Terminal level, `None` when silent
    fn terminal_level(&self) -> Option<Level> {
        if self.silent {
            None
        } else if self.quiet {
            Some(Level::ERROR)
        } else if self.debug {
            Some(Level::DEBUG)
        } else if self.verbose {
            Some(Level::INFO)
        } else {
            Some(Level::WARN)
        }
    }

    /// Whether any verbosity flag was given explicitly
    fn level_pinned(&self) -> bool {
        self.verbose || self.debug || self.quiet || self.silent
    }
}

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

fn directive(level: Level) -> String {
    format!("{}={},warn", CRATE_TARGET, level.as_str().to_lowercase())
}

/// Explicit flags win over RUST_LOG; RUST_LOG wins over the default level
fn terminal_filter(level: Level, pinned: bool) -> EnvFilter {
    if pinned {
        EnvFilter::new(directive(level))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive(level)))
    }
}

fn terminal_layer(format: &LogFormat, filter: EnvFilter) -> BoxedLayer {
    match format {
        LogFormat::Pretty => fmt::layer()
            .with_ansi(true)
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed(),
    }
}

fn file_layer(path: &PathBuf) -> Option<BoxedLayer> {
    let file = match std::fs::File::create(path) {
        Ok(f) => f,
        Err(e) => {
            // No subscriber exists yet, so stderr is the only channel
            eprintln!("Warning: Failed to create log file {:?}: {}", path, e);
            return None;
        }
    };

    Some(
        fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(file)
            .with_filter(EnvFilter::new(directive(Level::DEBUG)))
            .boxed(),
    )
}

/// Initialize tracing with the given configuration.
///
/// Called once from main() after configuration is merged. Later calls are ignored.
pub fn init_tracing(config: TracingConfig) {
    if TRACING_INITIALIZED.get().is_some() {
        return;
    }

    let mut layers: Vec<BoxedLayer> = Vec::new();

    if let Some(path) = &config.log_file {
        layers.extend(file_layer(path));
    }

    if let Some(level) = config.terminal_level() {
        let filter = terminal_filter(level, config.level_pinned());
        layers.push(terminal_layer(&config.format, filter));
    }

    if layers.is_empty() {
        let _ = tracing::subscriber::set_global_default(tracing_subscriber::registry());
    } else {
        let _ = tracing_subscriber::registry().with(layers).try_init();
    }

    let _ = TRACING_INITIALIZED.set(());
}
