//! Logging bootstrap.
//!
//! The logging subsystem loads its own configuration through a
//! [`ConfigRegistry`], which creates an ordering problem: the registry wants
//! to log while loading the very file that configures logging. [`init`]
//! therefore installs a bootstrap subscriber (plain fmt layer, `debug`
//! filter) up front, and [`configure`] later swaps the active filter to the
//! loaded configuration. After a fixed number of consecutive load failures
//! the bootstrap setup is made permanent instead of retrying forever.
//!
//! The `tracing` subscriber is installed at most once per process;
//! reconfiguration after that point swaps the [`EnvFilter`] through a reload
//! handle, while the output format is fixed at install time.

use crate::core::{ConfigRegistry, LoadOptions};
use crate::error::{ConfigError, Result};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing_subscriber::Registry;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::reload;
use tracing_subscriber::util::SubscriberInitExt;

/// Default logging config filename.
pub const DEFAULT_CONFIG_NAME: &str = "logging.json";

/// Default directory the logging config is loaded from.
pub const DEFAULT_CONFIG_DIR: &str = "./config";

/// Consecutive load failures tolerated before the bootstrap setup is made
/// permanent.
const MAX_CONFIG_ATTEMPTS: u32 = 3;

const BOOTSTRAP_DIRECTIVES: &str = "debug";

type BootstrapStack =
    tracing_subscriber::layer::Layered<reload::Layer<EnvFilter, Registry>, Registry>;
type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Shape of `logging.json`.
///
/// ```json
/// {
///     "level": "info",
///     "targets": {"layerconf::watch": "trace"},
///     "format": "compact"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Root level directive (`trace`..`error`).
    pub level: String,
    /// Per-target level overrides.
    pub targets: BTreeMap<String, String>,
    /// Output format, applied when the subscriber is first installed.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            targets: BTreeMap::new(),
            format: LogFormat::Full,
        }
    }
}

impl LoggingConfig {
    /// Combined `EnvFilter` directives: root level plus target overrides.
    pub fn directives(&self) -> String {
        let mut parts = vec![self.level.clone()];
        for (target, level) in &self.targets {
            parts.push(format!("{target}={level}"));
        }
        parts.join(",")
    }
}

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// The default single-line format.
    Full,
    /// Abbreviated single-line format.
    Compact,
    /// Multi-line human-oriented format.
    Pretty,
}

struct LoggerBootstrap {
    config_name: Option<PathBuf>,
    config_dir: Option<PathBuf>,
    failures: u32,
    configured: bool,
    filter_handle: Option<FilterHandle>,
}

impl LoggerBootstrap {
    /// Install the global subscriber once; later calls are no-ops.
    fn install(&mut self, config: &LoggingConfig) {
        if self.filter_handle.is_some() {
            return;
        }
        let filter = EnvFilter::try_new(config.directives())
            .unwrap_or_else(|_| EnvFilter::new(BOOTSTRAP_DIRECTIVES));
        let (filter_layer, handle) = reload::Layer::new(filter);
        let fmt_layer: Box<dyn Layer<BootstrapStack> + Send + Sync> = match config.format {
            LogFormat::Full => tracing_subscriber::fmt::layer().boxed(),
            LogFormat::Compact => tracing_subscriber::fmt::layer().compact().boxed(),
            LogFormat::Pretty => tracing_subscriber::fmt::layer().pretty().boxed(),
        };
        // try_init fails when the host process already installed a
        // subscriber; filter swaps become no-ops then.
        if tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .try_init()
            .is_ok()
        {
            self.filter_handle = Some(handle);
        }
    }

    fn swap_filter(&self, directives: &str) {
        let Some(handle) = &self.filter_handle else {
            return;
        };
        match EnvFilter::try_new(directives) {
            Ok(filter) => {
                if let Err(err) = handle.reload(filter) {
                    tracing::error!(error = %err, "failed to swap logging filter");
                }
            }
            Err(err) => {
                tracing::error!(error = %err, directives, "invalid logging directives");
            }
        }
    }
}

static LOGGER: Mutex<LoggerBootstrap> = Mutex::new(LoggerBootstrap {
    config_name: None,
    config_dir: None,
    failures: 0,
    configured: false,
    filter_handle: None,
});

/// Install the bootstrap subscriber so logging works before any
/// configuration is loaded. Idempotent.
pub fn init() {
    let mut logger = LOGGER.lock();
    let bootstrap = LoggingConfig {
        level: BOOTSTRAP_DIRECTIVES.to_string(),
        ..LoggingConfig::default()
    };
    logger.install(&bootstrap);
}

/// Load the logging configuration through `registry` and apply it.
///
/// Does nothing once configured. Each failed attempt keeps the bootstrap
/// setup active and is counted; after [`MAX_CONFIG_ATTEMPTS`] consecutive
/// failures the minimal hardcoded setup becomes permanent rather than
/// failing silent or crashing the host process.
pub fn configure(registry: &ConfigRegistry) {
    let mut logger = LOGGER.lock();
    if logger.configured {
        return;
    }
    let dir = logger
        .config_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR));
    let name = logger
        .config_name
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_NAME));

    match load_config(registry, dir, name) {
        Ok(config) => {
            logger.install(&config);
            logger.swap_filter(&config.directives());
            logger.failures = 0;
            logger.configured = true;
            tracing::info!("logging configured from file");
        }
        Err(err) => {
            logger.failures += 1;
            // Bootstrap handlers stay active while we retry.
            logger.install(&LoggingConfig {
                level: BOOTSTRAP_DIRECTIVES.to_string(),
                ..LoggingConfig::default()
            });
            tracing::error!(
                error = %err,
                attempt = logger.failures,
                "failed to load logging configuration"
            );
            if logger.failures >= MAX_CONFIG_ATTEMPTS {
                logger.swap_filter("info");
                logger.configured = true;
                tracing::warn!("falling back to minimal logging setup");
            }
        }
    }
}

/// Override the logging config file location and reset the configured
/// state so the next [`configure`] call reloads.
pub fn set_config_file(name: impl Into<PathBuf>, dir: impl Into<PathBuf>) {
    let mut logger = LOGGER.lock();
    logger.config_name = Some(name.into());
    logger.config_dir = Some(dir.into());
    logger.configured = false;
    logger.failures = 0;
}

/// Whether logging has been configured, successfully or via fallback.
pub fn is_configured() -> bool {
    LOGGER.lock().configured
}

fn load_config(registry: &ConfigRegistry, dir: PathBuf, name: PathBuf) -> Result<LoggingConfig> {
    // merge_into(false) so a later set_config_file actually repoints the
    // existing `logging` configuration at the new file.
    let document = registry.load(
        dir,
        name,
        LoadOptions::default().alias("logging").merge_into(false),
    )?;
    serde_json::from_value((*document).clone())
        .map_err(|err| ConfigError::Other(format!("invalid logging configuration: {err}")))
}
