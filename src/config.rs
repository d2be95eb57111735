use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use log::{LevelFilter, debug, info, warn};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, WatchdogError};

pub const DEFAULT_WATCHDOG_INTERVAL_SECS: f64 = 1.0;
pub const DEFAULT_DISK_INTERVAL_SECS: f64 = 60.0;
pub const DEFAULT_USAGE_THRESHOLD: f64 = 90.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub watchdog: WatchdogConfig,
    pub disk: DiskConfig,
    pub logging: LoggingConfig,
}

/// One `watchdog.programs` entry as written in the file.
///
/// Only `Command` is launchable; a pre-split token list is a configuration error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgramEntry {
    Command(String),
    Tokens(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    pub interval: f64,
    pub process_prefix: String,
    #[serde(deserialize_with = "program_list")]
    pub programs: Vec<ProgramEntry>,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_WATCHDOG_INTERVAL_SECS,
            process_prefix: String::new(),
            programs: Vec::new(),
        }
    }
}

impl WatchdogConfig {
    pub fn poll_interval(&self) -> Duration {
        seconds_or_default("watchdog.interval", self.interval, DEFAULT_WATCHDOG_INTERVAL_SECS)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskConfig {
    pub interval: f64,
    #[serde(deserialize_with = "path_list")]
    pub partitions: Vec<PathBuf>,
    pub usage_threshold: f64,
    #[serde(deserialize_with = "path_list")]
    pub delete_file_paths: Vec<PathBuf>,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_DISK_INTERVAL_SECS,
            partitions: Vec::new(),
            usage_threshold: DEFAULT_USAGE_THRESHOLD,
            delete_file_paths: Vec::new(),
        }
    }
}

impl DiskConfig {
    pub fn poll_interval(&self) -> Duration {
        seconds_or_default("disk.interval", self.interval, DEFAULT_DISK_INTERVAL_SECS)
    }

    /// Usage threshold as a percentage in [0, 100].
    pub fn threshold(&self) -> f64 {
        if self.usage_threshold.is_nan() {
            warn!("disk.usage_threshold is not a number, using {}", DEFAULT_USAGE_THRESHOLD);
            return DEFAULT_USAGE_THRESHOLD;
        }
        self.usage_threshold.clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub console_log: bool,
    pub backup: usize,
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_log: true,
            backup: 5,
            directory: None,
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => LevelFilter::Debug,
            "WARN" | "WARNING" => LevelFilter::Warn,
            "ERROR" | "CRITICAL" => LevelFilter::Error,
            _ => LevelFilter::Info,
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(env!("CARGO_PKG_NAME"))
                .join("logs")
        })
    }
}

/// Supplies each component with its slice of the configuration, freshly read.
pub trait SettingsSource: Send + Sync {
    fn watchdog(&self) -> WatchdogConfig;
    fn disk(&self) -> DiskConfig;
}

impl SettingsSource for Config {
    fn watchdog(&self) -> WatchdogConfig {
        self.watchdog.clone()
    }

    fn disk(&self) -> DiskConfig {
        self.disk.clone()
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_path(config_path)?;
        let config = Self::load_from_file(&path)?;
        info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    /// Find the config file: explicit path, then ~/.config/<project>/<project>.yml, then ./<project>.yml
    pub fn resolve_path(config_path: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = config_path {
            if path.is_file() {
                return Ok(path.to_path_buf());
            }
            return Err(WatchdogError::Config(format!("{} isn't a file", path.display())));
        }

        let project_name = env!("CARGO_PKG_NAME");
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.is_file() {
                return Ok(primary_config);
            }
        }

        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.is_file() {
            return Ok(fallback_config);
        }

        Err(WatchdogError::Config(format!(
            "no config file given and neither ~/.config/{0}/{0}.yml nor ./{0}.yml exists",
            project_name
        )))
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| WatchdogError::Config(format!("cannot read {}: {}", path.display(), e)))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_yaml::from_str(&content)?;
        debug!("Read config from: {}", path.display());
        Ok(config)
    }
}

/// A config file re-read on every access.
///
/// Keeps the last configuration that parsed so a half-written edit does not
/// blank out the program or partition lists.
#[derive(Debug)]
pub struct ConfigFile {
    path: PathBuf,
    last_good: Mutex<Config>,
}

impl ConfigFile {
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let config = Config::load_from_file(&path)?;
        Ok(Self {
            path,
            last_good: Mutex::new(config),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file, falling back to the last good config if it cannot be used.
    pub fn current(&self) -> Config {
        match self.reload() {
            Ok(config) => {
                *self.last_good.lock().unwrap_or_else(PoisonError::into_inner) = config.clone();
                config
            }
            Err(e) => {
                warn!("Reload of {} failed, keeping previous config: {}", self.path.display(), e);
                self.last_good.lock().unwrap_or_else(PoisonError::into_inner).clone()
            }
        }
    }

    /// An empty file while running means an editor is mid-save, not "watch nothing".
    fn reload(&self) -> Result<Config> {
        let content = fs::read_to_string(&self.path)
            .map_err(|e| WatchdogError::Config(format!("cannot read {}: {}", self.path.display(), e)))?;
        if content.trim().is_empty() {
            return Err(WatchdogError::Config(format!("{} is empty", self.path.display())));
        }
        Ok(serde_yaml::from_str(&content)?)
    }
}

impl SettingsSource for ConfigFile {
    fn watchdog(&self) -> WatchdogConfig {
        self.current().watchdog
    }

    fn disk(&self) -> DiskConfig {
        self.current().disk
    }
}

fn seconds_or_default(key: &str, value: f64, default: f64) -> Duration {
    match Duration::try_from_secs_f64(value) {
        Ok(interval) if !interval.is_zero() => interval,
        _ => {
            warn!("{} = {} is not a positive number of seconds, using {}", key, value, default);
            Duration::from_secs_f64(default)
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CommaList<T> {
    Joined(String),
    Items(Vec<T>),
}

fn split_commas(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

fn program_list<'de, D>(deserializer: D) -> std::result::Result<Vec<ProgramEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<CommaList<ProgramEntry>>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(CommaList::Joined(joined)) => split_commas(&joined).into_iter().map(ProgramEntry::Command).collect(),
        Some(CommaList::Items(items)) => items,
    })
}

fn path_list<'de, D>(deserializer: D) -> std::result::Result<Vec<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<CommaList<PathBuf>>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(CommaList::Joined(joined)) => split_commas(&joined).into_iter().map(PathBuf::from).collect(),
        Some(CommaList::Items(items)) => items,
    })
}
