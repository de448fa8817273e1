//! Configuration for the cache lifecycle and the capability adapter.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default cache generation identifier.
pub const DEFAULT_GENERATION: &str = "hustleos-v2.2.0";

/// Settings deep link used to request battery optimization exemption on Android.
pub const DEFAULT_BATTERY_SETTINGS_URL: &str =
    "android-settings:REQUEST_IGNORE_BATTERY_OPTIMIZATIONS";

/// Configuration for the service worker cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Name of the cache bucket for the deployed version.
    pub generation: String,
    /// Origin the worker is scoped to; relative URLs resolve against it.
    pub origin: String,
    /// URLs fetched and stored at install time, in order.
    pub precache: Vec<String>,
    /// Number of concurrent fetches during install.
    pub install_concurrency: usize,
    /// Directory holding on-disk cache buckets.
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            generation: DEFAULT_GENERATION.to_string(),
            origin: "http://localhost:8080/".to_string(),
            precache: [
                "./",
                "./index.html",
                "./manifest.json",
                "./favicon-16x16.png",
                "./favicon-32x32.png",
                "./android-icon-192x192.png",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            install_concurrency: 4,
            dir: None,
        }
    }
}

impl CacheConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cache generation identifier.
    #[must_use]
    pub fn with_generation(mut self, generation: impl Into<String>) -> Self {
        self.generation = generation.into();
        self
    }

    /// Sets the origin the worker serves.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Replaces the precache list.
    #[must_use]
    pub fn with_precache<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.precache = urls.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the number of concurrent install fetches.
    #[must_use]
    pub fn with_install_concurrency(mut self, concurrent: usize) -> Self {
        self.install_concurrency = concurrent;
        self
    }

    /// Sets the on-disk cache directory.
    #[must_use]
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Directory used for on-disk buckets, falling back to the user cache dir.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("hustle")
        })
    }
}

/// Configuration for the platform capability adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Application name shown in notifications and instructions.
    pub app_name: String,
    /// Icon attached to web notifications.
    pub icon: String,
    /// How long the permission confirmation notification stays up.
    pub confirmation_dismiss_ms: u64,
    /// Delay before the native permission confirmation fires.
    pub confirmation_delay_ms: u64,
    /// Delay before a native alarm notification fires.
    pub alarm_delay_ms: u64,
    /// Deep link to the battery optimization settings screen.
    pub battery_settings_url: String,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            app_name: "HustleOS".to_string(),
            icon: "./favicon-32x32.png".to_string(),
            confirmation_dismiss_ms: 3000,
            confirmation_delay_ms: 1000,
            alarm_delay_ms: 50,
            battery_settings_url: DEFAULT_BATTERY_SETTINGS_URL.to_string(),
        }
    }
}

impl AdapterConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application name.
    #[must_use]
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Sets how long the confirmation notification stays visible.
    #[must_use]
    pub fn with_confirmation_dismiss(mut self, delay: Duration) -> Self {
        self.confirmation_dismiss_ms = duration_ms(delay);
        self
    }

    /// Sets the native alarm delay.
    #[must_use]
    pub fn with_alarm_delay(mut self, delay: Duration) -> Self {
        self.alarm_delay_ms = duration_ms(delay);
        self
    }

    /// Confirmation notification lifetime as a `Duration`.
    #[must_use]
    pub const fn confirmation_dismiss(&self) -> Duration {
        Duration::from_millis(self.confirmation_dismiss_ms)
    }

    /// Native confirmation delay as a `Duration`.
    #[must_use]
    pub const fn confirmation_delay(&self) -> Duration {
        Duration::from_millis(self.confirmation_delay_ms)
    }

    /// Native alarm delay as a `Duration`.
    #[must_use]
    pub const fn alarm_delay(&self) -> Duration {
        Duration::from_millis(self.alarm_delay_ms)
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn duration_ms(delay: Duration) -> u64 {
    delay.as_millis() as u64
}

/// Complete application configuration combining cache and adapter settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Service worker cache configuration.
    pub cache: CacheConfig,
    /// Capability adapter configuration.
    pub adapter: AdapterConfig,
}

impl AppConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default location of the config file.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hustle")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Loads configuration from `path`, using defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let config = Self::load(path)?;
            log::info!("Loaded config from {}", path.display());
            Ok(config)
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Saves the configuration atomically (write tmp + rename).
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file cannot be written.
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string(self)?;
        let tmp_path = path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, toml_str)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}
