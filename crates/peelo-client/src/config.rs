//! # Client Configuration
//!
//! Configuration management for the storefront client.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     PEELO_API_URL=https://api.peelojuice.com/api                       │
//! │     PEELO_CART_ON_LOGOUT=clear                                         │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/storefront/storefront.toml (Linux)                       │
//! │     ~/Library/Application Support/com.peelo.storefront/ (macOS)        │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     local development API, keep cart on logout, 3s toasts              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # storefront.toml
//! [api]
//! base_url = "https://api.peelojuice.com/api"
//! media_base_url = "https://api.peelojuice.com"
//! request_timeout_secs = 30
//!
//! [session]
//! cart_on_logout = "keep"  # keep | clear
//!
//! [toast]
//! duration_ms = 3000
//!
//! [catalog]
//! featured_limit = 12
//! placeholder_image = "/carrot-juice.png"
//!
//! [currency]
//! symbol = "₹"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use peelo_core::Money;

use crate::error::{ConfigError, ConfigResult};

/// File name of the client config inside the platform config dir.
pub const CONFIG_FILE_NAME: &str = "storefront.toml";

// =============================================================================
// Cart Logout Policy
// =============================================================================

/// What happens to the cart when the session ends.
///
/// Applies to explicit logout and to forced logout after a 401 alike.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CartLogoutPolicy {
    /// Guest cart survives logout.
    #[default]
    Keep,
    /// Cart is emptied when the user logs out.
    Clear,
}

impl std::fmt::Display for CartLogoutPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CartLogoutPolicy::Keep => write!(f, "keep"),
            CartLogoutPolicy::Clear => write!(f, "clear"),
        }
    }
}

impl std::str::FromStr for CartLogoutPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keep" => Ok(CartLogoutPolicy::Keep),
            "clear" => Ok(CartLogoutPolicy::Clear),
            _ => Err(format!("Invalid cart logout policy: {}", s)),
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

/// REST endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Prefix for every request path, e.g. `https://host/api`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Host relative image paths are resolved against.
    #[serde(default = "default_media_base_url")]
    pub media_base_url: String,

    /// Per-request timeout. `None` leaves the transport default in place.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_media_base_url() -> String {
    "http://localhost:8000".to_string()
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            media_base_url: default_media_base_url(),
            request_timeout_secs: None,
        }
    }
}

impl ApiSettings {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default)]
    pub cart_on_logout: CartLogoutPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToastSettings {
    /// How long a toast stays visible.
    #[serde(default = "default_toast_ms")]
    pub duration_ms: u64,
}

fn default_toast_ms() -> u64 {
    3000
}

impl Default for ToastSettings {
    fn default() -> Self {
        Self {
            duration_ms: default_toast_ms(),
        }
    }
}

impl ToastSettings {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Where persisted session, branch and cart state lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Overrides the platform data directory.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSettings {
    /// Products shown on the home page.
    #[serde(default = "default_featured_limit")]
    pub featured_limit: usize,

    /// Shown for products without an image.
    #[serde(default = "default_placeholder")]
    pub placeholder_image: String,
}

fn default_featured_limit() -> usize {
    12
}

fn default_placeholder() -> String {
    "/carrot-juice.png".to_string()
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            featured_limit: default_featured_limit(),
            placeholder_image: default_placeholder(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencySettings {
    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Decimal places shown by [`CurrencySettings::format`] (0-2).
    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

fn default_symbol() -> String {
    "₹".to_string()
}

fn default_decimals() -> u8 {
    2
}

impl Default for CurrencySettings {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            decimals: default_decimals(),
        }
    }
}

impl CurrencySettings {
    /// Formats an amount with the configured symbol and precision.
    pub fn format(&self, amount: Money) -> String {
        self.format_with(amount, self.decimals)
    }

    /// Formats with an explicit precision; halves round away from zero.
    ///
    /// ## Example
    /// ```rust
    /// use peelo_client::config::CurrencySettings;
    /// use peelo_core::Money;
    ///
    /// let currency = CurrencySettings::default();
    /// assert_eq!(currency.format(Money::from_paise(12050)), "₹120.50");
    /// assert_eq!(currency.format_with(Money::from_paise(12050), 0), "₹121");
    /// ```
    pub fn format_with(&self, amount: Money, decimals: u8) -> String {
        let decimals = decimals.min(2);
        let paise = amount.paise();
        let step = 10_i64.pow(2 - decimals as u32);
        let units = (paise.abs() + step / 2) / step;
        let divisor = 10_i64.pow(decimals as u32);
        let whole = units / divisor;
        let frac = units % divisor;

        format!(
            "{}{}{}",
            if paise < 0 && units != 0 { "-" } else { "" },
            self.symbol,
            if decimals > 0 {
                format!("{}.{:0width$}", whole, frac, width = decimals as usize)
            } else {
                whole.to_string()
            }
        )
    }
}

// =============================================================================
// Client Config
// =============================================================================

/// Complete client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub toast: ToastSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub catalog: CatalogSettings,

    #[serde(default)]
    pub currency: CurrencySettings,
}

impl ClientConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (storefront.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading client config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load client config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::SaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::SaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        info!(?path, "Client config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        for (name, value) in [
            ("api.base_url", &self.api.base_url),
            ("api.media_base_url", &self.api.media_base_url),
        ] {
            let parsed = url::Url::parse(value)?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(ConfigError::Invalid(format!(
                    "{} must start with http:// or https://, got: {}",
                    name, value
                )));
            }
        }

        if self.toast.duration_ms == 0 {
            return Err(ConfigError::Invalid(
                "toast.duration_ms must be greater than 0".into(),
            ));
        }

        if self.catalog.featured_limit == 0 {
            return Err(ConfigError::Invalid(
                "catalog.featured_limit must be greater than 0".into(),
            ));
        }

        if self.currency.decimals > 2 {
            return Err(ConfigError::Invalid(
                "currency.decimals must be between 0 and 2".into(),
            ));
        }

        Ok(())
    }

    /// Applies `PEELO_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("PEELO_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.api.base_url = url;
        }

        if let Some(url) = lookup("PEELO_MEDIA_URL") {
            self.api.media_base_url = url;
        }

        if let Some(secs) = lookup("PEELO_REQUEST_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.api.request_timeout_secs = Some(s),
                Err(_) => warn!(value = %secs, "Ignoring invalid request timeout in environment"),
            }
        }

        if let Some(policy) = lookup("PEELO_CART_ON_LOGOUT") {
            match policy.parse() {
                Ok(parsed) => {
                    debug!(policy = %policy, "Overriding cart logout policy from environment");
                    self.session.cart_on_logout = parsed;
                }
                Err(e) => warn!("{}", e),
            }
        }

        if let Some(ms) = lookup("PEELO_TOAST_MS") {
            if let Ok(ms) = ms.parse::<u64>() {
                self.toast.duration_ms = ms;
            }
        }

        if let Some(dir) = lookup("PEELO_STORAGE_DIR") {
            self.storage.dir = Some(PathBuf::from(dir));
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Directory persisted state is written to.
    pub fn storage_dir(&self) -> Option<PathBuf> {
        self.storage
            .dir
            .clone()
            .or_else(|| project_dirs().map(|dirs| dirs.data_dir().to_path_buf()))
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "peelo", "storefront")
}
