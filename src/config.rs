use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    #[serde(default)]
    pub access: AccessConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_path")]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_fee_percent")]
    pub default_fee_percent: f64,
    #[serde(default = "default_pay_percent")]
    pub default_pay_percent: f64,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    #[serde(default = "default_geocoder_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_geocoder_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_cache_path")]
    pub cache_path: String,
    /// 0 means cached coordinates never expire.
    #[serde(default)]
    pub cache_ttl_days: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(default = "default_trial_days")]
    pub trial_days: i64,
    #[serde(default)]
    pub subscribed_accounts: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_path: Option<String>,
    pub geocoder_endpoint: Option<String>,
    pub page_size: Option<usize>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/dispatch-lens/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(data_path) = overrides.data_path {
            self.data.path = data_path;
        }
        if let Some(endpoint) = overrides.geocoder_endpoint {
            self.geocoder.endpoint = endpoint;
        }
        if let Some(page_size) = overrides.page_size {
            self.engine.page_size = page_size;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_data_path(&self) -> PathBuf {
        expand_tilde(&self.data.path)
    }

    pub fn resolved_cache_path(&self) -> PathBuf {
        expand_tilde(&self.geocoder.cache_path)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        match self.geocoder.cache_ttl_days {
            0 => None,
            days => Some(Duration::from_secs(days * 24 * 60 * 60)),
        }
    }

    pub fn default_template() -> String {
        let template = r#"[data]
path = "loads.json"

[engine]
default_fee_percent = 12.0
default_pay_percent = 50.0
page_size = 10

[geocoder]
endpoint = "https://nominatim.openstreetmap.org/search"
user_agent = "dispatch-lens/0.1"
cache_path = "~/.local/share/dispatch-lens/geocache.db"
cache_ttl_days = 0

[access]
trial_days = 30
subscribed_accounts = []
"#;
        template.to_string()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            engine: EngineConfig::default(),
            geocoder: GeocoderConfig::default(),
            access: AccessConfig::default(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: default_data_path(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_fee_percent: default_fee_percent(),
            default_pay_percent: default_pay_percent(),
            page_size: default_page_size(),
        }
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_geocoder_endpoint(),
            user_agent: default_geocoder_user_agent(),
            cache_path: default_cache_path(),
            cache_ttl_days: 0,
        }
    }
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            trial_days: default_trial_days(),
            subscribed_accounts: Vec::new(),
        }
    }
}

fn default_data_path() -> String {
    "loads.json".to_string()
}

fn default_fee_percent() -> f64 {
    crate::model::DEFAULT_FEE_PERCENT
}

fn default_pay_percent() -> f64 {
    crate::model::DEFAULT_PAY_PERCENT
}

fn default_page_size() -> usize {
    10
}

fn default_geocoder_endpoint() -> String {
    "https://nominatim.openstreetmap.org/search".to_string()
}

fn default_geocoder_user_agent() -> String {
    "dispatch-lens/0.1".to_string()
}

fn default_cache_path() -> String {
    "~/.local/share/dispatch-lens/geocache.db".to_string()
}

fn default_trial_days() -> i64 {
    crate::access::TRIAL_PERIOD_DAYS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_back_into_defaults() {
        let parsed: Config = toml::from_str(&Config::default_template()).unwrap();
        assert_eq!(parsed.engine.default_fee_percent, 12.0);
        assert_eq!(parsed.engine.page_size, 10);
        assert_eq!(parsed.access.trial_days, 30);
        assert!(parsed.cache_ttl().is_none());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let parsed: Config = toml::from_str("[engine]\npage_size = 25\n").unwrap();
        assert_eq!(parsed.engine.page_size, 25);
        assert_eq!(parsed.engine.default_fee_percent, 12.0);
        assert_eq!(parsed.geocoder.cache_ttl_days, 0);
    }

    #[test]
    fn overrides_win() {
        let mut config = Config::default();
        config.apply_overrides(ConfigOverrides {
            data_path: Some("fleet.json".to_string()),
            geocoder_endpoint: None,
            page_size: Some(50),
        });
        assert_eq!(config.data.path, "fleet.json");
        assert_eq!(config.engine.page_size, 50);
    }

    #[test]
    fn ttl_days_convert_to_duration() {
        let mut config = Config::default();
        config.geocoder.cache_ttl_days = 7;
        assert_eq!(
            config.cache_ttl(),
            Some(Duration::from_secs(7 * 24 * 60 * 60))
        );
    }
}
