//! Configuration for the monitor and the threshold batch job.
//!
//! Values come from an optional TOML file layered under `RATE_ALERT_*`
//! environment variables; nested keys use `__` (e.g.
//! `RATE_ALERT_TELEGRAM__CHAT_ID`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::calculator::validate_percentile;
use crate::error::AlertError;
use crate::monitor::MonitorSettings;
use crate::store::DEFAULT_THRESHOLDS_PATH;
use crate::types::{CurrencyPair, Rule, RuleSet};

pub const DEFAULT_CONFIG_FILE: &str = "rate-alert.toml";
const ENV_PREFIX: &str = "RATE_ALERT";

/// One static alert band as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// "BASE/QUOTE"
    pub pair: String,
    pub min: f64,
    pub max: f64,
}

/// Telegram sink credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_key: String,
    pub chat_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Timeout for live-rate requests
    pub api_timeout_secs: u64,
    /// Timeout for the bulk historical request
    pub historical_timeout_secs: u64,
    /// Sleep between poll cycles
    pub poll_interval_secs: u64,
    /// Lower percentile p; the band is [p, 100 - p]
    pub percentile: u32,
    pub lookback_days: u32,
    /// Calendar day on which stored thresholds may go stale
    pub update_day_of_month: u32,
    /// Spacing of follow-up "thresholds outdated" reminders
    pub reminder_interval_days: u32,
    pub thresholds_path: PathBuf,
    /// Pairs recomputed by the batch job
    pub pairs: Vec<String>,
    /// Static fallback bands; empty means the built-in defaults
    pub rules: Vec<RuleConfig>,
    /// Enables the secondary live provider when set
    pub exchangerate_api_key: Option<String>,
    /// Re-read the threshold store when it changes on disk
    pub reload_thresholds: bool,
    pub desktop_notifications: bool,
    pub telegram: Option<TelegramConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_timeout_secs: 10,
            historical_timeout_secs: 30,
            poll_interval_secs: 3600,
            percentile: 10,
            lookback_days: 365,
            update_day_of_month: 1,
            reminder_interval_days: 7,
            thresholds_path: PathBuf::from(DEFAULT_THRESHOLDS_PATH),
            pairs: ["AUD/CNY", "CHF/AUD", "USD/AUD", "AUD/HKD", "HKD/JPY"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            rules: Vec::new(),
            exchangerate_api_key: None,
            reload_thresholds: false,
            desktop_notifications: true,
            telegram: None,
        }
    }
}

impl AppConfig {
    /// Loads configuration from `path` (required when given, otherwise the
    /// optional default file) and the environment, then validates it.
    pub fn load(path: Option<&Path>) -> Result<Self, AlertError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let config = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let app: AppConfig = config.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<(), AlertError> {
        validate_percentile(self.percentile)?;
        if !(1..=31).contains(&self.update_day_of_month) {
            return Err(AlertError::InvalidDayOfMonth(self.update_day_of_month));
        }
        let intervals = [
            ("poll_interval_secs", self.poll_interval_secs),
            ("reminder_interval_days", u64::from(self.reminder_interval_days)),
            ("api_timeout_secs", self.api_timeout_secs),
            ("historical_timeout_secs", self.historical_timeout_secs),
        ];
        if let Some(&(key, _)) = intervals.iter().find(|(_, value)| *value == 0) {
            return Err(AlertError::ZeroInterval(key));
        }
        self.currency_pairs()?;
        self.static_rules()?;
        Ok(())
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    pub fn historical_timeout(&self) -> Duration {
        Duration::from_secs(self.historical_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Monitor settings derived from this configuration.
    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            poll_interval: self.poll_interval(),
            update_day_of_month: self.update_day_of_month,
            reminder_interval: chrono::Duration::days(i64::from(self.reminder_interval_days)),
            reload_thresholds: self.reload_thresholds,
        }
    }

    pub fn currency_pairs(&self) -> Result<Vec<CurrencyPair>, AlertError> {
        self.pairs.iter().map(|p| p.parse()).collect()
    }

    /// Configured static rules, or the built-in set when none are given.
    pub fn static_rules(&self) -> Result<RuleSet, AlertError> {
        if self.rules.is_empty() {
            return Ok(RuleSet::default_static());
        }
        let mut rules = RuleSet::new();
        for rule in &self.rules {
            rules.insert(
                rule.pair.parse()?,
                Rule {
                    min: rule.min,
                    max: rule.max,
                },
            );
        }
        Ok(rules)
    }

    /// The API key, ignoring blank values.
    pub fn exchangerate_api_key(&self) -> Option<&str> {
        self.exchangerate_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.api_timeout(), Duration::from_secs(10));
        assert_eq!(config.historical_timeout(), Duration::from_secs(30));
        assert_eq!(config.currency_pairs().unwrap().len(), 5);
        assert_eq!(config.static_rules().unwrap(), RuleSet::default_static());
        assert!(config.exchangerate_api_key().is_none());

        let settings = config.monitor_settings();
        assert_eq!(settings.poll_interval, Duration::from_secs(3600));
        assert_eq!(settings.reminder_interval, chrono::Duration::days(7));
        assert!(!settings.reload_thresholds);
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
percentile = 5
lookback_days = 180
poll_interval_secs = 600
thresholds_path = "/var/lib/rate-alert/thresholds.json"
pairs = ["EUR/USD", "usd/jpy"]
exchangerate_api_key = "  "

[[rules]]
pair = "EUR/USD"
min = 1.05
max = 1.20

[telegram]
bot_key = "123:abc"
chat_id = "42"
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.percentile, 5);
        assert_eq!(config.lookback_days, 180);
        assert_eq!(config.poll_interval(), Duration::from_secs(600));
        assert_eq!(config.update_day_of_month, 1);
        assert_eq!(config.currency_pairs().unwrap()[1].to_string(), "USD/JPY");
        let rules = config.static_rules().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(
            rules.get(&"EUR/USD".parse().unwrap()),
            Some(&Rule {
                min: 1.05,
                max: 1.20
            })
        );
        assert!(config.exchangerate_api_key().is_none());
        assert_eq!(config.telegram.unwrap().chat_id, "42");
    }

    #[test]
    fn validation_rejects_bad_values() {
        let config = AppConfig {
            percentile: 75,
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AlertError::InvalidPercentile(75))
        ));

        let config = AppConfig {
            update_day_of_month: 0,
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AlertError::InvalidDayOfMonth(0))
        ));

        let config = AppConfig {
            poll_interval_secs: 0,
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AlertError::ZeroInterval("poll_interval_secs"))
        ));

        let config = AppConfig {
            reminder_interval_days: 0,
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AlertError::ZeroInterval("reminder_interval_days"))
        ));

        let config = AppConfig {
            pairs: vec!["AUDCNY".to_string()],
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(AlertError::InvalidPair(_))));
    }
}
