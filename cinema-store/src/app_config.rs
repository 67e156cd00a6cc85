use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    pub business_rules: BusinessRules,
    #[serde(default)]
    pub notifications: NotificationConfig,
    pub kafka: Option<KafkaConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// Holds older than this are released by the sweeper.
    pub seat_hold_seconds: u64,
    /// Price given to seats of newly laid out halls.
    #[serde(default = "default_seat_price")]
    pub default_seat_price_cents: i64,
}

impl BusinessRules {
    pub fn seat_hold_ttl(&self) -> Duration {
        Duration::from_secs(self.seat_hold_seconds)
    }
}

fn default_seat_price() -> i64 {
    1500
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    pub channel_capacity: usize,
    pub log_notifications: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 100,
            log_notifications: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    pub topic: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    /// Layered load: `{dir}/default`, then `{dir}/{RUN_MODE}` and
    /// `{dir}/local` if present, then `CINEMA__*` environment variables.
    pub fn load_from(dir: &str) -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name(&format!("{}/default", dir)))
            .add_source(config::File::with_name(&format!("{}/{}", dir, run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name(&format!("{}/local", dir)).required(false))
            // Eg. `CINEMA__STORAGE__DATA_DIR=/var/lib/cinema`
            .add_source(config::Environment::with_prefix("CINEMA").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_layers_local_over_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("default.toml"),
            r#"
                [storage]
                data_dir = "data"

                [business_rules]
                seat_hold_seconds = 900
            "#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("local.toml"),
            r#"
                [business_rules]
                seat_hold_seconds = 60
            "#,
        )
        .unwrap();

        let config = Config::load_from(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(config.storage.data_dir, PathBuf::from("data"));
        assert_eq!(config.business_rules.seat_hold_ttl(), Duration::from_secs(60));
        assert_eq!(config.business_rules.default_seat_price_cents, 1500);
        assert_eq!(config.notifications.channel_capacity, 100);
        assert!(config.kafka.is_none());
    }

    #[test]
    fn test_missing_default_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from(dir.path().to_str().unwrap()).is_err());
    }
}
