use std::time::Duration;

use config::{Config, ConfigError, File};
use serde::Deserialize;
use snafu::{ResultExt, ensure};
use strum::{AsRefStr, EnumString};

use crate::{
    error::{
        Result,
        error::{ConfigSnafu, ZeroSettingSnafu},
    },
    resolver::{ExclusionRule, HomePortRule, NamedLocation},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, AsRefStr, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Environment {
    Local,
    Development,
    Production,
    Test,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub environment: Environment,
    pub log_level: String,
    pub api_address: String,
    pub api_token: Option<String>,
    #[serde(with = "humantime_serde")]
    pub http_timeout: Duration,
    pub http_max_retries: u32,
    pub stream: StreamSettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub resolver: ResolverSettings,
    pub channel_buffer_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamSettings {
    pub url: String,
    /// Message sent as-is right after a connection opens.
    pub subscription: Option<String>,
    #[serde(with = "humantime_serde", default = "default_base_delay")]
    pub base_delay: Duration,
    #[serde(with = "humantime_serde", default = "default_max_delay")]
    pub max_delay: Duration,
    pub max_message_length: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    #[serde(with = "humantime_serde")]
    pub debounce: Duration,
    #[serde(with = "humantime_serde")]
    pub reconcile_interval: Duration,
    #[serde(with = "humantime_serde", default)]
    pub snapshot_refresh_interval: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverSettings {
    #[serde(default)]
    pub exclusions: Vec<ExclusionRule>,
    #[serde(default = "default_home_ports")]
    pub home_ports: Vec<HomePortRule>,
    /// Replaces the built in list of named ports and bases.
    #[serde(default)]
    pub gazetteer: Option<Vec<NamedLocation>>,
    #[serde(with = "humantime_serde", default = "default_stale_after")]
    pub stale_after: Duration,
}

impl Settings {
    pub fn new() -> Result<Settings> {
        let environment: Environment = std::env::var("APP_ENVIRONMENT")
            .map_err(|e| ConfigError::Message(format!("APP_ENVIRONMENT is not set: {e}")))
            .and_then(|v| {
                v.parse().map_err(|e| {
                    ConfigError::Message(format!("failed to parse APP_ENVIRONMENT '{v}': {e}"))
                })
            })
            .context(ConfigSnafu)?;

        let settings = Self::load(environment).context(ConfigSnafu)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Rejects settings the engine cannot run with, timers need a non-zero period.
    pub fn validate(&self) -> Result<()> {
        let scheduler = &self.scheduler;
        ensure!(
            !scheduler.reconcile_interval.is_zero(),
            ZeroSettingSnafu {
                name: "scheduler.reconcile_interval"
            }
        );
        if let Some(interval) = scheduler.snapshot_refresh_interval {
            ensure!(
                !interval.is_zero(),
                ZeroSettingSnafu {
                    name: "scheduler.snapshot_refresh_interval"
                }
            );
        }
        ensure!(
            self.channel_buffer_size > 0,
            ZeroSettingSnafu {
                name: "channel_buffer_size"
            }
        );
        Ok(())
    }

    fn load(environment: Environment) -> std::result::Result<Settings, ConfigError> {
        Config::builder()
            .add_source(
                File::with_name(&format!("config/{}", environment.as_ref().to_lowercase()))
                    .required(true),
            )
            .add_source(config::Environment::with_prefix("POSITION_SYNC").separator("__"))
            .set_override("environment", environment.as_ref())?
            .build()?
            .try_deserialize()
    }

    pub fn fleet_url(&self) -> String {
        format!("{}/v1.0/fleet", self.api_address.trim_end_matches('/'))
    }

    pub fn cached_positions_url(&self) -> String {
        format!(
            "{}/v1.0/ais/latest_positions",
            self.api_address.trim_end_matches('/')
        )
    }
}

fn default_base_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_stale_after() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_home_ports() -> Vec<HomePortRule> {
    let rule = |name: &str, port: &str| HomePortRule {
        name_contains: name.to_owned(),
        port: port.to_owned(),
    };

    vec![
        // Collins class submarines
        rule("COLLINS", "HMAS Stirling"),
        rule("FARNCOMB", "HMAS Stirling"),
        rule("WALLER", "HMAS Stirling"),
        rule("DECHAINEUX", "HMAS Stirling"),
        rule("SHEEAN", "HMAS Stirling"),
        rule("RANKIN", "HMAS Stirling"),
        // Destroyers and landing helicopter docks
        rule("HOBART", "Fleet Base East"),
        rule("BRISBANE", "Fleet Base East"),
        rule("SYDNEY", "Fleet Base East"),
        rule("CANBERRA", "Fleet Base East"),
        rule("ADELAIDE", "Fleet Base East"),
    ]
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(1),
            reconcile_interval: Duration::from_secs(5),
            snapshot_refresh_interval: None,
        }
    }
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            exclusions: Vec::new(),
            home_ports: default_home_ports(),
            gazetteer: None,
            stale_after: default_stale_after(),
        }
    }
}

#[cfg(feature = "test")]
mod test {
    use super::*;

    impl Settings {
        pub fn test_default(api_address: &str) -> Self {
            Self {
                environment: Environment::Test,
                log_level: "debug".into(),
                api_address: api_address.into(),
                api_token: None,
                http_timeout: Duration::from_secs(5),
                http_max_retries: 0,
                stream: StreamSettings {
                    url: "ws://127.0.0.1:1".into(),
                    subscription: None,
                    base_delay: default_base_delay(),
                    max_delay: default_max_delay(),
                    max_message_length: None,
                },
                scheduler: SchedulerSettings::default(),
                resolver: ResolverSettings::default(),
                channel_buffer_size: 100,
            }
        }
    }
}
