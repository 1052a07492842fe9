#![deny(warnings)]
#![deny(rust_2018_idioms)]

use std::time::Duration;

use config::{Config, File};
use position_sync::{error::Error, settings::Settings, startup::App};

pub mod engine;
pub mod helper;
pub mod snapshot;
pub mod stream;

fn load(file: &str, environment: &str) -> Settings {
    let settings = Config::builder()
        .add_source(File::with_name(file).required(true))
        .set_override("environment", environment)
        .unwrap()
        .build()
        .unwrap()
        .try_deserialize::<Settings>()
        .unwrap();
    settings.validate().unwrap();
    settings
}

#[test]
fn test_local_settings_are_valid() {
    load("config/local.yml", "Local");
}

#[test]
fn test_development_settings_are_valid() {
    load("config/development.yml", "Development");
}

#[test]
fn test_production_settings_are_valid() {
    let settings = load("config/production.yml", "Production");
    assert!(settings.scheduler.snapshot_refresh_interval.is_some());
}

#[test]
fn test_test_settings_are_valid() {
    let settings = load("config/test.yml", "Test");
    assert_eq!(settings.resolver.exclusions.len(), 2);
    assert_eq!(settings.stream.base_delay, Duration::from_secs(5));
}

#[test]
fn test_zero_timer_periods_are_rejected() {
    let mut settings = Settings::test_default("http://127.0.0.1:1");
    settings.validate().unwrap();

    settings.scheduler.snapshot_refresh_interval = Some(Duration::ZERO);
    assert!(matches!(
        settings.validate(),
        Err(Error::ZeroSetting { name, .. }) if name == "scheduler.snapshot_refresh_interval"
    ));

    settings.scheduler.snapshot_refresh_interval = None;
    settings.scheduler.reconcile_interval = Duration::ZERO;
    assert!(matches!(
        App::build(&settings),
        Err(Error::ZeroSetting { name, .. }) if name == "scheduler.reconcile_interval"
    ));
}
