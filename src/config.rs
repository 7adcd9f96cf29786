//! Runtime configuration, layered from defaults, `config.toml` files and `FOCUSTALLY_*`
//! environment variables. Command line flags are applied on top by the cli.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{ensure, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const ENV_PREFIX: &str = "FOCUSTALLY_";

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 900;
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_TOP_ACTIVITIES: usize = 5;
pub const DEFAULT_BROWSERS: [&str; 4] = ["Safari", "Google Chrome", "Firefox", "Brave Browser"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub database_path: PathBuf,
    pub poll_interval_ms: u64,
    /// Longest a single focus probe may take before the tick is skipped.
    pub probe_timeout_ms: u64,
    /// Application names whose active tab url is read.
    pub browsers: Vec<String>,
    pub top_activities: usize,
}

impl TrackerConfig {
    pub fn defaults_in(app_dir: &Path) -> Self {
        Self {
            database_path: app_dir.join("tracker.db"),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            browsers: DEFAULT_BROWSERS.iter().map(|v| v.to_string()).collect(),
            top_activities: DEFAULT_TOP_ACTIVITIES,
        }
    }

    /// Loads `<app_dir>/config.toml`, then `config_path` if given, then the environment.
    // figment::Error is large, but it's only ever returned at startup.
    #[allow(clippy::result_large_err)]
    pub fn load(app_dir: &Path, config_path: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(app_dir, config_path).extract()
    }

    fn figment(app_dir: &Path, config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::defaults_in(app_dir)))
            .merge(Toml::file(app_dir.join(CONFIG_FILE_NAME)));

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.poll_interval_ms > 0, "poll_interval_ms must be positive");
        ensure!(self.probe_timeout_ms > 0, "probe_timeout_ms must be positive");
        ensure!(self.top_activities > 0, "top_activities must be positive");
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use figment::Jail;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::defaults_in(Path::new("/state"));
        assert_eq!(config.database_path, Path::new("/state/tracker.db"));
        assert_eq!(config.poll_interval(), Duration::from_millis(900));
        assert_eq!(config.top_activities, 5);
        assert!(config.browsers.iter().any(|b| b == "Brave Browser"));
        config.validate().unwrap();
    }

    #[test]
    fn test_layering() {
        Jail::expect_with(|jail| {
            let app_dir = jail.directory().to_path_buf();
            jail.create_file(
                CONFIG_FILE_NAME,
                r#"
                poll_interval_ms = 500
                browsers = ["Firefox"]
                "#,
            )?;
            jail.create_file("override.toml", "poll_interval_ms = 700\ntop_activities = 3")?;
            jail.set_env("FOCUSTALLY_TOP_ACTIVITIES", "8");

            let config = TrackerConfig::load(&app_dir, None)?;
            assert_eq!(config.poll_interval_ms, 500);
            assert_eq!(config.browsers, vec!["Firefox".to_string()]);
            assert_eq!(config.top_activities, 8);
            assert_eq!(config.probe_timeout_ms, DEFAULT_PROBE_TIMEOUT_MS);

            let config = TrackerConfig::load(&app_dir, Some(&app_dir.join("override.toml")))?;
            assert_eq!(config.poll_interval_ms, 700);
            assert_eq!(config.top_activities, 8);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = TrackerConfig::defaults_in(Path::new("/state"));
        config.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = TrackerConfig::defaults_in(Path::new("/state"));
        config.top_activities = 0;
        assert!(config.validate().is_err());
    }
}
