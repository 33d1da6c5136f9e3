mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// `skyscan` directory under the user's config root (`~/.config` on Linux,
/// `%APPDATA%` on Windows). Created on first use so `save_config` can write
/// into it.
pub fn config_dir() -> Result<PathBuf> {
    let root = dirs::config_dir().context("no per-user config directory on this platform")?;
    let dir = root.join("skyscan");
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    Ok(dir)
}

/// Where the scan settings live when no `--config` path is given.
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load config from the default location, or return default if not found.
pub fn load_config() -> Result<AppConfig> {
    load_config_from(&config_path()?)
}

/// Load config from `path`, or return default if the file does not exist.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: AppConfig =
            toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        info!(?path, "Loaded config");
        Ok(config)
    } else {
        info!(?path, "No config found, using defaults");
        Ok(AppConfig::default())
    }
}

/// Save config to the default location.
pub fn save_config(config: &AppConfig) -> Result<()> {
    save_config_to(config, &config_path()?)
}

pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    info!(?path, "Saved config");
    Ok(())
}

impl AppConfig {
    /// Check every value against the ranges the core components accept.
    pub fn validate(&self) -> Result<()> {
        self.imu
            .estimator_settings()
            .validate()
            .context("invalid [imu] section")?;
        self.coverage
            .coverage_settings()
            .validate()
            .context("invalid [coverage] section")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        let settings = config.coverage.coverage_settings();
        assert!((settings.band.end - std::f64::consts::PI).abs() < 1e-12);
        assert!((settings.band.start - 2.0 * std::f64::consts::PI / 3.0).abs() < 1e-12);
        assert_eq!(settings.min_dwell, Duration::from_millis(100));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = AppConfig::default();
        config.coverage.grid_resolution = 14;
        config.imu.drift_correction = false;

        save_config_to(&config, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(loaded.imu.estimator_settings().drift_correction.is_none());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[coverage]\ngrid_resolution = 10\n").unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.coverage.grid_resolution, 10);
        assert_eq!(loaded.imu, ImuConfig::default());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[coverage]\nmin_dwell_ms = 20\n").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("[coverage]"));
    }

    #[test]
    fn even_footprint_samples_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[coverage]\nfootprint_samples = 2\n").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("odd number of samples"));
    }
}
