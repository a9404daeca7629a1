use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::climate::{ConfiguredSource, GeneratedSource, PowerDataset};
use crate::crop::CropType;

fn default_location() -> String {
    "unknown".to_string()
}

fn default_year() -> i32 {
    2024
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameConfig {
    pub name: String,
    pub description: Option<String>,
    pub seed: u64,
    #[serde(default)]
    pub crop: CropType,
    #[serde(default)]
    pub climate: ClimateConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClimateSourceKind {
    NasaPower,
    #[default]
    Generated,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClimateConfig {
    #[serde(default)]
    pub source: ClimateSourceKind,
    /// Daily POWER file, relative to the config loader's base directory.
    #[serde(default)]
    pub dataset: Option<PathBuf>,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default = "default_year")]
    pub year: i32,
}

impl Default for ClimateConfig {
    fn default() -> Self {
        Self {
            source: ClimateSourceKind::default(),
            dataset: None,
            location: default_location(),
            latitude: None,
            longitude: None,
            year: default_year(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<GameConfig> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: GameConfig = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Climate source described by `config`, with dataset paths resolved
    /// against the base directory.
    pub fn climate_source(&self, config: &GameConfig) -> Result<ConfiguredSource> {
        let climate = &config.climate;
        match climate.source {
            ClimateSourceKind::Generated => Ok(ConfiguredSource::Generated(GeneratedSource)),
            ClimateSourceKind::NasaPower => {
                let dataset = climate.dataset.as_ref().with_context(|| {
                    format!("config '{}' uses nasa_power without a dataset path", config.name)
                })?;
                let mut power = PowerDataset::new(
                    self.base_dir.join(dataset),
                    climate.location.clone(),
                    climate.year,
                );
                if let (Some(latitude), Some(longitude)) = (climate.latitude, climate.longitude) {
                    power = power.with_coordinates(latitude, longitude);
                }
                Ok(ConfiguredSource::Dataset(power))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> GameConfig {
        serde_yaml::from_str(yaml).expect("config parses")
    }

    #[test]
    fn minimal_config_takes_defaults() {
        let config = parse("name: bare\nseed: 3\n");
        assert_eq!(config.crop, CropType::Rice);
        assert_eq!(config.climate.source, ClimateSourceKind::Generated);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn dataset_paths_resolve_against_base_dir() {
        let config = parse(
            "name: site\nseed: 1\nclimate:\n  source: nasa_power\n  dataset: data/site.json\n  location: site\n  year: 2023\n",
        );
        let loader = ConfigLoader::new("/srv/ecofarm");
        match loader.climate_source(&config).unwrap() {
            ConfiguredSource::Dataset(dataset) => {
                assert_eq!(dataset.path(), Path::new("/srv/ecofarm/data/site.json"));
                assert_eq!(dataset.source_tag(), "nasa-power:site-2023");
                assert_eq!(dataset.coordinates(), None);
            }
            other => panic!("expected dataset source, got {other:?}"),
        }
    }

    #[test]
    fn site_coordinates_pin_the_dataset() {
        let config = parse(
            "name: site\nseed: 1\nclimate:\n  source: nasa_power\n  dataset: d.json\n  latitude: 25.297\n  longitude: 91.5822\n",
        );
        match ConfigLoader::new(".").climate_source(&config).unwrap() {
            ConfiguredSource::Dataset(dataset) => {
                assert_eq!(dataset.coordinates(), Some((25.297, 91.5822)));
            }
            other => panic!("expected dataset source, got {other:?}"),
        }
    }

    #[test]
    fn nasa_power_without_dataset_is_rejected() {
        let config = parse("name: broken\nseed: 1\nclimate:\n  source: nasa_power\n");
        let err = ConfigLoader::new(".").climate_source(&config).unwrap_err();
        assert!(err.to_string().contains("without a dataset path"));
    }

    #[test]
    fn unknown_crop_fails_to_parse() {
        let result: Result<GameConfig, _> = serde_yaml::from_str("name: x\nseed: 1\ncrop: wheat\n");
        assert!(result.is_err());
    }
}
