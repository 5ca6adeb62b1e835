//! YAML configuration file.

use crate::error::{CliError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use vantage_dem::PipelineConfig;
use vantage_optimizer::OptimizerConfig;
use vantage_viewshed::ViewshedParams;

/// Everything a config file may set. Missing sections and fields keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub pipeline: PipelineConfig,
    pub viewshed: ViewshedParams,
    pub optimizer: OptimizerConfig,
}

impl CliConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| CliError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.optimizer.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_file_is_default() {
        let config = CliConfig::from_yaml("{}").unwrap();
        assert_eq!(config, CliConfig::default());
    }

    #[test]
    fn test_partial_sections() {
        let yaml = r#"
pipeline:
  strict: true
  synthetic_seed: 7
viewshed:
  frequency_mhz: 915.0
optimizer:
  genetic:
    population_size: 12
  constraints:
    min_separation_km: 2.5
    exclusion_zones:
      - latitude: 45.0
        longitude: 7.0
        radius_km: 3.0
"#;
        let config = CliConfig::from_yaml(yaml).unwrap();

        assert!(config.pipeline.strict);
        assert_eq!(config.pipeline.synthetic_seed, 7);
        assert_eq!(config.pipeline.cache_ttl_secs, PipelineConfig::default().cache_ttl_secs);
        assert_relative_eq!(config.viewshed.frequency_mhz, 915.0);
        assert_relative_eq!(config.viewshed.refraction_coefficient, 0.13);
        assert_eq!(config.optimizer.genetic.population_size, 12);
        assert_eq!(config.optimizer.genetic.max_generations, 30);
        assert_relative_eq!(config.optimizer.constraints.min_separation_km, 2.5);
        assert_eq!(config.optimizer.constraints.exclusion_zones.len(), 1);
    }

    #[test]
    fn test_invalid_optimizer_settings_rejected() {
        let yaml = "optimizer:\n  genetic:\n    population_size: 0\n";
        assert!(matches!(CliConfig::from_yaml(yaml), Err(CliError::Optimizer(_))));
    }

    #[test]
    fn test_malformed_yaml_rejected() {
        assert!(matches!(
            CliConfig::from_yaml("pipeline: [not, a, map]"),
            Err(CliError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = CliConfig::load(Path::new("/nonexistent/vantage.yaml")).unwrap_err();
        assert!(matches!(err, CliError::ConfigRead { .. }));
        assert!(err.to_string().contains("vantage.yaml"));
    }
}
