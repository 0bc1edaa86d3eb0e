// Model configuration.
//
// `AnalysisConfig` is shared by every piece of a collection. Any field may
// be omitted from a JSON config file; missing fields take their defaults,
// so `{}` is a valid config.
//
// `defaults` holds per-analyzer settings that sit between each analyzer's
// built-in defaults and the settings passed to `get`:
//
//     { "defaults": { "vertical_interval": { "simple_or_compound": "simple" } } }

use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use vizitka_analysis::ChainSettings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Run the pieces of a collection on the rayon thread pool.
    pub parallel: bool,
    /// Keep every computed chain prefix for reuse by later calls.
    pub cache_results: bool,
    /// Per-analyzer settings applied under call-site settings.
    pub defaults: ChainSettings,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            parallel: true,
            cache_results: true,
            defaults: ChainSettings::new(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ModelError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vizitka_analysis::Settings;

    #[test]
    fn empty_json_gives_defaults() {
        let config = AnalysisConfig::from_json_str("{}").unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert!(config.parallel);
        assert!(config.cache_results);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config = AnalysisConfig::from_json_str(
            r#"{"parallel": false, "defaults": {"vi": {"quality": false}}}"#,
        )
        .unwrap();
        assert!(!config.parallel);
        assert!(config.cache_results);
        let expected = ChainSettings::new().with("vi", Settings::new().with("quality", false));
        assert_eq!(config.defaults, expected);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(
            AnalysisConfig::from_json_str(r#"{"parallel": "yes"}"#),
            Err(ModelError::Config(_))
        ));
    }

    #[test]
    fn roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = AnalysisConfig {
            parallel: false,
            ..AnalysisConfig::default()
        };
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();
        assert_eq!(AnalysisConfig::load(&path).unwrap(), config);
    }
}
