//! Pipeline configuration.
//!
//! Read from `~/.dealsignal/config.json`. Every section is optional; a missing
//! file yields the defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::expertise::ExpertiseThresholds;
use crate::recommendations::RecommendationWeights;

const CONFIG_DIR: &str = ".dealsignal";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StorageBackend {
    Memory,
    JsonFile,
    #[default]
    Sqlite,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Defaults to `~/.dealsignal`.
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimingConfig {
    pub completion_display_secs: u64,
    pub generation_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            completion_display_secs: 4,
            generation_delay_ms: 1200,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    pub expertise: ExpertiseThresholds,
    pub recommendations: RecommendationWeights,
    pub timing: TimingConfig,
    pub storage: StorageConfig,
    /// Optional signal feed to load into the catalog at startup.
    pub catalog_path: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn completion_display(&self) -> Duration {
        Duration::from_secs(self.timing.completion_display_secs)
    }

    pub fn generation_delay(&self) -> Duration {
        Duration::from_millis(self.timing.generation_delay_ms)
    }

    /// Storage directory, falling back to `~/.dealsignal`.
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.storage.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_dir(),
        }
    }

    /// Reject settings that break ordering guarantees.
    pub fn validate(&self) -> Result<()> {
        let t = &self.expertise;
        if t.exploring < 1 {
            return Err(PipelineError::Config(
                "Expertise exploring threshold must be at least 1".to_string(),
            ));
        }
        if !(t.exploring <= t.practitioner && t.practitioner <= t.recognized) {
            return Err(PipelineError::Config(format!(
                "Expertise thresholds must be ascending, got {}/{}/{}",
                t.exploring, t.practitioner, t.recognized
            )));
        }

        let w = &self.recommendations;
        let weights = [
            w.context_match_boost,
            w.signal_match_boost,
            w.continue_watching_boost,
            w.low_expertise_boost,
            w.completed_penalty,
            w.recognized_penalty,
        ];
        if weights.iter().any(|v| *v < 0) {
            return Err(PipelineError::Config(
                "Recommendation boosts and penalties must not be negative".to_string(),
            ));
        }
        if w.downrank_penalty <= w.priority_spread() {
            return Err(PipelineError::Config(format!(
                "downrankPenalty must exceed {}, got {}",
                w.priority_spread(),
                w.downrank_penalty
            )));
        }
        Ok(())
    }
}

fn default_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PipelineError::Config("Could not find home directory".to_string()))?;
    Ok(home.join(CONFIG_DIR))
}

/// Load `~/.dealsignal/config.json`, or defaults if it does not exist.
pub fn load_config() -> Result<PipelineConfig> {
    load_config_from(&default_dir()?.join(CONFIG_FILE))
}

pub fn load_config_from(path: &Path) -> Result<PipelineConfig> {
    if !path.exists() {
        log::debug!("No config at {}, using defaults", path.display());
        return Ok(PipelineConfig::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| PipelineError::Config(format!("Failed to read config: {}", e)))?;
    let config: PipelineConfig = serde_json::from_str(&content)
        .map_err(|e| PipelineError::Config(format!("Failed to parse config: {}", e)))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.generation_delay(), Duration::from_millis(1200));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "recommendations": { "downrankPenalty": 5000 },
                "storage": { "backend": "jsonFile", "dataDir": "/tmp/ds" }
            }"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.recommendations.downrank_penalty, 5000);
        assert_eq!(config.recommendations.base, 100);
        assert_eq!(config.storage.backend, StorageBackend::JsonFile);
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/ds"));
        assert_eq!(config.expertise, ExpertiseThresholds::default());
    }

    #[test]
    fn test_descending_thresholds_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"expertise": {"practitioner": 500, "recognized": 100}}"#).unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(err.requires_user_action());
    }

    #[test]
    fn test_downrank_penalty_must_clear_spread() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"recommendations": {"downrankPenalty": 100}}"#).unwrap();
        assert!(matches!(load_config_from(&path), Err(PipelineError::Config(_))));

        let mut config = PipelineConfig::default();
        config.recommendations.downrank_penalty = config.recommendations.priority_spread();
        assert!(config.validate().is_err());
        config.recommendations.downrank_penalty += 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut config = PipelineConfig::default();
        config.recommendations.completed_penalty = -40;
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_zero_exploring_threshold_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"expertise": {"exploring": 0}}"#).unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_config_from(&path), Err(PipelineError::Config(_))));
    }
}
