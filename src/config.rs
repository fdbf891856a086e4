use crate::types::Config;
use anyhow::{Context, Result};
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read config: {}", path))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config: {}", path))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BallId, SourceKind};

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
motion:
  threshold_percent: 8.0
referee:
  active_ball: "3"
source:
  kind: camera
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.motion.threshold_percent, 8.0);
        assert_eq!(config.motion.noise_threshold, 22);
        assert_eq!(config.referee.active_ball, BallId::Number(3));
        assert_eq!(config.referee.pot_threshold, 10);
        assert_eq!(config.source.kind, SourceKind::Camera);
        assert_eq!(config.detection.interval, 3);
        assert_eq!(config.balls.len(), 8);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(Config::load("/nonexistent/config.yaml").is_err());
    }
}
