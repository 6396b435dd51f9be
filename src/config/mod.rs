//! Configuration hierarchy: defaults < TOML file < environment < CLI flags

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::rules::{InputPolicy, DEFAULT_MAX_DURATION_SECS};
use crate::engine::{DenoiseSettings, EngineConfig};
use crate::error::{MonoShotError, MonoShotResult};
use crate::utils::logging::LogFormat;

/// Files searched, in order, when no `--config` is given
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["monoshot.toml", "config/monoshot.toml"];

/// Environment variables and the keys they override
const ENV_MAPPINGS: [(&str, &str); 7] = [
    ("MONOSHOT_MAX_DURATION_SECS", "max_duration_secs"),
    ("MONOSHOT_MODEL_PATH", "model_path"),
    ("MONOSHOT_OCR_LANGUAGE", "ocr_language"),
    ("MONOSHOT_WORKSPACE_ROOT", "workspace_root"),
    ("MONOSHOT_LOG_LEVEL", "log_level"),
    ("MONOSHOT_LOG_FORMAT", "log_format"),
    ("MONOSHOT_ONNX_THREADS", "onnx_threads"),
];

/// Resolved application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonoShotConfig {
    /// Longest accepted video, in seconds
    pub max_duration_secs: u64,
    /// FSRCNN x4 ONNX model
    pub model_path: PathBuf,
    /// Tesseract language code
    pub ocr_language: String,
    /// Parent of per-request workspaces; system temp dir when unset
    pub workspace_root: Option<PathBuf>,
    pub log_level: String,
    pub log_format: LogFormat,
    pub onnx_threads: usize,
    pub denoise: DenoiseSettings,
}

impl Default for MonoShotConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: DEFAULT_MAX_DURATION_SECS,
            model_path: PathBuf::from("assets/FSRCNN_x4.onnx"),
            ocr_language: "eng".to_string(),
            workspace_root: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            onnx_threads: num_cpus::get(),
            denoise: DenoiseSettings::default(),
        }
    }
}

/// TOML layout: every key lives under `[monoshot]`
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    monoshot: Option<MonoShotConfig>,
}

/// Values given on the command line; `None` leaves the lower layers in place
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub max_duration_secs: Option<u64>,
    pub model_path: Option<PathBuf>,
    pub ocr_language: Option<String>,
    pub workspace_root: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

impl MonoShotConfig {
    /// Defaults, then the config file, then `MONOSHOT_*` variables
    pub fn load(explicit: Option<&Path>) -> MonoShotResult<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match DEFAULT_CONFIG_PATHS.iter().map(Path::new).find(|p| p.is_file()) {
                Some(path) => Self::from_file(path)?,
                None => {
                    debug!("No configuration file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> MonoShotResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| MonoShotError::ConfigError {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        info!("Loading configuration from: {}", path.display());
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> MonoShotResult<Self> {
        let file: ConfigFile = toml::from_str(content).map_err(|e| MonoShotError::ConfigError {
            message: format!("failed to parse TOML config: {}", e),
        })?;
        Ok(file.monoshot.unwrap_or_default())
    }

    /// Overlay environment values fetched through `lookup`; returns how many applied
    pub fn apply_env<F>(&mut self, lookup: F) -> MonoShotResult<usize>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = 0;
        for (var, key) in ENV_MAPPINGS {
            let Some(value) = lookup(var) else { continue };
            self.set(key, &value).map_err(|message| MonoShotError::ConfigError {
                message: format!("{}={}: {}", var, value, message),
            })?;
            info!("Found environment override: {} = {}", var, value);
            applied += 1;
        }
        Ok(applied)
    }

    /// Apply CLI flags, the highest-precedence layer
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(value) = overrides.max_duration_secs {
            self.max_duration_secs = value;
        }
        if let Some(value) = overrides.model_path {
            self.model_path = value;
        }
        if let Some(value) = overrides.ocr_language {
            self.ocr_language = value;
        }
        if let Some(value) = overrides.workspace_root {
            self.workspace_root = Some(value);
        }
        if let Some(value) = overrides.log_level {
            self.log_level = value;
        }
        if let Some(value) = overrides.log_format {
            self.log_format = value;
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "max_duration_secs" => {
                self.max_duration_secs = value.parse().map_err(|e| format!("{}", e))?;
            }
            "model_path" => self.model_path = PathBuf::from(value),
            "ocr_language" => self.ocr_language = value.to_string(),
            "workspace_root" => self.workspace_root = Some(PathBuf::from(value)),
            "log_level" => self.log_level = value.to_string(),
            "log_format" => {
                self.log_format = LogFormat::parse(value)
                    .ok_or_else(|| "expected pretty, compact or json".to_string())?;
            }
            "onnx_threads" => {
                self.onnx_threads = value.parse().map_err(|e| format!("{}", e))?;
            }
            other => return Err(format!("unknown key '{}'", other)),
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            model_path: self.model_path.clone(),
            ocr_language: self.ocr_language.clone(),
            onnx_threads: self.onnx_threads,
            denoise: self.denoise,
        }
    }

    pub fn input_policy(&self) -> InputPolicy {
        InputPolicy::new(self.max_duration_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = MonoShotConfig::default();
        assert_eq!(config.max_duration_secs, 30);
        assert_eq!(config.model_path, PathBuf::from("assets/FSRCNN_x4.onnx"));
        assert_eq!(config.ocr_language, "eng");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.onnx_threads >= 1);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = MonoShotConfig::from_toml_str(
            r#"
            [monoshot]
            max_duration_secs = 45
            log_format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.max_duration_secs, 45);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.ocr_language, "eng");
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = MonoShotConfig::from_toml_str("[monoshot\nmax = ").unwrap_err();
        assert!(matches!(err, MonoShotError::ConfigError { .. }));
    }

    #[test]
    fn test_precedence_file_env_cli() {
        let mut config = MonoShotConfig::from_toml_str(
            "[monoshot]\nocr_language = \"deu\"\nmax_duration_secs = 40\n",
        )
        .unwrap();

        let env: HashMap<&str, &str> = [
            ("MONOSHOT_MAX_DURATION_SECS", "50"),
            ("MONOSHOT_LOG_FORMAT", "compact"),
        ]
        .into_iter()
        .collect();
        let applied = config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(applied, 2);
        assert_eq!(config.max_duration_secs, 50);
        assert_eq!(config.ocr_language, "deu");

        config.apply_overrides(ConfigOverrides {
            max_duration_secs: Some(60),
            ..ConfigOverrides::default()
        });
        assert_eq!(config.max_duration_secs, 60);
        assert_eq!(config.log_format, LogFormat::Compact);
        assert_eq!(config.input_policy().max_duration_secs, 60);
    }

    #[test]
    fn test_bad_env_value_rejected() {
        let mut config = MonoShotConfig::default();
        let err = config
            .apply_env(|key| (key == "MONOSHOT_ONNX_THREADS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, MonoShotError::ConfigError { .. }));
    }

    #[test]
    fn test_explicit_missing_file_fails() {
        assert!(MonoShotConfig::load(Some(Path::new("/no/such/monoshot.toml"))).is_err());
    }
}
