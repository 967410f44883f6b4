//! # Unified Application Configuration
//!
//! Runtime settings of the matcher binary, loaded from environment variables
//! (a `.env` file is honoured by the binary through `dotenvy`).

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::batch::ExecutionMode;
use crate::errors::{check_unit_interval, AppError, AppResult};
use crate::feature_validator::FeatureValidatorOptions;
use crate::observability_config::ObservabilityConfig;

/// Which pipeline the binary runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pipeline {
    /// Cross-record feature validation of client/source pairs
    #[default]
    Features,
    /// Per-record pattern extraction from client texts
    Autosem,
    /// Fuzzy token validation of client/source pairs
    Fuzzy,
}

impl FromStr for Pipeline {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "features" => Ok(Pipeline::Features),
            "autosem" => Ok(Pipeline::Autosem),
            "fuzzy" => Ok(Pipeline::Fuzzy),
            other => Err(AppError::Config(format!(
                "MATCHER_PIPELINE must be features, autosem or fuzzy, got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Pipeline::Features => "features",
            Pipeline::Autosem => "autosem",
            Pipeline::Fuzzy => "fuzzy",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone)]
pub struct MatcherConfig {
    pub pipeline: Pipeline,
    /// Measures configuration file; the built-in one when unset
    pub measures_config_path: Option<PathBuf>,
    /// Fuzzy configuration file; the built-in one when unset
    pub fuzzy_config_path: Option<PathBuf>,
    pub fuzzy_threshold: f64,
    pub validation_threshold: f64,
    pub execution: ExecutionMode,
    /// Blank out feature matches so later features cannot read them again
    pub consume_matches: bool,
    /// Stop extracting features once a pair has failed
    pub short_circuit: bool,
    /// Attach annotated tokens to fuzzy results
    pub fuzzy_debug: bool,
    /// JSON input file; stdin when unset
    pub input: Option<PathBuf>,
    /// JSON output file; stdout when unset
    pub output: Option<PathBuf>,
    pub observability: ObservabilityConfig,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            pipeline: Pipeline::Features,
            measures_config_path: None,
            fuzzy_config_path: None,
            fuzzy_threshold: 0.75,
            validation_threshold: 0.5,
            execution: ExecutionMode::Sequential,
            consume_matches: true,
            short_circuit: false,
            fuzzy_debug: false,
            input: None,
            output: None,
            observability: ObservabilityConfig::default(),
        }
    }
}

fn path_var(name: &str) -> Option<PathBuf> {
    env::var(name).ok().filter(|v| !v.trim().is_empty()).map(PathBuf::from)
}

fn threshold_var(name: &str, default: f64) -> AppResult<f64> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<f64>()
            .map_err(|_| AppError::Config(format!("{} must be a number, got '{}'", name, raw))),
        Err(_) => Ok(default),
    }
}

fn flag_var(name: &str, default: bool) -> AppResult<bool> {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(AppError::Config(format!("{} must be true or false, got '{}'", name, raw))),
        },
        Err(_) => Ok(default),
    }
}

impl MatcherConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();

        let pipeline = match env::var("MATCHER_PIPELINE") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.pipeline,
        };
        let execution = match env::var("PARALLEL") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.execution,
        };

        let config = Self {
            pipeline,
            measures_config_path: path_var("MEASURES_CONFIG_PATH"),
            fuzzy_config_path: path_var("FUZZY_CONFIG_PATH"),
            fuzzy_threshold: threshold_var("FUZZY_THRESHOLD", defaults.fuzzy_threshold)?,
            validation_threshold: threshold_var("VALIDATION_THRESHOLD", defaults.validation_threshold)?,
            execution,
            consume_matches: flag_var("CONSUME_MATCHES", defaults.consume_matches)?,
            short_circuit: flag_var("SHORT_CIRCUIT", defaults.short_circuit)?,
            fuzzy_debug: flag_var("FUZZY_DEBUG", defaults.fuzzy_debug)?,
            input: path_var("MATCHER_INPUT"),
            output: path_var("MATCHER_OUTPUT"),
            observability: ObservabilityConfig::from_env(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        check_unit_interval("FUZZY_THRESHOLD", self.fuzzy_threshold)?;
        check_unit_interval("VALIDATION_THRESHOLD", self.validation_threshold)?;
        self.observability.validate().map_err(AppError::Config)?;

        for (name, path) in [
            ("MEASURES_CONFIG_PATH", &self.measures_config_path),
            ("FUZZY_CONFIG_PATH", &self.fuzzy_config_path),
            ("MATCHER_INPUT", &self.input),
            ("MATCHER_OUTPUT", &self.output),
        ] {
            if let Some(path) = path {
                if path.as_os_str().is_empty() {
                    return Err(AppError::Config(format!("{} cannot be empty", name)));
                }
            }
        }
        Ok(())
    }

    pub fn feature_options(&self) -> FeatureValidatorOptions {
        FeatureValidatorOptions {
            consume_matches: self.consume_matches,
            short_circuit: self.short_circuit,
        }
    }

    /// Get a summary of the configuration for logging (without secrets)
    pub fn summary(&self) -> String {
        format!(
            "pipeline={}, execution={:?}, fuzzy_threshold={}, validation_threshold={}, consume_matches={}, short_circuit={}, environment={}",
            self.pipeline,
            self.execution,
            self.fuzzy_threshold,
            self.validation_threshold,
            self.consume_matches,
            self.short_circuit,
            self.observability.environment
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validation() {
        let config = MatcherConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fuzzy_threshold, 0.75);
        assert_eq!(config.validation_threshold, 0.5);
    }

    #[test]
    fn test_threshold_validation() {
        let config = MatcherConfig {
            fuzzy_threshold: 75.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AppError::InvalidThreshold(_))));

        let config = MatcherConfig {
            validation_threshold: -0.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AppError::InvalidThreshold(_))));
    }

    #[test]
    fn test_empty_path_rejected() {
        let config = MatcherConfig {
            input: Some(PathBuf::new()),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_pipeline_parsing() {
        assert_eq!("FUZZY".parse::<Pipeline>().unwrap(), Pipeline::Fuzzy);
        assert_eq!("autosem".parse::<Pipeline>().unwrap(), Pipeline::Autosem);
        assert!("ocr".parse::<Pipeline>().is_err());
        assert_eq!(Pipeline::Features.to_string(), "features");
    }

    #[test]
    fn test_feature_options_follow_config() {
        assert_eq!(
            MatcherConfig::default().feature_options(),
            FeatureValidatorOptions::default()
        );

        let config = MatcherConfig {
            consume_matches: false,
            short_circuit: true,
            ..Default::default()
        };
        let options = config.feature_options();
        assert!(!options.consume_matches);
        assert!(options.short_circuit);
    }

    #[test]
    fn test_flag_parsing() {
        std::env::set_var("MATCHER_TEST_FLAG_ON", "Yes");
        std::env::set_var("MATCHER_TEST_FLAG_OFF", "0");
        std::env::set_var("MATCHER_TEST_FLAG_BAD", "maybe");

        assert!(flag_var("MATCHER_TEST_FLAG_ON", false).unwrap());
        assert!(!flag_var("MATCHER_TEST_FLAG_OFF", true).unwrap());
        assert!(flag_var("MATCHER_TEST_FLAG_UNSET", true).unwrap());
        assert!(matches!(flag_var("MATCHER_TEST_FLAG_BAD", false), Err(AppError::Config(_))));
    }

    #[test]
    fn test_summary_mentions_pipeline() {
        assert!(MatcherConfig::default().summary().contains("pipeline=features"));
    }
}
