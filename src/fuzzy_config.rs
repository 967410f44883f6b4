//! Fuzzy matching configuration: token weights, word filter and ratio
//! parameters, loaded from JSON.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::{check_unit_interval, error_logging, AppError, AppResult};
use crate::ratio::RateFunction;
use crate::tokenizer::CharClass;

const BUILTIN_FUZZY: &str = include_str!("../config/fuzzy.json");

/// Token weight per character class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassWeights {
    pub caps: f64,
    pub capital: f64,
    pub low: f64,
    pub other: f64,
}

impl Default for ClassWeights {
    fn default() -> Self {
        Self {
            caps: 1.0,
            capital: 1.0,
            low: 1.0,
            other: 1.0,
        }
    }
}

impl ClassWeights {
    pub fn weight(&self, class: CharClass) -> f64 {
        match class {
            CharClass::AllCaps => self.caps,
            CharClass::Capitalized => self.capital,
            CharClass::Lowercase => self.low,
            CharClass::Other => self.other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageWeights {
    pub russian: f64,
    pub english: f64,
}

impl Default for LanguageWeights {
    fn default() -> Self {
        Self {
            russian: 1.0,
            english: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioSettings {
    #[serde(default)]
    pub min_ratio: f64,
    #[serde(default = "default_max_ratio")]
    pub max_ratio: f64,
    #[serde(default)]
    pub min_appearance: usize,
    #[serde(default)]
    pub min_appearance_penalty: f64,
    #[serde(default = "default_rate_func")]
    pub rate_func: String,
}

fn default_max_ratio() -> f64 {
    1.0
}

fn default_rate_func() -> String {
    "overall".to_string()
}

impl Default for RatioSettings {
    fn default() -> Self {
        Self {
            min_ratio: 0.0,
            max_ratio: default_max_ratio(),
            min_appearance: 0,
            min_appearance_penalty: 0.0,
            rate_func: default_rate_func(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyConfig {
    #[serde(default)]
    pub config_name: String,
    #[serde(default)]
    pub regex_weights: ClassWeights,
    #[serde(default)]
    pub language_weights: LanguageWeights,
    #[serde(default = "default_word_min_len")]
    pub word_min_len: usize,
    #[serde(default)]
    pub ratio: RatioSettings,
}

fn default_word_min_len() -> usize {
    2
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            config_name: "default".to_string(),
            regex_weights: ClassWeights::default(),
            language_weights: LanguageWeights::default(),
            word_min_len: default_word_min_len(),
            ratio: RatioSettings::default(),
        }
    }
}

impl FuzzyConfig {
    pub fn from_json(content: &str) -> AppResult<Self> {
        let config: FuzzyConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn builtin() -> AppResult<Self> {
        Self::from_json(BUILTIN_FUZZY)
    }

    pub fn validate(&self) -> AppResult<()> {
        let weights = [
            ("regex_weights.caps", self.regex_weights.caps),
            ("regex_weights.capital", self.regex_weights.capital),
            ("regex_weights.low", self.regex_weights.low),
            ("regex_weights.other", self.regex_weights.other),
            ("language_weights.russian", self.language_weights.russian),
            ("language_weights.english", self.language_weights.english),
        ];
        for (key, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(AppError::Config(format!(
                    "{} must be a non-negative number, got {}",
                    key, weight
                )));
            }
        }

        check_unit_interval("ratio.min_ratio", self.ratio.min_ratio)?;
        check_unit_interval("ratio.max_ratio", self.ratio.max_ratio)?;
        check_unit_interval("ratio.min_appearance_penalty", self.ratio.min_appearance_penalty)?;
        if self.ratio.min_ratio > self.ratio.max_ratio {
            return Err(AppError::Config(
                "ratio.min_ratio must not exceed ratio.max_ratio".to_string(),
            ));
        }
        self.ratio.rate_func.parse::<RateFunction>()?;
        Ok(())
    }
}

pub fn load_fuzzy_config(path: impl AsRef<Path>) -> AppResult<FuzzyConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        error_logging::log_filesystem_error(&e, "read_fuzzy_config", path.to_str(), None);
        AppError::FileSystem(format!("cannot read {}: {}", path.display(), e))
    })?;
    let config = FuzzyConfig::from_json(&content).map_err(|e| {
        error_logging::log_config_error(&e, "fuzzy_config", "parse");
        e
    })?;
    info!(
        path = %path.display(),
        config_name = %config.config_name,
        rate_func = %config.ratio.rate_func,
        "Loaded fuzzy configuration"
    );
    Ok(config)
}

pub fn load_fuzzy_config_from_env() -> AppResult<FuzzyConfig> {
    if let Ok(config_path) = std::env::var("FUZZY_CONFIG_PATH") {
        info!("Loading fuzzy config from environment variable: {}", config_path);
        return load_fuzzy_config(config_path);
    }

    for candidate in ["config/fuzzy.json", "../config/fuzzy.json"] {
        if Path::new(candidate).exists() {
            return load_fuzzy_config(candidate);
        }
    }

    warn!("No fuzzy config file found, using built-in configuration");
    FuzzyConfig::builtin()
}
