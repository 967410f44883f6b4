//! # Measures Configuration
//!
//! Serde model of the measures configuration file. A configuration lists
//! numeric, string and complex measure families; every family carries its
//! unit table (`measure_data`), its extractor settings (`autosem`) and its
//! cross-record validation settings (`feature_validator`).
//!
//! Enumerated settings are kept as raw strings here and parsed by the typed
//! model in [`crate::measure`] and [`crate::feature_validator`]. [`MeasuresConfig::validate`]
//! runs those parsers up front so a bad value fails at load time.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::errors::{error_logging, AppError, AppResult};
use crate::feature_validator::{NotFoundMode, ValidationMode};
use crate::measure::{MergeMode, SearchMode};

/// Marker telling a unit to inherit the measure-wide value
pub const COMMON: &str = "common";

/// Default numeral pattern used when a measure does not override it
pub const DEFAULT_VALUE_SEARCH: &str = r"\d*[.,]?\d+";

const BUILTIN_MEASURES: &str = include_str!("../config/measures.json");

/// Root of the measures configuration file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MeasuresConfig {
    pub config_name: String,
    #[serde(default)]
    pub numeric_measures: MeasureGroup<MeasureRecord>,
    #[serde(default)]
    pub string_measures: MeasureGroup<MeasureRecord>,
    #[serde(default)]
    pub complex_measures: MeasureGroup<ComplexRecord>,
}

/// A family of measures sharing one type tag
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MeasureGroup<T> {
    #[serde(default)]
    pub use_it: bool,
    #[serde(default = "Vec::new")]
    pub measures: Vec<T>,
}

impl<T> Default for MeasureGroup<T> {
    fn default() -> Self {
        Self {
            use_it: false,
            measures: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MeasureRecord {
    pub measure_name: String,
    pub measure_data: MeasureData,
    #[serde(default)]
    pub autosem: AutosemSettings,
    #[serde(default)]
    pub feature_validator: ValidatorSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MeasureData {
    #[serde(default)]
    pub common_prefix: String,
    #[serde(default)]
    pub common_postfix: String,
    #[serde(default)]
    pub common_max_count: Option<usize>,
    #[serde(default)]
    pub special_value_search: Option<String>,
    pub features: Vec<UnitRecord>,
}

/// One unit of a measure. `defenition` keeps the historical key spelling.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UnitRecord {
    pub feature_name: String,
    pub defenition: String,
    #[serde(default = "default_relative_weight")]
    pub relative_weight: Value,
    #[serde(default = "default_common")]
    pub prefix: String,
    #[serde(default = "default_common")]
    pub postfix: String,
    #[serde(default = "default_common_value")]
    pub max_count: Value,
    #[serde(default = "default_search_mode")]
    pub search_mode: String,
    #[serde(default = "default_true")]
    pub use_it: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AutosemSettings {
    #[serde(default = "default_true")]
    pub use_it: bool,
    #[serde(default = "default_merge_mode")]
    pub merge_mode: Value,
    #[serde(default)]
    pub exclude_rx: bool,
}

impl Default for AutosemSettings {
    fn default() -> Self {
        Self {
            use_it: true,
            merge_mode: default_merge_mode(),
            exclude_rx: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidatorSettings {
    #[serde(default = "default_true")]
    pub use_it: bool,
    #[serde(default = "default_validation_mode")]
    pub validation_mode: String,
    #[serde(default = "default_not_found_mode")]
    pub not_found_mode: String,
    #[serde(default)]
    pub priority: i64,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            use_it: true,
            validation_mode: default_validation_mode(),
            not_found_mode: default_not_found_mode(),
            priority: 0,
        }
    }
}

impl ValidatorSettings {
    /// Settings for a feature built in code rather than loaded from a file
    pub fn with_modes(validation_mode: &str, not_found_mode: &str, priority: i64) -> Self {
        Self {
            use_it: true,
            validation_mode: validation_mode.to_string(),
            not_found_mode: not_found_mode.to_string(),
            priority,
        }
    }
}

/// Complex measures only name a registered implementation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ComplexRecord {
    pub measure_name: String,
    #[serde(default)]
    pub feature_validator: ValidatorSettings,
}

fn default_relative_weight() -> Value {
    Value::from(1)
}

fn default_common() -> String {
    COMMON.to_string()
}

fn default_common_value() -> Value {
    Value::String(COMMON.to_string())
}

fn default_search_mode() -> String {
    "behind".to_string()
}

fn default_merge_mode() -> Value {
    Value::String("overall".to_string())
}

fn default_validation_mode() -> String {
    "strict".to_string()
}

fn default_not_found_mode() -> String {
    "modest".to_string()
}

fn default_true() -> bool {
    true
}

impl MeasureData {
    /// Numeral sub-pattern for this measure, `\d*[.,]?\d+` unless overridden
    pub fn value_search(&self) -> &str {
        match self.special_value_search.as_deref() {
            Some(s) if !s.trim().is_empty() => s,
            _ => DEFAULT_VALUE_SEARCH,
        }
    }
}

impl UnitRecord {
    /// Resolve the prefix, substituting the measure-wide one for `"common"`
    pub fn resolved_prefix<'a>(&'a self, data: &'a MeasureData) -> &'a str {
        if self.prefix == COMMON {
            &data.common_prefix
        } else {
            &self.prefix
        }
    }

    pub fn resolved_postfix<'a>(&'a self, data: &'a MeasureData) -> &'a str {
        if self.postfix == COMMON {
            &data.common_postfix
        } else {
            &self.postfix
        }
    }

    /// Resolve max_count. `None` means unlimited (null or 0).
    pub fn resolved_max_count(&self, data: &MeasureData) -> AppResult<Option<usize>> {
        let raw = match &self.max_count {
            Value::String(s) if s == COMMON => return Ok(data.common_max_count.filter(|c| *c > 0)),
            Value::Null => None,
            Value::Number(n) => Some(n.as_u64().ok_or_else(|| {
                AppError::Config(format!(
                    "max_count of '{}' must be a non-negative integer, got {}",
                    self.feature_name, n
                ))
            })? as usize),
            Value::String(s) => Some(s.trim().parse::<usize>().map_err(|_| {
                AppError::Config(format!(
                    "max_count of '{}' must be an integer, null or \"common\", got '{}'",
                    self.feature_name, s
                ))
            })?),
            other => {
                return Err(AppError::Config(format!(
                    "max_count of '{}' has unsupported value {}",
                    self.feature_name, other
                )))
            }
        };
        Ok(raw.filter(|c| *c > 0))
    }

    /// Parse the canonical ratio. Must be strictly positive.
    pub fn ratio(&self) -> AppResult<Decimal> {
        let ratio = parse_decimal_value(&self.relative_weight).ok_or_else(|| {
            AppError::Config(format!(
                "relative_weight of '{}' is not a number: {}",
                self.feature_name, self.relative_weight
            ))
        })?;
        if ratio <= Decimal::ZERO {
            return Err(AppError::Config(format!(
                "relative_weight of '{}' must be positive, got {}",
                self.feature_name, ratio
            )));
        }
        Ok(ratio)
    }
}

/// Read a JSON number or numeric string as an exact decimal
pub fn parse_decimal_value(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

impl MeasuresConfig {
    /// Parse a configuration from JSON text and validate it
    pub fn from_json(content: &str) -> AppResult<Self> {
        let config: MeasuresConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// The configuration shipped with the crate
    pub fn builtin() -> AppResult<Self> {
        Self::from_json(BUILTIN_MEASURES)
    }

    /// Validate measures configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.config_name.trim().is_empty() {
            return Err(AppError::Config("config_name cannot be empty".to_string()));
        }

        let mut seen = std::collections::HashSet::new();
        for measure in &self.numeric_measures.measures {
            validate_measure(measure)?;
            if !seen.insert(measure.measure_name.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate measure_name '{}'",
                    measure.measure_name
                )));
            }
        }
        for measure in &self.string_measures.measures {
            validate_measure(measure)?;
            if !seen.insert(measure.measure_name.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate measure_name '{}'",
                    measure.measure_name
                )));
            }
        }
        for complex in &self.complex_measures.measures {
            validate_validator_settings(&complex.measure_name, &complex.feature_validator)?;
            if !seen.insert(complex.measure_name.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate measure_name '{}'",
                    complex.measure_name
                )));
            }
        }
        Ok(())
    }
}

fn validate_measure(measure: &MeasureRecord) -> AppResult<()> {
    if measure.measure_name.trim().is_empty() {
        return Err(AppError::Config("measure_name cannot be empty".to_string()));
    }
    let data = &measure.measure_data;
    if data.features.is_empty() {
        return Err(AppError::Config(format!(
            "measure '{}' has no features",
            measure.measure_name
        )));
    }
    regex::Regex::new(data.value_search()).map_err(|e| {
        AppError::Config(format!(
            "special_value_search of '{}' is not a valid regex: {}",
            measure.measure_name, e
        ))
    })?;

    for unit in &data.features {
        if unit.defenition.trim().is_empty() {
            return Err(AppError::Config(format!(
                "defenition of '{}' cannot be empty",
                unit.feature_name
            )));
        }
        for (key, pattern) in [
            ("defenition", unit.defenition.as_str()),
            ("prefix", unit.resolved_prefix(data)),
            ("postfix", unit.resolved_postfix(data)),
        ] {
            if regex::Regex::new(pattern).is_err() {
                return Err(AppError::Config(format!(
                    "{} '{}' of '{}' is not a valid regex",
                    key, pattern, unit.feature_name
                )));
            }
        }
        unit.ratio()?;
        unit.resolved_max_count(data)?;
        SearchMode::from_str(&unit.search_mode)?;
    }

    MergeMode::from_value(&measure.autosem.merge_mode)?;
    validate_validator_settings(&measure.measure_name, &measure.feature_validator)
}

fn validate_validator_settings(name: &str, settings: &ValidatorSettings) -> AppResult<()> {
    ValidationMode::from_str(&settings.validation_mode)
        .and_then(|_| NotFoundMode::from_str(&settings.not_found_mode))
        .map(|_| ())
        .map_err(|e| AppError::Config(format!("feature_validator of '{}': {}", name, e)))
}

/// Load a measures configuration from a JSON file
pub fn load_measures_config(path: impl AsRef<Path>) -> AppResult<MeasuresConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        error_logging::log_filesystem_error(&e, "read_measures_config", path.to_str(), None);
        AppError::FileSystem(format!("cannot read {}: {}", path.display(), e))
    })?;
    let config = MeasuresConfig::from_json(&content).map_err(|e| {
        error_logging::log_config_error(&e, "measures_config", "parse");
        e
    })?;
    info!(
        path = %path.display(),
        config_name = %config.config_name,
        numeric = config.numeric_measures.measures.len(),
        string = config.string_measures.measures.len(),
        complex = config.complex_measures.measures.len(),
        "Loaded measures configuration"
    );
    Ok(config)
}

/// Load the measures configuration named by `MEASURES_CONFIG_PATH`, then the
/// usual relative locations, then the built-in default
pub fn load_measures_config_from_env() -> AppResult<MeasuresConfig> {
    if let Ok(config_path) = std::env::var("MEASURES_CONFIG_PATH") {
        info!(
            "Loading measures config from environment variable: {}",
            config_path
        );
        return load_measures_config(config_path);
    }

    for candidate in ["config/measures.json", "../config/measures.json"] {
        if Path::new(candidate).exists() {
            return load_measures_config(candidate);
        }
    }

    warn!("No measures config file found, using built-in configuration");
    MeasuresConfig::builtin()
}
