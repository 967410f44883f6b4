//! # Cross-Record Feature Validator
//!
//! Decides whether a client text and a source text describe the same product
//! by comparing standardized feature values.
//!
//! Features run in ascending priority order. Each one reads its value sets
//! `CI` (client) and `SI` (source) and decides:
//!
//! - both sets empty: the not-found mode decides (strict fails, modest passes);
//! - otherwise the feature passes iff `|CI ∩ SI| == based`, where `based` is
//!   `max`, `min`, `|CI|` or `|SI|` for the strict, modest, client and source
//!   validation modes.
//!
//! The pair is validated only if every feature passes. A failed pair never
//! passes again; with `short_circuit` the remaining features are not even
//! extracted.

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::batch::{Executor, RecordPair};
use crate::errors::{AppError, AppResult};
use crate::features::{FeatureRegistry, FeatureValues, TextFeature};
use crate::measures_config::{MeasuresConfig, ValidatorSettings};
use crate::pattern::pad;

/// How large the client/source intersection has to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Every value on both sides must match
    Strict,
    /// Every value of the smaller side must match
    Modest,
    /// Every client value must match
    Client,
    /// Every source value must match
    Source,
}

impl FromStr for ValidationMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(ValidationMode::Strict),
            "modest" => Ok(ValidationMode::Modest),
            "client" => Ok(ValidationMode::Client),
            "source" => Ok(ValidationMode::Source),
            other => Err(AppError::Config(format!(
                "unknown validation_mode '{}', expected strict, modest, client or source",
                other
            ))),
        }
    }
}

impl ValidationMode {
    /// Required intersection size for sets of `client` and `source` values
    pub fn based(&self, client: usize, source: usize) -> usize {
        match self {
            ValidationMode::Strict => client.max(source),
            ValidationMode::Modest => client.min(source),
            ValidationMode::Client => client,
            ValidationMode::Source => source,
        }
    }
}

/// Outcome when neither side mentions the feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotFoundMode {
    Strict,
    Modest,
}

impl FromStr for NotFoundMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(NotFoundMode::Strict),
            "modest" => Ok(NotFoundMode::Modest),
            other => Err(AppError::Config(format!(
                "unknown not_found_mode '{}', expected strict or modest",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Pass,
    Fail,
}

impl Decision {
    pub fn is_pass(&self) -> bool {
        matches!(self, Decision::Pass)
    }

    /// `1` for pass, `0` for fail
    pub fn as_int(&self) -> u8 {
        u8::from(self.is_pass())
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Pass => write!(f, "pass"),
            Decision::Fail => write!(f, "fail"),
        }
    }
}

/// Decide one feature for one record pair
pub fn decide(
    validation_mode: ValidationMode,
    not_found_mode: NotFoundMode,
    client: &FeatureValues,
    source: &FeatureValues,
) -> Decision {
    if client.is_empty() && source.is_empty() {
        return match not_found_mode {
            NotFoundMode::Strict => Decision::Fail,
            NotFoundMode::Modest => Decision::Pass,
        };
    }

    let based = validation_mode.based(client.len(), source.len());
    let intersect = client.intersection(source).count();
    if intersect == based {
        Decision::Pass
    } else {
        Decision::Fail
    }
}

/// A feature together with its validation policy
#[derive(Debug)]
pub struct ValidatedFeature {
    pub feature: Box<dyn TextFeature>,
    pub validation_mode: ValidationMode,
    pub not_found_mode: NotFoundMode,
    pub priority: i64,
}

impl ValidatedFeature {
    pub fn new(
        feature: Box<dyn TextFeature>,
        validation_mode: ValidationMode,
        not_found_mode: NotFoundMode,
        priority: i64,
    ) -> Self {
        Self {
            feature,
            validation_mode,
            not_found_mode,
            priority,
        }
    }

    pub fn from_settings(feature: Box<dyn TextFeature>, settings: &ValidatorSettings) -> AppResult<Self> {
        Ok(Self::new(
            feature,
            settings.validation_mode.parse()?,
            settings.not_found_mode.parse()?,
            settings.priority,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureValidatorOptions {
    /// Blank out each match so later units and features cannot read it again
    pub consume_matches: bool,
    /// Skip extraction for pairs that already failed
    pub short_circuit: bool,
}

impl Default for FeatureValidatorOptions {
    fn default() -> Self {
        Self {
            consume_matches: true,
            short_circuit: false,
        }
    }
}

/// Per-feature diagnostics of one record pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureDecision {
    pub feature: String,
    pub decision: Decision,
    pub client_values: Vec<String>,
    pub source_values: Vec<String>,
}

/// Outcome for one record pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairValidation {
    pub validated: bool,
    /// First feature that failed, if any
    pub failed_feature: Option<String>,
    /// Every extracted client value rendered as `Feature = value`
    pub client_features: Vec<String>,
    pub source_features: Vec<String>,
    pub decisions: Vec<FeatureDecision>,
}

/// Validates record pairs against an ordered list of features
#[derive(Debug)]
pub struct FeatureValidator {
    features: Vec<ValidatedFeature>,
    options: FeatureValidatorOptions,
}

impl FeatureValidator {
    /// Features are ordered by ascending priority; ties keep their given order
    pub fn new(mut features: Vec<ValidatedFeature>, options: FeatureValidatorOptions) -> Self {
        features.sort_by_key(|f| f.priority);
        Self { features, options }
    }

    /// Build every enabled feature of a configuration
    pub fn from_config(config: &MeasuresConfig, options: FeatureValidatorOptions) -> AppResult<Self> {
        Self::from_config_with_registry(config, &FeatureRegistry::default(), options)
    }

    pub fn from_config_with_registry(
        config: &MeasuresConfig,
        registry: &FeatureRegistry,
        options: FeatureValidatorOptions,
    ) -> AppResult<Self> {
        let features = registry.generate(config)?;
        Ok(Self::new(features, options))
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.feature.name()).collect()
    }

    pub fn options(&self) -> FeatureValidatorOptions {
        self.options
    }

    /// Validate one record pair
    pub fn validate(&self, client: &str, source: &str) -> PairValidation {
        let mut client_text = pad(client);
        let mut source_text = pad(source);

        let mut validated = true;
        let mut failed_feature = None;
        let mut decisions = Vec::with_capacity(self.features.len());
        let mut client_features = Vec::new();
        let mut source_features = Vec::new();

        for spec in &self.features {
            if !validated && self.options.short_circuit {
                break;
            }

            let name = spec.feature.name();
            let (ci, si) = if self.options.consume_matches {
                let (ci, client_rest) = spec.feature.extract_consuming(&client_text);
                let (si, source_rest) = spec.feature.extract_consuming(&source_text);
                client_text = client_rest;
                source_text = source_rest;
                (ci, si)
            } else {
                (spec.feature.extract(&client_text), spec.feature.extract(&source_text))
            };

            let decision = decide(spec.validation_mode, spec.not_found_mode, &ci, &si);
            trace!(
                feature = %name,
                client = ci.len(),
                source = si.len(),
                decision = %decision,
                "Feature decided"
            );

            if validated && !decision.is_pass() {
                validated = false;
                failed_feature = Some(name.to_string());
            }

            client_features.extend(ci.iter().map(|v| format!("{} = {}", name, v)));
            source_features.extend(si.iter().map(|v| format!("{} = {}", name, v)));
            decisions.push(FeatureDecision {
                feature: name.to_string(),
                decision,
                client_values: ci.iter().map(ToString::to_string).collect(),
                source_values: si.iter().map(ToString::to_string).collect(),
            });
        }

        PairValidation {
            validated,
            failed_feature,
            client_features,
            source_features,
            decisions,
        }
    }

    /// Validate a batch of pairs, keeping input order
    pub fn validate_batch<E: Executor>(&self, pairs: &[RecordPair], executor: &E) -> Vec<PairValidation> {
        let start = Instant::now();
        let results = executor.map(pairs, |pair| self.validate(&pair.client, &pair.source));
        let passed = results.iter().filter(|r| r.validated).count();

        crate::observability::record_pipeline_metrics("features", results.len(), passed, start.elapsed());
        debug!(features = ?self.feature_names(), "Feature validation order");
        info!(
            records = results.len(),
            validated = passed,
            duration_ms = start.elapsed().as_millis(),
            "Feature validation finished"
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureValue;
    use rust_decimal::Decimal;

    fn values(items: &[i64]) -> FeatureValues {
        items.iter().map(|v| FeatureValue::numeric(Decimal::from(*v))).collect()
    }

    #[test]
    fn test_based_per_mode() {
        assert_eq!(ValidationMode::Strict.based(2, 3), 3);
        assert_eq!(ValidationMode::Modest.based(2, 3), 2);
        assert_eq!(ValidationMode::Client.based(2, 3), 2);
        assert_eq!(ValidationMode::Source.based(2, 3), 3);
    }

    #[test]
    fn test_not_found_modes() {
        let empty = FeatureValues::new();
        assert_eq!(
            decide(ValidationMode::Strict, NotFoundMode::Strict, &empty, &empty),
            Decision::Fail
        );
        assert_eq!(
            decide(ValidationMode::Strict, NotFoundMode::Modest, &empty, &empty),
            Decision::Pass
        );
    }

    #[test]
    fn test_one_side_empty_is_not_a_not_found_case() {
        let empty = FeatureValues::new();
        let some = values(&[10]);
        assert_eq!(
            decide(ValidationMode::Strict, NotFoundMode::Modest, &some, &empty),
            Decision::Fail
        );
        // min(1, 0) == 0 == |∅|
        assert_eq!(
            decide(ValidationMode::Modest, NotFoundMode::Strict, &some, &empty),
            Decision::Pass
        );
        assert_eq!(
            decide(ValidationMode::Source, NotFoundMode::Strict, &some, &empty),
            Decision::Pass
        );
        assert_eq!(
            decide(ValidationMode::Client, NotFoundMode::Strict, &some, &empty),
            Decision::Fail
        );
    }

    #[test]
    fn test_intersection_rules() {
        let client = values(&[1, 2]);
        let source = values(&[2]);
        assert_eq!(decide(ValidationMode::Strict, NotFoundMode::Strict, &client, &source), Decision::Fail);
        assert_eq!(decide(ValidationMode::Modest, NotFoundMode::Strict, &client, &source), Decision::Pass);
        assert_eq!(decide(ValidationMode::Client, NotFoundMode::Strict, &client, &source), Decision::Fail);
        assert_eq!(decide(ValidationMode::Source, NotFoundMode::Strict, &client, &source), Decision::Pass);
    }

    #[test]
    fn test_unknown_modes_rejected() {
        assert!("lenient".parse::<ValidationMode>().is_err());
        assert!("maybe".parse::<NotFoundMode>().is_err());
        assert_eq!("MODEST".parse::<NotFoundMode>().unwrap(), NotFoundMode::Modest);
    }

    #[test]
    fn test_decision_as_int() {
        assert_eq!(Decision::Pass.as_int(), 1);
        assert_eq!(Decision::Fail.as_int(), 0);
    }
}
