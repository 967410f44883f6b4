//! # Text Features
//!
//! A [`TextFeature`] reads standardized values out of a text so two texts can
//! be compared by value rather than by wording. Numeric features rescale every
//! occurrence into the canonical unit, label features map every occurrence to
//! its unit name, and complex features (see [`crate::complex_features`])
//! implement their own parsing.
//!
//! Features are created once from configuration by the [`FeatureRegistry`] and
//! shared read-only by every record validation.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::ops::Range;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::complex_features::{ComplexConcentration, ComplexDimension};
use crate::errors::{AppError, AppResult};
use crate::feature_validator::ValidatedFeature;
use crate::measure::{Measure, MeasureKind, MeasureUnit};
use crate::measures_config::{MeasureRecord, MeasuresConfig};
use crate::pattern::{format_decimal, parse_numeral};

/// A standardized value, comparable across texts
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FeatureValue {
    /// Quantity in the canonical unit of its measure
    Numeric(Decimal),
    /// Canonical label of a categorical unit
    Label(String),
    /// Order-insensitive set of sizes, in metres
    Dimensions(BTreeSet<Decimal>),
}

impl FeatureValue {
    /// Numeric value with trailing zeros removed, so `10.0` equals `10`
    pub fn numeric(value: Decimal) -> Self {
        FeatureValue::Numeric(value.normalize())
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Numeric(value) => write!(f, "{}", format_decimal(*value)),
            FeatureValue::Label(label) => write!(f, "{}", label),
            FeatureValue::Dimensions(values) => {
                let parts: Vec<String> = values.iter().map(|v| format_decimal(*v)).collect();
                write!(f, "{}", parts.join("x"))
            }
        }
    }
}

pub type FeatureValues = BTreeSet<FeatureValue>;

/// A feature that can be read out of free text
pub trait TextFeature: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Every standardized value found in `text`
    fn extract(&self, text: &str) -> FeatureValues {
        self.extract_consuming(text).0
    }

    /// Same as [`TextFeature::extract`], also returning `text` with every
    /// matched span blanked out so later features cannot read it again
    fn extract_consuming(&self, text: &str) -> (FeatureValues, String);
}

/// Replace each byte range with two spaces. Ranges must be sorted and disjoint.
pub fn blank_spans(text: &str, spans: &[Range<usize>]) -> String {
    let mut blanked = String::with_capacity(text.len());
    let mut last = 0;
    for span in spans {
        if span.start < last || span.end > text.len() {
            continue;
        }
        blanked.push_str(&text[last..span.start]);
        blanked.push_str("  ");
        last = span.end;
    }
    blanked.push_str(&text[last..]);
    blanked
}

/// Unit-by-unit scan: each unit reads the text left by the previous one
fn scan_units<F>(units: &[MeasureUnit], text: &str, mut standardize: F) -> (FeatureValues, String)
where
    F: FnMut(&MeasureUnit, &str) -> Option<FeatureValue>,
{
    let mut values = FeatureValues::new();
    let mut remaining = text.to_string();
    for unit in units {
        let occurrences = unit.occurrences(&remaining);
        if occurrences.is_empty() {
            continue;
        }
        let mut spans = Vec::with_capacity(occurrences.len());
        for (raw, span) in occurrences {
            if let Some(value) = standardize(unit, raw) {
                values.insert(value);
            }
            spans.push(span);
        }
        remaining = blank_spans(&remaining, &spans);
    }
    (values, remaining)
}

/// Numbers with units, standardized as `value * ratio`
#[derive(Debug, Clone)]
pub struct NumericFeature {
    measure: Measure,
}

impl NumericFeature {
    pub fn new(measure: Measure) -> Self {
        Self { measure }
    }

    pub fn from_record(record: &MeasureRecord) -> AppResult<Self> {
        Ok(Self::new(Measure::from_record(record, MeasureKind::Numeric)?))
    }
}

impl TextFeature for NumericFeature {
    fn name(&self) -> &str {
        &self.measure.name
    }

    fn extract_consuming(&self, text: &str) -> (FeatureValues, String) {
        let name = &self.measure.name;
        scan_units(self.measure.units(), text, |unit, raw| {
            let value = parse_numeral(raw)?;
            match value.checked_mul(unit.ratio) {
                Some(standard) => Some(FeatureValue::numeric(standard)),
                None => {
                    warn!(feature = %name, unit = %unit.name, raw = %raw, "Standardization overflow");
                    None
                }
            }
        })
    }
}

/// Categorical labels, standardized to the matching unit's name
#[derive(Debug, Clone)]
pub struct LabelFeature {
    measure: Measure,
}

impl LabelFeature {
    pub fn new(measure: Measure) -> Self {
        Self { measure }
    }

    pub fn from_record(record: &MeasureRecord) -> AppResult<Self> {
        Ok(Self::new(Measure::from_record(record, MeasureKind::Label)?))
    }
}

impl TextFeature for LabelFeature {
    fn name(&self) -> &str {
        &self.measure.name
    }

    fn extract_consuming(&self, text: &str) -> (FeatureValues, String) {
        scan_units(self.measure.units(), text, |unit, _| {
            Some(FeatureValue::Label(unit.name.clone()))
        })
    }
}

/// Constructor of a complex feature
pub type ComplexFactory = fn() -> AppResult<Box<dyn TextFeature>>;

/// Creates features from configuration; complex features are looked up by name
pub struct FeatureRegistry {
    complex: HashMap<String, ComplexFactory>,
}

impl Default for FeatureRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(ComplexDimension::NAME, ComplexDimension::boxed);
        registry.register(ComplexConcentration::NAME, ComplexConcentration::boxed);
        registry
    }
}

impl FeatureRegistry {
    /// Registry without any complex feature
    pub fn empty() -> Self {
        Self {
            complex: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: &str, factory: ComplexFactory) {
        self.complex.insert(name.to_string(), factory);
    }

    pub fn complex_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.complex.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn create_complex(&self, name: &str) -> AppResult<Box<dyn TextFeature>> {
        let factory = self.complex.get(name).ok_or_else(|| {
            AppError::Config(format!(
                "unknown complex measure '{}', known: {}",
                name,
                self.complex_names().join(", ")
            ))
        })?;
        factory()
    }

    /// Every feature whose validator block is enabled, numeric and string
    /// measures first, complex measures last
    pub fn generate(&self, config: &MeasuresConfig) -> AppResult<Vec<ValidatedFeature>> {
        let mut features = Vec::new();

        if config.numeric_measures.use_it {
            for record in enabled(&config.numeric_measures.measures) {
                let feature = NumericFeature::from_record(record)?;
                features.push(ValidatedFeature::from_settings(
                    Box::new(feature),
                    &record.feature_validator,
                )?);
            }
        }

        if config.string_measures.use_it {
            for record in enabled(&config.string_measures.measures) {
                let feature = LabelFeature::from_record(record)?;
                features.push(ValidatedFeature::from_settings(
                    Box::new(feature),
                    &record.feature_validator,
                )?);
            }
        }

        if config.complex_measures.use_it {
            for record in &config.complex_measures.measures {
                if !record.feature_validator.use_it {
                    continue;
                }
                let feature = self.create_complex(&record.measure_name)?;
                features.push(ValidatedFeature::from_settings(feature, &record.feature_validator)?);
            }
        }

        for feature in &features {
            debug!(
                feature = %feature.feature.name(),
                validation_mode = ?feature.validation_mode,
                not_found_mode = ?feature.not_found_mode,
                priority = feature.priority,
                "Feature generated"
            );
        }
        info!(
            config_name = %config.config_name,
            features = features.len(),
            "Validation features generated"
        );
        Ok(features)
    }
}

fn enabled(records: &[MeasureRecord]) -> impl Iterator<Item = &MeasureRecord> {
    records.iter().filter(|r| r.feature_validator.use_it)
}
