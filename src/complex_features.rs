//! Features whose values need more than "number next to a unit".
//!
//! - [`ComplexDimension`]: `10x20x30 см`, `1 м на 50 см`. Parts without a unit
//!   take the unit of the last part that has one, or centimetres.
//! - [`ComplexConcentration`]: `100мг/5мл` or `2%`, both expressed in percent.

use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use tracing::trace;

use crate::errors::AppResult;
use crate::features::{blank_spans, FeatureValue, FeatureValues, TextFeature};
use crate::pattern::parse_numeral;

lazy_static! {
    static ref NUMBER: Regex = Regex::new(r"\d*[.,]?\d+").unwrap();
    static ref DIMENSIONS: Regex = Regex::new(
        r"(?i)\d*[.,]?\d+\s*(?:см|cm|мм|mm|м|m)?(?:\s*(?:[xх]|на)\s*\d*[.,]?\d+\s*(?:см|cm|мм|mm|м|m)?)+(?:\b|$)"
    )
    .unwrap();
    static ref DIMENSION_SEPARATOR: Regex = Regex::new(r"(?i)[xх]|на").unwrap();
    static ref NUMERIC_CONCENTRATION: Regex = Regex::new(
        r"(?i)(?P<top>\d*[.,]?\d+\s*(?:мкг|мг|кг|г)?)\s*[\\/]\s*(?P<bottom>\d*[.,]?\d*\s*(?:мл|л))\b"
    )
    .unwrap();
    static ref PERCENT_CONCENTRATION: Regex = Regex::new(r"(?P<value>\d*[.,]?\d+)\s*%").unwrap();
}

/// Scale of a dimension part in metres. Longer designations are checked first.
fn dimension_scale(part: &str) -> Option<Decimal> {
    let part = part.to_lowercase();
    if part.contains("мм") || part.contains("mm") {
        Some(Decimal::new(1, 3))
    } else if part.contains("см") || part.contains("cm") {
        Some(Decimal::new(1, 2))
    } else if part.contains('м') || part.contains('m') {
        Some(Decimal::ONE)
    } else {
        None
    }
}

/// `a x b [x c ...]` sizes, standardized to an order-insensitive set in metres
#[derive(Debug, Clone, Default)]
pub struct ComplexDimension;

impl ComplexDimension {
    pub const NAME: &'static str = "Complex Dimension";

    pub fn boxed() -> AppResult<Box<dyn TextFeature>> {
        Ok(Box::new(Self))
    }

    /// Standardize one `10x20 см` occurrence
    pub fn standardize(occurrence: &str) -> Option<FeatureValue> {
        let parts: Vec<(Decimal, Option<Decimal>)> = DIMENSION_SEPARATOR
            .split(occurrence)
            .filter_map(|part| {
                let number = NUMBER.find(part)?;
                Some((parse_numeral(number.as_str())?, dimension_scale(part)))
            })
            .collect();
        if parts.len() < 2 {
            return None;
        }

        let fallback = parts
            .iter()
            .rev()
            .find_map(|(_, scale)| *scale)
            .unwrap_or_else(|| Decimal::new(1, 2));

        let values = parts
            .into_iter()
            .filter_map(|(number, scale)| number.checked_mul(scale.unwrap_or(fallback)))
            .map(|v| v.normalize())
            .collect();
        Some(FeatureValue::Dimensions(values))
    }
}

impl TextFeature for ComplexDimension {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn extract_consuming(&self, text: &str) -> (FeatureValues, String) {
        let mut values = FeatureValues::new();
        let mut spans: Vec<Range<usize>> = Vec::new();
        for found in DIMENSIONS.find_iter(text) {
            if let Some(value) = Self::standardize(found.as_str()) {
                trace!(occurrence = %found.as_str(), value = %value, "Dimension standardized");
                values.insert(value);
            }
            spans.push(found.range());
        }
        let rest = blank_spans(text, &spans);
        (values, rest)
    }
}

/// Mass per volume or percent, standardized to percent
#[derive(Debug, Clone, Default)]
pub struct ComplexConcentration;

impl ComplexConcentration {
    pub const NAME: &'static str = "Complex Concentration";

    pub fn boxed() -> AppResult<Box<dyn TextFeature>> {
        Ok(Box::new(Self))
    }

    /// Mass in milligrams. A missing number counts as one, a missing unit as mg.
    fn mass(top: &str) -> Option<Decimal> {
        let top = top.to_lowercase();
        let scale = if top.contains("мкг") {
            Decimal::new(1, 3)
        } else if top.contains("кг") {
            Decimal::from(1_000_000)
        } else if top.contains("мг") {
            Decimal::ONE
        } else if top.contains('г') {
            Decimal::from(1000)
        } else {
            Decimal::ONE
        };
        leading_number(&top)?.checked_mul(scale)
    }

    /// Volume in millilitres
    fn volume(bottom: &str) -> Option<Decimal> {
        let bottom = bottom.to_lowercase();
        let scale = if bottom.contains("мл") {
            Decimal::ONE
        } else {
            Decimal::from(1000)
        };
        leading_number(&bottom)?.checked_mul(scale)
    }

    /// `mg / ml * 0.1` is grams per 100 ml, i.e. percent
    pub fn standardize_numeric(top: &str, bottom: &str) -> Option<FeatureValue> {
        let mass = Self::mass(top)?;
        let volume = Self::volume(bottom)?;
        if volume.is_zero() {
            return None;
        }
        let percent = mass.checked_div(volume)?.checked_mul(Decimal::new(1, 1))?;
        Some(FeatureValue::numeric(percent.round_dp(20)))
    }

    pub fn standardize_percent(value: &str) -> Option<FeatureValue> {
        parse_numeral(value).map(|v| FeatureValue::numeric(v.round_dp(20)))
    }
}

fn leading_number(text: &str) -> Option<Decimal> {
    match NUMBER.find(text) {
        Some(number) => parse_numeral(number.as_str()),
        None => Some(Decimal::ONE),
    }
}

impl TextFeature for ComplexConcentration {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn extract_consuming(&self, text: &str) -> (FeatureValues, String) {
        let mut values = FeatureValues::new();

        let mut spans = Vec::new();
        for caps in NUMERIC_CONCENTRATION.captures_iter(text) {
            let (Some(whole), Some(top), Some(bottom)) =
                (caps.get(0), caps.name("top"), caps.name("bottom"))
            else {
                continue;
            };
            if let Some(value) = Self::standardize_numeric(top.as_str(), bottom.as_str()) {
                values.insert(value);
            }
            spans.push(whole.range());
        }
        let rest = blank_spans(text, &spans);

        let mut spans = Vec::new();
        for caps in PERCENT_CONCENTRATION.captures_iter(&rest) {
            let (Some(whole), Some(value)) = (caps.get(0), caps.name("value")) else {
                continue;
            };
            if let Some(value) = Self::standardize_percent(value.as_str()) {
                values.insert(value);
            }
            spans.push(whole.range());
        }
        let rest = blank_spans(&rest, &spans);

        (values, rest)
    }
}
