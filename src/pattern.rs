//! # Pattern Compiler
//!
//! Turns a value found under one unit into a matcher that accepts the same
//! quantity written in any linked unit. The numeral is rescaled with exact
//! decimal arithmetic and printed canonically so `10` stays `"10"` and `0.001`
//! stays `"0.001"`.
//!
//! A [`MatchPattern`] is a conjunction of clauses. Each clause is one
//! "somewhere in the text" assertion, so the order of clauses is irrelevant
//! and an empty pattern accepts everything.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use rust_decimal::Decimal;
use tracing::{trace, warn};

use crate::errors::{AppError, AppResult};
use crate::measure::Measure;

/// Fractional digits kept when printing a rescaled value
pub const DECIMAL_PRECISION: u32 = 20;

/// Canonical text of a decimal: no exponent, no trailing zeros, no trailing point
pub fn format_decimal(value: Decimal) -> String {
    value.round_dp(DECIMAL_PRECISION).normalize().to_string()
}

/// Regex text for a numeral, accepting either decimal separator
pub fn numeral_pattern(value: Decimal) -> String {
    format_decimal(value).replace('.', "[.,]")
}

/// Parse a numeral captured from text. `,` and `.` are both decimal separators.
pub fn parse_numeral(raw: &str) -> Option<Decimal> {
    let mut text = raw.trim().replace(',', ".");
    if text.starts_with('.') {
        text.insert(0, '0');
    }
    if text.is_empty() || text.matches('.').count() > 1 {
        return None;
    }
    Decimal::from_str(&text).ok()
}

/// `value` expressed in a unit of ratio `to`, when given in a unit of ratio `from`
pub fn rescale(value: Decimal, from: Decimal, to: Decimal) -> Option<Decimal> {
    value.checked_mul(from)?.checked_div(to)
}

/// One zero-width assertion of a [`MatchPattern`]
#[derive(Debug, Clone)]
pub struct Clause {
    source: String,
    regex: Regex,
    negated: bool,
}

impl Clause {
    /// Clause requiring `source` to occur somewhere in the text
    pub fn require(source: impl Into<String>) -> AppResult<Self> {
        Self::build(source.into(), false)
    }

    /// Clause forbidding `source` anywhere in the text
    pub fn forbid(source: impl Into<String>) -> AppResult<Self> {
        Self::build(source.into(), true)
    }

    fn build(source: String, negated: bool) -> AppResult<Self> {
        let regex = Regex::new(&format!("(?i){}", source))
            .map_err(|e| AppError::Config(format!("pattern does not compile: {}", e)))?;
        Ok(Self {
            source,
            regex,
            negated,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text) != self.negated
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "^(?!.*({}))", self.source)
        } else {
            write!(f, "(?=.*({}))", self.source)
        }
    }
}

/// Conjunction of clauses compiled for one record
#[derive(Debug, Clone, Default)]
pub struct MatchPattern {
    clauses: Vec<Clause>,
}

impl MatchPattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    /// Append every clause of `other`
    pub fn extend(&mut self, other: MatchPattern) {
        self.clauses.extend(other.clauses);
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// True when every clause holds. Texts are padded with whitespace first,
    /// mirroring how validated records are prepared.
    pub fn is_match(&self, text: &str) -> bool {
        if self.clauses.is_empty() {
            return true;
        }
        let padded = pad(text);
        self.clauses.iter().all(|clause| clause.is_match(&padded))
    }

    /// Render as a single look-ahead pattern string for export
    pub fn as_pattern_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MatchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for clause in &self.clauses {
            write!(f, "{}", clause)?;
        }
        Ok(())
    }
}

impl FromIterator<Clause> for MatchPattern {
    fn from_iter<I: IntoIterator<Item = Clause>>(iter: I) -> Self {
        Self {
            clauses: iter.into_iter().collect(),
        }
    }
}

/// Surround a text with blanks so boundary fragments always have a character
/// to consume
pub fn pad(text: &str) -> String {
    format!("  {}   ", text)
}

/// Disjunction over every unit linked to `unit_index`, each with `value`
/// rescaled into it. Linked units whose rescale overflows are left out.
pub fn compile_value(measure: &Measure, unit_index: usize, value: Decimal) -> AppResult<Clause> {
    let origin = measure.unit(unit_index).ok_or_else(|| {
        AppError::Internal(format!(
            "unit index {} out of range for measure '{}'",
            unit_index, measure.name
        ))
    })?;

    let fragments = measure
        .linked_units(unit_index)
        .filter_map(|linked| match rescale(value, origin.ratio, linked.ratio) {
            Some(rescaled) => Some(linked.fragment(&numeral_pattern(rescaled))),
            None => {
                warn!(
                    measure = %measure.name,
                    from = %origin.name,
                    to = %linked.name,
                    value = %value,
                    "Rescale overflow, unit skipped"
                );
                None
            }
        })
        .collect::<Vec<_>>();

    trace!(
        measure = %measure.name,
        unit = %origin.name,
        value = %value,
        fragments = fragments.len(),
        "Compiled value pattern"
    );
    Clause::require(fragments.join("|"))
}

/// Clause requiring the unit's own label pattern
pub fn compile_label(measure: &Measure, unit_index: usize) -> AppResult<Clause> {
    let unit = measure.unit(unit_index).ok_or_else(|| {
        AppError::Internal(format!(
            "unit index {} out of range for measure '{}'",
            unit_index, measure.name
        ))
    })?;
    Clause::require(unit.label_fragment())
}
