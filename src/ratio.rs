//! # Ratio Aggregator
//!
//! Turns the matched and unmatched tokens of one record pair into a single
//! similarity ratio and a verdict.
//!
//! A matched token contributes `weight * quality`, where quality is `1.0` for
//! exact matches and the similarity score for fuzzy ones. The rate function
//! decides which side(s) the ratio is computed over.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::errors::{check_unit_interval, AppError, AppResult};
use crate::fuzzy_config::RatioSettings;
use crate::tokenizer::Token;

/// Which side(s) of a record pair the ratio is computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateFunction {
    /// Matched weight of both sides over the total weight of both sides
    #[default]
    Overall,
    /// Client side only
    Client,
    /// Source side only
    Source,
    /// The lower of the client and source ratios
    Min,
    /// The higher of the client and source ratios
    Max,
}

impl FromStr for RateFunction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "overall" => Ok(RateFunction::Overall),
            "client" => Ok(RateFunction::Client),
            "source" => Ok(RateFunction::Source),
            "min" => Ok(RateFunction::Min),
            "max" => Ok(RateFunction::Max),
            other => Err(AppError::Config(format!(
                "unknown rate_func '{}', expected overall, client, source, min or max",
                other
            ))),
        }
    }
}

impl fmt::Display for RateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RateFunction::Overall => "overall",
            RateFunction::Client => "client",
            RateFunction::Source => "source",
            RateFunction::Min => "min",
            RateFunction::Max => "max",
        };
        write!(f, "{}", name)
    }
}

/// Matched and total weight of one side
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SideWeight {
    pub matched: f64,
    pub total: f64,
}

impl SideWeight {
    pub fn of(tokens: &[Token]) -> Self {
        tokens.iter().fold(Self::default(), |acc, token| Self {
            matched: acc.matched + token.matched_weight(),
            total: acc.total + token.weight,
        })
    }

    /// Zero when the side carries no weight at all
    pub fn ratio(&self) -> f64 {
        if self.total > 0.0 {
            self.matched / self.total
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatioAggregator {
    min_ratio: f64,
    max_ratio: f64,
    min_appearance: usize,
    min_appearance_penalty: f64,
    rate_func: RateFunction,
}

impl Default for RatioAggregator {
    fn default() -> Self {
        Self {
            min_ratio: 0.0,
            max_ratio: 1.0,
            min_appearance: 0,
            min_appearance_penalty: 0.0,
            rate_func: RateFunction::Overall,
        }
    }
}

impl RatioAggregator {
    pub fn new(
        min_ratio: f64,
        max_ratio: f64,
        min_appearance: usize,
        min_appearance_penalty: f64,
        rate_func: RateFunction,
    ) -> AppResult<Self> {
        check_unit_interval("min_ratio", min_ratio)?;
        check_unit_interval("max_ratio", max_ratio)?;
        check_unit_interval("min_appearance_penalty", min_appearance_penalty)?;
        if min_ratio > max_ratio {
            return Err(AppError::Config(format!(
                "min_ratio {} is greater than max_ratio {}",
                min_ratio, max_ratio
            )));
        }
        Ok(Self {
            min_ratio,
            max_ratio,
            min_appearance,
            min_appearance_penalty,
            rate_func,
        })
    }

    pub fn from_settings(settings: &RatioSettings) -> AppResult<Self> {
        Self::new(
            settings.min_ratio,
            settings.max_ratio,
            settings.min_appearance,
            settings.min_appearance_penalty,
            settings.rate_func.parse()?,
        )
    }

    pub fn rate_func(&self) -> RateFunction {
        self.rate_func
    }

    /// Raw ratio before the appearance penalty and clamping
    pub fn raw_ratio(&self, client: &[Token], source: &[Token]) -> f64 {
        let left = SideWeight::of(client);
        let right = SideWeight::of(source);
        match self.rate_func {
            RateFunction::Overall => SideWeight {
                matched: left.matched + right.matched,
                total: left.total + right.total,
            }
            .ratio(),
            RateFunction::Client => left.ratio(),
            RateFunction::Source => right.ratio(),
            RateFunction::Min => left.ratio().min(right.ratio()),
            RateFunction::Max => left.ratio().max(right.ratio()),
        }
    }

    /// Final ratio in `[min_ratio, max_ratio]`
    ///
    /// Short records lose `min_appearance_penalty` unless every token matched
    /// exactly, so identical records always rate `1.0`.
    pub fn ratio(&self, client: &[Token], source: &[Token]) -> f64 {
        let mut ratio = self.raw_ratio(client, source);
        if ratio < 1.0 && client.len().min(source.len()) < self.min_appearance {
            ratio -= self.min_appearance_penalty;
        }
        let ratio = ratio.clamp(self.min_ratio, self.max_ratio);
        trace!(
            rate_func = %self.rate_func,
            client_tokens = client.len(),
            source_tokens = source.len(),
            ratio,
            "Ratio computed"
        );
        ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::{CharClass, MatchStatus};

    fn token(value: &str, weight: f64, status: MatchStatus, quality: f64) -> Token {
        let mut token = Token::new(value, CharClass::Lowercase, None, weight);
        token.status = status;
        token.quality = quality;
        token
    }

    #[test]
    fn test_rate_functions() {
        let client = vec![
            token("a", 1.0, MatchStatus::Exact, 1.0),
            token("b", 1.0, MatchStatus::Unmatched, 0.0),
        ];
        let source = vec![token("a", 2.0, MatchStatus::Exact, 1.0)];

        let rate = |func| RatioAggregator::new(0.0, 1.0, 0, 0.0, func).unwrap();
        assert_eq!(rate(RateFunction::Client).ratio(&client, &source), 0.5);
        assert_eq!(rate(RateFunction::Source).ratio(&client, &source), 1.0);
        assert_eq!(rate(RateFunction::Overall).ratio(&client, &source), 0.75);
        assert_eq!(rate(RateFunction::Min).ratio(&client, &source), 0.5);
        assert_eq!(rate(RateFunction::Max).ratio(&client, &source), 1.0);
    }

    #[test]
    fn test_fuzzy_match_discount() {
        let client = vec![token("молоко", 1.0, MatchStatus::Fuzzy, 0.8)];
        let source = vec![token("малоко", 1.0, MatchStatus::Fuzzy, 0.8)];
        let ratio = RatioAggregator::default().ratio(&client, &source);
        assert!((ratio - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_empty_sides_rate_zero() {
        assert_eq!(RatioAggregator::default().ratio(&[], &[]), 0.0);
    }

    #[test]
    fn test_min_appearance_penalty_and_clamp() {
        let client = vec![token("a", 1.0, MatchStatus::Exact, 1.0)];
        let source = vec![token("a", 1.0, MatchStatus::Exact, 1.0)];
        let penalized = RatioAggregator::new(0.0, 1.0, 2, 0.25, RateFunction::Overall).unwrap();
        assert_eq!(penalized.ratio(&client, &source), 1.0);

        let partial = vec![
            token("a", 1.0, MatchStatus::Exact, 1.0),
            token("b", 2.0, MatchStatus::Unmatched, 0.0),
        ];
        // (1 + 1) / (1 + 3) - 0.25
        assert_eq!(penalized.ratio(&client, &partial), 0.25);
        let typo = vec![token("a", 1.0, MatchStatus::Fuzzy, 0.8)];
        assert!((penalized.ratio(&typo, &typo) - 0.55).abs() < 1e-9);

        let clamped = RatioAggregator::new(0.1, 0.9, 0, 0.0, RateFunction::Overall).unwrap();
        assert_eq!(clamped.ratio(&client, &source), 0.9);
        assert_eq!(clamped.ratio(&[], &[]), 0.1);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            RatioAggregator::new(0.0, 1.5, 0, 0.0, RateFunction::Overall),
            Err(AppError::InvalidThreshold(_))
        ));
        assert!(matches!(
            RatioAggregator::new(0.8, 0.2, 0, 0.0, RateFunction::Overall),
            Err(AppError::Config(_))
        ));
        assert!("median".parse::<RateFunction>().is_err());
    }
}
