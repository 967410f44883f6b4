//! # Fuzzy Validator
//!
//! End-to-end fuzzy pipeline for one record pair: strip quote and slash
//! symbols, tokenize both sides, drop short and repeated words, align tokens,
//! compute the ratio and compare it with the validation threshold.

use std::time::Instant;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tracing::info;

use crate::batch::{Executor, RecordPair};
use crate::errors::{check_unit_interval, AppResult};
use crate::fuzzy::FuzzyMatcher;
use crate::fuzzy_config::FuzzyConfig;
use crate::ratio::RatioAggregator;
use crate::tokenizer::{preprocess, Token, Tokenizer};

lazy_static! {
    static ref SYMBOLS_TO_DELETE: Regex = Regex::new(r#"['"/]"#).unwrap();
}

pub fn strip_symbols(text: &str) -> String {
    SYMBOLS_TO_DELETE.replace_all(text, "").into_owned()
}

/// Outcome for one record pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuzzyResult {
    pub ratio: f64,
    pub validated: bool,
    pub client_tokens_count: usize,
    pub source_tokens_count: usize,
    /// Annotated tokens, kept only in debug mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_tokens: Option<Vec<Token>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_tokens: Option<Vec<Token>>,
}

#[derive(Debug, Clone)]
pub struct FuzzyValidator {
    tokenizer: Tokenizer,
    word_min_len: usize,
    matcher: FuzzyMatcher,
    aggregator: RatioAggregator,
    validation_threshold: f64,
    debug: bool,
}

impl FuzzyValidator {
    /// Both thresholds must lie in `[0, 1]`
    pub fn new(config: &FuzzyConfig, fuzzy_threshold: f64, validation_threshold: f64) -> AppResult<Self> {
        let validation_threshold = check_unit_interval("validation_threshold", validation_threshold)?;
        Ok(Self {
            tokenizer: Tokenizer::from_config(config)?,
            word_min_len: config.word_min_len,
            matcher: FuzzyMatcher::new(fuzzy_threshold)?,
            aggregator: RatioAggregator::from_settings(&config.ratio)?,
            validation_threshold,
            debug: false,
        })
    }

    /// Keep the annotated tokens in every result
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn validation_threshold(&self) -> f64 {
        self.validation_threshold
    }

    fn tokens(&self, text: &str) -> Vec<Token> {
        preprocess(self.tokenizer.tokenize(&strip_symbols(text)), self.word_min_len)
    }

    pub fn validate(&self, client: &str, source: &str) -> FuzzyResult {
        let mut client_tokens = self.tokens(client);
        let mut source_tokens = self.tokens(source);

        self.matcher.match_tokens(&mut client_tokens, &mut source_tokens);
        let ratio = self.aggregator.ratio(&client_tokens, &source_tokens);

        FuzzyResult {
            ratio,
            validated: ratio >= self.validation_threshold,
            client_tokens_count: client_tokens.len(),
            source_tokens_count: source_tokens.len(),
            client_tokens: self.debug.then_some(client_tokens),
            source_tokens: self.debug.then_some(source_tokens),
        }
    }

    pub fn validate_batch<E: Executor>(&self, pairs: &[RecordPair], executor: &E) -> Vec<FuzzyResult> {
        let start = Instant::now();
        let results = executor.map(pairs, |pair| self.validate(&pair.client, &pair.source));
        let passed = results.iter().filter(|r| r.validated).count();

        crate::observability::record_pipeline_metrics("fuzzy", results.len(), passed, start.elapsed());
        info!(
            records = results.len(),
            validated = passed,
            rate_func = %self.aggregator.rate_func(),
            duration_ms = start.elapsed().as_millis(),
            "Fuzzy validation finished"
        );
        results
    }
}
