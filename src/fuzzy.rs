//! # Fuzzy Token Matcher
//!
//! Aligns client tokens to source tokens. Left tokens are taken in order;
//! each first looks for an exact value among the still unmatched right
//! tokens, then for the most similar token of the whole right list. A fuzzy
//! candidate is accepted when its similarity reaches the threshold, so
//! several left tokens may share one right token through fuzzy matches.
//!
//! Similarity is the normalized Levenshtein similarity scaled to `0..=100`.
//! On equal scores the first right token in order wins, so results are
//! deterministic.

use serde::Serialize;
use tracing::trace;

use crate::errors::{check_unit_interval, AppResult};
use crate::tokenizer::{MatchStatus, Token};

/// Similarity of two token values in `0..=100`
pub fn similarity(left: &str, right: &str) -> f64 {
    strsim::normalized_levenshtein(left, right) * 100.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    pub exact: usize,
    pub fuzzy: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatcher {
    /// Minimum similarity on the `0..=100` scale
    threshold: f64,
}

impl FuzzyMatcher {
    /// `threshold` is given in `[0, 1]`
    pub fn new(threshold: f64) -> AppResult<Self> {
        let threshold = check_unit_interval("fuzzy_threshold", threshold)?;
        Ok(Self {
            threshold: threshold * 100.0,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold / 100.0
    }

    /// Annotate both token lists in place with their matches
    pub fn match_tokens(&self, left: &mut [Token], right: &mut [Token]) -> MatchSummary {
        let mut summary = MatchSummary::default();

        for (li, left_token) in left.iter_mut().enumerate() {
            let exact = right
                .iter()
                .position(|r| !r.is_matched() && r.value == left_token.value);
            if let Some(ri) = exact {
                left_token.mark(MatchStatus::Exact, 1.0, ri);
                right[ri].mark(MatchStatus::Exact, 1.0, li);
                summary.exact += 1;
                continue;
            }

            let mut best: Option<(usize, f64)> = None;
            for (ri, right_token) in right.iter().enumerate() {
                let score = similarity(&left_token.value, &right_token.value);
                if best.map_or(true, |(_, best_score)| score > best_score) {
                    best = Some((ri, score));
                }
            }

            match best {
                Some((ri, score)) if score >= self.threshold => {
                    let quality = score / 100.0;
                    trace!(
                        left = %left_token.value,
                        right = %right[ri].value,
                        score,
                        "Fuzzy token match"
                    );
                    left_token.mark(MatchStatus::Fuzzy, quality, ri);
                    // a right token keeps its first annotation
                    if !right[ri].is_matched() {
                        right[ri].mark(MatchStatus::Fuzzy, quality, li);
                    }
                    summary.fuzzy += 1;
                }
                _ => {}
            }
        }

        summary
    }
}
