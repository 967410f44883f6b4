//! # Product Matcher
//!
//! Decides whether two free-text product records describe the same goods.
//!
//! Two pipelines are provided:
//! - feature based: measurements, counts and labels are extracted from both
//!   texts, rescaled to canonical units and compared per feature
//!   ([`feature_validator`]), or compiled into per-record match patterns
//!   ([`extraction`]);
//! - fuzzy: both texts are tokenized and aligned with edit-distance
//!   tolerance, then scored by a weighted ratio ([`fuzzy_validator`]).

pub mod batch;
pub mod complex_features;
pub mod config;
pub mod errors;
pub mod extraction;
pub mod feature_validator;
pub mod features;
pub mod fuzzy;
pub mod fuzzy_config;
pub mod fuzzy_validator;
pub mod measure;
pub mod measures_config;
pub mod observability;
pub mod observability_config;
pub mod pattern;
pub mod ratio;
pub mod tokenizer;

// Re-export types for easier access
pub use batch::{ExecutionMode, Executor, Parallel, RecordPair, Sequential};
pub use errors::{AppError, AppResult};
pub use extraction::Measures;
pub use feature_validator::{FeatureValidator, FeatureValidatorOptions, PairValidation};
pub use fuzzy_validator::{FuzzyResult, FuzzyValidator};
pub use measure::{Measure, MeasureUnit, MergeMode, SearchMode};
pub use pattern::MatchPattern;
