//! # Batch Execution
//!
//! Every pipeline exposes a per-record function; an [`Executor`] applies it
//! across a batch. Output order always equals input order.

use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// One client record paired with one source record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPair {
    pub client: String,
    pub source: String,
}

impl RecordPair {
    pub fn new(client: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            source: source.into(),
        }
    }
}

/// Applies a per-record function across a batch, preserving order
pub trait Executor: Send + Sync {
    fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send;
}

/// Runs records one after another on the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential;

impl Executor for Sequential {
    fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        items.iter().map(f).collect()
    }
}

/// Runs records on the rayon thread pool
#[derive(Debug, Clone, Copy, Default)]
pub struct Parallel;

impl Executor for Parallel {
    fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        // indexed parallel iterators collect in input order
        items.par_iter().map(f).collect()
    }
}

/// Executor selected at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Parallel,
}

impl ExecutionMode {
    pub fn from_flag(parallel: bool) -> Self {
        if parallel {
            ExecutionMode::Parallel
        } else {
            ExecutionMode::Sequential
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" | "false" | "0" => Ok(ExecutionMode::Sequential),
            "parallel" | "true" | "1" => Ok(ExecutionMode::Parallel),
            other => Err(AppError::Config(format!("unknown execution mode '{}'", other))),
        }
    }
}

impl Executor for ExecutionMode {
    fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        match self {
            ExecutionMode::Sequential => Sequential.map(items, f),
            ExecutionMode::Parallel => Parallel.map(items, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallel_preserves_order() {
        let items: Vec<u64> = (0..1000).collect();
        let sequential = Sequential.map(&items, |x| x * x);
        let parallel = Parallel.map(&items, |x| x * x);
        assert_eq!(sequential, parallel);
        assert_eq!(parallel[999], 999 * 999);
    }

    #[test]
    fn test_execution_mode_parsing() {
        assert_eq!("parallel".parse::<ExecutionMode>().unwrap(), ExecutionMode::Parallel);
        assert_eq!("false".parse::<ExecutionMode>().unwrap(), ExecutionMode::Sequential);
        assert!("sometimes".parse::<ExecutionMode>().is_err());
        assert_eq!(ExecutionMode::from_flag(true), ExecutionMode::Parallel);
    }

    #[test]
    fn test_record_pair_json() {
        let pair: RecordPair =
            serde_json::from_str(r#"{"client": "Томаты 1кг", "source": "Томаты 1000г"}"#).unwrap();
        assert_eq!(pair, RecordPair::new("Томаты 1кг", "Томаты 1000г"));
    }

    #[test]
    fn test_empty_batch() {
        let items: Vec<String> = Vec::new();
        assert!(ExecutionMode::Parallel.map(&items, |s| s.len()).is_empty());
    }
}
