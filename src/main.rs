use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use product_matcher::batch::{ExecutionMode, RecordPair};
use product_matcher::config::{MatcherConfig, Pipeline};
use product_matcher::errors::{error_logging, AppError};
use product_matcher::extraction::Measures;
use product_matcher::feature_validator::FeatureValidator;
use product_matcher::fuzzy_config::{load_fuzzy_config, FuzzyConfig};
use product_matcher::fuzzy_validator::FuzzyValidator;
use product_matcher::measures_config::{load_measures_config, MeasuresConfig};
use product_matcher::observability;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

/// One output row: the input record followed by the pipeline result
#[derive(Serialize)]
struct Row<'a, T: Serialize> {
    #[serde(flatten)]
    record: &'a RecordPair,
    #[serde(flatten)]
    result: T,
}

fn read_input(path: Option<&Path>) -> Result<String> {
    let content = match path {
        Some(path) => fs::read_to_string(path).map_err(|e| {
            error_logging::log_filesystem_error(&e, "read_input", path.to_str(), None);
            AppError::FileSystem(format!("cannot read {}: {}", path.display(), e))
        })?,
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };
    Ok(content)
}

fn parse_records<T: DeserializeOwned>(content: &str) -> Result<Vec<T>> {
    let records = serde_json::from_str(content)
        .map_err(|e| AppError::Input(format!("input must be a JSON array of records: {}", e)))?;
    Ok(records)
}

fn write_output<T: Serialize>(path: Option<&Path>, rows: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(rows)?;
    match path {
        Some(path) => fs::write(path, rendered).map_err(|e| {
            error_logging::log_filesystem_error(&e, "write_output", path.to_str(), None);
            AppError::FileSystem(format!("cannot write {}: {}", path.display(), e))
        })?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

fn measures_config(config: &MatcherConfig) -> Result<MeasuresConfig> {
    let measures = match &config.measures_config_path {
        Some(path) => load_measures_config(path)?,
        None => MeasuresConfig::builtin()?,
    };
    Ok(measures)
}

fn fuzzy_config(config: &MatcherConfig) -> Result<FuzzyConfig> {
    let fuzzy = match &config.fuzzy_config_path {
        Some(path) => load_fuzzy_config(path)?,
        None => FuzzyConfig::builtin()?,
    };
    Ok(fuzzy)
}

fn run_features(config: &MatcherConfig, content: &str, executor: &ExecutionMode) -> Result<Value> {
    let validator = FeatureValidator::from_config(&measures_config(config)?, config.feature_options())?;
    let pairs: Vec<RecordPair> = parse_records(content)?;

    let _span = observability::pipeline_span("features", pairs.len()).entered();
    let results = validator.validate_batch(&pairs, executor);
    let rows: Vec<Row<_>> = pairs
        .iter()
        .zip(results)
        .map(|(record, result)| Row { record, result })
        .collect();
    Ok(serde_json::to_value(rows)?)
}

fn run_fuzzy(config: &MatcherConfig, content: &str, executor: &ExecutionMode) -> Result<Value> {
    let validator = FuzzyValidator::new(
        &fuzzy_config(config)?,
        config.fuzzy_threshold,
        config.validation_threshold,
    )?
    .with_debug(config.fuzzy_debug);
    let pairs: Vec<RecordPair> = parse_records(content)?;

    let _span = observability::pipeline_span("fuzzy", pairs.len()).entered();
    let results = validator.validate_batch(&pairs, executor);
    let rows: Vec<Row<_>> = pairs
        .iter()
        .zip(results)
        .map(|(record, result)| Row { record, result })
        .collect();
    Ok(serde_json::to_value(rows)?)
}

fn run_autosem(config: &MatcherConfig, content: &str, executor: &ExecutionMode) -> Result<Value> {
    let measures = Measures::from_config(&measures_config(config)?)?;
    let texts: Vec<String> = parse_records(content)?;

    let _span = observability::pipeline_span("autosem", texts.len()).entered();
    let extractions = measures.extract_all(texts.as_slice(), executor);
    let combined = Measures::concat_patterns(&extractions);

    let rows: Vec<Value> = texts
        .iter()
        .zip(extractions.iter().zip(combined))
        .map(|(text, (extraction, pattern))| {
            let mut row = Map::new();
            row.insert("text".to_string(), Value::String(text.clone()));
            for measure in &extraction.measures {
                for (column, rendered) in measure.columns() {
                    row.insert(column, Value::String(rendered));
                }
            }
            row.insert("pattern".to_string(), Value::String(pattern.to_string()));
            Value::Object(row)
        })
        .collect();
    Ok(Value::Array(rows))
}

fn main() -> Result<()> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    let config = MatcherConfig::from_env()?;
    observability::init_tracing(&config.observability)?;
    info!(config = %config.summary(), "Configuration loaded");

    let content = read_input(config.input.as_deref())?;
    let start = Instant::now();

    let output = match config.pipeline {
        Pipeline::Features => run_features(&config, &content, &config.execution)?,
        Pipeline::Fuzzy => run_fuzzy(&config, &content, &config.execution)?,
        Pipeline::Autosem => run_autosem(&config, &content, &config.execution)?,
    };

    write_output(config.output.as_deref(), &output)?;
    info!(
        pipeline = %config.pipeline,
        duration_ms = start.elapsed().as_millis(),
        "Pipeline finished"
    );
    Ok(())
}
