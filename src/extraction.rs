//! # Feature Extraction
//!
//! Scans text columns for configured measures and compiles, per record, the
//! pattern a counterpart text has to satisfy.
//!
//! The per-unit steps are [`Measure::extract`], [`Measure::filter_count`] and
//! [`Measure::transform`]. [`Measures`] runs them for every enabled measure
//! and concatenates the results into one pattern per record.

use std::time::Instant;

use tracing::{debug, info, trace, warn};

use crate::batch::Executor;
use crate::errors::{AppError, AppResult};
use crate::measure::{Measure, MeasureKind};
use crate::measures_config::MeasuresConfig;
use crate::pattern::{compile_label, compile_value, parse_numeral, MatchPattern};

/// Pattern compiled for one unit of one record
#[derive(Debug, Clone)]
pub struct UnitPattern {
    pub unit: String,
    pub pattern: MatchPattern,
}

/// Every unit column of one measure for one record
#[derive(Debug, Clone)]
pub struct MeasureExtraction {
    pub measure: String,
    pub units: Vec<UnitPattern>,
    /// Present only when no unit found anything and the measure excludes bare counts
    pub exclude: MatchPattern,
}

impl MeasureExtraction {
    /// Name of the exclude column of a measure
    pub fn exclude_column(measure: &str) -> String {
        format!("Exclude {}", measure)
    }

    /// All unit columns and the exclude column joined as one conjunction
    pub fn combined(&self) -> MatchPattern {
        let mut combined = MatchPattern::new();
        for unit in &self.units {
            combined.extend(unit.pattern.clone());
        }
        combined.extend(self.exclude.clone());
        combined
    }

    /// `(column name, rendered pattern)` pairs in column order
    pub fn columns(&self) -> Vec<(String, String)> {
        let mut columns: Vec<(String, String)> = self
            .units
            .iter()
            .map(|u| (u.unit.clone(), u.pattern.as_pattern_string()))
            .collect();
        if !self.exclude.is_empty() {
            columns.push((
                Self::exclude_column(&self.measure),
                self.exclude.as_pattern_string(),
            ));
        }
        columns
    }
}

/// Extraction result of every measure for one record
#[derive(Debug, Clone, Default)]
pub struct RecordExtraction {
    pub measures: Vec<MeasureExtraction>,
}

impl RecordExtraction {
    /// Final per-record requirement: conjunction of every column
    pub fn combined(&self) -> MatchPattern {
        let mut combined = MatchPattern::new();
        for measure in &self.measures {
            combined.extend(measure.combined());
        }
        combined
    }
}

impl Measure {
    /// Raw value texts of the unit at `unit_index` for each record, in
    /// occurrence order
    pub fn extract<S: AsRef<str>>(&self, unit_index: usize, texts: &[S]) -> Vec<Vec<String>> {
        texts
            .iter()
            .map(|text| self.extract_one(unit_index, text.as_ref()))
            .collect()
    }

    fn extract_one(&self, unit_index: usize, text: &str) -> Vec<String> {
        match self.unit(unit_index) {
            Some(unit) => unit
                .occurrences(text)
                .into_iter()
                .map(|(value, _)| value.to_string())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Keep at most the unit's `max_count` values per record, in discovery order
    pub fn filter_count(&self, unit_index: usize, values: Vec<Vec<String>>) -> Vec<Vec<String>> {
        let max_count = self.unit(unit_index).and_then(|u| u.max_count);
        values
            .into_iter()
            .map(|mut record| {
                if let Some(max) = max_count {
                    record.truncate(max);
                }
                record
            })
            .collect()
    }

    /// Compile one pattern per record from its extracted values
    pub fn transform(&self, unit_index: usize, values: &[Vec<String>]) -> Vec<MatchPattern> {
        values
            .iter()
            .map(|record| self.transform_one(unit_index, record))
            .collect()
    }

    fn transform_one(&self, unit_index: usize, values: &[String]) -> MatchPattern {
        if values.is_empty() {
            return MatchPattern::new();
        }

        match self.kind {
            MeasureKind::Label => match compile_label(self, unit_index) {
                Ok(clause) => std::iter::once(clause).collect(),
                Err(e) => {
                    warn!(measure = %self.name, error = %e, "Label pattern skipped");
                    MatchPattern::new()
                }
            },
            MeasureKind::Numeric => values
                .iter()
                .filter_map(|raw| {
                    let Some(value) = parse_numeral(raw) else {
                        debug!(measure = %self.name, raw = %raw, "Malformed numeral dropped");
                        return None;
                    };
                    compile_value(self, unit_index, value)
                        .map_err(|e| {
                            warn!(measure = %self.name, value = %value, error = %e, "Value pattern skipped");
                        })
                        .ok()
                })
                .collect(),
        }
    }

    /// Run extract, filter_count and transform for every unit of one record
    pub fn extract_record(&self, text: &str) -> MeasureExtraction {
        let units: Vec<UnitPattern> = (0..self.units().len())
            .map(|index| {
                let mut values = self.extract_one(index, text);
                if let Some(max) = self.units()[index].max_count {
                    values.truncate(max);
                }
                UnitPattern {
                    unit: self.units()[index].name.clone(),
                    pattern: self.transform_one(index, &values),
                }
            })
            .collect();

        let found: usize = units.iter().map(|u| u.pattern.clauses().len()).sum();
        crate::observability::record_extraction_metrics(&self.name, found);

        let nothing_found = found == 0;
        let exclude = match self.exclude_clause() {
            Some(clause) if nothing_found => std::iter::once(clause.clone()).collect(),
            _ => MatchPattern::new(),
        };

        trace!(
            measure = %self.name,
            found = units.iter().filter(|u| !u.pattern.is_empty()).count(),
            excluded = !exclude.is_empty(),
            "Record extracted"
        );

        MeasureExtraction {
            measure: self.name.clone(),
            units,
            exclude,
        }
    }
}

/// Every measure enabled for extraction
#[derive(Debug, Clone)]
pub struct Measures {
    measures: Vec<Measure>,
}

impl Measures {
    pub fn new(measures: Vec<Measure>) -> Self {
        Self { measures }
    }

    /// Build numeric and string measures whose extractor block is enabled
    pub fn from_config(config: &MeasuresConfig) -> AppResult<Self> {
        let mut measures = Vec::new();
        for (group, kind) in [
            (&config.numeric_measures, MeasureKind::Numeric),
            (&config.string_measures, MeasureKind::Label),
        ] {
            if !group.use_it {
                continue;
            }
            for record in group.measures.iter().filter(|m| m.autosem.use_it) {
                measures.push(Measure::from_record(record, kind)?);
            }
        }

        info!(
            config_name = %config.config_name,
            measures = measures.len(),
            "Extraction measures built"
        );
        Ok(Self { measures })
    }

    pub fn names(&self) -> Vec<&str> {
        self.measures.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Measure> {
        self.measures.iter().find(|m| m.name == name)
    }

    pub fn len(&self) -> usize {
        self.measures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measures.is_empty()
    }

    /// Combined pattern of a single measure for each record
    pub fn extract_measure<S: AsRef<str>>(&self, texts: &[S], name: &str) -> AppResult<Vec<MatchPattern>> {
        let measure = self
            .get(name)
            .ok_or_else(|| AppError::Config(format!("unknown measure '{}'", name)))?;
        Ok(texts
            .iter()
            .map(|text| measure.extract_record(text.as_ref()).combined())
            .collect())
    }

    /// Every measure for one record
    pub fn extract_record(&self, text: &str) -> RecordExtraction {
        RecordExtraction {
            measures: self.measures.iter().map(|m| m.extract_record(text)).collect(),
        }
    }

    /// Every measure for every record, driven by `executor`
    pub fn extract_all<S, E>(&self, texts: &[S], executor: &E) -> Vec<RecordExtraction>
    where
        S: AsRef<str> + Sync,
        E: Executor,
    {
        let start = Instant::now();
        let extracted = executor.map(texts, |text| self.extract_record(text.as_ref()));
        let with_pattern = extracted.iter().filter(|r| !r.combined().is_empty()).count();

        crate::observability::record_pipeline_metrics(
            "extraction",
            extracted.len(),
            with_pattern,
            start.elapsed(),
        );
        info!(
            records = extracted.len(),
            with_pattern = with_pattern,
            duration_ms = start.elapsed().as_millis(),
            "Extraction finished"
        );
        extracted
    }

    /// Final conjunction of all columns for each record
    pub fn concat_patterns(extractions: &[RecordExtraction]) -> Vec<MatchPattern> {
        extractions.iter().map(RecordExtraction::combined).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Sequential;
    use crate::measure::{MeasureUnit, MergeMode, SearchMode};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn pieces(max_count: Option<usize>, exclude: bool) -> Measure {
        let piece = MeasureUnit::new(
            MeasureKind::Numeric,
            "pieces",
            r"шт\.?",
            Decimal::ONE,
            r"(?:^|[^\d.,]|[^\d][.,])",
            r"(?:[^\w]|$)",
            max_count,
            SearchMode::Behind,
            r"\d*[.,]?\d+",
        )
        .unwrap();
        let numero = MeasureUnit::new(
            MeasureKind::Numeric,
            "numero",
            "№",
            Decimal::ONE,
            r"(?:^|[^\w])",
            r"(?:[.,]?(?:[^\d.,]|$))",
            max_count,
            SearchMode::Front,
            r"\d*[.,]?\d+",
        )
        .unwrap();
        Measure::new("Quantity", MeasureKind::Numeric, MergeMode::Overall, exclude, vec![piece, numero])
            .unwrap()
    }

    fn colors() -> Measure {
        let color = |name: &str, designation: &str| {
            MeasureUnit::new(
                MeasureKind::Label,
                name,
                designation,
                Decimal::ONE,
                r"(?:^|[^\w])",
                "",
                None,
                SearchMode::Behind,
                "",
            )
            .unwrap()
        };
        Measure::new(
            "Color",
            MeasureKind::Label,
            MergeMode::None,
            false,
            vec![color("Red", r"red|красн"), color("Blue", r"blue|син")],
        )
        .unwrap()
    }

    #[test]
    fn test_extract_in_occurrence_order() {
        let measure = pieces(None, false);
        let values = measure.extract(0, &["Мандарин 10шт и 3 шт.", "Без количества"]);
        assert_eq!(values, vec![vec!["10".to_string(), "3".to_string()], vec![]]);
    }

    #[test]
    fn test_filter_count_keeps_first_values() {
        let measure = pieces(Some(1), false);
        let values = measure.extract(0, &["10шт 3шт 5шт"]);
        assert_eq!(measure.filter_count(0, values), vec![vec!["10".to_string()]]);

        let unlimited = pieces(None, false);
        let values = unlimited.extract(0, &["10шт 3шт 5шт"]);
        assert_eq!(unlimited.filter_count(0, values)[0].len(), 3);
    }

    #[test]
    fn test_transform_empty_is_identity() {
        let measure = pieces(None, false);
        let patterns = measure.transform(0, &[vec![]]);
        assert!(patterns[0].is_empty());
        assert_eq!(patterns[0].as_pattern_string(), "");
    }

    #[test]
    fn test_transform_drops_malformed_numerals() {
        let measure = pieces(None, false);
        let patterns = measure.transform(0, &[vec!["1.2.3".to_string(), "10".to_string()]]);
        assert_eq!(patterns[0].clauses().len(), 1);
    }

    #[test]
    fn test_numero_equivalence() {
        let measure = pieces(None, false);
        let pattern = measure.extract_record("Количество №10").combined();
        assert!(pattern.is_match("Количество 10шт"));
        assert!(!pattern.is_match("Количество 100шт"));

        let pattern = measure.extract_record("Количество 10шт").combined();
        assert!(pattern.is_match("Количество №10"));
        assert!(!pattern.is_match("Количество №10.5"));
    }

    #[test]
    fn test_each_value_is_a_separate_requirement() {
        let measure = pieces(None, false);
        let pattern = measure.extract_record("Вода 6шт 2шт").combined();
        assert!(pattern.is_match("2шт воды, 6шт"));
        assert!(!pattern.is_match("6шт воды"));
    }

    #[test]
    fn test_exclude_only_without_values() {
        let measure = pieces(None, true);

        let without = measure.extract_record("Мандарин");
        assert!(!without.exclude.is_empty());
        assert!(without.combined().is_match("Мандарин"));
        assert!(without.combined().is_match("Мандарин 1шт"));
        assert!(!without.combined().is_match("Мандарин 12шт"));
        assert_eq!(without.columns().last().unwrap().0, "Exclude Quantity");

        let with = measure.extract_record("Мандарин 10шт");
        assert!(with.exclude.is_empty());
    }

    #[test]
    fn test_label_measure() {
        let measure = colors();
        let pattern = measure.extract_record("Пальто красное").combined();
        assert_eq!(pattern.clauses().len(), 1);
        assert!(pattern.is_match("Coat red"));
        assert!(!pattern.is_match("Пальто синее"));
    }

    #[test]
    fn test_measures_container() {
        let measures = Measures::new(vec![pieces(None, false), colors()]);
        assert_eq!(measures.names(), vec!["Quantity", "Color"]);

        let extracted = measures.extract_all(&["Пальто синее 2шт", "Пальто"], &Sequential);
        let patterns = Measures::concat_patterns(&extracted);
        assert_eq!(patterns[0].clauses().len(), 2);
        assert!(patterns[0].is_match("2шт синих пальто"));
        assert!(!patterns[0].is_match("2шт красных пальто"));
        assert!(patterns[1].is_empty());

        let single = measures.extract_measure(&["Пальто синее 2шт"], "Color").unwrap();
        assert_eq!(single[0].clauses().len(), 1);
        assert!(measures.extract_measure(&["x"], "Weight").is_err());
    }

    #[test]
    fn test_decimal_parsing_with_comma() {
        let measure = pieces(None, false);
        let values = measure.extract(0, &["1,5шт"]);
        let pattern = &measure.transform(0, &values)[0];
        assert!(pattern.is_match("1.5 шт"));
        assert_eq!(
            parse_numeral(&values[0][0]),
            Some(Decimal::from_str("1.5").unwrap())
        );
    }
}
