//! # Measure Model
//!
//! A [`Measure`] is one family of interchangeable units (weight, volume, ...).
//! Units are kept sorted by ascending canonical ratio and each unit knows the
//! indices of the sibling units it may be rewritten into, as decided by the
//! family's [`MergeMode`].

use std::str::FromStr;

use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::measures_config::{MeasureData, MeasureRecord, UnitRecord};
use crate::pattern::Clause;

/// Bare count of two or more, written before a designation
const BARE_COUNT_BEHIND: &str = r"(?:[0-9][0-9]\d*|[2-9]\d*?)";
/// Bare count of two or more, written after a designation
const BARE_COUNT_FRONT: &str = r"(?:[0-9][0-9]\d*|[2-9]\d*)";

/// Side of the numeral on which a unit designation is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// `10 kg`
    Behind,
    /// `№ 10`
    Front,
}

impl FromStr for SearchMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "behind" => Ok(SearchMode::Behind),
            "front" => Ok(SearchMode::Front),
            other => Err(AppError::Config(format!(
                "unknown search_mode '{}', expected 'behind' or 'front'",
                other
            ))),
        }
    }
}

/// Which sibling units a unit is linked to when compiling patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    None,
    Overall,
    Window(usize),
}

impl FromStr for MergeMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mode = s.trim().to_lowercase();
        match mode.as_str() {
            "none" => Ok(MergeMode::None),
            "overall" => Ok(MergeMode::Overall),
            other => other.parse::<usize>().map(MergeMode::Window).map_err(|_| {
                AppError::Config(format!(
                    "unknown merge_mode '{}', expected 'none', 'overall' or a window size",
                    other
                ))
            }),
        }
    }
}

impl MergeMode {
    /// Accepts the string forms as well as a bare JSON integer window
    pub fn from_value(value: &Value) -> AppResult<Self> {
        match value {
            Value::String(s) => s.parse(),
            Value::Number(n) => n.as_u64().map(|k| MergeMode::Window(k as usize)).ok_or_else(|| {
                AppError::Config(format!("merge_mode window must be a non-negative integer, got {}", n))
            }),
            other => Err(AppError::Config(format!("unsupported merge_mode {}", other))),
        }
    }

    /// Indices of the units linked to `index` in a ratio-sorted list of `len`
    /// units. The unit itself always comes first, siblings follow in sorted order.
    pub fn linked_indices(&self, index: usize, len: usize) -> Vec<usize> {
        let mut linked = vec![index];
        let siblings: Box<dyn Iterator<Item = usize>> = match *self {
            MergeMode::None => Box::new(std::iter::empty()),
            MergeMode::Overall => Box::new(0..len),
            MergeMode::Window(k) => {
                let low = index.saturating_sub(k);
                let high = index.saturating_add(k).min(len.saturating_sub(1));
                Box::new(low..=high)
            }
        };
        linked.extend(siblings.filter(|&i| i != index));
        linked
    }
}

/// Type tag of a configured measure family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasureKind {
    /// Numbers with units, rescaled between units
    Numeric,
    /// Categorical labels (colors, dosage forms)
    Label,
}

/// One unit of a measure family
#[derive(Debug, Clone)]
pub struct MeasureUnit {
    pub name: String,
    pub designation: String,
    pub ratio: Decimal,
    pub prefix: String,
    pub postfix: String,
    pub max_count: Option<usize>,
    pub search_mode: SearchMode,
    search: Regex,
}

impl MeasureUnit {
    /// Build a unit and its search regex. `value_search` is the numeral
    /// sub-pattern, ignored for label units.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: MeasureKind,
        name: impl Into<String>,
        designation: impl Into<String>,
        ratio: Decimal,
        prefix: impl Into<String>,
        postfix: impl Into<String>,
        max_count: Option<usize>,
        search_mode: SearchMode,
        value_search: &str,
    ) -> AppResult<Self> {
        let name = name.into();
        let designation = designation.into();
        let prefix = prefix.into();
        let postfix = postfix.into();

        if ratio <= Decimal::ZERO {
            return Err(AppError::Config(format!(
                "ratio of unit '{}' must be positive, got {}",
                name, ratio
            )));
        }

        let core = match kind {
            MeasureKind::Label => format!("(?P<value>{})", designation),
            MeasureKind::Numeric => compose(
                search_mode,
                &format!("(?P<value>{})", value_search),
                &designation,
            ),
        };
        let source = format!("(?i){}(?P<core>{}){}", prefix, core, postfix);
        let search = Regex::new(&source).map_err(|e| {
            AppError::Config(format!("search pattern of unit '{}' does not compile: {}", name, e))
        })?;

        Ok(Self {
            name,
            designation,
            ratio,
            prefix,
            postfix,
            max_count,
            search_mode,
            search,
        })
    }

    fn from_record(
        kind: MeasureKind,
        record: &UnitRecord,
        data: &MeasureData,
    ) -> AppResult<Self> {
        Self::new(
            kind,
            record.feature_name.clone(),
            record.defenition.clone(),
            record.ratio()?,
            record.resolved_prefix(data),
            record.resolved_postfix(data),
            record.resolved_max_count(data)?,
            record.search_mode.parse()?,
            data.value_search(),
        )
    }

    /// Pattern fragment for this unit around an already-escaped numeral
    pub fn fragment(&self, numeral: &str) -> String {
        format!(
            "{}{}{}",
            self.prefix,
            compose(self.search_mode, numeral, &self.designation),
            self.postfix
        )
    }

    /// The unit's own context-aware pattern, without a fixed numeral
    pub fn label_fragment(&self) -> String {
        format!("{}(?:{}){}", self.prefix, self.designation, self.postfix)
    }

    /// Every occurrence in `text`, left to right. Yields the captured value
    /// text and the byte range of the numeral+designation core.
    ///
    /// Context fragments consume characters, so the scan restarts right after
    /// each core: a boundary character can close one match and open the next.
    pub fn occurrences<'t>(&self, text: &'t str) -> Vec<(&'t str, std::ops::Range<usize>)> {
        let mut found = Vec::new();
        let mut start = 0;
        while start <= text.len() {
            let Some(caps) = self.search.captures_at(text, start) else {
                break;
            };
            let (Some(value), Some(core)) = (caps.name("value"), caps.name("core")) else {
                break;
            };
            found.push((value.as_str(), core.range()));
            start = if core.end() > start {
                core.end()
            } else {
                match text[start..].chars().next() {
                    Some(c) => start + c.len_utf8(),
                    None => break,
                }
            };
        }
        found
    }
}

/// `numeral\s*(?:designation)` or the mirrored front form
fn compose(search_mode: SearchMode, numeral: &str, designation: &str) -> String {
    match search_mode {
        SearchMode::Behind => format!(r"{}\s*(?:{})", numeral, designation),
        SearchMode::Front => format!(r"(?:{})\s*{}", designation, numeral),
    }
}

/// Source of the exclude clause: a count of two or more next to any designation
fn exclude_source(units: &[MeasureUnit]) -> String {
    let group = |mode: SearchMode| {
        units
            .iter()
            .filter(|u| u.search_mode == mode)
            .map(|u| format!("(?:{})", u.designation))
            .collect::<Vec<_>>()
            .join("|")
    };
    let behind = group(SearchMode::Behind);
    let front = group(SearchMode::Front);

    let mut parts = Vec::new();
    if !behind.is_empty() {
        parts.push(format!(r"{}\s*(?:{})", BARE_COUNT_BEHIND, behind));
    }
    if !front.is_empty() {
        parts.push(format!(r"(?:{})\s*{}", front, BARE_COUNT_FRONT));
    }
    parts.join("|")
}

/// A configured measure family with ratio-sorted, linked units
#[derive(Debug, Clone)]
pub struct Measure {
    pub name: String,
    pub kind: MeasureKind,
    pub merge_mode: MergeMode,
    pub exclude_rx: bool,
    units: Vec<MeasureUnit>,
    links: Vec<Vec<usize>>,
    exclude: Option<Clause>,
}

impl Measure {
    /// Assemble a measure from units in any order
    pub fn new(
        name: impl Into<String>,
        kind: MeasureKind,
        merge_mode: MergeMode,
        exclude_rx: bool,
        mut units: Vec<MeasureUnit>,
    ) -> AppResult<Self> {
        let name = name.into();
        if units.is_empty() {
            return Err(AppError::Config(format!("measure '{}' has no enabled units", name)));
        }

        // stable: equal ratios keep configuration order
        units.sort_by(|a, b| a.ratio.cmp(&b.ratio));
        let links = (0..units.len())
            .map(|i| merge_mode.linked_indices(i, units.len()))
            .collect::<Vec<_>>();
        let exclude = if exclude_rx {
            Some(Clause::forbid(exclude_source(&units))?)
        } else {
            None
        };

        debug!(
            measure = %name,
            units = units.len(),
            merge_mode = ?merge_mode,
            "Measure assembled"
        );

        Ok(Self {
            name,
            kind,
            merge_mode,
            exclude_rx,
            units,
            links,
            exclude,
        })
    }

    /// Build a measure from its configuration record. Disabled units are skipped.
    pub fn from_record(record: &MeasureRecord, kind: MeasureKind) -> AppResult<Self> {
        let data = &record.measure_data;
        let units = data
            .features
            .iter()
            .filter(|unit| unit.use_it)
            .map(|unit| MeasureUnit::from_record(kind, unit, data))
            .collect::<AppResult<Vec<_>>>()?;

        Self::new(
            record.measure_name.clone(),
            kind,
            MergeMode::from_value(&record.autosem.merge_mode)?,
            record.autosem.exclude_rx,
            units,
        )
    }

    pub fn units(&self) -> &[MeasureUnit] {
        &self.units
    }

    pub fn unit(&self, index: usize) -> Option<&MeasureUnit> {
        self.units.get(index)
    }

    /// Negative clause forbidding bare counts of any designation, when enabled
    pub fn exclude_clause(&self) -> Option<&Clause> {
        self.exclude.as_ref()
    }

    /// Units linked to the unit at `index`, the unit itself first
    pub fn linked_units(&self, index: usize) -> impl Iterator<Item = &MeasureUnit> {
        self.links
            .get(index)
            .into_iter()
            .flatten()
            .filter_map(move |&i| self.units.get(i))
    }
}
