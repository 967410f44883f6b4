//! # Test Helper Library
//!
//! Common setup for the integration tests: built-in pipelines, the custom
//! scenario tables and generated cartesian datasets.

#![allow(dead_code)]

use std::str::FromStr;

use product_matcher::extraction::Measures;
use product_matcher::feature_validator::{FeatureValidator, FeatureValidatorOptions};
use product_matcher::fuzzy_config::FuzzyConfig;
use product_matcher::fuzzy_validator::FuzzyValidator;
use product_matcher::measures_config::MeasuresConfig;
use product_matcher::pattern::format_decimal;
use rust_decimal::Decimal;

/// `(client, source, same product)`
pub type Scenario = (&'static str, &'static str, bool);

pub fn builtin_config() -> MeasuresConfig {
    MeasuresConfig::builtin().expect("built-in measures configuration must load")
}

pub fn builtin_validator() -> FeatureValidator {
    FeatureValidator::from_config(&builtin_config(), FeatureValidatorOptions::default())
        .expect("built-in feature validator must build")
}

pub fn builtin_measures() -> Measures {
    Measures::from_config(&builtin_config()).expect("built-in measures must build")
}

pub fn builtin_fuzzy(fuzzy_threshold: f64, validation_threshold: f64) -> FuzzyValidator {
    let config = FuzzyConfig::builtin().expect("built-in fuzzy configuration must load");
    FuzzyValidator::new(&config, fuzzy_threshold, validation_threshold)
        .expect("fuzzy validator must build")
}

/// Whether the pattern compiled from `client` accepts `source`
pub fn autosem_matches(measures: &Measures, client: &str, source: &str) -> bool {
    measures.extract_record(client).combined().is_match(source)
}

pub fn weight_scenarios() -> Vec<Scenario> {
    vec![
        ("Вес 10мкг", "Set of 10 ugly bannies", false),
        ("Вес 10грамм", "Бочка 10 галлонов ", false),
        ("Вес 10грамм", "Порошок 10 гранул", false),
        ("Вес 10грамм", "Set 10game", false),
        ("Вес 10грамм", "Book 10grammar", false),
        ("Вес 10грамм", "Аспирин 10гр/1мл", false),
        ("Вес 10грамм", "Аспирин 10g/2ml", false),
        ("Вес 10мкг", "Аспирин 10мкг\\1мл", false),
        ("Вес 10мг", "Аспирин 10мг\\1мл", false),
        ("Вес 10гр", "Аспирин 10гр\\1мл", false),
        ("Вес 10кг", "Аспирин 10кг\\1мл", false),
        ("Вес 10мкг", "Аспирин 10мкг/1мл", false),
        ("Вес 10мг", "Аспирин 10мг/1мл", false),
        ("Вес 10гр", "Аспирин 10гр/1мл", false),
        ("Вес 10кг", "Аспирин 10кг/1мл", false),
        ("Вес 10грамм", "Вес 10г.", true),
        ("Вес 10грамм", "Вес 10gr", true),
    ]
}

pub fn volume_scenarios() -> Vec<Scenario> {
    vec![
        ("Объем 10 литров", "Набор 10 лимонов", false),
        ("Объем 10 литров", "Movie 10 losers", false),
        ("Объем 10 мл", "Аспирин 1г/10мл", false),
        ("Объем 10 мл", "Аспирин 1г\\10мл", false),
        ("Объем 10 мл", "Аспирин 1г  /10мл", false),
        ("Объем 10 мл", "Аспирин 1г  \\10мл", false),
        ("Объем 10 литров", "Объем 10 litres", true),
        ("Объем 10 литров", "Объем 10 liters", true),
    ]
}

pub fn quantity_scenarios() -> Vec<Scenario> {
    vec![
        ("Количество 10шт", "Column 10", false),
        ("Количество 10шт", "SpaceX 10 rockets", false),
        ("Количество 10шт", "Мех 10 пробы", false),
        ("Количество 10шт", "Сани 10 упряжек", false),
        ("Количество 10шт", "Коробка масла 10 пачули", false),
        ("Количество 10шт", "Количество N10", true),
        ("Количество №10", "Количество 10шт", true),
    ]
}

pub fn memory_capacity_scenarios() -> Vec<Scenario> {
    vec![
        ("Память 1тб", "Память 1000гигабайтов", true),
        ("Память 1тб", "Память 1000000мегабайтов", true),
    ]
}

pub fn concentration_per_dose_scenarios() -> Vec<Scenario> {
    vec![
        ("Лекарство 1001мг/доза", "Лекарство 1г/доза", false),
        ("Лекарство 1001мг\\доза", "Лекарство 1г/доза", false),
    ]
}

pub fn length_scenarios() -> Vec<Scenario> {
    vec![
        ("Длина 10м", "Длина 10мм", false),
        ("Длиан 10м", "Длина 10cm", false),
    ]
}

pub fn all_scenarios() -> Vec<Scenario> {
    let mut scenarios = weight_scenarios();
    scenarios.extend(volume_scenarios());
    scenarios.extend(quantity_scenarios());
    scenarios.extend(memory_capacity_scenarios());
    scenarios.extend(concentration_per_dose_scenarios());
    scenarios.extend(length_scenarios());
    scenarios
}

/// Texts that must not yield any weight
pub fn texts_without_weight() -> Vec<&'static str> {
    vec!["Комплект 10 ugley", "Айфон 10 гигабайт", "Айфон 10 gigabyte"]
}

/// One unit of a generated dataset: canonical ratio and designations
pub struct GeneratedUnit {
    pub ratio: Decimal,
    pub designations: Vec<&'static str>,
}

impl GeneratedUnit {
    pub fn new(ratio: &str, designations: &[&'static str]) -> Self {
        Self {
            ratio: Decimal::from_str(ratio).expect("test ratio must parse"),
            designations: designations.to_vec(),
        }
    }
}

/// A generated product text with the canonical quantity it describes
#[derive(Debug, Clone)]
pub struct GeneratedRecord {
    pub product: String,
    pub canonical: Decimal,
}

/// For every unit taken as base, render the base quantity `multiplier` in
/// every unit and designation. Records of the same base describe the same
/// quantity.
pub fn generate_records(
    units: &[GeneratedUnit],
    product_names: &[&str],
    multiplier: u32,
    backward: bool,
) -> Vec<GeneratedRecord> {
    let mut records = Vec::new();
    for base in units {
        for unit in units {
            let value = base.ratio / unit.ratio * Decimal::from(multiplier);
            let number = format_decimal(value);
            for designation in &unit.designations {
                for name in product_names {
                    let rendered = if backward {
                        format!("{} {}", number, designation)
                    } else {
                        format!("{} {}", designation, number)
                    };
                    records.push(GeneratedRecord {
                        product: format!("{} {}", name, rendered),
                        canonical: (value * unit.ratio).normalize(),
                    });
                }
            }
        }
    }
    records
}

/// Every ordered pair of records with its expected outcome
pub fn cartesian(records: &[GeneratedRecord]) -> Vec<(String, String, bool)> {
    let mut pairs = Vec::with_capacity(records.len() * records.len());
    for client in records {
        for source in records {
            pairs.push((
                client.product.clone(),
                source.product.clone(),
                client.canonical == source.canonical,
            ));
        }
    }
    pairs
}

pub fn weight_units() -> Vec<GeneratedUnit> {
    vec![
        GeneratedUnit::new("0.000001", &["мкг", "ug", "microgram"]),
        GeneratedUnit::new("0.001", &["мг", "mg", "миллиграмм"]),
        GeneratedUnit::new("1", &["г", "гр", "gram"]),
        GeneratedUnit::new("1000", &["кг", "kg", "килограмм"]),
    ]
}

pub fn volume_units() -> Vec<GeneratedUnit> {
    vec![
        GeneratedUnit::new("0.001", &["мл", "ml", "миллилитр", "millilitre"]),
        GeneratedUnit::new("1", &["л", "l", "литров", "liter"]),
    ]
}

/// Counts 1, 10 and 100 written behind and in front of the number
pub fn quantity_records() -> Vec<GeneratedRecord> {
    let mut records = Vec::new();
    for multiplier in [1, 10, 100] {
        records.extend(generate_records(
            &[GeneratedUnit::new("1", &["шт", "пач", "уп"])],
            &["Вода"],
            multiplier,
            true,
        ));
        records.extend(generate_records(
            &[GeneratedUnit::new("1", &["№", "N", "x"])],
            &["Вода"],
            multiplier,
            false,
        ));
    }
    records
}

/// `(designations of one color, ...)`; same group means same color
pub fn color_pairs() -> Vec<(String, String, bool)> {
    let groups: [&[&str]; 3] = [&["красн", "red"], &["син", "blue"], &["зелен", "green"]];
    let mut records = Vec::new();
    for (group, designations) in groups.iter().enumerate() {
        for designation in designations.iter() {
            for name in ["Пальто", "Шляпа"] {
                records.push((format!("{} {}", name, designation), group));
            }
        }
    }

    let mut pairs = Vec::new();
    for (client, client_group) in &records {
        for (source, source_group) in &records {
            pairs.push((client.clone(), source.clone(), client_group == source_group));
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_records_share_canonical_value() {
        let records = generate_records(&weight_units(), &["Аспирин"], 1, true);
        let kg_base: Vec<_> = records
            .iter()
            .filter(|r| r.canonical == Decimal::from(1000))
            .collect();
        assert_eq!(kg_base.len(), 12);
        assert!(records.iter().any(|r| r.product == "Аспирин 1000000000 мкг"));
        assert!(records.iter().any(|r| r.product == "Аспирин 0.000000001 кг"));
    }

    #[test]
    fn test_quantity_records_cover_both_sides() {
        let records = quantity_records();
        assert!(records.iter().any(|r| r.product == "Вода 10 шт"));
        assert!(records.iter().any(|r| r.product == "Вода № 100"));
    }
}
