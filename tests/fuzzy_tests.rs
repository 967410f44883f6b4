//! # Fuzzy Validation Integration Tests

mod test_helpers;

#[cfg(test)]
mod tests {
    use crate::test_helpers::*;
    use product_matcher::batch::{Parallel, RecordPair, Sequential};
    use product_matcher::errors::AppError;
    use product_matcher::fuzzy_config::FuzzyConfig;
    use product_matcher::fuzzy_validator::FuzzyValidator;
    use product_matcher::tokenizer::MatchStatus;

    #[test]
    fn test_identical_records_score_one() {
        let validator = builtin_fuzzy(0.75, 0.5);
        let text = "Молоко Простоквашино 3,2% 930 мл";
        let result = validator.validate(text, text);

        assert_eq!(result.ratio, 1.0);
        assert!(result.validated);
        assert_eq!(result.client_tokens_count, 5);
        assert_eq!(result.source_tokens_count, 5);
    }

    #[test]
    fn test_disjoint_records_score_zero() {
        let validator = builtin_fuzzy(0.75, 0.5);
        let result = validator.validate("Сок яблочный", "Кабель медный");

        assert_eq!(result.ratio, 0.0);
        assert!(!result.validated);
    }

    #[test]
    fn test_typos_are_tolerated() {
        let validator = builtin_fuzzy(0.75, 0.5);
        let result = validator.validate("Молоко Простоквашино 930 мл", "Малоко Простаквашино 930 мл");

        assert!(result.validated);
        assert!(result.ratio > 0.8 && result.ratio < 1.0, "ratio {}", result.ratio);
    }

    #[test]
    fn test_exact_threshold_rejects_typos() {
        let validator = builtin_fuzzy(1.0, 0.5);
        let result = validator.validate("Молоко Простоквашино 930 мл", "Малоко Простаквашино 930 мл");

        assert!(!result.validated, "ratio {}", result.ratio);
    }

    #[test]
    fn test_identical_records_pass_any_threshold() {
        let texts = [
            "Сок",
            "Сок 1",
            "Молоко Сок",
            "SONY",
            "10",
            "Молоко Простоквашино 3,2% 930 мл",
        ];
        for threshold in [0.0, 0.5, 0.99, 1.0] {
            let validator = builtin_fuzzy(0.75, threshold);
            for text in texts {
                let result = validator.validate(text, text);
                assert_eq!(result.ratio, 1.0, "'{}'", text);
                assert!(result.validated, "'{}' at {}", text, threshold);
            }
        }
    }

    #[test]
    fn test_short_partial_matches_are_penalized() {
        let validator = builtin_fuzzy(0.75, 0.5);
        let result = validator.validate("Сок", "Сок яблочный");

        // (1.2 + 1.2) / (1.2 + 2.2) minus the short record penalty
        let expected = 2.4 / 3.4 - 0.1;
        assert!((result.ratio - expected).abs() < 1e-9, "ratio {}", result.ratio);
        assert!(result.validated);
    }

    #[test]
    fn test_quotes_do_not_split_words() {
        let validator = builtin_fuzzy(0.75, 0.5);
        let result = validator.validate(r#"Сок "Добрый" 1 л"#, "Сок Добрый 1 л");

        assert_eq!(result.ratio, 1.0);
    }

    #[test]
    fn test_debug_keeps_annotated_tokens() {
        let validator = builtin_fuzzy(0.75, 0.5).with_debug(true);
        let result = validator.validate("Малоко 930 мл", "Молоко 930 мл");

        let client = result.client_tokens.expect("debug tokens");
        let source = result.source_tokens.expect("debug tokens");
        assert_eq!(client.len(), 3);
        assert_eq!(client[0].status, MatchStatus::Fuzzy);
        assert_eq!(client[0].partner, Some(0));
        assert_eq!(source[1].status, MatchStatus::Exact);

        let plain = builtin_fuzzy(0.75, 0.5).validate("Малоко 930 мл", "Молоко 930 мл");
        assert!(plain.client_tokens.is_none());
        let json = serde_json::to_value(&plain).unwrap();
        assert!(json.get("client_tokens").is_none());
    }

    #[test]
    fn test_thresholds_must_be_unit_interval() {
        let config = FuzzyConfig::builtin().unwrap();
        assert!(matches!(
            FuzzyValidator::new(&config, 75.0, 0.5),
            Err(AppError::InvalidThreshold(_))
        ));
        assert!(matches!(
            FuzzyValidator::new(&config, 0.75, -0.1),
            Err(AppError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn test_batch_keeps_order() {
        let validator = builtin_fuzzy(0.75, 0.5);
        let pairs = vec![
            RecordPair::new("Сок яблочный", "Кабель медный"),
            RecordPair::new("Молоко 930 мл", "Молоко 930 мл"),
            RecordPair::new("Малоко Простоквашино 930 мл", "Молоко Простоквашино 930 мл"),
        ];

        let sequential = validator.validate_batch(&pairs, &Sequential);
        let parallel = validator.validate_batch(&pairs, &Parallel);

        let ratios: Vec<f64> = sequential.iter().map(|r| r.ratio).collect();
        assert_eq!(ratios, parallel.iter().map(|r| r.ratio).collect::<Vec<_>>());
        assert_eq!(ratios[0], 0.0);
        assert_eq!(ratios[1], 1.0);
        assert!(ratios[2] > 0.8);
    }
}
