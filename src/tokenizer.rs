//! # Tokenizer
//!
//! Splits a text into weighted tokens. Letters of every configured language
//! are recognized in one pass; each token is tagged with its language and
//! character class, and its weight is `class weight * language weight`.
//!
//! Tokenization is a pure function of the text and the configuration.

use std::collections::HashSet;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::errors::AppResult;
use crate::fuzzy_config::{ClassWeights, FuzzyConfig};

/// Language of a token's letters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Russian,
    English,
}

impl Language {
    /// Lowercase letter range, matched case-insensitively
    pub fn alphabet(&self) -> &'static str {
        match self {
            Language::Russian => "а-яё",
            Language::English => "a-z",
        }
    }

    fn group(&self) -> &'static str {
        match self {
            Language::Russian => "russian",
            Language::English => "english",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.group())
    }
}

/// Letter case shape of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharClass {
    /// `ООО`, `USB`
    AllCaps,
    /// `Молоко`
    Capitalized,
    /// `молоко`
    Lowercase,
    /// Numbers and mixed-case words
    Other,
}

impl CharClass {
    pub fn of(surface: &str) -> Self {
        let letters: Vec<char> = surface.chars().filter(|c| c.is_alphabetic()).collect();
        if letters.is_empty() || surface.chars().any(|c| c.is_ascii_digit()) {
            return CharClass::Other;
        }
        if letters.len() >= 2 && letters.iter().all(|c| c.is_uppercase()) {
            return CharClass::AllCaps;
        }
        if letters.iter().all(|c| c.is_lowercase()) {
            return CharClass::Lowercase;
        }
        if letters[0].is_uppercase() && letters[1..].iter().all(|c| c.is_lowercase()) {
            return CharClass::Capitalized;
        }
        CharClass::Other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    #[default]
    Unmatched,
    Exact,
    Fuzzy,
}

/// One token of one side of a record pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Text as written
    pub surface: String,
    /// Lowercased text used for matching
    pub value: String,
    pub class: CharClass,
    /// `None` for tokens without letters
    pub language: Option<Language>,
    pub weight: f64,
    pub status: MatchStatus,
    /// 1.0 for exact matches, the similarity score for fuzzy ones
    pub quality: f64,
    /// Index of the matched token on the other side
    pub partner: Option<usize>,
}

impl Token {
    pub fn new(surface: &str, class: CharClass, language: Option<Language>, weight: f64) -> Self {
        Self {
            surface: surface.to_string(),
            value: surface.to_lowercase(),
            class,
            language,
            weight,
            status: MatchStatus::Unmatched,
            quality: 0.0,
            partner: None,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.status != MatchStatus::Unmatched
    }

    pub fn is_word(&self) -> bool {
        self.language.is_some()
    }

    pub fn matched_weight(&self) -> f64 {
        if self.is_matched() {
            self.weight * self.quality
        } else {
            0.0
        }
    }

    pub(crate) fn mark(&mut self, status: MatchStatus, quality: f64, partner: usize) {
        self.status = status;
        self.quality = quality;
        self.partner = Some(partner);
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.surface)
    }
}

#[derive(Debug, Clone)]
pub struct Tokenizer {
    languages: Vec<(Language, f64)>,
    class_weights: ClassWeights,
    pattern: Regex,
}

impl Tokenizer {
    /// Languages are tried in the given order
    pub fn new(class_weights: ClassWeights, languages: Vec<(Language, f64)>) -> AppResult<Self> {
        let mut alternatives: Vec<String> = languages
            .iter()
            .map(|(language, _)| format!("(?P<{}>[{}]+)", language.group(), language.alphabet()))
            .collect();
        alternatives.push(r"(?P<number>\d+(?:[.,]\d+)?)".to_string());
        let pattern = Regex::new(&format!("(?i){}", alternatives.join("|")))?;

        Ok(Self {
            languages,
            class_weights,
            pattern,
        })
    }

    pub fn from_config(config: &FuzzyConfig) -> AppResult<Self> {
        Self::new(
            config.regex_weights.clone(),
            vec![
                (Language::Russian, config.language_weights.russian),
                (Language::English, config.language_weights.english),
            ],
        )
    }

    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        for caps in self.pattern.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let found = self
                .languages
                .iter()
                .find(|(language, _)| caps.name(language.group()).is_some());
            let (language, language_weight) = match found {
                Some((language, weight)) => (Some(*language), *weight),
                None => (None, 1.0),
            };
            let class = CharClass::of(whole.as_str());
            let weight = self.class_weights.weight(class) * language_weight;
            tokens.push(Token::new(whole.as_str(), class, language, weight));
        }
        trace!(text = %text, tokens = tokens.len(), "Text tokenized");
        tokens
    }
}

/// Drop words shorter than `word_min_len` characters and repeated values,
/// keeping the first occurrence. Numbers are never dropped for length.
pub fn preprocess(tokens: Vec<Token>, word_min_len: usize) -> Vec<Token> {
    let mut seen = HashSet::new();
    tokens
        .into_iter()
        .filter(|t| !t.is_word() || t.value.chars().count() >= word_min_len)
        .filter(|t| seen.insert(t.value.clone()))
        .collect()
}
