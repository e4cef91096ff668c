use ledgerline_core::{ImportTransaction, TransactionKind};
use regex::{Regex, RegexBuilder};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryRule {
    pub name: String,
    #[serde(default)]
    pub priority: i32,
    pub pattern: String,
    #[serde(default)]
    pub match_type: MatchType,
    pub category_id: String,
    #[serde(default)]
    pub kind: Option<TransactionKind>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub amount_min: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub amount_max: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    #[default]
    Contains,
    Exact,
    Regex,
    Fuzzy {
        threshold: f32,
    },
}

#[derive(Error, Debug)]
pub enum RulesError {
    #[error("Failed to parse rules TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid regex in rule {rule:?}: {source}")]
    Regex {
        rule: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Deserialize)]
struct RulesFile {
    #[serde(default, rename = "rule")]
    rules: Vec<CategoryRule>,
}

struct CompiledRule {
    rule: CategoryRule,
    compiled_regex: Option<Regex>,
}

/// Assigns categories to imported transactions from a priority-ordered rule list.
pub struct CategoryRuleEngine {
    rules: Vec<CompiledRule>,
}

impl CategoryRuleEngine {
    pub fn new(rules: Vec<CategoryRule>) -> Result<Self, RulesError> {
        let mut compiled = rules
            .into_iter()
            .map(|rule| {
                let compiled_regex = match rule.match_type {
                    MatchType::Regex => Some(
                        RegexBuilder::new(&rule.pattern)
                            .case_insensitive(true)
                            .build()
                            .map_err(|source| RulesError::Regex {
                                rule: rule.name.clone(),
                                source,
                            })?,
                    ),
                    _ => None,
                };
                Ok(CompiledRule { rule, compiled_regex })
            })
            .collect::<Result<Vec<_>, RulesError>>()?;
        // Highest priority first; ties keep file order.
        compiled.sort_by(|a, b| b.rule.priority.cmp(&a.rule.priority));
        Ok(Self { rules: compiled })
    }

    /// Load `[[rule]]` tables.
    pub fn from_toml(toml_content: &str) -> Result<Self, RulesError> {
        let file: RulesFile = toml::from_str(toml_content)?;
        Self::new(file.rules)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn find_matching_rule(&self, tx: &ImportTransaction) -> Option<&CategoryRule> {
        self.rules
            .iter()
            .find(|cr| rule_matches(cr, tx))
            .map(|cr| &cr.rule)
    }

    /// Set `category_id` from the first matching rule. Returns whether one matched.
    pub fn categorize(&self, tx: &mut ImportTransaction) -> bool {
        match self.find_matching_rule(tx) {
            Some(rule) => {
                tx.category_id = Some(rule.category_id.clone());
                true
            }
            None => false,
        }
    }
}

fn rule_matches(cr: &CompiledRule, tx: &ImportTransaction) -> bool {
    let rule = &cr.rule;

    if rule.kind.is_some_and(|kind| kind != tx.kind) {
        return false;
    }
    if rule.amount_min.is_some_and(|min| tx.amount < min) {
        return false;
    }
    if rule.amount_max.is_some_and(|max| tx.amount > max) {
        return false;
    }

    let pattern = rule.pattern.to_lowercase();
    std::iter::once(tx.description.as_str())
        .chain(tx.name.as_deref())
        .any(|candidate| {
            let text = candidate.to_lowercase();
            match &rule.match_type {
                MatchType::Contains => text.contains(&pattern),
                MatchType::Exact => text == pattern,
                MatchType::Regex => cr
                    .compiled_regex
                    .as_ref()
                    .is_some_and(|re| re.is_match(candidate)),
                MatchType::Fuzzy { threshold } => similarity(&text, &pattern) >= *threshold,
            }
        })
}

/// 1.0 for identical strings, falling towards 0.0 with edit distance.
fn similarity(a: &str, b: &str) -> f32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    1.0 - edit_distance(&a, &b) as f32 / longest as f32
}

/// Levenshtein distance over a single rolling row.
fn edit_distance(a: &[char], b: &[char]) -> usize {
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == cb {
                diagonal
            } else {
                1 + diagonal.min(above).min(row[j])
            };
            diagonal = above;
        }
    }
    row[b.len()]
}
