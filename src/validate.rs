//! Trend validation with one adaptive relaxation step.
//!
//! Pass 1 runs the base rules. If the pass rate is below the configured
//! threshold, the relaxed rules are applied to the *original* candidates and
//! those results replace pass 1. There is no second relaxation.

use metrics::counter;

use crate::candidate::{Candidate, Emotion, ValidationResult};
use crate::config::{RuleSet, ValidationConfig};
use crate::error::{isolate, Result};
use crate::text::{contains_phrase, count_words_present, round2};

/// Emotion categories in tie-break order.
const EMOTION_KEYWORDS: &[(Emotion, &[&str])] = &[
    (
        Emotion::Surprise,
        &["unexpected", "shocking", "surprising", "sudden", "breakthrough", "stuns"],
    ),
    (
        Emotion::Concern,
        &["warning", "crisis", "risk", "threat", "danger", "concern", "crash", "fears"],
    ),
    (
        Emotion::Curiosity,
        &["why", "how", "what", "secret", "hidden", "revealed"],
    ),
    (
        Emotion::Opportunity,
        &["opportunity", "profit", "growth", "gain", "boom", "upside"],
    ),
];

const RELEVANCE_KEYWORDS: &[&str] = &[
    "ai",
    "market",
    "markets",
    "stock",
    "stocks",
    "economy",
    "investment",
    "invest",
    "investing",
    "business",
    "technology",
    "automation",
    "data",
    "strategy",
    "growth",
    "money",
    "crypto",
    "bitcoin",
    "fed",
    "inflation",
    "rates",
    "earnings",
    "trading",
];

const RED_FLAGS: &[&str] = &[
    "guaranteed return",
    "guaranteed returns",
    "free money",
    "get rich quick",
    "risk-free",
    "risk free",
    "double your money",
    "can't lose",
];

pub struct TrendValidator {
    base: RuleSet,
    relaxed: RuleSet,
    relax_below: f64,
}

impl Default for TrendValidator {
    fn default() -> Self {
        Self::from_config(&ValidationConfig::default())
    }
}

impl TrendValidator {
    pub fn from_config(cfg: &ValidationConfig) -> Self {
        Self {
            base: cfg.base.clone(),
            relaxed: cfg.relaxed.clone(),
            relax_below: cfg.relax_below_pass_rate,
        }
    }

    pub fn base_rules(&self) -> &RuleSet {
        &self.base
    }

    pub fn relaxed_rules(&self) -> &RuleSet {
        &self.relaxed
    }

    /// One result per candidate, in input order.
    pub fn validate_batch(&self, candidates: &[Candidate]) -> Vec<ValidationResult> {
        if candidates.is_empty() {
            tracing::warn!(target: "validate", "empty input");
            return Vec::new();
        }

        let first = self.run_pass(candidates, &self.base, false);
        let passed = first.iter().filter(|r| r.passed).count();
        let rate = passed as f64 / candidates.len() as f64;
        tracing::info!(
            target: "validate",
            total = candidates.len(),
            passed,
            pass_rate = round2(rate),
            "base pass complete"
        );
        if rate >= self.relax_below {
            return first;
        }

        counter!("validation_relaxations_total").increment(1);
        tracing::warn!(
            target: "validate",
            pass_rate = round2(rate),
            threshold = self.relax_below,
            "low pass rate; re-validating with relaxed rules"
        );
        let second = self.run_pass(candidates, &self.relaxed, true);
        tracing::info!(
            target: "validate",
            total = candidates.len(),
            passed = second.iter().filter(|r| r.passed).count(),
            "relaxed pass complete"
        );
        second
    }

    fn run_pass(&self, candidates: &[Candidate], rules: &RuleSet, relaxed: bool) -> Vec<ValidationResult> {
        candidates
            .iter()
            .map(|c| {
                isolate("validate", &c.id, || Ok(validate_single(c, rules)))
                    .unwrap_or_else(|| rejected(c, "validation failed internally"))
            })
            .map(|mut r| {
                r.relaxed = relaxed;
                r
            })
            .collect()
    }

    /// Validate one candidate against explicit rules.
    pub fn validate_single(&self, candidate: &Candidate, rules: &RuleSet) -> Result<ValidationResult> {
        Ok(validate_single(candidate, rules))
    }
}

fn rejected(c: &Candidate, note: &str) -> ValidationResult {
    let mut r = ValidationResult::from(c.clone());
    r.validation_notes.push(note.to_string());
    r
}

/// All checks run; every failure appends a note.
pub fn validate_single(candidate: &Candidate, rules: &RuleSet) -> ValidationResult {
    let text = candidate.text();
    let mut r = ValidationResult::from(candidate.clone());
    r.passed = true;

    let sources = candidate.origins();
    if sources < rules.min_source_count {
        r.passed = false;
        r.validation_notes.push(format!("Insufficient sources: {sources}"));
    }

    r.explainability_seconds = estimate_explainability(&text);
    if r.explainability_seconds > rules.max_explainability_seconds {
        r.passed = false;
        r.validation_notes
            .push(format!("Too complex: {}s", r.explainability_seconds));
    }

    r.emotional_vector = detect_emotion(&text);
    if !rules.accepts_emotion(r.emotional_vector) {
        r.passed = false;
        r.validation_notes
            .push(format!("Weak emotion: {}", r.emotional_vector));
    }

    r.relevance = relevance(&text, sources);
    if r.relevance < rules.min_relevance {
        r.passed = false;
        r.validation_notes.push(format!("Low relevance: {}", r.relevance));
    }

    if let Some(flag) = RED_FLAGS.iter().find(|f| contains_phrase(&text, f)) {
        r.passed = false;
        r.validation_notes.push(format!("Red flag: {flag}"));
    }

    tracing::debug!(
        target: "validate",
        id = %candidate.id,
        passed = r.passed,
        notes = r.validation_notes.len(),
        "validated"
    );
    r
}

/// Seconds needed to explain the topic, from its word count.
pub fn estimate_explainability(text: &str) -> u32 {
    match text.split_whitespace().count() {
        0..=14 => 30,
        15..=29 => 45,
        30..=59 => 60,
        _ => 90,
    }
}

/// Category with the most keyword hits; ties go to the earlier category.
pub fn detect_emotion(text: &str) -> Emotion {
    let mut best = (Emotion::Neutral, 0usize);
    for (emotion, kws) in EMOTION_KEYWORDS {
        let hits = count_words_present(text, kws);
        if hits > best.1 {
            best = (*emotion, hits);
        }
    }
    best.0
}

/// `min(matches / 2, 1)`, +0.2 when at least three origins, capped and rounded.
pub fn relevance(text: &str, origin_count: u32) -> f64 {
    let matches = count_words_present(text, RELEVANCE_KEYWORDS) as f64;
    let mut rel = (matches / 2.0).min(1.0);
    if origin_count >= 3 {
        rel = (rel + 0.2).min(1.0);
    }
    round2(rel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explainability_buckets() {
        assert_eq!(estimate_explainability("one two"), 30);
        assert_eq!(estimate_explainability(&"w ".repeat(15)), 45);
        assert_eq!(estimate_explainability(&"w ".repeat(30)), 60);
        assert_eq!(estimate_explainability(&"w ".repeat(60)), 90);
    }

    #[test]
    fn emotion_ties_go_to_first_category() {
        assert_eq!(detect_emotion("shocking warning"), Emotion::Surprise);
        assert_eq!(detect_emotion("warning crisis, but why?"), Emotion::Concern);
        assert_eq!(detect_emotion("quarterly report"), Emotion::Neutral);
        assert_eq!(detect_emotion("a boom in profit"), Emotion::Opportunity);
    }

    #[test]
    fn relevance_formula() {
        assert_eq!(relevance("market", 1), 0.5);
        assert_eq!(relevance("market economy crypto", 1), 1.0);
        assert_eq!(relevance("market", 3), 0.7);
        assert_eq!(relevance("nothing here", 1), 0.0);
        // "said" must not count as "ai"
        assert_eq!(relevance("he said so", 1), 0.0);
    }

    #[test]
    fn every_failing_check_leaves_a_note() {
        let c = Candidate::new("x", "quarterly report", "s");
        let r = validate_single(&c, &RuleSet::base());
        assert!(!r.passed);
        assert_eq!(r.validation_notes.len(), 3); // sources, emotion, relevance
        assert_eq!(r.explainability_seconds, 30);
    }

    #[test]
    fn red_flag_fails_even_relaxed() {
        let c = Candidate::new("x", "Why this stock market play is a guaranteed return", "s")
            .with_origin_count(3);
        let r = validate_single(&c, &RuleSet::relaxed());
        assert!(!r.passed);
        assert!(r.validation_notes.iter().any(|n| n.starts_with("Red flag")));
    }
}
