//! VPS (Virality Propensity Score).
//!
//! `final = base · niche_multiplier · saturation_factor`, where `base` is the
//! weighted sum of seven components in [0, 100]. Base and final are rounded to
//! two decimals; final is computed from the rounded base.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::candidate::{Components, Emotion, ScoreRecord, ValidationResult};
use crate::config::{BeyondPolicy, ComponentWeights, EngineConfig, NicheConfig, SaturationConfig};
use crate::error::{isolate, Error, Result};
use crate::text::{count_keyword_hits, count_words_present, round2};

const CURIOSITY_TRIGGERS: &[&str] = &[
    "why", "how", "what", "secret", "hidden", "revealed", "truth", "myth", "lie", "wrong",
];
const SHARE_SIGNALS: &[&str] = &[
    "data", "study", "research", "reveals", "shows", "proves", "chart", "map",
];

const HISTORICAL_PATTERN: f64 = 70.0;
const NARRATIVE_FIT: f64 = 65.0;
const UNKNOWN_TIMELINESS: f64 = 50.0;

pub const GENERAL_NICHE: &str = "general";

pub struct VpsScorer {
    weights: ComponentWeights,
    niches: Vec<NicheConfig>,
    default_multiplier: f64,
    saturation: SaturationConfig,
}

impl Default for VpsScorer {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl VpsScorer {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            weights: cfg.scoring.weights,
            niches: cfg.niches.clone(),
            default_multiplier: cfg.scoring.default_multiplier,
            saturation: cfg.scoring.saturation.clone(),
        }
    }

    pub fn score_batch(&self, records: &[ValidationResult]) -> Vec<ScoreRecord> {
        self.score_batch_at(records, Utc::now())
    }

    /// Descending by `final_score`; zero scores and failed items are dropped.
    pub fn score_batch_at(&self, records: &[ValidationResult], now: DateTime<Utc>) -> Vec<ScoreRecord> {
        if records.is_empty() {
            tracing::warn!(target: "scoring", "empty input");
            return Vec::new();
        }
        let mut scored: Vec<ScoreRecord> = records
            .iter()
            .filter_map(|r| isolate("scoring", &r.candidate.id, || self.score_single_at(r, now)))
            .filter(|s| s.final_score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));

        tracing::info!(
            target: "scoring",
            input = records.len(),
            output = scored.len(),
            top = scored.first().map(|s| s.final_score).unwrap_or(0.0),
            "scoring complete"
        );
        scored
    }

    pub fn score_single(&self, record: &ValidationResult) -> Result<ScoreRecord> {
        self.score_single_at(record, Utc::now())
    }

    pub fn score_single_at(&self, record: &ValidationResult, now: DateTime<Utc>) -> Result<ScoreRecord> {
        let c = &record.candidate;
        let components = Components {
            emotional_charge: emotional_charge(record.emotional_vector),
            curiosity_gap: curiosity_gap(&c.title),
            timeliness: timeliness(c.timestamp.as_deref(), now),
            shareability: shareability(&c.title),
            simplicity: simplicity(record.explainability_seconds),
            historical_pattern: HISTORICAL_PATTERN,
            narrative_fit: NARRATIVE_FIT,
        };
        let base_vps = round2(self.weighted(&components));

        let (niche, niche_multiplier) = self.detect_niche(&c.text());
        let competitors = c
            .competitor_count
            .unwrap_or_else(|| c.origins().saturating_sub(1));
        let saturation_factor = self.saturation_factor(competitors);

        let final_score = round2(base_vps * niche_multiplier * saturation_factor);
        if !final_score.is_finite() || final_score < 0.0 {
            return Err(Error::Scoring(format!("unusable score {final_score}")));
        }

        tracing::debug!(
            target: "scoring",
            id = %c.id,
            base_vps,
            niche = %niche,
            saturation_factor,
            final_score,
            "scored"
        );

        Ok(ScoreRecord {
            validation: record.clone(),
            components,
            base_vps,
            niche,
            niche_multiplier,
            saturation_factor,
            competitor_count_used: competitors,
            final_score,
        })
    }

    fn weighted(&self, c: &Components) -> f64 {
        let w = &self.weights;
        c.emotional_charge * w.emotional_charge
            + c.curiosity_gap * w.curiosity_gap
            + c.timeliness * w.timeliness
            + c.shareability * w.shareability
            + c.simplicity * w.simplicity
            + c.historical_pattern * w.historical_pattern
            + c.narrative_fit * w.narrative_fit
    }

    /// First niche (config order) with any keyword hit.
    pub fn detect_niche(&self, text: &str) -> (String, f64) {
        self.niches
            .iter()
            .find(|n| count_keyword_hits(text, &n.keywords) > 0)
            .map(|n| (n.name.clone(), n.multiplier))
            .unwrap_or_else(|| (GENERAL_NICHE.to_string(), self.default_multiplier))
    }

    pub fn saturation_factor(&self, competitors: u32) -> f64 {
        self.saturation
            .steps
            .iter()
            .find(|s| competitors <= s.max_competitors)
            .map(|s| s.factor)
            .unwrap_or(match self.saturation.beyond {
                BeyondPolicy::HardCutoff => 0.0,
                BeyondPolicy::Floor => self.saturation.floor_value,
            })
    }
}

pub fn emotional_charge(e: Emotion) -> f64 {
    match e {
        Emotion::Surprise => 85.0,
        Emotion::Concern => 80.0,
        Emotion::Curiosity => 90.0,
        Emotion::Opportunity => 85.0,
        Emotion::Awe => 75.0,
        Emotion::Neutral => 40.0,
        Emotion::Unknown => 50.0,
    }
}

pub fn curiosity_gap(title: &str) -> f64 {
    let n = count_words_present(title, CURIOSITY_TRIGGERS) as f64;
    (50.0 + 15.0 * n).min(100.0)
}

pub fn shareability(title: &str) -> f64 {
    let n = count_words_present(title, SHARE_SIGNALS) as f64;
    (60.0 + 10.0 * n).min(100.0)
}

pub fn simplicity(explainability_seconds: u32) -> f64 {
    match explainability_seconds {
        0..=30 => 95.0,
        31..=45 => 80.0,
        46..=60 => 65.0,
        _ => 40.0,
    }
}

pub fn timeliness(timestamp: Option<&str>, now: DateTime<Utc>) -> f64 {
    let Some(ts) = timestamp.and_then(parse_timestamp) else {
        return UNKNOWN_TIMELINESS;
    };
    let age_h = (now - ts).num_seconds() as f64 / 3600.0;
    if age_h < 6.0 {
        95.0
    } else if age_h < 24.0 {
        80.0
    } else if age_h < 48.0 {
        60.0
    } else {
        40.0
    }
}

/// RFC 3339, RFC 2822, naive ISO datetime (taken as UTC) or a bare date.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(n) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(n.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::Candidate;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn finance() -> VpsScorer {
        let cfg = EngineConfig::from_toml_str(include_str!("../config/engine.toml")).unwrap();
        VpsScorer::from_config(&cfg)
    }

    #[test]
    fn timestamp_formats() {
        let n = now();
        assert!(parse_timestamp("2024-05-01T10:00:00Z").is_some());
        assert!(parse_timestamp("2024-05-01T10:00:00").is_some());
        assert!(parse_timestamp("2024-05-01 10:00:00.123").is_some());
        assert!(parse_timestamp("Wed, 01 May 2024 10:00:00 +0000").is_some());
        assert!(parse_timestamp("yesterday").is_none());
        assert_eq!(timeliness(Some("2024-05-01T10:00:00"), n), 95.0);
        assert_eq!(timeliness(Some("2024-04-30T20:00:00Z"), n), 80.0);
        assert_eq!(timeliness(Some("2024-04-30T00:00:00Z"), n), 60.0);
        assert_eq!(timeliness(Some("2024-04-01"), n), 40.0);
        assert_eq!(timeliness(Some("garbage"), n), 50.0);
        assert_eq!(timeliness(None, n), 50.0);
    }

    #[test]
    fn component_tables() {
        assert_eq!(curiosity_gap("Why the Fed is wrong: the hidden truth"), 100.0);
        assert_eq!(curiosity_gap("Fed holds rates"), 50.0);
        assert_eq!(shareability("New study shows data"), 90.0);
        assert_eq!(simplicity(30), 95.0);
        assert_eq!(simplicity(45), 80.0);
        assert_eq!(simplicity(60), 65.0);
        assert_eq!(simplicity(90), 40.0);
    }

    #[test]
    fn saturation_steps_and_policy() {
        let s = VpsScorer::default();
        assert_eq!(s.saturation_factor(0), 1.8);
        assert_eq!(s.saturation_factor(2), 1.8);
        assert_eq!(s.saturation_factor(3), 1.0);
        assert_eq!(s.saturation_factor(15), 0.7);
        assert_eq!(s.saturation_factor(50), 0.3);
        assert_eq!(s.saturation_factor(51), 0.0);

        let mut cfg = EngineConfig::default();
        cfg.scoring.saturation.beyond = BeyondPolicy::Floor;
        assert_eq!(VpsScorer::from_config(&cfg).saturation_factor(500), 0.1);
    }

    #[test]
    fn final_is_product_of_rounded_parts() {
        let s = finance();
        let c = Candidate::new("a", "Why bitcoin data shows a hidden boom", "x")
            .with_timestamp((now() - Duration::hours(1)).to_rfc3339())
            .with_origin_count(2);
        let mut v = ValidationResult::from(c);
        v.emotional_vector = Emotion::Curiosity;
        v.explainability_seconds = 30;
        let r = s.score_single_at(&v, now()).unwrap();
        assert_eq!(r.niche, "crypto");
        assert_eq!(r.competitor_count_used, 1);
        let expect = round2(r.base_vps * r.niche_multiplier * r.saturation_factor);
        assert_eq!(r.final_score, expect);
        assert!(r.base_vps > 0.0 && r.base_vps <= 100.0);
    }

    #[test]
    fn explicit_competitor_count_wins() {
        let s = VpsScorer::default();
        let c = Candidate::new("a", "Plain headline", "x")
            .with_origin_count(1)
            .with_competitor_count(100);
        let r = s.score_single_at(&ValidationResult::from(c.clone()), now()).unwrap();
        assert_eq!(r.saturation_factor, 0.0);
        assert_eq!(r.final_score, 0.0);
        assert!(s.score_batch_at(&[ValidationResult::from(c)], now()).is_empty());
    }

    #[test]
    fn unmatched_text_is_general() {
        let s = finance();
        assert_eq!(s.detect_niche("gardening tips"), ("general".to_string(), 1.0));
    }

    #[test]
    fn no_configured_niches_means_general_at_default_multiplier() {
        let s = VpsScorer::default();
        assert_eq!(s.detect_niche("Stock market rally"), ("general".to_string(), 1.0));

        let mut cfg = EngineConfig::default();
        cfg.scoring.default_multiplier = 0.9;
        let s = VpsScorer::from_config(&cfg);
        assert_eq!(s.detect_niche("Stock market rally"), ("general".to_string(), 0.9));
    }
}
