//! Stage records.
//!
//! Each stage returns a new record that embeds the previous one:
//! `Candidate` → `ValidationResult` → `ScoreRecord` → `SelectedItem`.
//! The embedded record is `#[serde(flatten)]`ed, so on the wire every stage
//! looks like one additive mapping and earlier fields are never lost.
//! Missing fields deserialize to documented defaults, which is how malformed
//! upstream records are tolerated.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub const DEFAULT_EXPLAINABILITY_SECS: u32 = 60;

fn default_origin_count() -> u32 {
    1
}
fn default_explainability() -> u32 {
    DEFAULT_EXPLAINABILITY_SECS
}
fn default_niche() -> String {
    "general".to_string()
}
fn default_one() -> f64 {
    1.0
}

/// A raw trending topic, as produced by ingestion and enriched by dedup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// ISO 8601; parsed lazily by the scorer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default = "default_origin_count")]
    pub origin_count: u32,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Known competing coverage; the scorer falls back to an origin-count proxy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competitor_count: Option<u32>,

    // --- dedup annotations ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus_sources: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_size: Option<usize>,
    /// Accumulated by `merge_origins`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<BTreeSet<String>>,
}

impl Default for Candidate {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            description: None,
            timestamp: None,
            origin_count: 1,
            source: String::new(),
            source_url: None,
            competitor_count: None,
            consensus_sources: None,
            cluster_size: None,
            sources: None,
        }
    }
}

impl Candidate {
    pub fn new(id: impl Into<String>, title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, d: impl Into<String>) -> Self {
        self.description = Some(d.into());
        self
    }

    pub fn with_timestamp(mut self, ts: impl Into<String>) -> Self {
        self.timestamp = Some(ts.into());
        self
    }

    pub fn with_origin_count(mut self, n: u32) -> Self {
        self.origin_count = n;
        self
    }

    pub fn with_competitor_count(mut self, n: u32) -> Self {
        self.competitor_count = Some(n);
        self
    }

    /// Origin count clamped to the `>= 1` invariant.
    pub fn origins(&self) -> u32 {
        self.origin_count.max(1)
    }

    /// `title + " " + description`.
    pub fn text(&self) -> String {
        crate::text::combined(&self.title, self.description.as_deref())
    }
}

/// Emotional register detected by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Surprise,
    Concern,
    Curiosity,
    Opportunity,
    Awe,
    #[default]
    Neutral,
    /// Anything upstream sent that we do not recognise.
    #[serde(other)]
    Unknown,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Surprise => "surprise",
            Emotion::Concern => "concern",
            Emotion::Curiosity => "curiosity",
            Emotion::Opportunity => "opportunity",
            Emotion::Awe => "awe",
            Emotion::Neutral => "neutral",
            Emotion::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidate plus the validator's verdict and signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    #[serde(flatten)]
    pub candidate: Candidate,
    #[serde(default)]
    pub passed: bool,
    #[serde(default)]
    pub validation_notes: Vec<String>,
    #[serde(default = "default_explainability")]
    pub explainability_seconds: u32,
    #[serde(default)]
    pub emotional_vector: Emotion,
    #[serde(default)]
    pub relevance: f64,
    /// True when the verdict came from the relaxed pass.
    #[serde(default)]
    pub relaxed: bool,
}

impl From<Candidate> for ValidationResult {
    /// Unvalidated wrapper carrying the same defaults deserialization uses.
    fn from(candidate: Candidate) -> Self {
        Self {
            candidate,
            passed: false,
            validation_notes: Vec::new(),
            explainability_seconds: DEFAULT_EXPLAINABILITY_SECS,
            emotional_vector: Emotion::Neutral,
            relevance: 0.0,
            relaxed: false,
        }
    }
}

/// The seven VPS factors, each in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Components {
    pub emotional_charge: f64,
    pub curiosity_gap: f64,
    pub timeliness: f64,
    pub shareability: f64,
    pub simplicity: f64,
    pub historical_pattern: f64,
    pub narrative_fit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    #[serde(flatten)]
    pub validation: ValidationResult,
    #[serde(default)]
    pub components: Components,
    #[serde(default)]
    pub base_vps: f64,
    #[serde(default = "default_niche")]
    pub niche: String,
    #[serde(default = "default_one")]
    pub niche_multiplier: f64,
    #[serde(default = "default_one")]
    pub saturation_factor: f64,
    /// Competitor count the saturation factor was computed from.
    #[serde(default)]
    pub competitor_count_used: u32,
    #[serde(default)]
    pub final_score: f64,
}

impl ScoreRecord {
    pub fn candidate(&self) -> &Candidate {
        &self.validation.candidate
    }

    pub fn id(&self) -> &str {
        &self.validation.candidate.id
    }

    pub fn title(&self) -> &str {
        &self.validation.candidate.title
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Short,
    Long,
}

/// A slate entry: the exact record handed to generation downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedItem {
    #[serde(flatten)]
    pub scored: ScoreRecord,
    pub narrative_lane: String,
    pub format: Format,
}

impl SelectedItem {
    pub fn title(&self) -> &str {
        self.scored.title()
    }

    pub fn final_score(&self) -> f64 {
        self.scored.final_score
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectionPlan {
    pub shorts: Vec<SelectedItem>,
    pub long: Vec<SelectedItem>,
    pub lane_distribution: BTreeMap<String, usize>,
    pub total_selected: usize,
}

impl SelectionPlan {
    /// Long item first, then shorts in score order.
    pub fn items(&self) -> impl Iterator<Item = &SelectedItem> {
        self.long.iter().chain(self.shorts.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn malformed_records_fall_back_to_defaults() {
        let s: ScoreRecord = serde_json::from_value(json!({ "id": "x" })).unwrap();
        assert_eq!(s.title(), "");
        assert_eq!(s.final_score, 0.0);
        assert_eq!(s.validation.explainability_seconds, 60);
        assert_eq!(s.validation.emotional_vector, Emotion::Neutral);
        assert_eq!(s.candidate().origin_count, 1);
        assert_eq!(s.niche, "general");
    }

    #[test]
    fn unknown_emotion_is_tolerated() {
        let v: ValidationResult =
            serde_json::from_value(json!({ "id": "x", "emotional_vector": "rage" })).unwrap();
        assert_eq!(v.emotional_vector, Emotion::Unknown);
    }

    #[test]
    fn enrichment_serializes_flat() {
        let c = Candidate::new("t1", "Fed holds rates", "reuters").with_origin_count(2);
        let v = ValidationResult::from(c);
        let j = serde_json::to_value(&v).unwrap();
        assert_eq!(j["id"], json!("t1"));
        assert_eq!(j["origin_count"], json!(2));
        assert_eq!(j["emotional_vector"], json!("neutral"));
        assert!(j.get("candidate").is_none());
    }
}
