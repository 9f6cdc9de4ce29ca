// src/config.rs
//! Engine configuration: TOML schema, documented defaults, and load-time checks.
//!
//! Path resolution:
//! 1) `$TREND_SLATE_CONFIG` (must exist)
//! 2) `config/engine.toml`
//! 3) built-in defaults, with no niches and no lanes
//!
//! A malformed file fails fast; an absent one yields the defaults. Without
//! niches every title scores as `general`; without lanes selection uses the
//! fallback lane mapping, uncapped.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::{Deserialize, Deserializer, Serialize};

use crate::candidate::Emotion;
use crate::error::{Error, Result};

pub const DEFAULT_ENGINE_CONFIG_PATH: &str = "config/engine.toml";
pub const ENV_ENGINE_CONFIG_PATH: &str = "TREND_SLATE_CONFIG";

const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/* ----------------------------
Schema
---------------------------- */

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub dedup: DedupConfig,
    pub validation: ValidationConfig,
    pub scoring: ScoringConfig,
    /// Evaluated in order; the first niche with a keyword hit wins.
    pub niches: Vec<NicheConfig>,
    /// Evaluated in order; ties in lane assignment go to the earlier lane.
    pub lanes: Vec<LaneConfig>,
    pub selection: SelectionConfig,
    pub safety: SafetyConfig,
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Cosine similarity at or above which a candidate joins the seed's cluster.
    pub similarity_threshold: f32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.75,
        }
    }
}

/// One set of validation thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub min_source_count: u32,
    pub max_explainability_seconds: u32,
    pub min_relevance: f64,
    pub valid_emotions: Vec<Emotion>,
}

impl RuleSet {
    pub fn base() -> Self {
        Self {
            min_source_count: 2,
            max_explainability_seconds: 60,
            min_relevance: 0.5,
            valid_emotions: default_valid_emotions(),
        }
    }

    pub fn relaxed() -> Self {
        Self {
            min_source_count: 1,
            max_explainability_seconds: 90,
            min_relevance: 0.3,
            valid_emotions: default_valid_emotions(),
        }
    }

    pub fn accepts_emotion(&self, e: Emotion) -> bool {
        self.valid_emotions.contains(&e)
    }
}

/// Keys missing from a `[validation.base]` or `[validation.relaxed]` table
/// keep the value of the rule set they override.
#[derive(Deserialize)]
struct RuleSetPatch {
    min_source_count: Option<u32>,
    max_explainability_seconds: Option<u32>,
    min_relevance: Option<f64>,
    valid_emotions: Option<Vec<Emotion>>,
}

impl RuleSetPatch {
    fn apply(self, mut rules: RuleSet) -> RuleSet {
        if let Some(v) = self.min_source_count {
            rules.min_source_count = v;
        }
        if let Some(v) = self.max_explainability_seconds {
            rules.max_explainability_seconds = v;
        }
        if let Some(v) = self.min_relevance {
            rules.min_relevance = v;
        }
        if let Some(v) = self.valid_emotions {
            rules.valid_emotions = v;
        }
        rules
    }
}

fn base_rules<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<RuleSet, D::Error> {
    RuleSetPatch::deserialize(d).map(|p| p.apply(RuleSet::base()))
}

fn relaxed_rules<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<RuleSet, D::Error> {
    RuleSetPatch::deserialize(d).map(|p| p.apply(RuleSet::relaxed()))
}

fn default_valid_emotions() -> Vec<Emotion> {
    vec![
        Emotion::Surprise,
        Emotion::Concern,
        Emotion::Curiosity,
        Emotion::Opportunity,
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// A first-pass rate strictly below this triggers the relaxed pass.
    pub relax_below_pass_rate: f64,
    #[serde(default = "RuleSet::base", deserialize_with = "base_rules")]
    pub base: RuleSet,
    #[serde(default = "RuleSet::relaxed", deserialize_with = "relaxed_rules")]
    pub relaxed: RuleSet,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            relax_below_pass_rate: 0.5,
            base: RuleSet::base(),
            relaxed: RuleSet::relaxed(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentWeights {
    pub emotional_charge: f64,
    pub curiosity_gap: f64,
    pub timeliness: f64,
    pub shareability: f64,
    pub simplicity: f64,
    pub historical_pattern: f64,
    pub narrative_fit: f64,
}

impl Default for ComponentWeights {
    fn default() -> Self {
        Self {
            emotional_charge: 0.15,
            curiosity_gap: 0.25,
            timeliness: 0.15,
            shareability: 0.15,
            simplicity: 0.10,
            historical_pattern: 0.10,
            narrative_fit: 0.10,
        }
    }
}

impl ComponentWeights {
    pub fn as_array(&self) -> [f64; 7] {
        [
            self.emotional_charge,
            self.curiosity_gap,
            self.timeliness,
            self.shareability,
            self.simplicity,
            self.historical_pattern,
            self.narrative_fit,
        ]
    }

    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }
}

/// What the saturation factor becomes past the last configured step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeyondPolicy {
    /// 0.0: heavily covered topics drop out of the slate.
    #[default]
    HardCutoff,
    /// `floor_value` (0.1 by default): they stay, heavily discounted.
    Floor,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SaturationStep {
    /// Inclusive upper bound on competitor count.
    pub max_competitors: u32,
    pub factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaturationConfig {
    /// Ascending by `max_competitors`.
    pub steps: Vec<SaturationStep>,
    pub beyond: BeyondPolicy,
    pub floor_value: f64,
}

impl Default for SaturationConfig {
    fn default() -> Self {
        let step = |max_competitors, factor| SaturationStep {
            max_competitors,
            factor,
        };
        Self {
            steps: vec![step(2, 1.8), step(5, 1.0), step(15, 0.7), step(50, 0.3)],
            beyond: BeyondPolicy::HardCutoff,
            floor_value: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub default_multiplier: f64,
    pub weights: ComponentWeights,
    pub saturation: SaturationConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            default_multiplier: 1.0,
            weights: ComponentWeights::default(),
            saturation: SaturationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NicheConfig {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "one")]
    pub multiplier: f64,
}

fn one() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneConfig {
    pub id: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Minimum share of the daily slate, in percent.
    #[serde(default)]
    pub percentage_min: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub daily_count: usize,
    pub min_viable_score: f64,
    pub soft_quota_override: f64,
    /// Titles with Jaccard similarity strictly above this are near-duplicates.
    pub near_duplicate_jaccard: f64,
    /// Only count a lane as under target while eligible supply for it remains.
    pub quota_gap_requires_supply: bool,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            daily_count: 5,
            min_viable_score: 50.0,
            soft_quota_override: 85.0,
            near_duplicate_jaccard: 0.5,
            quota_gap_requires_supply: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub hard_blocklist: Vec<String>,
    pub soft_blocklist: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Offline feature-hashed embeddings.
    #[default]
    Lexical,
    /// OpenAI-compatible `/v1/embeddings` endpoint; needs `OPENAI_API_KEY`.
    Openai,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
            exponential: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub model: String,
    pub endpoint: String,
    pub timeout_ms: u64,
    /// Dimensionality of lexical embeddings.
    pub dimensions: usize,
    pub cache_ttl_secs: u64,
    /// Burst size of the provider rate limiter.
    pub rate_limit_capacity: u32,
    /// Sustained provider calls per second.
    pub rate_limit_per_sec: u32,
    pub retry: RetryConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Lexical,
            model: "text-embedding-3-small".to_string(),
            endpoint: "https://api.openai.com/v1/embeddings".to_string(),
            timeout_ms: 8_000,
            dimensions: 256,
            cache_ttl_secs: 24 * 3600,
            rate_limit_capacity: 60,
            rate_limit_per_sec: 1,
            retry: RetryConfig::default(),
        }
    }
}

/* ----------------------------
Loading
---------------------------- */

impl EngineConfig {
    /// Parse and validate a TOML document. Keywords are lowercased.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: EngineConfig = toml::from_str(s)?;
        cfg.normalize_keywords();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from an explicit path; the file must exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading engine config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing engine config {}", path.display()))
    }

    /// Env path, then `config/engine.toml`, then defaults.
    pub fn load_default() -> anyhow::Result<Self> {
        match resolve_config_path()? {
            Some(p) => Self::load_from(&p),
            None => {
                tracing::info!(target: "pipeline", "no engine config file; using defaults");
                Ok(Self::default())
            }
        }
    }

    fn normalize_keywords(&mut self) {
        let lower = |v: &mut Vec<String>| {
            for k in v.iter_mut() {
                *k = k.trim().to_lowercase();
            }
            v.retain(|k| !k.is_empty());
        };
        for n in &mut self.niches {
            lower(&mut n.keywords);
        }
        for l in &mut self.lanes {
            lower(&mut l.keywords);
        }
        lower(&mut self.safety.hard_blocklist);
        lower(&mut self.safety.soft_blocklist);
    }

    /// Load-time invariants. Everything downstream assumes these hold.
    pub fn validate(&self) -> Result<()> {
        let sum = self.scoring.weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(Error::Config(format!(
                "scoring weights must sum to 1.0 (got {sum:.3})"
            )));
        }
        if self.scoring.weights.as_array().iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::Config("scoring weights must be finite and >= 0".into()));
        }
        check_multiplier("scoring.default_multiplier", self.scoring.default_multiplier)?;
        for n in &self.niches {
            if n.name.trim().is_empty() {
                return Err(Error::Config("niche with empty name".into()));
            }
            check_multiplier(&format!("niches.{}.multiplier", n.name), n.multiplier)?;
        }

        let sat = &self.scoring.saturation;
        if sat.steps.is_empty() {
            return Err(Error::Config("scoring.saturation.steps must not be empty".into()));
        }
        if sat.steps.windows(2).any(|w| w[0].max_competitors >= w[1].max_competitors) {
            return Err(Error::Config(
                "scoring.saturation.steps must be strictly ascending".into(),
            ));
        }
        for s in &sat.steps {
            check_multiplier("scoring.saturation.steps.factor", s.factor)?;
        }
        check_multiplier("scoring.saturation.floor_value", sat.floor_value)?;

        check_unit("dedup.similarity_threshold", self.dedup.similarity_threshold as f64)?;
        check_unit(
            "validation.relax_below_pass_rate",
            self.validation.relax_below_pass_rate,
        )?;
        check_unit("validation.base.min_relevance", self.validation.base.min_relevance)?;
        check_unit(
            "validation.relaxed.min_relevance",
            self.validation.relaxed.min_relevance,
        )?;
        check_unit(
            "selection.near_duplicate_jaccard",
            self.selection.near_duplicate_jaccard,
        )?;

        let mut seen = std::collections::HashSet::new();
        for l in &self.lanes {
            if !seen.insert(l.id.as_str()) {
                return Err(Error::Config(format!("duplicate lane id '{}'", l.id)));
            }
            if !(0.0..=100.0).contains(&l.percentage_min) {
                return Err(Error::Config(format!(
                    "lanes.{}.percentage_min must be within [0, 100]",
                    l.id
                )));
            }
        }
        for (name, v) in [
            ("selection.min_viable_score", self.selection.min_viable_score),
            ("selection.soft_quota_override", self.selection.soft_quota_override),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(Error::Config(format!("{name} must be finite and >= 0")));
            }
        }
        if self.provider.rate_limit_capacity == 0 {
            return Err(Error::Config("provider.rate_limit_capacity must be > 0".into()));
        }
        if self.provider.rate_limit_per_sec == 0 {
            return Err(Error::Config("provider.rate_limit_per_sec must be > 0".into()));
        }
        if self.provider.retry.max_attempts == 0 {
            return Err(Error::Config("provider.retry.max_attempts must be >= 1".into()));
        }
        Ok(())
    }

    pub fn lane(&self, id: &str) -> Option<&LaneConfig> {
        self.lanes.iter().find(|l| l.id == id)
    }
}

fn check_unit(name: &str, v: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&v) {
        return Err(Error::Config(format!("{name} must be within [0, 1] (got {v})")));
    }
    Ok(())
}

fn check_multiplier(name: &str, v: f64) -> Result<()> {
    if !v.is_finite() || v < 0.0 {
        return Err(Error::Config(format!("{name} must be finite and >= 0 (got {v})")));
    }
    Ok(())
}

/// `Some(path)` when a config file should be read, `None` for defaults.
pub fn resolve_config_path() -> anyhow::Result<Option<PathBuf>> {
    if let Ok(p) = std::env::var(ENV_ENGINE_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(Some(pb));
        }
        return Err(anyhow!("{ENV_ENGINE_CONFIG_PATH} points to non-existent path"));
    }
    let default = PathBuf::from(DEFAULT_ENGINE_CONFIG_PATH);
    Ok(default.exists().then_some(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn defaults_validate() {
        let cfg = EngineConfig::default();
        cfg.validate().unwrap();
        assert!((cfg.scoring.weights.sum() - 1.0).abs() < 1e-9);
        assert!(cfg.lanes.is_empty());
        assert!(cfg.niches.is_empty());
    }

    #[test]
    fn partial_rule_tables_keep_their_own_defaults() {
        let cfg = EngineConfig::from_toml_str(
            r#"
            [validation.base]
            min_relevance = 0.4

            [validation.relaxed]
            max_explainability_seconds = 120
            "#,
        )
        .unwrap();
        let base = &cfg.validation.base;
        assert_eq!(base.min_relevance, 0.4);
        assert_eq!(base.min_source_count, 2);
        assert_eq!(base.max_explainability_seconds, 60);
        assert_eq!(base.valid_emotions, RuleSet::base().valid_emotions);

        let relaxed = &cfg.validation.relaxed;
        assert_eq!(relaxed.max_explainability_seconds, 120);
        assert_eq!(relaxed.min_source_count, 1);
        assert_eq!(relaxed.min_relevance, 0.3);
    }

    #[test]
    fn empty_document_is_defaults() {
        let cfg = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn bad_weight_sum_fails() {
        let err = EngineConfig::from_toml_str(
            r#"
            [scoring.weights]
            curiosity_gap = 0.5
            "#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn lanes_keep_order_and_lowercase_keywords() {
        let cfg = EngineConfig::from_toml_str(
            r#"
            [[lanes]]
            id = "b"
            keywords = [" Bitcoin "]
            percentage_min = 50

            [[lanes]]
            id = "a"
            keywords = ["Fed", ""]
            percentage_min = 50
            "#,
        )
        .unwrap();
        let ids: Vec<_> = cfg.lanes.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(cfg.lanes[0].keywords, vec!["bitcoin"]);
        assert_eq!(cfg.lanes[1].keywords, vec!["fed"]);
    }

    #[test]
    fn out_of_range_values_fail() {
        assert!(EngineConfig::from_toml_str("[dedup]\nsimilarity_threshold = 1.5").is_err());
        assert!(EngineConfig::from_toml_str(
            "[[lanes]]\nid = \"x\"\npercentage_min = 120"
        )
        .is_err());
        assert!(EngineConfig::from_toml_str(
            "[[niches]]\nname = \"x\"\nmultiplier = -1.0"
        )
        .is_err());
        assert!(EngineConfig::from_toml_str("not = [valid").is_err());
    }

    #[test]
    fn saturation_policy_parses() {
        let cfg = EngineConfig::from_toml_str(
            "[scoring.saturation]\nbeyond = \"floor\"\nfloor_value = 0.1",
        )
        .unwrap();
        assert_eq!(cfg.scoring.saturation.beyond, BeyondPolicy::Floor);
        assert_eq!(cfg.scoring.saturation.steps.len(), 4);
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_file_then_builtin() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_ENGINE_CONFIG_PATH);

        assert_eq!(EngineConfig::load_default().unwrap(), EngineConfig::default());

        fs::create_dir_all("config").unwrap();
        fs::write(DEFAULT_ENGINE_CONFIG_PATH, "[selection]\ndaily_count = 7").unwrap();
        assert_eq!(EngineConfig::load_default().unwrap().selection.daily_count, 7);

        let p = tmp.path().join("other.toml");
        fs::write(&p, "[selection]\ndaily_count = 9").unwrap();
        env::set_var(ENV_ENGINE_CONFIG_PATH, p.display().to_string());
        assert_eq!(EngineConfig::load_default().unwrap().selection.daily_count, 9);

        env::set_var(ENV_ENGINE_CONFIG_PATH, tmp.path().join("missing.toml"));
        assert!(EngineConfig::load_default().is_err());
        env::remove_var(ENV_ENGINE_CONFIG_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
