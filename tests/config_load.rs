// tests/config_load.rs
//
// Engine config resolution: env override, shipped sample, load-time validation.
// Env-mutating tests run serially.

use std::path::Path;

use serial_test::serial;

use trend_slate::config::{EngineConfig, ProviderKind, RuleSet, ENV_ENGINE_CONFIG_PATH};
use trend_slate::scoring::VpsScorer;
use trend_slate::selector::NarrativeSelector;

#[test]
fn shipped_sample_is_valid() {
    let cfg = EngineConfig::load_from(Path::new("config/engine.toml")).expect("sample config");
    assert_eq!(cfg.lanes.len(), 4);
    assert_eq!(cfg.niches[0].name, "finance");
    assert_eq!(cfg.provider.kind, ProviderKind::Lexical);
    assert!(!cfg.safety.hard_blocklist.is_empty());
}

#[test]
#[serial]
fn env_path_overrides_default() {
    let tmp = tempfile::tempdir().unwrap();
    let p = tmp.path().join("engine.toml");
    std::fs::write(
        &p,
        r#"
[selection]
daily_count = 7

[[lanes]]
id = "Only_Lane"
keywords = ["Stock"]
percentage_min = 100.0
"#,
    )
    .unwrap();

    std::env::set_var(ENV_ENGINE_CONFIG_PATH, &p);
    let cfg = EngineConfig::load_default();
    std::env::remove_var(ENV_ENGINE_CONFIG_PATH);

    let cfg = cfg.expect("env config loads");
    assert_eq!(cfg.selection.daily_count, 7);
    assert_eq!(cfg.lanes.len(), 1);
    assert_eq!(cfg.lanes[0].keywords, vec!["stock".to_string()]);
}

#[test]
#[serial]
fn env_path_to_missing_file_is_an_error() {
    std::env::set_var(ENV_ENGINE_CONFIG_PATH, "/definitely/not/here.toml");
    let res = EngineConfig::load_default();
    std::env::remove_var(ENV_ENGINE_CONFIG_PATH);
    assert!(res.is_err());
}

#[test]
fn bad_documents_are_rejected() {
    for doc in [
        "[scoring.weights]\nemotional_charge = 0.5",
        "[[lanes]]\nid = \"a\"\n[[lanes]]\nid = \"a\"",
        "[[lanes]]\nid = \"a\"\npercentage_min = 120.0",
        "[dedup]\nsimilarity_threshold = 1.5",
        "[scoring.saturation]\nsteps = [{ max_competitors = 5, factor = 1.0 }, { max_competitors = 2, factor = 1.8 }]",
        "[provider]\nrate_limit_capacity = 0",
        "[provider]\nrate_limit_per_sec = 0",
        "[selection\n",
    ] {
        assert!(EngineConfig::from_toml_str(doc).is_err(), "accepted: {doc}");
    }
}

#[test]
fn empty_document_has_no_niches_or_lanes() {
    let cfg = EngineConfig::from_toml_str("").unwrap();
    assert!(cfg.niches.is_empty());
    assert!(cfg.lanes.is_empty());

    let (niche, m) = VpsScorer::from_config(&cfg).detect_niche("Stock market rally");
    assert_eq!(niche, "general");
    assert_eq!(m, 1.0);
    assert!(NarrativeSelector::from_config(&cfg).quota_targets(5).is_empty());
}

#[test]
fn partial_validation_table_loads() {
    let cfg = EngineConfig::from_toml_str("[validation.base]\nmin_relevance = 0.4\n").unwrap();
    assert_eq!(cfg.validation.base.min_relevance, 0.4);
    assert_eq!(cfg.validation.base.min_source_count, RuleSet::base().min_source_count);
    assert_eq!(cfg.validation.relaxed, RuleSet::relaxed());
}
