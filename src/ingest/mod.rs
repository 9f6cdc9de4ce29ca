// src/ingest/mod.rs
//! Raw candidate collection: fetch from sources, normalize, assign ids, and top
//! up with evergreen topics when live supply is thin.

pub mod providers;
pub mod types;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;

use crate::candidate::Candidate;
use crate::ingest::types::TrendSource;

/// Fewer live candidates than this triggers the evergreen top-up.
pub const MIN_LIVE_CANDIDATES: usize = 5;
pub const EVERGREEN_SOURCE: &str = "evergreen";

const EVERGREEN_TOPICS: &[(&str, &str)] = &[
    ("Stock market basics every beginner should know", "Core investing principles explained simply"),
    ("How dividend investing builds income", "Building a portfolio that pays you"),
    ("What is moving crypto this week", "Trends across cryptocurrency markets"),
    ("Why most trading strategies fail", "What technical analysis can and cannot do"),
    ("Market psychology: fear and greed", "How emotion drives market cycles"),
    ("How the Fed affects your money", "Central bank policy and household finances"),
    ("Passive income myths", "What actually generates long-term wealth"),
    ("How to prepare for a recession", "Protecting assets during downturns"),
    ("The hidden power of compound interest", "Why time in the market matters"),
    ("ETFs vs individual stocks", "Diversification trade-offs explained"),
];

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_events_total", "Total items parsed from trend sources.");
        describe_counter!("ingest_kept_total", "Candidates kept after normalization.");
        describe_counter!("ingest_evergreen_total", "Evergreen topics added as top-up.");
        describe_counter!("ingest_provider_errors_total", "Trend source fetch/parse errors.");
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!("ingest_last_run_ts", "Unix ts when ingest last ran.");
    });
}

/// Normalize text: decode entities, strip tags, fold quotes, collapse
/// whitespace, strip trailing punctuation, cap length.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, "").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("whitespace regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    while let Some(last) = out.chars().last() {
        if matches!(last, '!' | '?' | '.' | ',') {
            out.pop();
        } else {
            break;
        }
    }

    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }
    out
}

pub fn evergreen_topics() -> Vec<Candidate> {
    EVERGREEN_TOPICS
        .iter()
        .enumerate()
        .map(|(i, (title, desc))| {
            Candidate::new(format!("evergreen_{i}"), *title, EVERGREEN_SOURCE).with_description(*desc)
        })
        .collect()
}

/// Normalize, drop empty titles, assign missing ids, top up from evergreen.
pub fn finalize(raw: Vec<Candidate>, now: DateTime<Utc>) -> Vec<Candidate> {
    let unix = now.timestamp();
    let mut out: Vec<Candidate> = Vec::with_capacity(raw.len());
    for mut c in raw {
        c.title = normalize_text(&c.title);
        if c.title.is_empty() {
            continue;
        }
        c.description = c
            .description
            .as_deref()
            .map(normalize_text)
            .filter(|d| !d.is_empty());
        c.origin_count = c.origins();
        out.push(c);
    }
    for (i, c) in out.iter_mut().enumerate() {
        if c.id.trim().is_empty() {
            c.id = format!("trend_{unix}_{i}");
        }
    }

    let live = out.len();
    counter!("ingest_kept_total").increment(live as u64);
    if live < MIN_LIVE_CANDIDATES {
        let seen: HashSet<String> = out.iter().map(|c| c.title.to_lowercase()).collect();
        let extra: Vec<Candidate> = evergreen_topics()
            .into_iter()
            .filter(|c| !seen.contains(&c.title.to_lowercase()))
            .collect();
        tracing::warn!(
            target: "ingest",
            live,
            added = extra.len(),
            "low live trend count; adding evergreen topics"
        );
        counter!("ingest_evergreen_total").increment(extra.len() as u64);
        out.extend(extra);
    }
    out
}

/// Fetch every source; failures are logged and counted, never fatal.
pub async fn collect(sources: &[Box<dyn TrendSource>], now: DateTime<Utc>) -> Vec<Candidate> {
    ensure_metrics_described();

    let mut raw = Vec::new();
    for s in sources {
        match s.fetch().await {
            Ok(mut v) => {
                tracing::info!(target: "ingest", source = s.name(), count = v.len(), "fetched");
                raw.append(&mut v);
            }
            Err(e) => {
                tracing::warn!(target: "ingest", error = %e, source = s.name(), "source error");
                counter!("ingest_provider_errors_total").increment(1);
            }
        }
    }

    let out = finalize(raw, now);
    gauge!("ingest_last_run_ts").set(now.timestamp() as f64);
    tracing::info!(target: "ingest", total = out.len(), "ingest complete");
    out
}
