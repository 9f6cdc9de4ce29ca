//! Narrative selection: lane assignment plus a greedy, quota-aware fill of the
//! daily slate.
//!
//! Quota targets are soft caps. A candidate whose lane has met its target is
//! admitted only when its score reaches `soft_quota_override` and no other lane
//! is still under target.

use std::collections::BTreeMap;

use crate::candidate::{Format, ScoreRecord, SelectedItem, SelectionPlan};
use crate::config::{EngineConfig, LaneConfig, SelectionConfig};
use crate::text::{anon_hash, count_keyword_hits, jaccard};

/// Keyword → lane mapping used when no configured lane matches.
const FALLBACK_LANES: &[(&[&str], &str)] = &[
    (&["crypto", "bitcoin"], "crypto_blockchain"),
    (&["stock", "market"], "stock_market"),
    (&["fed", "economy"], "macro_economics"),
    (&["psychology", "mind"], "investing_psychology"),
];
const DEFAULT_LANE: &str = "stock_market";

pub struct NarrativeSelector {
    lanes: Vec<LaneConfig>,
    cfg: SelectionConfig,
}

impl Default for NarrativeSelector {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl NarrativeSelector {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            lanes: cfg.lanes.clone(),
            cfg: cfg.selection.clone(),
        }
    }

    pub fn daily_count(&self) -> usize {
        self.cfg.daily_count
    }

    /// Lane with the most keyword hits in the title; ties by config order.
    pub fn assign_lane(&self, title: &str) -> String {
        let mut best: Option<(&str, usize)> = None;
        for lane in &self.lanes {
            let hits = count_keyword_hits(title, &lane.keywords);
            if hits > 0 && best.map_or(true, |(_, b)| hits > b) {
                best = Some((lane.id.as_str(), hits));
            }
        }
        match best {
            Some((id, _)) => id.to_string(),
            None => fallback_lane(title).to_string(),
        }
    }

    /// `max(1, floor(count · pct / 100))` per configured lane.
    pub fn quota_targets(&self, count: usize) -> BTreeMap<String, usize> {
        self.lanes
            .iter()
            .map(|l| {
                let t = (count as f64 * l.percentage_min / 100.0).floor() as usize;
                (l.id.clone(), t.max(1))
            })
            .collect()
    }

    pub fn select_daily_content(&self, scored: &[ScoreRecord], count: usize) -> SelectionPlan {
        let mut usage: BTreeMap<String, usize> =
            self.lanes.iter().map(|l| (l.id.clone(), 0)).collect();
        if scored.is_empty() {
            tracing::warn!(target: "selector", "empty input");
            return SelectionPlan {
                lane_distribution: usage,
                ..Default::default()
            };
        }

        let mut eligible: Vec<(&ScoreRecord, String)> = scored
            .iter()
            .filter(|s| s.final_score >= self.cfg.min_viable_score)
            .map(|s| (s, self.assign_lane(s.title())))
            .collect();
        eligible.sort_by(|a, b| b.0.final_score.total_cmp(&a.0.final_score));

        let targets = self.quota_targets(count);
        let mut picked: Vec<(&ScoreRecord, String)> = Vec::new();

        for (idx, (rec, lane)) in eligible.iter().enumerate() {
            if picked.len() >= count {
                break;
            }
            if picked
                .iter()
                .any(|(p, _)| jaccard(rec.title(), p.title()) > self.cfg.near_duplicate_jaccard)
            {
                tracing::debug!(target: "selector", id = %rec.id(), "near-duplicate title; skipped");
                continue;
            }

            let used = usage.get(lane).copied().unwrap_or(0);
            if let Some(&target) = targets.get(lane) {
                if used >= target {
                    let rest = &eligible[idx + 1..];
                    let other_under = targets.iter().any(|(l, t)| {
                        l != lane
                            && usage.get(l).copied().unwrap_or(0) < *t
                            && (!self.cfg.quota_gap_requires_supply
                                || rest.iter().any(|(_, l2)| l2 == l))
                    });
                    if rec.final_score < self.cfg.soft_quota_override || other_under {
                        tracing::debug!(
                            target: "selector",
                            id = %rec.id(),
                            lane = %lane,
                            "lane at target; skipped"
                        );
                        continue;
                    }
                }
            }

            *usage.entry(lane.clone()).or_insert(0) += 1;
            picked.push((*rec, lane.clone()));
        }

        // Admitted in score order already; keep the sort explicit for callers
        // that rely on it.
        picked.sort_by(|a, b| b.0.final_score.total_cmp(&a.0.final_score));
        let mut items = picked.into_iter().enumerate().map(|(i, (rec, lane))| SelectedItem {
            scored: rec.clone(),
            narrative_lane: lane,
            format: if i == 0 { Format::Long } else { Format::Short },
        });
        let long: Vec<SelectedItem> = items.next().into_iter().collect();
        let shorts: Vec<SelectedItem> = items.collect();
        let total_selected = long.len() + shorts.len();

        for it in long.iter().chain(shorts.iter()) {
            tracing::debug!(
                target: "selector",
                id = %it.scored.id(),
                title_hash = %anon_hash(it.title()),
                lane = %it.narrative_lane,
                score = it.final_score(),
                "selected"
            );
        }
        tracing::info!(
            target: "selector",
            eligible = eligible.len(),
            selected = total_selected,
            requested = count,
            "selection complete"
        );
        if total_selected < count {
            tracing::warn!(target: "selector", selected = total_selected, requested = count, "slate under-filled");
        }

        SelectionPlan {
            shorts,
            long,
            lane_distribution: usage,
            total_selected,
        }
    }
}

fn fallback_lane(title: &str) -> &'static str {
    FALLBACK_LANES
        .iter()
        .find(|(kws, _)| count_keyword_hits(title, kws) > 0)
        .map(|(_, lane)| *lane)
        .unwrap_or(DEFAULT_LANE)
}
