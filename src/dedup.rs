//! Semantic deduplication.
//!
//! Greedy single-link-from-seed clustering: each unclustered candidate seeds a
//! cluster and absorbs every later unclustered candidate whose similarity *to
//! the seed* reaches the threshold. The seed is the representative. Candidates
//! without an embedding are singletons.

use std::collections::{BTreeSet, HashMap};

use metrics::counter;

use crate::candidate::Candidate;
use crate::config::DedupConfig;
use crate::providers::{DynProvider, Embedding};
use crate::text::anon_hash;

pub struct SemanticDeduplicator {
    provider: DynProvider,
    threshold: f32,
}

impl SemanticDeduplicator {
    pub fn new(provider: DynProvider, threshold: f32) -> Self {
        Self {
            provider,
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(provider: DynProvider, cfg: &DedupConfig) -> Self {
        Self::new(provider, cfg.similarity_threshold)
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// One representative per cluster, in seed order. Never fails: a provider
    /// error degrades every candidate to its own cluster.
    ///
    /// The representative's `origin_count` is the cluster size. Any incoming
    /// count, e.g. from `merge_origins`, is replaced, so a singleton always
    /// comes back with 1.
    pub async fn deduplicate(&self, candidates: &[Candidate]) -> Vec<Candidate> {
        if candidates.is_empty() {
            tracing::warn!(target: "dedup", "empty input");
            return Vec::new();
        }

        let texts: Vec<String> = candidates.iter().map(Candidate::text).collect();
        let embeddings = match self.provider.embed_batch(&texts).await {
            Ok(v) if v.len() == texts.len() => v,
            Ok(v) => {
                tracing::warn!(
                    target: "dedup",
                    provider = self.provider.name(),
                    expected = texts.len(),
                    got = v.len(),
                    "embedding count mismatch; treating all candidates as distinct"
                );
                vec![None; texts.len()]
            }
            Err(e) => {
                counter!("provider_errors_total", "reason" => e.kind()).increment(1);
                tracing::warn!(
                    target: "dedup",
                    provider = self.provider.name(),
                    error = %e,
                    "embedding failed; treating all candidates as distinct"
                );
                vec![None; texts.len()]
            }
        };

        let provider = &self.provider;
        let clusters =
            cluster_by_similarity(&embeddings, self.threshold, |a, b| provider.similarity(a, b));
        counter!("dedup_clusters_total").increment(clusters.len() as u64);

        let out: Vec<Candidate> = clusters
            .iter()
            .map(|members| annotate(candidates, members))
            .collect();

        tracing::info!(
            target: "dedup",
            input = candidates.len(),
            output = out.len(),
            "deduplication complete"
        );
        out
    }
}

fn annotate(all: &[Candidate], members: &[usize]) -> Candidate {
    let mut rep = all[members[0]].clone();
    rep.origin_count = members.len() as u32;
    if members.len() > 1 {
        let sources: BTreeSet<String> = members
            .iter()
            .map(|&i| all[i].source.clone())
            .filter(|s| !s.is_empty())
            .collect();
        rep.consensus_sources = Some(sources);
        rep.cluster_size = Some(members.len());
        tracing::debug!(
            target: "dedup",
            id = %rep.id,
            title_hash = %anon_hash(&rep.title),
            size = members.len(),
            "cluster"
        );
    }
    rep
}

/// Index clusters over `embeddings`; the first index of each cluster is its seed.
pub fn cluster_by_similarity<F>(
    embeddings: &[Option<Embedding>],
    threshold: f32,
    similarity: F,
) -> Vec<Vec<usize>>
where
    F: Fn(&[f32], &[f32]) -> f32,
{
    let mut assigned = vec![false; embeddings.len()];
    let mut clusters = Vec::new();

    for seed in 0..embeddings.len() {
        if assigned[seed] {
            continue;
        }
        assigned[seed] = true;
        let mut members = vec![seed];
        if let Some(seed_emb) = &embeddings[seed] {
            for j in seed + 1..embeddings.len() {
                if assigned[j] {
                    continue;
                }
                if let Some(e) = &embeddings[j] {
                    if similarity(seed_emb, e) >= threshold {
                        assigned[j] = true;
                        members.push(j);
                    }
                }
            }
        }
        clusters.push(members);
    }
    clusters
}

/// Exact title merge (case-insensitive, trimmed). Empty titles are dropped;
/// output keeps first-appearance order.
pub fn merge_origins(candidates: &[Candidate]) -> Vec<Candidate> {
    let mut order: Vec<Candidate> = Vec::new();
    let mut by_title: HashMap<String, usize> = HashMap::new();

    for c in candidates {
        let key = c.title.trim().to_lowercase();
        if key.is_empty() {
            continue;
        }
        match by_title.get(&key) {
            Some(&i) => {
                let m = &mut order[i];
                m.origin_count += 1;
                if !c.source.is_empty() {
                    m.sources.get_or_insert_with(BTreeSet::new).insert(c.source.clone());
                }
            }
            None => {
                let mut m = c.clone();
                m.origin_count = 1;
                let mut sources = BTreeSet::new();
                if !c.source.is_empty() {
                    sources.insert(c.source.clone());
                }
                m.sources = Some(sources);
                by_title.insert(key, order.len());
                order.push(m);
            }
        }
    }

    tracing::info!(target: "dedup", input = candidates.len(), output = order.len(), "origin merge complete");
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(v: &[f32]) -> Option<Embedding> {
        Some(v.to_vec())
    }

    #[test]
    fn seed_link_is_not_transitive() {
        // b ~ a, c ~ b, but c is far from a: c must seed its own cluster.
        let embs = vec![e(&[1.0, 0.0]), e(&[0.8, 0.6]), e(&[0.28, 0.96])];
        let clusters =
            cluster_by_similarity(&embs, 0.75, crate::providers::cosine_similarity);
        assert_eq!(clusters, vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn missing_embeddings_are_singletons() {
        let embs = vec![None, e(&[1.0, 0.0]), None, e(&[1.0, 0.0])];
        let clusters =
            cluster_by_similarity(&embs, 0.75, crate::providers::cosine_similarity);
        assert_eq!(clusters, vec![vec![0], vec![1, 3], vec![2]]);
    }

    #[test]
    fn cluster_size_replaces_incoming_origin_count() {
        let all = vec![
            Candidate::new("a", "Fed holds rates", "wire").with_origin_count(3),
            Candidate::new("b", "Fed keeps rates", "paper").with_origin_count(5),
        ];
        assert_eq!(annotate(&all, &[0]).origin_count, 1);
        let rep = annotate(&all, &[0, 1]);
        assert_eq!(rep.origin_count, 2);
        assert_eq!(rep.cluster_size, Some(2));
    }

    #[test]
    fn merge_counts_and_drops_empty_titles() {
        let input = vec![
            Candidate::new("1", "Test", "reddit"),
            Candidate::new("2", "  test ", "hackernews"),
            Candidate::new("3", "", "reddit"),
            Candidate::new("4", "Other", "reddit"),
        ];
        let out = merge_origins(&input);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, "1");
        assert_eq!(out[0].origin_count, 2);
        let s: Vec<_> = out[0].sources.as_ref().unwrap().iter().cloned().collect();
        assert_eq!(s, vec!["hackernews".to_string(), "reddit".to_string()]);
        assert_eq!(out[1].origin_count, 1);
    }
}
