//! Text primitives shared by the stages: normalization, word tokens,
//! whole-word and phrase matching, Jaccard similarity, and a short hash for logs.

use std::collections::HashSet;

/// Lowercase and collapse whitespace runs into single spaces.
pub fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_space = false;
    for ch in input.chars().flat_map(char::to_lowercase) {
        if ch.is_whitespace() {
            if !last_space {
                out.push(' ');
                last_space = true;
            }
        } else {
            out.push(ch);
            last_space = false;
        }
    }
    out.trim().to_string()
}

/// Alphanumeric word tokens, lowercased. Apostrophes split words.
pub fn words(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

pub fn word_set(s: &str) -> HashSet<String> {
    words(s).collect()
}

/// Number of `terms` that appear as whole words in `text`.
/// Each term counts at most once.
pub fn count_words_present(text: &str, terms: &[&str]) -> usize {
    let set = word_set(text);
    terms.iter().filter(|t| set.contains(**t)).count()
}

/// Case-insensitive phrase containment on whitespace-normalized text.
pub fn contains_phrase(text: &str, phrase: &str) -> bool {
    let p = normalize(phrase);
    if p.is_empty() {
        return false;
    }
    normalize(text).contains(p.as_str())
}

/// Configured-keyword match: the keyword's words appear consecutively, the last
/// one as a word prefix. `crypto` matches "cryptocurrency"; `ai` does not match "said".
pub fn matches_keyword(text_words: &[String], keyword: &str) -> bool {
    let kw: Vec<String> = words(keyword).collect();
    let Some((last, head)) = kw.split_last() else {
        return false;
    };
    if text_words.len() < kw.len() {
        return false;
    }
    text_words.windows(kw.len()).any(|w| {
        w[..head.len()] == *head && w[head.len()].starts_with(last.as_str())
    })
}

/// Number of distinct `keywords` matched by `text` (see [`matches_keyword`]).
pub fn count_keyword_hits<S: AsRef<str>>(text: &str, keywords: &[S]) -> usize {
    let tw: Vec<String> = words(text).collect();
    keywords
        .iter()
        .filter(|k| matches_keyword(&tw, k.as_ref()))
        .count()
}

/// `|A ∩ B| / |A ∪ B|` over lowercase word sets; two empty titles score 0.
pub fn jaccard(a: &str, b: &str) -> f64 {
    let sa = word_set(a);
    let sb = word_set(b);
    let union = sa.union(&sb).count();
    if union == 0 {
        return 0.0;
    }
    sa.intersection(&sb).count() as f64 / union as f64
}

/// `title + " " + description`, the text every stage reasons about.
pub fn combined(title: &str, description: Option<&str>) -> String {
    format!("{} {}", title, description.unwrap_or_default())
}

/// First 12 hex chars of sha256; lets logs correlate titles without printing them.
pub fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jaccard_matches_hand_count() {
        let j = jaccard("Fed raises interest rates", "Fed hikes interest rates");
        assert!((j - 0.6).abs() < 1e-9);
        assert_eq!(jaccard("", ""), 0.0);
        assert!((jaccard("A b", "a B") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn whole_words_only() {
        // "how" must not be found inside "shows"
        assert_eq!(count_words_present("new study shows", &["how", "shows"]), 1);
        assert_eq!(count_words_present("Why? How!", &["why", "how", "what"]), 2);
    }

    #[test]
    fn phrase_match_is_case_and_space_insensitive() {
        assert!(contains_phrase("GUARANTEED   Return now", "guaranteed return"));
        assert!(!contains_phrase("guaranteed returns", ""));
        assert!(!contains_phrase("return guaranteed", "guaranteed return"));
    }

    #[test]
    fn keywords_match_word_prefixes() {
        assert_eq!(count_keyword_hits("Cryptocurrency rally", &["crypto"]), 1);
        assert_eq!(count_keyword_hits("he said so", &["ai"]), 0);
        assert_eq!(count_keyword_hits("AI chips surge", &["ai", "chip"]), 2);
        assert_eq!(
            count_keyword_hits("new artificial intelligence lab", &["artificial intelligence"]),
            1
        );
        assert_eq!(count_keyword_hits("intelligence artificial", &["artificial intelligence"]), 0);
        assert_eq!(count_keyword_hits("anything", &[""]), 0);
    }

    #[test]
    fn hash_is_short_and_stable() {
        let h = anon_hash("abc");
        assert_eq!(h.len(), 12);
        assert_eq!(h, anon_hash("abc"));
    }

    #[test]
    fn rounding() {
        assert_eq!(round2(1.005_1), 1.01);
        assert_eq!(round2(63.254), 63.25);
    }
}
