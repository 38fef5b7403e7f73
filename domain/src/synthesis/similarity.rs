//! Text similarity used for agreement scoring.
//!
//! Similarity is Jaccard overlap of lowercase alphanumeric word sets:
//! `|A ∩ B| / |A ∪ B|`. Two texts without any words are identical (1.0).

use std::collections::HashSet;

/// Lowercase alphanumeric word set of `text`.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Jaccard index of two word sets.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Word-set similarity of two texts, in `[0, 1]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    jaccard(&tokenize(a), &tokenize(b))
}

/// Fraction of unordered pairs whose similarity is at least `threshold`.
///
/// One text agrees with itself (1.0); no texts means no agreement (0.0).
pub fn pairwise_agreement<S: AsRef<str>>(texts: &[S], threshold: f64) -> f64 {
    match texts.len() {
        0 => 0.0,
        1 => 1.0,
        n => {
            let sets: Vec<_> = texts.iter().map(|t| tokenize(t.as_ref())).collect();
            let mut agreeing = 0usize;
            for i in 0..n {
                for j in (i + 1)..n {
                    if jaccard(&sets[i], &sets[j]) >= threshold {
                        agreeing += 1;
                    }
                }
            }
            agreeing as f64 / (n * (n - 1) / 2) as f64
        }
    }
}
