//! Content fingerprints and the duplicate index consulted by the Clean stage.

use std::collections::{BTreeSet, HashMap, HashSet};

use corpus_core::common::hash::stable_hash64;
use sha2::{Digest, Sha256};

const SHINGLE_WIDTH: usize = 3;
const LENGTH_BUCKET_CHARS: usize = 128;

/// Exact content hash plus a shingled similarity signature.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    pub exact: String,
    pub shingles: BTreeSet<u64>,
    pub length_bucket: usize,
}

/// Fingerprint a chunk's content: SHA-256 over the raw text for exact
/// matching, word 3-shingles over the lowercased text for near matching.
pub fn compute_fingerprint(content: &str) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let exact = hex::encode(hasher.finalize());

    let lowered = content.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    let mut shingles = BTreeSet::new();
    if words.len() < SHINGLE_WIDTH {
        for word in &words {
            shingles.insert(stable_hash64(word.as_bytes()));
        }
    } else {
        for window in words.windows(SHINGLE_WIDTH) {
            shingles.insert(stable_hash64(window.join(" ").as_bytes()));
        }
    }

    Fingerprint {
        exact,
        shingles,
        length_bucket: content.chars().count() / LENGTH_BUCKET_CHARS,
    }
}

fn jaccard(a: &BTreeSet<u64>, b: &BTreeSet<u64>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Duplicate detector shared across worker tasks for the duration of a run.
/// Grows monotonically; not persisted. On resume it is rebuilt from the
/// committed Clean-stage output.
#[derive(Debug)]
pub struct DedupIndex {
    threshold: f64,
    exact: HashSet<String>,
    // similarity candidates bucketed by content length
    buckets: HashMap<usize, Vec<BTreeSet<u64>>>,
    registered: usize,
}

impl DedupIndex {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            exact: HashSet::new(),
            buckets: HashMap::new(),
            registered: 0,
        }
    }

    /// Exact hash membership first; similarity fallback is limited to the
    /// neighboring length buckets so the candidate set stays bounded.
    pub fn is_duplicate(&self, fingerprint: &Fingerprint) -> bool {
        if self.exact.contains(&fingerprint.exact) {
            return true;
        }
        let bucket = fingerprint.length_bucket;
        let range = bucket.saturating_sub(1)..=bucket + 1;
        for candidate_bucket in range {
            if let Some(candidates) = self.buckets.get(&candidate_bucket) {
                for candidate in candidates {
                    if jaccard(&fingerprint.shingles, candidate) >= self.threshold {
                        return true;
                    }
                }
            }
        }
        false
    }

    pub fn register(&mut self, fingerprint: Fingerprint) {
        self.exact.insert(fingerprint.exact);
        self.buckets
            .entry(fingerprint.length_bucket)
            .or_default()
            .push(fingerprint.shingles);
        self.registered += 1;
    }

    pub fn len(&self) -> usize {
        self.registered
    }

    pub fn is_empty(&self) -> bool {
        self.registered == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_duplicate_is_detected() {
        let mut index = DedupIndex::new(0.9);
        let text = "The reservoir level rose after three days of rainfall.";
        index.register(compute_fingerprint(text));
        assert!(index.is_duplicate(&compute_fingerprint(text)));
    }

    #[test]
    fn near_duplicate_above_threshold_is_detected() {
        let mut index = DedupIndex::new(0.5);
        let a = "The reservoir level rose steadily after three days of heavy rainfall across the basin and flood gates were opened downstream.";
        let b = "The reservoir level rose steadily after three days of heavy rainfall across the basin and flood gates were opened later.";
        index.register(compute_fingerprint(a));
        assert!(index.is_duplicate(&compute_fingerprint(b)));
    }

    #[test]
    fn distinct_content_is_not_flagged() {
        let mut index = DedupIndex::new(0.9);
        index.register(compute_fingerprint(
            "Groundwater recharge depends on soil infiltration capacity.",
        ));
        assert!(!index.is_duplicate(&compute_fingerprint(
            "The levee inspection schedule was moved to early spring."
        )));
    }

    #[test]
    fn fingerprints_are_stable_across_calls() {
        let a = compute_fingerprint("discharge measurements at the gauging station");
        let b = compute_fingerprint("discharge measurements at the gauging station");
        assert_eq!(a.exact, b.exact);
        assert_eq!(a.shingles, b.shingles);
        assert_eq!(a.length_bucket, b.length_bucket);
    }
}
