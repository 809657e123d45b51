//! Fuzzy text similarity for plagiarism warnings.

use std::collections::HashMap;

/// Scores how alike two extracted texts are.
pub trait SimilarityScorer: Send + Sync {
    /// Symmetric score in `[0, 100]`.
    fn score(&self, a: &str, b: &str) -> u8;

    /// The highest score `score(a, b)` could possibly return, if cheaply
    /// known. Lets the pipeline skip pairs that cannot cross the threshold.
    fn upper_bound(&self, _a: &str, _b: &str) -> Option<u8> {
        None
    }
}

/// Indel-distance ratio: `100 * 2 * LCS(a, b) / (len(a) + len(b))`, rounded,
/// over Unicode scalar values. Either side empty scores 0.
///
/// Equivalent to `100 * (lensum - dist) / lensum` where `dist` is the
/// insert/delete edit distance.
#[derive(Debug, Default, Clone, Copy)]
pub struct RatioScorer;

impl SimilarityScorer for RatioScorer {
    fn score(&self, a: &str, b: &str) -> u8 {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        if a.is_empty() || b.is_empty() {
            return 0;
        }
        let lcs = lcs_len(&a, &b);
        to_percent(2 * lcs, a.len() + b.len())
    }

    fn upper_bound(&self, a: &str, b: &str) -> Option<u8> {
        let (la, lb) = (a.chars().count(), b.chars().count());
        if la == 0 || lb == 0 {
            return Some(0);
        }
        Some(to_percent(2 * la.min(lb), la + lb))
    }
}

fn to_percent(num: usize, den: usize) -> u8 {
    ((num as f64 * 100.0) / den as f64)
        .round_ties_even()
        .clamp(0.0, 100.0) as u8
}

/// Length of the longest common subsequence, bit-parallel over 64-bit words
/// (Hyyrö's formulation). Runs in `O(len(b) * ceil(len(a) / 64))`.
pub(crate) fn lcs_len(a: &[char], b: &[char]) -> usize {
    // The shorter side is the bit pattern.
    let (pattern, text) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let m = pattern.len();
    if m == 0 {
        return 0;
    }
    let words = m.div_ceil(64);

    let mut peq: HashMap<char, Vec<u64>> = HashMap::new();
    for (i, &c) in pattern.iter().enumerate() {
        peq.entry(c).or_insert_with(|| vec![0; words])[i / 64] |= 1u64 << (i % 64);
    }

    let zeros = vec![0u64; words];
    let mut v = vec![u64::MAX; words];
    for c in text {
        let mask = peq.get(c).unwrap_or(&zeros);
        let mut carry = 0u64;
        for (vw, &mw) in v.iter_mut().zip(mask) {
            let u = *vw & mw;
            let (sum, c1) = vw.overflowing_add(u);
            let (sum, c2) = sum.overflowing_add(carry);
            carry = u64::from(c1 || c2);
            *vw = sum | (*vw & !mw);
        }
    }

    let tail_bits = m % 64;
    v.iter()
        .enumerate()
        .map(|(i, &w)| {
            let w = if i == words - 1 && tail_bits != 0 {
                w | !((1u64 << tail_bits) - 1)
            } else {
                w
            };
            w.count_zeros() as usize
        })
        .sum()
}
