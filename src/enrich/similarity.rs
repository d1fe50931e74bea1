//! Ratcliff/Obershelp-style sequence ratio and LCS highlight spans, grounded
//! on `examples/original_source/sniffer/pigeon_pids_query/pigeon_bis_query.py`
//! (`_similarity` wraps `difflib.SequenceMatcher.ratio`; `_lcs_highlight_spans`
//! is a hand-rolled LCS). Both operate on `Vec<char>` so multi-byte UTF-8
//! names index correctly.

use std::collections::HashMap;

fn b2j_index(b: &[char]) -> HashMap<char, Vec<usize>> {
    let mut map: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, &c) in b.iter().enumerate() {
        map.entry(c).or_default().push(j);
    }
    map
}

fn longest_match(
    a: &[char],
    alo: usize,
    ahi: usize,
    b: &[char],
    blo: usize,
    bhi: usize,
    b2j: &HashMap<char, Vec<usize>>,
) -> (usize, usize, usize) {
    let mut best_i = alo;
    let mut best_j = blo;
    let mut best_size = 0usize;
    let mut j2len: HashMap<usize, usize> = HashMap::new();

    for i in alo..ahi {
        let mut new_j2len: HashMap<usize, usize> = HashMap::new();
        if let Some(js) = b2j.get(&a[i]) {
            for &j in js {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = j.checked_sub(1).and_then(|jm1| j2len.get(&jm1)).copied().unwrap_or(0) + 1;
                new_j2len.insert(j, k);
                if k > best_size {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_size = k;
                }
            }
        }
        j2len = new_j2len;
    }
    (best_i, best_j, best_size)
}

fn matching_blocks(a: &[char], b: &[char]) -> Vec<(usize, usize, usize)> {
    let b2j = b2j_index(b);
    let mut stack = vec![(0usize, a.len(), 0usize, b.len())];
    let mut blocks = Vec::new();
    while let Some((alo, ahi, blo, bhi)) = stack.pop() {
        let (i, j, k) = longest_match(a, alo, ahi, b, blo, bhi, &b2j);
        if k > 0 {
            blocks.push((i, j, k));
            if alo < i && blo < j {
                stack.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                stack.push((i + k, ahi, j + k, bhi));
            }
        }
    }
    blocks
}

/// `2 * M / (len(a) + len(b))` where `M` is the total length of all matching
/// blocks found by the Ratcliff/Obershelp recursive longest-match procedure.
/// Returns 0 if either input is empty, matching the source's guard.
pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let av: Vec<char> = a.chars().collect();
    let bv: Vec<char> = b.chars().collect();
    let matches: usize = matching_blocks(&av, &bv).iter().map(|(_, _, k)| k).sum();
    2.0 * matches as f64 / (av.len() + bv.len()) as f64
}

/// Longest-common-subsequence highlight indices in `a`, merged into maximal
/// half-open ranges. Used to mark which characters of a raw matcher name line
/// up with the consignor name for front-end rendering.
pub fn lcs_highlight_spans(a: &str, b: &str) -> Vec<(usize, usize)> {
    let av: Vec<char> = a.chars().collect();
    let bv: Vec<char> = b.chars().collect();
    let (n, m) = (av.len(), bv.len());
    if n == 0 || m == 0 {
        return Vec::new();
    }

    let mut dp = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            dp[i][j] = if av[i] == bv[j] {
                dp[i + 1][j + 1] + 1
            } else {
                dp[i + 1][j].max(dp[i][j + 1])
            };
        }
    }

    let mut i = 0;
    let mut j = 0;
    let mut idxs = Vec::new();
    while i < n && j < m {
        if av[i] == bv[j] {
            idxs.push(i);
            i += 1;
            j += 1;
        } else if dp[i + 1][j] >= dp[i][j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }

    let Some(&first) = idxs.first() else {
        return Vec::new();
    };
    let mut spans = Vec::new();
    let mut start = first;
    let mut prev = first;
    for &k in &idxs[1..] {
        if k == prev + 1 {
            prev = k;
        } else {
            spans.push((start, prev + 1));
            start = k;
            prev = k;
        }
    }
    spans.push((start, prev + 1));
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_identical_strings_is_one() {
        assert_eq!(ratio("pigeon", "pigeon"), 1.0);
    }

    #[test]
    fn ratio_empty_is_zero() {
        assert_eq!(ratio("", "pigeon"), 0.0);
        assert_eq!(ratio("pigeon", ""), 0.0);
    }

    #[test]
    fn ratio_disjoint_strings_is_zero() {
        assert_eq!(ratio("abc", "xyz"), 0.0);
    }

    #[test]
    fn ratio_handles_multibyte_unicode() {
        let r = ratio("张三", "张三丰");
        assert!(r > 0.0 && r < 1.0);
    }

    #[test]
    fn lcs_spans_merge_adjacent_matches() {
        let spans = lcs_highlight_spans("abcdef", "abxxdef");
        assert_eq!(spans, vec![(0, 2), (3, 6)]);
    }

    #[test]
    fn lcs_spans_empty_for_no_overlap() {
        assert!(lcs_highlight_spans("abc", "xyz").is_empty());
    }

    #[test]
    fn lcs_spans_empty_for_empty_input() {
        assert!(lcs_highlight_spans("", "abc").is_empty());
        assert!(lcs_highlight_spans("abc", "").is_empty());
    }
}
