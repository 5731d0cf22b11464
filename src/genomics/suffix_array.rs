//! Suffix array construction by integer-key doubling (Manber-Myers).

use std::collections::HashMap;

/// Build the suffix array of `text` (which must already carry its sentinel).
///
/// Produces dense integer ranks per round by sorting `(rank(i), rank(i+k))`
/// composite keys; each round doubles `k` until every suffix has a unique
/// rank, which happens within `ceil(log2(n))` rounds. Out-of-range second
/// keys are treated as `-1`, the lowest possible bucket, so shorter suffixes
/// always sort before their extensions.
pub fn build_suffix_array(text: &[u8]) -> Vec<usize> {
    let n = text.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![0];
    }

    let mut keys = initial_ranks(text);
    let mut k = 1usize;

    while *keys.iter().max().unwrap() < n - 1 {
        let second_key = |keys: &[usize], i: usize| -> i64 {
            if i + k < n {
                keys[i + k] as i64
            } else {
                -1
            }
        };

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by_key(|&i| (keys[i], second_key(&keys, i)));

        let mut new_keys = vec![0usize; n];
        for w in 1..n {
            let prev = order[w - 1];
            let cur = order[w];
            let same = keys[prev] == keys[cur] && second_key(&keys, prev) == second_key(&keys, cur);
            new_keys[cur] = new_keys[prev] + usize::from(!same);
        }
        keys = new_keys;

        k <<= 1;
        if k > n {
            // Every suffix has been distinguished; guards against an
            // infinite loop on pathological inputs.
            break;
        }
    }

    let mut sa = vec![0usize; n];
    for (i, &rank) in keys.iter().enumerate() {
        sa[rank] = i;
    }
    sa
}

/// Rank of each byte among the distinct bytes of `text`, sorted ascending.
fn initial_ranks(text: &[u8]) -> Vec<usize> {
    let mut distinct: Vec<u8> = text.to_vec();
    distinct.sort_unstable();
    distinct.dedup();

    let index: HashMap<u8, usize> = distinct.iter().enumerate().map(|(i, &b)| (b, i)).collect();
    text.iter().map(|b| index[b]).collect()
}
