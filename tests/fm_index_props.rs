use std::collections::HashSet;

use proptest::prelude::*;

use mr_fm_index::genomics::{
    all_occurrences, bwm_range, first_occurrence, FmIndex, IndexParams, SENTINEL,
};

fn naive_suffix_array(text: &[u8]) -> Vec<usize> {
    let mut sa: Vec<usize> = (0..text.len()).collect();
    sa.sort_by(|&a, &b| text[a..].cmp(&text[b..]));
    sa
}

fn naive_occurrences(text: &[u8], query: &[u8]) -> HashSet<usize> {
    if query.is_empty() || query.len() > text.len() {
        return HashSet::new();
    }
    (0..=text.len() - query.len())
        .filter(|&i| &text[i..i + query.len()] == query)
        .collect()
}

fn dna_reference() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(
        prop_oneof![Just(b'A'), Just(b'C'), Just(b'G'), Just(b'T'), Just(b'N')],
        1..80,
    )
}

fn dna_query() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(
        prop_oneof![Just(b'A'), Just(b'C'), Just(b'G'), Just(b'T')],
        1..6,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// SA is a permutation of `[0, n)`: resolving every row yields every text
    /// offset exactly once.
    #[test]
    fn sa_is_permutation(reference in dna_reference()) {
        let mut text = reference.clone();
        text.push(SENTINEL);
        let idx = FmIndex::build(&reference, IndexParams::default()).unwrap();
        prop_assert_eq!(idx.len(), text.len());

        let mut offsets: Vec<usize> = (0..idx.len())
            .map(|row| mr_fm_index::genomics::resolve(&idx, row).unwrap())
            .collect();
        offsets.sort_unstable();
        prop_assert_eq!(offsets, (0..text.len()).collect::<Vec<_>>());
    }

    /// Search soundness and completeness: `all_occurrences` agrees with a
    /// naive scan over the sentinel-terminated text, and every returned
    /// offset's suffix actually starts with the query.
    #[test]
    fn search_soundness_matches_naive_scan(
        reference in dna_reference(),
        query in dna_query(),
    ) {
        let mut text = reference.clone();
        text.push(SENTINEL);
        let idx = FmIndex::build(&reference, IndexParams::default()).unwrap();

        let found: HashSet<usize> = all_occurrences(&idx, &query, 0).unwrap().into_iter().collect();
        let expected = naive_occurrences(&text, &query);
        prop_assert_eq!(&found, &expected);

        for &offset in &found {
            prop_assert_eq!(&text[offset..offset + query.len()], query.as_slice());
        }
    }

    /// `first_occurrence` is `NOT_FOUND` exactly when `all_occurrences` is
    /// empty, and otherwise names a row that `all_occurrences` also returns.
    #[test]
    fn first_occurrence_consistent_with_all_occurrences(
        reference in dna_reference(),
        query in dna_query(),
    ) {
        let idx = FmIndex::build(&reference, IndexParams::default()).unwrap();
        let all = all_occurrences(&idx, &query, 0).unwrap();
        let first = first_occurrence(&idx, &query, 0).unwrap();

        if all.is_empty() {
            prop_assert_eq!(first, mr_fm_index::genomics::NOT_FOUND);
        } else {
            prop_assert!(all.contains(&(first as usize)));
        }
    }

    /// `bwm_range` always returns a valid (possibly empty) half-open range
    /// no wider than the indexed text.
    #[test]
    fn bwm_range_is_well_formed(reference in dna_reference(), query in dna_query()) {
        let idx = FmIndex::build(&reference, IndexParams::default()).unwrap();
        let (l, r) = bwm_range(&idx, &query);
        prop_assert!(l <= r);
        prop_assert!(r <= idx.len() as i64);
    }

    /// Round-tripping through the binary serialization format preserves
    /// equality.
    #[test]
    fn round_trip_preserves_index(reference in dna_reference()) {
        let idx = FmIndex::build(&reference, IndexParams::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idx.bin");
        idx.save(&path).unwrap();
        let loaded = FmIndex::load(&path).unwrap();
        prop_assert_eq!(idx, loaded);
    }

    /// Suffix array construction agrees with a naive sort on arbitrary small
    /// texts, covering the doubling algorithm's tie-break rules directly.
    #[test]
    fn suffix_array_matches_naive_sort(
        text in proptest::collection::vec(1u8..=4, 1..40)
    ) {
        let mut text = text;
        text.push(0u8); // byte 0 sorts below every generated symbol
        let sa = mr_fm_index::genomics::build_suffix_array(&text);
        prop_assert_eq!(sa, naive_suffix_array(&text));
    }
}
