//! Backward search over the BWT matrix, row resolution, and the two
//! top-level query entry points.

use thiserror::Error;

use crate::genomics::index::FmIndex;

/// Sentinel "not found" offset returned by [`first_occurrence`].
pub const NOT_FOUND: i64 = -1;

/// Errors surfaced by the search/resolution layer. These indicate a
/// corrupt index rather than a malformed query, matching the logic-internal
/// error kind from the error-handling design: they must never be silently
/// swallowed.
#[derive(Debug, Error)]
pub enum SearchError {
    /// `resolve` walked more LF steps than `ssa_ival` without landing on a
    /// retained row. A correctly built index guarantees this cannot happen;
    /// seeing it means the downsampled suffix array or checkpoints are
    /// inconsistent with the BWT.
    #[error(
        "resolve exceeded {ssa_ival} LF steps from row {start_row} without reaching a stored SA entry"
    )]
    ResolveOverrun { start_row: usize, ssa_ival: usize },
}

/// Narrow the BWT-row interval to those rows whose suffix begins with
/// `query`, matching one character at a time from the right.
///
/// Returns a half-open `[l, r)` interval, empty when `l >= r`. `query` must
/// be non-empty for a meaningful result; an empty query returns the full
/// interval `[0, n)`.
pub fn bwm_range(idx: &FmIndex, query: &[u8]) -> (i64, i64) {
    let n = idx.len() as i64;
    let mut l: i64 = 0;
    let mut r: i64 = n - 1;

    for &ch in query.iter().rev() {
        let cnt_lt = idx.count_occurrences(ch) as i64;
        l = idx.rank(ch, l - 1) as i64 + cnt_lt;
        r = idx.rank(ch, r) as i64 + cnt_lt - 1;
        if r < l {
            return (l, l);
        }
    }
    (l, r + 1)
}

/// Resolve BWT row `row` to its offset in the original text via repeated
/// LF-mapping steps until a row retained by the downsampled suffix array is
/// reached.
///
/// Bounded by `ssa_ival` iterations: the downsampled SA stores at least one
/// row per `ssa_ival` consecutive text offsets, so a well-formed index
/// always terminates within that many steps. Exceeding it is treated as
/// index corruption rather than looped indefinitely.
pub fn resolve(idx: &FmIndex, row: usize) -> Result<usize, SearchError> {
    let start_row = row;
    let mut row = row;
    let mut steps = 0usize;
    let ssa_ival = idx.params().ssa_ival;
    loop {
        if let Some(offset) = idx.ssa_get(row) {
            return Ok(offset + steps);
        }
        if steps >= ssa_ival {
            return Err(SearchError::ResolveOverrun { start_row, ssa_ival });
        }
        let c = idx.bwt_at(row);
        let cnt_lt = idx.count_occurrences(c) as i64;
        row = (idx.rank(c, row as i64 - 1) as i64 + cnt_lt) as usize;
        steps += 1;
    }
}

/// Return the first text offset (in BWT-row order) where `query` occurs, or
/// [`NOT_FOUND`] if it does not occur at all.
///
/// `mismatches` is accepted for interface parity with the map/reduce driver
/// contract but is not consulted: the backward search below matches every
/// query character exactly.
pub fn first_occurrence(
    idx: &FmIndex,
    query: &[u8],
    _mismatches: usize,
) -> Result<i64, SearchError> {
    let (l, r) = bwm_range(idx, query);
    if l >= r {
        Ok(NOT_FOUND)
    } else {
        resolve(idx, l as usize).map(|off| off as i64)
    }
}

/// Return every text offset where `query` occurs, in BWT-row order (not
/// text order). See [`first_occurrence`] for the `mismatches` caveat.
pub fn all_occurrences(
    idx: &FmIndex,
    query: &[u8],
    _mismatches: usize,
) -> Result<Vec<usize>, SearchError> {
    let (l, r) = bwm_range(idx, query);
    if l >= r {
        return Ok(Vec::new());
    }
    (l..r).map(|row| resolve(idx, row as usize)).collect()
}
