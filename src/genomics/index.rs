//! Index assembly, first-column table, and binary persistence.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::ops::Bound;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::genomics::checkpoints::{RankCheckpoints, DEFAULT_CP_IVAL};
use crate::genomics::downsampled_sa::{DownsampledSA, DEFAULT_SSA_IVAL};
use crate::genomics::suffix_array::build_suffix_array;

/// Sentinel byte appended to the reference if not already present.
pub const SENTINEL: u8 = b'$';

/// Binary format version written as the first byte of every index file.
/// Bump this whenever the on-disk layout changes incompatibly.
const FORMAT_VERSION: u8 = 1;

/// Construction/retained tuning parameters for an [`FmIndex`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexParams {
    /// Stride between rank checkpoints.
    pub cp_ival: usize,
    /// Stride between retained suffix-array entries.
    pub ssa_ival: usize,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            cp_ival: DEFAULT_CP_IVAL,
            ssa_ival: DEFAULT_SSA_IVAL,
        }
    }
}

/// Errors raised while building an [`FmIndex`].
#[derive(Debug, Error)]
pub enum FmIndexError {
    /// The reference text was empty.
    #[error("reference sequence must be non-empty")]
    EmptyReference,
}

/// Errors raised while saving or loading a serialized index.
#[derive(Debug, Error)]
pub enum IndexIoError {
    /// Underlying file I/O failed.
    #[error("index I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary encoding/decoding failed.
    #[error("index (de)serialization error: {0}")]
    Codec(#[from] bincode::Error),

    /// The file's format version does not match what this build supports.
    #[error("unsupported index format version {found} (expected {expected})")]
    UnsupportedVersion { found: u8, expected: u8 },

    /// The file was shorter than the minimum version-prefixed layout.
    #[error("index file is empty or truncated")]
    Truncated,
}

/// FM-index over a sentinel-terminated text: BWT, first-column table, rank
/// checkpoints, and a downsampled suffix array, plus the parameters that
/// produced them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FmIndex {
    bwt: Vec<u8>,
    first_col: BTreeMap<u8, u32>,
    checkpoints: RankCheckpoints,
    ssa: DownsampledSA,
    params: IndexParams,
}

impl FmIndex {
    /// Build an index from `reference`. A sentinel (`$`) is appended if the
    /// text does not already end with one.
    pub fn build(reference: &[u8], params: IndexParams) -> Result<Self, FmIndexError> {
        if reference.is_empty() {
            return Err(FmIndexError::EmptyReference);
        }

        let mut text = reference.to_vec();
        if text.last() != Some(&SENTINEL) {
            text.push(SENTINEL);
        }

        let sa = build_suffix_array(&text);
        let bwt = build_bwt(&text, &sa);
        let first_col = build_first_col(&bwt);
        let checkpoints = RankCheckpoints::build(&bwt, params.cp_ival);
        let ssa = DownsampledSA::build(&sa, params.ssa_ival);

        Ok(Self {
            bwt,
            first_col,
            checkpoints,
            ssa,
            params,
        })
    }

    /// Length of the BWT string (and of the sentinel-terminated text).
    pub fn len(&self) -> usize {
        self.bwt.len()
    }

    /// Whether this index covers an empty text (never true for a built
    /// index, since the sentinel always contributes one row).
    pub fn is_empty(&self) -> bool {
        self.bwt.is_empty()
    }

    /// Tuning parameters this index was built with.
    pub fn params(&self) -> IndexParams {
        self.params
    }

    /// Byte stored in BWT row `row`.
    pub fn bwt_at(&self, row: usize) -> u8 {
        self.bwt[row]
    }

    /// Text offset retained for `row` by the downsampled suffix array.
    pub fn ssa_get(&self, row: usize) -> Option<usize> {
        self.ssa.get(row)
    }

    /// Number of occurrences of `c` in `bwt[0..=row]` (inclusive); `row` may
    /// be `-1`, which always yields `0`.
    pub fn rank(&self, c: u8, row: i64) -> u32 {
        self.checkpoints.rank(&self.bwt, c, row)
    }

    /// Total number of positions in the BWT holding a byte strictly less
    /// than `c` (the first-column entry for `c`), with the out-of-alphabet
    /// fallback described in [`count_occurrences`].
    pub fn count_occurrences(&self, c: u8) -> u32 {
        count_occurrences(&self.first_col, c, self.bwt.len() as u32)
    }

    /// Serialize and write this index to `path` as a single versioned
    /// binary artifact.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), IndexIoError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&[FORMAT_VERSION])?;
        bincode::serialize_into(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Read and deserialize an index previously written by [`FmIndex::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, IndexIoError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut version = [0u8; 1];
        match reader.read_exact(&mut version) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(IndexIoError::Truncated)
            }
            Err(e) => return Err(e.into()),
        }
        if version[0] != FORMAT_VERSION {
            return Err(IndexIoError::UnsupportedVersion {
                found: version[0],
                expected: FORMAT_VERSION,
            });
        }

        let index = bincode::deserialize_from(&mut reader)?;
        Ok(index)
    }
}

/// Derive the BWT from a sentinel-terminated text and its suffix array:
/// `bwt[i] = text[sa[i] - 1]`, or the sentinel when `sa[i] == 0`.
fn build_bwt(text: &[u8], sa: &[usize]) -> Vec<u8> {
    sa.iter()
        .map(|&i| if i == 0 { text[text.len() - 1] } else { text[i - 1] })
        .collect()
}

/// First-column table: for each character `c` seen in `bwt`, the number of
/// positions holding a byte strictly less than `c`.
fn build_first_col(bwt: &[u8]) -> BTreeMap<u8, u32> {
    let mut totals: BTreeMap<u8, u32> = BTreeMap::new();
    for &c in bwt {
        *totals.entry(c).or_insert(0) += 1;
    }

    let mut first_col = BTreeMap::new();
    let mut running = 0u32;
    for (&c, &count) in totals.iter() {
        first_col.insert(c, running);
        running += count;
    }
    first_col
}

/// Look up the first-column total for `c`. If `c` never appeared in the
/// text, fall back to the smallest known character greater than `c`, or to
/// `bwt_len` if none exists; the interval collapses regardless, so this
/// branch only needs to avoid under-counting.
fn count_occurrences(first_col: &BTreeMap<u8, u32>, c: u8, bwt_len: u32) -> u32 {
    if let Some(&v) = first_col.get(&c) {
        return v;
    }
    first_col
        .range((Bound::Excluded(c), Bound::Unbounded))
        .next()
        .map(|(_, &v)| v)
        .unwrap_or(bwt_len)
}
