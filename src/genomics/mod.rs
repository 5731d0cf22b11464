//! FM-index construction and exact pattern matching for short-read
//! alignment, plus the per-worker pileup accumulator that defines the
//! output contract downstream aggregators consume.

mod alphabet;
mod checkpoints;
mod downsampled_sa;
mod index;
mod pileup;
mod search;
mod suffix_array;
mod types;

pub use alphabet::{alphabet_index, BaseSlot, ALPHABET_SIZE};
pub use checkpoints::{RankCheckpoints, DEFAULT_CP_IVAL};
pub use downsampled_sa::{DownsampledSA, DEFAULT_SSA_IVAL};
pub use index::{FmIndex, FmIndexError, IndexIoError, IndexParams, SENTINEL};
pub use pileup::{
    accumulate_read, PileupEntry, PileupKey, PileupMap, MAX_CONSECUTIVE_INSERTIONS,
};
pub use search::{all_occurrences, bwm_range, first_occurrence, resolve, SearchError, NOT_FOUND};
pub use suffix_array::build_suffix_array;
pub use types::{AlignedRead, CigarOp, CigarOpKind};
