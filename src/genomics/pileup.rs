//! Per-worker pileup accumulator: folds aligned reads into a map keyed by
//! reference position, with fractional keys for insertions.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::genomics::alphabet::{alphabet_index, ALPHABET_SIZE};
use crate::genomics::types::{AlignedRead, CigarOpKind};

/// Maximum number of consecutive inserted bases a single fractional key run
/// can address (`NN` is zero-padded to two digits).
pub const MAX_CONSECUTIVE_INSERTIONS: u8 = 99;

/// A pileup map key: either an integer reference offset, or a fractional
/// `anchor.NN` key addressing the `NN`-th base of an insertion run that
/// follows reference offset `anchor`.
///
/// Ordering matches the numeric ordering of the key's string form: an
/// integer key sorts before any insertion anchored at it, which in turn
/// sorts before the next integer key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PileupKey {
    /// A plain reference offset.
    Integer(u64),
    /// The `ordinal`-th (1-based) inserted base following `anchor`.
    Insertion { anchor: u64, ordinal: u8 },
}

impl PileupKey {
    fn sort_key(self) -> (u64, u8) {
        match self {
            PileupKey::Integer(i) => (i, 0),
            PileupKey::Insertion { anchor, ordinal } => (anchor, ordinal),
        }
    }

    /// Render in the wire format from the output contract: integers without
    /// a decimal point, insertions as `anchor.NN`.
    pub fn format(self) -> String {
        match self {
            PileupKey::Integer(i) => i.to_string(),
            PileupKey::Insertion { anchor, ordinal } => format!("{anchor}.{ordinal:02}"),
        }
    }
}

/// Aggregated counts at a single pileup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PileupEntry {
    /// Reference base at this key, if known (insertions have none).
    pub ref_base: Option<u8>,
    /// Reference contig/chromosome name, if known.
    pub ref_name: Option<Arc<str>>,
    /// Per-base observation counts, indexed by [`alphabet_index`].
    pub counts: [u32; ALPHABET_SIZE],
}

impl PileupEntry {
    fn new(ref_base: Option<u8>, ref_name: Option<Arc<str>>) -> Self {
        Self {
            ref_base,
            ref_name,
            counts: [0; ALPHABET_SIZE],
        }
    }
}

/// Per-worker accumulator mapping reference keys to base-count tallies.
///
/// Owned by a single worker and mutated only by that worker; see the
/// pileup-map invariants this type is built to preserve: insertion keys
/// sort strictly between their anchor and the next integer, and
/// `sum(counts)` at a key equals the number of aligned query bases observed
/// there so far.
#[derive(Debug, Clone, Default)]
pub struct PileupMap {
    entries: BTreeMap<PileupKeyOrd, PileupEntry>,
}

/// Newtype so [`PileupKey`]'s numeric ordering (not its derived variant
/// order) drives `BTreeMap` iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PileupKeyOrd(PileupKey);

impl PartialOrd for PileupKeyOrd {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PileupKeyOrd {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.sort_key().cmp(&other.0.sort_key())
    }
}

impl PileupMap {
    /// Construct an empty pileup map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observed `query_base` at `key`, creating the entry (with
    /// the given reference base and name) on first touch.
    pub fn observe(
        &mut self,
        key: PileupKey,
        ref_base: Option<u8>,
        ref_name: Option<Arc<str>>,
        query_base: u8,
    ) {
        let entry = self
            .entries
            .entry(PileupKeyOrd(key))
            .or_insert_with(|| PileupEntry::new(ref_base, ref_name));
        entry.counts[alphabet_index(query_base)] += 1;
    }

    /// Number of distinct keys currently tracked.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no observations have been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the entry at `key`, if any.
    pub fn get(&self, key: PileupKey) -> Option<&PileupEntry> {
        self.entries.get(&PileupKeyOrd(key))
    }

    /// Iterate keys and entries in ascending numeric key order.
    pub fn iter(&self) -> impl Iterator<Item = (PileupKey, &PileupEntry)> {
        self.entries.iter().map(|(k, v)| (k.0, v))
    }

    /// Render every entry as a mapper/combiner output line (see the wire
    /// format in the external-interfaces section of the design doc).
    /// `include_ref_name` selects the three-field (native-aligner) form vs.
    /// the two-field (FM-index mapper) form.
    pub fn emit_lines(&self, include_ref_name: bool) -> Vec<String> {
        self.iter()
            .map(|(key, entry)| format_line(key, entry, include_ref_name))
            .collect()
    }
}

fn format_line(key: PileupKey, entry: &PileupEntry, include_ref_name: bool) -> String {
    let ref_base = entry
        .ref_base
        .map(|b| (b as char).to_string())
        .unwrap_or_default();
    let counts = entry
        .counts
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(",");

    if include_ref_name {
        let ref_name = entry.ref_name.as_deref().unwrap_or("");
        format!("{}\t{};{};{}", key.format(), ref_base, ref_name, counts)
    } else {
        format!("{}\t{};{}", key.format(), ref_base, counts)
    }
}

/// Walk `read`'s CIGAR against `reference`, folding every touched column
/// into `map`. Matches and deletions use integer keys; insertions use
/// fractional `anchor.NN` keys anchored at the last non-insertion reference
/// offset, capped at [`MAX_CONSECUTIVE_INSERTIONS`] consecutive inserts.
pub fn accumulate_read(map: &mut PileupMap, read: &AlignedRead, reference: &[u8]) {
    let mut ref_pos = read.pos;
    let mut read_pos = 0usize;
    let mut last_anchor = ref_pos.saturating_sub(1);
    let mut insertion_ordinal: u8 = 0;

    for op in &read.cigar {
        match op.kind {
            CigarOpKind::Match => {
                for _ in 0..op.len {
                    let query_base = read.sequence[read_pos];
                    let ref_base = reference.get(ref_pos as usize).copied();
                    map.observe(
                        PileupKey::Integer(ref_pos),
                        ref_base,
                        read.ref_name.clone(),
                        query_base,
                    );
                    last_anchor = ref_pos;
                    insertion_ordinal = 0;
                    ref_pos += 1;
                    read_pos += 1;
                }
            }
            CigarOpKind::Deletion => {
                for _ in 0..op.len {
                    let ref_base = reference.get(ref_pos as usize).copied();
                    map.observe(
                        PileupKey::Integer(ref_pos),
                        ref_base,
                        read.ref_name.clone(),
                        b'D',
                    );
                    last_anchor = ref_pos;
                    insertion_ordinal = 0;
                    ref_pos += 1;
                }
            }
            CigarOpKind::Insertion => {
                for _ in 0..op.len {
                    if insertion_ordinal >= MAX_CONSECUTIVE_INSERTIONS {
                        break;
                    }
                    insertion_ordinal += 1;
                    let query_base = read.sequence[read_pos];
                    map.observe(
                        PileupKey::Insertion {
                            anchor: last_anchor,
                            ordinal: insertion_ordinal,
                        },
                        None,
                        read.ref_name.clone(),
                        query_base,
                    );
                    read_pos += 1;
                }
            }
            CigarOpKind::SoftClip => {
                read_pos += op.len as usize;
            }
            CigarOpKind::HardClip => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::types::{CigarOp, CigarOpKind};

    #[test]
    fn insertion_keys_sort_between_integer_anchors() {
        let mut map = PileupMap::new();
        map.observe(PileupKey::Integer(100), Some(b'G'), None, b'G');
        map.observe(
            PileupKey::Insertion {
                anchor: 100,
                ordinal: 1,
            },
            None,
            None,
            b'A',
        );
        map.observe(
            PileupKey::Insertion {
                anchor: 100,
                ordinal: 2,
            },
            None,
            None,
            b'C',
        );
        map.observe(PileupKey::Integer(101), Some(b'T'), None, b'T');

        let keys: Vec<String> = map.iter().map(|(k, _)| k.format()).collect();
        assert_eq!(keys, vec!["100", "100.01", "100.02", "101"]);
    }

    #[test]
    fn two_reads_aggregate_counts_at_shared_position() {
        let chrom: Arc<str> = Arc::from("chr1");
        let reference = b"AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAGAAAAAA";
        let read1 = AlignedRead::ungapped(Some(Arc::clone(&chrom)), 42, vec![b'A']);
        let read2 = AlignedRead::ungapped(Some(chrom), 42, vec![b'A']);

        let mut map = PileupMap::new();
        accumulate_read(&mut map, &read1, reference);
        accumulate_read(&mut map, &read2, reference);

        let lines = map.emit_lines(true);
        assert_eq!(lines, vec!["42\tG;chr1;2,0,0,0,0,0"]);
    }

    #[test]
    fn deletion_is_tallied_in_d_slot() {
        let reference = b"ACGT";
        let read = AlignedRead::new(
            None,
            0,
            vec![
                CigarOp::new(CigarOpKind::Match, 1),
                CigarOp::new(CigarOpKind::Deletion, 1),
            ],
            b"A".to_vec(),
        );

        let mut map = PileupMap::new();
        accumulate_read(&mut map, &read, reference);

        let deletion = map.get(PileupKey::Integer(1)).unwrap();
        assert_eq!(deletion.counts[4], 1);
        assert_eq!(deletion.ref_base, Some(b'C'));
    }
}
