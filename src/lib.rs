//! # FM-index construction and exact pattern matching for map/reduce short-read alignment
//!
//! Builds an FM-index over a reference genome once ([`genomics::FmIndex`]),
//! serializes it to disk, and exposes the backward-search query entry points
//! ([`genomics::first_occurrence`], [`genomics::all_occurrences`]) that many
//! independent worker processes load and search against. A per-worker
//! [`genomics::PileupMap`] folds aligned reads into the base-count tally
//! that downstream map/reduce stages aggregate.
//!
//! ## Usage Example
//!
//! ```
//! use mr_fm_index::genomics::{first_occurrence, FmIndex, IndexParams};
//!
//! let idx = FmIndex::build(b"abaaba", IndexParams::default()).unwrap();
//! let offset = first_occurrence(&idx, b"aba", 0).unwrap();
//! assert!(offset == 0 || offset == 3);
//! ```

#![warn(missing_docs, missing_debug_implementations)]

pub mod fastq;
pub mod genomics;
