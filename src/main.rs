use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mr_fm_index::fastq::{fq_to_mrfastq, parse_fq};
use mr_fm_index::genomics::{
    accumulate_read, first_occurrence, AlignedRead, FmIndex, IndexParams, PileupMap, NOT_FOUND,
};

/// Environment variable providing a default index path for `map`.
const ENV_INDEX_PATH: &str = "MR_INDEX_PATH";
/// Environment variable providing a default reference path for `build-index`
/// and `map`.
const ENV_REFERENCE_PATH: &str = "MR_REFERENCE_PATH";

#[derive(Parser, Debug)]
#[command(name = "mr-fm-index", about = "FM-index construction and short-read mapping core")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build an FM-index from a reference text and write it to disk.
    BuildIndex {
        /// Reference sequence file (plain text, FASTA headers ignored).
        #[arg(env = ENV_REFERENCE_PATH)]
        reference: PathBuf,
        /// Output path for the serialized index.
        output: PathBuf,
        /// Stride between stored rank checkpoints.
        #[arg(long, default_value_t = mr_fm_index::genomics::DEFAULT_CP_IVAL)]
        cp_ival: usize,
        /// Stride between retained downsampled suffix-array entries.
        #[arg(long, default_value_t = mr_fm_index::genomics::DEFAULT_SSA_IVAL)]
        ssa_ival: usize,
    },
    /// Join four-line FASTQ records onto one line for line-oriented streaming.
    FqToMrfastq {
        /// Input FASTQ file.
        input: PathBuf,
    },
    /// Extract the read-sequence line from a FASTQ file, one read per line.
    ParseFq {
        /// Input FASTQ file.
        input: PathBuf,
    },
    /// FM-index mapper: read bare read strings from stdin, search against a
    /// prebuilt index, and emit pileup records on stdout.
    Map {
        /// Path to a serialized index (falls back to `MR_INDEX_PATH`).
        #[arg(long, env = ENV_INDEX_PATH)]
        index: PathBuf,
        /// Reference sequence file the index was built from (falls back to
        /// `MR_REFERENCE_PATH`).
        #[arg(long, env = ENV_REFERENCE_PATH)]
        reference: PathBuf,
    },
    /// Combiner: sum mapper output lines that the shuffle has already
    /// grouped by reference key.
    Combine,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::BuildIndex {
            reference,
            output,
            cp_ival,
            ssa_ival,
        } => run_build_index(reference, output, cp_ival, ssa_ival),
        Commands::FqToMrfastq { input } => {
            fq_to_mrfastq(&input)
                .with_context(|| format!("failed to reshape FASTQ file {}", input.display()))?;
            info!(output = mr_fm_index::fastq::MR_FASTQ_OUTPUT_FILE, "wrote mr.fastq output");
            Ok(())
        }
        Commands::ParseFq { input } => {
            parse_fq(&input)
                .with_context(|| format!("failed to parse FASTQ file {}", input.display()))?;
            info!(output = mr_fm_index::fastq::FQ_READS_OUTPUT_FILE, "wrote read list");
            Ok(())
        }
        Commands::Map { index, reference } => run_map(index, reference),
        Commands::Combine => run_combine(),
    }
}

fn run_build_index(
    reference_path: PathBuf,
    output_path: PathBuf,
    cp_ival: usize,
    ssa_ival: usize,
) -> Result<()> {
    let reference = read_sequence_file(&reference_path).with_context(|| {
        format!("failed to read reference from {}", reference_path.display())
    })?;

    info!(
        reference = %reference_path.display(),
        len = reference.len(),
        cp_ival,
        ssa_ival,
        "building FM-index"
    );

    let params = IndexParams { cp_ival, ssa_ival };
    let index = FmIndex::build(&reference, params).context("failed to build FM-index")?;
    index
        .save(&output_path)
        .with_context(|| format!("failed to write index to {}", output_path.display()))?;

    info!(output = %output_path.display(), rows = index.len(), "index written");
    Ok(())
}

fn run_map(index_path: PathBuf, reference_path: PathBuf) -> Result<()> {
    let index = FmIndex::load(&index_path)
        .with_context(|| format!("failed to load index from {}", index_path.display()))?;
    let reference = read_sequence_file(&reference_path).with_context(|| {
        format!("failed to read reference from {}", reference_path.display())
    })?;

    let stdin = io::stdin();
    let mut pileup = PileupMap::new();
    let mut reads_seen = 0usize;
    let mut reads_mapped = 0usize;

    for line in stdin.lock().lines() {
        let line = line.context("failed to read read from stdin")?;
        let read = line.trim();
        if read.is_empty() {
            continue;
        }
        reads_seen += 1;

        let sequence = read.as_bytes().to_ascii_uppercase();
        // A single full-query exact backward search, not a best-of-N seed
        // search: the first BWT-row match is this read's placement.
        let offset = first_occurrence(&index, &sequence, 0)
            .context("index corrupt: resolve overran its bound")?;
        if offset == NOT_FOUND {
            continue;
        }
        reads_mapped += 1;

        let aligned = AlignedRead::ungapped(None, offset as u64, sequence);
        accumulate_read(&mut pileup, &aligned, &reference);
    }

    info!(reads_seen, reads_mapped, positions = pileup.len(), "mapping complete");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in pileup.emit_lines(false) {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

fn run_combine() -> Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut current_key: Option<String> = None;
    let mut current_ref_base = String::new();
    let mut current_ref_name: Option<String> = None;
    let mut current_counts = [0u64; 6];

    let flush = |out: &mut dyn Write,
                 key: &str,
                 ref_base: &str,
                 ref_name: &Option<String>,
                 counts: &[u64; 6]|
     -> Result<()> {
        let counts_str = counts
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        match ref_name {
            Some(name) => writeln!(out, "{key}\t{ref_base};{name};{counts_str}")?,
            None => writeln!(out, "{key}\t{ref_base};{counts_str}")?,
        }
        Ok(())
    };

    for line in stdin.lock().lines() {
        let line = line.context("failed to read mapper output from stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed = parse_output_line(&line)
            .with_context(|| format!("malformed mapper output line: {line:?}"))?;

        match &current_key {
            Some(key) if *key == parsed.key => {
                for i in 0..6 {
                    current_counts[i] += parsed.counts[i];
                }
            }
            _ => {
                if let Some(key) = current_key.take() {
                    flush(&mut out, &key, &current_ref_base, &current_ref_name, &current_counts)?;
                }
                current_key = Some(parsed.key);
                current_ref_base = parsed.ref_base;
                current_ref_name = parsed.ref_name;
                current_counts = parsed.counts;
            }
        }
    }

    if let Some(key) = current_key {
        flush(&mut out, &key, &current_ref_base, &current_ref_name, &current_counts)?;
    }
    Ok(())
}

struct ParsedLine {
    key: String,
    ref_base: String,
    ref_name: Option<String>,
    counts: [u64; 6],
}

/// Parse a single mapper/combiner output line in either the two-field
/// (FM-index mapper, no `ref_name`) or three-field (native-aligner, with
/// `ref_name`) form described in the external-interfaces design.
fn parse_output_line(line: &str) -> Result<ParsedLine> {
    let (key, rest) = line
        .split_once('\t')
        .ok_or_else(|| anyhow::anyhow!("missing tab separator"))?;
    let fields: Vec<&str> = rest.split(';').collect();

    let (ref_base, ref_name, counts_field) = match fields.as_slice() {
        [ref_base, counts] => (*ref_base, None, *counts),
        [ref_base, ref_name, counts] => (*ref_base, Some((*ref_name).to_string()), *counts),
        _ => bail!("expected 2 or 3 semicolon-separated fields, got {}", fields.len()),
    };

    let mut counts = [0u64; 6];
    for (slot, text) in counts.iter_mut().zip(counts_field.split(',')) {
        *slot = text.parse().with_context(|| format!("invalid count '{text}'"))?;
    }

    Ok(ParsedLine {
        key: key.to_string(),
        ref_base: ref_base.to_string(),
        ref_name,
        counts,
    })
}

fn read_sequence_file(path: &PathBuf) -> Result<Vec<u8>> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut contig_count = 0usize;
    let mut sequence = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.starts_with('>') {
            contig_count += 1;
            continue;
        }
        sequence.extend(line.trim().bytes());
    }

    if contig_count > 1 {
        // The FM-index mapper treats the reference as one contiguous text;
        // see the multi-contig open question in the design notes.
        warn!(
            contig_count,
            "reference file contains multiple contigs; offsets will be absolute, not per-contig"
        );
    }

    Ok(sequence.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_two_field_line() {
        let parsed = parse_output_line("42\tG;2,0,0,0,0,0").unwrap();
        assert_eq!(parsed.key, "42");
        assert_eq!(parsed.ref_base, "G");
        assert_eq!(parsed.ref_name, None);
        assert_eq!(parsed.counts, [2, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn parse_three_field_line() {
        let parsed = parse_output_line("42\tG;chr1;2,0,0,0,0,0").unwrap();
        assert_eq!(parsed.ref_name.as_deref(), Some("chr1"));
        assert_eq!(parsed.counts, [2, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn env_var_names_are_stable() {
        assert_eq!(ENV_INDEX_PATH, "MR_INDEX_PATH");
        assert_eq!(ENV_REFERENCE_PATH, "MR_REFERENCE_PATH");
        // documents the contract without actually mutating process env
        let _ = env::var(ENV_INDEX_PATH);
    }
}
