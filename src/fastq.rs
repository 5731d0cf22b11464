//! FASTQ reshaping utilities: the external, line-oriented preprocessing
//! steps that feed the map/reduce streaming pipeline.
//!
//! Ported from the original `fq_to_mrfastq.py` / `parse_fq_file.py`
//! drivers; out of the FM-index core's scope, but part of the CLI surface
//! those drivers expose.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use thiserror::Error;

/// Byte sequence joining the four FASTQ record lines onto one output line.
/// Chosen to be a control character that cannot appear in FASTQ header,
/// sequence, `+` separator, or quality fields.
pub const MR_FASTQ_LINE_SEPARATOR: &str = "\u{1}";

/// Default output file name for [`fq_to_mrfastq`], written to the current
/// working directory.
pub const MR_FASTQ_OUTPUT_FILE: &str = "output.mr.fastq";

/// Default output file name for [`parse_fq`], written to the current
/// working directory.
pub const FQ_READS_OUTPUT_FILE: &str = "output.fq.reads";

/// Errors raised by the FASTQ reshaping drivers.
#[derive(Debug, Error)]
pub enum FastqError {
    /// Underlying file I/O failed.
    #[error("fastq I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input did not contain a whole number of four-line records.
    #[error("truncated FASTQ record: expected a multiple of 4 lines, trailing {trailing} line(s)")]
    TruncatedRecord { trailing: usize },

    /// The first line did not start with a recognized record marker.
    #[error("unrecognized input format: first line starts with '{found}', expected '@', '>' or a .sff header")]
    UnrecognizedFormat { found: char },

    /// The input file contained no lines at all.
    #[error("input file is empty")]
    Empty,
}

/// Validate that `first_line` looks like the start of a FASTQ (`@`), FASTA
/// (`>`), or `.sff` record, per the input-malformed error kind in the
/// error-handling design. Returns the offending character on failure.
fn check_header(first_line: &str) -> Result<(), FastqError> {
    match first_line.chars().next() {
        None => Err(FastqError::Empty),
        Some(c) if c == '@' || c == '>' => Ok(()),
        Some(c) => Err(FastqError::UnrecognizedFormat { found: c }),
    }
}

/// Join every four input FASTQ lines onto a single output line separated by
/// [`MR_FASTQ_LINE_SEPARATOR`], writing [`MR_FASTQ_OUTPUT_FILE`] in the
/// current working directory. This lets a line-oriented streaming shuffle
/// carry one whole read per line.
pub fn fq_to_mrfastq(input: impl AsRef<Path>) -> Result<(), FastqError> {
    fq_to_mrfastq_to(input, MR_FASTQ_OUTPUT_FILE)
}

/// As [`fq_to_mrfastq`], but writing to an explicit `output` path.
pub fn fq_to_mrfastq_to(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<(), FastqError> {
    let reader = BufReader::new(File::open(input)?);
    let mut out = File::create(output)?;

    let mut joined = String::new();
    let mut count = 0usize;

    for line in reader.lines() {
        let line = line?;
        if count == 0 {
            check_header(&line)?;
        }
        count += 1;
        if count % 4 == 0 {
            joined.push_str(&line);
            writeln!(out, "{joined}")?;
            joined.clear();
        } else {
            joined.push_str(&line);
            joined.push_str(MR_FASTQ_LINE_SEPARATOR);
        }
    }

    if count % 4 != 0 {
        return Err(FastqError::TruncatedRecord {
            trailing: count % 4,
        });
    }
    Ok(())
}

/// Extract the read-sequence line (the 2nd of every 4 lines) from a FASTQ
/// file, writing [`FQ_READS_OUTPUT_FILE`] with one read per line.
pub fn parse_fq(input: impl AsRef<Path>) -> Result<(), FastqError> {
    parse_fq_to(input, FQ_READS_OUTPUT_FILE)
}

/// As [`parse_fq`], but writing to an explicit `output` path.
pub fn parse_fq_to(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<(), FastqError> {
    let reader = BufReader::new(File::open(input)?);
    let mut out = File::create(output)?;

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if i == 0 {
            check_header(&line)?;
        }
        if i % 4 == 1 {
            writeln!(out, "{line}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn write_temp(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        File::create(&path).unwrap().write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn fq_to_mrfastq_joins_four_lines() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_temp(dir.path(), "in.fastq", "@read1\nACGT\n+\nIIII\n");
        let output = dir.path().join(MR_FASTQ_OUTPUT_FILE);
        fq_to_mrfastq_to(&input, &output).unwrap();

        let mut out = String::new();
        File::open(&output).unwrap().read_to_string(&mut out).unwrap();

        assert_eq!(
            out,
            format!(
                "@read1{sep}ACGT{sep}+{sep}IIII\n",
                sep = MR_FASTQ_LINE_SEPARATOR
            )
        );
    }

    #[test]
    fn fq_to_mrfastq_rejects_truncated_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_temp(dir.path(), "in.fastq", "@read1\nACGT\n+\n");
        let output = dir.path().join(MR_FASTQ_OUTPUT_FILE);
        assert!(matches!(
            fq_to_mrfastq_to(&input, &output),
            Err(FastqError::TruncatedRecord { trailing: 3 })
        ));
    }

    #[test]
    fn parse_fq_extracts_sequence_lines() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_temp(
            dir.path(),
            "in.fastq",
            "@r1\nACGT\n+\nIIII\n@r2\nTTTT\n+\nIIII\n",
        );
        let output = dir.path().join(FQ_READS_OUTPUT_FILE);
        parse_fq_to(&input, &output).unwrap();

        let mut out = String::new();
        File::open(&output).unwrap().read_to_string(&mut out).unwrap();
        assert_eq!(out, "ACGT\nTTTT\n");
    }

    #[test]
    fn rejects_unrecognized_header() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_temp(dir.path(), "in.fastq", "not a fastq record\n");
        let output = dir.path().join(MR_FASTQ_OUTPUT_FILE);
        assert!(matches!(
            fq_to_mrfastq_to(&input, &output),
            Err(FastqError::UnrecognizedFormat { found: 'n' })
        ));
    }
}
