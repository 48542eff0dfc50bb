//! Pairwise alignment backends.
//!
//! Anything that turns two raw sequences into two gapped rows of equal
//! length implements [`Aligner`]. [`GlobalAligner`] runs an in-process
//! global alignment with cheap overhanging ends and [`Mafft`] shells out
//! to the `mafft` binary. Closures with the right signature are aligners too, which is
//! handy for precomputed alignments.
//!
use bio::alignment::pairwise::{Aligner as PairwiseAligner, Scoring};
use bio::alignment::AlignmentOperation;
use bio::io::fasta;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;

use super::pair::GAP;

#[derive(Error, Debug)]
pub enum AlignerError {
    #[error("IO error: {0}")]
    IOError(#[from] io::Error),
    #[error("Failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("'{program}' exited with {status}: {stderr}")]
    ToolFailed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("Unexpected aligner output: {0}")]
    BadOutput(String),
}

/// Two gapped alignment rows of equal length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GappedPair {
    pub a: Vec<u8>,
    pub b: Vec<u8>,
}

impl GappedPair {
    pub fn new<S: Into<Vec<u8>>>(a: S, b: S) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
        }
    }

    /// Number of alignment columns.
    pub fn len(&self) -> usize {
        self.a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.a.is_empty()
    }
}

/// Strip gaps from an alignment row.
pub fn ungapped(row: &[u8]) -> Vec<u8> {
    row.iter().copied().filter(|&c| c != GAP).collect()
}

/// Produces a gapped pairwise alignment of two raw sequences.
pub trait Aligner: Sync {
    fn align(&self, a: &[u8], b: &[u8]) -> Result<GappedPair, AlignerError>;

    /// A short name for log messages.
    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> Aligner for F
where
    F: Fn(&[u8], &[u8]) -> Result<GappedPair, AlignerError> + Sync,
{
    fn align(&self, a: &[u8], b: &[u8]) -> Result<GappedPair, AlignerError> {
        self(a, b)
    }
}

/// Scores for [`GlobalAligner`]. Gap penalties are negative; a gap of
/// length `k` costs `gap_open + k * gap_extend`. Leaving the start or end
/// of a sequence unaligned costs a flat `end_gap`, whatever its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringParams {
    pub match_score: i32,
    pub mismatch_score: i32,
    pub gap_open: i32,
    pub gap_extend: i32,
    pub end_gap: i32,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            match_score: 1,
            mismatch_score: -1,
            gap_open: -5,
            gap_extend: -1,
            end_gap: -5,
        }
    }
}

/// In-process global alignment with affine gaps and cheap overhanging
/// ends, so assemblies that differ in how far they extend still align
/// their shared bases.
///
/// Memory grows with the product of the sequence lengths, so this suits
/// contigs and small genomes; use [`Mafft`] for anything larger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalAligner {
    pub scoring: ScoringParams,
}

impl GlobalAligner {
    pub fn new(scoring: ScoringParams) -> Self {
        Self { scoring }
    }
}

impl Aligner for GlobalAligner {
    fn align(&self, a: &[u8], b: &[u8]) -> Result<GappedPair, AlignerError> {
        let ScoringParams {
            match_score,
            mismatch_score,
            gap_open,
            gap_extend,
            end_gap,
        } = self.scoring;
        let score = |x: u8, y: u8| {
            if x.eq_ignore_ascii_case(&y) {
                match_score
            } else {
                mismatch_score
            }
        };
        let scoring = Scoring::new(gap_open, gap_extend, score)
            .xclip(end_gap)
            .yclip(end_gap);
        let mut aligner = PairwiseAligner::with_capacity_and_scoring(a.len(), b.len(), scoring);
        let alignment = aligner.custom(a, b);
        let ops = &alignment.operations;

        let lead = ops.iter().take_while(|op| is_clip(op)).count();
        let trail = ops[lead..].iter().rev().take_while(|op| is_clip(op)).count();
        let body = &ops[lead..ops.len() - trail];

        let mut rows = Rows::new(a, b);
        let (nx, ny) = clip_lengths(&ops[..lead]);
        rows.leading(nx, ny);
        for op in body {
            match *op {
                AlignmentOperation::Match | AlignmentOperation::Subst => rows.paired(1),
                AlignmentOperation::Ins => rows.a_only(1),
                AlignmentOperation::Del => rows.b_only(1),
                AlignmentOperation::Xclip(n) => rows.a_only(n),
                AlignmentOperation::Yclip(n) => rows.b_only(n),
            }
        }
        let (nx, ny) = clip_lengths(&ops[ops.len() - trail..]);
        rows.trailing(nx, ny);

        if rows.i != a.len() || rows.j != b.len() {
            return Err(AlignerError::BadOutput(format!(
                "global alignment covered {}/{} and {}/{} bases",
                rows.i,
                a.len(),
                rows.j,
                b.len()
            )));
        }
        Ok(GappedPair::new(rows.row_a, rows.row_b))
    }

    fn name(&self) -> &str {
        "global"
    }
}

fn is_clip(op: &AlignmentOperation) -> bool {
    matches!(op, AlignmentOperation::Xclip(_) | AlignmentOperation::Yclip(_))
}

/// Total clipped bases of `a` and `b` in a run of clip operations.
fn clip_lengths(ops: &[AlignmentOperation]) -> (usize, usize) {
    ops.iter().fold((0, 0), |(nx, ny), op| match *op {
        AlignmentOperation::Xclip(n) => (nx + n, ny),
        AlignmentOperation::Yclip(n) => (nx, ny + n),
        _ => (nx, ny),
    })
}

/// Gapped rows under construction, with the next unread base of each sequence.
struct Rows<'s> {
    a: &'s [u8],
    b: &'s [u8],
    row_a: Vec<u8>,
    row_b: Vec<u8>,
    i: usize,
    j: usize,
}

impl<'s> Rows<'s> {
    fn new(a: &'s [u8], b: &'s [u8]) -> Self {
        Self {
            a,
            b,
            row_a: Vec::with_capacity(a.len() + b.len()),
            row_b: Vec::with_capacity(a.len() + b.len()),
            i: 0,
            j: 0,
        }
    }

    fn paired(&mut self, n: usize) {
        self.row_a.extend_from_slice(&self.a[self.i..self.i + n]);
        self.row_b.extend_from_slice(&self.b[self.j..self.j + n]);
        self.i += n;
        self.j += n;
    }

    fn a_only(&mut self, n: usize) {
        self.row_a.extend_from_slice(&self.a[self.i..self.i + n]);
        self.row_b.extend(std::iter::repeat(GAP).take(n));
        self.i += n;
    }

    fn b_only(&mut self, n: usize) {
        self.row_a.extend(std::iter::repeat(GAP).take(n));
        self.row_b.extend_from_slice(&self.b[self.j..self.j + n]);
        self.j += n;
    }

    // When both sequences are clipped at the same end, the overlapping
    // bases are written as aligned columns next to the aligned body so the
    // rows never hold a gap in one row beside a gap in the other.

    fn leading(&mut self, nx: usize, ny: usize) {
        let k = nx.min(ny);
        self.a_only(nx - k);
        self.b_only(ny - k);
        self.paired(k);
    }

    fn trailing(&mut self, nx: usize, ny: usize) {
        let k = nx.min(ny);
        self.paired(k);
        self.a_only(nx - k);
        self.b_only(ny - k);
    }
}

/// Runs the external `mafft` binary on each pair.
#[derive(Debug, Clone)]
pub struct Mafft {
    pub binary: PathBuf,
}

impl Default for Mafft {
    fn default() -> Self {
        Self::new("mafft")
    }
}

impl Mafft {
    pub fn new<P: Into<PathBuf>>(binary: P) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Aligner for Mafft {
    fn align(&self, a: &[u8], b: &[u8]) -> Result<GappedPair, AlignerError> {
        let program = self.binary.to_string_lossy().to_string();

        let mut input = tempfile::Builder::new()
            .prefix("coordmap")
            .suffix(".fasta")
            .tempfile()?;
        {
            let mut writer = fasta::Writer::new(input.as_file_mut());
            writer.write("a", None, a)?;
            writer.write("b", None, b)?;
            writer.flush()?;
        }
        input.as_file_mut().flush()?;

        let output = Command::new(&self.binary)
            .args(["--quiet", "--auto", "--preservecase"])
            .arg(input.path())
            .output()
            .map_err(|source| AlignerError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(AlignerError::ToolFailed {
                program,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let mut rows = Vec::with_capacity(2);
        for record in fasta::Reader::new(&output.stdout[..]).records() {
            rows.push(record?.seq().to_vec());
        }
        if rows.len() != 2 {
            return Err(AlignerError::BadOutput(format!(
                "expected 2 aligned records from {}, found {}",
                program,
                rows.len()
            )));
        }
        let b_row = rows.pop().unwrap_or_default();
        let a_row = rows.pop().unwrap_or_default();
        Ok(GappedPair::new(a_row, b_row))
    }

    fn name(&self) -> &str {
        "mafft"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_identical() {
        let aligner = GlobalAligner::default();
        let pair = aligner.align(b"ACGTACGT", b"ACGTACGT").unwrap();
        assert_eq!(pair.a, b"ACGTACGT".to_vec());
        assert_eq!(pair.b, b"ACGTACGT".to_vec());
    }

    #[test]
    fn test_global_insertion() {
        let aligner = GlobalAligner::default();
        let pair = aligner.align(b"AAAACCCCGGGG", b"AAAACCCCTTGGGG").unwrap();
        assert_eq!(pair.a, b"AAAACCCC--GGGG".to_vec());
        assert_eq!(pair.b, b"AAAACCCCTTGGGG".to_vec());
    }

    #[test]
    fn test_global_keeps_bases() {
        let a = b"ATGCACGTACGTATGCAAATCGG";
        let b = b"gcacgtacgtatttgcaaatc";
        let pair = GlobalAligner::default().align(a, b).unwrap();
        assert_eq!(pair.a.len(), pair.b.len());
        assert_eq!(ungapped(&pair.a), a.to_vec());
        assert_eq!(ungapped(&pair.b), b.to_vec());
    }

    #[test]
    fn test_closure_aligner() {
        let aligner = |a: &[u8], b: &[u8]| -> Result<GappedPair, AlignerError> {
            Ok(GappedPair::new(a.to_vec(), b.to_vec()))
        };
        let pair = aligner.align(b"AC", b"AG").unwrap();
        assert_eq!(pair, GappedPair::new("AC", "AG"));
        assert_eq!(Aligner::name(&aligner), "custom");
    }

    #[test]
    fn test_global_overhanging_ends() {
        // B lacks two bases at each end of A and carries an extra TT
        let a = b"ATGCACGTACGTATGCAAATCGG";
        let b = b"GCACGTACGTATTTGCAAATC";
        let pair = GlobalAligner::default().align(a, b).unwrap();
        assert_eq!(pair.a, b"ATGCACGTACGTA--TGCAAATCGG".to_vec());
        assert_eq!(pair.b, b"--GCACGTACGTATTTGCAAATC--".to_vec());
    }

    #[test]
    fn test_global_diverged_tails() {
        // Both tails are cheaper to leave unaligned than to align, and
        // the unaligned bases are written as paired columns.
        let a = b"ACGTACGTACGTAAAAAA";
        let b = b"ACGTACGTACGTTTTTTTT";
        let pair = GlobalAligner::default().align(a, b).unwrap();
        assert_eq!(pair.a, b"ACGTACGTACGTAAAAAA-".to_vec());
        assert_eq!(pair.b, b"ACGTACGTACGTTTTTTTT".to_vec());
        assert!(crate::pair::PairAligner::new(&pair.a, &pair.b).is_ok());
    }

    #[test]
    fn test_global_end_mismatch() {
        let pair = GlobalAligner::default().align(b"AGTCGGTTTTCAG", b"AGTCGGTTTCCAC").unwrap();
        assert_eq!(pair.a, b"AGTCGGTTTTCAG".to_vec());
        assert_eq!(pair.b, b"AGTCGGTTTCCAC".to_vec());
    }

    #[cfg(unix)]
    fn stub_mafft(dir: &std::path::Path, stdout: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("mafft");
        let script = format!("#!/bin/sh\nprintf '{}'\n", stdout);
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_mafft_output() {
        let dir = tempfile::tempdir().unwrap();
        let aligner = Mafft::new(stub_mafft(dir.path(), ">a\\nAC-T\\n>b\\nACGT\\n"));
        let pair = aligner.align(b"ACT", b"ACGT").unwrap();
        assert_eq!(pair, GappedPair::new("AC-T", "ACGT"));
    }

    #[cfg(unix)]
    #[test]
    fn test_mafft_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let aligner = Mafft::new(stub_mafft(dir.path(), ">a\\nACGT\\n"));
        let err = aligner.align(b"ACGT", b"ACGT").unwrap_err();
        assert!(matches!(err, AlignerError::BadOutput(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_mafft_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mafft");
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::write(&path, "#!/bin/sh\necho 'bad input' >&2\nexit 1\n").unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        let err = Mafft::new(path).align(b"ACGT", b"ACGT").unwrap_err();
        assert!(matches!(err, AlignerError::ToolFailed { ref stderr, .. } if stderr == "bad input"));
    }

    #[test]
    fn test_mafft_missing_binary() {
        let aligner = Mafft::new("/nonexistent/bin/mafft");
        let err = aligner.align(b"ACGT", b"ACGT").unwrap_err();
        assert!(matches!(err, AlignerError::Spawn { .. }));
    }
}
