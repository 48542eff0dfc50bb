use genomap::{GenomeMap, GenomeMapError};
use num_traits::Float;
use rayon::prelude::*;
use std::io;
use std::io::Write;
use thiserror::Error;

use super::aligner::{Aligner, AlignerError, GappedPair};
use super::file::{FileError, InputFile, OutputFile};
use super::genome::{read_aligned_pair, Genome};
use super::numeric::integral_value;
use super::pair::{AlignmentError, Direction, Mapped, PairAligner, Position, Side, Which};

#[derive(Error, Debug)]
pub enum CoordMapError {
    #[error("IO error: {0}")]
    IOError(#[from] io::Error),
    #[error("File reading error: {0}")]
    FileError(#[from] FileError),
    #[error("Query parsing error: {0}")]
    QueryParsingError(#[from] csv::Error),
    #[error("Missing field")]
    MissingField,
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Chromosome key '{0}' does not exist")]
    NoChrom(String),
    #[error("Invalid position '{0}': positions must be integers")]
    InvalidPosition(String),
    #[error("Genomes have different numbers of sequences ({0} vs {1})")]
    UnequalSequenceCounts(usize, usize),
    #[error("Duplicate sequence name '{0}'")]
    DuplicateName(String),
    #[error("No sequences in '{0}'")]
    EmptyGenome(String),
    #[error("Invalid alignment of '{name_a}' and '{name_b}': {source}")]
    Alignment {
        name_a: String,
        name_b: String,
        #[source]
        source: AlignmentError,
    },
    #[error("Aligning '{name_a}' and '{name_b}' failed: {source}")]
    Aligner {
        name_a: String,
        name_b: String,
        #[source]
        source: AlignerError,
    },
    #[error("GenomeMap Error: error updating GenomeMap")]
    GenomeMapError(#[from] GenomeMapError),
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Parse a position, rejecting anything that is not an integer.
///
/// `"12"` and `"-3"` parse; `"1.5"` and `"12bp"` fail with
/// [`CoordMapError::InvalidPosition`].
pub fn parse_position(value: &str) -> Result<Position, CoordMapError> {
    value
        .trim()
        .parse::<Position>()
        .map_err(|_| CoordMapError::InvalidPosition(value.to_string()))
}

/// Convert a float position, failing instead of truncating fractional values.
pub fn integral_position<T>(value: T) -> Result<Position, CoordMapError>
where
    T: Float + std::fmt::Display,
{
    integral_value(value).ok_or_else(|| CoordMapError::InvalidPosition(value.to_string()))
}

/// One aligned pair of sequences and its position map.
#[derive(Debug, Clone)]
pub struct SequencePair {
    pub name_a: String,
    pub name_b: String,
    pub aligner: PairAligner,
}

impl SequencePair {
    fn build(name_a: &str, name_b: &str, gapped: &GappedPair) -> Result<Self, CoordMapError> {
        let aligner =
            PairAligner::new(&gapped.a, &gapped.b).map_err(|source| CoordMapError::Alignment {
                name_a: name_a.to_string(),
                name_b: name_b.to_string(),
                source,
            })?;
        Ok(Self {
            name_a: name_a.to_string(),
            name_b: name_b.to_string(),
            aligner,
        })
    }

    /// The name of the sequence on the given side of the pair.
    pub fn name(&self, which: Which) -> &str {
        match which {
            Which::A => &self.name_a,
            Which::B => &self.name_b,
        }
    }
}

/// A single lifting query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub name: String,
    pub position: Position,
    /// Overrides the default side for this query, if set.
    pub side: Option<Side>,
}

/// Read tab-delimited queries of sequence name, position and optional side.
///
/// Lines starting with `#` are skipped. The file may be gzip-compressed.
pub fn read_queries(filepath: &str) -> Result<Vec<Query>, CoordMapError> {
    let buf_reader = InputFile::new(filepath).reader()?;
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .from_reader(buf_reader);

    let mut queries = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let name = record.get(0).ok_or(CoordMapError::MissingField)?.to_string();
        let position = parse_position(record.get(1).ok_or(CoordMapError::MissingField)?)?;
        let side = match record.get(2) {
            Some(field) if !field.trim().is_empty() => Some(
                field
                    .parse::<Side>()
                    .map_err(|e| CoordMapError::ParseError(e.to_string()))?,
            ),
            _ => None,
        };
        queries.push(Query {
            name,
            position,
            side,
        });
    }
    Ok(queries)
}

/// Maps names and positions between two genomes, one aligned sequence
/// pair per chromosome.
///
/// The i-th sequence of genome A is paired with the i-th sequence of
/// genome B. Once built the mapper is read-only and can be shared
/// between threads.
pub struct GenomeMapper {
    pairs: Vec<SequencePair>,
    index_a: GenomeMap<usize>,
    index_b: GenomeMap<usize>,
}

impl GenomeMapper {
    /// Align each positional pair of sequences with `aligner` and build
    /// their position maps. Pairs are aligned in parallel.
    ///
    /// # Errors
    /// Fails if the genomes hold different numbers of sequences, if the
    /// aligner fails on any pair, or if any alignment is malformed.
    pub fn new<A>(
        genome_a: &Genome,
        genome_b: &Genome,
        aligner: &A,
    ) -> Result<Self, CoordMapError>
    where
        A: Aligner + ?Sized,
    {
        if genome_a.len() != genome_b.len() {
            return Err(CoordMapError::UnequalSequenceCounts(
                genome_a.len(),
                genome_b.len(),
            ));
        }

        let inputs: Vec<_> = genome_a.iter().zip(genome_b.iter()).collect();
        let pairs = inputs
            .par_iter()
            .map(|((name_a, seq_a), (name_b, seq_b))| {
                log::info!(
                    "aligning {} ({} bp) to {} ({} bp) with {}",
                    name_a,
                    seq_a.len(),
                    name_b,
                    seq_b.len(),
                    aligner.name()
                );
                let gapped =
                    aligner
                        .align(seq_a, seq_b)
                        .map_err(|source| CoordMapError::Aligner {
                            name_a: name_a.to_string(),
                            name_b: name_b.to_string(),
                            source,
                        })?;
                SequencePair::build(name_a, name_b, &gapped)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_pairs(pairs)
    }

    /// Read two FASTA files and align them with `aligner`.
    pub fn from_fasta<A>(
        filepath_a: &str,
        filepath_b: &str,
        aligner: &A,
    ) -> Result<Self, CoordMapError>
    where
        A: Aligner + ?Sized,
    {
        let genome_a = Genome::from_fasta(filepath_a)?;
        let genome_b = Genome::from_fasta(filepath_b)?;
        Self::new(&genome_a, &genome_b, aligner)
    }

    /// Build from already aligned pairs of `(name_a, name_b, alignment)`.
    pub fn from_alignments<I, S>(alignments: I) -> Result<Self, CoordMapError>
    where
        I: IntoIterator<Item = (S, S, GappedPair)>,
        S: AsRef<str>,
    {
        let pairs = alignments
            .into_iter()
            .map(|(name_a, name_b, gapped)| {
                SequencePair::build(name_a.as_ref(), name_b.as_ref(), &gapped)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_pairs(pairs)
    }

    /// Build from two-record aligned FASTA files, one per sequence pair.
    pub fn from_aligned_fasta<P: AsRef<str>>(filepaths: &[P]) -> Result<Self, CoordMapError> {
        let alignments = filepaths
            .iter()
            .map(|path| read_aligned_pair(path.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_alignments(alignments)
    }

    fn from_pairs(pairs: Vec<SequencePair>) -> Result<Self, CoordMapError> {
        let mut index_a: GenomeMap<usize> = GenomeMap::new();
        let mut index_b: GenomeMap<usize> = GenomeMap::new();
        for (i, pair) in pairs.iter().enumerate() {
            for (index, name) in [(&index_a, &pair.name_a), (&index_b, &pair.name_b)] {
                if index.get(name).is_some() {
                    return Err(CoordMapError::DuplicateName(name.to_string()));
                }
            }
            index_a.insert(&pair.name_a, i)?;
            index_b.insert(&pair.name_b, i)?;
        }
        Ok(GenomeMapper {
            pairs,
            index_a,
            index_b,
        })
    }

    /// Return the number of sequence pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Return if there are no sequence pairs.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over the sequence pairs in genome order.
    pub fn iter(&self) -> impl Iterator<Item = &SequencePair> {
        self.pairs.iter()
    }

    /// Look up the pair containing sequence `name` on the source side.
    pub fn pair(&self, direction: Direction, name: &str) -> Result<&SequencePair, CoordMapError> {
        let index = match direction.source() {
            Which::A => &self.index_a,
            Which::B => &self.index_b,
        };
        let i = index
            .get(name)
            .ok_or_else(|| CoordMapError::NoChrom(name.to_string()))?;
        Ok(&self.pairs[*i])
    }

    /// Return the name of the sequence paired with `name`.
    pub fn map_chrom(&self, direction: Direction, name: &str) -> Result<&str, CoordMapError> {
        let pair = self.pair(direction, name)?;
        Ok(pair.name(direction.reverse().source()))
    }

    /// Map a position on sequence `name` to the paired sequence.
    ///
    /// Returns the paired sequence's name and the mapped position, which
    /// may be a range or undefined; see [`PairAligner::map`].
    pub fn map(
        &self,
        direction: Direction,
        name: &str,
        position: Position,
        side: Side,
    ) -> Result<(&str, Mapped), CoordMapError> {
        let pair = self.pair(direction, name)?;
        let mapped = pair.aligner.map(direction, position, side);
        Ok((pair.name(direction.reverse().source()), mapped))
    }

    pub fn map_chrom_a_to_b(&self, name: &str) -> Result<&str, CoordMapError> {
        self.map_chrom(Direction::AtoB, name)
    }

    pub fn map_chrom_b_to_a(&self, name: &str) -> Result<&str, CoordMapError> {
        self.map_chrom(Direction::BtoA, name)
    }

    pub fn map_a_to_b(
        &self,
        name: &str,
        position: Position,
        side: Side,
    ) -> Result<(&str, Mapped), CoordMapError> {
        self.map(Direction::AtoB, name, position, side)
    }

    pub fn map_b_to_a(
        &self,
        name: &str,
        position: Position,
        side: Side,
    ) -> Result<(&str, Mapped), CoordMapError> {
        self.map(Direction::BtoA, name, position, side)
    }

    /// Lift a batch of queries and write them as TSV.
    ///
    /// Columns are source name, source position, target name, target start
    /// and target end (inclusive). Undefined positions are written as `.`.
    ///
    /// # Arguments
    ///  * `queries`: the positions to lift.
    ///  * `direction`: which genome the query positions are on.
    ///  * `side`: used for queries that do not carry their own side.
    ///  * `filepath`: the output path, gzip-compressed if it ends with `.gz`.
    ///    If `None`, output goes to standard out.
    ///  * `header`: whether to write a column header line.
    pub fn write_lifted(
        &self,
        queries: &[Query],
        direction: Direction,
        side: Side,
        filepath: Option<&str>,
        header: bool,
    ) -> Result<(), CoordMapError> {
        let mut writer: Box<dyn Write> = match filepath {
            Some(path) => OutputFile::new(path, None).writer()?,
            None => Box::new(io::stdout()),
        };

        if header {
            writeln!(writer, "name\tposition\ttarget_name\ttarget_start\ttarget_end")?;
        }

        let mut undefined = 0;
        for query in queries {
            let side = query.side.unwrap_or(side);
            let (target, mapped) = self.map(direction, &query.name, query.position, side)?;
            let (start, end) = match mapped.interval() {
                Some((lo, hi)) => (lo.to_string(), hi.to_string()),
                None => {
                    undefined += 1;
                    (".".to_string(), ".".to_string())
                }
            };
            writeln!(
                writer,
                "{}\t{}\t{}\t{}\t{}",
                query.name, query.position, target, start, end
            )?;
        }
        writer.flush()?;

        log::info!(
            "lifted {} positions ({} outside aligned regions)",
            queries.len(),
            undefined
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const CHR1: &str = "ATGCACGTACGTATGCAAATCGG";
    const CHR2: &str = "AGTCGGTTTTCAG";
    const FIRST_CHROM: &str = "GCACGTACGTATTTGCAAATC";
    const SECOND_CHR: &str = "AGTCGGTTTCCAC";

    /// Stands in for an external aligner, returning fixed alignments.
    fn fixed_aligner(a: &[u8], b: &[u8]) -> Result<GappedPair, AlignerError> {
        if a == CHR1.as_bytes() && b == FIRST_CHROM.as_bytes() {
            Ok(GappedPair::new(
                "ATGCACGTACGTA--TGCAAATCGG",
                "--GCACGTACGTATTTGCAAATC--",
            ))
        } else if a.len() == b.len() {
            Ok(GappedPair::new(a.to_vec(), b.to_vec()))
        } else {
            Err(AlignerError::BadOutput("no fixed alignment".to_string()))
        }
    }

    fn genome_a() -> Genome {
        Genome::from_records(vec![("chr1", CHR1), ("chr2", CHR2)]).unwrap()
    }

    fn genome_b() -> Genome {
        Genome::from_records(vec![("first_chrom", FIRST_CHROM), ("second_chr", SECOND_CHR)])
            .unwrap()
    }

    fn mapper() -> GenomeMapper {
        GenomeMapper::new(&genome_a(), &genome_b(), &fixed_aligner).unwrap()
    }

    #[test]
    fn test_no_indels() {
        let cm = mapper();
        for pos in 1..=13 {
            assert_eq!(
                cm.map_a_to_b("chr2", pos, Side::Either).unwrap(),
                ("second_chr", Mapped::Position(pos))
            );
            assert_eq!(
                cm.map_b_to_a("second_chr", pos, Side::Either).unwrap(),
                ("chr2", Mapped::Position(pos))
            );
        }
    }

    #[test]
    fn test_map_indels() {
        let cm = mapper();
        let a_to_b: Vec<Mapped> = (3..=21)
            .map(|pos| {
                let (name, mapped) = cm.map_a_to_b("chr1", pos, Side::Either).unwrap();
                assert_eq!(name, "first_chrom");
                mapped
            })
            .collect();
        let mut expected: Vec<Mapped> = (1..=10).map(Mapped::Position).collect();
        expected.push(Mapped::Range(11, 13));
        expected.extend((14..=21).map(Mapped::Position));
        assert_eq!(a_to_b, expected);

        let b_to_a: Vec<Mapped> = (1..=21)
            .map(|pos| {
                let (name, mapped) = cm.map_b_to_a("first_chrom", pos, Side::Either).unwrap();
                assert_eq!(name, "chr1");
                mapped
            })
            .collect();
        let mut expected: Vec<Mapped> = (3..=13).map(Mapped::Position).collect();
        expected.extend([Mapped::Position(13), Mapped::Position(13)]);
        expected.extend((14..=21).map(Mapped::Position));
        assert_eq!(b_to_a, expected);
    }

    #[test]
    fn test_side_param() {
        let cm = mapper();
        let map = |pos, side| cm.map_a_to_b("chr1", pos, side).unwrap();
        assert_eq!(map(13, Side::Either), ("first_chrom", Mapped::Range(11, 13)));
        assert_eq!(map(13, Side::Left), ("first_chrom", Mapped::Position(11)));
        assert_eq!(map(13, Side::Right), ("first_chrom", Mapped::Position(13)));
        for side in [Side::Left, Side::Either, Side::Right] {
            assert_eq!(map(12, side), ("first_chrom", Mapped::Position(10)));
        }
    }

    #[test]
    fn test_out_of_bounds() {
        let cm = mapper();
        for pos in [-1, 0, 1, 2, 22, 23, 24] {
            assert_eq!(
                cm.map_a_to_b("chr1", pos, Side::Either).unwrap(),
                ("first_chrom", Mapped::Undefined)
            );
        }
        for pos in [-1, 0, 14, 15] {
            assert_eq!(
                cm.map_b_to_a("second_chr", pos, Side::Either).unwrap(),
                ("chr2", Mapped::Undefined)
            );
        }
    }

    #[test]
    fn test_invalid_position() {
        assert!(matches!(
            parse_position("1.5"),
            Err(CoordMapError::InvalidPosition(_))
        ));
        assert!(matches!(
            integral_position(4.5_f64),
            Err(CoordMapError::InvalidPosition(_))
        ));
        assert_eq!(parse_position(" 12 ").unwrap(), 12);
        assert_eq!(integral_position(12.0_f64).unwrap(), 12);
    }

    #[test]
    fn test_invalid_chrom() {
        let cm = mapper();
        assert!(matches!(
            cm.map_a_to_b("nonexistentchr", 2, Side::Either),
            Err(CoordMapError::NoChrom(_))
        ));
        assert!(matches!(
            cm.map_b_to_a("nonexistentchr", 2, Side::Either),
            Err(CoordMapError::NoChrom(_))
        ));
        assert!(matches!(
            cm.map_chrom_a_to_b("nonexistentchr"),
            Err(CoordMapError::NoChrom(_))
        ));
        // names are only looked up on the source side
        assert!(cm.map_chrom_a_to_b("first_chrom").is_err());
    }

    #[test]
    fn test_map_chrom_only() {
        let cm = mapper();
        assert_eq!(cm.map_chrom_a_to_b("chr1").unwrap(), "first_chrom");
        assert_eq!(cm.map_chrom_b_to_a("first_chrom").unwrap(), "chr1");
        assert_eq!(cm.map_chrom_a_to_b("chr2").unwrap(), "second_chr");
        assert_eq!(cm.map_chrom_b_to_a("second_chr").unwrap(), "chr2");
        assert_eq!(cm.len(), 2);
    }

    #[test]
    fn test_unequal_genomes() {
        let genome_b = Genome::from_records(vec![("first_chrom", FIRST_CHROM)]).unwrap();
        let result = GenomeMapper::new(&genome_a(), &genome_b, &fixed_aligner);
        assert!(matches!(
            result,
            Err(CoordMapError::UnequalSequenceCounts(2, 1))
        ));
    }

    #[test]
    fn test_aligner_failure_is_fatal() {
        let genome_b =
            Genome::from_records(vec![("first_chrom", FIRST_CHROM), ("second_chr", "ACGT")])
                .unwrap();
        let result = GenomeMapper::new(&genome_a(), &genome_b, &fixed_aligner);
        assert!(matches!(result, Err(CoordMapError::Aligner { .. })));
    }

    #[test]
    fn test_malformed_alignment_is_fatal() {
        let result = GenomeMapper::from_alignments(vec![(
            "chrA",
            "chrB",
            GappedPair::new("AC-T", "A-GT"),
        )]);
        assert!(matches!(
            result,
            Err(CoordMapError::Alignment {
                source: AlignmentError::AdjacentGaps(1, 2),
                ..
            })
        ));
    }

    #[test]
    fn test_from_alignments_duplicate_names() {
        let result = GenomeMapper::from_alignments(vec![
            ("chrA", "chrB", GappedPair::new("ACGT", "ACGT")),
            ("chrA", "chrC", GappedPair::new("ACGT", "ACGT")),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_read_and_write_lifted() {
        let cm = mapper();
        let dir = tempdir().unwrap();
        let query_path = dir.path().join("queries.tsv");
        std::fs::write(
            &query_path,
            "# name\tposition\nchr1\t13\nchr1\t13\t-1\nchr1\t1\nchr2\t5\tright\n",
        )
        .unwrap();

        let queries = read_queries(query_path.to_str().unwrap()).unwrap();
        assert_eq!(queries.len(), 4);
        assert_eq!(queries[1].side, Some(Side::Left));

        let output_path = dir.path().join("lifted.tsv");
        cm.write_lifted(
            &queries,
            Direction::AtoB,
            Side::Either,
            Some(output_path.to_str().unwrap()),
            true,
        )
        .unwrap();

        let lines = InputFile::new(output_path.to_str().unwrap()).lines().unwrap();
        assert_eq!(
            lines,
            vec![
                "name\tposition\ttarget_name\ttarget_start\ttarget_end",
                "chr1\t13\tfirst_chrom\t11\t13",
                "chr1\t13\tfirst_chrom\t11\t11",
                "chr1\t1\tfirst_chrom\t.\t.",
                "chr2\t5\tsecond_chr\t5\t5",
            ]
        );
    }

    #[test]
    fn test_read_queries_rejects_fractions() {
        let dir = tempdir().unwrap();
        let query_path = dir.path().join("queries.tsv");
        std::fs::write(&query_path, "chr1\t1.5\n").unwrap();
        assert!(matches!(
            read_queries(query_path.to_str().unwrap()),
            Err(CoordMapError::InvalidPosition(_))
        ));
    }
}
