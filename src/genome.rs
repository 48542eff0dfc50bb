use bio::io::fasta;
use indexmap::map::IndexMap;

use super::aligner::GappedPair;
use super::file::InputFile;
use super::mapper::CoordMapError;

/// The named sequences of one genome, in file order.
#[derive(Debug, Clone, Default)]
pub struct Genome {
    pub sequences: IndexMap<String, Vec<u8>>,
}

impl Genome {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a (possibly gzip-compressed) FASTA file.
    ///
    /// Sequence names are the record IDs, i.e. the header up to the first
    /// whitespace. Names must be unique.
    pub fn from_fasta(filepath: &str) -> Result<Genome, CoordMapError> {
        let reader = fasta::Reader::new(InputFile::new(filepath).reader()?);
        let mut genome = Genome::new();
        for result in reader.records() {
            let record = result?;
            genome.insert(record.id(), record.seq().to_vec())?;
        }
        if genome.is_empty() {
            return Err(CoordMapError::EmptyGenome(filepath.to_string()));
        }
        log::debug!("read {} sequences from '{}'", genome.len(), filepath);
        Ok(genome)
    }

    /// Build a genome from `(name, sequence)` records.
    pub fn from_records<I, N, S>(records: I) -> Result<Genome, CoordMapError>
    where
        I: IntoIterator<Item = (N, S)>,
        N: AsRef<str>,
        S: Into<Vec<u8>>,
    {
        let mut genome = Genome::new();
        for (name, seq) in records {
            genome.insert(name.as_ref(), seq.into())?;
        }
        Ok(genome)
    }

    /// Append a sequence, failing if the name is already present.
    pub fn insert(&mut self, name: &str, seq: Vec<u8>) -> Result<(), CoordMapError> {
        if self.sequences.contains_key(name) {
            return Err(CoordMapError::DuplicateName(name.to_string()));
        }
        self.sequences.insert(name.to_string(), seq);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.sequences.get(name).map(|seq| seq.as_slice())
    }

    /// Return the number of sequences.
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    /// Return if the genome has no sequences.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over sequence name and sequence tuples, in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<u8>)> {
        self.sequences.iter()
    }
}

/// Read a FASTA file holding exactly two gapped alignment rows.
///
/// Returns the two record names and the alignment.
pub fn read_aligned_pair(filepath: &str) -> Result<(String, String, GappedPair), CoordMapError> {
    let reader = fasta::Reader::new(InputFile::new(filepath).reader()?);
    let mut records = Vec::with_capacity(2);
    for result in reader.records() {
        records.push(result?);
    }
    match records.as_slice() {
        [a, b] => Ok((
            a.id().to_string(),
            b.id().to_string(),
            GappedPair::new(a.seq().to_vec(), b.seq().to_vec()),
        )),
        _ => Err(CoordMapError::ParseError(format!(
            "expected 2 aligned records in '{}', found {}",
            filepath,
            records.len()
        ))),
    }
}
