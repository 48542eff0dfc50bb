//! Plaintext and gzip-compressed file input and output.
//!
//! Genome FASTA files, query TSVs and lifted output may all be gzipped;
//! [`InputFile`] sniffs the gzip magic number and [`OutputFile`] compresses
//! when the path ends in `.gz`.
//!
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileError {
    #[error("IO error on '{0}': {1}")]
    IOError(String, #[source] io::Error),
}

/// Check if a file is a gzipped by looking for the magic numbers
fn is_gzipped_file(file_path: &str) -> io::Result<bool> {
    let mut file = File::open(file_path)?;
    let mut buffer = [0; 2];
    // files shorter than the magic number are plaintext
    match file.read_exact(&mut buffer) {
        Ok(()) => Ok(buffer == [0x1f, 0x8b]),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// An input file that may be gzip-compressed.
pub struct InputFile {
    pub filepath: String,
}

impl InputFile {
    pub fn new(filepath: &str) -> Self {
        Self {
            filepath: filepath.to_string(),
        }
    }

    /// Opens the file and returns a buffered reader, decompressing if the
    /// file starts with the gzip magic number.
    pub fn reader(&self) -> Result<BufReader<Box<dyn Read + Send>>, FileError> {
        let wrap = |e| FileError::IOError(self.filepath.clone(), e);
        let file = File::open(&self.filepath).map_err(wrap)?;
        let is_gzipped = is_gzipped_file(&self.filepath).map_err(wrap)?;
        log::debug!(
            "opening '{}'{}",
            self.filepath,
            if is_gzipped { " (gzip)" } else { "" }
        );
        let reader: Box<dyn Read + Send> = if is_gzipped {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(BufReader::new(reader))
    }

    /// Read all lines, for small inputs.
    pub fn lines(&self) -> Result<Vec<String>, FileError> {
        self.reader()?
            .lines()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| FileError::IOError(self.filepath.clone(), e))
    }
}

/// An output file, gzip-compressed if the path ends with `.gz`.
pub struct OutputFile {
    pub filepath: String,
    /// Comment lines written (prefixed with `#`) before any records.
    pub header: Option<Vec<String>>,
}

impl OutputFile {
    pub fn new(filepath: &str, header: Option<Vec<String>>) -> Self {
        Self {
            filepath: filepath.to_string(),
            header,
        }
    }

    /// Create the file and return a writer with the header already written.
    pub fn writer(&self) -> Result<Box<dyn Write>, io::Error> {
        let outfile = &self.filepath;
        let is_gzip = outfile.ends_with(".gz");
        let mut writer: Box<dyn Write> = if is_gzip {
            Box::new(BufWriter::new(GzEncoder::new(
                File::create(outfile)?,
                Compression::default(),
            )))
        } else {
            Box::new(BufWriter::new(File::create(outfile)?))
        };
        if let Some(entries) = &self.header {
            for entry in entries {
                writeln!(writer, "#{}", entry)?;
            }
        }
        Ok(writer)
    }
}
