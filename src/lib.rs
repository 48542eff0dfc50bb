//! Map coordinates between two aligned genome assemblies.
//!
//! A [`GenomeMapper`] pairs the sequences of two genomes by file order,
//! aligns each pair, and translates sequence names and 1-based positions
//! in either direction. Where the genomes agree base-for-base the mapping
//! is exact. A base followed by an insertion in the other genome maps to
//! a range, which a [`Side`] preference can narrow to one end. Positions
//! outside the aligned span map to [`Mapped::Undefined`].
//!
//! ```no_run
//! use coordmap::prelude::*;
//! let aligner = GlobalAligner::default();
//! let mapper = GenomeMapper::from_fasta("assembly_a.fa", "assembly_b.fa", &aligner)
//!                  .expect("could not build mapper");
//!
//! let (chrom, mapped) = mapper.map_a_to_b("chr1", 1200, Side::Either)
//!                  .expect("unknown chromosome");
//! println!("chr1:1200 -> {}:{}", chrom, mapped);
//! ```
//!
//! Alignments made elsewhere can be used directly:
//!
//! ```
//! use coordmap::prelude::*;
//! let mapper = GenomeMapper::from_alignments(vec![
//!     ("chrA", "chrB", GappedPair::new("A--T", "AGGT")),
//! ]).unwrap();
//!
//! assert_eq!(mapper.map_a_to_b("chrA", 1, Side::Either).unwrap(), ("chrB", Mapped::Range(1, 3)));
//! assert_eq!(mapper.map_a_to_b("chrA", 1, Side::Right).unwrap(), ("chrB", Mapped::Position(3)));
//! assert_eq!(mapper.map_b_to_a("chrB", 2, Side::Either).unwrap(), ("chrA", Mapped::Position(1)));
//! ```

pub mod aligner;
pub mod file;
pub mod genome;
pub mod mapper;
mod numeric;
pub mod pair;

pub use aligner::{Aligner, AlignerError, GappedPair, GlobalAligner, Mafft, ScoringParams};
pub use genome::{read_aligned_pair, Genome};
pub use mapper::{
    integral_position, parse_position, read_queries, CoordMapError, GenomeMapper, Query,
    SequencePair,
};
pub use pair::{AlignmentError, Anchor, Direction, Mapped, PairAligner, Position, Side, Which};

pub mod prelude {
    pub use crate::aligner::{Aligner, GappedPair, GlobalAligner, Mafft, ScoringParams};
    pub use crate::genome::Genome;
    pub use crate::mapper::{CoordMapError, GenomeMapper};
    pub use crate::pair::{Direction, Mapped, PairAligner, Position, Side};
}
