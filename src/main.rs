use clap::{Parser, Subcommand, ValueEnum};
use coordmap::prelude::*;
use coordmap::{read_queries, CoordMapError};
use log::LevelFilter;

const INFO: &str = "\
coordmap: map coordinates between two aligned genome assemblies
usage: coordmap [--help] <subcommand>

Subcommands:

  lift: map the positions in a TSV file from one genome to the other.

";

#[derive(Parser)]
#[clap(name = "coordmap")]
#[clap(about = INFO)]
struct Cli {
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum AlignerKind {
    /// in-process Needleman-Wunsch alignment
    Global,
    /// the external mafft binary
    Mafft,
}

#[derive(Subcommand)]
enum Commands {
    /// Map positions from genome A to genome B (or back, with --reverse).
    ///
    /// The query file is a TSV of sequence name, 1-based position and an
    /// optional side (-1, 0 or 1). The output is a TSV with the columns:
    ///
    ///  - source sequence name
    ///  - source position
    ///  - target sequence name
    ///  - target start     (1-based, inclusive; '.' if unmapped)
    ///  - target end       (1-based, inclusive; '.' if unmapped)
    ///
    /// Sequences are paired by their order in the two FASTA files.
    ///
    /// Example:
    ///
    ///  $ coordmap lift --genome-a ref_v1.fa --genome-b ref_v2.fa \
    ///      sites.tsv --output sites_v2.tsv --header
    Lift {
        /// FASTA file of genome A
        #[arg(long, requires = "genome_b", required_unless_present = "alignment")]
        genome_a: Option<String>,
        /// FASTA file of genome B
        #[arg(long, requires = "genome_a")]
        genome_b: Option<String>,
        /// precomputed two-record aligned FASTA files, one per sequence pair
        #[arg(long, num_args = 1.., conflicts_with_all = ["genome_a", "genome_b"])]
        alignment: Vec<String>,
        /// the alignment backend
        #[arg(long, value_enum, default_value_t = AlignerKind::Global)]
        aligner: AlignerKind,
        /// path to the mafft binary
        #[arg(long, default_value = "mafft")]
        mafft_bin: String,
        /// match score for the global aligner
        #[arg(long, default_value_t = 1)]
        match_score: i32,
        /// mismatch score for the global aligner
        #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
        mismatch_score: i32,
        /// gap open score for the global aligner
        #[arg(long, default_value_t = -5, allow_hyphen_values = true)]
        gap_open: i32,
        /// gap extension score for the global aligner
        #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
        gap_extend: i32,
        /// flat score for leaving either end of a sequence unaligned
        #[arg(long, default_value_t = -5, allow_hyphen_values = true)]
        end_gap: i32,
        /// default side for positions that map to a range (-1, 0 or 1)
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        side: Side,
        /// map from genome B to genome A
        #[arg(long, default_value_t = false)]
        reverse: bool,
        /// number of threads used for aligning sequence pairs
        #[arg(long)]
        threads: Option<usize>,
        /// the output file path (if not set, uses standard out)
        #[arg(long)]
        output: Option<String>,
        /// the TSV file of positions to map
        #[arg(required = true)]
        queries: String,
        /// Include a header
        #[arg(long, default_value_t = false)]
        header: bool,
    },
}

fn setup_logging(debug: u8) {
    let level = match debug {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_secs()
        .init();
}

fn build_mapper(
    genome_a: Option<&str>,
    genome_b: Option<&str>,
    alignments: &[String],
    aligner: Box<dyn Aligner>,
) -> Result<GenomeMapper, CoordMapError> {
    match (genome_a, genome_b) {
        (Some(a), Some(b)) => GenomeMapper::from_fasta(a, b, aligner.as_ref()),
        _ => GenomeMapper::from_aligned_fasta(alignments),
    }
}

fn run() -> Result<(), CoordMapError> {
    let cli = Cli::parse();
    setup_logging(cli.debug);
    match cli.command {
        Some(Commands::Lift {
            genome_a,
            genome_b,
            alignment,
            aligner,
            mafft_bin,
            match_score,
            mismatch_score,
            gap_open,
            gap_extend,
            end_gap,
            side,
            reverse,
            threads,
            output,
            queries,
            header,
        }) => {
            if let Some(threads) = threads {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build_global()?;
            }
            let aligner: Box<dyn Aligner> = match aligner {
                AlignerKind::Global => Box::new(GlobalAligner::new(ScoringParams {
                    match_score,
                    mismatch_score,
                    gap_open,
                    gap_extend,
                    end_gap,
                })),
                AlignerKind::Mafft => Box::new(Mafft::new(mafft_bin)),
            };
            let mapper = build_mapper(
                genome_a.as_deref(),
                genome_b.as_deref(),
                &alignment,
                aligner,
            )?;
            let queries = read_queries(&queries)?;
            let direction = if reverse {
                Direction::BtoA
            } else {
                Direction::AtoB
            };
            mapper.write_lifted(&queries, direction, side, output.as_deref(), header)
        }
        None => {
            println!("{}\n", INFO);
            std::process::exit(1);
        }
    }
}

fn main() {
    match run() {
        Ok(_) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
