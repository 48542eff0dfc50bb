//! Position mapping between the two sequences of a single pairwise alignment.
//!
//! A [`PairAligner`] is built from two gapped strings of equal length (one
//! row per sequence, `-` marking a gap) and answers position queries in
//! either direction.
//!
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::numeric::{search_sorted, SearchResult};

/// The integer type for 1-based positions on an ungapped sequence.
///
/// Signed, so that zero and negative query positions can be represented
/// and reported as [`Mapped::Undefined`] rather than rejected by the type.
pub type Position = i64;

/// The gap character in a gapped alignment row.
pub const GAP: u8 = b'-';

#[derive(Error, Debug, PartialEq)]
pub enum AlignmentError {
    #[error("Alignment rows differ in length ({0} vs {1})")]
    UnequalLength(usize, usize),
    #[error("Alignment row {0} contains no bases")]
    NoRealBases(Which),
    #[error("Both rows are gapped at alignment column {0}")]
    DoubleGap(usize),
    #[error("Insertion directly adjacent to a deletion at alignment columns {0}-{1}")]
    AdjacentGaps(usize, usize),
}

/// Names one of the two sequences of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Which {
    A,
    B,
}

impl fmt::Display for Which {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Which::A => write!(f, "A"),
            Which::B => write!(f, "B"),
        }
    }
}

/// The direction of a position query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    AtoB,
    BtoA,
}

impl Direction {
    /// The sequence positions are read from.
    pub fn source(&self) -> Which {
        match self {
            Direction::AtoB => Which::A,
            Direction::BtoA => Which::B,
        }
    }

    /// The opposite direction.
    pub fn reverse(&self) -> Direction {
        match self {
            Direction::AtoB => Direction::BtoA,
            Direction::BtoA => Direction::AtoB,
        }
    }
}

/// Preference for resolving a position that maps onto a range of target
/// positions (a base followed by an insertion in the target).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Side {
    /// Take the lowest target position.
    Left,
    /// Keep the whole range.
    #[default]
    Either,
    /// Take the highest target position.
    Right,
}

impl Side {
    /// Interpret a signed integer by its sign: negative is [`Side::Left`],
    /// zero is [`Side::Either`] and positive is [`Side::Right`].
    pub fn from_sign(value: i64) -> Self {
        match value.signum() {
            -1 => Side::Left,
            1 => Side::Right,
            _ => Side::Either,
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid side '{0}': expected a signed integer, 'left', 'right' or 'either'")]
pub struct ParseSideError(String);

impl FromStr for Side {
    type Err = ParseSideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(Side::Left),
            "right" | "r" => Ok(Side::Right),
            "either" | "both" => Ok(Side::Either),
            _ => s
                .parse::<i64>()
                .map(Side::from_sign)
                .map_err(|_| ParseSideError(s.to_string())),
        }
    }
}

/// The outcome of mapping a single position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mapped {
    /// A single target position.
    Position(Position),
    /// An inclusive range of target positions, `lo < hi`.
    Range(Position, Position),
    /// The position lies outside the aligned span of the sequence.
    Undefined,
}

impl Mapped {
    /// The inclusive target interval, or `None` if undefined.
    pub fn interval(&self) -> Option<(Position, Position)> {
        match *self {
            Mapped::Position(pos) => Some((pos, pos)),
            Mapped::Range(lo, hi) => Some((lo, hi)),
            Mapped::Undefined => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        !matches!(self, Mapped::Undefined)
    }
}

impl fmt::Display for Mapped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mapped::Position(pos) => write!(f, "{}", pos),
            Mapped::Range(lo, hi) => write!(f, "{}-{}", lo, hi),
            Mapped::Undefined => write!(f, "."),
        }
    }
}

/// A pair of positions where both sequences carry an aligned base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub a: Position,
    pub b: Position,
}

/// Bidirectional position map for one aligned pair of sequences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairAligner {
    /// Anchor positions on sequence A, strictly increasing.
    a_anchors: Vec<Position>,
    /// Anchor positions on sequence B, strictly increasing and parallel to `a_anchors`.
    b_anchors: Vec<Position>,
    /// Ungapped length of sequence A.
    a_len: Position,
    /// Ungapped length of sequence B.
    b_len: Position,
}

impl PairAligner {
    /// Build the position map from two gapped alignment rows.
    ///
    /// # Errors
    /// The rows must have equal length, each must hold at least one base,
    /// no column may be gapped in both rows, and a gap in one row may not
    /// directly follow a gap in the other.
    pub fn new<S: AsRef<[u8]>>(gapped_a: S, gapped_b: S) -> Result<Self, AlignmentError> {
        let (row_a, row_b) = (gapped_a.as_ref(), gapped_b.as_ref());
        if row_a.len() != row_b.len() {
            return Err(AlignmentError::UnequalLength(row_a.len(), row_b.len()));
        }
        if row_a.iter().all(|&c| c == GAP) {
            return Err(AlignmentError::NoRealBases(Which::A));
        }
        if row_b.iter().all(|&c| c == GAP) {
            return Err(AlignmentError::NoRealBases(Which::B));
        }

        let mut a_anchors = Vec::new();
        let mut b_anchors = Vec::new();
        let mut a_pos: Position = 0;
        let mut b_pos: Position = 0;
        let mut last_gap: Option<Which> = None;

        for (column, (&ca, &cb)) in row_a.iter().zip(row_b).enumerate() {
            let gap = match (ca == GAP, cb == GAP) {
                (true, true) => return Err(AlignmentError::DoubleGap(column)),
                (false, false) => {
                    a_pos += 1;
                    b_pos += 1;
                    a_anchors.push(a_pos);
                    b_anchors.push(b_pos);
                    None
                }
                (true, false) => {
                    b_pos += 1;
                    Some(Which::A)
                }
                (false, true) => {
                    a_pos += 1;
                    Some(Which::B)
                }
            };
            if let (Some(previous), Some(current)) = (last_gap, gap) {
                if previous != current {
                    return Err(AlignmentError::AdjacentGaps(column - 1, column));
                }
            }
            last_gap = gap;
        }

        log::debug!(
            "built position map with {} anchors ({} bp vs {} bp)",
            a_anchors.len(),
            a_pos,
            b_pos
        );

        Ok(Self {
            a_anchors,
            b_anchors,
            a_len: a_pos,
            b_len: b_pos,
        })
    }

    /// Ungapped length of the given sequence.
    pub fn seq_len(&self, which: Which) -> Position {
        match which {
            Which::A => self.a_len,
            Which::B => self.b_len,
        }
    }

    /// Return the number of anchors.
    pub fn len(&self) -> usize {
        self.a_anchors.len()
    }

    /// Return if there are no anchors.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over the anchors in increasing order.
    pub fn anchors(&self) -> impl Iterator<Item = Anchor> + '_ {
        self.a_anchors
            .iter()
            .zip(self.b_anchors.iter())
            .map(|(&a, &b)| Anchor { a, b })
    }

    /// Map a 1-based position across the alignment.
    ///
    /// # Arguments
    ///  * `direction`: which sequence `position` is on.
    ///  * `position`: the 1-based position on the source sequence.
    ///  * `side`: how to resolve a position that maps to a range.
    ///
    /// A base aligned to a base followed by an insertion in the target maps
    /// to the range covering the aligned base and the inserted bases. A base
    /// deleted from the target maps to the last aligned target base before
    /// it. Positions before the first or after the last aligned base, or
    /// outside the sequence, are [`Mapped::Undefined`].
    pub fn map(&self, direction: Direction, position: Position, side: Side) -> Mapped {
        let (from, to) = match direction {
            Direction::AtoB => (&self.a_anchors, &self.b_anchors),
            Direction::BtoA => (&self.b_anchors, &self.a_anchors),
        };
        if position < 1 || position > self.seq_len(direction.source()) {
            return Mapped::Undefined;
        }

        match search_sorted(from, &position) {
            SearchResult::Exact(idx) => {
                let lo = to[idx];
                // Adjacent insertion/deletion is rejected at construction, so a
                // jump in the target after an exact hit is a pure insertion.
                match to.get(idx + 1) {
                    Some(&next) if next - lo > 1 => match side {
                        Side::Left => Mapped::Position(lo),
                        Side::Right => Mapped::Position(next - 1),
                        Side::Either => Mapped::Range(lo, next - 1),
                    },
                    _ => Mapped::Position(lo),
                }
            }
            SearchResult::Between(idx) => Mapped::Position(to[idx - 1]),
            SearchResult::Before | SearchResult::After => Mapped::Undefined,
        }
    }

    pub fn map_a_to_b(&self, position: Position, side: Side) -> Mapped {
        self.map(Direction::AtoB, position, side)
    }

    pub fn map_b_to_a(&self, position: Position, side: Side) -> Mapped {
        self.map(Direction::BtoA, position, side)
    }
}
