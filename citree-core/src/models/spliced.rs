use std::fmt::{self, Display};

use crate::errors::RegionError;
use crate::models::Interval;

///
/// A region made of one or more disjoint parts, e.g. the exons of a transcript.
///
/// Parts are kept ascending and non-overlapping; adjacent parts may touch
/// (`previous.end == next.start`). Every part satisfies `start <= end`.
///
#[derive(Eq, PartialEq, Hash, Debug, Clone)]
pub struct SplicedInterval {
    parts: Vec<Interval>,
}

impl SplicedInterval {
    ///
    /// Create a new spliced interval from its parts, validating their order.
    ///
    pub fn new(parts: Vec<Interval>) -> Result<Self, RegionError> {
        if parts.is_empty() {
            return Err(RegionError::EmptyRegion);
        }

        let mut previous_end: Option<u32> = None;
        for (index, part) in parts.iter().enumerate() {
            if part.start > part.end {
                return Err(RegionError::InvertedPart {
                    start: part.start,
                    end: part.end,
                });
            }
            if let Some(previous_end) = previous_end {
                if part.start < previous_end {
                    return Err(RegionError::UnorderedParts {
                        index,
                        start: part.start,
                        previous_end,
                    });
                }
            }
            previous_end = Some(part.end);
        }

        Ok(SplicedInterval { parts })
    }

    ///
    /// Create a single-part interval [start, end)
    ///
    pub fn single(start: u32, end: u32) -> Result<Self, RegionError> {
        Self::new(vec![Interval::new(start, end)])
    }

    ///
    /// Rebuild a spliced interval from its flat boundary list
    /// `[start_0, end_0, start_1, end_1, ...]`.
    ///
    pub fn from_boundaries(boundaries: &[u32]) -> Result<Self, RegionError> {
        if boundaries.is_empty() || boundaries.len() % 2 != 0 {
            return Err(RegionError::OddBoundaries(boundaries.len()));
        }
        let parts = boundaries
            .chunks_exact(2)
            .map(|pair| Interval::new(pair[0], pair[1]))
            .collect();
        Self::new(parts)
    }

    #[inline]
    pub fn parts(&self) -> &[Interval] {
        &self.parts
    }

    #[inline]
    pub fn num_parts(&self) -> usize {
        self.parts.len()
    }

    /// Start of the first part.
    #[inline]
    pub fn first(&self) -> u32 {
        self.parts[0].start
    }

    /// End of the last part.
    #[inline]
    pub fn last(&self) -> u32 {
        self.parts[self.parts.len() - 1].end
    }

    /// The smallest single interval covering every part.
    pub fn span(&self) -> Interval {
        Interval::new(self.first(), self.last())
    }

    /// All boundaries in order: start and end of every part.
    pub fn boundaries(&self) -> impl Iterator<Item = u32> + '_ {
        self.parts.iter().flat_map(|p| [p.start, p.end])
    }

    /// True if any part overlaps the half-open range start .. end.
    pub fn overlaps(&self, start: u32, end: u32) -> bool {
        self.parts.iter().any(|p| p.overlap(start, end))
    }

    /// True if the whole region lies within start .. end.
    pub fn contained_in(&self, start: u32, end: u32) -> bool {
        start <= self.first() && self.last() <= end
    }
}

impl TryFrom<Vec<Interval>> for SplicedInterval {
    type Error = RegionError;

    fn try_from(value: Vec<Interval>) -> Result<Self, Self::Error> {
        SplicedInterval::new(value)
    }
}

impl From<SplicedInterval> for Vec<Interval> {
    fn from(value: SplicedInterval) -> Self {
        value.parts
    }
}

impl Display for SplicedInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.parts.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}
