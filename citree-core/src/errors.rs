use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegionError {
    #[error("Region has no parts")]
    EmptyRegion,

    #[error("Interval part is inverted: start={start}, end={end}")]
    InvertedPart { start: u32, end: u32 },

    #[error("Interval parts are unordered or overlapping: part {index} starts at {start} before previous end {previous_end}")]
    UnorderedParts {
        index: usize,
        start: u32,
        previous_end: u32,
    },

    #[error("Boundary list must have an even, non-zero length, got {0}")]
    OddBoundaries(usize),

    #[error("Error parsing region: {0}")]
    RegionParseError(String),

    #[error("Can't read file: {0}")]
    FileReadError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
