pub const GZ_FILE_EXTENSION: &str = "gz";

/// Number of columns in a BED12 line.
pub const BED12_COLUMNS: usize = 12;
