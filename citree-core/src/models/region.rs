use std::fmt::{self, Display};

use crate::models::SplicedInterval;

///
/// Region struct, representation of one (possibly spliced) region of a reference sequence
///
#[derive(Eq, PartialEq, Hash, Debug, Clone)]
pub struct Region {
    pub chr: String,
    pub interval: SplicedInterval,

    pub rest: Option<String>,
}

impl Region {
    ///
    /// Start of the first part
    ///
    pub fn start(&self) -> u32 {
        self.interval.first()
    }

    ///
    /// End of the last part
    ///
    pub fn end(&self) -> u32 {
        self.interval.last()
    }

    ///
    /// Get length of the region span, introns included
    ///
    pub fn width(&self) -> u32 {
        self.end() - self.start()
    }

    pub fn is_spliced(&self) -> bool {
        self.interval.num_parts() > 1
    }

    ///
    /// Get the BED line of the Region. Spliced regions are written as BED12,
    /// filling missing name..itemRgb columns with placeholders.
    ///
    pub fn as_string(&self) -> String {
        if !self.is_spliced() {
            return format!(
                "{}\t{}\t{}{}",
                self.chr,
                self.start(),
                self.end(),
                self.rest
                    .as_deref()
                    .map_or(String::new(), |s| format!("\t{}", s)),
            );
        }

        let start = self.start();
        let start_str = start.to_string();
        let end_str = self.end().to_string();
        let defaults = [".", "0", ".", start_str.as_str(), end_str.as_str(), "0"];
        let given: Vec<&str> = self
            .rest
            .as_deref()
            .map(|s| s.split('\t').collect())
            .unwrap_or_default();
        let columns: Vec<&str> = defaults
            .iter()
            .enumerate()
            .map(|(i, d)| given.get(i).copied().unwrap_or(d))
            .collect();

        let parts = self.interval.parts();
        let sizes: String = parts.iter().map(|p| format!("{},", p.width())).collect();
        let starts: String = parts
            .iter()
            .map(|p| format!("{},", p.start - start))
            .collect();

        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.chr,
            start,
            self.end(),
            columns.join("\t"),
            parts.len(),
            sizes,
            starts
        )
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}
