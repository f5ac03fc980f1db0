pub mod interval;
pub mod region;
pub mod region_set;
pub mod spliced;

// re-export for cleaner imports
pub use self::interval::Interval;
pub use self::region::Region;
pub use self::region_set::RegionSet;
pub use self::spliced::SplicedInterval;
