//! Repository traits for metadata operations.

pub mod entries;
pub mod stats;

pub use entries::EntryRepo;
pub use stats::StatsRepo;
