//! Disk-side concerns of a job: free-space admission and artifact splitting.
//!
//! Admission is a pure predicate plus a `statvfs` query; splitting plans
//! byte ranges (like segment planning) and writes them as part files that
//! concatenate back to the original artifact.

mod admission;
mod split;

pub use admission::{admit, free_bytes, StatvfsDisk};
pub use split::{part_file_name, plan_parts, split_file, Part, PartPlan, SplitError, SplitPolicy};
