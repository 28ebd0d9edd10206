//! CLI command handlers, one per file.

mod console;
mod resolve;
mod search;
mod split;

pub use console::{parse_pick, run_console};
pub use resolve::run_resolve;
pub use search::run_search;
pub use split::run_split;
