//! CLI subcommand implementations.

pub mod check;
pub mod fix_unpaired;
pub mod irr;
pub mod states;
pub mod time_budget;
pub mod util;
