//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::check::CheckArgs;
use crate::commands::fix_unpaired::FixUnpairedArgs;
use crate::commands::irr::IrrArgs;
use crate::commands::states::StatesArgs;
use crate::commands::time_budget::TimeBudgetArgs;

/// Behavioral timelines and inter-rater reliability.
///
/// Reads a coding project (ethogram plus observations) and reports current
/// states, unpaired state events, agreement between raters and time budgets.
#[derive(Debug, Parser)]
#[command(name = "bt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Report states left open in each observation.
    Check(CheckArgs),

    /// Show the states active at a given time.
    States(StatesArgs),

    /// Close states left open at the observation boundary.
    FixUnpaired(FixUnpairedArgs),

    /// Compute Cohen's Kappa between pairs of observations.
    Irr(IrrArgs),

    /// Summarise occurrences and durations per behavior.
    TimeBudget(TimeBudgetArgs),
}
