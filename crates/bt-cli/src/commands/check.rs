//! Check command: reports states left open in each observation.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use bt_core::ObservationId;
use clap::Args;

use super::util::{load_project, observation};

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Project file.
    #[arg(short, long)]
    pub project: PathBuf,

    /// Only check these observations (repeatable).
    #[arg(short, long = "observation")]
    pub observations: Vec<ObservationId>,
}

pub fn run<W: Write>(writer: &mut W, args: &CheckArgs) -> Result<()> {
    let project = load_project(&args.project)?;
    let observations = if args.observations.is_empty() {
        project.observations.values().collect::<Vec<_>>()
    } else {
        args.observations
            .iter()
            .map(|id| observation(&project, id))
            .collect::<Result<Vec<_>>>()?
    };

    let mut total = 0;
    let mut affected = 0;
    for obs in observations {
        let unpaired = obs.timeline.unpaired_keys(&project.ethogram);
        if unpaired.is_empty() {
            writeln!(
                writer,
                "{}: {} events, all states paired",
                obs.id,
                obs.timeline.len()
            )?;
            continue;
        }

        writeln!(
            writer,
            "{}: {} events, {} unpaired state(s)",
            obs.id,
            obs.timeline.len(),
            unpaired.len()
        )?;
        for key in &unpaired {
            writeln!(writer, "  - {key}")?;
        }
        total += unpaired.len();
        affected += 1;
    }

    if total > 0 {
        writeln!(
            writer,
            "{total} unpaired state(s) in {affected} observation(s); run `bt fix-unpaired` to close them."
        )?;
    }
    Ok(())
}
