//! States command: which states each subject is in at a given time.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use bt_core::{ObservationId, Seconds, current_states};
use clap::Args;

use super::util::{load_project, observation};

#[derive(Debug, Args)]
pub struct StatesArgs {
    /// Project file.
    #[arg(short, long)]
    pub project: PathBuf,

    /// Observation to query.
    #[arg(short, long)]
    pub observation: ObservationId,

    /// Query time in seconds (e.g. 12.5).
    #[arg(short, long)]
    pub time: Seconds,
}

pub fn run<W: Write>(writer: &mut W, args: &StatesArgs) -> Result<()> {
    let project = load_project(&args.project)?;
    let obs = observation(&project, &args.observation)?;

    let mut subjects = project.subjects.clone();
    let has_unnamed = obs.timeline.iter().any(|e| e.subject.is_empty());
    if has_unnamed && !subjects.iter().any(String::is_empty) {
        subjects.push(String::new());
    }

    let active = current_states(&obs.timeline, &project.ethogram, &subjects, args.time);

    writeln!(writer, "{} at {}", obs.id, args.time)?;
    for (idx, subject) in subjects.iter().enumerate() {
        let name = if subject.is_empty() {
            "(no focal subject)"
        } else {
            subject.as_str()
        };
        let labels = active
            .get(&idx)
            .map_or_else(|| "-".to_string(), |labels| labels.join(", "));
        writeln!(writer, "{name}: {labels}")?;
    }
    Ok(())
}
