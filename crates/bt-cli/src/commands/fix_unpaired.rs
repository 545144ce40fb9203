//! Fix-unpaired command: closes states left open at an observation boundary.
//!
//! Without `--write` the repair is only reported; the project file is left
//! untouched.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use bt_core::{ObservationId, ObservationType, Project, UnpairedNotice};
use clap::Args;

use super::util::{load_project, save_project};

#[derive(Debug, Args)]
pub struct FixUnpairedArgs {
    /// Project file.
    #[arg(short, long)]
    pub project: PathBuf,

    /// Only repair these observations (repeatable).
    #[arg(short, long = "observation")]
    pub observations: Vec<ObservationId>,

    /// Close states at the end of each media file instead of the playlist.
    #[arg(long)]
    pub per_media: bool,

    /// Save the repaired project back to the file.
    #[arg(long)]
    pub write: bool,
}

pub fn run<W: Write>(writer: &mut W, args: &FixUnpairedArgs) -> Result<()> {
    let mut project = load_project(&args.project)?;
    let ids: Vec<ObservationId> = if args.observations.is_empty() {
        project.observation_ids().cloned().collect()
    } else {
        args.observations.clone()
    };

    let mut closed = 0;
    for id in &ids {
        let notices = repair(&mut project, id, args.per_media)
            .with_context(|| format!("failed to repair observation {id}"))?;
        for notice in &notices {
            writeln!(writer, "{id}: {notice}")?;
        }
        closed += notices.len();
    }

    if closed == 0 {
        writeln!(writer, "No unpaired states.")?;
        return Ok(());
    }

    if args.write {
        save_project(&args.project, &project)?;
        writeln!(
            writer,
            "Closed {closed} state(s); saved {}",
            args.project.display()
        )?;
    } else {
        writeln!(
            writer,
            "Would close {closed} state(s); pass --write to save."
        )?;
    }
    Ok(())
}

fn repair(project: &mut Project, id: &ObservationId, per_media: bool) -> Result<Vec<UnpairedNotice>> {
    let Project {
        ethogram,
        observations,
        ..
    } = project;
    let obs = observations
        .get_mut(id)
        .with_context(|| format!("observation not found: {id}"))?;

    let mut notices = Vec::new();
    if per_media && obs.kind == ObservationType::Media {
        notices.extend(obs.close_unpaired_per_media(ethogram)?);
    }
    // States started past the last media file are closed at the playlist end.
    notices.extend(obs.close_unpaired(ethogram)?);
    Ok(notices)
}
