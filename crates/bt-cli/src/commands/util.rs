//! Shared utilities for CLI commands.

use std::path::Path;

use anyhow::{Context, Result};
use bt_core::{BehaviorCode, Observation, ObservationId, Project, Selection};

/// Reads and parses a project file.
pub fn load_project(path: &Path) -> Result<Project> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let project = Project::from_json(&json)
        .with_context(|| format!("failed to load project {}", path.display()))?;
    tracing::debug!(
        path = %path.display(),
        observations = project.observations.len(),
        "loaded project"
    );
    Ok(project)
}

/// Writes a project file, replacing its previous contents.
pub fn save_project(path: &Path, project: &Project) -> Result<()> {
    let json = project
        .to_json_pretty()
        .context("failed to serialize project")?;
    std::fs::write(path, json + "\n")
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Looks up an observation, failing with its id when missing.
pub fn observation<'a>(project: &'a Project, id: &ObservationId) -> Result<&'a Observation> {
    project
        .observation(id)
        .with_context(|| format!("observation not found: {id}"))
}

/// Builds a subject/behavior filter; empty lists select everything.
pub fn selection(subjects: &[String], behaviors: &[BehaviorCode]) -> Selection {
    Selection {
        subjects: subjects.iter().cloned().collect(),
        behaviors: behaviors.iter().cloned().collect(),
    }
}

/// Formats an optional statistic with three decimals, or `NA`.
pub fn format_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "NA".to_string(), |v| format!("{v:.3}"))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::path::PathBuf;

    /// Two raters coding the same clip, plus a live session left open.
    pub const PROJECT: &str = r#"{
        "name": "mice",
        "ethogram": [
            {"code": "walk", "type": "state"},
            {"code": "rest", "type": "state"},
            {"code": "groom", "type": "state",
             "modifier_sets": [{"name": "area", "kind": "multiple", "values": ["head", "tail"]}]},
            {"code": "bark", "type": "point"}
        ],
        "subjects": ["mouse"],
        "observations": {
            "rater-a": {
                "type": "media",
                "media_durations": ["20"],
                "events": [
                    ["0", "mouse", "walk", ""],
                    ["5", "mouse", "walk", ""],
                    ["5", "mouse", "rest", ""],
                    ["10", "mouse", "rest", ""],
                    ["7", "mouse", "bark", ""]
                ]
            },
            "rater-b": {
                "type": "media",
                "media_durations": ["20"],
                "events": [
                    ["0", "mouse", "walk", ""],
                    ["5", "mouse", "walk", ""],
                    ["5", "mouse", "rest", ""],
                    ["10", "mouse", "rest", ""]
                ]
            },
            "live": {
                "type": "live",
                "interval": {"start": "0", "stop": "60"},
                "events": [
                    ["3", "mouse", "groom", "head,tail"],
                    ["8", "mouse", "walk", ""]
                ]
            }
        }
    }"#;

    pub fn project_file() -> (tempfile::TempDir, PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("project.json");
        std::fs::write(&path, PROJECT).unwrap();
        (temp, path)
    }
}
