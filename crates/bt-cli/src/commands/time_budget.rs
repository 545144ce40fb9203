//! Time-budget command: occurrences, durations and rates per behavior.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use bt_core::{BehaviorCode, ObservationId, TimeBudget, time_budget};
use clap::Args;
use serde::Serialize;

use super::util::{format_optional, load_project, observation, selection};

#[derive(Debug, Args)]
pub struct TimeBudgetArgs {
    /// Project file.
    #[arg(short, long)]
    pub project: PathBuf,

    /// Observation to summarise.
    #[arg(short, long)]
    pub observation: ObservationId,

    /// Only include these subjects (repeatable).
    #[arg(long = "subject")]
    pub subjects: Vec<String>,

    /// Only include these behaviors (repeatable).
    #[arg(long = "behavior")]
    pub behaviors: Vec<BehaviorCode>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run<W: Write>(writer: &mut W, args: &TimeBudgetArgs) -> Result<()> {
    let project = load_project(&args.project)?;
    let obs = observation(&project, &args.observation)?;
    let budget = time_budget(
        obs,
        &project.ethogram,
        &selection(&args.subjects, &args.behaviors),
    )
    .with_context(|| format!("failed to compute time budget of {}", obs.id))?;

    if args.json {
        let json = serde_json::to_string_pretty(&BudgetJson::from(&budget))?;
        writeln!(writer, "{json}")?;
    } else {
        write_table(writer, &obs.id, &budget)?;
    }
    Ok(())
}

fn write_table<W: Write>(writer: &mut W, id: &ObservationId, budget: &TimeBudget) -> Result<()> {
    writeln!(
        writer,
        "Time budget of {id} ({} to {})",
        budget.span.start, budget.span.stop
    )?;
    writeln!(writer)?;

    if budget.rows.is_empty() {
        writeln!(writer, "No coded behaviors in the analysed span.")?;
        return Ok(());
    }

    let subject_width = budget
        .rows
        .iter()
        .map(|r| r.subject.len())
        .chain(["Subject".len()])
        .max()
        .unwrap_or(0);
    let behavior_width = budget
        .rows
        .iter()
        .map(|r| r.behavior.as_str().len())
        .chain(["Behavior".len()])
        .max()
        .unwrap_or(0);

    writeln!(
        writer,
        "{:<subject_width$}  {:<behavior_width$}  {:>5}  {:>9}  {:>8}  {:>8}  {:>6}  {:>8}",
        "Subject", "Behavior", "Count", "Total (s)", "Mean (s)", "Std dev", "% time", "Rate/min"
    )?;
    for row in &budget.rows {
        let subject = if row.subject.is_empty() {
            "-"
        } else {
            row.subject.as_str()
        };
        let total = row
            .total_duration
            .map_or_else(|| "NA".to_string(), |t| t.to_string());
        let percent = format_percent(row.proportion);
        writeln!(
            writer,
            "{:<subject_width$}  {:<behavior_width$}  {:>5}  {:>9}  {:>8}  {:>8}  {:>6}  {:>8}",
            subject,
            row.behavior.as_str(),
            row.occurrences,
            total,
            format_optional(row.mean_duration),
            format_optional(row.std_dev),
            percent,
            format_optional(row.rate_per_minute),
        )?;
    }
    Ok(())
}

fn format_percent(proportion: Option<f64>) -> String {
    proportion.map_or_else(|| "NA".to_string(), |p| format!("{:.1}", p * 100.0))
}

#[derive(Debug, Serialize)]
struct BudgetJson {
    start: String,
    stop: String,
    rows: Vec<BudgetRowJson>,
}

#[derive(Debug, Serialize)]
struct BudgetRowJson {
    subject: String,
    behavior: String,
    #[serde(rename = "type")]
    kind: &'static str,
    occurrences: usize,
    total_duration: Option<String>,
    mean_duration: Option<f64>,
    std_dev: Option<f64>,
    proportion: Option<f64>,
    rate_per_minute: Option<f64>,
}

impl From<&TimeBudget> for BudgetJson {
    fn from(budget: &TimeBudget) -> Self {
        Self {
            start: budget.span.start.to_string(),
            stop: budget.span.stop.to_string(),
            rows: budget
                .rows
                .iter()
                .map(|row| BudgetRowJson {
                    subject: row.subject.clone(),
                    behavior: row.behavior.to_string(),
                    kind: row.kind.as_str(),
                    occurrences: row.occurrences,
                    total_duration: row.total_duration.map(|t| t.to_string()),
                    mean_duration: row.mean_duration,
                    std_dev: row.std_dev,
                    proportion: row.proportion,
                    rate_per_minute: row.rate_per_minute,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::util::fixtures::project_file;

    use insta::assert_snapshot;

    fn args(project: PathBuf, observation: &str) -> TimeBudgetArgs {
        TimeBudgetArgs {
            project,
            observation: ObservationId::new(observation).unwrap(),
            subjects: Vec::new(),
            behaviors: Vec::new(),
            json: false,
        }
    }

    #[test]
    fn budget_table() {
        let (_temp, path) = project_file();
        let mut output = Vec::new();
        run(&mut output, &args(path, "rater-a")).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Time budget of rater-a (0.000 to 20.000)

        Subject  Behavior  Count  Total (s)  Mean (s)   Std dev  % time  Rate/min
        mouse    bark          1         NA        NA        NA      NA     3.000
        mouse    rest          1      5.000     5.000        NA    25.0     3.000
        mouse    walk          1      5.000     5.000        NA    25.0     3.000
        ");
    }

    #[test]
    fn budget_json() {
        let (_temp, path) = project_file();
        let args = TimeBudgetArgs {
            json: true,
            behaviors: vec![BehaviorCode::new("walk").unwrap()],
            ..args(path, "rater-b")
        };
        let mut output = Vec::new();
        run(&mut output, &args).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["stop"], "20.000");
        assert_eq!(value["rows"].as_array().unwrap().len(), 1);
        assert_eq!(value["rows"][0]["type"], "state");
        assert_eq!(value["rows"][0]["total_duration"], "5.000");
        assert!(value["rows"][0]["std_dev"].is_null());
    }

    #[test]
    fn budget_requires_paired_states() {
        let (_temp, path) = project_file();
        let err = run(&mut Vec::new(), &args(path, "live")).unwrap_err();
        assert_eq!(err.to_string(), "failed to compute time budget of live");
    }
}
