//! IRR command: pairwise Cohen's Kappa between observations.
//!
//! Options are merged from the config and the command line and validated
//! before the project is read.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use bt_core::{
    BehaviorCode, IrrMethod, IrrOptions, IrrReport, LabelMode, ObservationId, pairwise_irr,
};
use clap::Args;
use serde::Serialize;

use super::util::{load_project, selection};
use crate::Config;

#[derive(Debug, Args)]
pub struct IrrArgs {
    /// Project file.
    #[arg(short, long)]
    pub project: PathBuf,

    /// Observations to compare (repeatable); defaults to all.
    #[arg(short, long = "observation")]
    pub observations: Vec<ObservationId>,

    /// Weight intervals by duration and instants by the event weight.
    ///
    /// Compares codes with their modifiers unless `--no-modifiers` is given.
    #[arg(long)]
    pub weighted: bool,

    /// Include modifiers in the compared codes.
    #[arg(long)]
    pub modifiers: bool,

    /// Compare codes without modifiers, also in weighted mode.
    #[arg(long, conflicts_with = "modifiers")]
    pub no_modifiers: bool,

    /// Decimal places timestamps are rounded to, from -5 to 3.
    #[arg(long, allow_negative_numbers = true)]
    pub round_decimals: Option<i32>,

    /// Weight of each point event in weighted mode, from 0 to 10.
    #[arg(long)]
    pub event_weight: Option<f64>,

    /// Only compare these subjects (repeatable).
    #[arg(long = "subject")]
    pub subjects: Vec<String>,

    /// Only compare these behaviors (repeatable).
    #[arg(long = "behavior")]
    pub behaviors: Vec<BehaviorCode>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

impl IrrArgs {
    /// Command-line values take precedence over the config.
    pub fn options(&self, config: &Config) -> Result<IrrOptions> {
        let method = if self.weighted {
            IrrMethod::Weighted
        } else {
            IrrMethod::Unweighted
        };
        let label_mode = if self.modifiers || (self.weighted && !self.no_modifiers) {
            LabelMode::WithModifiers
        } else {
            LabelMode::Basic
        };
        IrrOptions::new(
            method,
            label_mode,
            self.round_decimals
                .unwrap_or(config.round_decimals.value()),
            self.event_weight.unwrap_or(config.event_weight.value()),
        )
        .context("invalid agreement options")
    }
}

pub fn run<W: Write>(writer: &mut W, args: &IrrArgs, config: &Config) -> Result<()> {
    let options = args.options(config)?;
    let project = load_project(&args.project)?;

    let ids: Vec<ObservationId> = if args.observations.is_empty() {
        project.observation_ids().cloned().collect()
    } else {
        args.observations.clone()
    };
    let selection = selection(&args.subjects, &args.behaviors);
    let report = pairwise_irr(&project, &ids, &selection, &options)
        .context("failed to compute agreement")?;

    if args.json {
        let json = serde_json::to_string_pretty(&IrrJson::from(&report))?;
        writeln!(writer, "{json}")?;
    } else {
        write_table(writer, &report)?;
    }
    Ok(())
}

fn method_name(method: IrrMethod) -> &'static str {
    match method {
        IrrMethod::Unweighted => "unweighted",
        IrrMethod::Weighted => "weighted",
    }
}

fn write_table<W: Write>(writer: &mut W, report: &IrrReport) -> Result<()> {
    let options = &report.options;
    writeln!(
        writer,
        "Cohen's Kappa ({}, {}, timestamps rounded to {} decimals)",
        method_name(options.method),
        match options.label_mode {
            LabelMode::Basic => "without modifiers",
            LabelMode::WithModifiers => "with modifiers",
        },
        options.round_decimals.value()
    )?;
    writeln!(writer)?;

    let ids = report.ids();
    let row_width = ids.iter().map(|id| id.as_str().len()).max().unwrap_or(0);
    let col_width = row_width.max("0.000".len());

    write!(writer, "{:row_width$}", "")?;
    for id in ids {
        write!(writer, "  {:>col_width$}", id.as_str())?;
    }
    writeln!(writer)?;

    for a in ids {
        write!(writer, "{:<row_width$}", a.as_str())?;
        for b in ids {
            let cell = report.cell(a, b).unwrap_or_default();
            write!(writer, "  {cell:>col_width$}")?;
        }
        writeln!(writer)?;
    }

    if let Some(notice) = report.undefined_notice() {
        writeln!(writer)?;
        writeln!(writer, "{notice}")?;
    }
    if !report.diagnostics().is_empty() {
        writeln!(writer)?;
        for line in report.diagnostics() {
            writeln!(writer, "{line}")?;
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct IrrJson<'a> {
    method: &'static str,
    modifiers: bool,
    round_decimals: i32,
    event_weight: f64,
    observations: &'a [ObservationId],
    /// Row-major matrix; `null` where kappa is undefined.
    kappa: Vec<Vec<Option<f64>>>,
    undefined_pairs: &'a [(ObservationId, ObservationId)],
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostics: Option<&'a [String]>,
}

impl<'a> From<&'a IrrReport> for IrrJson<'a> {
    fn from(report: &'a IrrReport) -> Self {
        let ids = report.ids();
        let kappa = ids
            .iter()
            .map(|a| {
                ids.iter()
                    .map(|b| {
                        report
                            .get(a, b)
                            .filter(|score| score.is_defined())
                            .map(|score| score.kappa)
                    })
                    .collect()
            })
            .collect();
        Self {
            method: method_name(report.options.method),
            modifiers: report.options.label_mode == LabelMode::WithModifiers,
            round_decimals: report.options.round_decimals.value(),
            event_weight: report.options.event_weight.value(),
            observations: ids,
            kappa,
            undefined_pairs: report.undefined_pairs(),
            diagnostics: Some(report.diagnostics()).filter(|lines| !lines.is_empty()),
        }
    }
}
