//! Inter-rater reliability: Cohen's Kappa between pairs of observations.
//!
//! # Algorithm Summary
//!
//! 1. Aggregate each observation into labelled spans and round their
//!    boundaries to the configured number of decimals.
//! 2. Decompose each pair into aligned labels (see [`crate::intervals`]).
//! 3. Accumulate a contingency table: one unit per interval and instant
//!    (unweighted), or interval duration and a fixed weight per instant
//!    (weighted).
//! 4. `kappa = (Po - Pe) / (1 - Pe)`; undefined (NaN) when the table is
//!    empty or `Pe == 1`.
//!
//! An undefined kappa is a result, not an error. The pairwise sweep collects
//! undefined pairs so callers can report them once.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use thiserror::Error;

use crate::intervals::{AlignedLabels, CodedSpan, Unit, align};
use crate::project::Project;
use crate::segments::{LabelMode, SegmentError, Selection, coded_spans};
use crate::types::{EventWeight, ObservationId, RoundDecimals, ValidationError};

/// How comparison units are weighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IrrMethod {
    /// Every interval and instant counts once.
    #[default]
    Unweighted,
    /// Intervals count their duration in seconds, instants the event weight.
    Weighted,
}

/// Options of an agreement analysis, validated on construction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IrrOptions {
    pub method: IrrMethod,
    pub label_mode: LabelMode,
    pub round_decimals: RoundDecimals,
    pub event_weight: EventWeight,
}

impl IrrOptions {
    /// Builds options from raw values, rejecting out-of-range parameters.
    pub fn new(
        method: IrrMethod,
        label_mode: LabelMode,
        round_decimals: i32,
        event_weight: f64,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            method,
            label_mode,
            round_decimals: RoundDecimals::new(round_decimals)?,
            event_weight: EventWeight::new(event_weight)?,
        })
    }

    /// Duration-weighted comparison of labels including modifiers.
    pub fn weighted() -> Self {
        Self {
            method: IrrMethod::Weighted,
            label_mode: LabelMode::WithModifiers,
            ..Self::default()
        }
    }

    fn unit_weight(&self, unit: &Unit) -> f64 {
        match (self.method, unit) {
            (IrrMethod::Unweighted, _) => 1.0,
            (IrrMethod::Weighted, Unit::Interval { .. }) => unit.duration().as_secs_f64(),
            (IrrMethod::Weighted, Unit::Instant { .. }) => self.event_weight.value(),
        }
    }
}

/// Errors from the pairwise sweep.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IrrError {
    #[error("observation not found: {0}")]
    UnknownObservation(ObservationId),

    #[error("observation {observation}: {source}")]
    Segments {
        observation: ObservationId,
        #[source]
        source: SegmentError,
    },
}

/// Agreement statistic of one rater pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KappaScore {
    /// Cohen's Kappa; NaN when undefined.
    pub kappa: f64,
    /// Observed proportion of agreement (Po).
    pub observed: f64,
    /// Agreement expected by chance (Pe).
    pub expected: f64,
    pub total_weight: f64,
}

impl KappaScore {
    pub fn is_defined(&self) -> bool {
        !self.kappa.is_nan()
    }

    /// Kappa with three decimals, or `"NaN"`.
    pub fn format_kappa(&self) -> String {
        format_ratio(self.kappa)
    }
}

fn format_ratio(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else {
        // Adding zero turns -0.0 into 0.0.
        format!("{:.3}", value + 0.0)
    }
}

/// Accumulated weight per pair of labels `(first rater, second rater)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContingencyTable {
    cells: BTreeMap<(String, String), f64>,
    first: BTreeMap<String, f64>,
    second: BTreeMap<String, f64>,
    total: f64,
}

impl ContingencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, first: &str, second: &str, weight: f64) {
        *self
            .cells
            .entry((first.to_string(), second.to_string()))
            .or_default() += weight;
        *self.first.entry(first.to_string()).or_default() += weight;
        *self.second.entry(second.to_string()).or_default() += weight;
        self.total += weight;
    }

    /// Builds the table of an aligned pair.
    pub fn from_aligned(aligned: &AlignedLabels, options: &IrrOptions) -> Self {
        let mut table = Self::new();
        for (unit, first, second) in aligned.iter() {
            table.add(first, second, options.unit_weight(unit));
        }
        table
    }

    pub fn cells(&self) -> &BTreeMap<(String, String), f64> {
        &self.cells
    }

    pub fn weight(&self, first: &str, second: &str) -> f64 {
        self.cells
            .get(&(first.to_string(), second.to_string()))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn total_weight(&self) -> f64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Po: weight on the diagonal over the total.
    pub fn observed_agreement(&self) -> f64 {
        let agreeing: f64 = self
            .cells
            .iter()
            .filter(|((a, b), _)| a == b)
            .map(|(_, w)| w)
            .sum();
        agreeing / self.total
    }

    /// Pe: sum over labels of the product of both raters' marginal proportions.
    pub fn expected_agreement(&self) -> f64 {
        self.first
            .iter()
            .filter_map(|(label, w1)| {
                self.second
                    .get(label)
                    .map(|w2| (w1 / self.total) * (w2 / self.total))
            })
            .sum()
    }

    pub fn score(&self) -> KappaScore {
        if self.total <= 0.0 {
            return KappaScore {
                kappa: f64::NAN,
                observed: f64::NAN,
                expected: f64::NAN,
                total_weight: self.total,
            };
        }
        let observed = self.observed_agreement();
        let expected = self.expected_agreement();
        let kappa = if (1.0 - expected).abs() <= f64::EPSILON {
            f64::NAN
        } else {
            (observed - expected) / (1.0 - expected)
        };
        KappaScore {
            kappa,
            observed,
            expected,
            total_weight: self.total,
        }
    }
}

/// Rounds span boundaries; may turn short segments into points.
pub fn round_spans(spans: &[CodedSpan], decimals: RoundDecimals) -> Vec<CodedSpan> {
    spans
        .iter()
        .map(|span| CodedSpan {
            start: span.start.round(decimals),
            stop: span.stop.round(decimals),
            label: span.label.clone(),
        })
        .collect()
}

/// Cohen's Kappa between two raters' spans.
///
/// Spans are rounded to `options.round_decimals` before decomposition.
pub fn cohen_kappa(
    first: &[CodedSpan],
    second: &[CodedSpan],
    options: &IrrOptions,
) -> (KappaScore, ContingencyTable) {
    let first = round_spans(first, options.round_decimals);
    let second = round_spans(second, options.round_decimals);
    let aligned = align(&first, &second);
    let table = ContingencyTable::from_aligned(&aligned, options);
    (table.score(), table)
}

/// Kappa matrix of a pairwise sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct IrrReport {
    pub options: IrrOptions,
    ids: Vec<ObservationId>,
    scores: BTreeMap<(ObservationId, ObservationId), KappaScore>,
    undefined: Vec<(ObservationId, ObservationId)>,
    diagnostics: Vec<String>,
}

impl IrrReport {
    /// Observation ids in row/column order.
    pub fn ids(&self) -> &[ObservationId] {
        &self.ids
    }

    /// Score of a pair, in either order.
    pub fn get(&self, a: &ObservationId, b: &ObservationId) -> Option<&KappaScore> {
        self.scores.get(&(a.clone(), b.clone()))
    }

    /// Matrix cell text: three-decimal kappa or `"NaN"`.
    pub fn cell(&self, a: &ObservationId, b: &ObservationId) -> Option<String> {
        self.get(a, b).map(KappaScore::format_kappa)
    }

    /// Pairs (`i <= j`) whose kappa is undefined.
    pub fn undefined_pairs(&self) -> &[(ObservationId, ObservationId)] {
        &self.undefined
    }

    /// Per-pair diagnostics of the weighted method.
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    /// One notice summarising every undefined pair, if any.
    pub fn undefined_notice(&self) -> Option<String> {
        if self.undefined.is_empty() {
            return None;
        }
        let mut notice = format!(
            "Cohen's Kappa is undefined (NaN) for {} pair(s):",
            self.undefined.len()
        );
        for (a, b) in &self.undefined {
            let _ = write!(notice, " {a}/{b}");
        }
        notice.push_str(". No comparable units or only one code in use.");
        Some(notice)
    }
}

/// Compares every pair `(i, j)`, `i <= j`, of the given observations.
///
/// Results are stored for both `(i, j)` and `(j, i)`. Duplicate ids are
/// compared once.
pub fn pairwise_irr(
    project: &Project,
    ids: &[ObservationId],
    selection: &Selection,
    options: &IrrOptions,
) -> Result<IrrReport, IrrError> {
    let mut unique: Vec<ObservationId> = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(id) {
            unique.push(id.clone());
        }
    }

    let spans = unique
        .iter()
        .map(|id| observation_spans(project, id, selection, options.label_mode))
        .collect::<Result<Vec<_>, _>>()?;

    let mut report = IrrReport {
        options: *options,
        ids: unique.clone(),
        scores: BTreeMap::new(),
        undefined: Vec::new(),
        diagnostics: Vec::new(),
    };

    for (i, a) in unique.iter().enumerate() {
        for (j, b) in unique.iter().enumerate().skip(i) {
            let (score, _) = cohen_kappa(&spans[i], &spans[j], options);
            tracing::debug!(first = %a, second = %b, kappa = score.kappa, "compared observations");

            if !score.is_defined() {
                report.undefined.push((a.clone(), b.clone()));
            }
            if options.method == IrrMethod::Weighted {
                report
                    .diagnostics
                    .push(weighted_diagnostic(a, b, &score, options.event_weight));
            }
            report.scores.insert((a.clone(), b.clone()), score);
            report.scores.insert((b.clone(), a.clone()), score);
        }
    }

    if let Some(notice) = report.undefined_notice() {
        tracing::info!("{notice}");
    }
    Ok(report)
}

fn observation_spans(
    project: &Project,
    id: &ObservationId,
    selection: &Selection,
    mode: LabelMode,
) -> Result<Vec<CodedSpan>, IrrError> {
    let observation = project
        .observation(id)
        .ok_or_else(|| IrrError::UnknownObservation(id.clone()))?;
    coded_spans(&observation.timeline, &project.ethogram, selection, mode).map_err(|source| {
        IrrError::Segments {
            observation: id.clone(),
            source,
        }
    })
}

fn weighted_diagnostic(
    a: &ObservationId,
    b: &ObservationId,
    score: &KappaScore,
    event_weight: EventWeight,
) -> String {
    format!(
        "{a} vs {b}: Kappa={}, Po={}, Pe={}, Total weight={:.3}, Event weight={:.3}",
        format_ratio(score.kappa),
        format_ratio(score.observed),
        format_ratio(score.expected),
        score.total_weight,
        event_weight.value()
    )
}
