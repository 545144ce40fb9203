//! Time budget: how often and for how long each behavior occurs.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::ethogram::{BehaviorType, Ethogram};
use crate::observation::{Observation, ObservationInterval};
use crate::segments::{Segment, SegmentError, Selection, aggregate};
use crate::time::Seconds;
use crate::types::{BehaviorCode, ObservationId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BudgetError {
    #[error(transparent)]
    Segments(#[from] SegmentError),

    #[error("observation {0} has no events, interval or media to span")]
    NoSpan(ObservationId),
}

/// Statistics of one `(subject, behavior)` pair.
///
/// Duration fields are `None` for point behaviors. Ratios are `None` when
/// the span has zero length; the standard deviation needs two occurrences.
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorBudget {
    pub subject: String,
    pub behavior: BehaviorCode,
    pub kind: BehaviorType,
    pub occurrences: usize,
    pub total_duration: Option<Seconds>,
    pub mean_duration: Option<f64>,
    pub std_dev: Option<f64>,
    /// Share of the span covered by the state, in `[0, 1]`.
    pub proportion: Option<f64>,
    pub rate_per_minute: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeBudget {
    pub span: ObservationInterval,
    /// Ordered by subject, then behavior.
    pub rows: Vec<BehaviorBudget>,
}

/// Computes the time budget of an observation over its analysis span.
///
/// Segments are clipped to the span; states entirely outside it and points
/// outside `[start, stop]` are ignored.
pub fn time_budget(
    observation: &Observation,
    ethogram: &Ethogram,
    selection: &Selection,
) -> Result<TimeBudget, BudgetError> {
    let span = observation
        .analysis_span()
        .ok_or_else(|| BudgetError::NoSpan(observation.id.clone()))?;
    let segments = aggregate(&observation.timeline, ethogram, selection)?;

    let mut groups: BTreeMap<(&str, &BehaviorCode), (BehaviorType, Vec<Seconds>)> =
        BTreeMap::new();
    for segment in &segments {
        let Some(duration) = clipped_duration(segment, span) else {
            continue;
        };
        groups
            .entry((segment.subject.as_str(), &segment.behavior))
            .or_insert_with(|| (segment.kind, Vec::new()))
            .1
            .push(duration);
    }

    let span_secs = (span.stop - span.start).as_secs_f64();
    let rows = groups
        .into_iter()
        .map(|((subject, behavior), (kind, durations))| {
            budget_row(subject, behavior, kind, &durations, span_secs)
        })
        .collect::<Vec<_>>();

    tracing::debug!(observation = %observation.id, rows = rows.len(), "computed time budget");
    Ok(TimeBudget { span, rows })
}

fn clipped_duration(segment: &Segment, span: ObservationInterval) -> Option<Seconds> {
    if segment.is_point() {
        return (span.start <= segment.start && segment.start <= span.stop)
            .then_some(Seconds::ZERO);
    }
    let start = segment.start.max(span.start);
    let stop = segment.stop.min(span.stop);
    (start < stop).then(|| stop - start)
}

#[allow(clippy::cast_precision_loss)]
fn budget_row(
    subject: &str,
    behavior: &BehaviorCode,
    kind: BehaviorType,
    durations: &[Seconds],
    span_secs: f64,
) -> BehaviorBudget {
    let occurrences = durations.len();
    let per_span = |value: f64| (span_secs > 0.0).then(|| value / span_secs);

    let (total_duration, mean_duration, std_dev, proportion) = match kind {
        BehaviorType::Point => (None, None, None, None),
        BehaviorType::State => {
            let total: Seconds = durations.iter().copied().sum();
            let secs: Vec<f64> = durations.iter().map(|d| d.as_secs_f64()).collect();
            (
                Some(total),
                Some(total.as_secs_f64() / occurrences as f64),
                sample_std_dev(&secs),
                per_span(total.as_secs_f64()),
            )
        }
    };

    BehaviorBudget {
        subject: subject.to_string(),
        behavior: behavior.clone(),
        kind,
        occurrences,
        total_duration,
        mean_duration,
        std_dev,
        proportion,
        rate_per_minute: per_span(occurrences as f64 * 60.0),
    }
}

/// Sample standard deviation (`n - 1` denominator).
#[allow(clippy::cast_precision_loss)]
fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}
