//! Elementary-interval decomposition of several raters' codings.
//!
//! # Algorithm Summary
//!
//! 1. Split each rater's spans into segments (`start < stop`) and point
//!    events (`start == stop`).
//! 2. Elementary intervals: consecutive pairs of the sorted union of all
//!    segment boundaries. Point times never split an interval.
//! 3. Instants: the sorted union of all point-event times.
//! 4. For each interval, each rater's label is the set of segment labels
//!    covering it; for each instant, segment labels covering it plus point
//!    labels at exactly that time. Labels are joined with `+` in sorted order.
//!
//! Labels are resolved with one forward sweep per rater over pre-sorted
//! boundaries instead of re-scanning all segments per interval.

use std::collections::BTreeMap;

use crate::time::Seconds;

/// Separator between simultaneously active labels.
pub const LABEL_JOIN: &str = "+";

/// A labelled span of one rater. `start == stop` marks a point event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodedSpan {
    pub start: Seconds,
    pub stop: Seconds,
    pub label: String,
}

impl CodedSpan {
    pub fn new(start: Seconds, stop: Seconds, label: impl Into<String>) -> Self {
        Self {
            start,
            stop,
            label: label.into(),
        }
    }

    pub fn is_point(&self) -> bool {
        self.start == self.stop
    }
}

/// One comparison unit of an aligned pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// Half-open elementary interval `[start, stop)`.
    Interval { start: Seconds, stop: Seconds },
    /// A point-event time.
    Instant { at: Seconds },
}

impl Unit {
    pub fn duration(&self) -> Seconds {
        match self {
            Self::Interval { start, stop } => *stop - *start,
            Self::Instant { .. } => Seconds::ZERO,
        }
    }
}

/// Two raters' labels, position by position.
///
/// Intervals come first in time order, followed by instants in time order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignedLabels {
    pub units: Vec<Unit>,
    pub first: Vec<String>,
    pub second: Vec<String>,
}

impl AlignedLabels {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Iterates `(unit, first label, second label)`.
    pub fn iter(&self) -> impl Iterator<Item = (&Unit, &str, &str)> {
        self.units
            .iter()
            .zip(&self.first)
            .zip(&self.second)
            .map(|((unit, a), b)| (unit, a.as_str(), b.as_str()))
    }
}

/// Joins labels in sorted order, without duplicates. Empty input gives `""`.
pub fn join_labels<'a>(labels: impl IntoIterator<Item = &'a str>) -> String {
    let mut labels: Vec<&str> = labels.into_iter().collect();
    labels.sort_unstable();
    labels.dedup();
    labels.join(LABEL_JOIN)
}

/// Splits spans into `(segments, points)`. Inverted spans are dropped.
pub fn split_spans(spans: &[CodedSpan]) -> (Vec<&CodedSpan>, Vec<&CodedSpan>) {
    let mut segments = Vec::new();
    let mut points = Vec::new();
    for span in spans {
        match span.start.cmp(&span.stop) {
            std::cmp::Ordering::Less => segments.push(span),
            std::cmp::Ordering::Equal => points.push(span),
            std::cmp::Ordering::Greater => {
                tracing::warn!(label = %span.label, start = %span.start, stop = %span.stop, "dropping inverted span");
            }
        }
    }
    (segments, points)
}

/// Elementary intervals over the segment boundaries of all raters.
pub fn elementary_intervals(raters: &[&[CodedSpan]]) -> Vec<(Seconds, Seconds)> {
    let mut boundaries: Vec<Seconds> = raters
        .iter()
        .flat_map(|spans| spans.iter())
        .filter(|span| span.start < span.stop)
        .flat_map(|span| [span.start, span.stop])
        .collect();
    boundaries.sort_unstable();
    boundaries.dedup();
    boundaries.windows(2).map(|w| (w[0], w[1])).collect()
}

/// Sorted, distinct point-event times of all raters.
pub fn instant_times(raters: &[&[CodedSpan]]) -> Vec<Seconds> {
    let mut times: Vec<Seconds> = raters
        .iter()
        .flat_map(|spans| spans.iter())
        .filter(|span| span.is_point())
        .map(|span| span.start)
        .collect();
    times.sort_unstable();
    times.dedup();
    times
}

/// Forward-only cursor over one rater's segments and points.
struct Sweep<'a> {
    by_start: Vec<&'a CodedSpan>,
    by_stop: Vec<&'a CodedSpan>,
    points: Vec<&'a CodedSpan>,
    next_start: usize,
    next_stop: usize,
    next_point: usize,
    active: BTreeMap<&'a str, usize>,
}

impl<'a> Sweep<'a> {
    fn new(spans: &'a [CodedSpan]) -> Self {
        let (segments, mut points) = split_spans(spans);
        let mut by_start = segments.clone();
        by_start.sort_by_key(|s| s.start);
        let mut by_stop = segments;
        by_stop.sort_by_key(|s| s.stop);
        points.sort_by_key(|s| s.start);
        Self {
            by_start,
            by_stop,
            points,
            next_start: 0,
            next_stop: 0,
            next_point: 0,
            active: BTreeMap::new(),
        }
    }

    /// Moves to `t`; afterwards `active` holds the segments with `start <= t < stop`.
    fn advance_to(&mut self, t: Seconds) {
        while let Some(&span) = self.by_start.get(self.next_start) {
            if span.start > t {
                break;
            }
            *self.active.entry(span.label.as_str()).or_default() += 1;
            self.next_start += 1;
        }
        while let Some(&span) = self.by_stop.get(self.next_stop) {
            if span.stop > t {
                break;
            }
            if let Some(count) = self.active.get_mut(span.label.as_str()) {
                *count -= 1;
                if *count == 0 {
                    self.active.remove(span.label.as_str());
                }
            }
            self.next_stop += 1;
        }
    }

    /// Label of the segments covering `t`.
    fn segment_label(&mut self, t: Seconds) -> String {
        self.advance_to(t);
        join_labels(self.active.keys().copied())
    }

    /// Label of the segments covering `t` plus the points at exactly `t`.
    fn instant_label(&mut self, t: Seconds) -> String {
        self.advance_to(t);
        while self.points.get(self.next_point).is_some_and(|p| p.start < t) {
            self.next_point += 1;
        }
        let mut at_t = Vec::new();
        while let Some(&point) = self.points.get(self.next_point) {
            if point.start != t {
                break;
            }
            at_t.push(point.label.as_str());
            self.next_point += 1;
        }
        join_labels(self.active.keys().copied().chain(at_t))
    }
}

/// Decomposes two raters' spans into aligned label sequences.
pub fn align(first: &[CodedSpan], second: &[CodedSpan]) -> AlignedLabels {
    let raters = [first, second];
    let intervals = elementary_intervals(&raters);
    let instants = instant_times(&raters);

    let mut aligned = AlignedLabels {
        units: Vec::with_capacity(intervals.len() + instants.len()),
        first: Vec::with_capacity(intervals.len() + instants.len()),
        second: Vec::with_capacity(intervals.len() + instants.len()),
    };

    let mut sweeps = [Sweep::new(first), Sweep::new(second)];
    for &(start, stop) in &intervals {
        aligned.units.push(Unit::Interval { start, stop });
        aligned.first.push(sweeps[0].segment_label(start));
        aligned.second.push(sweeps[1].segment_label(start));
    }

    let mut sweeps = [Sweep::new(first), Sweep::new(second)];
    for &at in &instants {
        aligned.units.push(Unit::Instant { at });
        aligned.first.push(sweeps[0].instant_label(at));
        aligned.second.push(sweeps[1].instant_label(at));
    }

    tracing::debug!(
        intervals = intervals.len(),
        instants = instants.len(),
        "decomposed rater pair"
    );
    aligned
}
