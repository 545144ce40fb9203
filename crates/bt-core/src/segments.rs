//! Aggregation of an event timeline into coded segments.
//!
//! STATE events are paired START/STOP per state key into segments; POINT
//! events become zero-length segments. Segments carry the label used for
//! agreement analysis.

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

use crate::ethogram::{BehaviorType, Ethogram};
use crate::event::StateKey;
use crate::intervals::CodedSpan;
use crate::time::Seconds;
use crate::timeline::Timeline;
use crate::types::BehaviorCode;

/// Errors from aggregating a timeline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SegmentError {
    /// A state was started and never stopped.
    #[error("unpaired state {subject}|{behavior} started at {start}")]
    Unpaired {
        subject: String,
        behavior: BehaviorCode,
        start: Seconds,
    },
}

/// Which part of a coded occurrence enters its comparison label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelMode {
    /// `subject|behavior`
    #[default]
    Basic,
    /// `subject|behavior|modifiers`, modifiers sorted and comma joined.
    WithModifiers,
}

/// Restricts aggregation to some subjects and behaviors.
///
/// An empty set means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub subjects: BTreeSet<String>,
    pub behaviors: BTreeSet<BehaviorCode>,
}

impl Selection {
    pub fn all() -> Self {
        Self::default()
    }

    fn includes(&self, subject: &str, behavior: &BehaviorCode) -> bool {
        (self.subjects.is_empty() || self.subjects.contains(subject))
            && (self.behaviors.is_empty() || self.behaviors.contains(behavior))
    }
}

/// One coded occurrence: a state from START to STOP, or a point (`start == stop`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub subject: String,
    pub behavior: BehaviorCode,
    pub modifier: String,
    pub kind: BehaviorType,
    pub start: Seconds,
    pub stop: Seconds,
}

impl Segment {
    pub fn duration(&self) -> Seconds {
        self.stop - self.start
    }

    pub fn is_point(&self) -> bool {
        self.kind == BehaviorType::Point
    }

    pub fn label(&self, ethogram: &Ethogram, mode: LabelMode) -> String {
        match mode {
            LabelMode::Basic => format!("{}|{}", self.subject, self.behavior),
            LabelMode::WithModifiers => format!(
                "{}|{}|{}",
                self.subject,
                self.behavior,
                ethogram.modifier_values(&self.behavior, &self.modifier).join(",")
            ),
        }
    }

    pub fn to_span(&self, ethogram: &Ethogram, mode: LabelMode) -> CodedSpan {
        CodedSpan {
            start: self.start,
            stop: self.stop,
            label: self.label(ethogram, mode),
        }
    }
}

/// Builds the segments of a timeline, ordered by start time then label.
///
/// Behaviors missing from the ethogram are skipped. A state left open
/// fails the aggregation; close it first with the unpaired-state repair.
pub fn aggregate(
    timeline: &Timeline,
    ethogram: &Ethogram,
    selection: &Selection,
) -> Result<Vec<Segment>, SegmentError> {
    let mut open: HashMap<StateKey<'_>, Seconds> = HashMap::new();
    let mut segments = Vec::new();
    let mut skipped: BTreeSet<&BehaviorCode> = BTreeSet::new();

    for event in timeline {
        let Some(kind) = ethogram.kind_of(&event.behavior) else {
            skipped.insert(&event.behavior);
            continue;
        };
        if !selection.includes(&event.subject, &event.behavior) {
            continue;
        }

        let segment = |start| Segment {
            subject: event.subject.clone(),
            behavior: event.behavior.clone(),
            modifier: event.modifier.clone(),
            kind,
            start,
            stop: event.time,
        };

        match kind {
            BehaviorType::Point => segments.push(segment(event.time)),
            BehaviorType::State => {
                let key = event.state_key();
                if let Some(start) = open.remove(&key) {
                    segments.push(segment(start));
                } else {
                    open.insert(key, event.time);
                }
            }
        }
    }

    for behavior in skipped {
        tracing::warn!(%behavior, "skipping events of behavior missing from the ethogram");
    }

    if let Some((key, start)) = open.into_iter().min_by_key(|(key, start)| (*start, *key)) {
        return Err(SegmentError::Unpaired {
            subject: key.subject.to_string(),
            behavior: key.behavior.clone(),
            start,
        });
    }

    segments.sort_by(|a, b| {
        (a.start, a.stop, &a.subject, &a.behavior, &a.modifier)
            .cmp(&(b.start, b.stop, &b.subject, &b.behavior, &b.modifier))
    });
    Ok(segments)
}

/// Aggregates a timeline straight into labelled spans.
pub fn coded_spans(
    timeline: &Timeline,
    ethogram: &Ethogram,
    selection: &Selection,
    mode: LabelMode,
) -> Result<Vec<CodedSpan>, SegmentError> {
    Ok(aggregate(timeline, ethogram, selection)?
        .iter()
        .map(|segment| segment.to_span(ethogram, mode))
        .collect())
}
