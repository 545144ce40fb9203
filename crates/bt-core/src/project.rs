//! Project aggregate and its JSON persistence format.
//!
//! A project bundles the ethogram, the subject list and the observations.
//! Analyses take a `&Project` (or parts of it) instead of reading shared
//! application state.
//!
//! # File Format
//!
//! ```json
//! {
//!   "ethogram": [{"code": "walk", "type": "state"}],
//!   "subjects": ["mouse"],
//!   "observations": {
//!     "obs1": {
//!       "type": "media",
//!       "media_durations": ["120.000"],
//!       "events": [["1.500", "mouse", "walk", "", "", 45]]
//!     }
//!   }
//! }
//! ```
//!
//! Times are decimal strings. Events are positional records parsed by
//! [`Event::from_record`]; a malformed record fails the whole load.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::ethogram::Ethogram;
use crate::event::{DataError, Event};
use crate::observation::{Observation, ObservationInterval, ObservationType};
use crate::time::Seconds;
use crate::timeline::Timeline;
use crate::types::ObservationId;

/// Errors from loading a project.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("invalid project JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("observation {observation}, event {index}: {source}")]
    Event {
        observation: ObservationId,
        index: usize,
        #[source]
        source: DataError,
    },

    #[error("observation {observation}: interval start {start} is after stop {stop}")]
    InvalidInterval {
        observation: ObservationId,
        start: Seconds,
        stop: Seconds,
    },

    #[error("observation {observation}: media duration cannot be negative")]
    NegativeMediaDuration { observation: ObservationId },

    #[error("observation {observation}: total media duration is out of range")]
    MediaDurationOverflow { observation: ObservationId },
}

/// Ethogram, subjects and observations of one coding project.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Project {
    pub name: Option<String>,
    pub ethogram: Ethogram,
    /// Subject names; the empty name stands for "no focal subject".
    pub subjects: Vec<String>,
    pub observations: BTreeMap<ObservationId, Observation>,
}

impl Project {
    pub fn from_json(json: &str) -> Result<Self, ProjectError> {
        let file: ProjectFile = serde_json::from_str(json)?;
        file.try_into()
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&ProjectFile::from(self))
    }

    pub fn observation(&self, id: &ObservationId) -> Option<&Observation> {
        self.observations.get(id)
    }

    pub fn observation_mut(&mut self, id: &ObservationId) -> Option<&mut Observation> {
        self.observations.get_mut(id)
    }

    pub fn observation_ids(&self) -> impl Iterator<Item = &ObservationId> {
        self.observations.keys()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ProjectFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default)]
    ethogram: Ethogram,
    #[serde(default)]
    subjects: Vec<String>,
    #[serde(default)]
    observations: BTreeMap<ObservationId, ObservationFile>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ObservationFile {
    #[serde(rename = "type", default)]
    kind: ObservationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    description: String,
    #[serde(default)]
    time_offset: Seconds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    interval: Option<ObservationInterval>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    media_durations: Vec<Seconds>,
    #[serde(default)]
    events: Vec<Vec<Value>>,
}

impl TryFrom<ProjectFile> for Project {
    type Error = ProjectError;

    fn try_from(file: ProjectFile) -> Result<Self, Self::Error> {
        let observations = file
            .observations
            .into_iter()
            .map(|(id, obs)| {
                let observation = obs.into_observation(id.clone())?;
                Ok((id, observation))
            })
            .collect::<Result<BTreeMap<_, _>, ProjectError>>()?;

        Ok(Self {
            name: file.name,
            ethogram: file.ethogram,
            subjects: file.subjects,
            observations,
        })
    }
}

impl ObservationFile {
    fn into_observation(self, id: ObservationId) -> Result<Observation, ProjectError> {
        if let Some(interval) = self.interval {
            if interval.start > interval.stop {
                return Err(ProjectError::InvalidInterval {
                    observation: id,
                    start: interval.start,
                    stop: interval.stop,
                });
            }
        }
        if self.media_durations.iter().any(|d| d.is_negative()) {
            return Err(ProjectError::NegativeMediaDuration { observation: id });
        }
        if self
            .media_durations
            .iter()
            .try_fold(Seconds::ZERO, |total, d| total.checked_add(*d))
            .is_none()
        {
            return Err(ProjectError::MediaDurationOverflow { observation: id });
        }

        let mut timeline = Timeline::new();
        for (index, record) in self.events.iter().enumerate() {
            let result = Event::from_record(record, self.kind)
                .and_then(|event| timeline.add_event(event));
            if let Err(source) = result {
                return Err(ProjectError::Event {
                    observation: id,
                    index,
                    source,
                });
            }
        }

        Ok(Observation {
            id,
            kind: self.kind,
            date: self.date,
            description: self.description,
            time_offset: self.time_offset,
            interval: self.interval,
            media_durations: self.media_durations,
            timeline,
        })
    }
}

impl From<&Project> for ProjectFile {
    fn from(project: &Project) -> Self {
        Self {
            name: project.name.clone(),
            ethogram: project.ethogram.clone(),
            subjects: project.subjects.clone(),
            observations: project
                .observations
                .iter()
                .map(|(id, obs)| {
                    let file = ObservationFile {
                        kind: obs.kind,
                        date: obs.date,
                        description: obs.description.clone(),
                        time_offset: obs.time_offset,
                        interval: obs.interval,
                        media_durations: obs.media_durations.clone(),
                        events: obs.timeline.iter().map(Event::to_record).collect(),
                    };
                    (id.clone(), file)
                })
                .collect(),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Two raters coding the same clip, plus a live observation.
    pub const SAMPLE: &str = r#"{
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
                "type": "LIVE",
                "date": "2025-03-01T10:00:00Z",
                "interval": {"start": "0", "stop": "60"},
                "events": [["12.5", "", "groom", "head,tail", "note"]]
            }
        }
    }"#;
}
