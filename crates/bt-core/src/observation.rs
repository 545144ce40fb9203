//! Observations: one coded session of media, live coding or images.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ethogram::Ethogram;
use crate::event::{DataError, Event};
use crate::time::Seconds;
use crate::timeline::Timeline;
use crate::types::ObservationId;
use crate::unpaired::{
    UnpairedError, UnpairedNotice, close_states, fix_unpaired_state_events, open_states,
};

/// What was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationType {
    /// One or more media files played back in sequence.
    #[default]
    #[serde(alias = "MEDIA")]
    Media,
    /// Coding in real time without media.
    #[serde(alias = "LIVE")]
    Live,
    /// A directory of still images.
    #[serde(alias = "IMAGES")]
    Images,
}

/// Bounded part of an observation to analyse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationInterval {
    pub start: Seconds,
    pub stop: Seconds,
}

/// Errors from closing unpaired states of an observation.
#[derive(Debug, Error)]
pub enum RepairError {
    #[error(transparent)]
    Unpaired(#[from] UnpairedError),

    #[error(transparent)]
    Data(#[from] DataError),

    /// Neither media durations, an interval nor events give a stop time.
    #[error("observation {0} has no boundary to close open states at")]
    NoBoundary(ObservationId),
}

/// One independently coded event timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub id: ObservationId,
    pub kind: ObservationType,
    pub date: Option<DateTime<Utc>>,
    pub description: String,
    /// Offset added to event times when displayed; may be negative.
    pub time_offset: Seconds,
    pub interval: Option<ObservationInterval>,
    /// Durations of the media files, in playlist order.
    pub media_durations: Vec<Seconds>,
    pub timeline: Timeline,
}

impl Observation {
    pub fn new(id: ObservationId, kind: ObservationType) -> Self {
        Self {
            id,
            kind,
            date: None,
            description: String::new(),
            time_offset: Seconds::ZERO,
            interval: None,
            media_durations: Vec::new(),
            timeline: Timeline::new(),
        }
    }

    /// Total playlist duration, if any media durations are known.
    ///
    /// `None` as well when the total does not fit in [`Seconds`].
    pub fn media_duration(&self) -> Option<Seconds> {
        if self.media_durations.is_empty() {
            return None;
        }
        self.media_durations
            .iter()
            .try_fold(Seconds::ZERO, |total, d| total.checked_add(*d))
    }

    /// `[start, end)` of each media file on the observation timeline.
    ///
    /// Stops at the first file whose end does not fit in [`Seconds`].
    pub fn media_boundaries(&self) -> Vec<(Seconds, Seconds)> {
        let mut start = Seconds::ZERO;
        self.media_durations
            .iter()
            .map_while(|duration| {
                let end = start.checked_add(*duration)?;
                let bounds = (start, end);
                start = end;
                Some(bounds)
            })
            .collect()
    }

    /// Time at which states still open at the end of the observation are closed.
    ///
    /// MEDIA: end of the playlist minus one millisecond. LIVE: the interval
    /// stop when set, else the last event. IMAGES: the last event.
    pub fn boundary_stop_time(&self) -> Option<Seconds> {
        match self.kind {
            ObservationType::Media => self
                .media_duration()
                .map(|total| total - Seconds::EPSILON)
                .or_else(|| self.timeline.last_time()),
            ObservationType::Live => self
                .interval
                .map(|i| i.stop)
                .or_else(|| self.timeline.last_time()),
            ObservationType::Images => self.timeline.last_time(),
        }
    }

    /// Part of the timeline used for time budgets.
    ///
    /// The observation interval when set, else the playlist for MEDIA, else
    /// the first to last event.
    pub fn analysis_span(&self) -> Option<ObservationInterval> {
        if let Some(interval) = self.interval {
            return Some(interval);
        }
        if self.kind == ObservationType::Media {
            if let Some(total) = self.media_duration() {
                return Some(ObservationInterval {
                    start: Seconds::ZERO,
                    stop: total,
                });
            }
        }
        Some(ObservationInterval {
            start: self.timeline.first_time()?,
            stop: self.timeline.last_time()?,
        })
    }

    /// Closes every state left open at the end of the observation.
    pub fn close_unpaired(&mut self, ethogram: &Ethogram) -> Result<Vec<UnpairedNotice>, RepairError> {
        if open_states(ethogram, self.timeline.events()).is_empty() {
            return Ok(Vec::new());
        }
        let stop = self
            .boundary_stop_time()
            .ok_or_else(|| RepairError::NoBoundary(self.id.clone()))?;
        let (stops, notices) = close_range(ethogram, self.timeline.events(), stop)?;
        self.timeline.extend_sorted(stops)?;
        Ok(notices)
    }

    /// Closes states left open at the end of the media file they started in.
    ///
    /// Parity runs over the whole timeline, so a state started in one file
    /// and stopped in a later one stays as coded. A state still open at the
    /// end is closed one millisecond before its file ends. States started
    /// past the last file are left for [`Self::close_unpaired`].
    pub fn close_unpaired_per_media(
        &mut self,
        ethogram: &Ethogram,
    ) -> Result<Vec<UnpairedNotice>, RepairError> {
        let files = self.media_boundaries();
        let events = self.timeline.events();
        let open: Vec<_> = open_states(ethogram, events)
            .into_iter()
            .filter_map(|(key, start)| {
                files
                    .iter()
                    .find(|(file_start, file_end)| *file_start <= start && start < *file_end)
                    .map(|(_, file_end)| (key, start, *file_end - Seconds::EPSILON))
            })
            .collect();
        let starts: Vec<Seconds> = open.iter().map(|(_, start, _)| *start).collect();
        let stops = close_states(events, open)?;
        let notices = notices(starts, &stops);
        self.timeline.extend_sorted(stops)?;
        Ok(notices)
    }
}

/// Synthetic stops for `events` plus one notice per stop.
fn close_range(
    ethogram: &Ethogram,
    events: &[Event],
    stop: Seconds,
) -> Result<(Vec<Event>, Vec<UnpairedNotice>), UnpairedError> {
    // Both lists are sorted by state key, so they line up.
    let starts: Vec<Seconds> = open_states(ethogram, events)
        .into_iter()
        .map(|(_, start)| start)
        .collect();
    let stops = fix_unpaired_state_events(ethogram, events, stop)?;
    let notices = notices(starts, &stops);
    Ok((stops, notices))
}

fn notices(starts: Vec<Seconds>, stops: &[Event]) -> Vec<UnpairedNotice> {
    starts
        .into_iter()
        .zip(stops)
        .map(|(start, event)| UnpairedNotice::from_event(start, event))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ethogram::fixtures::{point, state};
    use crate::timeline::fixtures::{ev, timeline};

    fn secs(s: &str) -> Seconds {
        s.parse().unwrap()
    }

    fn observation(kind: ObservationType, events: Vec<Event>) -> Observation {
        let mut obs = Observation::new(ObservationId::new("obs").unwrap(), kind);
        obs.timeline = timeline(events);
        obs
    }

    fn ethogram() -> Ethogram {
        Ethogram::new([state("walk"), point("bark")])
    }

    #[test]
    fn media_boundaries_accumulate() {
        let mut obs = observation(ObservationType::Media, vec![]);
        obs.media_durations = vec![secs("10"), secs("5.5")];
        assert_eq!(obs.media_duration(), Some(secs("15.5")));
        assert_eq!(
            obs.media_boundaries(),
            vec![(secs("0"), secs("10")), (secs("10"), secs("15.5"))]
        );
    }

    #[test]
    fn media_duration_out_of_range() {
        let mut obs = observation(ObservationType::Media, vec![]);
        obs.media_durations = vec![
            Seconds::from_millis(i64::MAX),
            Seconds::EPSILON,
            secs("5"),
        ];
        assert_eq!(obs.media_duration(), None);
        assert_eq!(
            obs.media_boundaries(),
            vec![(Seconds::ZERO, Seconds::from_millis(i64::MAX))]
        );
    }

    #[test]
    fn boundary_stop_time_by_type() {
        let events = vec![ev("1", "s", "walk", ""), ev("4", "s", "bark", "")];

        let mut media = observation(ObservationType::Media, events.clone());
        assert_eq!(media.boundary_stop_time(), Some(secs("4")));
        media.media_durations = vec![secs("60")];
        assert_eq!(media.boundary_stop_time(), Some(secs("59.999")));

        let mut live = observation(ObservationType::Live, events.clone());
        assert_eq!(live.boundary_stop_time(), Some(secs("4")));
        live.interval = Some(ObservationInterval {
            start: secs("0"),
            stop: secs("30"),
        });
        assert_eq!(live.boundary_stop_time(), Some(secs("30")));

        let images = observation(ObservationType::Images, events);
        assert_eq!(images.boundary_stop_time(), Some(secs("4")));

        let empty = observation(ObservationType::Images, vec![]);
        assert_eq!(empty.boundary_stop_time(), None);
    }

    #[test]
    fn close_unpaired_appends_stop_at_media_end() {
        let mut obs = observation(ObservationType::Media, vec![ev("5", "s", "walk", "")]);
        obs.media_durations = vec![secs("20")];

        let notices = obs.close_unpaired(&ethogram()).unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].opened_at, secs("5"));
        assert_eq!(notices[0].closed_at, secs("19.999"));
        assert_eq!(obs.timeline.len(), 2);
        assert!(obs.timeline.unpaired_keys(&ethogram()).is_empty());
    }

    #[test]
    fn close_unpaired_noop_when_paired() {
        let mut obs = observation(
            ObservationType::Live,
            vec![ev("1", "s", "walk", ""), ev("2", "s", "walk", "")],
        );
        assert!(obs.close_unpaired(&ethogram()).unwrap().is_empty());
        assert_eq!(obs.timeline.len(), 2);
    }

    #[test]
    fn close_unpaired_rejects_stop_before_start() {
        // Live interval ends before the open state started.
        let mut obs = observation(ObservationType::Live, vec![ev("40", "s", "walk", "")]);
        obs.interval = Some(ObservationInterval {
            start: secs("0"),
            stop: secs("30"),
        });
        let err = obs.close_unpaired(&ethogram()).unwrap_err();
        assert!(matches!(err, RepairError::Unpaired(_)));
        assert_eq!(obs.timeline.len(), 1);
    }

    #[test]
    fn per_media_closes_each_file() {
        let mut obs = observation(
            ObservationType::Media,
            vec![ev("2", "s", "walk", ""), ev("12", "t", "walk", "")],
        );
        obs.media_durations = vec![secs("10"), secs("10")];

        let notices = obs.close_unpaired_per_media(&ethogram()).unwrap();
        let closed: Vec<_> = notices.iter().map(|n| (n.subject.as_str(), n.closed_at)).collect();
        assert_eq!(closed, [("s", secs("9.999")), ("t", secs("19.999"))]);
        assert_eq!(notices[1].opened_at, secs("12"));
        assert_eq!(obs.timeline.len(), 4);
    }

    #[test]
    fn per_media_keeps_state_stopped_in_later_file() {
        let mut obs = observation(
            ObservationType::Media,
            vec![ev("2", "s", "walk", ""), ev("12", "s", "walk", "")],
        );
        obs.media_durations = vec![secs("10"), secs("10")];
        let before = obs.timeline.clone();

        assert!(obs.close_unpaired_per_media(&ethogram()).unwrap().is_empty());
        assert_eq!(obs.timeline, before);
    }

    #[test]
    fn per_media_leaves_states_past_last_file() {
        let mut obs = observation(
            ObservationType::Media,
            vec![ev("4", "s", "walk", ""), ev("25", "t", "walk", "")],
        );
        obs.media_durations = vec![secs("20")];

        let notices = obs.close_unpaired_per_media(&ethogram()).unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].closed_at, secs("19.999"));

        let err = obs.close_unpaired(&ethogram()).unwrap_err();
        assert!(matches!(err, RepairError::Unpaired(_)));
    }

    #[test]
    fn close_unpaired_avoids_event_of_other_modifier() {
        let mut obs = observation(
            ObservationType::Live,
            vec![
                ev("1", "s", "walk", "a"),
                ev("5", "s", "walk", "b"),
                ev("8", "s", "walk", "b"),
            ],
        );

        let notices = obs.close_unpaired(&ethogram()).unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].opened_at, secs("1"));
        assert_eq!(notices[0].closed_at, secs("7.999"));
        assert!(obs.timeline.unpaired_keys(&ethogram()).is_empty());
    }

    #[test]
    fn analysis_span_prefers_interval_then_media() {
        let mut obs = observation(
            ObservationType::Media,
            vec![ev("2", "s", "bark", ""), ev("8", "s", "bark", "")],
        );
        assert_eq!(
            obs.analysis_span(),
            Some(ObservationInterval {
                start: secs("2"),
                stop: secs("8")
            })
        );
        obs.media_durations = vec![secs("30")];
        assert_eq!(obs.analysis_span().map(|s| s.stop), Some(secs("30")));
        obs.interval = Some(ObservationInterval {
            start: secs("5"),
            stop: secs("25"),
        });
        assert_eq!(obs.analysis_span().map(|s| s.start), Some(secs("5")));
    }
}
