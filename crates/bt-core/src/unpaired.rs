//! Detection and repair of state events left open at a boundary.
//!
//! Each state key runs a two-state machine over the time-ordered events:
//! CLOSED on start, OPEN after a START, CLOSED again after the STOP. A key
//! still OPEN when the sequence ends gets a synthetic STOP event.

use std::collections::{HashMap, HashSet};
use std::fmt;

use thiserror::Error;

use crate::ethogram::Ethogram;
use crate::event::{Event, EventExtra, StateKey};
use crate::time::Seconds;
use crate::types::BehaviorCode;

/// Errors from repairing unpaired states.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnpairedError {
    /// The requested stop time would produce an empty or negative state.
    #[error(
        "cannot close {subject}|{behavior} started at {start} with a stop at {stop}: stop must be later than start"
    )]
    StopNotAfterStart {
        subject: String,
        behavior: BehaviorCode,
        start: Seconds,
        stop: Seconds,
    },

    /// Every millisecond between the start and the stop is taken by another
    /// event of the same subject and behavior.
    #[error(
        "cannot close {subject}|{behavior} started at {start}: no free time before {stop} for a stop event"
    )]
    NoFreeStopTime {
        subject: String,
        behavior: BehaviorCode,
        start: Seconds,
        stop: Seconds,
    },
}

/// Informational notice for a state that was left open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpairedNotice {
    pub subject: String,
    pub behavior: BehaviorCode,
    pub modifier: String,
    pub opened_at: Seconds,
    pub closed_at: Seconds,
}

impl fmt::Display for UnpairedNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "state {}|{}", self.subject, self.behavior)?;
        if !self.modifier.is_empty() {
            write!(f, " ({})", self.modifier)?;
        }
        write!(
            f,
            " opened at {} was closed at {}",
            self.opened_at, self.closed_at
        )
    }
}

impl UnpairedNotice {
    pub fn from_event(opened_at: Seconds, stop: &Event) -> Self {
        Self {
            subject: stop.subject.clone(),
            behavior: stop.behavior.clone(),
            modifier: stop.modifier.clone(),
            opened_at,
            closed_at: stop.time,
        }
    }
}

/// Returns the START time of every state key left open by `events`.
///
/// `events` must be in time order. Results are sorted by key.
pub fn open_states<'a>(ethogram: &Ethogram, events: &'a [Event]) -> Vec<(StateKey<'a>, Seconds)> {
    let mut open: HashMap<StateKey<'a>, Seconds> = HashMap::new();
    for event in events.iter().filter(|e| ethogram.is_state(&e.behavior)) {
        let key = event.state_key();
        if open.remove(&key).is_none() {
            open.insert(key, event.time);
        }
    }
    let mut open: Vec<_> = open.into_iter().collect();
    open.sort();
    open
}

/// Builds the STOP events closing every state left open by `events`.
///
/// The events are returned for the caller to add to its timeline. Fails
/// without producing anything if `time_to_stop` is not strictly later than
/// the START of some open state.
pub fn fix_unpaired_state_events(
    ethogram: &Ethogram,
    events: &[Event],
    time_to_stop: Seconds,
) -> Result<Vec<Event>, UnpairedError> {
    let open = open_states(ethogram, events)
        .into_iter()
        .map(|(key, start)| (key, start, time_to_stop));
    close_states(events, open)
}

/// Builds one STOP event per `(key, start, stop)`, in the given order.
///
/// A stop that would share its time, subject and behavior with an event in
/// `events` (or with another generated stop) moves back one millisecond at a
/// time, as long as it stays after the START.
pub fn close_states<'a>(
    events: &[Event],
    open: impl IntoIterator<Item = (StateKey<'a>, Seconds, Seconds)>,
) -> Result<Vec<Event>, UnpairedError> {
    let mut taken: HashSet<(Seconds, &str, &BehaviorCode)> = events
        .iter()
        .map(|e| (e.time, e.subject.as_str(), &e.behavior))
        .collect();

    let mut stops = Vec::new();
    for (key, start, time_to_stop) in open {
        if time_to_stop <= start {
            return Err(UnpairedError::StopNotAfterStart {
                subject: key.subject.to_string(),
                behavior: key.behavior.clone(),
                start,
                stop: time_to_stop,
            });
        }

        let mut time = time_to_stop;
        while taken.contains(&(time, key.subject, key.behavior)) {
            time = time - Seconds::EPSILON;
            if time <= start {
                return Err(UnpairedError::NoFreeStopTime {
                    subject: key.subject.to_string(),
                    behavior: key.behavior.clone(),
                    start,
                    stop: time_to_stop,
                });
            }
        }
        taken.insert((time, key.subject, key.behavior));

        let stop = Event {
            time,
            subject: key.subject.to_string(),
            behavior: key.behavior.clone(),
            modifier: key.modifier.to_string(),
            comment: String::new(),
            extra: EventExtra::None,
        };
        tracing::info!(notice = %UnpairedNotice::from_event(start, &stop), "closing unpaired state");
        stops.push(stop);
    }
    Ok(stops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ethogram::fixtures::{point, state};
    use crate::timeline::fixtures::{ev, timeline};

    fn secs(s: &str) -> Seconds {
        s.parse().unwrap()
    }

    fn ethogram() -> Ethogram {
        Ethogram::new([state("walk"), state("sniff"), point("bark")])
    }

    #[test]
    fn one_open_key_gets_one_stop() {
        let ethogram = ethogram();
        let mut tl = timeline(vec![
            ev("1", "s", "walk", ""),
            ev("2", "s", "walk", ""),
            ev("3", "s", "sniff", "left"),
            ev("4", "s", "bark", ""),
        ]);

        let stops = fix_unpaired_state_events(&ethogram, tl.events(), secs("10")).unwrap();
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].time, secs("10"));
        assert_eq!(stops[0].behavior.as_str(), "sniff");
        assert_eq!(stops[0].modifier, "left");

        tl.extend_sorted(stops).unwrap();
        assert!(tl.unpaired_keys(&ethogram).is_empty());
    }

    #[test]
    fn paired_sequence_needs_nothing() {
        let tl = timeline(vec![ev("1", "s", "walk", ""), ev("2", "s", "walk", "")]);
        let stops = fix_unpaired_state_events(&ethogram(), tl.events(), secs("5")).unwrap();
        assert!(stops.is_empty());
    }

    #[test]
    fn point_events_never_need_closing() {
        let tl = timeline(vec![ev("1", "s", "bark", "")]);
        let stops = fix_unpaired_state_events(&ethogram(), tl.events(), secs("5")).unwrap();
        assert!(stops.is_empty());
    }

    #[test]
    fn several_open_keys_sorted_by_key() {
        let tl = timeline(vec![
            ev("1", "t", "walk", ""),
            ev("2", "s", "walk", ""),
            ev("3", "s", "sniff", ""),
        ]);
        let stops = fix_unpaired_state_events(&ethogram(), tl.events(), secs("9")).unwrap();
        let keys: Vec<_> = stops.iter().map(|e| e.state_key().to_string()).collect();
        assert_eq!(keys, ["s|sniff", "s|walk", "t|walk"]);
    }

    #[test]
    fn rejects_stop_not_after_start() {
        let tl = timeline(vec![ev("1", "s", "walk", ""), ev("5", "s", "sniff", "")]);
        let err = fix_unpaired_state_events(&ethogram(), tl.events(), secs("5")).unwrap_err();
        assert_eq!(
            err,
            UnpairedError::StopNotAfterStart {
                subject: "s".to_string(),
                behavior: BehaviorCode::new("sniff").unwrap(),
                start: secs("5"),
                stop: secs("5"),
            }
        );

        let err = fix_unpaired_state_events(&ethogram(), tl.events(), secs("0.5")).unwrap_err();
        assert!(err.to_string().contains("stop must be later than start"));
    }

    #[test]
    fn stop_moves_before_event_of_other_modifier() {
        let ethogram = ethogram();
        let mut tl = timeline(vec![
            ev("1", "s", "walk", "a"),
            ev("5", "s", "walk", "b"),
            ev("8", "s", "walk", "b"),
        ]);

        let stops = fix_unpaired_state_events(&ethogram, tl.events(), secs("8")).unwrap();
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].modifier, "a");
        assert_eq!(stops[0].time, secs("7.999"));

        tl.extend_sorted(stops).unwrap();
        assert!(tl.unpaired_keys(&ethogram).is_empty());
    }

    #[test]
    fn open_modifiers_of_one_behavior_get_distinct_stops() {
        let ethogram = ethogram();
        let mut tl = timeline(vec![ev("1", "s", "walk", "a"), ev("2", "s", "walk", "b")]);

        let stops = fix_unpaired_state_events(&ethogram, tl.events(), secs("9")).unwrap();
        let times: Vec<_> = stops.iter().map(|e| (e.modifier.as_str(), e.time)).collect();
        assert_eq!(times, [("a", secs("9")), ("b", secs("8.999"))]);

        tl.extend_sorted(stops).unwrap();
        assert!(tl.unpaired_keys(&ethogram).is_empty());
    }

    #[test]
    fn no_free_stop_time_is_an_error() {
        let tl = timeline(vec![
            ev("1", "s", "walk", "a"),
            ev("1.001", "s", "walk", "b"),
            ev("1.002", "s", "walk", "b"),
        ]);
        let err = fix_unpaired_state_events(&ethogram(), tl.events(), secs("1.002")).unwrap_err();
        assert_eq!(
            err,
            UnpairedError::NoFreeStopTime {
                subject: "s".to_string(),
                behavior: BehaviorCode::new("walk").unwrap(),
                start: secs("1"),
                stop: secs("1.002"),
            }
        );
    }

    #[test]
    fn open_states_report_start_times() {
        let tl = timeline(vec![
            ev("1", "s", "walk", ""),
            ev("2", "s", "walk", ""),
            ev("3", "s", "walk", ""),
        ]);
        let ethogram = ethogram();
        let open = open_states(&ethogram, tl.events());
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].1, secs("3"));
    }

    #[test]
    fn notice_display() {
        let stop = ev("9", "s", "sniff", "left");
        let notice = UnpairedNotice::from_event(secs("3"), &stop);
        assert_eq!(
            notice.to_string(),
            "state s|sniff (left) opened at 3.000 was closed at 9.000"
        );
    }
}
