//! Time-ordered event list of one observation.

use std::collections::{BTreeSet, HashMap};

use crate::ethogram::Ethogram;
use crate::event::{DataError, Event, StateKey};
use crate::time::Seconds;

/// Events of one observation, always sorted by time.
///
/// Events sharing a timestamp keep their insertion order, which is the order
/// in which START/STOP parity is evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    events: Vec<Event>,
}

impl Timeline {
    pub const fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Builds a timeline from unordered events, rejecting duplicates.
    pub fn from_events(events: impl IntoIterator<Item = Event>) -> Result<Self, DataError> {
        let mut timeline = Self::new();
        for event in events {
            timeline.add_event(event)?;
        }
        Ok(timeline)
    }

    /// Inserts an event after any events with the same or earlier time.
    ///
    /// Fails if an event with the same time, subject and behavior exists.
    pub fn add_event(&mut self, event: Event) -> Result<(), DataError> {
        if event.time.is_negative() {
            return Err(DataError::NegativeTime { time: event.time });
        }

        let lower = self.events.partition_point(|e| e.time < event.time);
        let upper = self.events.partition_point(|e| e.time <= event.time);
        if self.events[lower..upper]
            .iter()
            .any(|existing| existing.collides_with(&event))
        {
            return Err(DataError::Duplicate {
                time: event.time,
                subject: event.subject,
                behavior: event.behavior,
            });
        }

        self.events.insert(upper, event);
        Ok(())
    }

    /// Adds several events, all or nothing.
    pub fn extend_sorted(&mut self, events: impl IntoIterator<Item = Event>) -> Result<(), DataError> {
        let mut updated = self.clone();
        for event in events {
            updated.add_event(event)?;
        }
        *self = updated;
        Ok(())
    }

    /// Removes and returns the event at `index`.
    pub fn remove_at(&mut self, index: usize) -> Option<Event> {
        (index < self.events.len()).then(|| self.events.remove(index))
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn first_time(&self) -> Option<Seconds> {
        self.events.first().map(|e| e.time)
    }

    pub fn last_time(&self) -> Option<Seconds> {
        self.events.last().map(|e| e.time)
    }

    /// Events with `start <= time < stop`.
    pub fn events_in_range(&self, start: Seconds, stop: Seconds) -> &[Event] {
        let lower = self.events.partition_point(|e| e.time < start);
        let upper = self.events.partition_point(|e| e.time < stop).max(lower);
        &self.events[lower..upper]
    }

    /// State keys whose occurrence count is odd.
    pub fn unpaired_keys<'a>(&'a self, ethogram: &Ethogram) -> Vec<StateKey<'a>> {
        let mut counts: HashMap<StateKey<'a>, usize> = HashMap::new();
        for event in self.events.iter().filter(|e| ethogram.is_state(&e.behavior)) {
            *counts.entry(event.state_key()).or_default() += 1;
        }
        let mut unpaired: Vec<_> = counts
            .into_iter()
            .filter(|(_, count)| count % 2 == 1)
            .map(|(key, _)| key)
            .collect();
        unpaired.sort();
        unpaired
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// Distinct state keys among `events`, restricted to STATE behaviors.
pub fn state_keys_of<'a>(events: &'a [Event], ethogram: &Ethogram) -> BTreeSet<StateKey<'a>> {
    events
        .iter()
        .filter(|e| ethogram.is_state(&e.behavior))
        .map(Event::state_key)
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::types::BehaviorCode;

    pub fn ev(time: &str, subject: &str, behavior: &str, modifier: &str) -> Event {
        Event::new(
            time.parse().unwrap(),
            subject,
            BehaviorCode::new(behavior).unwrap(),
            modifier,
        )
        .unwrap()
    }

    pub fn timeline(events: Vec<Event>) -> Timeline {
        Timeline::from_events(events).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{ev, timeline};
    use super::*;
    use crate::ethogram::fixtures::{point, state};

    fn secs(s: &str) -> Seconds {
        s.parse().unwrap()
    }

    #[test]
    fn add_event_keeps_time_order() {
        let mut tl = Timeline::new();
        tl.add_event(ev("5", "s", "walk", "")).unwrap();
        tl.add_event(ev("1", "s", "walk", "")).unwrap();
        tl.add_event(ev("3", "s", "rest", "")).unwrap();

        let times: Vec<_> = tl.iter().map(|e| e.time.to_string()).collect();
        assert_eq!(times, ["1.000", "3.000", "5.000"]);
        assert_eq!(tl.first_time(), Some(secs("1")));
        assert_eq!(tl.last_time(), Some(secs("5")));
    }

    #[test]
    fn add_event_rejects_duplicate_triple() {
        let mut tl = timeline(vec![ev("1", "s", "walk", "")]);
        let err = tl.add_event(ev("1", "s", "walk", "fast")).unwrap_err();
        assert!(matches!(err, DataError::Duplicate { .. }));
        assert_eq!(tl.len(), 1);

        // Same time, other subject or behavior is fine.
        tl.add_event(ev("1", "t", "walk", "")).unwrap();
        tl.add_event(ev("1", "s", "rest", "")).unwrap();
        assert_eq!(tl.len(), 3);
    }

    #[test]
    fn equal_times_keep_insertion_order() {
        let tl = timeline(vec![ev("1", "s", "b", ""), ev("1", "s", "a", "")]);
        let codes: Vec<_> = tl.iter().map(|e| e.behavior.as_str()).collect();
        assert_eq!(codes, ["b", "a"]);
    }

    #[test]
    fn extend_sorted_is_all_or_nothing() {
        let mut tl = timeline(vec![ev("1", "s", "walk", "")]);
        let result = tl.extend_sorted([ev("2", "s", "walk", ""), ev("1", "s", "walk", "")]);
        assert!(result.is_err());
        assert_eq!(tl.len(), 1);
    }

    #[test]
    fn events_in_range_is_half_open() {
        let tl = timeline(vec![
            ev("0", "s", "a", ""),
            ev("1", "s", "a", ""),
            ev("2", "s", "a", ""),
            ev("3", "s", "a", ""),
        ]);
        let times: Vec<_> = tl
            .events_in_range(secs("1"), secs("3"))
            .iter()
            .map(|e| e.time)
            .collect();
        assert_eq!(times, [secs("1"), secs("2")]);
        assert!(tl.events_in_range(secs("3"), secs("1")).is_empty());
    }

    #[test]
    fn remove_at_bounds() {
        let mut tl = timeline(vec![ev("1", "s", "a", "")]);
        assert!(tl.remove_at(3).is_none());
        assert!(tl.remove_at(0).is_some());
        assert!(tl.is_empty());
    }

    #[test]
    fn state_keys_skip_point_behaviors() {
        let ethogram = Ethogram::new([state("walk"), point("bark")]);
        let tl = timeline(vec![
            ev("0", "s", "walk", "fast"),
            ev("1", "s", "bark", ""),
            ev("2", "s", "walk", "fast"),
            ev("3", "t", "walk", ""),
        ]);
        let keys: Vec<_> = state_keys_of(tl.events(), &ethogram)
            .into_iter()
            .map(|k| k.to_string())
            .collect();
        assert_eq!(keys, ["s|walk (fast)", "t|walk"]);
    }

    #[test]
    fn unpaired_keys_reports_odd_parity() {
        let ethogram = Ethogram::new([state("walk"), point("bark")]);
        let tl = timeline(vec![
            ev("0", "s", "walk", ""),
            ev("1", "s", "bark", ""),
            ev("2", "s", "walk", ""),
            ev("3", "t", "walk", ""),
        ]);
        let keys: Vec<_> = tl.unpaired_keys(&ethogram).iter().map(ToString::to_string).collect();
        assert_eq!(keys, ["t|walk"]);
    }
}
