//! Reconstruction of the states active at a given time.

use std::collections::{BTreeMap, HashMap};

use crate::ethogram::Ethogram;
use crate::event::StateKey;
use crate::time::Seconds;
use crate::timeline::Timeline;

/// Label shown for an active state: the behavior code, followed by the
/// modifier text in parentheses when there is one.
pub fn state_label(key: &StateKey<'_>) -> String {
    if key.modifier.is_empty() {
        key.behavior.to_string()
    } else {
        format!("{} ({})", key.behavior, key.modifier)
    }
}

/// Returns the active states of each subject at `time`.
///
/// A state key is active when the number of its events at or before `time`
/// is odd. Keys are keyed by the subject's index in `subjects`; events of
/// subjects not listed are ignored. Labels are sorted within each subject.
/// Subjects with no active state are omitted.
pub fn current_states(
    timeline: &Timeline,
    ethogram: &Ethogram,
    subjects: &[String],
    time: Seconds,
) -> BTreeMap<usize, Vec<String>> {
    let subject_index: HashMap<&str, usize> = subjects
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.as_str(), idx))
        .collect();

    let mut parity: HashMap<StateKey<'_>, bool> = HashMap::new();
    for event in timeline
        .iter()
        .take_while(|e| e.time <= time)
        .filter(|e| ethogram.is_state(&e.behavior))
    {
        let open = parity.entry(event.state_key()).or_default();
        *open = !*open;
    }

    let mut active: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for key in parity.into_iter().filter(|(_, open)| *open).map(|(key, _)| key) {
        if let Some(&idx) = subject_index.get(key.subject) {
            active.entry(idx).or_default().push(state_label(&key));
        }
    }
    for labels in active.values_mut() {
        labels.sort();
    }

    tracing::trace!(%time, subjects = active.len(), "reconstructed current states");
    active
}
