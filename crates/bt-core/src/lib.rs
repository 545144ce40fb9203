//! Core domain logic for behavioral event timelines.
//!
//! This crate contains the fundamental types and logic for:
//! - Timelines: sorted, validated behavioral events per observation
//! - State reconstruction: which states are active at a given time
//! - Unpaired repair: closing states left open at an observation boundary
//! - Agreement: elementary-interval decomposition and Cohen's Kappa
//! - Time budgets: occurrences, durations and rates per behavior
//!
//! All functions are pure and synchronous over borrowed snapshots; the
//! [`Project`] aggregate is passed in explicitly.

pub mod ethogram;
pub mod event;
pub mod intervals;
pub mod irr;
pub mod observation;
pub mod project;
pub mod segments;
pub mod state;
pub mod time;
pub mod time_budget;
pub mod timeline;
pub mod types;
pub mod unpaired;

pub use ethogram::{Behavior, BehaviorType, Ethogram, ModifierKind, ModifierSet};
pub use event::{DataError, Event, EventExtra, StateKey};
pub use irr::{IrrError, IrrMethod, IrrOptions, IrrReport, KappaScore, cohen_kappa, pairwise_irr};
pub use observation::{Observation, ObservationInterval, ObservationType, RepairError};
pub use project::{Project, ProjectError};
pub use segments::{LabelMode, Segment, SegmentError, Selection};
pub use state::current_states;
pub use time::Seconds;
pub use time_budget::{BehaviorBudget, BudgetError, TimeBudget, time_budget};
pub use timeline::Timeline;
pub use types::{BehaviorCode, EventWeight, ObservationId, RoundDecimals, ValidationError};
pub use unpaired::{UnpairedError, UnpairedNotice, fix_unpaired_state_events};
