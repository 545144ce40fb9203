//! Coded behavioral events and their persistence records.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::observation::ObservationType;
use crate::time::Seconds;
use crate::types::BehaviorCode;

/// Errors raised when an event record is rejected at ingestion.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataError {
    /// The record had fewer or more positional fields than allowed.
    #[error("event record must have 4 to 6 fields, got {count}")]
    FieldCount { count: usize },

    /// A positional field had the wrong JSON type or an unparsable value.
    #[error("invalid {field} in event record: {message}")]
    InvalidField { field: &'static str, message: String },

    /// A required field was missing or empty.
    #[error("event record is missing {field}")]
    MissingField { field: &'static str },

    /// Event times are offsets from the observation start and cannot be negative.
    #[error("event time cannot be negative, got {time}")]
    NegativeTime { time: Seconds },

    /// An event with the same time, subject and behavior already exists.
    #[error("duplicate event at {time} for subject {subject:?} and behavior {behavior}")]
    Duplicate {
        time: Seconds,
        subject: String,
        behavior: BehaviorCode,
    },
}

/// Media-specific or image-specific data carried by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EventExtra {
    #[default]
    None,
    /// Frame index in the media file (MEDIA observations).
    Frame { index: u64 },
    /// Index of the image in the sequence (IMAGES observations).
    Image { index: u64 },
}

/// One coded occurrence of a behavior.
///
/// Whether the event opens/closes a state or marks a point is not stored
/// here; it follows from the ethogram and the parity of its [`StateKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Event {
    /// Offset from the observation start.
    pub time: Seconds,
    /// Subject name; empty for "no focal subject".
    pub subject: String,
    pub behavior: BehaviorCode,
    /// Raw modifier text, one `|` separated component per modifier set.
    pub modifier: String,
    pub comment: String,
    pub extra: EventExtra,
}

/// Identity used for START/STOP parity of state events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateKey<'a> {
    pub subject: &'a str,
    pub behavior: &'a BehaviorCode,
    pub modifier: &'a str,
}

impl fmt::Display for StateKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.subject, self.behavior)?;
        if !self.modifier.is_empty() {
            write!(f, " ({})", self.modifier)?;
        }
        Ok(())
    }
}

impl Event {
    /// Creates an event with no comment and no extra data.
    pub fn new(
        time: Seconds,
        subject: impl Into<String>,
        behavior: BehaviorCode,
        modifier: impl Into<String>,
    ) -> Result<Self, DataError> {
        if time.is_negative() {
            return Err(DataError::NegativeTime { time });
        }
        Ok(Self {
            time,
            subject: subject.into(),
            behavior,
            modifier: modifier.into(),
            comment: String::new(),
            extra: EventExtra::None,
        })
    }

    pub fn state_key(&self) -> StateKey<'_> {
        StateKey {
            subject: &self.subject,
            behavior: &self.behavior,
            modifier: &self.modifier,
        }
    }

    /// Whether `other` has the same time, subject and behavior.
    pub fn collides_with(&self, other: &Self) -> bool {
        self.time == other.time && self.subject == other.subject && self.behavior == other.behavior
    }

    /// Parses a positional persistence record.
    ///
    /// Layout: `[time, subject, behavior, modifier, comment?, index?]`. The
    /// sixth field is a frame index for MEDIA (`"NA"` allowed) and an image
    /// index for IMAGES; LIVE observations ignore it.
    pub fn from_record(fields: &[Value], kind: ObservationType) -> Result<Self, DataError> {
        if !(4..=6).contains(&fields.len()) {
            return Err(DataError::FieldCount {
                count: fields.len(),
            });
        }

        let time = parse_time(&fields[0])?;
        let subject = string_field(&fields[1], "subject")?;
        let behavior = string_field(&fields[2], "behavior")?;
        let behavior =
            BehaviorCode::new(behavior).map_err(|_| DataError::MissingField { field: "behavior" })?;
        let modifier = string_field(&fields[3], "modifier")?;
        let comment = fields
            .get(4)
            .map(|v| string_field(v, "comment"))
            .transpose()?
            .unwrap_or_default();

        let extra = match (kind, fields.get(5)) {
            (ObservationType::Media, Some(value)) => match index_field(value, "frame index")? {
                Some(index) => EventExtra::Frame { index },
                None => EventExtra::None,
            },
            (ObservationType::Images, Some(value)) => {
                let index = index_field(value, "image index")?
                    .ok_or(DataError::MissingField { field: "image index" })?;
                EventExtra::Image { index }
            }
            (ObservationType::Images, None) => {
                return Err(DataError::MissingField { field: "image index" });
            }
            _ => EventExtra::None,
        };

        let mut event = Self::new(time, subject, behavior, modifier)?;
        event.comment = comment;
        event.extra = extra;
        Ok(event)
    }

    /// Converts back into a positional persistence record.
    pub fn to_record(&self) -> Vec<Value> {
        let mut record = vec![
            Value::String(self.time.to_string()),
            Value::String(self.subject.clone()),
            Value::String(self.behavior.to_string()),
            Value::String(self.modifier.clone()),
            Value::String(self.comment.clone()),
        ];
        match self.extra {
            EventExtra::Frame { index } | EventExtra::Image { index } => {
                record.push(Value::from(index));
            }
            EventExtra::None => {}
        }
        record
    }
}

fn parse_time(value: &Value) -> Result<Seconds, DataError> {
    let invalid = |message: String| DataError::InvalidField {
        field: "time",
        message,
    };
    let time: Seconds = match value {
        Value::String(s) => s.parse().map_err(|e| invalid(format!("{e}")))?,
        Value::Number(n) if n.is_i64() || n.is_u64() => {
            n.to_string().parse().map_err(|e| invalid(format!("{e}")))?
        }
        Value::Number(n) => return Err(invalid(format!("{n} must be a decimal string"))),
        Value::Null => return Err(DataError::MissingField { field: "time" }),
        other => return Err(invalid(format!("unexpected value {other}"))),
    };
    if time.is_negative() {
        return Err(DataError::NegativeTime { time });
    }
    Ok(time)
}

fn string_field(value: &Value, field: &'static str) -> Result<String, DataError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Null => Ok(String::new()),
        other => Err(DataError::InvalidField {
            field,
            message: format!("expected a string, got {other}"),
        }),
    }
}

fn index_field(value: &Value, field: &'static str) -> Result<Option<u64>, DataError> {
    match value {
        Value::Number(n) => n.as_u64().map(Some).ok_or_else(|| DataError::InvalidField {
            field,
            message: format!("expected a non-negative integer, got {n}"),
        }),
        Value::String(s) if s == "NA" || s.is_empty() => Ok(None),
        Value::String(s) => s.parse().map(Some).map_err(|_| DataError::InvalidField {
            field,
            message: format!("expected a non-negative integer, got {s:?}"),
        }),
        Value::Null => Ok(None),
        other => Err(DataError::InvalidField {
            field,
            message: format!("unexpected value {other}"),
        }),
    }
}
