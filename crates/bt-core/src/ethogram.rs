//! Ethogram: the catalogue of codable behaviors and their modifier sets.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::BehaviorCode;

/// Separator between the modifier components of one event.
pub const MODIFIER_SEPARATOR: char = '|';

/// How occurrences of a behavior are recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BehaviorType {
    /// Paired START/STOP events delimiting a duration.
    State,
    /// A single instantaneous event.
    Point,
}

impl BehaviorType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Point => "point",
        }
    }
}

impl fmt::Display for BehaviorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BehaviorType {
    type Err = UnknownBehaviorType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "state" | "State event" => Ok(Self::State),
            "point" | "Point event" => Ok(Self::Point),
            _ => Err(UnknownBehaviorType(s.to_string())),
        }
    }
}

impl Serialize for BehaviorType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BehaviorType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown behavior type strings.
#[derive(Debug, Clone)]
pub struct UnknownBehaviorType(String);

impl fmt::Display for UnknownBehaviorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown behavior type: {}", self.0)
    }
}

impl std::error::Error for UnknownBehaviorType {}

/// Selection rule of a modifier set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKind {
    /// Exactly one value out of `values`.
    #[default]
    Single,
    /// Any number of values out of `values`, comma separated.
    Multiple,
    /// A free numeric value.
    Numeric,
}

/// A named group of qualifiers attached to one behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierSet {
    pub name: String,
    #[serde(default)]
    pub kind: ModifierKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

/// One codable behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Behavior {
    pub code: BehaviorCode,
    #[serde(rename = "type")]
    pub kind: BehaviorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Modifier sets in the positional order used by event modifier text.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifier_sets: Vec<ModifierSet>,
}

/// The set of behaviors available to code an observation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Behavior>", into = "Vec<Behavior>")]
pub struct Ethogram {
    behaviors: BTreeMap<BehaviorCode, Behavior>,
}

impl Ethogram {
    pub fn new(behaviors: impl IntoIterator<Item = Behavior>) -> Self {
        Self {
            behaviors: behaviors
                .into_iter()
                .map(|b| (b.code.clone(), b))
                .collect(),
        }
    }

    pub fn get(&self, code: &BehaviorCode) -> Option<&Behavior> {
        self.behaviors.get(code)
    }

    pub fn kind_of(&self, code: &BehaviorCode) -> Option<BehaviorType> {
        self.get(code).map(|b| b.kind)
    }

    pub fn is_state(&self, code: &BehaviorCode) -> bool {
        self.kind_of(code) == Some(BehaviorType::State)
    }

    pub fn is_point(&self, code: &BehaviorCode) -> bool {
        self.kind_of(code) == Some(BehaviorType::Point)
    }

    /// Iterates behaviors in code order.
    pub fn behaviors(&self) -> impl Iterator<Item = &Behavior> {
        self.behaviors.values()
    }

    pub fn state_behaviors(&self) -> impl Iterator<Item = &BehaviorCode> {
        self.behaviors
            .values()
            .filter(|b| b.kind == BehaviorType::State)
            .map(|b| &b.code)
    }

    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }

    /// Returns the modifier values of an event that belong to the behavior's
    /// declared modifier sets.
    ///
    /// The i-th `|` component of `modifier` belongs to the i-th set. Components
    /// beyond the declared sets and empty components are dropped; multiple
    /// selections are split on commas. The result is sorted.
    pub fn modifier_values(&self, code: &BehaviorCode, modifier: &str) -> Vec<String> {
        let Some(behavior) = self.get(code) else {
            return Vec::new();
        };

        let mut values: Vec<String> = modifier
            .split(MODIFIER_SEPARATOR)
            .zip(&behavior.modifier_sets)
            .flat_map(|(component, set)| match set.kind {
                ModifierKind::Multiple => component.split(',').map(str::trim).collect::<Vec<_>>(),
                ModifierKind::Single | ModifierKind::Numeric => vec![component.trim()],
            })
            .filter(|value| !value.is_empty())
            .map(String::from)
            .collect();
        values.sort();
        values
    }
}

impl From<Vec<Behavior>> for Ethogram {
    fn from(behaviors: Vec<Behavior>) -> Self {
        Self::new(behaviors)
    }
}

impl From<Ethogram> for Vec<Behavior> {
    fn from(ethogram: Ethogram) -> Self {
        ethogram.behaviors.into_values().collect()
    }
}
