//! Pulse and status classification
//!
//! `Pulse` is the health signal attached to every topology node. Pulses are
//! totally ordered by severity and every aggregation keeps the worst one.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Health signal for a topology node, ordered worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pulse {
    /// Failure
    Red,
    /// Deployment blocked by a time window
    Blocked,
    /// Warning
    Yellow,
    /// Unknown or still waiting for data
    Orange,
    /// Healthy
    Green,
    /// Awaiting the first status pass
    Spinner,
}

impl Pulse {
    /// Rank used for ordering; lower is worse
    fn severity(&self) -> u8 {
        match self {
            Pulse::Red => 0,
            Pulse::Blocked => 1,
            Pulse::Yellow => 2,
            Pulse::Orange => 3,
            Pulse::Green => 4,
            Pulse::Spinner => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Pulse::Red => "red",
            Pulse::Blocked => "blocked",
            Pulse::Yellow => "yellow",
            Pulse::Orange => "orange",
            Pulse::Green => "green",
            Pulse::Spinner => "spinner",
        }
    }

    pub fn all() -> &'static [Self] {
        &[
            Pulse::Red,
            Pulse::Blocked,
            Pulse::Yellow,
            Pulse::Orange,
            Pulse::Green,
            Pulse::Spinner,
        ]
    }

    /// Return the more severe of the two pulses
    pub fn worst(self, other: Pulse) -> Pulse {
        if other < self { other } else { self }
    }

    /// Fold a collection of pulses into the worst one
    pub fn worst_of<I: IntoIterator<Item = Pulse>>(pulses: I) -> Option<Pulse> {
        pulses.into_iter().reduce(Pulse::worst)
    }
}

impl PartialOrd for Pulse {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pulse {
    fn cmp(&self, other: &Self) -> Ordering {
        self.severity().cmp(&other.severity())
    }
}

impl fmt::Display for Pulse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Pulse {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "red" => Ok(Pulse::Red),
            "blocked" => Ok(Pulse::Blocked),
            "yellow" => Ok(Pulse::Yellow),
            "orange" => Ok(Pulse::Orange),
            "green" => Ok(Pulse::Green),
            "spinner" => Ok(Pulse::Spinner),
            _ => Err(format!("Unknown pulse: {}", s)),
        }
    }
}

/// Status classification used by detail records and the Argo lookup table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Checkmark,
    Warning,
    Pending,
    Failure,
}

impl StatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Checkmark => "checkmark",
            StatusKind::Warning => "warning",
            StatusKind::Pending => "pending",
            StatusKind::Failure => "failure",
        }
    }

    pub fn to_pulse(self) -> Pulse {
        match self {
            StatusKind::Checkmark => Pulse::Green,
            StatusKind::Warning => Pulse::Yellow,
            StatusKind::Pending => Pulse::Orange,
            StatusKind::Failure => Pulse::Red,
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
