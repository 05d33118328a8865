//! Core domain types for the Recall scheduler.
//!
//! This module defines the fundamental types used throughout the system:
//! - Learning states and review ratings
//! - Cards and their per-state memory fields
//! - Review logs

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// State and Rating
// ============================================================================

/// Learning phase of a card
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum State {
    Learning,
    Review,
    Relearning,
}

impl From<State> for u8 {
    fn from(state: State) -> u8 {
        match state {
            State::Learning => 1,
            State::Review => 2,
            State::Relearning => 3,
        }
    }
}

impl TryFrom<u8> for State {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(State::Learning),
            2 => Ok(State::Review),
            3 => Ok(State::Relearning),
            other => Err(Error::MalformedRecord(format!(
                "Unknown state ordinal {}",
                other
            ))),
        }
    }
}

/// Outcome of a review, ordered by recall quality
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Rating {
    /// Forgotten
    Again,
    /// Recalled with serious difficulty
    Hard,
    /// Recalled after some effort
    Good,
    /// Recalled effortlessly
    Easy,
}

impl Rating {
    /// All ratings, worst first
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> u8 {
        match rating {
            Rating::Again => 1,
            Rating::Hard => 2,
            Rating::Good => 3,
            Rating::Easy => 4,
        }
    }
}

impl TryFrom<u8> for Rating {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Rating::Again),
            2 => Ok(Rating::Hard),
            3 => Ok(Rating::Good),
            4 => Ok(Rating::Easy),
            other => Err(Error::InvalidRating(format!(
                "{} is not in 1..=4",
                other
            ))),
        }
    }
}

impl FromStr for Rating {
    type Err = Error;

    /// Accepts `again`, `hard`, `good`, `easy` (any case) or the ordinals 1-4.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "again" | "1" => Ok(Rating::Again),
            "hard" | "2" => Ok(Rating::Hard),
            "good" | "3" => Ok(Rating::Good),
            "easy" | "4" => Ok(Rating::Easy),
            _ => Err(Error::InvalidRating(format!(
                "'{}' (expected again, hard, good or easy)",
                s
            ))),
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rating::Again => "again",
            Rating::Hard => "hard",
            Rating::Good => "good",
            Rating::Easy => "easy",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Card
// ============================================================================

/// Memory fields of a card, by learning state
///
/// Each variant carries exactly the fields its state requires, so a
/// `Review` card always has an ease and an interval and never a step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Phase {
    /// Working through the learning steps
    Learning { step: u32 },
    /// Graduated; scheduled in whole days
    Review { ease: f64, current_interval: u32 },
    /// Lapsed; working through the relearning steps. The interval computed
    /// at the lapse is kept until the card graduates again.
    Relearning {
        step: u32,
        ease: f64,
        current_interval: u32,
    },
}

impl Phase {
    pub fn state(&self) -> State {
        match self {
            Phase::Learning { .. } => State::Learning,
            Phase::Review { .. } => State::Review,
            Phase::Relearning { .. } => State::Relearning,
        }
    }
}

/// Scheduling state of one learnable item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "crate::record::CardRecord", into = "crate::record::CardRecord")]
pub struct Card {
    /// Opaque identifier; defaults to the creation time in epoch milliseconds
    pub id: i64,
    pub phase: Phase,
    /// When the card should next be presented
    pub due: DateTime<Utc>,
}

impl Card {
    /// Create a new card in the first learning step, due now
    ///
    /// The id is the current epoch milliseconds, which is not unique across
    /// processes; callers needing that should use [`Card::with_id`].
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: now.timestamp_millis(),
            phase: Phase::Learning { step: 0 },
            due: now,
        }
    }

    /// Create a new card with a caller-supplied id
    pub fn with_id(id: i64) -> Self {
        Self {
            id,
            ..Self::new()
        }
    }

    /// Build a card from flat, possibly absent fields
    ///
    /// Defaults: `id` is the current epoch milliseconds, `due` is now, and a
    /// `Learning` card without a step starts at step 0. Fields a state does
    /// not use are ignored; fields a state requires must be present.
    pub fn from_parts(
        id: Option<i64>,
        state: State,
        step: Option<u32>,
        ease: Option<f64>,
        due: Option<DateTime<Utc>>,
        current_interval: Option<u32>,
    ) -> Result<Self> {
        let now = Utc::now();
        let id = id.unwrap_or_else(|| now.timestamp_millis());
        let due = due.unwrap_or(now);

        let missing = |field: &str| {
            Error::InvariantViolation(format!(
                "card {} in state {:?} has no {}",
                id, state, field
            ))
        };

        let phase = match state {
            State::Learning => Phase::Learning {
                step: step.unwrap_or(0),
            },
            State::Review => Phase::Review {
                ease: ease.ok_or_else(|| missing("ease"))?,
                current_interval: current_interval.ok_or_else(|| missing("current_interval"))?,
            },
            State::Relearning => Phase::Relearning {
                step: step.ok_or_else(|| missing("step"))?,
                ease: ease.ok_or_else(|| missing("ease"))?,
                current_interval: current_interval.ok_or_else(|| missing("current_interval"))?,
            },
        };

        Ok(Self { id, phase, due })
    }

    pub fn state(&self) -> State {
        self.phase.state()
    }

    /// Current learning or relearning step; `None` in review
    pub fn step(&self) -> Option<u32> {
        match self.phase {
            Phase::Learning { step } | Phase::Relearning { step, .. } => Some(step),
            Phase::Review { .. } => None,
        }
    }

    /// Ease factor; `None` until the card first graduates
    pub fn ease(&self) -> Option<f64> {
        match self.phase {
            Phase::Review { ease, .. } | Phase::Relearning { ease, .. } => Some(ease),
            Phase::Learning { .. } => None,
        }
    }

    /// Interval in days; `None` until the card first graduates
    pub fn current_interval(&self) -> Option<u32> {
        match self.phase {
            Phase::Review {
                current_interval, ..
            }
            | Phase::Relearning {
                current_interval, ..
            } => Some(current_interval),
            Phase::Learning { .. } => None,
        }
    }
}

impl Default for Card {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Review Log
// ============================================================================

/// Immutable record of one review
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "crate::record::ReviewLogRecord",
    into = "crate::record::ReviewLogRecord"
)]
pub struct ReviewLog {
    /// The card as it was before the review
    pub card: Card,
    pub rating: Rating,
    pub review_datetime: DateTime<Utc>,
    /// Milliseconds spent on the review, if measured
    pub review_duration: Option<u64>,
}

impl ReviewLog {
    /// Snapshot `card` into a new log entry
    pub fn new(
        card: &Card,
        rating: Rating,
        review_datetime: DateTime<Utc>,
        review_duration: Option<u64>,
    ) -> Self {
        Self {
            card: card.clone(),
            rating,
            review_datetime,
            review_duration,
        }
    }
}
