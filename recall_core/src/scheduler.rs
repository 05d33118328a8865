//! SM-2 review scheduling.
//!
//! A review moves a card through three phases:
//! - **Learning**: new cards step through short, fixed delays and graduate
//!   to review after Good on the last step (or Easy on any step)
//! - **Review**: intervals in days grow by the card's ease factor; Again
//!   lapses the card into relearning
//! - **Relearning**: lapsed cards step through the relearning delays and
//!   graduate back to review, keeping their ease
//!
//! Review intervals are fuzzed (see [`crate::fuzz`]) with the scheduler's
//! own generator, so runs are reproducible when the scheduler is seeded.

use crate::fuzz::{fuzz_interval, round_days};
use crate::{Card, Phase, Rating, ReviewLog, SchedulerConfig};
use chrono::{DateTime, Duration, Utc};
use rand::{Rng, SeedableRng};
use rand_pcg::Mcg128Xsl64;
use std::sync::Arc;

/// Ease never drops below this
const EASE_FLOOR: f64 = 1.3;
const LAPSE_EASE_FACTOR: f64 = 0.80;
const HARD_EASE_FACTOR: f64 = 0.85;
const EASY_EASE_FACTOR: f64 = 1.15;
/// Delay multiplier for Hard when the first step is the only step
const HARD_SINGLE_STEP_FACTOR: f64 = 1.5;

/// Longest interval or step, in days, a review can land within the
/// timestamp range; later due dates saturate at the end of that range
pub(crate) const MAX_SCHEDULABLE_DAYS: u32 = 90_000_000;

/// Reviews cards against a shared, immutable configuration
pub struct Scheduler<R = Mcg128Xsl64> {
    config: Arc<SchedulerConfig>,
    rng: R,
}

impl Scheduler<Mcg128Xsl64> {
    /// Scheduler whose fuzzing is seeded from OS entropy
    pub fn new(config: impl Into<Arc<SchedulerConfig>>) -> Self {
        Self::with_rng(config, Mcg128Xsl64::from_entropy())
    }

    /// Scheduler with reproducible fuzzing
    pub fn with_seed(config: impl Into<Arc<SchedulerConfig>>, seed: u64) -> Self {
        Self::with_rng(config, Mcg128Xsl64::seed_from_u64(seed))
    }
}

impl Default for Scheduler<Mcg128Xsl64> {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl<R: Rng> Scheduler<R> {
    pub fn with_rng(config: impl Into<Arc<SchedulerConfig>>, rng: R) -> Self {
        Self {
            config: config.into(),
            rng,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Review `card` with `rating`
    ///
    /// Returns the updated card and a log holding a snapshot of `card` as it
    /// was before the review. `card` itself is left untouched. The review
    /// time defaults to now; `review_duration` is in milliseconds.
    pub fn review_card(
        &mut self,
        card: &Card,
        rating: Rating,
        review_datetime: Option<DateTime<Utc>>,
        review_duration: Option<u64>,
    ) -> (Card, ReviewLog) {
        let now = review_datetime.unwrap_or_else(Utc::now);
        let review_log = ReviewLog::new(card, rating, now, review_duration);

        let (phase, due) = match card.phase {
            Phase::Learning { step } => self.review_learning(step, rating, now),
            Phase::Review {
                ease,
                current_interval,
            } => self.review_review(ease, current_interval, card.due, rating, now),
            Phase::Relearning {
                step,
                ease,
                current_interval,
            } => self.review_relearning(step, ease, current_interval, rating, now),
        };

        let next = Card {
            id: card.id,
            phase,
            due,
        };

        tracing::debug!(
            "Card {} rated {}: {:?} -> {:?}, due {}",
            card.id,
            rating,
            card.phase,
            next.phase,
            next.due
        );

        (next, review_log)
    }

    /// Outcome of each rating for `card`, worst rating first
    pub fn preview(
        &mut self,
        card: &Card,
        review_datetime: Option<DateTime<Utc>>,
    ) -> Vec<(Rating, Card)> {
        let now = review_datetime.unwrap_or_else(Utc::now);
        Rating::ALL
            .iter()
            .map(|&rating| (rating, self.review_card(card, rating, Some(now), None).0))
            .collect()
    }

    fn review_learning(
        &self,
        step: u32,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> (Phase, DateTime<Utc>) {
        let config = Arc::clone(&self.config);
        let steps = &config.learning_steps;
        let idx = step as usize;

        // Card was scheduled under a config with more learning steps
        if idx >= steps.len() {
            tracing::debug!(
                "Learning step {} outside {} configured steps, graduating",
                step,
                steps.len()
            );
            return graduate(&config, config.graduating_interval, now);
        }

        match rating {
            Rating::Again => (Phase::Learning { step: 0 }, advance(now, steps[0])),
            Rating::Hard => (Phase::Learning { step }, advance(now, hard_delay(steps, idx))),
            Rating::Good => {
                if idx + 1 == steps.len() {
                    graduate(&config, config.graduating_interval, now)
                } else {
                    (Phase::Learning { step: step + 1 }, advance(now, steps[idx + 1]))
                }
            }
            Rating::Easy => graduate(&config, config.easy_interval, now),
        }
    }

    fn review_review(
        &mut self,
        ease: f64,
        current_interval: u32,
        due: DateTime<Utc>,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> (Phase, DateTime<Utc>) {
        let config = Arc::clone(&self.config);
        let interval = f64::from(current_interval);

        match rating {
            Rating::Again => {
                let ease = (ease * LAPSE_EASE_FACTOR).max(EASE_FLOOR);
                let raw = round_days(interval * config.new_interval * config.interval_modifier)
                    .max(config.minimum_interval);
                // Fuzzing may land below the minimum for short intervals
                let current_interval = self.fuzz(raw).max(config.minimum_interval);

                match config.relearning_steps.first() {
                    Some(&first) => (
                        Phase::Relearning {
                            step: 0,
                            ease,
                            current_interval,
                        },
                        advance(now, first),
                    ),
                    None => (
                        Phase::Review {
                            ease,
                            current_interval,
                        },
                        advance(now, days(current_interval)),
                    ),
                }
            }
            Rating::Hard => {
                let ease = (ease * HARD_EASE_FACTOR).max(EASE_FLOOR);
                let raw = round_days(interval * config.hard_interval * config.interval_modifier)
                    .min(config.maximum_interval);
                let current_interval = self.fuzz(raw);

                (
                    Phase::Review {
                        ease,
                        current_interval,
                    },
                    advance(now, days(current_interval)),
                )
            }
            Rating::Good => {
                let overdue = days_overdue(due, now);
                let base = if overdue >= 1 {
                    interval + overdue as f64 / 2.0
                } else {
                    interval
                };
                let raw = round_days(base * ease * config.interval_modifier)
                    .min(config.maximum_interval);
                let current_interval = self.fuzz(raw);

                (
                    Phase::Review {
                        ease,
                        current_interval,
                    },
                    advance(now, days(current_interval)),
                )
            }
            Rating::Easy => {
                let overdue = days_overdue(due, now);
                let base = if overdue >= 1 {
                    interval + overdue as f64
                } else {
                    interval
                };
                let raw = round_days(base * ease * config.easy_bonus * config.interval_modifier)
                    .min(config.maximum_interval);
                let current_interval = self.fuzz(raw);

                (
                    Phase::Review {
                        ease: ease * EASY_EASE_FACTOR,
                        current_interval,
                    },
                    advance(now, days(current_interval)),
                )
            }
        }
    }

    fn review_relearning(
        &mut self,
        step: u32,
        ease: f64,
        current_interval: u32,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> (Phase, DateTime<Utc>) {
        let config = Arc::clone(&self.config);
        let steps = &config.relearning_steps;
        let idx = step as usize;
        let interval = f64::from(current_interval);

        // Card was scheduled under a config with more relearning steps
        if idx >= steps.len() {
            tracing::debug!(
                "Relearning step {} outside {} configured steps, graduating",
                step,
                steps.len()
            );
            let current_interval = round_days(interval * ease * config.interval_modifier)
                .min(config.maximum_interval);
            return (
                Phase::Review {
                    ease,
                    current_interval,
                },
                advance(now, days(current_interval)),
            );
        }

        let relearning = |step: u32| Phase::Relearning {
            step,
            ease,
            current_interval,
        };

        match rating {
            Rating::Again => (relearning(0), advance(now, steps[0])),
            Rating::Hard => (relearning(step), advance(now, hard_delay(steps, idx))),
            Rating::Good => {
                if idx + 1 == steps.len() {
                    let raw = round_days(interval * ease * config.interval_modifier)
                        .min(config.maximum_interval);
                    self.regraduate(ease, raw, now)
                } else {
                    (relearning(step + 1), advance(now, steps[idx + 1]))
                }
            }
            Rating::Easy => {
                let raw = round_days(interval * ease * config.easy_bonus * config.interval_modifier)
                    .min(config.maximum_interval);
                self.regraduate(ease, raw, now)
            }
        }
    }

    /// Return a relearning card to review with a fuzzed interval
    fn regraduate(
        &mut self,
        ease: f64,
        raw_interval: u32,
        now: DateTime<Utc>,
    ) -> (Phase, DateTime<Utc>) {
        let current_interval = self.fuzz(raw_interval);
        (
            Phase::Review {
                ease,
                current_interval,
            },
            advance(now, days(current_interval)),
        )
    }

    fn fuzz(&mut self, interval: u32) -> u32 {
        fuzz_interval(interval, self.config.maximum_interval, &mut self.rng)
    }
}

/// First graduation from learning: fresh ease, unfuzzed interval
fn graduate(config: &SchedulerConfig, interval: u32, now: DateTime<Utc>) -> (Phase, DateTime<Utc>) {
    (
        Phase::Review {
            ease: config.starting_ease,
            current_interval: interval,
        },
        advance(now, days(interval)),
    )
}

/// Delay for Hard on a (re)learning step
fn hard_delay(steps: &[Duration], idx: usize) -> Duration {
    match (idx, steps.len()) {
        (0, 1) => scale(steps[0], HARD_SINGLE_STEP_FACTOR),
        (0, _) => steps[0]
            .checked_add(&steps[1])
            .map(|total| total / 2)
            .unwrap_or(Duration::MAX),
        _ => steps[idx],
    }
}

fn scale(duration: Duration, factor: f64) -> Duration {
    let millis = (duration.num_milliseconds() as f64 * factor).round() as i64;
    Duration::try_milliseconds(millis).unwrap_or(Duration::MAX)
}

/// `now + delay`, saturating at the last representable instant
fn advance(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    now.checked_add_signed(delay).unwrap_or_else(|| {
        tracing::warn!("Due date {} + {} is out of range, saturating", now, delay);
        DateTime::<Utc>::MAX_UTC
    })
}

fn days(interval: u32) -> Duration {
    Duration::days(i64::from(interval))
}

/// Whole days elapsed since `due`, floored; zero when not yet due
fn days_overdue(due: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let elapsed = now - due;
    if elapsed <= Duration::zero() {
        0
    } else {
        elapsed.num_days()
    }
}
