//! Interval fuzzing.
//!
//! Review intervals are spread over a small band around the computed value
//! so cards introduced together do not keep falling due on the same day.
//! The band widens with the interval:
//! - 15% of the part between 2.5 and 7 days
//! - 10% of the part between 7 and 20 days
//! - 5% of the part beyond 20 days
//!
//! plus one day.

use rand::Rng;

/// Intervals below this many days are never fuzzed
const FUZZ_THRESHOLD: f64 = 2.5;

/// Smallest fuzzed interval
const MIN_FUZZED_INTERVAL: i64 = 2;

struct FuzzBand {
    start: f64,
    end: f64,
    factor: f64,
}

const FUZZ_BANDS: [FuzzBand; 3] = [
    FuzzBand {
        start: 2.5,
        end: 7.0,
        factor: 0.15,
    },
    FuzzBand {
        start: 7.0,
        end: 20.0,
        factor: 0.10,
    },
    FuzzBand {
        start: 20.0,
        end: f64::INFINITY,
        factor: 0.05,
    },
];

/// Round to whole days, ties to even
pub(crate) fn round_days(days: f64) -> u32 {
    days.round_ties_even() as u32
}

/// Inclusive bounds a fuzzed `interval` may land in
pub fn fuzz_range(interval: u32, maximum_interval: u32) -> (u32, u32) {
    let ivl = f64::from(interval);

    let delta = FUZZ_BANDS.iter().fold(1.0, |delta, band| {
        delta + band.factor * (ivl.min(band.end) - band.start).max(0.0)
    });

    let min_ivl = ((ivl - delta).round_ties_even() as i64).max(MIN_FUZZED_INTERVAL);
    let max_ivl = ((ivl + delta).round_ties_even() as i64).min(i64::from(maximum_interval));
    let min_ivl = min_ivl.min(max_ivl);

    (min_ivl as u32, max_ivl as u32)
}

/// Draw a fuzzed interval uniformly from [`fuzz_range`]
///
/// Intervals under 2.5 days are returned unchanged.
pub fn fuzz_interval<R: Rng + ?Sized>(interval: u32, maximum_interval: u32, rng: &mut R) -> u32 {
    if f64::from(interval) < FUZZ_THRESHOLD {
        return interval;
    }

    let (min_ivl, max_ivl) = fuzz_range(interval, maximum_interval);
    let fuzzed = rng.gen_range(min_ivl..=max_ivl).min(maximum_interval);

    tracing::trace!(
        "Fuzzed interval {} into {} (range {}..={})",
        interval,
        fuzzed,
        min_ivl,
        max_ivl
    );

    fuzzed
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Mcg128Xsl64;

    #[test]
    fn test_short_intervals_unchanged() {
        let mut rng = Mcg128Xsl64::seed_from_u64(1);
        for interval in 0..=2 {
            for _ in 0..20 {
                assert_eq!(fuzz_interval(interval, 36500, &mut rng), interval);
            }
        }
    }

    #[test]
    fn test_fuzz_range_bands() {
        // delta = 1 + 0.15 * 0.5
        assert_eq!(fuzz_range(3, 36500), (2, 4));
        // delta = 1 + 0.15 * 4.5 + 0.10 * 3
        assert_eq!(fuzz_range(10, 36500), (8, 12));
        // delta = 1 + 0.675 + 1.3 + 0.05 * 230
        assert_eq!(fuzz_range(250, 36500), (236, 264));
    }

    #[test]
    fn test_fuzz_range_respects_maximum() {
        assert_eq!(fuzz_range(100, 100), (93, 100));
        // Lower bound collapses onto the clamped upper bound
        assert_eq!(fuzz_range(5, 2), (2, 2));
    }

    #[test]
    fn test_fuzzed_interval_within_range() {
        let mut rng = Mcg128Xsl64::seed_from_u64(99);
        for interval in [3, 7, 19, 20, 64, 250, 1000, 36500] {
            let (lo, hi) = fuzz_range(interval, 36500);
            for _ in 0..200 {
                let fuzzed = fuzz_interval(interval, 36500, &mut rng);
                assert!(
                    (lo..=hi).contains(&fuzzed),
                    "{} fuzzed to {} outside {}..={}",
                    interval,
                    fuzzed,
                    lo,
                    hi
                );
            }
        }
    }

    #[test]
    fn test_fuzz_never_exceeds_maximum() {
        let mut rng = Mcg128Xsl64::seed_from_u64(5);
        for _ in 0..500 {
            assert!(fuzz_interval(60, 60, &mut rng) <= 60);
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = Mcg128Xsl64::seed_from_u64(2024);
        let mut b = Mcg128Xsl64::seed_from_u64(2024);

        let first: Vec<u32> = (0..50).map(|_| fuzz_interval(120, 36500, &mut a)).collect();
        let second: Vec<u32> = (0..50).map(|_| fuzz_interval(120, 36500, &mut b)).collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_round_days_ties_to_even() {
        assert_eq!(round_days(32.5), 32);
        assert_eq!(round_days(33.5), 34);
        assert_eq!(round_days(12.4), 12);
        assert_eq!(round_days(-1.0), 0);
    }
}
