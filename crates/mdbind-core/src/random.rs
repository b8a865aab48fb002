// MouseDirectionBinder Randomizer
// Probabilistic dampening of translated motion

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Accepts or rejects translated motion with a percentage drawn from a range.
///
/// Seeded once from OS entropy; not cryptographically strong.
#[derive(Debug, Clone)]
pub struct Randomizer {
    rng: SmallRng,
}

impl Default for Randomizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Randomizer {
    pub fn new() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }

    /// Deterministic generator for tests and replays.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Decide whether a motion event should be applied.
    ///
    /// Disabled always applies. Bounds are clamped to 0..=100 and swapped
    /// when inverted; a maximum of 0 always rejects. Otherwise a percent is
    /// drawn uniformly from the range and used as the acceptance probability.
    pub fn should_apply(&mut self, enabled: bool, min_percent: i32, max_percent: i32) -> bool {
        if !enabled {
            return true;
        }

        let mut minimum = min_percent.clamp(0, 100);
        let mut maximum = max_percent.clamp(0, 100);
        if maximum < minimum {
            std::mem::swap(&mut minimum, &mut maximum);
        }

        if maximum == 0 {
            return false;
        }

        let percent = self.rng.gen_range(minimum..=maximum);
        self.rng.gen_bool(f64::from(percent) / 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_always_applies() {
        let mut randomizer = Randomizer::with_seed(7);
        for _ in 0..200 {
            assert!(randomizer.should_apply(false, 0, 0));
        }
    }

    #[test]
    fn test_full_range_always_applies() {
        let mut randomizer = Randomizer::with_seed(7);
        for _ in 0..200 {
            assert!(randomizer.should_apply(true, 100, 100));
        }
    }

    #[test]
    fn test_zero_range_always_rejects() {
        let mut randomizer = Randomizer::with_seed(7);
        for _ in 0..200 {
            assert!(!randomizer.should_apply(true, 0, 0));
        }
    }

    #[test]
    fn test_out_of_range_bounds_are_clamped() {
        let mut randomizer = Randomizer::with_seed(11);
        for _ in 0..200 {
            assert!(randomizer.should_apply(true, 150, 300));
            assert!(!randomizer.should_apply(true, -20, -5));
        }
    }

    #[test]
    fn test_inverted_range_matches_ordered_rate() {
        let mut randomizer = Randomizer::with_seed(3);
        let trials = 4000;
        let accepted = (0..trials)
            .filter(|_| randomizer.should_apply(true, 60, 40))
            .count();
        let rate = accepted as f64 / trials as f64;
        assert!((0.4..0.6).contains(&rate), "rate was {rate}");
    }
}
