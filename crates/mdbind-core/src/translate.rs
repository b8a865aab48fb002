// MouseDirectionBinder Motion Translator
// Horizontal deltas to directional key intents

use std::str::FromStr;
use std::time::{Duration, Instant};

use crate::key::Key;

pub const DEFAULT_DEAD_ZONE: f64 = 0.4;
pub const DEFAULT_IDLE_RELEASE: Duration = Duration::from_millis(120);

/// What happens to a held key when motion drops under the dead zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeadZonePolicy {
    /// Release at once.
    #[default]
    Release,
    /// Keep holding; the idle timeout releases it.
    HoldUntilIdle,
}

impl FromStr for DeadZonePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "release" => Ok(DeadZonePolicy::Release),
            "hold" | "hold_until_idle" => Ok(DeadZonePolicy::HoldUntilIdle),
            other => Err(format!("unknown dead zone policy '{}'", other)),
        }
    }
}

impl DeadZonePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            DeadZonePolicy::Release => "release",
            DeadZonePolicy::HoldUntilIdle => "hold",
        }
    }
}

/// Requested change to the synthesized output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyIntent {
    Press(Key),
    Release,
    /// Leave the output as it is.
    Keep,
}

/// Converts motion deltas into key intents and tracks the idle timer.
#[derive(Debug, Clone)]
pub struct MotionTranslator {
    left: Key,
    right: Key,
    dead_zone: f64,
    policy: DeadZonePolicy,
    last_motion: Option<Instant>,
}

impl MotionTranslator {
    pub fn new(left: Key, right: Key, dead_zone: f64, policy: DeadZonePolicy) -> Self {
        Self {
            left,
            right,
            dead_zone: dead_zone.abs(),
            policy,
            last_motion: None,
        }
    }

    /// Translate one horizontal delta.
    ///
    /// `gate` is the randomizer draw. It is only consulted for motion that
    /// clears the dead zone while translation is active.
    pub fn translate(
        &mut self,
        dx: f64,
        active: bool,
        now: Instant,
        gate: impl FnOnce() -> bool,
    ) -> KeyIntent {
        if !active {
            return KeyIntent::Release;
        }

        if !dx.is_finite() || dx.abs() < self.dead_zone {
            return match self.policy {
                DeadZonePolicy::Release => KeyIntent::Release,
                DeadZonePolicy::HoldUntilIdle => KeyIntent::Keep,
            };
        }

        self.last_motion = Some(now);
        if !gate() {
            return KeyIntent::Release;
        }

        if dx < 0.0 {
            KeyIntent::Press(self.left)
        } else {
            KeyIntent::Press(self.right)
        }
    }

    /// No qualifying motion for longer than `window`.
    pub fn idle_expired(&self, now: Instant, window: Duration) -> bool {
        match self.last_motion {
            Some(last) => now.saturating_duration_since(last) > window,
            None => true,
        }
    }

    /// Forget the last motion time.
    pub fn reset(&mut self) {
        self.last_motion = None;
    }
}

impl Default for MotionTranslator {
    fn default() -> Self {
        Self::new(Key::A, Key::D, DEFAULT_DEAD_ZONE, DeadZonePolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accept() -> bool {
        true
    }

    #[test]
    fn test_sign_selects_key() {
        let mut translator = MotionTranslator::default();
        let now = Instant::now();
        assert_eq!(translator.translate(-2.0, true, now, accept), KeyIntent::Press(Key::A));
        assert_eq!(translator.translate(2.0, true, now, accept), KeyIntent::Press(Key::D));
    }

    #[test]
    fn test_inactive_releases_without_drawing() {
        let mut translator = MotionTranslator::default();
        let intent = translator.translate(5.0, false, Instant::now(), || {
            panic!("randomizer consulted while inactive")
        });
        assert_eq!(intent, KeyIntent::Release);
        assert!(translator.idle_expired(Instant::now(), DEFAULT_IDLE_RELEASE));
    }

    #[test]
    fn test_dead_zone_policies() {
        let now = Instant::now();
        let mut release = MotionTranslator::default();
        assert_eq!(release.translate(0.3, true, now, accept), KeyIntent::Release);
        assert_eq!(release.translate(-0.39, true, now, accept), KeyIntent::Release);

        let mut hold = MotionTranslator::new(Key::A, Key::D, 0.4, DeadZonePolicy::HoldUntilIdle);
        assert_eq!(hold.translate(0.1, true, now, accept), KeyIntent::Keep);
        assert_eq!(hold.translate(0.4, true, now, accept), KeyIntent::Press(Key::D));
    }

    #[test]
    fn test_rejection_releases_but_counts_as_motion() {
        let mut translator = MotionTranslator::default();
        let now = Instant::now();
        assert_eq!(translator.translate(3.0, true, now, || false), KeyIntent::Release);
        assert!(!translator.idle_expired(now, DEFAULT_IDLE_RELEASE));
    }

    #[test]
    fn test_idle_window() {
        let mut translator = MotionTranslator::default();
        let start = Instant::now();
        translator.translate(1.0, true, start, accept);
        assert!(!translator.idle_expired(start + Duration::from_millis(100), DEFAULT_IDLE_RELEASE));
        assert!(translator.idle_expired(start + Duration::from_millis(121), DEFAULT_IDLE_RELEASE));
        translator.reset();
        assert!(translator.idle_expired(start, DEFAULT_IDLE_RELEASE));
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("release".parse(), Ok(DeadZonePolicy::Release));
        assert_eq!(" Hold ".parse(), Ok(DeadZonePolicy::HoldUntilIdle));
        assert!("sticky".parse::<DeadZonePolicy>().is_err());
    }
}
