// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capped exponential backoff used by every retrying component.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff schedule: `initial * multiplier^attempt`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            multiplier: 2.0,
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(63) as i32);
        let millis = self.initial.as_millis() as f64 * factor;
        let capped = millis.min(self.max.as_millis() as f64);
        if !capped.is_finite() || capped < 0.0 {
            return self.max;
        }
        Duration::from_millis(capped as u64)
    }

    /// [`Backoff::delay`] with up to 25% subtracted at random, so that many
    /// subjects failing together do not retry in lockstep.
    pub fn delay_with_jitter(&self, attempt: u32) -> Duration {
        let base = self.delay(attempt);
        let spread = base.as_millis() as u64 / 4;
        if spread == 0 {
            return base;
        }
        let cut = rand::thread_rng().gen_range(0..=spread);
        base - Duration::from_millis(cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn doubles_until_cap() {
        let backoff = Backoff::new(Duration::from_millis(500), Duration::from_secs(3));
        assert_eq!(backoff.delay(0), Duration::from_millis(500));
        assert_eq!(backoff.delay(1), Duration::from_millis(1000));
        assert_eq!(backoff.delay(2), Duration::from_millis(2000));
        assert_eq!(backoff.delay(3), Duration::from_secs(3));
        assert_eq!(backoff.delay(40), Duration::from_secs(3));
    }

    proptest! {
        #[test]
        fn delay_never_exceeds_max(initial in 1u64..10_000, max in 1u64..100_000, attempt in 0u32..200) {
            let backoff = Backoff::new(Duration::from_millis(initial), Duration::from_millis(max));
            prop_assert!(backoff.delay(attempt) <= Duration::from_millis(max));
        }

        #[test]
        fn delay_is_monotonic(initial in 1u64..10_000, attempt in 0u32..100) {
            let backoff = Backoff::new(Duration::from_millis(initial), Duration::from_secs(3600));
            prop_assert!(backoff.delay(attempt) <= backoff.delay(attempt + 1));
        }

        #[test]
        fn jitter_stays_within_quarter(attempt in 0u32..20) {
            let backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(60));
            let base = backoff.delay(attempt);
            let jittered = backoff.delay_with_jitter(attempt);
            prop_assert!(jittered <= base);
            prop_assert!(jittered >= base - base / 4 - Duration::from_millis(1));
        }
    }
}
