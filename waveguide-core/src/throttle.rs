// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! Real-time pacing for sources that can produce samples faster than they
//! should be consumed (spec §4.4), e.g. file replay. Tracks a sample
//! budget against a monotonic clock and sleeps off any surplus.

use std::time::{Duration, Instant};

pub struct Throttle {
    sample_rate: u32,
    start: Instant,
    samples_delivered: u64,
}

impl Throttle {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            start: Instant::now(),
            samples_delivered: 0,
        }
    }

    /// Reset the pacing clock, e.g. after a seek or a source restart.
    pub fn reset(&mut self) {
        self.start = Instant::now();
        self.samples_delivered = 0;
    }

    /// Account for `count` freshly delivered samples and block for
    /// whatever time is owed so that the long-run delivery rate matches
    /// `sample_rate`. Returns the duration actually slept.
    pub fn throttle(&mut self, count: usize) -> Duration {
        self.samples_delivered += count as u64;
        let owed = Duration::from_secs_f64(self.samples_delivered as f64 / self.sample_rate as f64);
        let elapsed = self.start.elapsed();
        if owed > elapsed {
            let deficit = owed - elapsed;
            std::thread::sleep(deficit);
            deficit
        } else {
            Duration::ZERO
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t1_throttle_sleeps_to_match_declared_rate() {
        let mut t = Throttle::new(1000);
        let start = Instant::now();
        // 500 samples at 1000 Hz should take ~500ms to "deliver" honestly.
        t.throttle(500);
        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[test]
    fn t2_reset_clears_accumulated_budget() {
        let mut t = Throttle::new(1_000_000);
        t.throttle(500_000);
        t.reset();
        let start = Instant::now();
        let slept = t.throttle(1);
        assert!(slept < Duration::from_millis(50));
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
