// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! Wide-spectrum frequency hopping (spec §4.10 "Wide-spectrum variant").

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopStrategy {
    Stochastic,
    Progressive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partitioning {
    Discrete,
    Continuous,
}

pub struct HopState {
    pub min_freq: f64,
    pub max_freq: f64,
    pub samp_rate: f64,
    pub rel_bw: f64,
    pub strategy: HopStrategy,
    pub partitioning: Partitioning,
    k: u64,
}

impl HopState {
    pub fn new(
        min_freq: f64,
        max_freq: f64,
        samp_rate: f64,
        rel_bw: f64,
        strategy: HopStrategy,
        partitioning: Partitioning,
    ) -> Self {
        Self {
            min_freq,
            max_freq,
            samp_rate,
            rel_bw,
            strategy,
            partitioning,
            k: 0,
        }
    }

    fn partition_bw(&self) -> f64 {
        let base = self.samp_rate * self.rel_bw;
        match self.partitioning {
            Partitioning::Discrete => base,
            Partitioning::Continuous => {
                let jitter = rand::thread_rng().gen_range(-0.05..0.05);
                base * (1.0 + jitter)
            }
        }
    }

    /// Compute the next center frequency to hop to.
    pub fn next(&mut self) -> f64 {
        let partition_bw = self.partition_bw();
        match self.strategy {
            HopStrategy::Stochastic => {
                let u: f64 = rand::thread_rng().gen_range(0.0..1.0);
                let span = self.max_freq - self.min_freq;
                self.min_freq + (u * span / partition_bw).floor() * partition_bw
            }
            HopStrategy::Progressive => {
                let candidate = self.min_freq + self.k as f64 * partition_bw;
                if candidate > self.max_freq + 1e-6 {
                    self.k = 0;
                    self.min_freq
                } else {
                    self.k += 1;
                    candidate
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progressive_discrete_hops_in_fixed_steps_with_boundary_wrap() {
        let mut hop = HopState::new(
            100e6,
            200e6,
            20e6,
            0.5,
            HopStrategy::Progressive,
            Partitioning::Discrete,
        );
        let mut seen = Vec::new();
        for _ in 0..13 {
            seen.push(hop.next());
        }
        let expected: Vec<f64> = vec![
            100e6, 110e6, 120e6, 130e6, 140e6, 150e6, 160e6, 170e6, 180e6, 190e6, 200e6, 100e6,
            110e6,
        ];
        for (got, want) in seen.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1.0, "got {got}, want {want}");
        }
    }

    #[test]
    fn stochastic_hops_stay_within_band() {
        let mut hop = HopState::new(
            100e6,
            200e6,
            20e6,
            0.5,
            HopStrategy::Stochastic,
            Partitioning::Discrete,
        );
        for _ in 0..50 {
            let f = hop.next();
            assert!(f >= 100e6 - 1.0 && f < 200e6 + 10e6);
        }
    }
}
