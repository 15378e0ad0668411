// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! Toy backends used by this crate's own tests and available to
//! downstream integration tests under the `testkit` feature: a
//! synthetic `Source`, an inspector class that passes samples straight
//! to the ring, a magnitude estimator, and a time-domain averaging
//! spectrum source.

use std::sync::Arc;

use num_complex::Complex32;

use crate::inspector::estimator::EstimatorClass;
use crate::inspector::instance::InspectorClassInstance;
use crate::inspector::spectrum::{SpectrumDomain, SpectrumSourceClass};
use crate::inspector::SamplerRing;
use crate::messages::Permissions;
use crate::source::{GainElement, Realtime, Source, SourceInfo};

/// A deterministic tone-plus-noise generator, seekable and of bounded
/// length, standing in for a file-replay backend in tests.
pub struct ToneSource {
    info: SourceInfo,
    tone_hz: f64,
    phase: f64,
    total_samples: u64,
    delivered: u64,
}

impl ToneSource {
    pub fn new(samp_rate: u32, tone_hz: f64, duration_secs: f64) -> Self {
        let total_samples = (samp_rate as f64 * duration_secs) as u64;
        Self {
            info: SourceInfo {
                permissions: Permissions::all(),
                nominal_samp_rate: samp_rate,
                effective_samp_rate: samp_rate,
                measured_samp_rate: samp_rate as f64,
                min_freq: 0.0,
                max_freq: samp_rate as f64 / 2.0,
                antenna: "RX".into(),
                seekable: true,
                source_start_unix: Some(0.0),
                source_end_unix: Some(duration_secs),
                gain_elements: vec![GainElement {
                    name: "LNA".into(),
                    value: 20.0,
                    min: 0.0,
                    max: 40.0,
                    step: 1.0,
                }],
                antennas: vec!["RX".into()],
                ..SourceInfo::default()
            },
            tone_hz,
            phase: 0.0,
            total_samples,
            delivered: 0,
        }
    }
}

impl Source for ToneSource {
    fn info(&self) -> SourceInfo {
        self.info.clone()
    }

    fn realtime(&self) -> Realtime {
        Realtime::NonRealTime
    }

    fn read(&mut self, buf: &mut [Complex32]) -> Result<usize, String> {
        let remaining = self.total_samples.saturating_sub(self.delivered) as usize;
        let n = buf.len().min(remaining);
        let step = std::f64::consts::TAU * self.tone_hz / self.info.effective_samp_rate as f64;
        for sample in buf.iter_mut().take(n) {
            *sample = Complex32::new(self.phase.cos() as f32, self.phase.sin() as f32);
            self.phase += step;
        }
        self.delivered += n as u64;
        Ok(n)
    }

    fn force_eos(&mut self) {
        self.delivered = self.total_samples;
    }

    fn set_frequency(&mut self, freq_hz: f64) -> bool {
        self.info.frequency = freq_hz;
        true
    }

    fn set_gain(&mut self, name: &str, value: f64) -> bool {
        self.info
            .gain_elements
            .iter_mut()
            .find(|g| g.name == name)
            .map(|g| g.value = value)
            .is_some()
    }

    fn set_antenna(&mut self, name: &str) -> bool {
        self.info.antennas.iter().any(|a| a == name)
    }

    fn set_bandwidth(&mut self, bandwidth_hz: f64) -> bool {
        self.info.bandwidth = bandwidth_hz;
        true
    }

    fn set_ppm(&mut self, ppm: f64) -> bool {
        self.info.ppm = ppm;
        true
    }

    fn set_dc_remove(&mut self, enabled: bool) -> bool {
        self.info.dc_remove = enabled;
        true
    }

    fn set_iq_reverse(&mut self, enabled: bool) -> bool {
        self.info.iq_reverse = enabled;
        true
    }

    fn set_agc(&mut self, enabled: bool) -> bool {
        self.info.agc = enabled;
        true
    }

    fn seek(&mut self, unix_seconds: f64) -> bool {
        if unix_seconds < 0.0 || unix_seconds > self.total_samples as f64 / self.info.effective_samp_rate as f64 {
            return false;
        }
        self.delivered = (unix_seconds * self.info.effective_samp_rate as f64) as u64;
        true
    }
}

/// Passes every incoming sample straight into the sampler ring,
/// untouched (the simplest possible `InspectorClassInstance`).
pub struct PassthroughClass;

impl InspectorClassInstance for PassthroughClass {
    fn feed(&mut self, input: &[Complex32], ring: &mut SamplerRing) {
        for &sample in input {
            if ring.avail() == 0 {
                break;
            }
            ring.push(sample);
        }
    }
}

/// Reports the RMS magnitude of each fed buffer.
pub struct MagnitudeEstimator;

impl EstimatorClass for MagnitudeEstimator {
    fn name(&self) -> &str {
        "magnitude"
    }

    fn feed(&self, samples: &[Complex32]) -> Option<f32> {
        if samples.is_empty() {
            return None;
        }
        let sum_sq: f32 = samples.iter().map(|c| c.re * c.re + c.im * c.im).sum();
        Some((sum_sq / samples.len() as f32).sqrt())
    }
}

/// A toy time-domain spectrum source that reports a running average
/// power level instead of a full FFT, exercising the `Time` domain path
/// of the spectrum-source contract.
pub struct AveragePowerSpectrum;

impl SpectrumSourceClass for AveragePowerSpectrum {
    fn name(&self) -> &str {
        "average-power"
    }

    fn domain(&self) -> SpectrumDomain {
        SpectrumDomain::Time
    }

    fn feed(&self, samples: &[Complex32]) -> Option<Vec<f32>> {
        if samples.is_empty() {
            return None;
        }
        let avg: f32 = samples.iter().map(|c| c.re * c.re + c.im * c.im).sum::<f32>() / samples.len() as f32;
        Some(vec![avg])
    }
}

/// Register the toy estimator and spectrum-source classes with the
/// process-global registries, for tests that exercise the command
/// server's class-name listings.
pub fn register_toy_classes() {
    crate::inspector::estimator::register_estimator_class(Arc::new(MagnitudeEstimator));
    crate::inspector::spectrum::register_spectrum_class(Arc::new(AveragePowerSpectrum));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_source_reports_correct_duration() {
        let mut source = ToneSource::new(1000, 50.0, 2.0);
        let mut buf = vec![Complex32::new(0.0, 0.0); 4096];
        let mut total = 0;
        loop {
            let n = source.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            total += n;
        }
        assert_eq!(total, 2000);
    }

    #[test]
    fn seek_moves_playback_position() {
        let mut source = ToneSource::new(1000, 50.0, 2.0);
        assert!(source.seek(1.0));
        let mut buf = vec![Complex32::new(0.0, 0.0); 500];
        let n = source.read(&mut buf).unwrap();
        assert_eq!(n, 500);
        assert!(!source.seek(10.0));
    }

    #[test]
    fn magnitude_estimator_reports_rms() {
        let samples = vec![Complex32::new(3.0, 4.0); 10];
        let value = MagnitudeEstimator.feed(&samples).unwrap();
        assert!((value - 5.0).abs() < 1e-5);
    }
}
