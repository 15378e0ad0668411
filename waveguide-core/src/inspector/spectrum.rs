// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! Spectrum-source class trait and registry (spec §4.9 "Spectrum loop").
//! Concrete classes (FM spectrum, cyclostationary, ...) are out of scope;
//! this crate supplies the contract plus the built-in instantaneous-power
//! spectrum used directly by frequency-domain inspectors, and one toy
//! time-domain class under `testkit`.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use num_complex::Complex32;
use rustfft::FftPlanner;

/// Whether a spectrum source operates on raw time-domain samples or
/// expects to be driven with a precomputed FFT.
pub enum SpectrumDomain {
    Time,
    Frequency,
}

pub trait SpectrumSourceClass: Send + Sync {
    fn name(&self) -> &str;
    fn domain(&self) -> SpectrumDomain;

    /// Time-domain classes consume samples directly and emit internally
    /// via their own callback (spec §4.9); this returns the spectrum if
    /// one became ready this call.
    fn feed(&self, samples: &[Complex32]) -> Option<Vec<f32>>;
}

fn registry() -> &'static RwLock<HashMap<String, Arc<dyn SpectrumSourceClass>>> {
    static REGISTRY: OnceLock<RwLock<HashMap<String, Arc<dyn SpectrumSourceClass>>>> =
        OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

pub fn register_spectrum_class(class: Arc<dyn SpectrumSourceClass>) {
    registry().write().unwrap().insert(class.name().to_string(), class);
}

pub fn lookup_spectrum_class(name: &str) -> Option<Arc<dyn SpectrumSourceClass>> {
    registry().read().unwrap().get(name).cloned()
}

/// Sorted for a stable index-to-name mapping, mirroring
/// `estimator_class_names` (`Spectrum { index, .. }` addresses
/// `spectrum_sources` positionally).
pub fn spectrum_class_names() -> Vec<String> {
    let mut names: Vec<String> = registry().read().unwrap().keys().cloned().collect();
    names.sort();
    names
}

/// A live spectrum source attached to one inspector.
pub struct SpectrumSourceInstance {
    pub class: Arc<dyn SpectrumSourceClass>,
}

impl SpectrumSourceInstance {
    pub fn new(class: Arc<dyn SpectrumSourceClass>) -> Self {
        Self { class }
    }
}

/// Instantaneous power spectrum, `(8/3)/fft_size * |X[k]|^2` (spec
/// §4.9), used directly for frequency-domain inspectors rather than
/// through the spectrum-source-class contract.
pub fn instantaneous_power_spectrum(samples: &[Complex32], fft_size: usize) -> Vec<f32> {
    let mut buf: Vec<rustfft::num_complex::Complex<f32>> = samples
        .iter()
        .take(fft_size)
        .map(|c| rustfft::num_complex::Complex::new(c.re, c.im))
        .collect();
    buf.resize(fft_size, rustfft::num_complex::Complex::new(0.0, 0.0));

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(fft_size);
    fft.process(&mut buf);

    let scale = 8.0 / 3.0 / fft_size as f32;
    buf.iter().map(|c| scale * (c.re * c.re + c.im * c.im)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_spectrum_has_expected_length() {
        let samples = vec![Complex32::new(1.0, 0.0); 64];
        let psd = instantaneous_power_spectrum(&samples, 64);
        assert_eq!(psd.len(), 64);
    }

    #[test]
    fn dc_input_concentrates_energy_in_bin_zero() {
        let samples = vec![Complex32::new(1.0, 0.0); 64];
        let psd = instantaneous_power_spectrum(&samples, 64);
        let bin0 = psd[0];
        let total: f32 = psd.iter().sum();
        assert!(bin0 / total > 0.9);
    }
}
