// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! Shared fixtures for the end-to-end scenario tests in this directory.

use num_complex::Complex32;
use waveguide_core::messages::Permissions;
use waveguide_core::source::{GainElement, Qth, Realtime, Source, SourceConfig, SourceInfo};

/// A real-time source that never runs dry: samples a fixed tone forever,
/// so a test can drive as many worker iterations as it likes without
/// racing an end-of-stream.
pub struct EndlessTone {
    info: SourceInfo,
    tone_hz: f64,
    phase: f64,
}

impl EndlessTone {
    pub fn new(samp_rate: u32, tone_hz: f64) -> Self {
        Self::with_permissions(samp_rate, tone_hz, Permissions::all())
    }

    pub fn with_permissions(samp_rate: u32, tone_hz: f64, permissions: Permissions) -> Self {
        Self {
            tone_hz,
            info: SourceInfo {
                permissions,
                nominal_samp_rate: samp_rate,
                effective_samp_rate: samp_rate,
                measured_samp_rate: samp_rate as f64,
                min_freq: 0.0,
                max_freq: samp_rate as f64 / 2.0,
                antenna: "RX".into(),
                seekable: false,
                gain_elements: vec![GainElement {
                    name: "LNA".into(),
                    value: 10.0,
                    min: 0.0,
                    max: 40.0,
                    step: 1.0,
                }],
                antennas: vec!["RX".into()],
                ..SourceInfo::default()
            },
            phase: 0.0,
        }
    }
}

impl Source for EndlessTone {
    fn info(&self) -> SourceInfo {
        self.info.clone()
    }

    fn realtime(&self) -> Realtime {
        Realtime::RealTime
    }

    fn read(&mut self, buf: &mut [Complex32]) -> Result<usize, String> {
        let step = std::f64::consts::TAU * self.tone_hz / self.info.effective_samp_rate as f64;
        for sample in buf.iter_mut() {
            *sample = Complex32::new(self.phase.cos() as f32, self.phase.sin() as f32);
            self.phase += step;
        }
        Ok(buf.len())
    }

    fn force_eos(&mut self) {}

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
}

pub fn endless_config() -> SourceConfig {
    SourceConfig {
        type_name: "endless-tone".into(),
        effective_samp_rate: 48_000,
        frequency: 100_000_000.0,
        lnb_freq: 0.0,
        antenna: "RX".into(),
        bandwidth: 48_000.0,
        ppm: 0.0,
        dc_remove: false,
        iq_reverse: false,
        agc: false,
        qth: Some(Qth {
            lat_deg: 52.0,
            lon_deg: 21.0,
            height_m: 100.0,
        }),
    }
}
