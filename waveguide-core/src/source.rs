// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! The `Source` trait contract and the source-info snapshot (spec §3, §6).
//! Concrete backends (SoapySDR, file replay, wav, remote) are named only
//! by this interface — the core never depends on a specific backend.

use serde::{Deserialize, Serialize};

use crate::messages::Permissions;

/// A gain element exposed by the backend (name + current/min/max/step).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GainElement {
    pub name: String,
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

/// Observer location, WGS-84.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Qth {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub height_m: f64,
}

/// Snapshot of source capabilities and current state (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    pub permissions: Permissions,
    pub nominal_samp_rate: u32,
    pub effective_samp_rate: u32,
    pub measured_samp_rate: f64,
    pub frequency: f64,
    pub min_freq: f64,
    pub max_freq: f64,
    pub lnb_freq: f64,
    pub bandwidth: f64,
    pub ppm: f64,
    pub antenna: String,
    pub dc_remove: bool,
    pub iq_reverse: bool,
    pub agc: bool,
    pub qth: Option<Qth>,
    pub source_time_unix: f64,
    pub seekable: bool,
    pub source_start_unix: Option<f64>,
    pub source_end_unix: Option<f64>,
    pub gain_elements: Vec<GainElement>,
    pub antennas: Vec<String>,
}

impl Default for SourceInfo {
    fn default() -> Self {
        Self {
            permissions: Permissions::NONE,
            nominal_samp_rate: 0,
            effective_samp_rate: 0,
            measured_samp_rate: 0.0,
            frequency: 0.0,
            min_freq: 0.0,
            max_freq: 0.0,
            lnb_freq: 0.0,
            bandwidth: 0.0,
            ppm: 0.0,
            antenna: String::new(),
            dc_remove: false,
            iq_reverse: false,
            agc: false,
            qth: None,
            source_time_unix: 0.0,
            seekable: false,
            source_start_unix: None,
            source_end_unix: None,
            gain_elements: Vec::new(),
            antennas: Vec::new(),
        }
    }
}

/// Configuration consumed at source construction (spec §6
/// "Source-config").
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub type_name: String,
    pub effective_samp_rate: u32,
    pub frequency: f64,
    pub lnb_freq: f64,
    pub antenna: String,
    pub bandwidth: f64,
    pub ppm: f64,
    pub dc_remove: bool,
    pub iq_reverse: bool,
    pub agc: bool,
    pub qth: Option<Qth>,
}

/// Whether the underlying backend produces samples in real time, and so
/// needs no throttling, or faster than real time and must be paced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Realtime {
    RealTime,
    NonRealTime,
}

/// The interface every radio-source backend implements. The core drives
/// this from the source-worker thread under the analyzer's loop-mutex; no
/// method here is expected to be reentrant.
pub trait Source: Send {
    fn info(&self) -> SourceInfo;

    fn realtime(&self) -> Realtime;

    /// Read up to `buf.len()` complex samples; returns the number read,
    /// or `Err` mapped to EOS/ReadError on the outbox (spec §7).
    fn read(&mut self, buf: &mut [num_complex::Complex32]) -> Result<usize, String>;

    /// Unblock a pending `read` from another thread, e.g. during halt.
    fn force_eos(&mut self);

    fn set_frequency(&mut self, freq_hz: f64) -> bool;
    fn set_gain(&mut self, name: &str, value: f64) -> bool;
    fn set_antenna(&mut self, name: &str) -> bool;
    fn set_bandwidth(&mut self, bandwidth_hz: f64) -> bool;
    fn set_ppm(&mut self, ppm: f64) -> bool;
    fn set_dc_remove(&mut self, enabled: bool) -> bool;
    fn set_iq_reverse(&mut self, enabled: bool) -> bool;
    fn set_agc(&mut self, enabled: bool) -> bool;

    /// Seek to an absolute source time, for seekable (replay) sources.
    fn seek(&mut self, unix_seconds: f64) -> bool {
        let _ = unix_seconds;
        false
    }
}
