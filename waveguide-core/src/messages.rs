// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! Message catalog exchanged between the analyzer and its clients (spec
//! §6). Payloads are plain `serde`-derived structs so a remote-analyzer
//! collaborator (out of scope here) can serialize them without this
//! crate knowing anything about the wire format.

use serde::{Deserialize, Serialize};

use crate::source::SourceInfo;

/// Bit positions gating client-initiated operations (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Permission {
    Halt = 0,
    SetFreq = 1,
    SetGain = 2,
    SetAntenna = 3,
    SetBandwidth = 4,
    SetPpm = 5,
    SetDcRemove = 6,
    SetIqReverse = 7,
    SetAgc = 8,
    OpenAudio = 9,
    OpenRaw = 10,
    OpenInspector = 11,
    SetFftSize = 12,
    SetFftFps = 13,
    SetFftWindow = 14,
    Seek = 15,
    Throttle = 16,
    SetBbFilter = 17,
}

/// A bitset of granted permissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions(pub u32);

impl Permissions {
    pub const NONE: Permissions = Permissions(0);

    pub fn all() -> Self {
        Permissions(u32::MAX)
    }

    pub fn with(mut self, p: Permission) -> Self {
        self.0 |= 1 << (p as u32);
        self
    }

    pub fn has(&self, p: Permission) -> bool {
        self.0 & (1 << (p as u32)) != 0
    }
}

/// Numeric mailbox tags for each top-level message kind (spec §6
/// "Message tag catalog"), used to route `Mailbox::read_of_type` calls.
pub mod tag {
    pub const SOURCE_INFO: u32 = 1;
    pub const SOURCE_INIT: u32 = 2;
    pub const CHANNEL: u32 = 3;
    pub const EOS: u32 = 4;
    pub const READ_ERROR: u32 = 5;
    pub const INTERNAL: u32 = 6;
    pub const SAMPLES_LOST: u32 = 7;
    pub const INSPECTOR: u32 = 8;
    pub const PSD: u32 = 9;
    pub const SAMPLES: u32 = 10;
    pub const THROTTLE: u32 = 11;
    pub const PARAMS: u32 = 12;
    pub const GET_PARAMS: u32 = 13;
    pub const HALT: u32 = 14;
}

/// Top-level message tag (spec §6 "Message tag catalog").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    SourceInfo(SourceInfo),
    SourceInit(SourceInit),
    Channel(Vec<ChannelDescriptor>),
    Eos { code: i32, error: String },
    ReadError { code: i32, error: String },
    Internal { level: LogLevel, text: String },
    SamplesLost,
    Inspector(InspectorMessage),
    Psd(PsdFrame),
    Samples {
        inspector_id: u32,
        samples: Vec<(f32, f32)>,
    },
    Throttle { samp_rate: u32 },
    Params(AnalyzerParams),
    GetParams,
    Halt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInit {
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    pub fc: f64,
    pub bandwidth: f64,
    pub snr: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PsdFrame {
    pub fc: f64,
    pub samp_rate: u32,
    pub measured_samp_rate: f64,
    pub n0: f32,
    pub psd: Vec<f32>,
}

/// Analyzer-wide configurable parameters (spec §3 "Analyzer parameters").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AnalyzerMode {
    Channel,
    WideSpectrum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerParams {
    pub mode: AnalyzerMode,
    pub window_size: usize,
    pub window_function: WindowFunction,
    pub samp_rate: u32,
    pub decimation: u32,
    pub alpha: f32,
    pub channel_update_interval: f64,
    pub psd_update_interval: f64,
    pub min_freq: f64,
    pub max_freq: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WindowFunction {
    Rectangular,
    Hamming,
    Hann,
    BlackmanHarris,
}

impl Default for AnalyzerParams {
    fn default() -> Self {
        Self {
            mode: AnalyzerMode::Channel,
            window_size: 4096,
            window_function: WindowFunction::Hamming,
            samp_rate: 1_000_000,
            decimation: 1,
            alpha: 0.2,
            channel_update_interval: 1.0,
            psd_update_interval: 0.04,
            min_freq: 0.0,
            max_freq: 0.0,
        }
    }
}

/// Inspector sub-tag (`Kind`), spec §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InspectorMessage {
    Open(OpenRequest),
    OpenResponse(OpenResponse),
    SetId { handle: u64, id: u32 },
    GetConfig { handle: u64 },
    SetConfig { handle: u64, config: Vec<u8> },
    Estimator { handle: u64, index: usize, enabled: bool },
    Spectrum { handle: u64, index: usize },
    ResetEqualizer { handle: u64 },
    Close { handle: u64 },
    SetFreq { handle: u64, freq: f64 },
    SetBandwidth { handle: u64, bandwidth: f64 },
    SetWatermark { handle: u64, watermark: usize },
    SetTle { handle: u64, line1: String, line2: String },
    ClearTle { handle: u64 },
    OrbitReport { handle: u64, delta_hz: f64 },
    Signal { handle: u64, index: usize, value: f32 },
    Spectrogram { handle: u64, index: usize, psd: Vec<f32> },
    WrongHandle,
    WrongObject,
    InvalidArgument(String),
    WrongKind,
    InvalidChannel(String),
    InvalidCorrection(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRequest {
    pub class: String,
    pub fc: f64,
    pub bandwidth: f64,
    pub precise: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenResponse {
    pub handle: u64,
    pub fs: u32,
    pub equiv_fs: f64,
    pub bandwidth: f64,
    pub lo: f64,
    pub ft: f64,
    pub estimator_classes: Vec<String>,
    pub spectsrc_classes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_bits_are_independent() {
        let perms = Permissions::NONE.with(Permission::SetFreq).with(Permission::Seek);
        assert!(perms.has(Permission::SetFreq));
        assert!(perms.has(Permission::Seek));
        assert!(!perms.has(Permission::SetGain));
    }
}
