// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for waveguide-server.
//!
//! Default search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `./waveguide-server.toml`
//! 3. `~/.config/waveguide/waveguide-server.toml`
//! 4. `/etc/waveguide/waveguide-server.toml`

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use waveguide_core::messages::{AnalyzerMode, AnalyzerParams, WindowFunction};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config file {0}: {1}")]
    ParseError(PathBuf, String),
}

/// Trait for loading configuration files with default paths.
pub trait ConfigFile: Sized + Default + DeserializeOwned {
    /// Config filename (e.g., "waveguide-server.toml")
    fn config_filename() -> &'static str;

    /// Load config from a specific file path.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;
        toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))
    }

    /// Search default paths and load the first one found.
    /// Returns `(Default::default(), None)` if none exist.
    fn load_from_default_paths() -> Result<(Self, Option<PathBuf>), ConfigError> {
        for path in Self::default_search_paths() {
            if path.exists() {
                let cfg = Self::load_from_file(&path)?;
                return Ok((cfg, Some(path)));
            }
        }
        Ok((Self::default(), None))
    }

    /// Default search paths (current dir -> XDG -> /etc).
    fn default_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(Self::config_filename())];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("waveguide").join(Self::config_filename()));
        }
        paths.push(PathBuf::from("/etc/waveguide").join(Self::config_filename()));
        paths
    }
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
    /// Receiver latitude (decimal degrees, WGS84), used for ground-track corrections.
    pub latitude: Option<f64>,
    /// Receiver longitude (decimal degrees, WGS84).
    pub longitude: Option<f64>,
}

/// Source backend selection and construction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSpec {
    /// Source backend name. Only "demo" (a synthetic tone generator) is
    /// built in; see spec.md Non-goals re: real SDR backends.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Sample rate of the generated/captured stream (Hz).
    pub samp_rate: u32,
    /// Tone frequency for the demo source (Hz, baseband).
    pub tone_hz: f64,
    /// Demo source playback length (seconds). Ignored by other sources.
    pub duration_secs: f64,
    /// Initial tuned frequency reported in source info (Hz).
    pub frequency: f64,
    /// Initial bandwidth reported in source info (Hz).
    pub bandwidth: f64,
}

impl Default for SourceSpec {
    fn default() -> Self {
        Self {
            type_name: "demo".to_string(),
            samp_rate: 1_000_000,
            tone_hz: 100_000.0,
            duration_secs: 60.0,
            frequency: 100_000_000.0,
            bandwidth: 200_000.0,
        }
    }
}

/// Analyzer detector configuration (spec.md §6 `AnalyzerParams`, flattened
/// to string-friendly TOML fields).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// "channel" or "wide-spectrum".
    pub mode: String,
    /// FFT / detector window size in samples.
    pub window_size: usize,
    /// "rectangular", "hamming", "hann", or "blackman-harris".
    pub window_function: String,
    /// Channelizer decimation factor.
    pub decimation: u32,
    /// Estimator smoothing factor in range (0, 1].
    pub alpha: f32,
    /// Minimum interval between channel list updates, in seconds.
    pub channel_update_interval: f64,
    /// Minimum interval between PSD frames, in seconds.
    pub psd_update_interval: f64,
    /// Wide-spectrum sweep lower bound (Hz). Ignored in channel mode.
    pub min_freq: f64,
    /// Wide-spectrum sweep upper bound (Hz). Ignored in channel mode.
    pub max_freq: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        let defaults = AnalyzerParams::default();
        Self {
            mode: "channel".to_string(),
            window_size: defaults.window_size,
            window_function: "hamming".to_string(),
            decimation: defaults.decimation,
            alpha: defaults.alpha,
            channel_update_interval: defaults.channel_update_interval,
            psd_update_interval: defaults.psd_update_interval,
            min_freq: defaults.min_freq,
            max_freq: defaults.max_freq,
        }
    }
}

impl AnalyzerConfig {
    pub fn to_params(&self, samp_rate: u32) -> Result<AnalyzerParams, String> {
        let mode = match self.mode.as_str() {
            "channel" => AnalyzerMode::Channel,
            "wide-spectrum" => AnalyzerMode::WideSpectrum,
            other => return Err(format!("[analyzer].mode '{other}' is invalid (expected 'channel' or 'wide-spectrum')")),
        };
        let window_function = match self.window_function.as_str() {
            "rectangular" => WindowFunction::Rectangular,
            "hamming" => WindowFunction::Hamming,
            "hann" => WindowFunction::Hann,
            "blackman-harris" => WindowFunction::BlackmanHarris,
            other => {
                return Err(format!(
                    "[analyzer].window_function '{other}' is invalid (expected 'rectangular', 'hamming', 'hann', or 'blackman-harris')"
                ))
            }
        };
        if self.window_size == 0 {
            return Err("[analyzer].window_size must be > 0".to_string());
        }
        if self.decimation == 0 {
            return Err("[analyzer].decimation must be > 0".to_string());
        }
        Ok(AnalyzerParams {
            mode,
            window_size: self.window_size,
            window_function,
            samp_rate,
            decimation: self.decimation,
            alpha: self.alpha,
            channel_update_interval: self.channel_update_interval,
            psd_update_interval: self.psd_update_interval,
            min_freq: self.min_freq,
            max_freq: self.max_freq,
        })
    }
}

/// Reserved for the remote-analyzer transport (spec.md §1 Non-goals). The
/// field exists so a config file can name the setting, but enabling it is
/// rejected at validation time, the way the teacher rejects an unknown
/// `[rig.access]` type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub enabled: bool,
}

/// Top-level server configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub general: GeneralConfig,
    pub source: SourceSpec,
    pub analyzer: AnalyzerConfig,
    pub listen: ListenConfig,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.listen.enabled {
            return Err(
                "[listen].enabled is reserved; the remote-analyzer transport is not implemented"
                    .to_string(),
            );
        }
        if let Some(lat) = self.general.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                return Err("[general].latitude must be in range -90..=90".to_string());
            }
        }
        if let Some(lon) = self.general.longitude {
            if !(-180.0..=180.0).contains(&lon) {
                return Err("[general].longitude must be in range -180..=180".to_string());
            }
        }
        if self.general.latitude.is_some() != self.general.longitude.is_some() {
            return Err(
                "[general].latitude and [general].longitude must be set together or both omitted"
                    .to_string(),
            );
        }
        if self.source.samp_rate == 0 {
            return Err("[source].samp_rate must be > 0".to_string());
        }
        self.analyzer.to_params(self.source.samp_rate)?;
        Ok(())
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        <Self as ConfigFile>::load_from_file(path)
    }

    /// Load configuration from the default search paths.
    pub fn load_from_default_paths() -> Result<(Self, Option<PathBuf>), ConfigError> {
        <Self as ConfigFile>::load_from_default_paths()
    }

    /// Generate an example configuration, for `--print-config`.
    pub fn example_toml() -> String {
        let example = ServerConfig {
            general: GeneralConfig {
                log_level: Some("info".to_string()),
                latitude: Some(52.2297),
                longitude: Some(21.0122),
            },
            source: SourceSpec::default(),
            analyzer: AnalyzerConfig::default(),
            listen: ListenConfig::default(),
        };
        toml::to_string_pretty(&example).unwrap_or_default()
    }
}

impl ConfigFile for ServerConfig {
    fn config_filename() -> &'static str {
        "waveguide-server.toml"
    }
}
