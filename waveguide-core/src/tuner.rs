// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! Spectral tuner: partitions the full-rate baseband into narrow,
//! decimated, independently tunable sub-channels (spec §4.6, GLOSSARY
//! "Channelizer"). Each sub-channel mixes its slice of spectrum to
//! baseband, decimates, and low-pass filters, mirroring the teacher's
//! per-channel DSP chain (`ChannelDsp`) but without any demodulation
//! stage — extracting symbols/tones/audio from the decimated stream is
//! out of scope (spec.md §1).

use num_complex::Complex32;
use std::f32::consts::PI;

/// One tunable sub-channel: a numerically-controlled oscillator mixer
/// plus an integrate-and-dump decimator. Filtering beyond the implicit
/// boxcar lowpass of decimation is a DSP-block concern out of this
/// core's scope.
pub struct SubChannel {
    /// Sub-channel center frequency relative to baseband center, in Hz.
    offset_hz: f64,
    samp_rate: f64,
    decimation: u32,
    phase: f32,
    phase_inc: f32,
    accum: Complex32,
    accum_count: u32,
}

impl SubChannel {
    pub fn new(offset_hz: f64, samp_rate: f64, decimation: u32) -> Self {
        let phase_inc = (2.0 * PI as f64 * offset_hz / samp_rate) as f32;
        Self {
            offset_hz,
            samp_rate,
            decimation: decimation.max(1),
            phase: 0.0,
            phase_inc,
            accum: Complex32::new(0.0, 0.0),
            accum_count: 0,
        }
    }

    pub fn retune(&mut self, offset_hz: f64) {
        self.offset_hz = offset_hz;
        self.phase_inc = (2.0 * PI as f64 * offset_hz / self.samp_rate) as f32;
    }

    pub fn set_decimation(&mut self, decimation: u32) {
        self.decimation = decimation.max(1);
        self.accum = Complex32::new(0.0, 0.0);
        self.accum_count = 0;
    }

    pub fn offset_hz(&self) -> f64 {
        self.offset_hz
    }

    pub fn equiv_samp_rate(&self) -> f64 {
        self.samp_rate / self.decimation as f64
    }

    /// Mix and decimate `input`, appending decimated samples to `out`.
    /// Returns the number of output samples produced.
    pub fn process(&mut self, input: &[Complex32], out: &mut Vec<Complex32>) -> usize {
        let mut produced = 0;
        for &sample in input {
            let osc = Complex32::new(self.phase.cos(), -self.phase.sin());
            self.phase += self.phase_inc;
            if self.phase > PI {
                self.phase -= 2.0 * PI;
            } else if self.phase < -PI {
                self.phase += 2.0 * PI;
            }

            self.accum += sample * osc;
            self.accum_count += 1;
            if self.accum_count == self.decimation {
                out.push(self.accum / self.decimation as f32);
                self.accum = Complex32::new(0.0, 0.0);
                self.accum_count = 0;
                produced += 1;
            }
        }
        produced
    }
}

/// A tuner instance multiplexing several sub-channels over one baseband
/// stream. The factory (spec §4.6) feeds this from the source loop and
/// routes each sub-channel's decimated output to its owning inspector.
pub struct SpectralTuner {
    samp_rate: f64,
    channels: Vec<(u32, SubChannel)>,
    next_id: u32,
}

impl SpectralTuner {
    pub fn new(samp_rate: f64) -> Self {
        Self {
            samp_rate,
            channels: Vec::new(),
            next_id: 1,
        }
    }

    pub fn open_channel(&mut self, offset_hz: f64, decimation: u32) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.channels
            .push((id, SubChannel::new(offset_hz, self.samp_rate, decimation)));
        id
    }

    pub fn close_channel(&mut self, id: u32) {
        self.channels.retain(|(cid, _)| *cid != id);
    }

    pub fn channel_mut(&mut self, id: u32) -> Option<&mut SubChannel> {
        self.channels.iter_mut().find(|(cid, _)| *cid == id).map(|(_, c)| c)
    }

    /// Feed one baseband buffer through every open sub-channel, calling
    /// `on_data(channel_id, samples)` for each channel that produced
    /// output. Returns whether any channel produced new data (the
    /// analyzer uses this to decide whether to force a scheduler sync).
    pub fn feed<F: FnMut(u32, &[Complex32])>(&mut self, input: &[Complex32], mut on_data: F) -> bool {
        let mut any = false;
        let mut scratch = Vec::new();
        for (id, channel) in &mut self.channels {
            scratch.clear();
            if channel.process(input, &mut scratch) > 0 {
                on_data(*id, &scratch);
                any = true;
            }
        }
        any
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseband_carrier_mixed_to_dc_decimates_cleanly() {
        let samp_rate = 1000.0;
        let mut tuner = SpectralTuner::new(samp_rate);
        let id = tuner.open_channel(100.0, 4);

        let n = 400;
        let input: Vec<Complex32> = (0..n)
            .map(|i| {
                let t = i as f32 / samp_rate as f32;
                let phase = 2.0 * PI * 100.0 * t;
                Complex32::new(phase.cos(), phase.sin())
            })
            .collect();

        let mut collected = Vec::new();
        tuner.feed(&input, |cid, data| {
            if cid == id {
                collected.extend_from_slice(data);
            }
        });

        assert_eq!(collected.len(), n / 4);
        // Mixed to DC, magnitude should stay close to 1.0 throughout.
        for sample in &collected {
            assert!((sample.norm() - 1.0).abs() < 0.2);
        }
    }

    #[test]
    fn closing_a_channel_stops_future_feeds() {
        let mut tuner = SpectralTuner::new(1000.0);
        let id = tuner.open_channel(0.0, 1);
        assert_eq!(tuner.channel_count(), 1);
        tuner.close_channel(id);
        assert_eq!(tuner.channel_count(), 0);
        let input = vec![Complex32::new(1.0, 0.0); 8];
        let mut called = false;
        tuner.feed(&input, |_, _| called = true);
        assert!(!called);
    }
}
