// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! Per-channel DSP host (spec §3 "Inspector", §4.9) plus the factory,
//! scheduler, and request-manager machinery that multiplex sub-channel
//! streams onto a worker pool (spec §4.6–§4.8).

pub mod estimator;
pub mod factory;
pub mod instance;
pub mod request_manager;
pub mod scheduler;
pub mod spectrum;

use std::collections::HashMap;
use std::sync::Mutex;

use num_complex::Complex32;

use crate::corrector::FrequencyCorrector;
use estimator::EstimatorInstance;
use spectrum::SpectrumSourceInstance;
use std::sync::Arc;

/// Monotonic state machine (spec §3 "Invariant: transitions are
/// Created → Running → Halting → Halted, monotonic").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InspectorState {
    Created,
    Running,
    Halting,
    Halted,
}

/// Named reference classes an inspector is held by (spec §5
/// "Reference-counting discipline"). The inspector's actual lifetime is
/// governed by `Arc<Inspector>` strong-count (idiomatic in Rust); these
/// counters are a diagnostic mirror of the original's per-class
/// bookkeeping, useful for the halt-storm property (§8 F-series) and for
/// tests that assert every named ref was released.
#[derive(Debug, Default)]
pub struct NamedRefCounts {
    counts: Mutex<HashMap<&'static str, usize>>,
}

impl NamedRefCounts {
    pub fn acquire(&self, name: &'static str) {
        *self.counts.lock().unwrap().entry(name).or_insert(0) += 1;
    }

    pub fn release(&self, name: &'static str) {
        let mut counts = self.counts.lock().unwrap();
        if let Some(count) = counts.get_mut(name) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                counts.remove(name);
            }
        }
    }

    pub fn total(&self) -> usize {
        self.counts.lock().unwrap().values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Sampling descriptor for a sub-channel (spec §3 "Inspector").
#[derive(Debug, Clone, Copy)]
pub struct SamplingInfo {
    pub equiv_samp_rate: f64,
    pub bandwidth: f64,
    pub center_freq: f64,
    pub fft_size: usize,
    pub decimation: u32,
}

/// A ring buffer of decimated complex samples pending delivery to the
/// client (spec §4.9 "Sampler loop").
pub struct SamplerRing {
    buf: Vec<Complex32>,
    capacity: usize,
    watermark: usize,
}

impl SamplerRing {
    pub fn new(capacity: usize, watermark: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
            watermark: watermark.min(capacity),
        }
    }

    pub fn avail(&self) -> usize {
        self.capacity - self.buf.len()
    }

    pub fn push(&mut self, sample: Complex32) {
        if self.buf.len() < self.capacity {
            self.buf.push(sample);
        }
    }

    /// If the watermark or the hard capacity has been reached, drain and
    /// return the contents, resetting the ring to empty.
    pub fn take_if_ready(&mut self) -> Option<Vec<Complex32>> {
        if self.buf.len() >= self.watermark || self.buf.len() >= self.capacity {
            if self.buf.is_empty() {
                return None;
            }
            Some(std::mem::take(&mut self.buf))
        } else {
            None
        }
    }

    pub fn set_watermark(&mut self, watermark: usize) {
        self.watermark = watermark.min(self.capacity);
    }

    pub fn watermark(&self) -> usize {
        self.watermark
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

pub const DEFAULT_RING_CAPACITY: usize = 8192;

/// Per-channel DSP host. Built by the factory; driven by the scheduler's
/// estimator/spectrum/sampler loops (spec §4.9).
pub struct Inspector {
    pub handle: u64,
    pub id: Mutex<u32>,
    pub state: Mutex<InspectorState>,
    pub sampling: Mutex<SamplingInfo>,
    pub ring: Mutex<SamplerRing>,
    /// Empty until the command server populates it from the estimator
    /// registry right after `Factory::open` returns.
    pub estimators: Mutex<Vec<EstimatorInstance>>,
    /// Empty until the command server populates it from the spectrum
    /// registry right after `Factory::open` returns.
    pub spectrum_sources: Mutex<Vec<SpectrumSourceInstance>>,
    pub spectsrc_index: Mutex<usize>,
    pub corrector: Mutex<Option<Arc<dyn FrequencyCorrector>>>,
    pub refs: NamedRefCounts,
    /// Opaque per-inspector "userdata" slot used by the request manager
    /// to stash a pending overridable record (spec §4.8), modeled as a
    /// typed slot rather than a raw pointer.
    pub pending_overridable: Mutex<Option<request_manager::OverridableRecord>>,
    pub params_requested: Mutex<bool>,
    pub bandwidth_notified: Mutex<Option<f64>>,
    pub class: Mutex<Box<dyn instance::InspectorClassInstance>>,
    pub spectrum_interval: Mutex<std::time::Duration>,
    pub last_spectrum_emit: Mutex<Option<std::time::Instant>>,
}

impl Inspector {
    pub fn new(handle: u64, sampling: SamplingInfo) -> Arc<Self> {
        Arc::new(Self {
            handle,
            id: Mutex::new(0),
            state: Mutex::new(InspectorState::Created),
            sampling: Mutex::new(sampling),
            ring: Mutex::new(SamplerRing::new(DEFAULT_RING_CAPACITY, DEFAULT_RING_CAPACITY / 2)),
            estimators: Mutex::new(Vec::new()),
            spectrum_sources: Mutex::new(Vec::new()),
            spectsrc_index: Mutex::new(0),
            corrector: Mutex::new(None),
            refs: NamedRefCounts::default(),
            pending_overridable: Mutex::new(None),
            params_requested: Mutex::new(false),
            bandwidth_notified: Mutex::new(None),
            class: Mutex::new(instance::default_class()),
            spectrum_interval: Mutex::new(std::time::Duration::from_millis(40)),
            last_spectrum_emit: Mutex::new(None),
        })
    }

    pub fn set_class(&self, class: Box<dyn instance::InspectorClassInstance>) {
        *self.class.lock().unwrap() = class;
    }

    pub fn state(&self) -> InspectorState {
        *self.state.lock().unwrap()
    }

    /// Transition to a new state, enforcing monotonicity (spec §3).
    pub fn transition(&self, next: InspectorState) {
        let mut state = self.state.lock().unwrap();
        debug_assert!(
            next >= *state,
            "BUG: inspector state transitions must be monotonic"
        );
        *state = next;
    }

    pub fn is_running(&self) -> bool {
        self.state() == InspectorState::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_emits_once_watermark_reached() {
        let mut ring = SamplerRing::new(8, 4);
        for i in 0..3 {
            ring.push(Complex32::new(i as f32, 0.0));
        }
        assert!(ring.take_if_ready().is_none());
        ring.push(Complex32::new(3.0, 0.0));
        let batch = ring.take_if_ready().expect("watermark reached");
        assert_eq!(batch.len(), 4);
        assert!(ring.take_if_ready().is_none());
    }

    #[test]
    fn ring_emits_on_full_even_below_watermark_bug_guard() {
        let mut ring = SamplerRing::new(4, 100);
        for i in 0..4 {
            ring.push(Complex32::new(i as f32, 0.0));
        }
        let batch = ring.take_if_ready().expect("full ring always flushes");
        assert_eq!(batch.len(), 4);
    }

    #[test]
    fn named_refcounts_track_independent_classes() {
        let refs = NamedRefCounts::default();
        refs.acquire("factory");
        refs.acquire("task_info");
        refs.acquire("task_info");
        assert_eq!(refs.total(), 3);
        refs.release("task_info");
        assert_eq!(refs.total(), 2);
        refs.release("task_info");
        refs.release("factory");
        assert!(refs.is_empty());
    }

    #[test]
    fn inspector_state_transitions_are_monotonic() {
        let insp = Inspector::new(
            1,
            SamplingInfo {
                equiv_samp_rate: 1000.0,
                bandwidth: 500.0,
                center_freq: 0.0,
                fft_size: 512,
                decimation: 1,
            },
        );
        assert_eq!(insp.state(), InspectorState::Created);
        insp.transition(InspectorState::Running);
        insp.transition(InspectorState::Halting);
        insp.transition(InspectorState::Halted);
        assert_eq!(insp.state(), InspectorState::Halted);
    }
}
