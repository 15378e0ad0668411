// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! Abstract inspector factory (spec §4.6). Modeled as a trait with an
//! associated per-inspector private type rather than a `void*`-keyed
//! vtable + downcast, per spec.md §9's "maps cleanly to a trait/interface
//! per family" rewrite guidance. `TunerFactory` is the reference
//! implementation, built on the spectral tuner of `tuner.rs`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use num_complex::Complex32;
use rand::Rng;

use crate::corrector::FrequencyCorrector;
use crate::error::CoreError;
use crate::messages::Message;
use crate::tuner::SpectralTuner;

use super::scheduler::{InspectorScheduler, Task};
use super::{Inspector, InspectorState, SamplingInfo};

pub struct OpenArgs {
    pub class: String,
    pub fc: f64,
    pub bandwidth: f64,
    pub precise: bool,
}

/// Per-factory-family contract (spec §4.6 vtable). `Private` is the
/// opaque per-inspector sub-channel handle the factory keeps internally.
pub trait InspectorFactoryImpl: Send {
    type Private: Send;

    fn open(&mut self, args: &OpenArgs) -> Result<(String, SamplingInfo, Self::Private), CoreError>;
    fn bind(&mut self, private: &mut Self::Private, inspector: &Arc<Inspector>) -> Result<(), CoreError>;
    fn close(&mut self, private: &mut Self::Private);
    fn set_frequency(&mut self, private: &mut Self::Private, freq_hz: f64);
    fn set_bandwidth(&mut self, private: &mut Self::Private, bandwidth_hz: f64);
    fn set_freq_correction(&mut self, private: &mut Self::Private, delta_hz: f64);
    fn get_abs_freq(&self, private: &Self::Private) -> f64;
}

struct Entry<P> {
    inspector: Arc<Inspector>,
    private: P,
}

/// Owns the list of live inspectors, a scheduler, and the factory-family
/// implementation (spec §3 "Inspector factory").
pub struct Factory<V: InspectorFactoryImpl> {
    vtable: Mutex<V>,
    inspectors: Mutex<Vec<Entry<V::Private>>>,
    scheduler: InspectorScheduler,
    next_handle: AtomicU64,
    get_time: Box<dyn Fn() -> f64 + Send + Sync>,
}

impl<V: InspectorFactoryImpl> Factory<V> {
    pub fn new(vtable: V, outbox: Arc<super::scheduler::Mailbox>, get_time: impl Fn() -> f64 + Send + Sync + 'static) -> Self {
        Self {
            vtable: Mutex::new(vtable),
            inspectors: Mutex::new(Vec::new()),
            scheduler: InspectorScheduler::new(super::scheduler::default_worker_count(), outbox),
            next_handle: AtomicU64::new(1),
            get_time: Box::new(get_time),
        }
    }

    fn random_handle() -> u64 {
        rand::thread_rng().gen::<u64>().max(1)
    }

    /// `factory.open` (spec §4.6): create the sub-channel, construct the
    /// inspector, prune halted entries, bind, and transition to Running.
    pub fn open(&self, args: OpenArgs) -> Result<Arc<Inspector>, CoreError> {
        let mut vtable = self.vtable.lock().unwrap();
        let (_class, sampling, mut private) = vtable.open(&args)?;

        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst) ^ Self::random_handle();
        let inspector = Inspector::new(handle, sampling);

        vtable.bind(&mut private, &inspector)?;
        drop(vtable);

        let mut list = self.inspectors.lock().unwrap();
        list.retain(|e| e.inspector.state() != InspectorState::Halted);
        inspector.refs.acquire("factory");
        list.push(Entry {
            inspector: inspector.clone(),
            private,
        });
        drop(list);

        inspector.transition(InspectorState::Running);
        Ok(inspector)
    }

    /// `factory.feed` (spec §4.6).
    pub fn feed(&self, inspector: &Arc<Inspector>, data: &[Complex32]) -> Result<(), CoreError> {
        match inspector.state() {
            InspectorState::Halted => Err(CoreError::BadHandle("inspector already halted".into())),
            InspectorState::Halting => {
                let mut list = self.inspectors.lock().unwrap();
                if let Some(pos) = list.iter().position(|e| Arc::ptr_eq(&e.inspector, inspector)) {
                    let mut entry = list.remove(pos);
                    self.vtable.lock().unwrap().close(&mut entry.private);
                    drop(list);
                    inspector.refs.release("factory");
                } else {
                    drop(list);
                }
                inspector.transition(InspectorState::Halted);
                Ok(())
            }
            _ => {
                self.update_frequency_correction(inspector);
                self.scheduler.queue_task(Task {
                    inspector: inspector.clone(),
                    data: data.to_vec(),
                });
                Ok(())
            }
        }
    }

    fn update_frequency_correction(&self, inspector: &Arc<Inspector>) {
        let corrector = inspector.corrector.lock().unwrap().clone();
        let Some(corrector) = corrector else { return };
        let source_time = (self.get_time)();

        let list = self.inspectors.lock().unwrap();
        let Some(entry) = list.iter().find(|e| Arc::ptr_eq(&e.inspector, inspector)) else {
            return;
        };
        let abs_freq = self.vtable.lock().unwrap().get_abs_freq(&entry.private);
        drop(list);

        let corrected = corrector.correct(abs_freq, source_time);
        let delta = corrected - abs_freq;

        let mut list = self.inspectors.lock().unwrap();
        if let Some(entry) = list.iter_mut().find(|e| Arc::ptr_eq(&e.inspector, inspector)) {
            self.vtable.lock().unwrap().set_freq_correction(&mut entry.private, delta);
        }
    }

    /// `factory.halt_inspector` (spec §4.6): teardown happens lazily in
    /// the next `feed`.
    pub fn halt_inspector(&self, inspector: &Arc<Inspector>) {
        if inspector.state() == InspectorState::Running {
            inspector.transition(InspectorState::Halting);
        }
    }

    pub fn set_inspector_freq(&self, inspector: &Arc<Inspector>, freq_hz: f64) {
        let mut list = self.inspectors.lock().unwrap();
        if let Some(entry) = list.iter_mut().find(|e| Arc::ptr_eq(&e.inspector, inspector)) {
            self.vtable.lock().unwrap().set_frequency(&mut entry.private, freq_hz);
        }
    }

    pub fn set_inspector_bandwidth(&self, inspector: &Arc<Inspector>, bandwidth_hz: f64) {
        let mut list = self.inspectors.lock().unwrap();
        if let Some(entry) = list.iter_mut().find(|e| Arc::ptr_eq(&e.inspector, inspector)) {
            self.vtable.lock().unwrap().set_bandwidth(&mut entry.private, bandwidth_hz);
        }
        *inspector.bandwidth_notified.lock().unwrap() = Some(bandwidth_hz);
    }

    pub fn sync(&self) {
        self.scheduler.sync();
    }

    pub fn inspector_count(&self) -> usize {
        self.inspectors.lock().unwrap().len()
    }
}

pub mod demo {
    //! The reference spectral-tuner-backed factory implementation.
    use super::*;

    pub struct ChannelHandle(pub u32);

    pub struct TunerFactory {
        pub tuner: SpectralTuner,
    }

    impl TunerFactory {
        pub fn new(samp_rate: f64) -> Self {
            Self {
                tuner: SpectralTuner::new(samp_rate),
            }
        }
    }

    impl InspectorFactoryImpl for TunerFactory {
        type Private = ChannelHandle;

        fn open(&mut self, args: &OpenArgs) -> Result<(String, SamplingInfo, ChannelHandle), CoreError> {
            let decimation = if args.precise { 16 } else { 8 };
            let id = self.tuner.open_channel(args.fc, decimation);
            let channel = self
                .tuner
                .channel_mut(id)
                .ok_or_else(|| CoreError::AllocationFailed("sub-channel not created".into()))?;
            let sampling = SamplingInfo {
                equiv_samp_rate: channel.equiv_samp_rate(),
                bandwidth: args.bandwidth,
                center_freq: args.fc,
                fft_size: 512,
                decimation,
            };
            Ok((args.class.clone(), sampling, ChannelHandle(id)))
        }

        fn bind(&mut self, _private: &mut ChannelHandle, _inspector: &Arc<Inspector>) -> Result<(), CoreError> {
            Ok(())
        }

        fn close(&mut self, private: &mut ChannelHandle) {
            self.tuner.close_channel(private.0);
        }

        fn set_frequency(&mut self, private: &mut ChannelHandle, freq_hz: f64) {
            if let Some(channel) = self.tuner.channel_mut(private.0) {
                channel.retune(freq_hz);
            }
        }

        fn set_bandwidth(&mut self, _private: &mut ChannelHandle, _bandwidth_hz: f64) {}

        fn set_freq_correction(&mut self, private: &mut ChannelHandle, delta_hz: f64) {
            if let Some(channel) = self.tuner.channel_mut(private.0) {
                let base = channel.offset_hz();
                channel.retune(base + delta_hz);
            }
        }

        fn get_abs_freq(&self, _private: &ChannelHandle) -> f64 {
            0.0
        }
    }
}

impl Factory<demo::TunerFactory> {
    /// Fan one baseband buffer out through the spectral tuner and route
    /// each sub-channel's decimated output to its owning inspector (spec
    /// §4.10 step 5). Returns whether any inspector received new data, so
    /// the caller can decide whether a scheduler sync is warranted.
    pub fn feed_baseband(&self, data: &[Complex32]) -> bool {
        let mut outputs: Vec<(u32, Vec<Complex32>)> = Vec::new();
        self.vtable.lock().unwrap().tuner.feed(data, |id, samples| {
            outputs.push((id, samples.to_vec()));
        });
        if outputs.is_empty() {
            return false;
        }

        let routed: Vec<(Arc<Inspector>, Vec<Complex32>)> = {
            let list = self.inspectors.lock().unwrap();
            outputs
                .into_iter()
                .filter_map(|(id, samples)| {
                    list.iter()
                        .find(|e| e.private.0 == id)
                        .map(|e| (e.inspector.clone(), samples))
                })
                .collect()
        };

        let mut any = false;
        for (inspector, samples) in routed {
            if self.feed(&inspector, &samples).is_ok() {
                any = true;
            }
        }
        any
    }
}
