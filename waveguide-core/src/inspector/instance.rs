// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! The three per-buffer loops a scheduler worker runs for an inspector:
//! estimator, spectrum, and sampler (spec §4.9).

use std::time::Instant;

use num_complex::Complex32;

use crate::error::InspectorFault;
use crate::messages::{InspectorMessage, Message};

use super::spectrum::{instantaneous_power_spectrum, SpectrumDomain};
use super::{Inspector, SamplerRing};

/// The per-class sampler behavior an inspector hosts. Concrete classes
/// (psk, fsk, audio demodulators, ...) are out of scope (spec.md §1);
/// this is the contract the scheduler drives and the slot `testkit`
/// fills in with toy implementations.
pub trait InspectorClassInstance: Send + Sync {
    /// Consume `input`, pushing decimated symbols/samples into `ring`.
    /// Must honor `ring.avail()` and never push past it (spec §4.9).
    fn feed(&mut self, input: &[Complex32], ring: &mut SamplerRing);

    /// Apply a previously requested configuration change.
    fn commit_config(&mut self) {}

    /// Notified when the sub-channel's bandwidth changes underneath this
    /// inspector.
    fn new_bandwidth(&mut self, _bandwidth: f64) {}
}

struct NoopClass;
impl InspectorClassInstance for NoopClass {
    fn feed(&mut self, input: &[Complex32], ring: &mut SamplerRing) {
        for &sample in input {
            if ring.avail() == 0 {
                break;
            }
            ring.push(sample);
        }
    }
}

pub fn default_class() -> Box<dyn InspectorClassInstance> {
    Box::new(NoopClass)
}

/// Run the estimator loop, spectrum loop, and sampler loop for one
/// arrived buffer, in that order (spec §4.9), emitting any resulting
/// messages to `outbox`.
pub fn run_feed_task(
    insp: &std::sync::Arc<Inspector>,
    data: &[Complex32],
    outbox: &crate::mailbox::Mailbox<Message>,
) -> Result<(), InspectorFault> {
    if !insp.is_running() {
        return Err(InspectorFault::Halted);
    }

    estimator_loop(insp, data, outbox);
    spectrum_loop(insp, data, outbox);
    sampler_loop(insp, data, outbox);
    Ok(())
}

fn estimator_loop(insp: &Inspector, data: &[Complex32], outbox: &crate::mailbox::Mailbox<Message>) {
    let now = Instant::now();
    let mut estimators = insp.estimators.lock().unwrap();
    for (idx, est) in estimators.iter_mut().enumerate() {
        if !est.enabled || !est.due(now) {
            continue;
        }
        if let Some(value) = est.class.feed(data) {
            est.mark_emitted(now);
            outbox.write(
                crate::messages::tag::INSPECTOR,
                Message::Inspector(InspectorMessage::Signal {
                    handle: insp.handle,
                    index: idx,
                    value,
                }),
            );
        }
    }
}

fn spectrum_loop(insp: &Inspector, data: &[Complex32], outbox: &crate::mailbox::Mailbox<Message>) {
    let index = *insp.spectsrc_index.lock().unwrap();
    if index == 0 {
        // No spectrum source selected for this inspector.
        return;
    }

    let now = Instant::now();
    let due = {
        let mut last = insp.last_spectrum_emit.lock().unwrap();
        let interval = *insp.spectrum_interval.lock().unwrap();
        let due = last.map_or(true, |t| now.duration_since(t) >= interval);
        if due {
            *last = Some(now);
        }
        due
    };

    let sources = insp.spectrum_sources.lock().unwrap();
    let Some(source) = sources.get(index - 1) else {
        return;
    };
    match source.class.domain() {
        SpectrumDomain::Time => {
            // Time-domain sources emit internally via their own
            // callback; feeding them is enough.
            let _ = source.class.feed(data);
        }
        SpectrumDomain::Frequency => {
            if !due {
                return;
            }
            let fft_size = insp.sampling.lock().unwrap().fft_size;
            let psd = instantaneous_power_spectrum(data, fft_size);
            outbox.write(
                crate::messages::tag::INSPECTOR,
                Message::Inspector(InspectorMessage::Spectrogram {
                    handle: insp.handle,
                    index,
                    psd,
                }),
            );
        }
    }
}

fn sampler_loop(insp: &Inspector, data: &[Complex32], outbox: &crate::mailbox::Mailbox<Message>) {
    if std::mem::replace(&mut *insp.params_requested.lock().unwrap(), false) {
        insp.class.lock().unwrap().commit_config();
    }
    if let Some(bandwidth) = insp.bandwidth_notified.lock().unwrap().take() {
        insp.class.lock().unwrap().new_bandwidth(bandwidth);
    }

    let mut ring = insp.ring.lock().unwrap();
    insp.class.lock().unwrap().feed(data, &mut ring);

    if let Some(batch) = ring.take_if_ready() {
        let samples: Vec<(f32, f32)> = batch.iter().map(|c| (c.re, c.im)).collect();
        outbox.write(
            crate::messages::tag::SAMPLES,
            Message::Samples {
                inspector_id: insp.handle as u32,
                samples,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspector::{InspectorState, SamplingInfo};

    #[test]
    fn halted_inspector_short_circuits_feed() {
        let insp = Inspector::new(
            1,
            SamplingInfo {
                equiv_samp_rate: 1000.0,
                bandwidth: 500.0,
                center_freq: 0.0,
                fft_size: 64,
                decimation: 1,
            },
        );
        insp.transition(InspectorState::Running);
        insp.transition(InspectorState::Halting);
        insp.transition(InspectorState::Halted);

        let outbox = crate::mailbox::Mailbox::new();
        let data = vec![Complex32::new(0.0, 0.0); 16];
        assert!(run_feed_task(&insp, &data, &outbox).is_err());
    }

    #[test]
    fn sampler_loop_emits_once_ring_watermark_reached() {
        let insp = Inspector::new(
            1,
            SamplingInfo {
                equiv_samp_rate: 1000.0,
                bandwidth: 500.0,
                center_freq: 0.0,
                fft_size: 64,
                decimation: 1,
            },
        );
        insp.transition(InspectorState::Running);
        insp.ring.lock().unwrap().set_watermark(4);

        let outbox = crate::mailbox::Mailbox::new();
        let data = vec![Complex32::new(1.0, 0.0); 4];
        run_feed_task(&insp, &data, &outbox).unwrap();

        let msg = outbox
            .read_of_type_timed(
                crate::messages::tag::SAMPLES,
                std::time::Duration::from_millis(50),
            )
            .expect("a Samples message was emitted");
        match msg {
            Message::Samples { samples, .. } => assert_eq!(samples.len(), 4),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    struct ConstantEstimator(f32);
    impl crate::inspector::estimator::EstimatorClass for ConstantEstimator {
        fn name(&self) -> &str {
            "const"
        }
        fn feed(&self, _samples: &[Complex32]) -> Option<f32> {
            Some(self.0)
        }
    }

    struct FreqDomainSource;
    impl crate::inspector::spectrum::SpectrumSourceClass for FreqDomainSource {
        fn name(&self) -> &str {
            "freq-test"
        }
        fn domain(&self) -> SpectrumDomain {
            SpectrumDomain::Frequency
        }
        fn feed(&self, _samples: &[Complex32]) -> Option<Vec<f32>> {
            None
        }
    }

    fn test_inspector() -> std::sync::Arc<Inspector> {
        let insp = Inspector::new(
            1,
            SamplingInfo {
                equiv_samp_rate: 1000.0,
                bandwidth: 500.0,
                center_freq: 0.0,
                fft_size: 64,
                decimation: 1,
            },
        );
        insp.transition(InspectorState::Running);
        insp
    }

    #[test]
    fn estimator_loop_emits_signal_carrying_its_index() {
        use crate::inspector::estimator::EstimatorInstance;

        let insp = test_inspector();
        insp.estimators
            .lock()
            .unwrap()
            .push(EstimatorInstance::new(std::sync::Arc::new(ConstantEstimator(1.0)), std::time::Duration::ZERO));
        insp.estimators
            .lock()
            .unwrap()
            .push(EstimatorInstance::new(std::sync::Arc::new(ConstantEstimator(2.0)), std::time::Duration::ZERO));

        let outbox = crate::mailbox::Mailbox::new();
        let data = vec![Complex32::new(0.0, 0.0); 16];
        run_feed_task(&insp, &data, &outbox).unwrap();

        let mut seen = Vec::new();
        while let Ok(Message::Inspector(InspectorMessage::Signal { index, value, .. })) =
            outbox.read_of_type_timed(crate::messages::tag::INSPECTOR, std::time::Duration::from_millis(50))
        {
            seen.push((index, value));
        }
        seen.sort_by_key(|(idx, _)| *idx);
        assert_eq!(seen, vec![(0, 1.0), (1, 2.0)]);
    }

    #[test]
    fn spectrum_loop_is_a_no_op_while_index_is_zero() {
        use crate::inspector::spectrum::SpectrumSourceInstance;

        let insp = test_inspector();
        insp.spectrum_sources
            .lock()
            .unwrap()
            .push(SpectrumSourceInstance::new(std::sync::Arc::new(FreqDomainSource)));

        let outbox = crate::mailbox::Mailbox::new();
        let data = vec![Complex32::new(1.0, 0.0); 64];
        run_feed_task(&insp, &data, &outbox).unwrap();

        assert!(outbox
            .read_of_type_timed(crate::messages::tag::INSPECTOR, std::time::Duration::from_millis(50))
            .is_err());
    }

    #[test]
    fn frequency_domain_spectrum_source_emits_a_spectrogram() {
        use crate::inspector::spectrum::SpectrumSourceInstance;

        let insp = test_inspector();
        insp.spectrum_sources
            .lock()
            .unwrap()
            .push(SpectrumSourceInstance::new(std::sync::Arc::new(FreqDomainSource)));
        *insp.spectsrc_index.lock().unwrap() = 1;

        let outbox = crate::mailbox::Mailbox::new();
        let data = vec![Complex32::new(1.0, 0.0); 64];
        run_feed_task(&insp, &data, &outbox).unwrap();

        let msg = outbox
            .read_of_type_timed(crate::messages::tag::INSPECTOR, std::time::Duration::from_millis(50))
            .expect("a Spectrogram message was emitted");
        match msg {
            Message::Inspector(InspectorMessage::Spectrogram { index, psd, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(psd.len(), 64);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
