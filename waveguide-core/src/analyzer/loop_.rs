// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! The analyzer's two persistent background loops (spec §4.10): the
//! source-worker iteration (read, filter, channelize, PSD hand-off,
//! throttle, hop) and the PSD-worker's compute-and-emit step. Both run
//! as a single self-restarting `Worker` callback, per the "restart by
//! return value" convention of `worker.rs`.
//!
//! The analyzer's own dispatch loop (main-loop step 1-3) lives in
//! `analyzer::dispatch_one`, called from the thread spawned by
//! `Analyzer::new`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use num_complex::Complex32;

use crate::inspector::factory::demo::TunerFactory;
use crate::inspector::factory::Factory;
use crate::inspector::request_manager::RequestManager;
use crate::mailbox::Mailbox;
use crate::messages::{tag, AnalyzerMode, AnalyzerParams, Message, PsdFrame};
use crate::pool::SampleBufferPool;
use crate::source::Source;
use crate::throttle::Throttle;

use super::hop::HopState;
use super::source_info::SourceInfoPublisher;

/// Minimum number of post-hop FFT windows discarded before the next PSD
/// frame is trusted (spec §4.10 "Wide-spectrum variant"; the upstream
/// constant this mirrors is `SUSCAN_ANALYZER_MIN_POST_HOP_FFTS`).
const MIN_POST_HOP_FFTS: usize = 2;

/// Everything the source-worker callback needs, shared with the
/// analyzer's dispatch thread and public API through `Arc`.
pub struct SourceWorkerShared {
    pub source: Mutex<Box<dyn Source>>,
    pub pool: Arc<SampleBufferPool>,
    pub factory: Arc<Factory<TunerFactory>>,
    pub request_manager: Arc<RequestManager>,
    pub loop_mutex: Mutex<()>,
    pub params: Arc<Mutex<AnalyzerParams>>,
    pub source_info: Arc<SourceInfoPublisher>,
    pub throttle: Mutex<Option<Throttle>>,
    pub hop: Mutex<Option<HopState>>,
    pub psd_jobs: Arc<Mailbox<PsdJob>>,
    pub pending_seek: Mutex<Option<f64>>,
    /// Priority-ordered baseband transforms (GLOSSARY "Baseband filter"),
    /// applied before channelization.
    pub baseband_filters: Mutex<Vec<(i32, Box<dyn Fn(&mut [Complex32]) + Send + Sync>)>>,
    last_psd_emit: Mutex<Option<Instant>>,
    post_hop_discard: AtomicUsize,
    pub running: AtomicBool,
}

impl SourceWorkerShared {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Box<dyn Source>,
        pool: Arc<SampleBufferPool>,
        factory: Arc<Factory<TunerFactory>>,
        request_manager: Arc<RequestManager>,
        params: Arc<Mutex<AnalyzerParams>>,
        source_info: Arc<SourceInfoPublisher>,
        throttle: Option<Throttle>,
        hop: Option<HopState>,
        psd_jobs: Arc<Mailbox<PsdJob>>,
    ) -> Self {
        Self {
            source: Mutex::new(source),
            pool,
            factory,
            request_manager,
            loop_mutex: Mutex::new(()),
            params,
            source_info,
            throttle: Mutex::new(throttle),
            hop: Mutex::new(hop),
            psd_jobs,
            pending_seek: Mutex::new(None),
            baseband_filters: Mutex::new(Vec::new()),
            last_psd_emit: Mutex::new(None),
            post_hop_discard: AtomicUsize::new(0),
            running: AtomicBool::new(true),
        }
    }

    pub fn register_baseband_filter(
        &self,
        priority: i32,
        filter: Box<dyn Fn(&mut [Complex32]) + Send + Sync>,
    ) {
        let mut filters = self.baseband_filters.lock().unwrap();
        filters.push((priority, filter));
        filters.sort_by_key(|(p, _)| *p);
    }
}

/// One buffer handed off to the PSD worker: a snapshot of the samples it
/// should transform, plus enough context to fill in a `PsdFrame` (spec
/// §4.10 step 5 "hand the buffer... to the PSD worker via its callback").
pub struct PsdJob {
    pub samples: Vec<Complex32>,
    pub fc: f64,
    pub samp_rate: u32,
    pub window_size: usize,
}

pub struct PsdPrivate {
    pub jobs: Arc<Mailbox<PsdJob>>,
}

/// One iteration of the source-worker callback (spec §4.10, "The
/// source-worker callback"). Returns whether the worker should keep
/// restarting itself.
pub fn source_iteration(shared: &SourceWorkerShared, outbox: &Mailbox<Message>) -> bool {
    if !shared.running.load(Ordering::SeqCst) {
        return false;
    }

    let _loop_guard = shared.loop_mutex.lock().unwrap();

    shared.request_manager.commit_overridable(|insp, freq, bandwidth| {
        if let Some(f) = freq {
            shared.factory.set_inspector_freq(insp, f);
        }
        if let Some(b) = bandwidth {
            shared.factory.set_inspector_bandwidth(insp, b);
        }
    });

    if let Some(target) = shared.pending_seek.lock().unwrap().take() {
        let seeked = shared.source.lock().unwrap().seek(target);
        if seeked {
            if let Some(throttle) = shared.throttle.lock().unwrap().as_mut() {
                throttle.reset();
            }
        }
    }

    let mut buf = shared.pool.get();
    let read_start = Instant::now();
    let n = match shared.source.lock().unwrap().read(buf.as_mut_slice()) {
        Ok(n) => n,
        Err(err) => {
            outbox.write(tag::READ_ERROR, Message::ReadError { code: -1, error: err });
            shared.running.store(false, Ordering::SeqCst);
            return false;
        }
    };
    if n == 0 {
        outbox.write(
            tag::EOS,
            Message::Eos {
                code: 0,
                error: String::new(),
            },
        );
        shared.running.store(false, Ordering::SeqCst);
        return false;
    }

    let mut filtered = buf.as_slice()[..n].to_vec();
    {
        let filters = shared.baseband_filters.lock().unwrap();
        for (_, filter) in filters.iter() {
            filter(&mut filtered);
        }
    }
    buf.give();

    let params = shared.params.lock().unwrap().clone();

    let psd_due = {
        let mut last = shared.last_psd_emit.lock().unwrap();
        let interval = std::time::Duration::from_secs_f64(params.psd_update_interval.max(0.0));
        let due = last.map_or(true, |t| read_start.duration_since(t) >= interval);
        if due {
            *last = Some(read_start);
        }
        due
    };

    if psd_due {
        let info = shared.source_info.snapshot();
        shared.psd_jobs.write(
            tag::PSD,
            PsdJob {
                samples: filtered.clone(),
                fc: info.frequency,
                samp_rate: params.samp_rate,
                window_size: params.window_size,
            },
        );

        if params.mode == AnalyzerMode::WideSpectrum {
            let mut hop = shared.hop.lock().unwrap();
            if let Some(hop) = hop.as_mut() {
                let next = hop.next();
                shared.source.lock().unwrap().set_frequency(next);
                shared.source_info.update(|info| {
                    if info.frequency == next {
                        return false;
                    }
                    info.frequency = next;
                    true
                });
                shared
                    .post_hop_discard
                    .store(params.window_size * MIN_POST_HOP_FFTS, Ordering::SeqCst);
            }
        }
    }

    let discard_remaining = shared.post_hop_discard.load(Ordering::SeqCst);
    if discard_remaining > 0 {
        let consumed = n.min(discard_remaining);
        shared.post_hop_discard.fetch_sub(consumed, Ordering::SeqCst);
    } else if shared.factory.feed_baseband(&filtered) {
        shared.factory.sync();
    }

    let process_end = Instant::now();
    let elapsed = process_end.duration_since(read_start).as_secs_f64().max(1e-9);
    let instantaneous_rate = n as f64 / elapsed;
    shared.source_info.update(|info| {
        let alpha = 0.1;
        let updated = info.measured_samp_rate * (1.0 - alpha) + instantaneous_rate * alpha;
        if (updated - info.measured_samp_rate).abs() < 1.0 {
            return false;
        }
        info.measured_samp_rate = updated;
        true
    });

    if let Some(throttle) = shared.throttle.lock().unwrap().as_mut() {
        throttle.throttle(n);
    }

    true
}

/// One iteration of the PSD-worker callback: block for the next job (with
/// a short timeout so halt requests aren't starved), compute the
/// instantaneous power spectrum, and emit a PSD message.
pub fn psd_iteration(private: &PsdPrivate, outbox: &Mailbox<Message>) -> bool {
    if let Ok(job) = private.jobs.read_timed(std::time::Duration::from_millis(200)) {
        let fft_size = job.1.window_size.max(1);
        let psd = crate::inspector::spectrum::instantaneous_power_spectrum(&job.1.samples, fft_size);
        outbox.write(
            tag::PSD,
            Message::Psd(PsdFrame {
                fc: job.1.fc,
                samp_rate: job.1.samp_rate,
                measured_samp_rate: job.1.samp_rate as f64,
                n0: 0.0,
                psd,
            }),
        );
    }
    true
}
