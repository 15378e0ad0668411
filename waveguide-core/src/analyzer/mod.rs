// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! The analyzer (spec §2 component A, §4.10-§4.12): the facade clients
//! talk to. Owns the source-worker and PSD-worker threads, the inspector
//! factory, and a dedicated dispatch thread that drains the analyzer's
//! own inbox.

pub mod command_server;
pub mod hop;
mod loop_;
pub mod source_info;

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use num_complex::Complex32;

use crate::corrector::GroundStation;
use crate::inspector::factory::demo::TunerFactory;
use crate::inspector::factory::Factory;
use crate::inspector::request_manager::RequestManager;
use crate::inspector::Inspector;
use crate::mailbox::{Mailbox, ReadTimeout};
use crate::messages::{
    tag, AnalyzerMode, AnalyzerParams, InspectorMessage, Message, Permission, SourceInit,
    WindowFunction,
};
use crate::pool::SampleBufferPool;
use crate::source::{Realtime, Source, SourceConfig, SourceInfo};
use crate::throttle::Throttle;
use crate::worker::Worker;

use command_server::CommandServer;
use hop::{HopState, HopStrategy, Partitioning};
use loop_::{psd_iteration, source_iteration, PsdPrivate, SourceWorkerShared};
use source_info::SourceInfoPublisher;

/// Bound on how long `Analyzer::halt`/`Drop` wait for each worker thread
/// to acknowledge before giving up and leaving it detached (spec §5).
const WORKER_DESTROY_TIMEOUT: Duration = Duration::from_secs(2);

/// Relative bandwidth of one wide-spectrum hop partition, as a fraction
/// of the analyzer sample rate. `0.5` mirrors the original's default
/// `SUSCAN_ANALYZER_WIDE_REL_BW`.
const DEFAULT_HOP_REL_BW: f64 = 0.5;

fn new_hop(params: &AnalyzerParams) -> Option<HopState> {
    if params.mode != AnalyzerMode::WideSpectrum {
        return None;
    }
    Some(HopState::new(
        params.min_freq,
        params.max_freq,
        params.samp_rate as f64,
        DEFAULT_HOP_REL_BW,
        HopStrategy::Progressive,
        Partitioning::Discrete,
    ))
}

/// The analyzer facade (spec §2 component A). Constructed once per
/// source; client code talks to it exclusively through this type's
/// public methods plus the outbox mailbox it hands back.
pub struct Analyzer {
    inbox: Arc<Mailbox<Message>>,
    outbox: Arc<Mailbox<Message>>,
    factory: Arc<Factory<TunerFactory>>,
    handles: Arc<Mutex<HashMap<u64, Arc<Inspector>>>>,
    params: Arc<Mutex<AnalyzerParams>>,
    source_info: Arc<SourceInfoPublisher>,
    source_shared: Arc<SourceWorkerShared>,
    source_worker: Mutex<Option<Worker<Mailbox<Message>, SourceWorkerShared>>>,
    psd_worker: Mutex<Option<Worker<Mailbox<Message>, PsdPrivate>>>,
    dispatch_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Analyzer {
    /// Construct and start an analyzer: spawns the source-worker,
    /// PSD-worker, and dispatch threads, then emits the initial
    /// `SourceInit` and `SourceInfo` messages (spec §4.10 "Initial
    /// actions").
    pub fn new(
        params: AnalyzerParams,
        source: Box<dyn Source>,
        config: &SourceConfig,
        pool_capacity: usize,
        outbox: Arc<Mailbox<Message>>,
    ) -> Arc<Self> {
        let info = source.info();
        let inbox = Arc::new(Mailbox::new());
        let source_info = Arc::new(SourceInfoPublisher::new(info.clone(), outbox.clone()));
        let pool = Arc::new(SampleBufferPool::new(pool_capacity, params.window_size));
        let psd_jobs = Arc::new(Mailbox::new());

        let ground = config
            .qth
            .map(|q| GroundStation::new(q.lat_deg, q.lon_deg, q.height_m / 1000.0));

        let factory = {
            let source_info_for_time = source_info.clone();
            Arc::new(Factory::new(
                TunerFactory::new(info.effective_samp_rate as f64),
                outbox.clone(),
                move || source_info_for_time.snapshot().source_time_unix,
            ))
        };
        let request_manager = Arc::new(RequestManager::new());
        let handles: Arc<Mutex<HashMap<u64, Arc<Inspector>>>> = Arc::new(Mutex::new(HashMap::new()));
        let params = Arc::new(Mutex::new(params));

        let throttle = match source.realtime() {
            Realtime::RealTime => None,
            Realtime::NonRealTime => Some(Throttle::new(info.effective_samp_rate)),
        };
        let hop = new_hop(&params.lock().unwrap());

        let source_shared = Arc::new(SourceWorkerShared::new(
            source,
            pool,
            factory.clone(),
            request_manager.clone(),
            params.clone(),
            source_info.clone(),
            throttle,
            hop,
            psd_jobs.clone(),
        ));

        let mut source_worker: Worker<Mailbox<Message>, SourceWorkerShared> =
            Worker::new(outbox.clone(), source_shared.clone());
        source_worker.push(Box::new(|outbox: &Mailbox<Message>, shared: &SourceWorkerShared| {
            source_iteration(shared, outbox)
        }));

        let psd_private = Arc::new(PsdPrivate { jobs: psd_jobs });
        let mut psd_worker: Worker<Mailbox<Message>, PsdPrivate> = Worker::new(outbox.clone(), psd_private);
        psd_worker.push(Box::new(|outbox: &Mailbox<Message>, private: &PsdPrivate| {
            psd_iteration(private, outbox)
        }));

        let dispatch_handle = spawn_dispatch_thread(
            inbox.clone(),
            outbox.clone(),
            factory.clone(),
            request_manager.clone(),
            handles.clone(),
            params.clone(),
            source_shared.clone(),
            ground,
        );

        let analyzer = Arc::new(Self {
            inbox,
            outbox: outbox.clone(),
            factory,
            handles,
            params,
            source_info: source_info.clone(),
            source_shared,
            source_worker: Mutex::new(Some(source_worker)),
            psd_worker: Mutex::new(Some(psd_worker)),
            dispatch_handle: Mutex::new(Some(dispatch_handle)),
        });

        outbox.write(
            tag::SOURCE_INIT,
            Message::SourceInit(SourceInit {
                success: true,
                error: None,
            }),
        );
        source_info.commit();

        analyzer
    }

    fn has_permission(&self, p: Permission) -> bool {
        self.source_info.snapshot().permissions.has(p)
    }

    /// Write a raw message to the analyzer's own inbox (spec §6 "Client
    /// -> Analyzer-inbox").
    pub fn write(&self, tag: u32, msg: Message) {
        self.inbox.write(tag, msg);
    }

    /// Block for the next outbox message.
    pub fn read(&self) -> (u32, Message) {
        self.outbox.read()
    }

    pub fn read_timed(&self, timeout: Duration) -> Result<(u32, Message), ReadTimeout> {
        self.outbox.read_timed(timeout)
    }

    /// Block for the next Inspector-tagged message, unwrapped to its
    /// `InspectorMessage` payload.
    pub fn read_inspector(&self) -> InspectorMessage {
        loop {
            if let Message::Inspector(kind) = self.outbox.read_of_type(tag::INSPECTOR) {
                return kind;
            }
        }
    }

    /// Block (up to `timeout`) until a `SourceInfo` message or a terminal
    /// condition (`Eos`/`ReadError`) appears on the outbox. Returns
    /// whether the source is ready.
    pub fn wait_until_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.outbox.read_timed(remaining) {
                Ok((_, Message::SourceInfo(_))) => return true,
                Ok((_, Message::Eos { .. })) | Ok((_, Message::ReadError { .. })) => return false,
                Ok(_) => continue,
                Err(_) => return false,
            }
        }
    }

    /// Current source-info snapshot (read-only convenience; the
    /// authoritative copy lives with the source-worker).
    pub fn source_info(&self) -> SourceInfo {
        self.source_info.snapshot()
    }

    pub fn set_frequency(&self, freq_hz: f64) -> bool {
        if !self.has_permission(Permission::SetFreq) {
            return false;
        }
        let ok = self.source_shared.source.lock().unwrap().set_frequency(freq_hz);
        if ok {
            self.source_info.update(|info| {
                if info.frequency == freq_hz {
                    return false;
                }
                info.frequency = freq_hz;
                true
            });
        }
        ok
    }

    pub fn set_gain(&self, name: &str, value: f64) -> bool {
        if !self.has_permission(Permission::SetGain) {
            return false;
        }
        let ok = self.source_shared.source.lock().unwrap().set_gain(name, value);
        if ok {
            let name = name.to_string();
            self.source_info.update(|info| {
                match info.gain_elements.iter_mut().find(|g| g.name == name) {
                    Some(g) if g.value != value => {
                        g.value = value;
                        true
                    }
                    _ => false,
                }
            });
        }
        ok
    }

    pub fn set_antenna(&self, name: &str) -> bool {
        if !self.has_permission(Permission::SetAntenna) {
            return false;
        }
        let ok = self.source_shared.source.lock().unwrap().set_antenna(name);
        if ok {
            let name = name.to_string();
            self.source_info.update(|info| {
                if info.antenna == name {
                    return false;
                }
                info.antenna = name;
                true
            });
        }
        ok
    }

    pub fn set_bandwidth(&self, bandwidth_hz: f64) -> bool {
        if !self.has_permission(Permission::SetBandwidth) {
            return false;
        }
        let ok = self.source_shared.source.lock().unwrap().set_bandwidth(bandwidth_hz);
        if ok {
            self.source_info.update(|info| {
                if info.bandwidth == bandwidth_hz {
                    return false;
                }
                info.bandwidth = bandwidth_hz;
                true
            });
        }
        ok
    }

    pub fn set_ppm(&self, ppm: f64) -> bool {
        if !self.has_permission(Permission::SetPpm) {
            return false;
        }
        let ok = self.source_shared.source.lock().unwrap().set_ppm(ppm);
        if ok {
            self.source_info.update(|info| {
                if info.ppm == ppm {
                    return false;
                }
                info.ppm = ppm;
                true
            });
        }
        ok
    }

    pub fn set_dc_remove(&self, enabled: bool) -> bool {
        if !self.has_permission(Permission::SetDcRemove) {
            return false;
        }
        let ok = self.source_shared.source.lock().unwrap().set_dc_remove(enabled);
        if ok {
            self.source_info.update(|info| {
                if info.dc_remove == enabled {
                    return false;
                }
                info.dc_remove = enabled;
                true
            });
        }
        ok
    }

    pub fn set_iq_reverse(&self, enabled: bool) -> bool {
        if !self.has_permission(Permission::SetIqReverse) {
            return false;
        }
        let ok = self.source_shared.source.lock().unwrap().set_iq_reverse(enabled);
        if ok {
            self.source_info.update(|info| {
                if info.iq_reverse == enabled {
                    return false;
                }
                info.iq_reverse = enabled;
                true
            });
        }
        ok
    }

    pub fn set_agc(&self, enabled: bool) -> bool {
        if !self.has_permission(Permission::SetAgc) {
            return false;
        }
        let ok = self.source_shared.source.lock().unwrap().set_agc(enabled);
        if ok {
            self.source_info.update(|info| {
                if info.agc == enabled {
                    return false;
                }
                info.agc = enabled;
                true
            });
        }
        ok
    }

    /// Seek a seekable (replay) source to an absolute Unix timestamp
    /// (spec permission `Seek`). Applied on the source-worker's next
    /// iteration.
    pub fn seek(&self, unix_seconds: f64) -> bool {
        if !self.has_permission(Permission::Seek) || !self.source_info.snapshot().seekable {
            return false;
        }
        *self.source_shared.pending_seek.lock().unwrap() = Some(unix_seconds);
        true
    }

    /// Enable (`samp_rate > 0`) or disable (`samp_rate == 0`) pacing of a
    /// non-realtime source (spec permission `Throttle`).
    pub fn set_throttle(&self, samp_rate: u32) -> bool {
        if !self.has_permission(Permission::Throttle) {
            return false;
        }
        let mut throttle = self.source_shared.throttle.lock().unwrap();
        *throttle = if samp_rate == 0 { None } else { Some(Throttle::new(samp_rate)) };
        drop(throttle);
        self.outbox.write(tag::THROTTLE, Message::Throttle { samp_rate });
        true
    }

    pub fn set_fft_size(&self, window_size: usize) -> bool {
        if !self.has_permission(Permission::SetFftSize) {
            return false;
        }
        let mut params = self.params.lock().unwrap();
        params.window_size = window_size;
        let snapshot = params.clone();
        drop(params);
        self.outbox.write(tag::PARAMS, Message::Params(snapshot));
        true
    }

    pub fn set_fft_fps(&self, updates_per_second: f64) -> bool {
        if !self.has_permission(Permission::SetFftFps) || updates_per_second <= 0.0 {
            return false;
        }
        let mut params = self.params.lock().unwrap();
        params.psd_update_interval = 1.0 / updates_per_second;
        let snapshot = params.clone();
        drop(params);
        self.outbox.write(tag::PARAMS, Message::Params(snapshot));
        true
    }

    pub fn set_fft_window(&self, window: WindowFunction) -> bool {
        if !self.has_permission(Permission::SetFftWindow) {
            return false;
        }
        let mut params = self.params.lock().unwrap();
        params.window_function = window;
        let snapshot = params.clone();
        drop(params);
        self.outbox.write(tag::PARAMS, Message::Params(snapshot));
        true
    }

    /// Register a baseband filter (spec permission `SetBbFilter`),
    /// applied in ascending priority order before channelization.
    pub fn set_baseband_filter(
        &self,
        priority: i32,
        filter: Box<dyn Fn(&mut [Complex32]) + Send + Sync>,
    ) -> bool {
        if !self.has_permission(Permission::SetBbFilter) {
            return false;
        }
        self.source_shared.register_baseband_filter(priority, filter);
        true
    }

    fn open_inspector_permission(class: &str) -> Permission {
        match class {
            "audio" => Permission::OpenAudio,
            "raw" => Permission::OpenRaw,
            _ => Permission::OpenInspector,
        }
    }

    /// Request opening an inspector (spec permission one of
    /// `OpenAudio`/`OpenRaw`/`OpenInspector` depending on `req.class`).
    /// Response arrives asynchronously on the outbox as
    /// `InspectorMessage::OpenResponse`.
    pub fn open_inspector(&self, req: crate::messages::OpenRequest) -> bool {
        if !self.has_permission(Self::open_inspector_permission(&req.class)) {
            return false;
        }
        self.inbox.write(tag::INSPECTOR, Message::Inspector(InspectorMessage::Open(req)));
        true
    }

    /// Send a client-originated halt request through the gated surface
    /// (spec permission `Halt`). The owning side can always call `halt`
    /// directly to tear the analyzer down regardless of this permission.
    pub fn request_halt(&self) -> bool {
        if !self.has_permission(Permission::Halt) {
            return false;
        }
        self.inbox.write_urgent(tag::HALT, Message::Halt);
        true
    }

    /// Tear the analyzer down: stop the dispatch thread, then the
    /// source-worker and PSD-worker, bounded by `WORKER_DESTROY_TIMEOUT`
    /// each (spec §5).
    pub fn halt(&self, timeout: Duration) {
        self.inbox.write_urgent(tag::HALT, Message::Halt);
        if let Some(handle) = self.dispatch_handle.lock().unwrap().take() {
            let _ = handle.join();
        }
        if let Some(mut worker) = self.source_worker.lock().unwrap().take() {
            worker.halt(timeout);
        }
        if let Some(mut worker) = self.psd_worker.lock().unwrap().take() {
            worker.halt(timeout);
        }
    }
}

impl Drop for Analyzer {
    fn drop(&mut self) {
        self.halt(WORKER_DESTROY_TIMEOUT);
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_dispatch_thread(
    inbox: Arc<Mailbox<Message>>,
    outbox: Arc<Mailbox<Message>>,
    factory: Arc<Factory<TunerFactory>>,
    request_manager: Arc<RequestManager>,
    handles: Arc<Mutex<HashMap<u64, Arc<Inspector>>>>,
    params: Arc<Mutex<AnalyzerParams>>,
    source_shared: Arc<SourceWorkerShared>,
    ground: Option<GroundStation>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("waveguide-analyzer".into())
        .spawn(move || loop {
            let (_tag, msg) = inbox.read();
            let keep_going = dispatch_one(
                msg,
                &outbox,
                &factory,
                &request_manager,
                &handles,
                &params,
                &source_shared,
                ground,
            );
            if !keep_going {
                break;
            }
        })
        .expect("failed to spawn analyzer dispatch thread")
}

#[allow(clippy::too_many_arguments)]
fn dispatch_one(
    msg: Message,
    outbox: &Mailbox<Message>,
    factory: &Factory<TunerFactory>,
    request_manager: &RequestManager,
    handles: &Mutex<HashMap<u64, Arc<Inspector>>>,
    params: &Mutex<AnalyzerParams>,
    source_shared: &SourceWorkerShared,
    ground: Option<GroundStation>,
) -> bool {
    match msg {
        Message::Halt => {
            source_shared.running.store(false, Ordering::SeqCst);
            outbox.write_urgent(tag::HALT, Message::Halt);
            false
        }
        Message::Inspector(kind) => {
            let server = CommandServer {
                factory,
                request_manager,
                handles,
                outbox,
                qth: ground,
            };
            server.dispatch(kind);
            true
        }
        Message::Throttle { samp_rate } => {
            let mut throttle = source_shared.throttle.lock().unwrap();
            *throttle = if samp_rate == 0 { None } else { Some(Throttle::new(samp_rate)) };
            true
        }
        Message::Params(new_params) => {
            let mut hop = source_shared.hop.lock().unwrap();
            *hop = new_hop(&new_params);
            drop(hop);
            *params.lock().unwrap() = new_params.clone();
            outbox.write(tag::PARAMS, Message::Params(new_params));
            true
        }
        Message::GetParams => {
            let snapshot = params.lock().unwrap().clone();
            outbox.write(tag::PARAMS, Message::Params(snapshot));
            true
        }
        Message::Channel(list) => {
            outbox.write(tag::CHANNEL, Message::Channel(list));
            true
        }
        Message::Eos { code, error } => {
            outbox.write(tag::EOS, Message::Eos { code, error });
            true
        }
        Message::ReadError { code, error } => {
            outbox.write(tag::READ_ERROR, Message::ReadError { code, error });
            true
        }
        other => {
            tracing::warn!(?other, "unhandled analyzer inbox message");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{GainElement, Qth};

    struct ToySource {
        info: SourceInfo,
        samples: Vec<Complex32>,
        pos: usize,
    }

    impl ToySource {
        fn new(samp_rate: u32, total: usize) -> Self {
            Self {
                info: SourceInfo {
                    permissions: crate::messages::Permissions::all(),
                    nominal_samp_rate: samp_rate,
                    effective_samp_rate: samp_rate,
                    gain_elements: vec![GainElement {
                        name: "LNA".into(),
                        value: 0.0,
                        min: 0.0,
                        max: 40.0,
                        step: 1.0,
                    }],
                    ..SourceInfo::default()
                },
                samples: vec![Complex32::new(0.0, 0.0); total],
                pos: 0,
            }
        }
    }

    impl Source for ToySource {
        fn info(&self) -> SourceInfo {
            self.info.clone()
        }

        fn realtime(&self) -> Realtime {
            Realtime::RealTime
        }

        fn read(&mut self, buf: &mut [Complex32]) -> Result<usize, String> {
            if self.pos >= self.samples.len() {
                return Ok(0);
            }
            let n = buf.len().min(self.samples.len() - self.pos);
            buf[..n].copy_from_slice(&self.samples[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }

        fn force_eos(&mut self) {
            self.pos = self.samples.len();
        }

        fn set_frequency(&mut self, _freq_hz: f64) -> bool {
            true
        }

        fn set_gain(&mut self, _name: &str, _value: f64) -> bool {
            true
        }

        fn set_antenna(&mut self, _name: &str) -> bool {
            true
        }

        fn set_bandwidth(&mut self, _bandwidth_hz: f64) -> bool {
            true
        }

        fn set_ppm(&mut self, _ppm: f64) -> bool {
            true
        }

        fn set_dc_remove(&mut self, _enabled: bool) -> bool {
            true
        }

        fn set_iq_reverse(&mut self, _enabled: bool) -> bool {
            true
        }

        fn set_agc(&mut self, _enabled: bool) -> bool {
            true
        }
    }

    fn test_config() -> SourceConfig {
        SourceConfig {
            type_name: "toy".into(),
            effective_samp_rate: 8_000,
            frequency: 100_000.0,
            lnb_freq: 0.0,
            antenna: "RX".into(),
            bandwidth: 8_000.0,
            ppm: 0.0,
            dc_remove: false,
            iq_reverse: false,
            agc: false,
            qth: Some(Qth {
                lat_deg: 0.0,
                lon_deg: 0.0,
                height_m: 0.0,
            }),
        }
    }

    #[test]
    fn opens_and_reports_source_init_and_info() {
        let source = Box::new(ToySource::new(8_000, 1 << 16));
        let outbox = Arc::new(Mailbox::new());
        let analyzer = Analyzer::new(
            AnalyzerParams::default(),
            source,
            &test_config(),
            2,
            outbox.clone(),
        );

        let init = outbox.read_of_type(tag::SOURCE_INIT);
        match init {
            Message::SourceInit(init) => assert!(init.success),
            other => panic!("expected SourceInit, got {other:?}"),
        }
        let info = outbox.read_of_type(tag::SOURCE_INFO);
        assert!(matches!(info, Message::SourceInfo(_)));

        analyzer.halt(Duration::from_secs(1));
    }

    #[test]
    fn permission_denied_setter_returns_false_without_message() {
        let source = Box::new(ToySource::new(8_000, 1 << 16));
        let outbox = Arc::new(Mailbox::new());
        let analyzer = Analyzer::new(
            AnalyzerParams::default(),
            source,
            &test_config(),
            2,
            outbox.clone(),
        );
        outbox.read_of_type(tag::SOURCE_INIT);
        outbox.read_of_type(tag::SOURCE_INFO);

        analyzer.source_info.update(|info| {
            info.permissions = crate::messages::Permissions::NONE;
            true
        });
        outbox.read_of_type(tag::SOURCE_INFO);

        assert!(!analyzer.set_frequency(1_000_000.0));
        assert!(outbox.read_timed(Duration::from_millis(100)).is_err());

        analyzer.halt(Duration::from_secs(1));
    }
}
