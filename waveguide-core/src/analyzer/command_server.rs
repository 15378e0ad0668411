// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! Inspector command dispatch table (spec §4.11). Each `InspectorMessage`
//! arriving on the analyzer inbox is handled here and answered with
//! exactly one Inspector-tagged response on the outbox.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::corrector::{GroundStation, TleCorrector};
use crate::inspector::factory::{demo::TunerFactory, Factory, OpenArgs};
use crate::inspector::request_manager::RequestManager;
use crate::inspector::{estimator, spectrum, Inspector};
use crate::mailbox::Mailbox;
use crate::messages::{tag, InspectorMessage as Kind, Message, OpenResponse};

/// Default per-estimator emission cadence for freshly opened inspectors
/// (matches `Inspector`'s default `spectrum_interval`).
const DEFAULT_ESTIMATOR_INTERVAL: std::time::Duration = std::time::Duration::from_millis(40);

pub struct CommandServer<'a> {
    pub factory: &'a Factory<TunerFactory>,
    pub request_manager: &'a RequestManager,
    pub handles: &'a Mutex<HashMap<u64, Arc<Inspector>>>,
    pub outbox: &'a Mailbox<Message>,
    pub qth: Option<GroundStation>,
}

impl<'a> CommandServer<'a> {
    fn respond(&self, kind: Kind) {
        self.outbox.write(tag::INSPECTOR, Message::Inspector(kind));
    }

    fn lookup(&self, handle: u64) -> Option<Arc<Inspector>> {
        self.handles.lock().unwrap().get(&handle).cloned()
    }

    pub fn dispatch(&self, msg: Kind) {
        match msg {
            Kind::Open(req) => self.handle_open(req),
            Kind::SetId { handle, id } => self.handle_set_id(handle, id),
            Kind::GetConfig { handle } => self.handle_get_config(handle),
            Kind::SetConfig { handle, .. } => self.handle_set_config(handle),
            Kind::Estimator { handle, index, enabled } => self.handle_estimator(handle, index, enabled),
            Kind::Spectrum { handle, index } => self.handle_spectrum(handle, index),
            Kind::ResetEqualizer { handle } => {
                if self.lookup(handle).is_none() {
                    self.respond(Kind::WrongHandle);
                }
            }
            Kind::Close { handle } => self.handle_close(handle),
            Kind::SetFreq { handle, freq } => self.handle_set_freq(handle, freq),
            Kind::SetBandwidth { handle, bandwidth } => self.handle_set_bandwidth(handle, bandwidth),
            Kind::SetWatermark { handle, watermark } => self.handle_set_watermark(handle, watermark),
            Kind::SetTle { handle, line1, line2 } => self.handle_set_tle(handle, &line1, &line2),
            Kind::ClearTle { handle } => {
                if let Some(insp) = self.lookup(handle) {
                    *insp.corrector.lock().unwrap() = None;
                } else {
                    self.respond(Kind::WrongHandle);
                }
            }
            other @ (Kind::OpenResponse(_)
            | Kind::OrbitReport { .. }
            | Kind::Signal { .. }
            | Kind::Spectrogram { .. }
            | Kind::WrongHandle
            | Kind::WrongObject
            | Kind::InvalidArgument(_)
            | Kind::WrongKind
            | Kind::InvalidChannel(_)
            | Kind::InvalidCorrection(_)) => {
                // These are response-only kinds; the command server never
                // receives them as requests.
                tracing::warn!(?other, "ignoring response-only inspector kind on inbox");
            }
        }
    }

    fn handle_open(&self, req: crate::messages::OpenRequest) {
        let precise = req.precise;
        match self.factory.open(OpenArgs {
            class: req.class,
            fc: req.fc,
            bandwidth: req.bandwidth,
            precise,
        }) {
            Ok(insp) => {
                {
                    let mut estimators = insp.estimators.lock().unwrap();
                    for name in estimator::estimator_class_names() {
                        if let Some(class) = estimator::lookup_estimator_class(&name) {
                            estimators.push(estimator::EstimatorInstance::new(class, DEFAULT_ESTIMATOR_INTERVAL));
                        }
                    }
                }
                {
                    let mut sources = insp.spectrum_sources.lock().unwrap();
                    for name in spectrum::spectrum_class_names() {
                        if let Some(class) = spectrum::lookup_spectrum_class(&name) {
                            sources.push(spectrum::SpectrumSourceInstance::new(class));
                        }
                    }
                }
                self.handles.lock().unwrap().insert(insp.handle, insp.clone());
                let sampling = *insp.sampling.lock().unwrap();
                self.respond(Kind::OpenResponse(OpenResponse {
                    handle: insp.handle,
                    fs: sampling.equiv_samp_rate as u32,
                    equiv_fs: sampling.equiv_samp_rate,
                    bandwidth: sampling.bandwidth,
                    lo: 0.0,
                    ft: sampling.center_freq,
                    estimator_classes: estimator::estimator_class_names(),
                    spectsrc_classes: spectrum::spectrum_class_names(),
                }));
            }
            Err(e) => self.respond(Kind::InvalidChannel(e.to_string())),
        }
    }

    fn handle_set_id(&self, handle: u64, id: u32) {
        match self.lookup(handle) {
            Some(insp) => *insp.id.lock().unwrap() = id,
            None => self.respond(Kind::WrongHandle),
        }
    }

    fn handle_get_config(&self, handle: u64) {
        if self.lookup(handle).is_none() {
            self.respond(Kind::WrongHandle);
        }
        // Concrete per-class configuration serialization is out of scope
        // (spec.md §1); nothing further to emit on success.
    }

    fn handle_set_config(&self, handle: u64) {
        match self.lookup(handle) {
            Some(insp) => *insp.params_requested.lock().unwrap() = true,
            None => self.respond(Kind::WrongHandle),
        }
    }

    fn handle_estimator(&self, handle: u64, index: usize, enabled: bool) {
        let Some(insp) = self.lookup(handle) else {
            self.respond(Kind::WrongHandle);
            return;
        };
        let mut estimators = insp.estimators.lock().unwrap();
        match estimators.get_mut(index) {
            Some(inst) => inst.enabled = enabled,
            None => self.respond(Kind::WrongObject),
        }
    }

    fn handle_spectrum(&self, handle: u64, index: usize) {
        let Some(insp) = self.lookup(handle) else {
            self.respond(Kind::WrongHandle);
            return;
        };
        if index > 0 && index - 1 >= insp.spectrum_sources.lock().unwrap().len() {
            self.respond(Kind::WrongObject);
            return;
        }
        *insp.spectsrc_index.lock().unwrap() = index;
    }

    fn handle_close(&self, handle: u64) {
        let Some(insp) = self.handles.lock().unwrap().remove(&handle) else {
            self.respond(Kind::WrongHandle);
            return;
        };
        self.request_manager.clear_requests(&insp);
        self.factory.halt_inspector(&insp);
        self.respond(Kind::Close { handle });
    }

    fn handle_set_freq(&self, handle: u64, freq: f64) {
        let Some(insp) = self.lookup(handle) else {
            self.respond(Kind::WrongHandle);
            return;
        };
        match self.request_manager.acquire_overridable(&insp) {
            Some(mut req) => {
                req.set_frequency(freq);
                req.submit();
            }
            None => self.respond(Kind::WrongHandle),
        }
    }

    fn handle_set_bandwidth(&self, handle: u64, bandwidth: f64) {
        let Some(insp) = self.lookup(handle) else {
            self.respond(Kind::WrongHandle);
            return;
        };
        match self.request_manager.acquire_overridable(&insp) {
            Some(mut req) => {
                req.set_bandwidth(bandwidth);
                req.submit();
            }
            None => self.respond(Kind::WrongHandle),
        }
    }

    fn handle_set_watermark(&self, handle: u64, watermark: usize) {
        let Some(insp) = self.lookup(handle) else {
            self.respond(Kind::WrongHandle);
            return;
        };
        let mut ring = insp.ring.lock().unwrap();
        let bounded = watermark.min(ring.capacity());
        ring.set_watermark(bounded);
    }

    fn handle_set_tle(&self, handle: u64, line1: &str, line2: &str) {
        let Some(insp) = self.lookup(handle) else {
            self.respond(Kind::WrongHandle);
            return;
        };
        let Some(qth) = self.qth else {
            self.respond(Kind::InvalidCorrection("no QTH configured".into()));
            return;
        };
        match TleCorrector::new(format!("handle-{handle}"), line1, line2, qth) {
            Ok(corrector) => {
                *insp.corrector.lock().unwrap() = Some(Arc::new(corrector));
            }
            Err(e) => self.respond(Kind::InvalidCorrection(e.to_string())),
        }
    }
}
