// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! Coalesces "overridable" per-inspector tuning updates so clients never
//! wait for an intermediate request to apply — only the latest one
//! matters (spec §4.8).
//!
//! The original leaves its request-manager mutex locked across the
//! acquire/submit (or acquire/discard) call pair so no other thread can
//! observe a half-updated record. Rust's `MutexGuard` makes that
//! discipline type-safe instead of comment-only: `acquire_overridable`
//! returns an `OverridableHandle` that owns the guard, and only
//! `submit`/`discard` (which consume it) release the lock.

use std::sync::{Arc, Mutex};

use super::Inspector;

/// A pending per-inspector tuning update (spec §3 "Overridable request
/// record").
#[derive(Debug, Default)]
pub struct OverridableRecord {
    pub dead: bool,
    pub new_frequency: Option<f64>,
    pub new_bandwidth: Option<f64>,
}

impl OverridableRecord {
    fn reset(mut self) -> Self {
        self.dead = false;
        self.new_frequency = None;
        self.new_bandwidth = None;
        self
    }
}

struct ManagerState {
    alloc_list: Vec<Arc<Inspector>>,
    freelist: Vec<OverridableRecord>,
}

pub struct RequestManager {
    state: Mutex<ManagerState>,
}

impl Default for RequestManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ManagerState {
                alloc_list: Vec::new(),
                freelist: Vec::new(),
            }),
        }
    }

    /// Acquire the pending record for `insp`, creating one if none is
    /// outstanding yet. Returns `None` (mutex released) if the inspector
    /// isn't `Running`. The returned handle holds the manager mutex until
    /// `submit` or `discard` consumes it.
    pub fn acquire_overridable<'a>(
        &'a self,
        insp: &Arc<Inspector>,
    ) -> Option<OverridableHandle<'a>> {
        let guard = self.state.lock().unwrap();
        if !insp.is_running() {
            return None;
        }
        let existing = insp.pending_overridable.lock().unwrap().take();
        let (record, already_pending) = match existing {
            Some(r) => (r, true),
            None => (OverridableRecord::default(), false),
        };
        Some(OverridableHandle {
            guard,
            insp: insp.clone(),
            record,
            already_pending,
        })
    }

    /// Drop any pending record for `insp` without applying it, e.g. when
    /// halting (spec §4.8 "clear_requests").
    pub fn clear_requests(&self, insp: &Arc<Inspector>) {
        let mut state = self.state.lock().unwrap();
        state.alloc_list.retain(|i| !Arc::ptr_eq(i, insp));
        if let Some(record) = insp.pending_overridable.lock().unwrap().take() {
            insp.refs.release("overridable");
            state.freelist.push(record.reset());
        }
    }

    /// Apply every pending record and return inspectors back to
    /// `Running` bookkeeping (spec §4.8 "commit_overridable"). `apply`
    /// is called once per record still alive with (frequency?,
    /// bandwidth?).
    pub fn commit_overridable<F: FnMut(&Arc<Inspector>, Option<f64>, Option<f64>)>(
        &self,
        mut apply: F,
    ) {
        let mut state = self.state.lock().unwrap();
        let pending = std::mem::take(&mut state.alloc_list);
        for insp in pending {
            let record = insp.pending_overridable.lock().unwrap().take();
            if let Some(record) = record {
                if !record.dead {
                    apply(&insp, record.new_frequency, record.new_bandwidth);
                }
                insp.refs.release("overridable");
                state.freelist.push(record.reset());
            }
        }
    }

    pub fn alloc_list_len(&self) -> usize {
        self.state.lock().unwrap().alloc_list.len()
    }
}

/// An acquired, not-yet-submitted overridable record. Must be consumed by
/// `submit` or `discard` — dropping it bare would silently discard, so
/// there is deliberately no `Drop` impl beyond Rust's default (the
/// manager mutex is simply released, matching a bare discard).
pub struct OverridableHandle<'a> {
    guard: std::sync::MutexGuard<'a, ManagerState>,
    insp: Arc<Inspector>,
    record: OverridableRecord,
    already_pending: bool,
}

impl<'a> OverridableHandle<'a> {
    pub fn set_frequency(&mut self, freq: f64) {
        self.record.new_frequency = Some(freq);
    }

    pub fn set_bandwidth(&mut self, bandwidth: f64) {
        self.record.new_bandwidth = Some(bandwidth);
    }

    /// Commit this record as the inspector's one pending update (spec
    /// §4.8 "submit_overridable").
    pub fn submit(mut self) {
        if !self.already_pending {
            self.guard.alloc_list.push(self.insp.clone());
            self.insp.refs.acquire("overridable");
        }
        *self.insp.pending_overridable.lock().unwrap() = Some(std::mem::take(&mut self.record));
    }

    /// Abandon this acquisition. If a record was already pending it is
    /// restored unchanged (spec §4.8 "discard_overridable").
    pub fn discard(mut self) {
        if self.already_pending {
            *self.insp.pending_overridable.lock().unwrap() = Some(std::mem::take(&mut self.record));
        } else {
            self.guard.freelist.push(std::mem::take(&mut self.record).reset());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspector::{Inspector, InspectorState, SamplingInfo};

    fn test_inspector() -> Arc<Inspector> {
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
        insp.transition(InspectorState::Running);
        insp
    }

    #[test]
    fn r1_coalesces_to_one_record_with_latest_values() {
        let mgr = RequestManager::new();
        let insp = test_inspector();

        for freq in [1000.0, 2000.0, 3000.0] {
            let mut handle = mgr.acquire_overridable(&insp).expect("running");
            handle.set_frequency(freq);
            handle.submit();
        }
        assert_eq!(mgr.alloc_list_len(), 1);

        let mut seen = None;
        mgr.commit_overridable(|_insp, freq, _bw| seen = freq);
        assert_eq!(seen, Some(3000.0));
        assert_eq!(mgr.alloc_list_len(), 0);
    }

    #[test]
    fn r2_clear_requests_removes_pending_record() {
        let mgr = RequestManager::new();
        let insp = test_inspector();
        let mut handle = mgr.acquire_overridable(&insp).unwrap();
        handle.set_frequency(5000.0);
        handle.submit();
        assert_eq!(mgr.alloc_list_len(), 1);

        mgr.clear_requests(&insp);
        assert_eq!(mgr.alloc_list_len(), 0);

        let mut committed = false;
        mgr.commit_overridable(|_, _, _| committed = true);
        assert!(!committed);
    }

    #[test]
    fn acquire_on_non_running_inspector_returns_none() {
        let mgr = RequestManager::new();
        let insp = Inspector::new(
            2,
            SamplingInfo {
                equiv_samp_rate: 1000.0,
                bandwidth: 500.0,
                center_freq: 0.0,
                fft_size: 512,
                decimation: 1,
            },
        );
        assert!(mgr.acquire_overridable(&insp).is_none());
    }

    #[test]
    fn discard_returns_freelist_record_not_alloc_listed() {
        let mgr = RequestManager::new();
        let insp = test_inspector();
        let mut handle = mgr.acquire_overridable(&insp).unwrap();
        handle.set_bandwidth(1234.0);
        handle.discard();
        assert_eq!(mgr.alloc_list_len(), 0);
    }
}
