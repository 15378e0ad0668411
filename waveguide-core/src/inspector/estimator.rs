// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! Estimator class trait and registry (spec §4.9 "Estimator loop"). The
//! concrete estimators (baud rate, non-linear diff, cyclostationary) are
//! out of scope (spec.md §1); this crate only supplies the contract and
//! one toy implementation under `testkit`.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

use num_complex::Complex32;

/// A scalar measurement algorithm fed the same buffers as the sampler.
pub trait EstimatorClass: Send + Sync {
    fn name(&self) -> &str;

    /// Process a batch of samples, returning a value if one is ready to
    /// be emitted this cycle.
    fn feed(&self, samples: &[Complex32]) -> Option<f32>;
}

fn registry() -> &'static RwLock<HashMap<String, Arc<dyn EstimatorClass>>> {
    static REGISTRY: OnceLock<RwLock<HashMap<String, Arc<dyn EstimatorClass>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

pub fn register_estimator_class(class: Arc<dyn EstimatorClass>) {
    registry().write().unwrap().insert(class.name().to_string(), class);
}

pub fn lookup_estimator_class(name: &str) -> Option<Arc<dyn EstimatorClass>> {
    registry().read().unwrap().get(name).cloned()
}

/// Sorted for a stable index-to-name mapping: callers build per-inspector
/// `EstimatorInstance` lists from this order and must see the same order
/// every time, since `Estimator { index, .. }` addresses this list
/// positionally.
pub fn estimator_class_names() -> Vec<String> {
    let mut names: Vec<String> = registry().read().unwrap().keys().cloned().collect();
    names.sort();
    names
}

/// A live estimator attached to one inspector: a class reference plus
/// per-instance enable flag and emission cadence state.
pub struct EstimatorInstance {
    pub class: Arc<dyn EstimatorClass>,
    pub enabled: bool,
    pub update_interval: Duration,
    last_emit: Option<std::time::Instant>,
}

impl EstimatorInstance {
    pub fn new(class: Arc<dyn EstimatorClass>, update_interval: Duration) -> Self {
        Self {
            class,
            enabled: true,
            update_interval,
            last_emit: None,
        }
    }

    /// Whether the update interval has elapsed since the last emission.
    pub fn due(&self, now: std::time::Instant) -> bool {
        match self.last_emit {
            None => true,
            Some(last) => now.duration_since(last) >= self.update_interval,
        }
    }

    pub fn mark_emitted(&mut self, now: std::time::Instant) {
        self.last_emit = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConstantEstimator(f32);
    impl EstimatorClass for ConstantEstimator {
        fn name(&self) -> &str {
            "const-test"
        }
        fn feed(&self, _samples: &[Complex32]) -> Option<f32> {
            Some(self.0)
        }
    }

    #[test]
    fn registry_roundtrip() {
        register_estimator_class(Arc::new(ConstantEstimator(42.0)));
        let class = lookup_estimator_class("const-test").expect("registered");
        assert_eq!(class.feed(&[]), Some(42.0));
        assert!(estimator_class_names().contains(&"const-test".to_string()));
    }

    #[test]
    fn instance_due_cadence() {
        let class: Arc<dyn EstimatorClass> = Arc::new(ConstantEstimator(1.0));
        let mut inst = EstimatorInstance::new(class, Duration::from_millis(10));
        let t0 = std::time::Instant::now();
        assert!(inst.due(t0));
        inst.mark_emitted(t0);
        assert!(!inst.due(t0));
        assert!(inst.due(t0 + Duration::from_millis(20)));
    }
}
