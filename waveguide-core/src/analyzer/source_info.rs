// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! Source-info publication (spec §4.12): a mutable snapshot kept by the
//! analyzer, republished in full whenever a meaningful field changes.

use std::sync::{Arc, Mutex};

use crate::mailbox::Mailbox;
use crate::messages::{tag, Message};
use crate::source::SourceInfo;

pub struct SourceInfoPublisher {
    state: Mutex<SourceInfo>,
    outbox: Arc<Mailbox<Message>>,
}

impl SourceInfoPublisher {
    pub fn new(initial: SourceInfo, outbox: Arc<Mailbox<Message>>) -> Self {
        Self {
            state: Mutex::new(initial),
            outbox,
        }
    }

    pub fn snapshot(&self) -> SourceInfo {
        self.state.lock().unwrap().clone()
    }

    /// Idempotent publish primitive (spec §4.12 "commit_source_info"):
    /// emits the current snapshot unconditionally.
    pub fn commit(&self) {
        self.outbox.write(tag::SOURCE_INFO, Message::SourceInfo(self.snapshot()));
    }

    /// Apply a field mutation and publish iff it actually changed.
    pub fn update<F: FnOnce(&mut SourceInfo) -> bool>(&self, f: F) {
        let changed = {
            let mut state = self.state.lock().unwrap();
            f(&mut state)
        };
        if changed {
            self.commit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_publishes_only_on_change() {
        let outbox = Arc::new(Mailbox::new());
        let publisher = SourceInfoPublisher::new(SourceInfo::default(), outbox.clone());

        publisher.update(|info| {
            if info.frequency == 100.0 {
                false
            } else {
                info.frequency = 100.0;
                true
            }
        });
        assert_eq!(outbox.len(), 1);

        publisher.update(|info| {
            if info.frequency == 100.0 {
                false
            } else {
                info.frequency = 100.0;
                true
            }
        });
        assert_eq!(outbox.len(), 1);
    }
}
