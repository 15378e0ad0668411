// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! Many concurrent halt requests tear the analyzer down exactly once,
//! without panicking or hanging.

mod support;

use std::sync::Arc;
use std::time::Duration;

use waveguide_core::analyzer::Analyzer;
use waveguide_core::mailbox::Mailbox;
use waveguide_core::messages::AnalyzerParams;

use support::{endless_config, EndlessTone};

#[test]
fn concurrent_halt_requests_are_idempotent() {
    let source = Box::new(EndlessTone::new(48_000, 4_000.0));
    let outbox = Arc::new(Mailbox::new());
    let analyzer = Analyzer::new(
        AnalyzerParams::default(),
        source,
        &endless_config(),
        4,
        outbox.clone(),
    );

    assert!(analyzer.wait_until_ready(Duration::from_secs(2)));

    let mut threads = Vec::new();
    for _ in 0..8 {
        let analyzer = analyzer.clone();
        threads.push(std::thread::spawn(move || {
            analyzer.request_halt();
        }));
    }
    for t in threads {
        t.join().unwrap();
    }

    analyzer.halt(Duration::from_secs(2));

    // A second halt after the workers are already torn down must not hang
    // or panic.
    analyzer.halt(Duration::from_secs(1));
}
