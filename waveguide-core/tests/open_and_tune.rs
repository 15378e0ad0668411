// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! Open an inspector, retune it, and close it (end-to-end scenario).

mod support;

use std::sync::Arc;
use std::time::Duration;

use waveguide_core::analyzer::Analyzer;
use waveguide_core::mailbox::Mailbox;
use waveguide_core::messages::{tag, AnalyzerParams, InspectorMessage, Message, OpenRequest};

use support::{endless_config, EndlessTone};

#[test]
fn open_tune_and_close_round_trip() {
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

    assert!(analyzer.open_inspector(OpenRequest {
        class: "raw".into(),
        fc: 1_000.0,
        bandwidth: 8_000.0,
        precise: false,
    }));

    let handle = match analyzer.read_inspector() {
        InspectorMessage::OpenResponse(resp) => {
            assert!(resp.equiv_fs > 0.0);
            assert!(resp.bandwidth > 0.0);
            resp.handle
        }
        other => panic!("expected OpenResponse, got {other:?}"),
    };

    assert!(analyzer.set_frequency(101_000_000.0));
    let info = analyzer.source_info();
    assert_eq!(info.frequency, 101_000_000.0);

    analyzer.write(
        tag::INSPECTOR,
        Message::Inspector(InspectorMessage::SetBandwidth {
            handle,
            bandwidth: 4_000.0,
        }),
    );

    analyzer.write(tag::INSPECTOR, Message::Inspector(InspectorMessage::Close { handle }));
    match analyzer.read_inspector() {
        InspectorMessage::Close { handle: closed } => assert_eq!(closed, handle),
        other => panic!("expected Close, got {other:?}"),
    }

    // Closing twice reports a wrong handle rather than panicking.
    analyzer.write(tag::INSPECTOR, Message::Inspector(InspectorMessage::Close { handle }));
    match analyzer.read_inspector() {
        InspectorMessage::WrongHandle => {}
        other => panic!("expected WrongHandle, got {other:?}"),
    }

    analyzer.halt(Duration::from_secs(1));
}
