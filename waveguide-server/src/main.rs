// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! Standalone bootstrap binary: resolves configuration, builds a
//! `Source`, starts the `Analyzer`, and blocks until Ctrl-C.

mod config;
mod logging;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use waveguide_core::analyzer::Analyzer;
use waveguide_core::mailbox::Mailbox;
use waveguide_core::source::{Qth, Source, SourceConfig};
use waveguide_core::testkit::ToneSource;
use waveguide_core::DynResult;

use config::{ConfigFile, ServerConfig, SourceSpec};
use logging::init_logging;

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - waveguide analyzer bootstrap");

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// Source backend to use, overriding [source].type (only "demo" is built in)
    #[arg(long = "source", value_name = "NAME")]
    source: Option<String>,
    /// Increase log verbosity (overrides [general].log_level)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn verbosity_level(count: u8) -> Option<&'static str> {
    match count {
        0 => None,
        1 => Some("debug"),
        _ => Some("trace"),
    }
}

fn build_source(spec: &SourceSpec) -> DynResult<Box<dyn Source>> {
    match spec.type_name.as_str() {
        "demo" => Ok(Box::new(ToneSource::new(
            spec.samp_rate,
            spec.tone_hz,
            spec.duration_secs,
        ))),
        other => Err(format!("unknown source type '{other}' (available: demo)").into()),
    }
}

fn build_source_config(spec: &SourceSpec, general: &config::GeneralConfig) -> SourceConfig {
    SourceConfig {
        type_name: spec.type_name.clone(),
        effective_samp_rate: spec.samp_rate,
        frequency: spec.frequency,
        lnb_freq: 0.0,
        antenna: "RX".to_string(),
        bandwidth: spec.bandwidth,
        ppm: 0.0,
        dc_remove: false,
        iq_reverse: false,
        agc: false,
        qth: match (general.latitude, general.longitude) {
            (Some(lat_deg), Some(lon_deg)) => Some(Qth {
                lat_deg,
                lon_deg,
                height_m: 0.0,
            }),
            _ => None,
        },
    }
}

fn main() -> DynResult<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", ServerConfig::example_toml());
        return Ok(());
    }

    let (mut cfg, config_path) = if let Some(ref path) = cli.config {
        (ServerConfig::load_from_file(path)?, Some(path.clone()))
    } else {
        ServerConfig::load_from_default_paths()?
    };

    if let Some(ref name) = cli.source {
        cfg.source.type_name = name.clone();
    }
    if let Some(level) = verbosity_level(cli.verbose) {
        cfg.general.log_level = Some(level.to_string());
    }

    cfg.validate()
        .map_err(|e| format!("invalid configuration: {e}"))?;

    init_logging(cfg.general.log_level.as_deref());

    if let Some(path) = config_path {
        info!("loaded configuration from {}", path.display());
    }

    let params = cfg
        .analyzer
        .to_params(cfg.source.samp_rate)
        .map_err(|e| format!("invalid [analyzer] configuration: {e}"))?;
    let source = build_source(&cfg.source)?;
    let source_config = build_source_config(&cfg.source, &cfg.general);

    info!(
        "starting analyzer (source: {}, mode: {})",
        cfg.source.type_name, cfg.analyzer.mode
    );

    let outbox = Arc::new(Mailbox::new());
    let analyzer = Analyzer::new(params, source, &source_config, 8, outbox.clone());

    if !analyzer.wait_until_ready(Duration::from_secs(5)) {
        error!("source failed to become ready within 5s");
        return Err("source did not report readiness".into());
    }
    info!("analyzer ready, waiting for Ctrl-C");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let _ = tokio::signal::ctrl_c().await;
    });

    info!("Ctrl+C received, shutting down");
    analyzer.halt(Duration::from_secs(2));

    Ok(())
}
