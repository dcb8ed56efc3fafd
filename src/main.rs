/*
 *  main.rs
 *
 *  LyMatrix - metrics in lights
 *	(c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::MissedTickBehavior;

use lymatrix::app;
use lymatrix::config::{self, Cli};
use lymatrix::display::DisplayError;
use lymatrix::func_timer::FunctionTimer;
use lymatrix::matrix::{PortBackend, SystemPorts};
use lymatrix::metrics::SystemSampler;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

fn list_ports(backend: &dyn PortBackend) -> Result<()> {
    let ports = backend.list_usb_ports().context("cannot enumerate serial ports")?;
    if ports.is_empty() {
        println!("no USB serial ports found");
    }
    for p in ports {
        println!("{}\t{:04x}:{:04x}", p.name, p.vendor_id, p.product_id);
    }
    Ok(())
}

/// Asynchronously waits for a SIGINT, SIGTERM, or SIGHUP signal.
async fn signal_handler() -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli).context("configuration")?;
    let settings = cfg.settings();

    env_logger::Builder::from_env(Env::default().default_filter_or(settings.log_level.as_str()))
        .format_timestamp_secs()
        .init();

    info!("{} - metrics in lights", env!("CARGO_PKG_NAME"));
    info!("v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);

    if cli.dump_config {
        print!("{}", serde_yaml::to_string(&cfg).context("cannot render config")?);
        return Ok(());
    }

    let backend: Arc<dyn PortBackend> = Arc::new(SystemPorts);
    if cli.list_ports {
        return list_ports(backend.as_ref());
    }

    let mut matrices = app::setup(backend, &settings).context("cannot bring up a matrix")?;

    info!(
        "display mode {}, polling every {:?}",
        settings.display_mode.as_str(),
        settings.poll_interval
    );

    let mut sampler = SystemSampler::new(settings.warning_threshold, settings.critical_threshold);
    let mut ticker = tokio::time::interval(settings.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = signal_handler();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            res = &mut shutdown => {
                if let Err(e) = res {
                    error!("signal handling failed: {}", e);
                }
                break;
            }
            _ = ticker.tick() => {
                let _timer = FunctionTimer::with_budget("update cycle", settings.poll_interval);
                let stats = sampler.sample();
                match matrices.update(&stats) {
                    Ok(()) => {}
                    Err(e @ DisplayError::NotImplemented(_)) => {
                        error!("{}", e);
                        break;
                    }
                    Err(e) => warn!("display update failed: {}", e),
                }
            }
        }
    }

    info!("Main application exiting. Blanking matrices and closing ports.");
    if let Err(e) = matrices.shutdown() {
        error!("disconnect failed: {}", e);
    }

    Ok(())
}
