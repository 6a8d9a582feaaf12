// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;

use adamnet::core::config::BusConfig;
use adamnet::core::control_block::dcb;
use adamnet::core::device::{cmd, KEYBOARD_ID};
use adamnet::core::frame::rsp;
use adamnet::core::keys;
use adamnet::core::registry::DeviceRecord;
use adamnet::core::save_state::StateSave;
use adamnet::core::{AdamNet, Dispatch};
use clap::Parser;
use log::{debug, error, info, warn};
use serde::Serialize;

/// AdamNet bus driver
///
/// Powers on a bus, types text into the keyboard and drains it the way the
/// ADAM's EOS does: one Receive per frame through the keyboard DCB.
#[derive(Parser)]
#[command(name = "adamnet")]
#[command(about = "AdamNet peripheral bus emulator", long_about = None)]
struct Args {
    /// Bus configuration file (TOML); falls back to $ADAMNET_CONFIG
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Text to type on the keyboard
    #[arg(short = 't', long = "type")]
    text: Option<String>,

    /// Number of frames to run
    #[arg(short = 'n', long, default_value = "60")]
    frames: u64,

    /// Write a bus snapshot here when done
    #[arg(short = 's', long)]
    save_state: Option<PathBuf>,

    /// Print a JSON report to stdout
    #[arg(long)]
    json: bool,
}

/// Summary printed with `--json`
#[derive(Serialize)]
struct Report {
    frames: u64,
    pcb_address: u16,
    received: String,
    codes: Vec<u8>,
    devices: Vec<DeviceRecord>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("adamnet v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let config_path = args
        .config
        .clone()
        .or_else(|| std::env::var_os("ADAMNET_CONFIG").map(PathBuf::from));
    let config = match &config_path {
        Some(path) => BusConfig::load_from_file(path).map_err(|e| {
            error!("Failed to load configuration: {}", e);
            e
        })?,
        None => BusConfig::default(),
    };

    let mut bus = AdamNet::from_config(&config)?;

    if let Some(text) = &args.text {
        let mut dropped = 0;
        for key in keys::text_to_keys(text) {
            if !bus.push_key(key) {
                dropped += 1;
            }
        }
        if dropped > 0 {
            warn!("{} key(s) dropped by the keyboard queue", dropped);
        }
    }

    let mut codes = Vec::new();
    for frame in 0..args.frames {
        bus.poll();
        if let Some(code) = receive_key(&mut bus)? {
            debug!("Frame {}: key 0x{:02X}", frame, code);
            codes.push(code);
        }
    }

    let received: String = codes
        .iter()
        .map(|&c| match c {
            0x0D => '\n',
            0x20..=0x7E => c as char,
            _ => '?',
        })
        .collect();
    info!("Received {} key(s) in {} frame(s)", codes.len(), args.frames);
    if let Some(handle) = bus.keyboard() {
        if !handle.is_empty() {
            info!("{} key(s) still queued", handle.len());
        }
    }

    if let Some(path) = &args.save_state {
        bus.to_state()
            .with_metadata("adamnet", args.frames)
            .save_to_file(path)?;
        info!("Bus state saved to {}", path.display());
    }

    if args.json {
        let report = Report {
            frames: args.frames,
            pcb_address: bus.pcb_address(),
            received,
            codes,
            devices: bus.registry().records().copied().collect(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", received);
    }

    Ok(())
}

/// One EOS-style keyboard read through host memory
///
/// Writes Receive into the keyboard DCB; on a data response the key is
/// acknowledged with Ack.
fn receive_key(bus: &mut AdamNet) -> adamnet::core::Result<Option<u8>> {
    let slot = match bus.registry().lookup(KEYBOARD_ID) {
        Ok(record) => record.slot as usize,
        Err(_) => return Ok(None),
    };
    let command = bus.dcb_address(slot, dcb::CMD_STAT);

    bus.write(bus.dcb_address(slot, dcb::BUF_LEN_LO), 1)?;
    if bus.write(command, cmd::RECEIVE)? != Some(Dispatch::Posted(rsp::SEND)) {
        return Ok(None);
    }

    let code = bus
        .response_frame(KEYBOARD_ID)
        .and_then(|frame| frame.payload())
        .and_then(|payload| payload.first().copied());
    bus.write(command, cmd::ACK)?;
    Ok(code)
}
