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

use adamnet::core::config::BusConfig;
use adamnet::core::control_block::dcb;
use adamnet::core::device::{cmd, KEYBOARD_ID, NET_CLOCK_ID};
use adamnet::core::frame::Response;
use adamnet::core::{AdamNet, BusMessage};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

fn default_bus() -> AdamNet {
    AdamNet::from_config(&BusConfig::default()).unwrap()
}

fn dispatch_benchmark(c: &mut Criterion) {
    c.bench_function("dispatch_status", |b| {
        let mut bus = default_bus();
        b.iter(|| {
            black_box(bus.dispatch(BusMessage::Device {
                device_id: black_box(NET_CLOCK_ID),
                command: cmd::STATUS,
            }));
        });
    });

    c.bench_function("dispatch_unknown_device", |b| {
        let mut bus = default_bus();
        b.iter(|| {
            black_box(bus.dispatch(BusMessage::Device {
                device_id: black_box(0x08),
                command: cmd::STATUS,
            }));
        });
    });

    c.bench_function("poll", |b| {
        let mut bus = default_bus();
        b.iter(|| {
            black_box(bus.poll());
        });
    });
}

fn host_interface_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("host_interface");

    group.bench_function("read8", |b| {
        let bus = default_bus();
        let address = bus.dcb_address(0, dcb::CMD_STAT);
        b.iter(|| {
            black_box(bus.read8(black_box(address)));
        });
    });

    // Plain field write, no dispatch
    group.bench_function("write8_field", |b| {
        let mut bus = default_bus();
        let address = bus.dcb_address(0, dcb::BUF_LEN_LO);
        b.iter(|| {
            bus.write8(black_box(address), black_box(1));
        });
    });

    // Receive and Ack on the keyboard, one key per iteration
    group.bench_function("keyboard_receive", |b| {
        let mut bus = default_bus();
        let handle = bus.keyboard().unwrap();
        let slot = bus.registry().lookup(KEYBOARD_ID).unwrap().slot as usize;
        let command = bus.dcb_address(slot, dcb::CMD_STAT);
        b.iter(|| {
            handle.push(u32::from(b'a'));
            bus.write8(command, cmd::RECEIVE);
            bus.write8(command, cmd::ACK);
        });
    });

    group.finish();
}

fn frame_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame");

    for size in [1usize, 64, 1024].iter() {
        let response = Response::Send(vec![0x5A; *size]);
        group.bench_with_input(BenchmarkId::new("encode", size), size, |b, _| {
            b.iter(|| {
                black_box(response.encode(black_box(1024)));
            });
        });

        let frame = response.encode(1024);
        group.bench_with_input(BenchmarkId::new("decode", size), size, |b, _| {
            b.iter(|| {
                black_box(Response::from_wire(black_box(frame.as_bytes())));
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    dispatch_benchmark,
    host_interface_benchmark,
    frame_benchmark
);
criterion_main!(benches);
