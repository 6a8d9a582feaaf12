// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

use super::super::*;
use super::*;

#[test]
fn test_nack_decrements_retry_count() {
    let (mut bus, _) = scripted_bus(1, None);
    assert_eq!(retries(&bus, SCRIPTED_ID), 3);

    command(&mut bus, SCRIPTED_ID, cmd::STATUS);
    assert_eq!(retries(&bus, SCRIPTED_ID), 2);

    command(&mut bus, SCRIPTED_ID, cmd::STATUS);
    assert_eq!(retries(&bus, SCRIPTED_ID), 1);
    assert!(!bus.registry().lookup(SCRIPTED_ID).unwrap().unresponsive);
}

#[test]
fn test_handler_nack_counts_too() {
    let (mut bus, _) = scripted_bus(1, Some(Response::Nack));

    assert_eq!(
        command(&mut bus, SCRIPTED_ID, cmd::STATUS),
        Dispatch::Posted(rsp::NACK)
    );
    assert_eq!(retries(&bus, SCRIPTED_ID), 2);
}

#[test]
fn test_success_keeps_retry_count() {
    let (mut bus, _) = scripted_bus(1, Some(Response::Ack(1)));

    command(&mut bus, SCRIPTED_ID, cmd::STATUS);
    command(&mut bus, SCRIPTED_ID, cmd::STATUS);

    assert_eq!(retries(&bus, SCRIPTED_ID), 3);
}

#[test]
fn test_exhausted_device_short_circuits() {
    let (mut bus, calls) = scripted_bus(1, None);

    for _ in 0..3 {
        command(&mut bus, SCRIPTED_ID, cmd::STATUS);
    }
    assert_eq!(calls.get(), 3);
    assert_eq!(retries(&bus, SCRIPTED_ID), 0);
    assert!(bus.registry().lookup(SCRIPTED_ID).unwrap().unresponsive);

    assert_eq!(
        command(&mut bus, SCRIPTED_ID, cmd::STATUS),
        Dispatch::Posted(rsp::NACK)
    );
    assert_eq!(calls.get(), 3);
    assert_eq!(retries(&bus, SCRIPTED_ID), 0);
}

#[test]
fn test_poll_skips_unresponsive() {
    let (mut bus, calls) = scripted_bus(1, None);
    for _ in 0..3 {
        command(&mut bus, SCRIPTED_ID, cmd::STATUS);
    }

    assert!(bus.poll().is_empty());
    assert_eq!(calls.get(), 3);
}

#[test]
fn test_announce_revives_device() {
    let (mut bus, calls) = scripted_bus(1, None);
    for _ in 0..3 {
        command(&mut bus, SCRIPTED_ID, cmd::STATUS);
    }

    bus.announce(SCRIPTED_ID, 1, false).unwrap();

    assert!(!bus.registry().lookup(SCRIPTED_ID).unwrap().unresponsive);
    assert_eq!(retries(&bus, SCRIPTED_ID), 3);
    command(&mut bus, SCRIPTED_ID, cmd::STATUS);
    assert_eq!(calls.get(), 4);
}

#[test]
fn test_power_on_revives_device() {
    let (mut bus, _) = scripted_bus(1, None);
    for _ in 0..3 {
        command(&mut bus, SCRIPTED_ID, cmd::STATUS);
    }

    bus.power_on();

    assert!(!bus.registry().lookup(SCRIPTED_ID).unwrap().unresponsive);
    assert_eq!(retries(&bus, SCRIPTED_ID), 3);
}
