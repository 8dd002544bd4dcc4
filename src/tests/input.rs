// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

use crate::testing;
use crate::{SoftInput, MAX_QUEUE_SIZE};

#[test]
fn inactive_input_drops_pushes() {
    testing::init();
    let input = SoftInput::new();

    input.push_input(&testing::solid_frame(32, 16, testing::RED, 0));

    assert_eq!(input.queue_len(), 0);
    assert!(input.pop_input().is_none());
    assert!(input.front().is_none());
    assert!(input.back().is_none());
}

#[test]
fn deactivation_clears_the_queue() {
    testing::init();
    let input = SoftInput::new();
    input.set_active(true);

    input.push_input(&testing::sync_frame(32, 16, testing::RED, 0, 100));
    input.push_input(&testing::sync_frame(32, 16, testing::RED, 3000, 200));
    assert_eq!(input.queue_len(), 2);

    input.set_active(false);
    assert_eq!(input.queue_len(), 0);
    assert!(!input.is_active());
}

#[test]
fn pop_advances_but_keeps_the_last_frame() {
    testing::init();
    let input = SoftInput::new();
    input.set_active(true);

    input.push_input(&testing::sync_frame(32, 16, testing::RED, 0, 100));
    input.push_input(&testing::sync_frame(32, 16, testing::GREEN, 3000, 200));

    let first = input.pop_input().unwrap();
    assert_eq!(testing::y_at(&first, 0, 0), testing::RED.y);
    assert_eq!(input.queue_len(), 1);

    // the only remaining frame is the current still image: handed out
    // repeatedly, never removed
    let second = input.pop_input().unwrap();
    assert_eq!(testing::y_at(&second, 0, 0), testing::GREEN.y);
    let again = input.pop_input().unwrap();
    assert_eq!(testing::y_at(&again, 0, 0), testing::GREEN.y);
    assert_eq!(input.queue_len(), 1);
}

#[test]
fn queue_never_exceeds_the_bound() {
    testing::init();
    let input = SoftInput::new();
    input.set_active(true);

    for i in 0..20u32 {
        input.push_input(&testing::sync_frame(32, 16, testing::RED, i * 3000, i64::from(i)));
        assert!(input.queue_len() <= MAX_QUEUE_SIZE);
    }
}

#[test]
fn overflow_clears_queue_and_demotes_sync_for_good() {
    testing::init();
    let input = SoftInput::new();
    input.set_active(true);

    for i in 0..MAX_QUEUE_SIZE as u32 {
        input.push_input(&testing::sync_frame(32, 16, testing::RED, i * 3000, i64::from(i)));
    }
    assert_eq!(input.queue_len(), MAX_QUEUE_SIZE);
    assert!(input.is_sync_enabled());

    // the sixth push overflows: queue cleared, then the new frame enqueued
    input.push_input(&testing::sync_frame(32, 16, testing::GREEN, 15000, 5));
    assert_eq!(input.queue_len(), 1);
    assert!(!input.is_sync_enabled());

    // demotion is permanent, even for frames that still carry sync
    input.push_input(&testing::sync_frame(32, 16, testing::BLUE, 18000, 6));
    assert!(!input.is_sync_enabled());
    assert_eq!(input.queue_len(), 1, "desynced input keeps only the newest frame");
}

#[test]
fn frames_without_sync_collapse_the_queue() {
    testing::init();
    let input = SoftInput::new();
    input.set_active(true);

    input.push_input(&testing::sync_frame(32, 16, testing::RED, 0, 100));
    input.push_input(&testing::sync_frame(32, 16, testing::RED, 3000, 200));
    assert_eq!(input.queue_len(), 2);

    input.push_input(&testing::solid_frame(32, 16, testing::GREEN, 6000));
    assert_eq!(input.queue_len(), 1, "unsynced frame replaces the backlog");
    assert!(!input.is_sync_enabled(), "last frame carried no sync bit");

    // a sync-capable frame restores sync as long as the input was never
    // demoted by overflow
    input.push_input(&testing::sync_frame(32, 16, testing::BLUE, 9000, 300));
    assert!(input.is_sync_enabled());
}

#[test]
fn sync_frame_lookup_advances_to_the_target() {
    testing::init();
    let input = SoftInput::new();
    input.set_active(true);

    for (color, sync) in [
        (testing::RED, 100),
        (testing::GREEN, 200),
        (testing::BLUE, 300),
    ] {
        input.push_input(&testing::sync_frame(32, 16, color, 0, sync));
    }

    let frame = input.get_sync_frame(250).unwrap();
    assert_eq!(frame.sync_time_stamp, 300);
    assert_eq!(input.queue_len(), 1);
}

#[test]
fn sync_frame_lookup_with_sentinel_holds_the_front() {
    testing::init();
    let input = SoftInput::new();
    input.set_active(true);

    input.push_input(&testing::sync_frame(32, 16, testing::RED, 0, 100));
    input.push_input(&testing::sync_frame(32, 16, testing::GREEN, 3000, 200));

    let frame = input.get_sync_frame(-1).unwrap();
    assert_eq!(frame.sync_time_stamp, 100);
    assert_eq!(input.queue_len(), 2, "sentinel lookup does not advance");
}

#[test]
fn sync_frame_lookup_never_drains_the_queue() {
    testing::init();
    let input = SoftInput::new();
    input.set_active(true);

    input.push_input(&testing::sync_frame(32, 16, testing::RED, 0, 100));
    input.push_input(&testing::sync_frame(32, 16, testing::GREEN, 3000, 200));

    // target beyond every queued timestamp: stops at the last frame
    let frame = input.get_sync_frame(999).unwrap();
    assert_eq!(frame.sync_time_stamp, 200);
    assert_eq!(input.queue_len(), 1);
}

#[test]
fn sync_needs_input_and_frame_bit() {
    testing::init();
    let input = SoftInput::new();
    input.set_active(true);

    assert!(!input.is_sync_enabled(), "no frame seen yet");

    input.push_input(&testing::solid_frame(32, 16, testing::RED, 0));
    assert!(!input.is_sync_enabled());

    input.push_input(&testing::sync_frame(32, 16, testing::RED, 3000, 100));
    assert!(input.is_sync_enabled());
}
