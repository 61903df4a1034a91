// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn build_echo_request_sets_type_code_identifier_and_sequence() {
    let packet = build_echo_request(0x1234, 0x0001);
    assert_eq!(packet[0], 8, "type must be echo request");
    assert_eq!(packet[1], 0, "code must be 0");
    assert_eq!(&packet[4..6], &0x1234u16.to_be_bytes());
    assert_eq!(&packet[6..8], &0x0001u16.to_be_bytes());
}

#[test]
fn build_echo_request_checksum_makes_packet_sum_to_zero() {
    let packet = build_echo_request(42, 7);
    // A correctly-checksummed ICMP packet sums (one's complement) to zero.
    assert_eq!(icmp_checksum(&packet), 0);
}

#[test]
fn icmp_checksum_handles_odd_length_payload() {
    let data = [0x45u8, 0x00, 0x00, 0x1c, 0x01];
    // Must not panic on the trailing unpaired byte, and must be deterministic.
    let a = icmp_checksum(&data);
    let b = icmp_checksum(&data);
    assert_eq!(a, b);
}

#[test]
fn scan_depth_basic_and_deep_are_distinct() {
    assert_ne!(ScanDepth::Basic, ScanDepth::Deep);
}
