// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Duration;

#[test]
fn exactly_on_boundary_is_not_stale() {
    let last_seen = Utc::now() - Duration::seconds(90);
    let now = last_seen + Duration::seconds(90);
    assert!(!is_stale(now, last_seen, Duration::seconds(90)));
}

#[test]
fn one_second_past_boundary_is_stale() {
    let last_seen = Utc::now() - Duration::seconds(91);
    let now = last_seen + Duration::seconds(91);
    assert!(is_stale(now, last_seen, Duration::seconds(90)));
}

#[test]
fn well_within_timeout_is_not_stale() {
    let last_seen = Utc::now();
    assert!(!is_stale(last_seen, last_seen, Duration::seconds(90)));
}
