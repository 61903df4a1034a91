// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Layout Assignment + Scheduler (spec.md §4.6). Resolves the active layout
//! for every Client once per minute and pushes `DisplayUpdate` when it
//! changes. Owns the "last pushed layout" cache exclusively.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Timelike, Utc};
use tokio::sync::RwLock;

use crate::envelope::{DisplayUpdate, Envelope};
use crate::model::{Client, Layout, Schedule, ScheduleTarget};
use crate::state::ServerState;

/// Last layout id pushed to each Client, so we only push on change. Owned
/// exclusively by the scheduler (spec.md §9).
#[derive(Default)]
pub struct SchedulerCache {
    last_pushed: RwLock<HashMap<String, Option<String>>>,
}

impl SchedulerCache {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Gather the schedules eligible at `now` that target `client` directly or
/// via its group, then resolve the winner by priority, tie-broken by most
/// recent modification (spec.md §4.6 steps 1-3; Open Question in spec.md §9).
pub fn resolve_active_schedule<'a>(
    schedules: &'a [Schedule],
    client: &Client,
    now: DateTime<Utc>,
) -> Option<&'a Schedule> {
    let today = now.date_naive();
    let weekday = now.weekday();
    let time_of_day = now.time();

    let mut eligible: Vec<&Schedule> = schedules
        .iter()
        .filter(|s| s.is_active)
        .filter(|s| s.valid_from.map(|d| d.date_naive() <= today).unwrap_or(true))
        .filter(|s| s.valid_until.map(|d| today <= d.date_naive()).unwrap_or(true))
        .filter(|s| s.days_of_week.contains(&weekday))
        // End is exclusive at the minute grain (spec.md §8 boundary behaviors).
        .filter(|s| time_of_day >= s.start_time && time_of_day < s.end_time)
        .filter(|s| match &s.target {
            ScheduleTarget::Client(id) => id == &client.id,
            ScheduleTarget::Group(group) => client.group.as_deref() == Some(group.as_str()),
        })
        .collect();

    eligible.sort_by(|a, b| b.priority.cmp(&a.priority).then(b.modified.cmp(&a.modified)));
    eligible.into_iter().next()
}

/// Resolve the layout that should be active for `client` right now: a
/// matching Schedule wins over the manual `assignedLayoutId`, which wins
/// over nothing (spec.md §4.6 step 4).
pub fn resolve_active_layout(schedules: &[Schedule], client: &Client, now: DateTime<Utc>) -> Option<String> {
    if let Some(schedule) = resolve_active_schedule(schedules, client, now) {
        return Some(schedule.layout_id.clone());
    }
    client.assigned_layout_id.clone()
}

/// Evaluate the schedule for a single client and push `DisplayUpdate` if
/// the active layout changed since the last push. A missing Layout
/// (dangling reference) is logged and treated as no layout, not an error.
pub async fn evaluate_client(state: &Arc<ServerState>, client: &Client, schedules: &[Schedule]) {
    let active_layout_id = resolve_active_layout(schedules, client, Utc::now());

    let previously_pushed = {
        let cache = state.scheduler_cache.last_pushed.read().await;
        cache.get(&client.id).cloned()
    };

    if previously_pushed.as_ref() == Some(&active_layout_id) {
        return;
    }

    if let Some(ref layout_id) = active_layout_id {
        let layout = match state.repository.layouts.get(layout_id).await {
            Ok(Some(l)) => l,
            Ok(None) => {
                tracing::warn!(client_id = %client.id, layout_id, "scheduled layout not found, skipping push");
                return;
            }
            Err(e) => {
                tracing::warn!(client_id = %client.id, layout_id, err = %e, "repository error resolving layout");
                return;
            }
        };
        push_layout(state, &client.id, &layout).await;
    }

    state.scheduler_cache.last_pushed.write().await.insert(client.id.clone(), active_layout_id);
}

async fn push_layout(state: &Arc<ServerState>, client_id: &str, layout: &Layout) {
    let Some(session) = state.sessions.lookup_client(client_id).await else { return };
    let envelope = Envelope::DisplayUpdate(DisplayUpdate {
        layout_id: layout.id.clone(),
        elements: layout.elements.clone(),
        data_bindings: serde_json::Value::Null,
    });
    if session.send(&envelope).is_ok() {
        tracing::info!(client_id, layout_id = %layout.id, "pushed display update");
    }
}

/// Evaluate every Client once. Invoked by the minute tick and by
/// `AssignLayout` for an immediate single-client re-evaluation.
async fn evaluate_all(state: &Arc<ServerState>) {
    let schedules = match state.repository.schedules.list().await {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(err = %e, "scheduler tick: failed to list schedules");
            return;
        }
    };
    let clients = match state.repository.clients.list().await {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(err = %e, "scheduler tick: failed to list clients");
            return;
        }
    };
    for client in &clients {
        evaluate_client(state, client, &schedules).await;
    }
}

/// Re-evaluate a single client immediately (`AssignLayout` handler, spec.md §4.6).
pub async fn evaluate_one(state: &Arc<ServerState>, client_id: &str) {
    let schedules = match state.repository.schedules.list().await {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(err = %e, "immediate scheduler evaluation: failed to list schedules");
            return;
        }
    };
    match state.repository.clients.get(client_id).await {
        Ok(Some(client)) => evaluate_client(state, &client, &schedules).await,
        Ok(None) => {}
        Err(e) => tracing::warn!(client_id, err = %e, "immediate scheduler evaluation: repository error"),
    }
}

/// Spawn the background task that ticks on the 0th second of every minute.
///
/// Runs as a single logical task; one tick's evaluation is always awaited to
/// completion before the next, but client evaluation does no long blocking
/// I/O, so one slow tick cannot meaningfully delay the next (spec.md §4.6).
pub fn spawn_scheduler(state: Arc<ServerState>) {
    tokio::spawn(async move {
        loop {
            let sleep_duration = duration_until_next_minute_boundary(Utc::now());
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = tokio::time::sleep(sleep_duration) => {}
            }
            evaluate_all(&state).await;
        }
    });
}

fn duration_until_next_minute_boundary(now: DateTime<Utc>) -> std::time::Duration {
    let seconds_into_minute = now.second() as u64;
    let nanos = now.timestamp_subsec_nanos() as u64;
    let elapsed_nanos = seconds_into_minute * 1_000_000_000 + nanos;
    let minute_nanos = 60_000_000_000u64;
    std::time::Duration::from_nanos(minute_nanos - elapsed_nanos.min(minute_nanos))
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
