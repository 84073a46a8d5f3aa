//! # Event Bus Metrics
//!
//! Per-channel and bus-wide counters. Raise counts are recorded at admission;
//! the derived events-per-minute rate is only recomputed when the rolling
//! window closes, so reading metrics never races a dispatch in progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of one channel's activity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelMetrics {
    pub channel_id: String,
    pub channel_type: String,
    pub total_raised: u64,
    pub raised_this_session: u64,
    pub events_per_minute: f64,
    pub listener_count: usize,
    pub last_raised_at: Option<DateTime<Utc>>,
}

/// Snapshot of the whole bus
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusMetrics {
    pub frame: u64,
    pub registered_channels: usize,
    pub total_events: u64,
    pub events_this_frame: usize,
    pub dropped_events: u64,
    /// Frames in which the per-frame cap was hit at least once
    pub overflow_frames: u64,
    pub events_per_minute: f64,
    pub log_entries: usize,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ChannelCounters {
    pub total_raised: u64,
    pub raised_this_session: u64,
    pub raised_in_window: u64,
    pub events_per_minute: f64,
    pub last_raised_at: Option<DateTime<Utc>>,
}

impl ChannelCounters {
    pub fn record(&mut self, at: DateTime<Utc>) {
        self.total_raised += 1;
        self.raised_this_session += 1;
        self.raised_in_window += 1;
        self.last_raised_at = Some(at);
    }

    /// Close the current window, scaling its count to a per-minute rate
    pub fn close_window(&mut self, window_seconds: f64) {
        self.events_per_minute = per_minute(self.raised_in_window, window_seconds);
        self.raised_in_window = 0;
    }

    pub fn reset_session(&mut self) {
        self.raised_this_session = 0;
        self.raised_in_window = 0;
        self.events_per_minute = 0.0;
    }
}

pub(crate) fn per_minute(count: u64, window_seconds: f64) -> f64 {
    if window_seconds <= 0.0 {
        return 0.0;
    }
    count as f64 * 60.0 / window_seconds
}
