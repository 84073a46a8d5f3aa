//! Bounded diagnostic log of raised events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub timestamp: DateTime<Utc>,
    pub channel_id: String,
    pub channel_type: String,
    /// `Debug` rendering of the payload
    pub payload: String,
    pub frame: u64,
}

/// Ring buffer; the oldest entry is evicted once capacity is reached
#[derive(Debug)]
pub struct EventLog {
    entries: VecDeque<EventLogEntry>,
    capacity: usize,
    evicted: u64,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            evicted: 0,
        }
    }

    pub fn push(&mut self, entry: EventLogEntry) {
        if self.capacity == 0 {
            self.evicted += 1;
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
            self.evicted += 1;
        }
        self.entries.push_back(entry);
    }

    /// Up to `max` most recent entries, oldest first
    pub fn recent(&self, max: usize) -> Vec<EventLogEntry> {
        let skip = self.entries.len().saturating_sub(max);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
