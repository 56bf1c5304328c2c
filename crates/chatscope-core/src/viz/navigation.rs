//! Time-ordered index over the drawn points.

use chrono::{DateTime, Utc};

use crate::models::{parse_timestamp, RecordRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

#[derive(Debug, Clone, Default)]
pub struct TimeIndex {
    /// Point indices sorted by timestamp (stable for ties)
    order: Vec<usize>,
    /// Timestamp in ms for each entry of `order`
    times: Vec<i64>,
}

impl TimeIndex {
    /// `times[i]` is the timestamp of point `i`.
    pub fn build(times: &[DateTime<Utc>]) -> Self {
        let mut order: Vec<usize> = (0..times.len()).collect();
        order.sort_by_key(|&i| times[i]);
        let sorted_times = order.iter().map(|&i| times[i].timestamp_millis()).collect();
        Self {
            order,
            times: sorted_times,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Position in the sorted order of `record`.
    ///
    /// Identity match first, then a point with the exact same timestamp, then
    /// the nearest timestamp.
    pub fn locate(&self, record: &RecordRef, records: &[RecordRef]) -> Option<usize> {
        if let Some(position) = self
            .order
            .iter()
            .position(|&i| records.get(i).is_some_and(|r| RecordRef::ptr_eq(r, record)))
        {
            return Some(position);
        }

        let target = record.timestamp_value().and_then(parse_timestamp)?.timestamp_millis();
        self.locate_time(target)
    }

    fn locate_time(&self, target: i64) -> Option<usize> {
        if self.times.is_empty() {
            return None;
        }
        let upper = self.times.partition_point(|&t| t < target);
        if upper < self.times.len() && self.times[upper] == target {
            return Some(upper);
        }
        if upper == 0 {
            return Some(0);
        }
        if upper == self.times.len() {
            return Some(upper - 1);
        }
        let before = target - self.times[upper - 1];
        let after = self.times[upper] - target;
        Some(if before <= after { upper - 1 } else { upper })
    }

    /// Point index adjacent to sorted position `position`, wrapping at both ends.
    pub fn step(&self, position: usize, direction: Direction) -> Option<usize> {
        let len = self.order.len();
        if len == 0 || position >= len {
            return None;
        }
        let next = match direction {
            Direction::Next => (position + 1) % len,
            Direction::Previous => (position + len - 1) % len,
        };
        Some(self.order[next])
    }

    pub fn first(&self) -> Option<usize> {
        self.order.first().copied()
    }
}
