//! In-process counter store

use super::{AtomicCounterStore, CounterKey, CounterOutcome};
use dashmap::DashMap;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, Default)]
struct CounterCell {
    window_start: i64,
    value: i64,
}

/// [`AtomicCounterStore`] backed by a sharded concurrent map
///
/// Each operation holds the entry lock of its key only, so unrelated scopes never
/// contend with each other.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    cells: DashMap<CounterKey, CounterCell>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live counters
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Remove counters whose window started before `cutoff`
    pub fn purge_before(&self, cutoff: i64) {
        self.cells.retain(|_, cell| cell.window_start >= cutoff);
    }
}

fn rotate(cell: &mut CounterCell, window_start: i64) {
    if window_start > cell.window_start {
        cell.window_start = window_start;
        cell.value = 0;
    }
}

impl AtomicCounterStore for InMemoryCounterStore {
    fn current(&self, key: &CounterKey, window_start: i64) -> i64 {
        match self.cells.get_mut(key) {
            Some(mut cell) => {
                rotate(&mut cell, window_start);
                if cell.window_start == window_start {
                    cell.value
                } else {
                    0
                }
            }
            None => 0,
        }
    }

    fn try_add(
        &self,
        key: &CounterKey,
        window_start: i64,
        amount: i64,
        limit: Option<i64>,
    ) -> CounterOutcome {
        let mut cell = self.cells.entry(key.clone()).or_insert(CounterCell {
            window_start,
            value: 0,
        });
        rotate(&mut cell, window_start);

        // A request for an older window is evaluated against the active one.
        let next = cell.value.saturating_add(amount).max(0);
        match limit {
            Some(limit) if next > limit => CounterOutcome::Rejected(cell.value),
            _ => {
                cell.value = next;
                CounterOutcome::Admitted(next)
            }
        }
    }

    fn adjust(&self, key: &CounterKey, window_start: i64, delta: i64) -> i64 {
        let mut cell = self.cells.entry(key.clone()).or_insert(CounterCell {
            window_start,
            value: 0,
        });
        match window_start.cmp(&cell.window_start) {
            Ordering::Less => cell.value,
            Ordering::Equal | Ordering::Greater => {
                rotate(&mut cell, window_start);
                cell.value = cell.value.saturating_add(delta).max(0);
                cell.value
            }
        }
    }

    fn fetch_add(&self, key: &CounterKey, amount: i64) -> i64 {
        let mut cell = self.cells.entry(key.clone()).or_default();
        let previous = cell.value;
        cell.value = cell.value.wrapping_add(amount);
        previous
    }

    fn reset(&self, key: &CounterKey) {
        self.cells.remove(key);
    }
}
