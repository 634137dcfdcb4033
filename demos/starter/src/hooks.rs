//! Hooks around the shared `"count"` cache entry.
//!
//! [`use_count`] and [`use_set_count`] never talk to each other; they only
//! agree on [`COUNT_KEY`].

use tally::{Scope, Store};
use tracing::warn;

/// Cache key holding the counter.
pub const COUNT_KEY: &str = "count";

/// Stand-in for a backend call: always resolves to zero.
pub async fn fetch_count() -> Option<i64> {
    Some(0)
}

/// Increment used by [`UseSetCount::count_up`]. An unknown base stays
/// unknown rather than being counted up from nothing.
pub fn increment(count: Option<i64>) -> Option<i64> {
    count.map(|count| count + 1)
}

/// Write side of the counter.
#[derive(Debug, Clone)]
pub struct UseSetCount {
    store: Store,
}

impl UseSetCount {
    /// Optimistically add one to the cached count without asking the
    /// producer again. Does nothing while the count has not loaded.
    pub fn count_up(&self) {
        if let Err(err) = self.store.mutate(COUNT_KEY, increment, false) {
            warn!(error = %err, "count_up skipped");
        }
    }
}

/// Read side of the counter, with the write side attached.
#[derive(Debug, Clone)]
pub struct UseCount {
    /// Current count; `None` until the first fetch lands.
    pub count: Option<i64>,
    /// Setter for the same entry.
    pub setter: UseSetCount,
}

/// Subscribe the calling view to the count and return it, fetching it on
/// first use.
pub fn use_count(cx: &Scope) -> UseCount {
    let count = cx.use_swr(COUNT_KEY, fetch_count);

    UseCount {
        count,
        setter: use_set_count(cx),
    }
}

/// Setter for the count. Does not subscribe the calling view.
pub fn use_set_count(cx: &Scope) -> UseSetCount {
    UseSetCount {
        store: cx.store().clone(),
    }
}
