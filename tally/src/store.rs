//! Keyed cache store.
//!
//! A [`Store`] maps string keys to JSON values. Readers register a producer
//! with [`Store::read`]; the first read of an absent key starts one fetch for
//! that key and later reads share it. Writers go through [`Store::mutate`],
//! which writes the new value immediately and notifies every subscriber of
//! the key before returning.
//!
//! The store is single-threaded. Fetches are futures parked inside the store
//! and driven by [`Store::settle`] (or awaited through [`Store::load`]); no
//! `RefCell` borrow is held while a listener, an updater or a producer runs.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

use futures_util::future::{FutureExt, LocalBoxFuture, Shared};
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::config::StoreConfig;
use crate::error::{Error, Result};

/// Callback invoked after an entry changes.
pub(crate) type Listener = Rc<dyn Fn()>;

type Producer = Rc<dyn Fn() -> LocalBoxFuture<'static, Option<Value>>>;
type Fetch = Shared<LocalBoxFuture<'static, ()>>;

/// Tagged view of a cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheState<T> {
    /// Nothing has been written yet: the producer is pending, has not been
    /// started, or resolved without a value.
    Unloaded,
    /// The entry holds a value.
    Loaded(T),
}

impl<T> CacheState<T> {
    /// `true` for [`CacheState::Loaded`].
    pub fn is_loaded(&self) -> bool {
        matches!(self, CacheState::Loaded(_))
    }

    /// Convert into an `Option`, dropping the distinction's name.
    pub fn into_option(self) -> Option<T> {
        match self {
            CacheState::Loaded(value) => Some(value),
            CacheState::Unloaded => None,
        }
    }
}

impl<T> From<Option<T>> for CacheState<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(CacheState::Unloaded, CacheState::Loaded)
    }
}

#[derive(Default)]
struct Entry {
    value: Option<Value>,
    producer: Option<Producer>,
    listeners: BTreeMap<usize, Listener>,
    in_flight: Option<Fetch>,
    /// Bumped on every write through `mutate`/`set`. A fetch only lands if
    /// the version it started under is still current.
    version: u64,
    revalidate_after: bool,
}

impl Entry {
    fn listeners(&self) -> Vec<Listener> {
        self.listeners.values().cloned().collect()
    }
}

struct Inner {
    entries: RefCell<HashMap<String, Entry>>,
    staged: RefCell<Vec<Fetch>>,
}

/// Shared handle to a keyed cache. Clones refer to the same cache.
#[derive(Clone)]
pub struct Store {
    inner: Rc<Inner>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.inner.entries.borrow();
        let mut keys: Vec<&String> = entries.keys().collect();
        keys.sort();

        f.debug_struct("Store")
            .field("keys", &keys)
            .field("staged", &self.inner.staged.borrow().len())
            .finish()
    }
}

impl Store {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create a store seeded from `config`.
    pub fn with_config(config: StoreConfig) -> Self {
        let entries = config
            .initial
            .into_iter()
            .map(|(key, value)| {
                let entry = Entry {
                    value: Some(value),
                    ..Entry::default()
                };
                (key, entry)
            })
            .collect();

        Store {
            inner: Rc::new(Inner {
                entries: RefCell::new(entries),
                staged: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Current value of `key`, starting a fetch through `producer` if the
    /// entry is absent and nothing is in flight for it.
    ///
    /// Returns `None` while the fetch is pending, when the producer yielded
    /// nothing, or when the cached value does not decode as `T`.
    pub fn read<T, F, Fut>(&self, key: &str, producer: F) -> Option<T>
    where
        T: Serialize + DeserializeOwned + 'static,
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = Option<T>> + 'static,
    {
        let value = self.with_entry(key, |entry| {
            register_producer(key, entry, producer);
            if entry.value.is_none() {
                self.start_fetch(key, entry);
            }
            entry.value.clone()
        });

        decode_lossy(key, value)
    }

    /// Like [`Store::read`] but waits for the pending fetch, if any, and
    /// returns the value it produced.
    pub async fn load<T, F, Fut>(&self, key: &str, producer: F) -> Option<T>
    where
        T: Serialize + DeserializeOwned + 'static,
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = Option<T>> + 'static,
    {
        let fetch = self.with_entry(key, |entry| {
            register_producer(key, entry, producer);
            if entry.value.is_none() || entry.in_flight.is_some() {
                self.start_fetch(key, entry)
            } else {
                None
            }
        });

        if let Some(fetch) = fetch {
            fetch.await;
        }

        decode_lossy(key, self.raw(key))
    }

    /// Strict typed lookup. Never starts a fetch.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.raw(key)
            .map(|value| {
                serde_json::from_value(value).map_err(|source| Error::Decode {
                    key: key.to_owned(),
                    source,
                })
            })
            .transpose()
    }

    /// Tagged typed lookup. Never starts a fetch.
    pub fn state<T: DeserializeOwned>(&self, key: &str) -> Result<CacheState<T>> {
        self.get(key).map(CacheState::from)
    }

    /// Apply `updater` to the current value of `key`.
    ///
    /// `Some(new)` is written at once and every subscriber of `key` is
    /// notified before this returns. `None` leaves the entry untouched and
    /// notifies nobody. With `revalidate` the registered producer runs again
    /// afterwards; without it the written value is trusted as is.
    ///
    /// Returns what the updater produced.
    pub fn mutate<T, U>(&self, key: &str, updater: U, revalidate: bool) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        U: FnOnce(Option<T>) -> Option<T>,
    {
        let current = self.get::<T>(key)?;
        let next = updater(current);
        let encoded = next.as_ref().map(|value| encode(key, value)).transpose()?;

        self.write(key, encoded, revalidate);

        Ok(next)
    }

    /// Write `value` to `key` unconditionally. Same notification and
    /// revalidation rules as [`Store::mutate`].
    pub fn set<T: Serialize>(&self, key: &str, value: &T, revalidate: bool) -> Result<()> {
        let encoded = encode(key, value)?;
        self.write(key, Some(encoded), revalidate);
        Ok(())
    }

    /// Run the registered producer for `key` again. A fetch already in
    /// flight is not duplicated: the rerun is queued behind it.
    ///
    /// Returns `false` when no producer has been registered for `key`.
    pub fn revalidate(&self, key: &str) -> bool {
        self.with_entry(key, |entry| self.revalidate_entry(key, entry))
    }

    /// Whether a fetch for `key` is in flight.
    pub fn is_validating(&self, key: &str) -> bool {
        self.inner
            .entries
            .borrow()
            .get(key)
            .is_some_and(|entry| entry.in_flight.is_some())
    }

    /// Register `listener` to run after every change of `key`. The listener
    /// stays registered until the returned guard is dropped.
    pub fn subscribe(&self, key: &str, listener: impl Fn() + 'static) -> Subscription {
        self.subscribe_listener(key, Rc::new(listener))
    }

    pub(crate) fn subscribe_listener(&self, key: &str, listener: Listener) -> Subscription {
        let id = tally_utils::next_listener_counter();
        self.with_entry(key, |entry| entry.listeners.insert(id, listener));
        trace!(key, id, "subscribed");

        Subscription {
            store: Rc::downgrade(&self.inner),
            key: key.to_owned(),
            id,
        }
    }

    /// Number of live subscriptions for `key`.
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.inner
            .entries
            .borrow()
            .get(key)
            .map_or(0, |entry| entry.listeners.len())
    }

    /// Every loaded entry, keyed by cache key.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.inner
            .entries
            .borrow()
            .iter()
            .filter_map(|(key, entry)| entry.value.clone().map(|value| (key.clone(), value)))
            .collect()
    }

    /// Drive every started fetch to completion, including fetches started
    /// while settling (revalidations queued behind an in-flight fetch).
    pub async fn settle(&self) {
        let mut running = FuturesUnordered::new();

        loop {
            running.extend(self.inner.staged.borrow_mut().drain(..));
            if running.next().await.is_none() {
                break;
            }
        }
    }

    fn raw(&self, key: &str) -> Option<Value> {
        self.inner
            .entries
            .borrow()
            .get(key)
            .and_then(|entry| entry.value.clone())
    }

    fn with_entry<R>(&self, key: &str, f: impl FnOnce(&mut Entry) -> R) -> R {
        let mut entries = self.inner.entries.borrow_mut();
        let entry = entries.entry(key.to_owned()).or_default();
        f(entry)
    }

    fn write(&self, key: &str, value: Option<Value>, revalidate: bool) {
        let listeners = self.with_entry(key, |entry| {
            let listeners = match value {
                Some(value) => {
                    entry.version += 1;
                    entry.value = Some(value);
                    debug!(key, version = entry.version, "entry mutated");
                    entry.listeners()
                }
                None => {
                    trace!(key, "updater produced no value, mutation skipped");
                    Vec::new()
                }
            };

            if revalidate {
                self.revalidate_entry(key, entry);
            }

            listeners
        });

        notify(listeners);
    }

    fn revalidate_entry(&self, key: &str, entry: &mut Entry) -> bool {
        if entry.producer.is_none() {
            return false;
        }

        if entry.in_flight.is_some() {
            trace!(key, "fetch in flight, revalidation queued");
            entry.revalidate_after = true;
            return true;
        }

        self.start_fetch(key, entry).is_some()
    }

    /// Start a fetch for `key` unless one is already running, in which case
    /// the running one is returned.
    fn start_fetch(&self, key: &str, entry: &mut Entry) -> Option<Fetch> {
        if let Some(fetch) = &entry.in_flight {
            return Some(fetch.clone());
        }

        let producer = entry.producer.clone()?;
        let version = entry.version;
        let store = Rc::downgrade(&self.inner);
        let owned_key = key.to_owned();

        debug!(key, version, "fetch started");

        let fetch = async move {
            let value = producer().await;
            if let Some(inner) = store.upgrade() {
                Store { inner }.finish_fetch(&owned_key, version, value);
            }
        }
        .boxed_local()
        .shared();

        entry.in_flight = Some(fetch.clone());
        self.inner.staged.borrow_mut().push(fetch.clone());

        Some(fetch)
    }

    fn finish_fetch(&self, key: &str, version: u64, value: Option<Value>) {
        let listeners = self.with_entry(key, |entry| {
            entry.in_flight = None;

            let mut changed = false;
            if entry.version != version {
                debug!(key, version, current = entry.version, "fetch superseded by a mutation, result dropped");
            } else if let Some(value) = value {
                changed = entry.value.as_ref() != Some(&value);
                entry.value = Some(value);
                debug!(key, changed, "fetch resolved");
            } else {
                debug!(key, "fetch resolved without a value");
            }

            if std::mem::take(&mut entry.revalidate_after) {
                self.start_fetch(key, entry);
            }

            if changed { entry.listeners() } else { Vec::new() }
        });

        notify(listeners);
    }
}

/// Keeps a listener registered with a [`Store`]; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    store: Weak<Inner>,
    key: String,
    id: usize,
}

impl Subscription {
    /// Key this subscription listens to.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(inner) = self.store.upgrade() else {
            return;
        };

        if let Some(entry) = inner.entries.borrow_mut().get_mut(&self.key) {
            entry.listeners.remove(&self.id);
            trace!(key = %self.key, id = self.id, "unsubscribed");
        }
    }
}

fn register_producer<T, F, Fut>(key: &str, entry: &mut Entry, producer: F)
where
    T: Serialize + 'static,
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Option<T>> + 'static,
{
    if entry.producer.is_some() {
        return;
    }

    let owned_key = key.to_owned();
    entry.producer = Some(Rc::new(move || {
        let key = owned_key.clone();
        producer()
            .map(move |value| value.and_then(|value| encode_lossy(&key, &value)))
            .boxed_local()
    }));
}

fn notify(listeners: Vec<Listener>) {
    for listener in listeners {
        listener();
    }
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|source| Error::Encode {
        key: key.to_owned(),
        source,
    })
}

fn encode_lossy<T: Serialize>(key: &str, value: &T) -> Option<Value> {
    encode(key, value)
        .inspect_err(|error| warn!(key, %error, "discarding producer output"))
        .ok()
}

fn decode_lossy<T: DeserializeOwned>(key: &str, value: Option<Value>) -> Option<T> {
    serde_json::from_value(value?)
        .inspect_err(|error| warn!(key, %error, "cached value has an unexpected shape"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counted(
        calls: Rc<Cell<usize>>,
        value: i64,
    ) -> impl Fn() -> futures_util::future::Ready<Option<i64>> {
        move || {
            calls.set(calls.get() + 1);
            futures_util::future::ready(Some(value))
        }
    }

    #[tokio::test]
    async fn read_starts_fetch_once_and_settles() {
        let store = Store::new();
        let calls = Rc::new(Cell::new(0));

        assert_eq!(store.read::<i64, _, _>("count", counted(calls.clone(), 0)), None);
        assert_eq!(store.read::<i64, _, _>("count", counted(calls.clone(), 0)), None);
        assert!(store.is_validating("count"));

        store.settle().await;

        assert_eq!(calls.get(), 1);
        assert!(!store.is_validating("count"));
        assert_eq!(store.read::<i64, _, _>("count", counted(calls.clone(), 0)), Some(0));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn load_waits_for_shared_fetch() {
        let store = Store::new();
        let calls = Rc::new(Cell::new(0));

        let _ = store.read::<i64, _, _>("count", counted(calls.clone(), 7));
        let loaded = store.load::<i64, _, _>("count", counted(calls.clone(), 99)).await;

        assert_eq!(loaded, Some(7));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn mutate_declining_updater_is_noop() {
        let store = Store::new();
        let notified = Rc::new(Cell::new(0));
        let seen = Rc::clone(&notified);
        let _sub = store.subscribe("count", move || seen.set(seen.get() + 1));

        let result = store
            .mutate::<i64, _>("count", |count| count.map(|c| c + 1), false)
            .unwrap();

        assert_eq!(result, None);
        assert_eq!(store.get::<i64>("count").unwrap(), None);
        assert_eq!(notified.get(), 0);
    }

    #[test]
    fn mutate_writes_and_notifies_synchronously() {
        let store = Store::with_config(StoreConfig::default().with_initial("count", 4.into()));
        let observed = Rc::new(Cell::new(0));
        let sink = Rc::clone(&observed);
        let reader = store.clone();
        let _sub = store.subscribe("count", move || {
            sink.set(reader.get::<i64>("count").unwrap().unwrap_or_default());
        });

        store
            .mutate::<i64, _>("count", |count| count.map(|c| c + 1), false)
            .unwrap();

        assert_eq!(observed.get(), 5);
        assert_eq!(store.state::<i64>("count").unwrap(), CacheState::Loaded(5));
    }

    #[test]
    fn subscription_drop_unsubscribes() {
        let store = Store::new();
        let sub = store.subscribe("count", || {});
        assert_eq!(store.subscriber_count("count"), 1);
        assert_eq!(sub.key(), "count");

        drop(sub);
        assert_eq!(store.subscriber_count("count"), 0);
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let store = Store::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let first = Rc::clone(&order);
        let _a = store.subscribe("k", move || first.borrow_mut().push("a"));
        let second = Rc::clone(&order);
        let _b = store.subscribe("k", move || second.borrow_mut().push("b"));

        store.set("k", &1, false).unwrap();
        assert_eq!(*order.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn decode_mismatch_is_reported() {
        let store = Store::new();
        store.set("count", &"not a number", false).unwrap();

        let err = store.get::<i64>("count").unwrap_err();
        assert!(matches!(err, Error::Decode { ref key, .. } if key == "count"));
        assert!(
            store
                .mutate::<i64, _>("count", |c| c.map(|c| c + 1), false)
                .is_err()
        );
    }

    #[tokio::test]
    async fn fetch_finishing_after_mutation_is_dropped() {
        let store = Store::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<i64>();
        let rx = Rc::new(RefCell::new(Some(rx)));

        let _ = store.read::<i64, _, _>("count", move || {
            let rx = rx.borrow_mut().take();
            async move {
                match rx {
                    Some(rx) => rx.await.ok(),
                    None => None,
                }
            }
        });

        store.set("count", &10_i64, false).unwrap();
        tx.send(0).unwrap();
        store.settle().await;

        assert_eq!(store.get::<i64>("count").unwrap(), Some(10));
    }

    #[tokio::test]
    async fn revalidate_while_in_flight_reruns_once() {
        let store = Store::new();
        let calls = Rc::new(Cell::new(0));

        let _ = store.read::<i64, _, _>("count", counted(calls.clone(), 3));
        assert!(store.revalidate("count"));
        assert!(store.revalidate("count"));
        store.settle().await;

        assert_eq!(calls.get(), 2);
        assert_eq!(store.get::<i64>("count").unwrap(), Some(3));
    }

    #[tokio::test]
    async fn mutate_with_revalidate_confirms_against_producer() {
        let store = Store::new();
        let calls = Rc::new(Cell::new(0));

        assert_eq!(store.load::<i64, _, _>("count", counted(calls.clone(), 0)).await, Some(0));
        store
            .mutate::<i64, _>("count", |c| c.map(|c| c + 5), true)
            .unwrap();
        assert_eq!(store.get::<i64>("count").unwrap(), Some(5));

        store.settle().await;
        assert_eq!(calls.get(), 2);
        assert_eq!(store.get::<i64>("count").unwrap(), Some(0));
    }

    #[test]
    fn revalidate_without_producer_reports_false() {
        let store = Store::new();
        assert!(!store.revalidate("missing"));
    }

    #[test]
    fn snapshot_lists_loaded_entries_only() {
        let store = Store::new();
        store.set("count", &2, false).unwrap();
        let _ = store.read::<i64, _, _>("pending", || std::future::pending());

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("count"), Some(&Value::from(2)));
    }

    #[test]
    fn seeded_entries_skip_producer() {
        let store = Store::with_config(StoreConfig::default().with_initial("count", 8.into()));
        let calls = Rc::new(Cell::new(0));

        assert_eq!(store.read::<i64, _, _>("count", counted(calls.clone(), 0)), Some(8));
        assert_eq!(calls.get(), 0);
        assert!(!store.is_validating("count"));
    }
}
