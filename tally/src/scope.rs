//! Render context handed to [`View::render`](crate::View::render).

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::action::Action;
use crate::store::{Listener, Store, Subscription};

/// Carries the injected [`Store`] into views and records what a view reads
/// and which actions it exposes.
///
/// A scope built with [`Scope::new`] is static: reads never subscribe, which
/// is what server rendering wants. Scopes owned by a
/// [`Mounted`](crate::Mounted) view subscribe it to every key it reads.
pub struct Scope {
    store: Store,
    listener: Option<Listener>,
    subscriptions: RefCell<HashMap<String, Subscription>>,
    actions: RefCell<HashMap<String, Action>>,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tracked: Vec<String> = self.subscriptions.borrow().keys().cloned().collect();
        tracked.sort();
        let mut actions: Vec<String> = self.actions.borrow().keys().cloned().collect();
        actions.sort();

        f.debug_struct("Scope")
            .field("store", &self.store)
            .field("reactive", &self.is_reactive())
            .field("tracked", &tracked)
            .field("actions", &actions)
            .finish()
    }
}

impl Scope {
    /// A static scope over `store`.
    pub fn new(store: Store) -> Self {
        Self {
            store,
            listener: None,
            subscriptions: RefCell::new(HashMap::new()),
            actions: RefCell::new(HashMap::new()),
        }
    }

    pub(crate) fn reactive(store: Store, listener: Listener) -> Self {
        Self {
            listener: Some(listener),
            ..Self::new(store)
        }
    }

    /// The injected store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Whether reads through this scope subscribe its owner.
    pub fn is_reactive(&self) -> bool {
        self.listener.is_some()
    }

    /// Subscribe the owner of this scope to `key`, then read it through
    /// [`Store::read`].
    pub fn use_swr<T, F, Fut>(&self, key: &str, producer: F) -> Option<T>
    where
        T: Serialize + DeserializeOwned + 'static,
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = Option<T>> + 'static,
    {
        self.track(key);
        self.store.read(key, producer)
    }

    /// Subscribe the owner of this scope to `key`. Repeated calls for the
    /// same key keep a single subscription.
    pub fn track(&self, key: &str) {
        let Some(listener) = &self.listener else {
            return;
        };

        let mut subscriptions = self.subscriptions.borrow_mut();
        if !subscriptions.contains_key(key) {
            let subscription = self.store.subscribe_listener(key, listener.clone());
            subscriptions.insert(key.to_owned(), subscription);
        }
    }

    /// Keys this scope is subscribed to.
    pub fn tracked_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.subscriptions.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Register `action` under `name` and return the attribute that binds an
    /// element to it, e.g. `data-action="count-up"`.
    pub fn action(&self, name: &str, action: Action) -> String {
        self.actions.borrow_mut().insert(name.to_owned(), action);
        format!(r#"data-action="{}""#, tally_utils::escape_html(name))
    }

    pub(crate) fn find_action(&self, name: &str) -> Option<Action> {
        self.actions.borrow().get(name).cloned()
    }

    pub(crate) fn clear_actions(&self) {
        self.actions.borrow_mut().clear();
    }
}
