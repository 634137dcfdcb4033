//! Mounted views: a view plus the reactive scope that re-renders it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::scope::Scope;
use crate::store::{Listener, Store};
use crate::{Html, View};

/// A view that re-renders whenever a cache key it read changes.
///
/// Dropping the handle unmounts the view: every subscription it holds is
/// released and no further renders happen.
pub struct Mounted<V: View + 'static> {
    inner: Rc<MountInner<V>>,
}

struct MountInner<V: View + 'static> {
    id: usize,
    view: V,
    scope: Scope,
    html: RefCell<Html>,
    renders: Cell<usize>,
    #[cfg(target_arch = "wasm32")]
    target: RefCell<Option<web_sys::Element>>,
}

/// Mount `view` against `store` and render it once.
pub fn mount<V: View + 'static>(store: &Store, view: V) -> Mounted<V> {
    let inner = Rc::new_cyclic(|weak: &Weak<MountInner<V>>| {
        let weak = weak.clone();
        let listener: Listener = Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.render();
            }
        });

        MountInner {
            id: tally_utils::next_mount_counter(),
            view,
            scope: Scope::reactive(store.clone(), listener),
            html: RefCell::new(Html::new()),
            renders: Cell::new(0),
            #[cfg(target_arch = "wasm32")]
            target: RefCell::new(None),
        }
    });

    inner.render();
    Mounted { inner }
}

impl<V: View + 'static> MountInner<V> {
    fn render(&self) {
        self.scope.clear_actions();
        let html = self.view.render(&self.scope);
        self.renders.set(self.renders.get() + 1);
        trace!(mount = self.id, renders = self.renders.get(), "rendered");

        #[cfg(target_arch = "wasm32")]
        if let Some(target) = self.target.borrow().as_ref() {
            if let Err(err) = html.mount(Some(target)) {
                web_sys::console::error_2(&"tally: failed to patch mounted view".into(), &err);
            }
        }

        *self.html.borrow_mut() = html;
    }
}

impl<V: View + 'static> Mounted<V> {
    /// Runtime id of this mount.
    pub fn id(&self) -> usize {
        self.inner.id
    }

    /// The mounted view.
    pub fn view(&self) -> &V {
        &self.inner.view
    }

    /// The scope the view renders with.
    pub fn scope(&self) -> &Scope {
        &self.inner.scope
    }

    /// Output of the latest render.
    pub fn html(&self) -> Html {
        self.inner.html.borrow().clone()
    }

    /// How many times the view has rendered, the initial render included.
    pub fn render_count(&self) -> usize {
        self.inner.renders.get()
    }

    /// Render again regardless of cache changes.
    pub fn refresh(&self) {
        self.inner.render();
    }

    /// Invoke the action the latest render registered under `name`.
    ///
    /// Returns `false` when no such action exists.
    pub fn dispatch(&self, name: &str) -> bool {
        match self.inner.scope.find_action(name) {
            Some(action) => {
                trace!(mount = self.inner.id, action = name, "dispatch");
                action();
                true
            }
            None => false,
        }
    }

    /// Render into `target` now and after every later render.
    #[cfg(target_arch = "wasm32")]
    pub fn attach(&self, target: web_sys::Element) -> Result<(), wasm_bindgen::JsValue> {
        self.inner.html.borrow().mount(Some(&target))?;
        *self.inner.target.borrow_mut() = Some(target);
        Ok(())
    }
}

impl<V: View + fmt::Debug + 'static> fmt::Debug for Mounted<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mounted")
            .field("id", &self.inner.id)
            .field("view", &self.inner.view)
            .field("renders", &self.inner.renders.get())
            .field("tracked", &self.inner.scope.tracked_keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Label;

    impl View for Label {
        fn render(&self, cx: &Scope) -> Html {
            let text = cx
                .use_swr::<String, _, _>("label", || async { Some("ready".to_owned()) })
                .unwrap_or_default();
            Html::text(text)
        }
    }

    #[tokio::test]
    async fn rerenders_when_fetch_lands() {
        let store = Store::new();
        let label = mount(&store, Label);
        assert_eq!(label.render_count(), 1);
        assert_eq!(label.html().as_str(), "");

        store.settle().await;

        assert_eq!(label.render_count(), 2);
        assert_eq!(label.html().as_str(), "ready");
        assert_eq!(label.scope().tracked_keys(), vec!["label".to_owned()]);
    }

    #[test]
    fn unmount_releases_subscriptions() {
        let store = Store::new();
        let label = mount(&store, Label);
        assert_eq!(store.subscriber_count("label"), 1);

        drop(label);
        assert_eq!(store.subscriber_count("label"), 0);
        store.set("label", &"late", false).unwrap();
    }

    #[test]
    fn dispatch_unknown_action_is_false() {
        let label = mount(&Store::new(), Label);
        assert!(!label.dispatch("nope"));
    }
}
