//! Client-side bootstrapping for server-rendered pages.

use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::closure::Closure;
use web_sys::{Element, Event};

use crate::init_data::read_init_data;
use crate::{Mounted, ROOT_ELEMENT_ID, Store, StoreConfig, View, mount};

/// Drive the store's pending fetches on the browser event loop.
pub fn spawn_settle(store: &Store) {
    let store = store.clone();
    wasm_bindgen_futures::spawn_local(async move {
        store.settle().await;
    });
}

/// Take over a server-rendered page.
///
/// Seeds a store from `window.INIT_DATA`, mounts `view` onto the root
/// element (falling back to `<body>`), and routes clicks on any element
/// carrying `data-action` to [`Mounted::dispatch`]. The page stays mounted
/// for the lifetime of the document.
pub fn hydrate<V: View + 'static>(view: V) -> Result<(Store, Rc<Mounted<V>>), JsValue> {
    let window = web_sys::window().ok_or("No global window object")?;
    let document = window.document().ok_or("No document object")?;
    let root: Element = match document.get_element_by_id(ROOT_ELEMENT_ID) {
        Some(element) => element,
        None => document.body().ok_or("No body element")?.into(),
    };

    let snapshot = read_init_data().unwrap_or_default();
    let store = Store::with_config(StoreConfig::default().with_snapshot(snapshot));

    let page = Rc::new(mount(&store, view));
    page.attach(root.clone())?;

    let handler = {
        let page = Rc::clone(&page);
        let store = store.clone();
        Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            let Some(target) = event.target().and_then(|t| t.dyn_into::<Element>().ok()) else {
                return;
            };
            let Ok(Some(element)) = target.closest("[data-action]") else {
                return;
            };
            let Some(name) = element.get_attribute("data-action") else {
                return;
            };

            if page.dispatch(&name) {
                event.prevent_default();
                spawn_settle(&store);
            } else {
                web_sys::console::warn_1(&format!("tally: no action named {name}").into());
            }
        })
    };

    root.add_event_listener_with_callback("click", handler.as_ref().unchecked_ref())?;
    handler.forget();

    spawn_settle(&store);

    Ok((store, page))
}
