//! # tally
//!
//! A small SWR-style toolkit for server-rendered, wasm-hydrated pages.
//!
//! - [`Store`]: keyed cache with per-key subscriptions, optimistic
//!   [`mutate`](Store::mutate) and single-flight producers.
//! - [`View`] / [`Html`]: components render markup through a [`Scope`] that
//!   carries the store, so state is shared by key instead of by reference.
//! - [`mount()`]: keeps a view re-rendered as the keys it read change.
//! - [`server`] (native only): two-pass server rendering with an
//!   `INIT_DATA` snapshot the client seeds its store from.

pub mod action;
pub mod config;
pub mod error;
pub mod init_data;
pub mod mount;
pub mod prelude;
pub mod scope;
pub mod store;

#[cfg(not(target_arch = "wasm32"))]
pub mod server;

#[cfg(target_arch = "wasm32")]
pub mod hydrate;

#[cfg(target_arch = "wasm32")]
pub use {js_sys, wasm_bindgen, web_sys};

pub use action::Action;
pub use config::StoreConfig;
#[cfg(not(target_arch = "wasm32"))]
pub use config::ServerConfig;
pub use error::{Error, Result};
pub use mount::{Mounted, mount};
pub use scope::Scope;
pub use store::{CacheState, Store, Subscription};

use std::fmt;

/// Id of the element server-rendered pages wrap their body in and the client
/// mounts onto.
pub const ROOT_ELEMENT_ID: &str = "tally-root";

/// Trait that defines the view layer for components
///
/// Components must implement this trait to provide their HTML rendering logic
pub trait View {
    /// Render the component to Html
    ///
    /// Reads go through `cx` so that mounted views are re-rendered when the
    /// keys they read change.
    fn render(&self, cx: &Scope) -> Html;
}

/// Represents rendered HTML content
///
/// Text passed through [`Html::text`] is escaped; [`Html::raw`] trusts its
/// input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Html {
    markup: String,
}

impl Html {
    /// Empty markup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Markup used verbatim.
    pub fn raw(markup: impl Into<String>) -> Self {
        Html {
            markup: markup.into(),
        }
    }

    /// Escaped text content.
    pub fn text(text: impl AsRef<str>) -> Self {
        Html {
            markup: tally_utils::escape_html(text.as_ref()),
        }
    }

    /// Append another fragment.
    pub fn push(&mut self, other: Html) {
        self.markup.push_str(&other.markup);
    }

    /// The markup.
    pub fn as_str(&self) -> &str {
        &self.markup
    }

    /// Consume into the markup string.
    pub fn into_string(self) -> String {
        self.markup
    }

    /// Whether there is no markup at all.
    pub fn is_empty(&self) -> bool {
        self.markup.is_empty()
    }

    /// The text a browser would display, tags removed and whitespace
    /// collapsed.
    pub fn text_content(&self) -> String {
        tally_utils::strip_tags(&self.markup)
    }

    /// Mount the HTML into a DOM element
    ///
    /// # Arguments
    /// * `target` - Optional target element (defaults to document body)
    #[cfg(target_arch = "wasm32")]
    pub fn mount(
        &self,
        target: Option<&web_sys::Element>,
    ) -> std::result::Result<(), wasm_bindgen::JsValue> {
        use web_sys::{Element, window};

        let target_element: Element = if let Some(element) = target {
            element.clone()
        } else {
            let window = window().ok_or("No global window object")?;
            let document = window.document().ok_or("No document object")?;
            document.body().ok_or("No body element")?.into()
        };

        target_element.set_inner_html(&self.markup);

        Ok(())
    }
}

impl From<&str> for Html {
    fn from(content: &str) -> Self {
        Html::raw(content)
    }
}

impl From<String> for Html {
    fn from(content: String) -> Self {
        Html::raw(content)
    }
}

impl FromIterator<Html> for Html {
    fn from_iter<I: IntoIterator<Item = Html>>(iter: I) -> Self {
        let mut html = Html::new();
        for fragment in iter {
            html.push(fragment);
        }
        html
    }
}

impl fmt::Display for Html {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.markup)
    }
}
