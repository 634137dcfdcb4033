//! Tally Starter Kit
//!
//! A counter split across two components that share state only through
//! the `"count"` cache key: [`CountViewer`](components::CountViewer) reads it,
//! [`CountUp`](components::CountUp) bumps it, and the [`Home`](routes::Home)
//! page puts them side by side.

pub mod components;
pub mod hooks;
pub mod routes;

/// Title used for the server-rendered document.
pub const APP_TITLE: &str = "Tally Starter Kit";

/// Name of the wasm-pack bundle the page loads.
pub const BUNDLE_NAME: &str = "starter";
