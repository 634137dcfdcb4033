//! Glob-importable set of the items most views need.

pub use crate::{Action, CacheState, Html, Mounted, Scope, Store, StoreConfig, View, action, mount};
