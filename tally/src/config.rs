//! Configuration for stores and the development server.

use serde_json::{Map, Value};

/// Options applied when a [`Store`](crate::Store) is created.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Entries written into the cache before anything reads it. Keys seeded
    /// here count as loaded, so their producers are not called on first read.
    pub initial: Map<String, Value>,
}

impl StoreConfig {
    /// Seed a single entry.
    pub fn with_initial(mut self, key: impl Into<String>, value: Value) -> Self {
        self.initial.insert(key.into(), value);
        self
    }

    /// Seed every entry of a snapshot, typically the one the server embedded
    /// as `INIT_DATA`.
    pub fn with_snapshot(mut self, snapshot: Map<String, Value>) -> Self {
        self.initial.extend(snapshot);
        self
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use server::ServerConfig;

#[cfg(not(target_arch = "wasm32"))]
mod server {
    use std::net::SocketAddr;
    use std::path::PathBuf;

    /// Settings for [`serve`](crate::server::serve).
    #[derive(Debug, Clone)]
    pub struct ServerConfig {
        /// Address the HTTP listener binds to.
        pub addr: SocketAddr,
        /// Directory holding the wasm-pack output served under `/pkg/`.
        pub static_dir: PathBuf,
        /// Name of the wasm-pack JS entry point, without extension.
        pub bundle: String,
        /// Document `<title>`.
        pub title: String,
    }

    impl Default for ServerConfig {
        fn default() -> Self {
            Self {
                addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
                static_dir: PathBuf::from("./pkg"),
                bundle: "client".to_owned(),
                title: "Tally".to_owned(),
            }
        }
    }

    impl ServerConfig {
        /// Override the bind address.
        pub fn addr(mut self, addr: SocketAddr) -> Self {
            self.addr = addr;
            self
        }

        /// Override the static asset directory.
        pub fn static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
            self.static_dir = dir.into();
            self
        }

        /// Override the wasm bundle name.
        pub fn bundle(mut self, bundle: impl Into<String>) -> Self {
            self.bundle = bundle.into();
            self
        }

        /// Override the document title.
        pub fn title(mut self, title: impl Into<String>) -> Self {
            self.title = title.into();
            self
        }
    }
}
