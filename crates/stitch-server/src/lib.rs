//! Preview server with live reload for built stitch documentation.
//!
//! Serves the output tree from several static roots with a single-page-app
//! fallback, and reloads connected browsers once file changes settle.

pub mod debounce;
pub mod resolve;
pub mod server;
pub mod watcher;
pub mod websocket;

pub use debounce::Debouncer;
pub use resolve::{Mount, Resolved, Resolver};
pub use server::{PreviewConfig, PreviewServer, ServerError};
pub use watcher::{FileWatcher, IgnoreSet, WatchEvent};
pub use websocket::{ReloadHub, ReloadMessage};
