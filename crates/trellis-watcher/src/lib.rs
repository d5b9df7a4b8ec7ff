//! Change detection and background dispatch

pub mod dispatcher;
pub mod watcher;


pub use dispatcher::{DEFAULT_PROBE_TIMEOUT, Dispatch, Dispatcher, SyncTicket};
pub use watcher::{FileWatcher, WatchEvent};
