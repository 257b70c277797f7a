mod reconnecting_watcher;
pub use reconnecting_watcher::*;
