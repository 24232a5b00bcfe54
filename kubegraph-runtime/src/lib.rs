//! Watch stream driver and subscription sessions for the kubegraph gateway.
//!
//! [`watcher`] turns one watch call into a stream of decoded events;
//! [`WatchSession`] tracks seen objects and decides, per event, whether the
//! client's selection set warrants an emission.

pub mod diff;
pub mod subscription;
pub mod watcher;

pub use diff::paths_changed;
pub use subscription::WatchSession;
pub use watcher::watcher;
