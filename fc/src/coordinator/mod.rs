//! Coordinator runtime
//!
//! A single task owns the [`Engine`](crate::engine::Engine), ticks it on a
//! fixed interval and serializes every external call through a channel.
//! Dispatches to the executor are fire-and-forget with a bounded timeout.

mod core;
mod handle;
mod messages;

pub use core::Coordinator;
pub use handle::CoordinatorHandle;
pub use messages::{CoordRequest, Snapshot};
