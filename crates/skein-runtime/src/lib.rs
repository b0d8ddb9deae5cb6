//! Stack reconciliation engine for coroutine-aware debuggers.
//!
//! A paused target process can only be interrogated from one controlling
//! thread at a time. Everything that touches it goes through the
//! [`TaskQueue`] owned by the current [`SuspendPoint`]; host and
//! instrumentation calls require a [`ManagerContext`], which only exists
//! inside work running on that queue.
//!
//! Per pause, the [`CoroutineSnapshotStore`] fetches the coroutine list once
//! and memoizes each coroutine's reconciled stack, built by the
//! [`FrameReconciler`] from native frames, the captured logical trace, and the
//! creation trace.

mod config;
mod dump;
mod error;
mod host;
mod queue;
mod reconcile;
mod resolve;
mod session;
mod store;
mod suspend;

pub mod replay;

pub use config::*;
pub use dump::*;
pub use error::*;
pub use host::*;
pub use queue::*;
pub use reconcile::*;
pub use resolve::*;
pub use session::*;
pub use store::*;
pub use suspend::*;

pub use skein_types;
