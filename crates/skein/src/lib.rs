//! Coroutine-aware stack views for paused processes.
//!
//! When a debugger stops a process that runs coroutines, the native call
//! stacks only show dispatcher machinery. Skein merges three sources into one
//! stack per coroutine: the native frames of the thread a running coroutine
//! occupies, the logical trace the instrumentation library captured at the
//! last suspension, and the trace captured when the coroutine was created.
//!
//! # Using this crate
//!
//! Implement [`HostEngine`] over your debugger backend and [`CoroutineProbe`]
//! over the instrumentation library, then drive a [`CoroutineView`] from the
//! debugger's pause and resume events:
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # async fn run(host: Arc<dyn skein::HostEngine>, probe: Arc<dyn skein::CoroutineProbe>) {
//! let session = skein::DebugSession::new(host, probe, skein::ReconcileConfig::from_env());
//! let view = skein::CoroutineView::new(session, skein::ViewConfig::from_env());
//!
//! view.on_paused(None).await;
//! print!("{}", view.tree().outline());
//! view.on_resumed();
//! # }
//! ```
//!
//! # Crates
//!
//! | Crate | Contents |
//! |-------|----------|
//! | `skein-types` | Frames, locations, coroutine summaries. |
//! | `skein-runtime` | Serialized host access, per-pause caches, frame reconciliation, replay host. |
//! | `skein-view` | Lazy presentation tree, view-state restore, debounced clearing. |
//!
//! # Configuration
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `SKEIN_CREATION_SEPARATOR` | Type-name prefix of the entry separating suspension and creation frames. |
//! | `SKEIN_RESUME_METHODS` | Comma-separated method names marking where a coroutine was resumed. |
//! | `SKEIN_VIEW_CLEAR_DELAY_MS` | How long a resumed target keeps its tree before it is blanked. |

pub use skein_runtime::*;
pub use skein_types::*;
pub use skein_view::*;
