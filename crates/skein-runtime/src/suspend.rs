use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use skein_types::{StackFrameItem, ThreadRef};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::{
    CoroutineList, CoroutineProbe, CoroutineRecord, CoroutineSnapshotStore, FrameReconciler,
    HostEngine, Priority, ReconcileConfig, Stale, StoreError, TaskQueue,
};

/// Lifetime facts of one pause, shared with the worker thread.
pub struct PointState {
    generation: u64,
    paused_thread: Option<ThreadRef>,
    alive: AtomicBool,
}

impl PointState {
    pub(crate) fn new(generation: u64, paused_thread: Option<ThreadRef>) -> Self {
        Self {
            generation,
            paused_thread,
            alive: AtomicBool::new(true),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn paused_thread(&self) -> Option<&ThreadRef> {
        self.paused_thread.as_ref()
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Returns true if this call ended the point.
    pub(crate) fn end(&self) -> bool {
        self.alive.swap(false, Ordering::AcqRel)
    }
}

/// One pause of the target process.
///
/// Owns the serialized worker and every cache derived from the paused
/// state. Ending the point closes the worker; everything computed for it is
/// dropped together with it.
pub struct SuspendPoint {
    state: Arc<PointState>,
    queue: Arc<TaskQueue>,
    store: CoroutineSnapshotStore,
}

impl SuspendPoint {
    pub fn new(
        generation: u64,
        paused_thread: Option<ThreadRef>,
        host: Arc<dyn HostEngine>,
        probe: Arc<dyn CoroutineProbe>,
        config: Arc<ReconcileConfig>,
    ) -> Arc<Self> {
        let state = Arc::new(PointState::new(generation, paused_thread));
        let queue = Arc::new(TaskQueue::start(Arc::clone(&state)));
        let reconciler = Arc::new(FrameReconciler::new(host, config));
        let store = CoroutineSnapshotStore::new(Arc::clone(&queue), probe, reconciler);
        debug!(generation, "suspend point started");
        Arc::new(Self {
            state,
            queue,
            store,
        })
    }

    pub fn generation(&self) -> u64 {
        self.state.generation()
    }

    pub fn paused_thread(&self) -> Option<&ThreadRef> {
        self.state.paused_thread()
    }

    pub fn is_alive(&self) -> bool {
        self.state.is_alive()
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn store(&self) -> &CoroutineSnapshotStore {
        &self.store
    }

    pub async fn list_coroutines(&self) -> Result<CoroutineList, StoreError> {
        self.store.list_coroutines(Priority::Normal).await
    }

    pub async fn frames(
        &self,
        record: &Arc<CoroutineRecord>,
    ) -> Result<Arc<[StackFrameItem]>, Stale> {
        self.store.frames(record, Priority::Normal).await
    }

    /// Reconciles `records` in the background so later expansions hit the
    /// cache. Interactive work submitted meanwhile still runs first, and an
    /// expansion that asks for a stack already being prefetched shares it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn prefetch_frames(self: &Arc<Self>, records: CoroutineList) -> JoinHandle<()> {
        let point = Arc::clone(self);
        tokio::spawn(async move {
            for record in records.iter() {
                if record.cached_frames().is_some() {
                    continue;
                }
                if point
                    .store
                    .frames(record, Priority::Background)
                    .await
                    .is_err()
                {
                    trace!(generation = point.generation(), "prefetch stopped: suspend point ended");
                    return;
                }
            }
        })
    }

    /// Ends the pause: closes the worker and invalidates pending results.
    pub fn end(&self) {
        if self.state.end() {
            self.queue.close();
            debug!(generation = self.generation(), "suspend point ended");
        }
    }
}

impl Drop for SuspendPoint {
    fn drop(&mut self) {
        self.end();
    }
}
