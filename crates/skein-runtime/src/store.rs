use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use skein_types::{CoroutineId, CoroutineState, CoroutineSummary, RawTraceEntry, StackFrameItem, ThreadRef};
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::{
    CoroutineProbe, FetchError, FrameReconciler, ManagerContext, Priority, Stale, StoreError,
    TaskQueue,
};

#[derive(Debug)]
enum Slot<T> {
    Pending,
    Ready(T),
    /// The job was dropped or ran after the suspend point ended.
    Abandoned,
}

/// A value computed once on the manager worker.
///
/// The worker job publishes its own result, so a caller that stops waiting
/// does not cancel the work, and nobody submits it twice.
#[derive(Debug)]
struct WorkerSlot<T> {
    state: watch::Sender<Slot<T>>,
    submitted: AtomicBool,
}

impl<T> WorkerSlot<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn new() -> Arc<Self> {
        let (state, _) = watch::channel(Slot::Pending);
        Arc::new(Self {
            state,
            submitted: AtomicBool::new(false),
        })
    }

    fn get(&self) -> Option<T> {
        match &*self.state.borrow() {
            Slot::Ready(value) => Some(value.clone()),
            Slot::Pending | Slot::Abandoned => None,
        }
    }

    /// Submits `work` unless an earlier caller already did, then waits for
    /// the published value.
    async fn get_or_submit<F>(
        self: &Arc<Self>,
        queue: &TaskQueue,
        priority: Priority,
        work: F,
    ) -> Result<T, Stale>
    where
        F: FnOnce(&ManagerContext<'_>) -> T + Send + 'static,
    {
        let mut published = self.state.subscribe();
        if !self.submitted.swap(true, Ordering::AcqRel) {
            let publisher = Publisher {
                slot: Some(Arc::clone(self)),
            };
            queue.post(priority, move |cx| {
                let value = work(cx);
                publisher.publish(cx, value);
            });
        }
        let slot = published
            .wait_for(|slot| !matches!(slot, Slot::Pending))
            .await
            .map_err(|_| Stale)?;
        match &*slot {
            Slot::Ready(value) => Ok(value.clone()),
            Slot::Pending | Slot::Abandoned => Err(Stale),
        }
    }
}

/// Owned by a submitted job. Marks the slot abandoned if the job is dropped
/// without publishing.
struct Publisher<T> {
    slot: Option<Arc<WorkerSlot<T>>>,
}

impl<T> Publisher<T> {
    fn publish(mut self, cx: &ManagerContext<'_>, value: T) {
        let Some(slot) = self.slot.take() else {
            return;
        };
        if cx.is_current() {
            slot.state.send_replace(Slot::Ready(value));
        } else {
            trace!(
                generation = cx.generation(),
                "discarding result computed after suspend point ended"
            );
            slot.state.send_replace(Slot::Abandoned);
        }
    }
}

impl<T> Drop for Publisher<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.state.send_replace(Slot::Abandoned);
        }
    }
}

pub type CoroutineList = Arc<[Arc<CoroutineRecord>]>;

/// A coroutine as seen at one suspend point.
///
/// Immutable apart from `frames`, which is filled at most once.
#[derive(Debug)]
pub struct CoroutineRecord {
    summary: CoroutineSummary,
    frames: Arc<WorkerSlot<Arc<[StackFrameItem]>>>,
}

impl CoroutineRecord {
    pub fn new(summary: CoroutineSummary) -> Self {
        Self {
            summary,
            frames: WorkerSlot::new(),
        }
    }

    pub fn summary(&self) -> &CoroutineSummary {
        &self.summary
    }

    pub fn id(&self) -> CoroutineId {
        self.summary.id
    }

    pub fn name(&self) -> &str {
        &self.summary.name
    }

    pub fn state(&self) -> CoroutineState {
        self.summary.state
    }

    pub fn owner_thread(&self) -> Option<&ThreadRef> {
        self.summary.owner_thread.as_ref()
    }

    pub fn raw_trace(&self) -> &[RawTraceEntry] {
        &self.summary.raw_trace
    }

    /// The reconciled stack, if it has been published.
    pub fn cached_frames(&self) -> Option<Arc<[StackFrameItem]>> {
        self.frames.get()
    }
}

/// Per-pause cache of the coroutine list and of each coroutine's stack.
///
/// The coroutine dump runs at most once per pause and each stack is
/// reconciled at most once; concurrent callers wait for the in-flight work
/// and share its result. Dropping a waiting caller leaves the work running
/// for whoever asks next.
pub struct CoroutineSnapshotStore {
    queue: Arc<TaskQueue>,
    probe: Arc<dyn CoroutineProbe>,
    reconciler: Arc<FrameReconciler>,
    coroutines: Arc<WorkerSlot<Result<CoroutineList, FetchError>>>,
}

impl CoroutineSnapshotStore {
    pub fn new(
        queue: Arc<TaskQueue>,
        probe: Arc<dyn CoroutineProbe>,
        reconciler: Arc<FrameReconciler>,
    ) -> Self {
        Self {
            queue,
            probe,
            reconciler,
            coroutines: WorkerSlot::new(),
        }
    }

    pub async fn list_coroutines(&self, priority: Priority) -> Result<CoroutineList, StoreError> {
        let probe = Arc::clone(&self.probe);
        let listed = self
            .coroutines
            .get_or_submit(&self.queue, priority, move |cx| {
                match probe.dump_coroutines(cx) {
                    Ok(summaries) => {
                        debug!(coroutines = summaries.len(), "coroutine dump fetched");
                        Ok(summaries
                            .into_iter()
                            .map(|summary| Arc::new(CoroutineRecord::new(summary)))
                            .collect())
                    }
                    Err(error) => {
                        warn!(%error, "coroutine dump failed");
                        Err(error)
                    }
                }
            })
            .await?;
        listed.map_err(StoreError::Fetch)
    }

    /// The coroutine list if it has already been fetched successfully.
    pub fn cached_coroutines(&self) -> Option<CoroutineList> {
        self.coroutines.get().and_then(Result::ok)
    }

    pub async fn frames(
        &self,
        record: &Arc<CoroutineRecord>,
        priority: Priority,
    ) -> Result<Arc<[StackFrameItem]>, Stale> {
        let reconciler = Arc::clone(&self.reconciler);
        let target = Arc::clone(record);
        record
            .frames
            .get_or_submit(&self.queue, priority, move |cx| {
                Arc::from(reconciler.build(cx, target.summary()))
            })
            .await
    }
}
