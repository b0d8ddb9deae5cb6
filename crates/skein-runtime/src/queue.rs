//! The single serialized worker of a suspend point.
//!
//! A paused process is not safely reentrant: two readers walking thread
//! stacks at once can observe half-updated debuggee state. All work that
//! touches the target is therefore submitted here and runs, one item at a
//! time, on a dedicated thread bound to one suspend point.

use std::collections::VecDeque;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::{Condvar, Mutex};
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::{ManagerContext, PointState, Stale};

/// Scheduling class of submitted work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Interactive requests, e.g. expanding a node.
    Normal,
    /// Speculative prefetch. Runs only when no normal work is waiting.
    Background,
}

type Job = Box<dyn FnOnce(&ManagerContext<'_>) + Send>;

struct Lanes {
    normal: VecDeque<Job>,
    background: VecDeque<Job>,
    closed: bool,
}

impl Lanes {
    fn next(&mut self) -> Option<Job> {
        self.normal
            .pop_front()
            .or_else(|| self.background.pop_front())
    }
}

struct Shared {
    lanes: Mutex<Lanes>,
    ready: Condvar,
    point: Arc<PointState>,
}

pub struct TaskQueue {
    shared: Arc<Shared>,
}

impl TaskQueue {
    pub(crate) fn start(point: Arc<PointState>) -> Self {
        let generation = point.generation();
        let shared = Arc::new(Shared {
            lanes: Mutex::new(Lanes {
                normal: VecDeque::new(),
                background: VecDeque::new(),
                closed: false,
            }),
            ready: Condvar::new(),
            point,
        });

        let worker_shared = Arc::clone(&shared);
        let spawned = std::thread::Builder::new()
            .name(format!("skein-manager-{generation}"))
            .spawn(move || run_worker(worker_shared));
        if let Err(error) = spawned {
            // Without a worker nothing can run; every submission resolves as stale.
            warn!(generation, %error, "failed to spawn manager worker");
            shared.lanes.lock().closed = true;
        }

        Self { shared }
    }

    /// Schedules `work` after every earlier submission of equal or higher
    /// priority. Resolves to [`Stale`] if the suspend point ends first, or if
    /// it has already ended.
    pub fn submit<T, F>(&self, priority: Priority, work: F) -> Submitted<T>
    where
        F: FnOnce(&ManagerContext<'_>) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.post(priority, move |cx| {
            let output = work(cx);
            if cx.is_current() {
                let _ = tx.send(output);
            } else {
                trace!(
                    generation = cx.generation(),
                    "discarding result computed after suspend point ended"
                );
            }
        });
        Submitted { rx }
    }

    /// Schedules `work` without waiting for it. The closure is dropped
    /// unrun if the queue is closed before the worker reaches it.
    pub fn post<F>(&self, priority: Priority, work: F)
    where
        F: FnOnce(&ManagerContext<'_>) + Send + 'static,
    {
        let job: Job = Box::new(work);
        let mut lanes = self.shared.lanes.lock();
        if lanes.closed {
            trace!(
                generation = self.shared.point.generation(),
                ?priority,
                "dropping submission to closed queue"
            );
            return;
        }
        match priority {
            Priority::Normal => lanes.normal.push_back(job),
            Priority::Background => lanes.background.push_back(job),
        }
        drop(lanes);
        self.shared.ready.notify_one();
    }

    /// Stops the worker. Pending work is dropped; an item already running
    /// completes but its result is discarded.
    pub fn close(&self) {
        let mut lanes = self.shared.lanes.lock();
        if lanes.closed {
            return;
        }
        lanes.closed = true;
        let dropped = lanes.normal.len() + lanes.background.len();
        lanes.normal.clear();
        lanes.background.clear();
        drop(lanes);
        self.shared.ready.notify_all();
        debug!(
            generation = self.shared.point.generation(),
            dropped, "manager queue closed"
        );
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lanes.lock().closed
    }

    pub fn pending(&self) -> usize {
        let lanes = self.shared.lanes.lock();
        lanes.normal.len() + lanes.background.len()
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_worker(shared: Arc<Shared>) {
    let cx = ManagerContext::new(&shared.point);
    loop {
        let job = {
            let mut lanes = shared.lanes.lock();
            loop {
                if lanes.closed {
                    return;
                }
                if let Some(job) = lanes.next() {
                    break job;
                }
                shared.ready.wait(&mut lanes);
            }
        };
        // The job's result sender is dropped while unwinding, so its caller
        // resolves as stale and the worker moves on.
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| job(&cx))) {
            let message = payload
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("<non-string panic>");
            warn!(generation = cx.generation(), panic = message, "manager job panicked");
        }
    }
}

/// Result of a [`TaskQueue::submit`] call.
pub struct Submitted<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for Submitted<T> {
    type Output = Result<T, Stale>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.rx).poll(cx).map(|result| result.map_err(|_| Stale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn queue(generation: u64) -> (Arc<PointState>, TaskQueue) {
        let point = Arc::new(PointState::new(generation, None));
        let queue = TaskQueue::start(Arc::clone(&point));
        (point, queue)
    }

    /// Occupies the worker until the returned sender is used.
    fn block_worker(queue: &TaskQueue) -> (mpsc::Sender<()>, mpsc::Receiver<()>) {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        let _ = queue.submit(Priority::Normal, move |_| {
            let _ = entered_tx.send(());
            let _ = release_rx.recv();
        });
        (release_tx, entered_rx)
    }

    #[tokio::test]
    async fn runs_work_with_manager_context() {
        let (_point, queue) = queue(4);
        let generation = queue
            .submit(Priority::Normal, |cx| cx.generation())
            .await
            .expect("live queue must run work");
        assert_eq!(generation, 4);
    }

    #[tokio::test]
    async fn normal_work_overtakes_queued_background_work() {
        let (_point, queue) = queue(1);
        let (release, entered) = block_worker(&queue);
        entered.recv().expect("worker must start the blocking job");

        let order = Arc::new(Mutex::new(Vec::new()));
        let record = |label: &'static str| {
            let order = Arc::clone(&order);
            move |_: &ManagerContext<'_>| order.lock().push(label)
        };
        let first_bg = queue.submit(Priority::Background, record("bg-1"));
        let second_bg = queue.submit(Priority::Background, record("bg-2"));
        let normal = queue.submit(Priority::Normal, record("normal"));
        assert_eq!(queue.pending(), 3);

        release.send(()).expect("worker must be waiting");
        normal.await.expect("normal work must run");
        first_bg.await.expect("background work must run");
        second_bg.await.expect("background work must run");

        assert_eq!(*order.lock(), vec!["normal", "bg-1", "bg-2"]);
    }

    #[tokio::test]
    async fn submissions_after_close_are_stale() {
        let (point, queue) = queue(2);
        point.end();
        queue.close();
        assert!(queue.is_closed());
        assert_eq!(queue.submit(Priority::Normal, |_| 1).await, Err(Stale));
    }

    #[tokio::test]
    async fn result_finished_after_invalidation_is_discarded() {
        let (point, queue) = queue(3);
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        let in_flight = queue.submit(Priority::Normal, move |_| {
            let _ = entered_tx.send(());
            let _ = release_rx.recv();
            42
        });
        let queued = queue.submit(Priority::Normal, |_| 7);
        entered_rx.recv().expect("worker must start");

        point.end();
        queue.close();
        release_tx.send(()).expect("worker must be waiting");

        assert_eq!(in_flight.await, Err(Stale));
        assert_eq!(queued.await, Err(Stale));
    }

    #[tokio::test]
    async fn worker_survives_a_panicking_job() {
        let (_point, queue) = queue(5);
        let crashed = queue.submit(Priority::Normal, |_| -> u32 { panic!("host bug") });
        assert_eq!(crashed.await, Err(Stale));

        let next = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            queue.submit(Priority::Normal, |_| 7u32),
        )
        .await
        .expect("worker must keep running after a panic");
        assert_eq!(next, Ok(7));
        assert!(!queue.is_closed());
    }

    #[tokio::test]
    async fn posted_work_dropped_by_close_never_runs() {
        let (point, queue) = queue(6);
        let (release, entered) = block_worker(&queue);
        entered.recv().expect("worker must start the blocking job");

        let ran = Arc::new(Mutex::new(false));
        queue.post(Priority::Background, {
            let ran = Arc::clone(&ran);
            move |_| *ran.lock() = true
        });
        assert_eq!(queue.pending(), 1);

        point.end();
        queue.close();
        release.send(()).expect("worker must be waiting");
        assert_eq!(queue.submit(Priority::Normal, |_| ()).await, Err(Stale));
        assert!(!*ran.lock());
    }
}
