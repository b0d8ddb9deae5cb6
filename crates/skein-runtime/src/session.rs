use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use skein_types::ThreadRef;
use tracing::info;

use crate::{CoroutineProbe, HostEngine, ReconcileConfig, SuspendPoint};

/// Tracks pauses of one debuggee. At most one suspend point is live; a new
/// pause or a resume ends the previous one.
pub struct DebugSession {
    host: Arc<dyn HostEngine>,
    probe: Arc<dyn CoroutineProbe>,
    config: Arc<ReconcileConfig>,
    current: Mutex<Option<Arc<SuspendPoint>>>,
    next_generation: AtomicU64,
}

impl DebugSession {
    pub fn new(
        host: Arc<dyn HostEngine>,
        probe: Arc<dyn CoroutineProbe>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            host,
            probe,
            config: Arc::new(config),
            current: Mutex::new(None),
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// The process paused, optionally on a specific thread.
    pub fn paused(&self, paused_thread: Option<ThreadRef>) -> Arc<SuspendPoint> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let point = SuspendPoint::new(
            generation,
            paused_thread,
            Arc::clone(&self.host),
            Arc::clone(&self.probe),
            Arc::clone(&self.config),
        );
        let previous = self.current.lock().replace(Arc::clone(&point));
        if let Some(previous) = previous {
            previous.end();
        }
        info!(generation, "target paused");
        point
    }

    pub fn resumed(&self) {
        if let Some(point) = self.current.lock().take() {
            info!(generation = point.generation(), "target resumed");
            point.end();
        }
    }

    pub fn current(&self) -> Option<Arc<SuspendPoint>> {
        self.current.lock().clone()
    }
}
