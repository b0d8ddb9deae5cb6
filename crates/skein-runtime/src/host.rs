use skein_types::{CoroutineSummary, Location, NativeFrame, ThreadId, ThreadRef};

use crate::{FetchError, HostError, PointState, ResolutionFailure};

/// Proof that the caller runs on the serialized worker of a live suspend
/// point. Only the [`TaskQueue`](crate::TaskQueue) worker constructs one, so
/// every host and instrumentation call is forced onto that worker.
pub struct ManagerContext<'a> {
    point: &'a PointState,
}

impl<'a> ManagerContext<'a> {
    pub(crate) fn new(point: &'a PointState) -> Self {
        Self { point }
    }

    pub fn generation(&self) -> u64 {
        self.point.generation()
    }

    /// The thread the debugger stopped on, if any.
    pub fn paused_thread(&self) -> Option<&ThreadRef> {
        self.point.paused_thread()
    }

    /// False once the owning suspend point has ended.
    pub fn is_current(&self) -> bool {
        self.point.is_alive()
    }
}

/// The host debugger engine, as far as reconciliation needs it.
pub trait HostEngine: Send + Sync {
    fn native_threads(&self, cx: &ManagerContext<'_>) -> Result<Vec<ThreadRef>, HostError>;

    /// Frames of `thread`, innermost first.
    fn frames(
        &self,
        cx: &ManagerContext<'_>,
        thread: ThreadId,
    ) -> Result<Vec<NativeFrame>, HostError>;

    /// Every location of `declaring_type` on `line`, one per method that
    /// contributes code to it (several when code was inlined).
    fn locations_of_line(
        &self,
        cx: &ManagerContext<'_>,
        declaring_type: &str,
        line: i32,
    ) -> Result<Vec<Location>, ResolutionFailure>;

    /// Logical frames hidden behind a dispatcher's resume frame. Engines
    /// without async stack support keep the default.
    fn async_trace_for(
        &self,
        _cx: &ManagerContext<'_>,
        _resume_frame: &NativeFrame,
    ) -> Option<Vec<Location>> {
        None
    }
}

/// The coroutine instrumentation library inside the target.
pub trait CoroutineProbe: Send + Sync {
    fn dump_coroutines(
        &self,
        cx: &ManagerContext<'_>,
    ) -> Result<Vec<CoroutineSummary>, FetchError>;
}
