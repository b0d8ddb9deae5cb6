//! Merging native frames, the captured logical trace, and the creation trace
//! into one ordered stack.
//!
//! Output layout, which the presentation layer relies on:
//!
//! ```text
//! [ Running | Suspended | AsyncGap ... ][ Creation ... ]
//!   prefix: how the coroutine got here    suffix: where it was spawned
//! ```

use std::sync::Arc;

use skein_types::{
    CoroutineState, CoroutineSummary, NativeFrame, RawTraceEntry, StackFrameItem,
};
use tracing::{debug, trace};

use crate::{HostEngine, LocationResolver, ManagerContext, ReconcileConfig};

/// Index of the entry separating suspension entries from creation entries.
///
/// Falls back to the last index when no separator is present, so the whole
/// trace counts as suspension entries. `None` only for an empty trace.
pub fn creation_boundary(trace: &[RawTraceEntry], separator_prefix: &str) -> Option<usize> {
    trace
        .iter()
        .position(|entry| entry.is_creation_separator(separator_prefix))
        .or_else(|| trace.len().checked_sub(1))
}

/// Innermost frame whose method is a resume marker.
///
/// This is a naming heuristic, not a parse of the dispatcher: it assumes the
/// instrumentation library re-enters user code through a method with one of
/// the configured names.
pub fn resume_index(frames: &[NativeFrame], config: &ReconcileConfig) -> Option<usize> {
    frames
        .iter()
        .position(|frame| config.is_resume_method(&frame.location.method_name))
}

enum Prefix {
    Running(Vec<NativeFrame>),
    Suspended,
    Empty,
}

pub struct FrameReconciler {
    host: Arc<dyn HostEngine>,
    config: Arc<ReconcileConfig>,
}

impl FrameReconciler {
    pub fn new(host: Arc<dyn HostEngine>, config: Arc<ReconcileConfig>) -> Self {
        Self { host, config }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Builds the reconciled stack of one coroutine. Never fails: lookups
    /// that miss degrade to placeholders, and a running coroutine whose
    /// thread cannot be read is treated as suspended.
    pub fn build(
        &self,
        cx: &ManagerContext<'_>,
        coroutine: &CoroutineSummary,
    ) -> Vec<StackFrameItem> {
        let resolver = LocationResolver::new(self.host.as_ref());
        let trace = &coroutine.raw_trace;
        let split = creation_boundary(trace, &self.config.creation_separator_prefix)
            .map_or(0, |boundary| boundary + 1);
        let (suspended_entries, creation_entries) = trace.split_at(split);

        let prefix = self.prefix(cx, coroutine);
        let anchored = !creation_entries.is_empty()
            || (matches!(prefix, Prefix::Suspended) && !suspended_entries.is_empty());
        let anchor = if anchored {
            self.paused_thread_top(cx)
        } else {
            None
        };
        let mut items = Vec::with_capacity(trace.len());

        match prefix {
            Prefix::Running(frames) => self.push_running(cx, frames, &mut items),
            Prefix::Suspended => {
                items.extend(suspended_entries.iter().map(|entry| StackFrameItem::Suspended {
                    location: resolver.resolve_entry(cx, entry),
                    entry: entry.clone(),
                    anchor: anchor.clone(),
                }));
            }
            Prefix::Empty => {}
        }

        items.extend(creation_entries.iter().map(|entry| StackFrameItem::Creation {
            location: resolver.resolve_entry(cx, entry),
            entry: entry.clone(),
            anchor: anchor.clone(),
        }));

        trace!(
            coroutine = %coroutine.id,
            state = %coroutine.state,
            frames = items.len(),
            creation = creation_entries.len(),
            "reconciled coroutine stack"
        );
        items
    }

    fn prefix(&self, cx: &ManagerContext<'_>, coroutine: &CoroutineSummary) -> Prefix {
        match coroutine.state {
            CoroutineState::Suspended => Prefix::Suspended,
            CoroutineState::Running => match self.owner_frames(cx, coroutine) {
                Some(frames) => Prefix::Running(frames),
                None => {
                    debug!(
                        coroutine = %coroutine.id,
                        "running coroutine has no readable owner thread; using captured trace"
                    );
                    Prefix::Suspended
                }
            },
            CoroutineState::Created => {
                if self.owner_is_live(cx, coroutine) {
                    Prefix::Empty
                } else {
                    Prefix::Suspended
                }
            }
        }
    }

    fn owner_is_live(&self, cx: &ManagerContext<'_>, coroutine: &CoroutineSummary) -> bool {
        let Some(owner) = &coroutine.owner_thread else {
            return false;
        };
        match self.host.native_threads(cx) {
            Ok(threads) => threads.iter().any(|thread| thread.id == owner.id),
            Err(error) => {
                debug!(%error, "could not list native threads");
                false
            }
        }
    }

    fn owner_frames(
        &self,
        cx: &ManagerContext<'_>,
        coroutine: &CoroutineSummary,
    ) -> Option<Vec<NativeFrame>> {
        if !self.owner_is_live(cx, coroutine) {
            return None;
        }
        let owner = coroutine.owner_thread.as_ref()?;
        match self.host.frames(cx, owner.id) {
            Ok(frames) if !frames.is_empty() => Some(frames),
            Ok(_) => None,
            Err(error) => {
                debug!(thread = %owner.id, %error, "could not read owner thread frames");
                None
            }
        }
    }

    fn push_running(
        &self,
        cx: &ManagerContext<'_>,
        mut frames: Vec<NativeFrame>,
        items: &mut Vec<StackFrameItem>,
    ) {
        let Some(resume) = resume_index(&frames, &self.config) else {
            trace!("no resume frame on owner thread; keeping the full native stack");
            items.extend(frames.into_iter().map(|frame| StackFrameItem::Running { frame }));
            return;
        };

        // Everything outside the resume frame belongs to the dispatcher.
        let dropped = frames.len() - resume - 1;
        frames.truncate(resume + 1);
        let Some(resume_frame) = frames.pop() else {
            return;
        };
        items.extend(frames.into_iter().map(|frame| StackFrameItem::Running { frame }));

        match self
            .host
            .async_trace_for(cx, &resume_frame)
            .filter(|locations| !locations.is_empty())
        {
            Some(locations) => {
                items.extend(locations.into_iter().map(|location| StackFrameItem::AsyncGap {
                    location,
                    resume_frame: resume_frame.clone(),
                }));
            }
            None => items.push(StackFrameItem::Running {
                frame: resume_frame,
            }),
        }
        trace!(resume, dropped, "expanded resume frame");
    }

    fn paused_thread_top(&self, cx: &ManagerContext<'_>) -> Option<NativeFrame> {
        let paused = cx.paused_thread()?;
        match self.host.frames(cx, paused.id) {
            Ok(frames) => frames.into_iter().next(),
            Err(error) => {
                debug!(thread = %paused.id, %error, "could not read paused thread frames");
                None
            }
        }
    }
}
