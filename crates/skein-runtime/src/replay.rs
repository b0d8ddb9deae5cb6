//! A host engine and probe backed by a recorded pause.
//!
//! A [`PauseRecording`] holds everything reconciliation reads from the
//! outside world at one pause. [`ReplayHost`] serves it back through the
//! [`HostEngine`] and [`CoroutineProbe`] interfaces and counts calls.

use std::error::Error;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use facet::Facet;
use skein_types::{CoroutineSummary, Location, NativeFrame, ThreadId, ThreadRef};

use crate::{CoroutineProbe, FetchError, HostEngine, HostError, ManagerContext, ResolutionFailure};

#[derive(Facet, Debug, Clone, Default)]
pub struct PauseRecording {
    /// Thread the debugger stopped on.
    #[facet(default)]
    pub paused_thread: Option<ThreadId>,
    #[facet(default)]
    pub threads: Vec<RecordedThread>,
    #[facet(default)]
    pub types: Vec<RecordedType>,
    #[facet(default)]
    pub async_traces: Vec<RecordedAsyncTrace>,
    #[facet(default)]
    pub coroutines: Vec<CoroutineSummary>,
    /// When set, the coroutine dump fails with this message.
    #[facet(default)]
    pub dump_error: Option<String>,
}

#[derive(Facet, Debug, Clone)]
pub struct RecordedThread {
    pub thread: ThreadRef,
    /// Innermost first.
    pub frames: Vec<Location>,
}

#[derive(Facet, Debug, Clone)]
pub struct RecordedType {
    pub name: String,
    pub source_name: String,
    #[facet(default)]
    pub methods: Vec<RecordedMethod>,
}

#[derive(Facet, Debug, Clone)]
pub struct RecordedMethod {
    pub name: String,
    #[facet(default)]
    pub lines: Vec<i32>,
}

#[derive(Facet, Debug, Clone)]
pub struct RecordedAsyncTrace {
    pub thread: ThreadId,
    pub frame_index: u32,
    pub frames: Vec<Location>,
}

#[derive(Debug)]
pub enum RecordingError {
    Read { path: String, reason: String },
    Decode(String),
}

impl fmt::Display for RecordingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, reason } => write!(f, "read recording {path}: {reason}"),
            Self::Decode(reason) => write!(f, "decode recording: {reason}"),
        }
    }
}

impl Error for RecordingError {}

impl PauseRecording {
    pub fn from_json(text: &str) -> Result<Self, RecordingError> {
        facet_json::from_str(text).map_err(|error| RecordingError::Decode(error.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, RecordingError> {
        let text = std::fs::read_to_string(path).map_err(|error| RecordingError::Read {
            path: path.display().to_string(),
            reason: error.to_string(),
        })?;
        Self::from_json(&text)
    }

    pub fn paused_thread_ref(&self) -> Option<ThreadRef> {
        let paused = self.paused_thread?;
        self.threads
            .iter()
            .find(|recorded| recorded.thread.id == paused)
            .map(|recorded| recorded.thread.clone())
    }

    pub fn with_thread(mut self, thread: ThreadRef, frames: Vec<Location>) -> Self {
        self.threads.push(RecordedThread { thread, frames });
        self
    }

    pub fn with_type(mut self, name: &str, source_name: &str, methods: &[(&str, &[i32])]) -> Self {
        self.types.push(RecordedType {
            name: name.to_string(),
            source_name: source_name.to_string(),
            methods: methods
                .iter()
                .map(|(method, lines)| RecordedMethod {
                    name: method.to_string(),
                    lines: lines.to_vec(),
                })
                .collect(),
        });
        self
    }

    pub fn with_async_trace(mut self, thread: ThreadId, frame_index: u32, frames: Vec<Location>) -> Self {
        self.async_traces.push(RecordedAsyncTrace {
            thread,
            frame_index,
            frames,
        });
        self
    }

    pub fn with_coroutine(mut self, summary: CoroutineSummary) -> Self {
        self.coroutines.push(summary);
        self
    }

    pub fn paused_on(mut self, thread: ThreadId) -> Self {
        self.paused_thread = Some(thread);
        self
    }

    pub fn failing_dump(mut self, message: &str) -> Self {
        self.dump_error = Some(message.to_string());
        self
    }
}

/// Serves a [`PauseRecording`] through the host and probe interfaces.
pub struct ReplayHost {
    recording: PauseRecording,
    dump_calls: AtomicUsize,
    frames_calls: AtomicUsize,
    line_lookups: AtomicUsize,
}

impl ReplayHost {
    pub fn new(recording: PauseRecording) -> Self {
        Self {
            recording,
            dump_calls: AtomicUsize::new(0),
            frames_calls: AtomicUsize::new(0),
            line_lookups: AtomicUsize::new(0),
        }
    }

    pub fn recording(&self) -> &PauseRecording {
        &self.recording
    }

    pub fn dump_calls(&self) -> usize {
        self.dump_calls.load(Ordering::Relaxed)
    }

    pub fn frames_calls(&self) -> usize {
        self.frames_calls.load(Ordering::Relaxed)
    }

    pub fn line_lookups(&self) -> usize {
        self.line_lookups.load(Ordering::Relaxed)
    }
}

impl HostEngine for ReplayHost {
    fn native_threads(&self, _cx: &ManagerContext<'_>) -> Result<Vec<ThreadRef>, HostError> {
        Ok(self
            .recording
            .threads
            .iter()
            .map(|recorded| recorded.thread.clone())
            .collect())
    }

    fn frames(
        &self,
        _cx: &ManagerContext<'_>,
        thread: ThreadId,
    ) -> Result<Vec<NativeFrame>, HostError> {
        self.frames_calls.fetch_add(1, Ordering::Relaxed);
        let recorded = self
            .recording
            .threads
            .iter()
            .find(|recorded| recorded.thread.id == thread)
            .ok_or(HostError::ThreadNotFound { thread })?;
        Ok(recorded
            .frames
            .iter()
            .zip(0u32..)
            .map(|(location, index)| NativeFrame::new(thread, index, location.clone()))
            .collect())
    }

    fn locations_of_line(
        &self,
        _cx: &ManagerContext<'_>,
        declaring_type: &str,
        line: i32,
    ) -> Result<Vec<Location>, ResolutionFailure> {
        self.line_lookups.fetch_add(1, Ordering::Relaxed);
        let recorded = self
            .recording
            .types
            .iter()
            .find(|recorded| recorded.name == declaring_type)
            .ok_or_else(|| ResolutionFailure::TypeNotLoaded {
                declaring_type: declaring_type.to_string(),
            })?;
        if recorded.methods.iter().all(|method| method.lines.is_empty()) {
            return Err(ResolutionFailure::AbsentInformation {
                declaring_type: declaring_type.to_string(),
            });
        }
        Ok(recorded
            .methods
            .iter()
            .filter(|method| method.lines.contains(&line))
            .map(|method| {
                Location::new(
                    recorded.source_name.clone(),
                    recorded.name.clone(),
                    method.name.clone(),
                    line,
                )
            })
            .collect())
    }

    fn async_trace_for(
        &self,
        _cx: &ManagerContext<'_>,
        resume_frame: &NativeFrame,
    ) -> Option<Vec<Location>> {
        self.recording
            .async_traces
            .iter()
            .find(|trace| {
                trace.thread == resume_frame.thread && trace.frame_index == resume_frame.index
            })
            .map(|trace| trace.frames.clone())
    }
}

impl CoroutineProbe for ReplayHost {
    fn dump_coroutines(
        &self,
        _cx: &ManagerContext<'_>,
    ) -> Result<Vec<CoroutineSummary>, FetchError> {
        self.dump_calls.fetch_add(1, Ordering::Relaxed);
        match &self.recording.dump_error {
            Some(message) => Err(FetchError::Remote(message.clone())),
            None => Ok(self.recording.coroutines.clone()),
        }
    }
}
