use facet::Facet;
use std::fmt;

use crate::{CoroutineId, RawTraceEntry, ThreadRef};

/// Lifecycle state reported by the instrumentation library.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum CoroutineState {
    Created,
    Running,
    Suspended,
}

impl CoroutineState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Running => "RUNNING",
            Self::Suspended => "SUSPENDED",
        }
    }
}

impl fmt::Display for CoroutineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One live coroutine as returned by a dump request.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct CoroutineSummary {
    pub id: CoroutineId,
    pub name: String,
    pub state: CoroutineState,
    pub owner_thread: Option<ThreadRef>,
    /// Suspension entries, then the separator, then creation entries.
    pub raw_trace: Vec<RawTraceEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ThreadId;

    #[test]
    fn summary_decodes_from_recorded_json() {
        let json = r#"{
            "id": 7,
            "name": "worker",
            "state": "running",
            "owner_thread": { "id": 3, "name": "DefaultDispatcher-worker-1 @worker#7" },
            "raw_trace": [
                { "declaring_type": "Foo", "method_name": "bar", "line_number": 10 }
            ]
        }"#;
        let summary: CoroutineSummary = facet_json::from_str(json).expect("summary must decode");
        assert_eq!(summary.id, CoroutineId::new(7));
        assert_eq!(summary.state, CoroutineState::Running);
        assert_eq!(
            summary.owner_thread.as_ref().map(|thread| thread.id),
            Some(ThreadId::new(3))
        );
        assert_eq!(summary.raw_trace, vec![RawTraceEntry::new("Foo", "bar", 10)]);
    }

    #[test]
    fn state_displays_upper_case() {
        assert_eq!(CoroutineState::Suspended.to_string(), "SUSPENDED");
    }
}
