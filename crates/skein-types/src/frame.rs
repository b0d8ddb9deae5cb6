use facet::Facet;

use crate::{Location, RawTraceEntry, ThreadId};

/// A native call frame, valid only within the suspend point that produced it.
#[derive(Facet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeFrame {
    pub thread: ThreadId,
    /// Position in the thread's stack, 0 being the innermost frame.
    pub index: u32,
    pub location: Location,
}

impl NativeFrame {
    pub fn new(thread: ThreadId, index: u32, location: Location) -> Self {
        Self {
            thread,
            index,
            location,
        }
    }
}

/// Which segment of a reconciled stack a frame belongs to.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum FrameKind {
    /// A native frame currently executing on the coroutine's owner thread.
    Running,
    /// An entry of the logical trace captured at suspension.
    Suspended,
    /// A logical frame substituted for a dispatcher frame.
    AsyncGap,
    /// An entry of the creation trace.
    Creation,
}

impl FrameKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Suspended => "suspended",
            Self::AsyncGap => "async_gap",
            Self::Creation => "creation",
        }
    }
}

/// One item of a reconciled coroutine stack.
///
/// Every variant resolves to exactly one [`Location`], which gives the item
/// its display and its identity.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum StackFrameItem {
    Running {
        frame: NativeFrame,
    },
    Suspended {
        entry: RawTraceEntry,
        location: Location,
        /// First frame of the paused thread; used for grouping only.
        anchor: Option<NativeFrame>,
    },
    AsyncGap {
        location: Location,
        /// The dispatcher frame this item stands in for.
        resume_frame: NativeFrame,
    },
    Creation {
        entry: RawTraceEntry,
        location: Location,
        anchor: Option<NativeFrame>,
    },
}

impl StackFrameItem {
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::Running { .. } => FrameKind::Running,
            Self::Suspended { .. } => FrameKind::Suspended,
            Self::AsyncGap { .. } => FrameKind::AsyncGap,
            Self::Creation { .. } => FrameKind::Creation,
        }
    }

    pub fn location(&self) -> &Location {
        match self {
            Self::Running { frame } => &frame.location,
            Self::Suspended { location, .. }
            | Self::AsyncGap { location, .. }
            | Self::Creation { location, .. } => location,
        }
    }

    pub fn unique_id(&self) -> String {
        self.location().unique_id()
    }

    pub fn is_creation(&self) -> bool {
        matches!(self, Self::Creation { .. })
    }
}

/// Checks the segment ordering every reconciled stack must satisfy: no
/// non-creation item may follow a creation item.
pub fn creation_is_suffix(items: &[StackFrameItem]) -> bool {
    let first_creation = items
        .iter()
        .position(StackFrameItem::is_creation)
        .unwrap_or(items.len());
    items[first_creation..].iter().all(StackFrameItem::is_creation)
}
