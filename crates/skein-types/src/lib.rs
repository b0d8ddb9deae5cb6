//! Core data model shared by the skein runtime and view crates.
//!
//! A coroutine's history arrives in three fragments: the live native frames of
//! whichever thread runs it, the logical trace captured by the instrumentation
//! library when it last suspended, and the creation trace recorded when it was
//! spawned. These types describe the fragments and the reconciled
//! [`StackFrameItem`] sequence built from them.

use facet::Facet;
use std::fmt;

mod coroutine;
mod frame;
mod location;

pub use coroutine::*;
pub use frame::*;
pub use location::*;

macro_rules! define_u64_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        #[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[facet(transparent)]
        $(#[$meta])*
        pub struct $name(u64);

        impl $name {
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_u64_id!(
    /// Identifier the instrumentation library assigns to a coroutine.
    CoroutineId
);

define_u64_id!(
    /// Host-engine identifier of a native thread, valid for one suspend point.
    ThreadId
);

/// A native thread as reported by the host engine.
#[derive(Facet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadRef {
    pub id: ThreadId,
    pub name: String,
}

impl ThreadRef {
    pub fn new(id: ThreadId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}
