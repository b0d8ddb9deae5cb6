use skein_types::{Location, RawTraceEntry};
use tracing::trace;

use crate::{HostEngine, ManagerContext, ResolutionFailure};

/// Turns `(type, method, line)` triples into locations. Total: every lookup
/// failure degrades to a synthesized placeholder.
pub struct LocationResolver<'h> {
    host: &'h dyn HostEngine,
}

impl<'h> LocationResolver<'h> {
    pub fn new(host: &'h dyn HostEngine) -> Self {
        Self { host }
    }

    pub fn resolve(
        &self,
        cx: &ManagerContext<'_>,
        declaring_type: &str,
        method_name: &str,
        line: i32,
    ) -> Location {
        match self.lookup(cx, declaring_type, method_name, line) {
            Ok(location) => location,
            Err(failure) => {
                trace!(declaring_type, method_name, line, %failure, "synthesizing placeholder location");
                Location::placeholder(declaring_type, method_name, line)
            }
        }
    }

    pub fn resolve_entry(&self, cx: &ManagerContext<'_>, entry: &RawTraceEntry) -> Location {
        self.resolve(
            cx,
            &entry.declaring_type,
            &entry.method_name,
            entry.line_number,
        )
    }

    fn lookup(
        &self,
        cx: &ManagerContext<'_>,
        declaring_type: &str,
        method_name: &str,
        line: i32,
    ) -> Result<Location, ResolutionFailure> {
        if line < 0 {
            return Err(ResolutionFailure::UnknownLine { line });
        }
        // Inlined code puts several methods on one line; only an exact name
        // match is trusted.
        self.host
            .locations_of_line(cx, declaring_type, line)?
            .into_iter()
            .find(|location| location.method_name == method_name)
            .ok_or_else(|| ResolutionFailure::NoMatchingMethod {
                method_name: method_name.to_string(),
                line,
            })
    }
}
