use std::fmt::Write as _;
use std::sync::Arc;

use skein_types::{CoroutineSummary, Location, StackFrameItem};

use crate::{CoroutineRecord, StoreError, SuspendPoint};

/// `"name": STATE`, plus the owner thread when there is one. Thread names
/// often carry a ` @<coroutine>` suffix; it is stripped.
pub fn coroutine_label(summary: &CoroutineSummary) -> String {
    let mut label = format!("\"{}\": {}", summary.name, summary.state);
    if let Some(thread) = &summary.owner_thread {
        let suffix = format!(" @{}", summary.name);
        let name = match thread.name.find(&suffix) {
            Some(end) => &thread.name[..end],
            None => thread.name.as_str(),
        };
        if !name.is_empty() {
            let _ = write!(label, " on thread \"{name}\"");
        }
    }
    label
}

/// `Type.method(Source:line)`, in the shape of a JVM stack trace line.
pub fn trace_line(location: &Location) -> String {
    match location.known_line() {
        Some(line) => format!(
            "{}.{}({}:{line})",
            location.declaring_type,
            location.method_name,
            location.display_source()
        ),
        None => format!(
            "{}.{}({})",
            location.declaring_type,
            location.method_name,
            location.display_source()
        ),
    }
}

/// Renders reconciled coroutines as a thread-dump-like text block.
pub fn render_dump(coroutines: &[(Arc<CoroutineRecord>, Arc<[StackFrameItem]>)]) -> String {
    let mut out = String::new();
    for (record, frames) in coroutines {
        let _ = writeln!(out, "{}", coroutine_label(record.summary()));
        let mut in_creation = false;
        for item in frames.iter() {
            if item.is_creation() && !in_creation {
                in_creation = true;
                let _ = writeln!(out, "\t(Coroutine creation stacktrace)");
            }
            let _ = writeln!(out, "\tat {}", trace_line(item.location()));
        }
        out.push('\n');
    }
    out
}

/// Fetches and reconciles every coroutine of `point`, then renders the dump.
pub async fn dump_point(point: &SuspendPoint) -> Result<String, StoreError> {
    let records = point.list_coroutines().await?;
    let mut reconciled = Vec::with_capacity(records.len());
    for record in records.iter() {
        let frames = point.frames(record).await?;
        reconciled.push((Arc::clone(record), frames));
    }
    Ok(render_dump(&reconciled))
}
