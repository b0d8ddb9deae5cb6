use std::fmt::Write as _;

use skein_runtime::{FetchError, coroutine_label};
use skein_types::{CoroutineState, CoroutineSummary, Location};

use crate::RenderSettings;

/// Name of the single group every coroutine is listed under.
pub const DEFAULT_GROUP: &str = "Default group";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Icon {
    ThreadGroup,
    ThreadSuspended,
    ThreadRunning,
    ThreadIdle,
    Exception,
}

/// What a node looks like: a label and an optional icon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presentation {
    pub text: String,
    pub icon: Option<Icon>,
}

impl Presentation {
    pub fn new(text: impl Into<String>, icon: Option<Icon>) -> Self {
        Self {
            text: text.into(),
            icon,
        }
    }

    pub fn blank() -> Self {
        Self::new(String::new(), None)
    }
}

pub fn state_icon(state: CoroutineState) -> Icon {
    match state {
        CoroutineState::Suspended => Icon::ThreadSuspended,
        CoroutineState::Running => Icon::ThreadRunning,
        CoroutineState::Created => Icon::ThreadIdle,
    }
}

pub fn render_group(name: &str) -> Presentation {
    Presentation::new(name, Some(Icon::ThreadGroup))
}

pub fn render_coroutine(summary: &CoroutineSummary) -> Presentation {
    Presentation::new(coroutine_label(summary), Some(state_icon(summary.state)))
}

pub fn render_creation_group(coroutine_name: &str) -> Presentation {
    Presentation::new(format!("Creation stack frame of {coroutine_name}"), None)
}

pub fn render_error(error: &FetchError) -> Presentation {
    Presentation::new(error.to_string(), Some(Icon::Exception))
}

pub fn render_frame(location: &Location, settings: &RenderSettings) -> Presentation {
    Presentation::new(frame_label(location, settings), None)
}

/// `method:line, SimpleType (package), Source`, each part optional.
pub fn frame_label(location: &Location, settings: &RenderSettings) -> String {
    let mut text = location.method_name.clone();
    if settings.show_line_number {
        match location.known_line() {
            Some(line) => {
                let _ = write!(text, ":{line}");
            }
            None => text.push_str(":?"),
        }
    }
    if settings.show_class_name {
        let _ = write!(text, ", {}", location.simple_type_name());
    }
    if settings.show_package_name
        && let Some(package) = location.package_name()
    {
        let _ = write!(text, " ({package})");
    }
    if settings.show_source_name {
        let _ = write!(text, ", {}", location.display_source());
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_types::{CoroutineId, ThreadId, ThreadRef};

    #[test]
    fn frame_label_with_default_settings() {
        let location = Location::new("Foo.kt", "com.example.Foo", "bar", 10);
        assert_eq!(frame_label(&location, &RenderSettings::default()), "bar:10, Foo, Foo.kt");
    }

    #[test]
    fn frame_label_with_package_and_placeholder() {
        let settings = RenderSettings {
            show_package_name: true,
            ..RenderSettings::default()
        };
        let location = Location::placeholder("com.example.Gone", "run", -1);
        assert_eq!(
            frame_label(&location, &settings),
            "run:?, Gone (com.example), Unknown Source"
        );
    }

    #[test]
    fn frame_label_with_everything_hidden() {
        let settings = RenderSettings {
            show_line_number: false,
            show_class_name: false,
            show_package_name: false,
            show_source_name: false,
        };
        let location = Location::new("Foo.kt", "Foo", "bar", 10);
        assert_eq!(frame_label(&location, &settings), "bar");
    }

    #[test]
    fn coroutine_icon_follows_state() {
        let summary = CoroutineSummary {
            id: CoroutineId::new(7),
            name: "loader#7".to_string(),
            state: CoroutineState::Created,
            owner_thread: Some(ThreadRef::new(ThreadId::new(3), "io-1 @loader#7")),
            raw_trace: Vec::new(),
        };
        let presentation = render_coroutine(&summary);
        assert_eq!(presentation.text, "\"loader#7\": CREATED on thread \"io-1\"");
        assert_eq!(presentation.icon, Some(Icon::ThreadIdle));
    }

    #[test]
    fn error_node_uses_exception_icon() {
        let presentation = render_error(&FetchError::NotSuspended);
        assert_eq!(presentation.text, "target process is not suspended");
        assert_eq!(presentation.icon, Some(Icon::Exception));
    }
}
