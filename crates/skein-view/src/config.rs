use std::time::Duration;

/// How long a resumed target may stay running before the tree is blanked.
pub const DEFAULT_CLEAR_DELAY: Duration = Duration::from_millis(100);

pub const CLEAR_DELAY_ENV: &str = "SKEIN_VIEW_CLEAR_DELAY_MS";

/// Which parts of a frame label are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSettings {
    pub show_line_number: bool,
    pub show_class_name: bool,
    pub show_package_name: bool,
    pub show_source_name: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            show_line_number: true,
            show_class_name: true,
            show_package_name: false,
            show_source_name: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewConfig {
    pub clear_delay: Duration,
    pub render: RenderSettings,
    /// Reconcile every listed coroutine in the background once the list
    /// arrives, so that later expansions hit the cache.
    pub prefetch_frames: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            clear_delay: DEFAULT_CLEAR_DELAY,
            render: RenderSettings::default(),
            prefetch_frames: true,
        }
    }
}

impl ViewConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(CLEAR_DELAY_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(millis) => config.clear_delay = Duration::from_millis(millis),
                Err(error) => {
                    tracing::warn!(%raw, %error, "ignoring invalid {CLEAR_DELAY_ENV}");
                }
            }
        }
        config
    }
}
