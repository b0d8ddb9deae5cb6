/// Separator prefix the instrumentation library writes between the
/// suspension entries and the creation entries of a captured trace.
pub const DEFAULT_CREATION_SEPARATOR: &str = "\u{8}\u{8}\u{8}";

/// Method through which control re-enters user code after a suspension.
pub const DEFAULT_RESUME_METHOD: &str = "resumeWith";

pub const CREATION_SEPARATOR_ENV: &str = "SKEIN_CREATION_SEPARATOR";
pub const RESUME_METHODS_ENV: &str = "SKEIN_RESUME_METHODS";

/// Naming conventions of the instrumentation library. These are conventions,
/// not something that can be derived from the target, so they stay
/// configurable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileConfig {
    pub creation_separator_prefix: String,
    pub resume_method_names: Vec<String>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            creation_separator_prefix: DEFAULT_CREATION_SEPARATOR.to_string(),
            resume_method_names: vec![DEFAULT_RESUME_METHOD.to_string()],
        }
    }
}

impl ReconcileConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(prefix) = lookup(CREATION_SEPARATOR_ENV).filter(|value| !value.is_empty()) {
            config.creation_separator_prefix = prefix;
        }
        if let Some(methods) = lookup(RESUME_METHODS_ENV) {
            let names: Vec<String> = methods
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
            if !names.is_empty() {
                config.resume_method_names = names;
            }
        }
        config
    }

    pub fn is_resume_method(&self, method_name: &str) -> bool {
        self.resume_method_names
            .iter()
            .any(|name| name == method_name)
    }
}
