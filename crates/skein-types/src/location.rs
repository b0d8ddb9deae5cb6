use facet::Facet;

/// Source name shown for locations that carry no debug information.
pub const UNKNOWN_SOURCE: &str = "Unknown Source";

/// One entry of a logical trace captured by the instrumentation library.
///
/// `line_number < 0` means the line is unknown.
#[derive(Facet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawTraceEntry {
    pub declaring_type: String,
    pub method_name: String,
    pub line_number: i32,
}

impl RawTraceEntry {
    pub fn new(
        declaring_type: impl Into<String>,
        method_name: impl Into<String>,
        line_number: i32,
    ) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            method_name: method_name.into(),
            line_number,
        }
    }

    /// True if this entry is the boundary between the suspension segment and
    /// the creation segment of a trace.
    pub fn is_creation_separator(&self, separator_prefix: &str) -> bool {
        !separator_prefix.is_empty() && self.declaring_type.starts_with(separator_prefix)
    }
}

/// A concrete source location, or a synthesized stand-in when no debug
/// information resolved.
#[derive(Facet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    /// Source file name (e.g. `Main.kt`). For synthesized locations this is
    /// the declaring type, so identities stay distinct across types.
    pub source_name: String,
    pub declaring_type: String,
    pub method_name: String,
    pub line_number: i32,
    /// Set when the location was synthesized rather than resolved.
    #[facet(default)]
    pub synthesized: bool,
}

impl Location {
    pub fn new(
        source_name: impl Into<String>,
        declaring_type: impl Into<String>,
        method_name: impl Into<String>,
        line_number: i32,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            declaring_type: declaring_type.into(),
            method_name: method_name.into(),
            line_number,
            synthesized: false,
        }
    }

    /// Builds a stand-in carrying the requested fields verbatim.
    pub fn placeholder(
        declaring_type: impl Into<String>,
        method_name: impl Into<String>,
        line_number: i32,
    ) -> Self {
        let declaring_type = declaring_type.into();
        Self {
            source_name: declaring_type.clone(),
            declaring_type,
            method_name: method_name.into(),
            line_number,
            synthesized: true,
        }
    }

    pub fn placeholder_for(entry: &RawTraceEntry) -> Self {
        Self::placeholder(
            entry.declaring_type.clone(),
            entry.method_name.clone(),
            entry.line_number,
        )
    }

    /// `sourceName:method:line`, stable across rebuilds of the same pause
    /// and across pauses that reach the same code.
    pub fn unique_id(&self) -> String {
        format!(
            "{}:{}:{}",
            self.source_name, self.method_name, self.line_number
        )
    }

    pub fn known_line(&self) -> Option<u32> {
        u32::try_from(self.line_number).ok()
    }

    /// Source name for display; synthesized locations have none.
    pub fn display_source(&self) -> &str {
        if self.synthesized {
            UNKNOWN_SOURCE
        } else {
            &self.source_name
        }
    }

    /// Declaring type without its package.
    pub fn simple_type_name(&self) -> &str {
        match self.declaring_type.rfind('.') {
            Some(dot) => &self.declaring_type[dot + 1..],
            None => &self.declaring_type,
        }
    }

    pub fn package_name(&self) -> Option<&str> {
        self.declaring_type
            .rfind('.')
            .map(|dot| &self.declaring_type[..dot])
    }
}
