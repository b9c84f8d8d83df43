const DEFAULT_MAX_DEPTH: usize = 256;

/// Runtime settings of one parser instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// Repair syntax errors and keep parsing.
    pub error_recovery: bool,

    /// Maximum rule nesting before the parse is aborted with a fault.
    ///
    /// Every nested rule costs several stack frames of the recognizer. The
    /// default leaves room on a 2 MiB thread stack in unoptimized builds;
    /// raise it only together with the stack size of the parsing thread.
    pub max_depth: usize,

    /// Report [`ParseEvent`](crate::parser::ParseEvent)s to the installed handler
    pub trace_events: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            error_recovery: true,
            max_depth: DEFAULT_MAX_DEPTH,
            trace_events: false,
        }
    }
}

impl ParserConfig {
    /// Stop at the first syntax error instead of repairing it.
    #[must_use]
    pub fn without_recovery() -> Self {
        Self {
            error_recovery: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    #[must_use]
    pub const fn with_trace_events(mut self, enabled: bool) -> Self {
        self.trace_events = enabled;
        self
    }
}
