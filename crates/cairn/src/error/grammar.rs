use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;

/// Line placed between messages when several grammar errors are rendered.
pub const ERROR_SEPARATOR: &str = "-------------------------------";

/// Broad class of a [`GrammarError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrammarErrorCategory {
    Structure,
    UnresolvedReference,
    AmbiguousAlternatives,
}

/// Problems found while analyzing a grammar definition.
///
/// These are fatal for the grammar: a parser is never built from a grammar
/// that produced any of them. Token kinds are rendered with `Debug` so the
/// error stays independent of the grammar's kind type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum GrammarError {
    #[error("invalid rule name <{name}>: names must match ^[a-zA-Z_][a-zA-Z0-9_]*$")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::invalid_rule_name)))]
    InvalidRuleName { name: String },

    #[error("rule <{name}> is defined more than once")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::duplicate_rule)))]
    DuplicateRule { name: String },

    #[error("{production} with occurrence {occurrence} appears more than once in rule <{rule}>")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(grammar::duplicate_occurrence),
            help("give each repeated use of the same production a distinct occurrence index")
        )
    )]
    DuplicateOccurrence {
        rule: String,
        production: String,
        occurrence: u32,
    },

    #[error("alternation {occurrence} in rule <{rule}> has no branches")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::empty_alternation)))]
    EmptyAlternation { rule: String, occurrence: u32 },

    #[error(
        "alternation {occurrence} in rule <{rule}> mixes guarded and unguarded branches; guard all of them or none"
    )]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::mixed_guards)))]
    MixedGuards { rule: String, occurrence: u32 },

    #[error(
        "branch {branch} of alternation {occurrence} in rule <{rule}> can match empty input but is not the last branch"
    )]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::empty_branch_not_last)))]
    EmptyBranchNotLast {
        rule: String,
        occurrence: u32,
        branch: usize,
    },

    #[error("{production} {occurrence} in rule <{rule}> can never consume a token")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::no_consuming_path)))]
    NoConsumingPath {
        rule: String,
        production: String,
        occurrence: u32,
    },

    #[error("entry point <{name}> is not a rule of this grammar")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::unknown_entry_point)))]
    UnknownEntryPoint { name: String },

    #[error("grammar defines no rules")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::no_rules)))]
    NoRules,

    #[error("rule <{rule}> references undefined rule <{reference}>")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::unresolved_reference)))]
    UnresolvedReference { rule: String, reference: String },

    #[error(
        "ambiguous alternatives {branches:?} in alternation {occurrence} of rule <{rule}>: lookahead {path} may start each of them"
    )]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(grammar::ambiguous_alternatives),
            help("raise the lookahead bound, reorder or refactor the branches, or mark the alternation to ignore ambiguities")
        )
    )]
    AmbiguousAlternatives {
        rule: String,
        occurrence: u32,
        branches: Vec<usize>,
        /// The shared lookahead, e.g. `[Comma]` or `[Ident, Colon]`.
        path: String,
    },
}

impl GrammarError {
    #[must_use]
    pub const fn category(&self) -> GrammarErrorCategory {
        match self {
            Self::UnresolvedReference { .. } => GrammarErrorCategory::UnresolvedReference,
            Self::AmbiguousAlternatives { .. } => GrammarErrorCategory::AmbiguousAlternatives,
            _ => GrammarErrorCategory::Structure,
        }
    }

    /// Rule the error is attributed to, if any.
    #[must_use]
    pub fn rule(&self) -> Option<&str> {
        match self {
            Self::DuplicateOccurrence { rule, .. }
            | Self::EmptyAlternation { rule, .. }
            | Self::MixedGuards { rule, .. }
            | Self::EmptyBranchNotLast { rule, .. }
            | Self::NoConsumingPath { rule, .. }
            | Self::UnresolvedReference { rule, .. }
            | Self::AmbiguousAlternatives { rule, .. } => Some(rule),
            Self::InvalidRuleName { name } | Self::DuplicateRule { name } => Some(name),
            Self::UnknownEntryPoint { .. } | Self::NoRules => None,
        }
    }
}

/// The complete, ordered list of errors from one grammar analysis.
///
/// Cloning shares the list, so a cached failure is handed out unchanged to
/// every caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarErrors(Arc<[GrammarError]>);

impl GrammarErrors {
    #[must_use]
    pub fn new(errors: Vec<GrammarError>) -> Self {
        Self(errors.into())
    }

    #[must_use]
    pub fn as_slice(&self) -> &[GrammarError] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GrammarError> {
        self.0.iter()
    }

    /// Whether both values share the same underlying allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Display for GrammarErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "\n{ERROR_SEPARATOR}\n")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for GrammarErrors {}

impl<'a> IntoIterator for &'a GrammarErrors {
    type Item = &'a GrammarError;
    type IntoIter = std::slice::Iter<'a, GrammarError>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
