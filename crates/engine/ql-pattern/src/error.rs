//! Pattern construction error types
//!
//! These are the `PatternAmbiguity` family: every way a pattern can be
//! rejected before matching ever runs, so that matching itself stays total
//! and deterministic.

use ql_intern::Symbol;
use ql_span::Span;

/// Error type for building a [`crate::Pattern`]
#[derive(Debug, Clone, thiserror::Error)]
pub enum PatternError {
    /// A `$name` appears in the pattern without a declaration
    #[error("undeclared placeholder {name:?} in pattern")]
    UndeclaredPlaceholder {
        /// Placeholder name
        name: Symbol,
        /// Where it occurs in the pattern source
        span: Span,
    },
    /// A placeholder occurs more than once; overlapping binds are the
    /// unsupported ambiguous case
    #[error("ambiguous pattern: placeholder {name:?} occurs more than once")]
    AmbiguousPlaceholder {
        /// Placeholder name
        name: Symbol,
        /// First occurrence
        first: Span,
        /// Second occurrence
        second: Span,
    },
    /// A declared placeholder never occurs, so bindings could not be total
    #[error("declared placeholder {name:?} does not occur in the pattern")]
    UnusedPlaceholder {
        /// Placeholder name
        name: Symbol,
    },
    /// An `any_of` constraint with no entries can never match
    #[error("placeholder {name:?} has an empty token set")]
    EmptyTokenSet {
        /// Placeholder name
        name: Symbol,
    },
    /// A constraint that does not make sense for its token class
    #[error("invalid constraint on placeholder {name:?}: {reason}")]
    InvalidConstraint {
        /// Placeholder name
        name: Symbol,
        /// What is wrong with it
        reason: String,
    },
}
