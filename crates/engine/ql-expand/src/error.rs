//! Expansion error types

use ql_intern::Symbol;
use ql_span::Span;

/// Error type for macro expansion
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExpansionError {
    /// Macro not found
    #[error("undefined macro: {name:?}")]
    UndefinedMacro {
        /// Macro name
        name: Symbol,
        /// Call-site location
        span: Span,
    },
    /// Recursion or rewrite-pass limit exceeded
    #[error("macro expansion recursion limit exceeded at depth {depth}")]
    RecursionLimit {
        /// Depth reached
        depth: usize,
        /// Location of the expansion that hit the limit
        span: Span,
    },
    /// No declarative rule matched the call site
    #[error("no rule of macro {name:?} matched {arity} argument(s)")]
    NoRuleMatched {
        /// Macro name
        name: Symbol,
        /// Number of arguments at the call site
        arity: usize,
        /// Call-site location
        span: Span,
    },
    /// A template splice has no binding
    #[error("unbound placeholder {name:?} in expansion template")]
    UnboundPlaceholder {
        /// Placeholder name
        name: Symbol,
        /// Template location of the splice
        span: Span,
    },
    /// The macro implementation rejected its input; the message is the
    /// user's diagnostic, surfaced verbatim with the call-site position
    #[error("macro {name:?} rejected its input: {message}")]
    Rejected {
        /// Macro name
        name: Symbol,
        /// User diagnostic message
        message: String,
        /// Call-site location
        span: Span,
    },
    /// A splice marker survived to finalization
    #[error("splice marker {name:?} outside any template")]
    StraySplice {
        /// Marker name
        name: Symbol,
        /// Marker location
        span: Span,
    },
}

impl ExpansionError {
    /// The source position the error is reported at
    pub fn span(&self) -> Span {
        match self {
            Self::UndefinedMacro { span, .. }
            | Self::RecursionLimit { span, .. }
            | Self::NoRuleMatched { span, .. }
            | Self::UnboundPlaceholder { span, .. }
            | Self::Rejected { span, .. }
            | Self::StraySplice { span, .. } => *span,
        }
    }
}

/// Registering a macro under an already-taken name
#[derive(Debug, Clone, thiserror::Error)]
#[error("macro {name:?} is already registered")]
pub struct DuplicateMacro {
    /// The contested name
    pub name: Symbol,
}
