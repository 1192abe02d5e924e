//! Rich error reporting for the parser
//!
//! These are the `MalformedSyntax` diagnostics of the engine: every variant
//! carries the source position and, where available, the source text for
//! labeled terminal output.

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

// Re-export codespan types for rustc-style rendering in the CLI
pub use codespan_reporting;

/// Parse error with rich diagnostic information
#[derive(Error, Debug, Diagnostic)]
pub enum ParseError {
    /// Syntax error with unexpected input
    #[error("unexpected token `{token}`")]
    #[diagnostic(code(parser::unexpected_token), help("this token is not valid here"))]
    UnexpectedToken {
        /// What was found
        token: String,
        /// Source location
        #[label("unexpected token")]
        span: SourceSpan,
        /// Source code for context
        #[source_code]
        src: miette::NamedSource<String>,
    },

    /// Missing expected token
    #[error("expected {expected}, found `{found}`")]
    #[diagnostic(code(parser::missing_token), help("try adding {expected} here"))]
    MissingToken {
        /// What was expected
        expected: String,
        /// What was actually found
        found: String,
        /// Source location where it should be
        #[label("expected {expected} here")]
        span: SourceSpan,
        /// Source code for context
        #[source_code]
        src: miette::NamedSource<String>,
    },

    /// Unclosed delimiter
    #[error("this unit contains an unclosed delimiter")]
    #[diagnostic(code(parser::unclosed_delimiter))]
    UnclosedDelimiter {
        /// The opening character
        opening_char: char,
        /// The expected closing character
        closing_char: char,
        /// Opening delimiter location
        #[label("unclosed delimiter")]
        opening: SourceSpan,
        /// Location where closing was expected
        #[label]
        expected_close: SourceSpan,
        /// Source code for context
        #[source_code]
        src: miette::NamedSource<String>,
    },

    /// Invalid syntax construct
    #[error("invalid {construct}")]
    #[diagnostic(code(parser::invalid_syntax))]
    InvalidSyntax {
        /// Type of construct (e.g., "string literal", "integer literal")
        construct: String,
        /// Detailed explanation
        #[help]
        suggestion: Option<String>,
        /// Source location
        #[label("{construct} is invalid")]
        span: SourceSpan,
        /// Source code for context
        #[source_code]
        src: miette::NamedSource<String>,
    },

    /// Parse failed completely
    #[error("failed to parse source: {reason}")]
    #[diagnostic(code(parser::parse_failed))]
    ParseFailed {
        /// Reason for failure
        reason: String,
    },
}

impl ParseError {
    /// Byte span of the primary label, if any
    pub fn primary_span(&self) -> Option<SourceSpan> {
        match self {
            Self::UnexpectedToken { span, .. }
            | Self::MissingToken { span, .. }
            | Self::InvalidSyntax { span, .. } => Some(*span),
            Self::UnclosedDelimiter { expected_close, .. } => Some(*expected_close),
            Self::ParseFailed { .. } => None,
        }
    }

    /// Re-attach source context under the unit's display name
    pub fn with_source(self, name: impl Into<String>, source: impl Into<String>) -> Self {
        let named_source = miette::NamedSource::new(name.into(), source.into());
        match self {
            Self::UnexpectedToken { token, span, .. } => Self::UnexpectedToken {
                token,
                span,
                src: named_source,
            },
            Self::MissingToken {
                expected,
                found,
                span,
                ..
            } => Self::MissingToken {
                expected,
                found,
                span,
                src: named_source,
            },
            Self::UnclosedDelimiter {
                opening_char,
                closing_char,
                opening,
                expected_close,
                ..
            } => Self::UnclosedDelimiter {
                opening_char,
                closing_char,
                opening,
                expected_close,
                src: named_source,
            },
            Self::InvalidSyntax {
                construct,
                suggestion,
                span,
                ..
            } => Self::InvalidSyntax {
                construct,
                suggestion,
                span,
                src: named_source,
            },
            other => other,
        }
    }

    /// Convert to a codespan diagnostic for rustc-style output
    pub fn to_codespan_diagnostic(
        &self,
        file_id: usize,
    ) -> codespan_reporting::diagnostic::Diagnostic<usize> {
        use codespan_reporting::diagnostic::{Diagnostic, Label};

        match self {
            Self::UnexpectedToken { token, span, .. } => Diagnostic::error()
                .with_message(format!("unexpected token `{token}`"))
                .with_labels(vec![
                    Label::primary(file_id, span.offset()..span.offset() + span.len())
                        .with_message("unexpected token"),
                ]),
            Self::MissingToken {
                expected,
                found,
                span,
                ..
            } => Diagnostic::error()
                .with_message(format!("expected {expected}, found `{found}`"))
                .with_labels(vec![
                    Label::primary(file_id, span.offset()..span.offset() + span.len())
                        .with_message(format!("expected {expected} here")),
                ]),
            Self::UnclosedDelimiter {
                opening,
                expected_close,
                ..
            } => Diagnostic::error()
                .with_message("this unit contains an unclosed delimiter")
                .with_labels(vec![
                    Label::secondary(file_id, opening.offset()..opening.offset() + opening.len())
                        .with_message("unclosed delimiter"),
                    Label::primary(
                        file_id,
                        expected_close.offset()..expected_close.offset() + expected_close.len(),
                    ),
                ]),
            Self::InvalidSyntax {
                construct,
                suggestion,
                span,
                ..
            } => {
                let mut diagnostic = Diagnostic::error()
                    .with_message(format!("invalid {construct}"))
                    .with_labels(vec![
                        Label::primary(file_id, span.offset()..span.offset() + span.len())
                            .with_message(format!("{construct} is invalid")),
                    ]);
                if let Some(suggestion) = suggestion {
                    diagnostic = diagnostic.with_notes(vec![suggestion.clone()]);
                }
                diagnostic
            }
            Self::ParseFailed { reason } => {
                Diagnostic::error().with_message(format!("failed to parse source: {reason}"))
            }
        }
    }
}
