//! Parser for the quill surface language
//!
//! Built on `nom` with `nom_locate` for byte-accurate spans. Produces
//! [`ql_syntax::SyntaxNode`] trees; failures surface as the rich
//! [`ParseError`] diagnostics.

pub mod error;

mod expressions;
mod statements;
mod util;

pub use error::ParseError;

use miette::SourceSpan;
use nom::error::{VerboseError, VerboseErrorKind};
use nom_locate::LocatedSpan;
use ql_intern::Interner;
use ql_syntax::{NodeKind, SyntaxNode};

/// Parser input: a located slice of the unit's source
pub type Span<'a> = LocatedSpan<&'a str, ParseContext>;

/// Parser result with located errors
pub type PResult<'a, O> = nom::IResult<Span<'a>, O, VerboseError<Span<'a>>>;

/// State threaded through the parse
#[derive(Clone)]
pub struct ParseContext {
    /// Interner for identifiers and macro names
    pub interner: Interner,
}

/// Parses a whole compilation unit: statements with an optional trailing
/// expression
///
/// # Errors
///
/// Returns a [`ParseError`] if the source is malformed
pub fn parse_unit(source: &str, interner: &Interner) -> Result<SyntaxNode, ParseError> {
    let input = Span::new_extra(
        source,
        ParseContext {
            interner: interner.clone(),
        },
    );
    let (rest, (statements, tail)) =
        statements::block_body(input, false).map_err(|err| convert_error(source, &err))?;
    if !rest.fragment().is_empty() {
        return Err(unexpected_token(source, rest.location_offset()));
    }
    let span = ql_span::Span::new(0, source.len() as u32);
    Ok(SyntaxNode::new(NodeKind::Block { statements, tail }, span))
}

/// Parses a single expression; the whole input must be consumed
///
/// # Errors
///
/// Returns a [`ParseError`] if the source is malformed
pub fn parse_expression(source: &str, interner: &Interner) -> Result<SyntaxNode, ParseError> {
    let input = Span::new_extra(
        source,
        ParseContext {
            interner: interner.clone(),
        },
    );
    let (rest, node) =
        statements::require_expression(input).map_err(|err| convert_error(source, &err))?;
    let (rest, ()) = util::ignored(rest).map_err(|err| convert_error(source, &err))?;
    if !rest.fragment().is_empty() {
        return Err(unexpected_token(source, rest.location_offset()));
    }
    Ok(node)
}

/// Display name attached to diagnostics before the driver renames them
const DEFAULT_NAME: &str = "<input>";

fn named_source(source: &str) -> miette::NamedSource<String> {
    miette::NamedSource::new(DEFAULT_NAME, source.to_string())
}

fn span_at(source: &str, offset: usize) -> SourceSpan {
    if source.is_empty() {
        return (0, 0).into();
    }
    let clamped = offset.min(source.len() - 1);
    (clamped, 1).into()
}

/// The token text starting at `offset`, for "found `...`" messages
fn found_at(source: &str, offset: usize) -> String {
    if offset >= source.len() {
        return "end of file".to_string();
    }
    source[offset..]
        .split_whitespace()
        .next()
        .map_or_else(|| "end of file".to_string(), |token| {
            token.chars().take(10).collect()
        })
}

fn unexpected_token(source: &str, offset: usize) -> ParseError {
    ParseError::UnexpectedToken {
        token: found_at(source, offset),
        span: span_at(source, offset),
        src: named_source(source),
    }
}

/// Position of the last unmatched `open` before `before`, by naive balance
/// scan
fn find_unmatched_opening(source: &str, before: usize, open: char, close: char) -> Option<usize> {
    let mut stack = Vec::new();
    for (index, character) in source[..before.min(source.len())].char_indices() {
        if character == open {
            stack.push(index);
        } else if character == close {
            stack.pop();
        }
    }
    stack.pop()
}

fn unclosed_delimiter(
    source: &str,
    offset: usize,
    opening_char: char,
    closing_char: char,
) -> ParseError {
    match find_unmatched_opening(source, offset, opening_char, closing_char) {
        Some(opening) => ParseError::UnclosedDelimiter {
            opening_char,
            closing_char,
            opening: (opening, 1).into(),
            expected_close: span_at(source, offset),
            src: named_source(source),
        },
        None => ParseError::MissingToken {
            expected: format!("`{closing_char}`"),
            found: found_at(source, offset),
            span: span_at(source, offset),
            src: named_source(source),
        },
    }
}

fn convert_error(source: &str, err: &nom::Err<VerboseError<Span<'_>>>) -> ParseError {
    let verbose = match err {
        nom::Err::Incomplete(_) => {
            return ParseError::ParseFailed {
                reason: "incomplete input".to_string(),
            };
        }
        nom::Err::Error(verbose) | nom::Err::Failure(verbose) => verbose,
    };

    let Some((deepest, _)) = verbose.errors.first() else {
        return ParseError::ParseFailed {
            reason: "unknown parse error".to_string(),
        };
    };
    let offset = deepest.location_offset();

    let label = verbose.errors.iter().find_map(|(at, kind)| match kind {
        VerboseErrorKind::Context(label) => Some((at.location_offset(), *label)),
        _ => None,
    });

    match label {
        Some((_, "closing parenthesis")) => unclosed_delimiter(source, offset, '(', ')'),
        Some((_, "closing brace")) => unclosed_delimiter(source, offset, '{', '}'),
        Some((at, "unterminated string literal")) => ParseError::InvalidSyntax {
            construct: "string literal".to_string(),
            suggestion: Some("close the string with `\"`".to_string()),
            span: span_at(source, at),
            src: named_source(source),
        },
        Some((at, "string escape")) => ParseError::InvalidSyntax {
            construct: "string escape".to_string(),
            suggestion: Some("supported escapes are \\n, \\t, \\r, \\\\ and \\\"".to_string()),
            span: span_at(source, at),
            src: named_source(source),
        },
        Some((at, "integer literal")) => ParseError::InvalidSyntax {
            construct: "integer literal".to_string(),
            suggestion: Some("the value does not fit in a 64-bit integer".to_string()),
            span: span_at(source, at),
            src: named_source(source),
        },
        Some((at, "float literal")) => ParseError::InvalidSyntax {
            construct: "float literal".to_string(),
            suggestion: None,
            span: span_at(source, at),
            src: named_source(source),
        },
        Some((at, label)) if label.starts_with("expected ") => ParseError::MissingToken {
            expected: label["expected ".len()..].to_string(),
            found: found_at(source, at),
            span: span_at(source, at),
            src: named_source(source),
        },
        Some((at, label)) => ParseError::InvalidSyntax {
            construct: label.to_string(),
            suggestion: None,
            span: span_at(source, at),
            src: named_source(source),
        },
        None => unexpected_token(source, offset),
    }
}
