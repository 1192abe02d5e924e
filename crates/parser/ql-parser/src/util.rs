//! Token-level parsers shared across the grammar

use crate::{PResult, Span};
use nom::Slice;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_till, take_while, take_while1};
use nom::character::complete::multispace1;
use nom::combinator::recognize;
use nom::error::{VerboseError, VerboseErrorKind};
use nom::multi::many0_count;
use nom::sequence::pair;

/// Consumes whitespace and line comments
pub fn ignored(input: Span) -> PResult<()> {
    let (input, _) = many0_count(alt((
        multispace1,
        recognize(pair(tag("//"), take_till(|c: char| c == '\n'))),
    )))(input)?;
    Ok((input, ()))
}

/// Raw identifier text: `[A-Za-z_][A-Za-z0-9_]*`
pub fn identifier_text(input: Span) -> PResult<Span> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

/// Byte span between the starts of two parse positions
pub fn span_between(start: &Span, rest: &Span) -> ql_span::Span {
    ql_span::Span::new(start.location_offset() as u32, rest.location_offset() as u32)
}

/// Hard failure carrying a context label, positioned at `at`
pub fn failure<'a, T>(at: Span<'a>, label: &'static str) -> PResult<'a, T> {
    Err(nom::Err::Failure(VerboseError {
        errors: vec![(at, VerboseErrorKind::Context(label))],
    }))
}

/// Soft error (lets callers try something else), positioned at `at`
pub fn soft_error<'a, T>(at: Span<'a>, label: &'static str) -> PResult<'a, T> {
    Err(nom::Err::Error(VerboseError {
        errors: vec![(at, VerboseErrorKind::Context(label))],
    }))
}

/// Consumes ignored input, then the expected character, or fails hard with
/// the given context label
pub fn expect_char<'a>(input: Span<'a>, expected: char, label: &'static str) -> PResult<'a, ()> {
    let (input, _) = ignored(input)?;
    if input.fragment().starts_with(expected) {
        Ok((input.slice(expected.len_utf8()..), ()))
    } else {
        failure(input, label)
    }
}
