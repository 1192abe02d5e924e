//! Statements, blocks, conditionals, and unit bodies

use crate::expressions::expression;
use crate::util::{expect_char, failure, ignored, identifier_text, soft_error, span_between};
use crate::{PResult, Span};
use nom::Slice;
use ql_syntax::{NodeKind, SyntaxNode};

/// Parses the named keyword as a whole identifier
fn keyword<'a>(input: Span<'a>, word: &'static str) -> PResult<'a, ()> {
    let checkpoint = input.clone();
    let (rest, text) = identifier_text(input)?;
    if *text.fragment() == word {
        Ok((rest, ()))
    } else {
        soft_error(checkpoint, "keyword")
    }
}

/// Parses an expression, turning "nothing here parses" into a hard failure
pub fn require_expression(input: Span) -> PResult<SyntaxNode> {
    match expression(input.clone()) {
        Err(nom::Err::Error(_)) => {
            let (at, ()) = ignored(input)?;
            failure(at, "expected expression")
        }
        other => other,
    }
}

/// Parses a single statement: a let binding or an expression
pub fn statement(input: Span) -> PResult<SyntaxNode> {
    let (input, ()) = ignored(input)?;
    if let Ok((_, text)) = identifier_text(input.clone()) {
        if *text.fragment() == "let" {
            return let_statement(input);
        }
    }
    require_expression(input)
}

fn let_statement(input: Span) -> PResult<SyntaxNode> {
    let start = input.clone();
    let (rest, ()) = keyword(input, "let")?;
    let (rest, ()) = ignored(rest)?;
    let Ok((rest, name)) = identifier_text(rest.clone()) else {
        return failure(rest, "expected identifier");
    };
    let symbol = start.extra.interner.intern(name.fragment());
    let (rest, ()) = expect_char(rest, '=', "expected `=`")?;
    let (rest, value) = require_expression(rest)?;
    let span = span_between(&start, &rest);
    Ok((
        rest,
        SyntaxNode::new(
            NodeKind::Let {
                name: symbol,
                value: Box::new(value),
            },
            span,
        ),
    ))
}

/// Parses a brace-delimited block expression
pub fn block(input: Span) -> PResult<SyntaxNode> {
    let start = input.clone();
    let (rest, ()) = expect_char(input, '{', "opening brace")?;
    let (rest, (statements, tail)) = block_body(rest, true)?;
    let (rest, ()) = expect_char(rest, '}', "closing brace")?;
    let span = span_between(&start, &rest);
    Ok((
        rest,
        SyntaxNode::new(NodeKind::Block { statements, tail }, span),
    ))
}

/// Parses an `if` expression; `input` must start at the `if` keyword
pub fn if_expr(input: Span) -> PResult<SyntaxNode> {
    let start = input.clone();
    let (rest, ()) = keyword(input, "if")?;
    let (rest, condition) = require_expression(rest)?;
    let (rest, ()) = ignored(rest)?;
    if !rest.fragment().starts_with('{') {
        return failure(rest, "expected `{`");
    }
    let (rest, then_branch) = block(rest)?;

    let (probe, ()) = ignored(rest.clone())?;
    let (rest, else_branch) = if let Ok((after_else, ())) = keyword(probe.clone(), "else") {
        let (after_else, ()) = ignored(after_else)?;
        if after_else.fragment().starts_with('{') {
            let (rest, branch) = block(after_else)?;
            (rest, Some(Box::new(branch)))
        } else if keyword(after_else.clone(), "if").is_ok() {
            let (rest, branch) = if_expr(after_else)?;
            (rest, Some(Box::new(branch)))
        } else {
            return failure(after_else, "expected `{`");
        }
    } else {
        (rest, None)
    };

    let span = span_between(&start, &rest);
    Ok((
        rest,
        SyntaxNode::new(
            NodeKind::If {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch,
            },
            span,
        ),
    ))
}

/// Parses a statement sequence with an optional trailing expression
///
/// Stops (without consuming) at `}` when `inside_block`, or at end of input.
/// The returned position is at the stopping point.
pub fn block_body(
    input: Span,
    inside_block: bool,
) -> PResult<(Vec<SyntaxNode>, Option<Box<SyntaxNode>>)> {
    let mut statements = Vec::new();
    let mut tail = None;
    let mut rest = input;
    loop {
        let (probe, ()) = ignored(rest.clone())?;
        if probe.fragment().is_empty() || (inside_block && probe.fragment().starts_with('}')) {
            rest = probe;
            break;
        }
        let (after_stmt, stmt) = statement(probe)?;
        let (after_ws, ()) = ignored(after_stmt)?;
        if after_ws.fragment().starts_with(';') {
            statements.push(stmt);
            rest = after_ws.slice(1..);
            continue;
        }
        // No semicolon: this must be the trailing expression
        if matches!(stmt.kind, NodeKind::Let { .. }) {
            return failure(after_ws, "expected `;`");
        }
        let (after_tail, ()) = ignored(after_ws.clone())?;
        if !after_tail.fragment().is_empty()
            && !(inside_block && after_tail.fragment().starts_with('}'))
        {
            return failure(after_tail, "expected `;`");
        }
        tail = Some(Box::new(stmt));
        rest = after_tail;
        break;
    }
    Ok((rest, (statements, tail)))
}
