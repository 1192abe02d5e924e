//! Expression grammar
//!
//! Binary operators are parsed by precedence climbing over the operator
//! table in `ql-syntax`, so the parser and the pretty-printer can never
//! disagree about binding strength.

use crate::statements::{block, if_expr};
use crate::util::{expect_char, failure, ignored, identifier_text, soft_error, span_between};
use crate::{PResult, Span};
use nom::Slice;
use nom::character::complete::digit1;
use ql_syntax::{BinaryOp, Literal, NodeKind, SyntaxNode, UnaryOp};

/// Two-character operators must come before their one-character prefixes
const BINARY_TOKENS: [(&str, BinaryOp); 13] = [
    ("==", BinaryOp::Eq),
    ("!=", BinaryOp::Ne),
    ("<=", BinaryOp::Le),
    (">=", BinaryOp::Ge),
    ("&&", BinaryOp::And),
    ("||", BinaryOp::Or),
    ("<", BinaryOp::Lt),
    (">", BinaryOp::Gt),
    ("+", BinaryOp::Add),
    ("-", BinaryOp::Sub),
    ("*", BinaryOp::Mul),
    ("/", BinaryOp::Div),
    ("%", BinaryOp::Rem),
];

/// Parses a full expression
pub fn expression(input: Span) -> PResult<SyntaxNode> {
    binary_expr(input, 0)
}

fn peek_operator(input: &Span) -> Option<(BinaryOp, usize)> {
    let text: &str = input.fragment();
    BINARY_TOKENS
        .iter()
        .find(|(token, _)| text.starts_with(token))
        .map(|(token, op)| (*op, token.len()))
}

fn binary_expr(input: Span, min_precedence: u8) -> PResult<SyntaxNode> {
    let (mut rest, mut lhs) = unary_expr(input)?;
    loop {
        let (probe, ()) = ignored(rest.clone())?;
        let Some((op, token_len)) = peek_operator(&probe) else {
            break;
        };
        if op.precedence() < min_precedence {
            break;
        }
        let after_op = probe.slice(token_len..);
        // Left-associative: the right operand binds strictly tighter
        let (after_rhs, rhs) = match binary_expr(after_op.clone(), op.precedence() + 1) {
            Ok(parsed) => parsed,
            Err(nom::Err::Failure(err)) => return Err(nom::Err::Failure(err)),
            Err(_) => {
                let (at, ()) = ignored(after_op)?;
                return failure(at, "expected expression");
            }
        };
        let span = lhs.span.join(rhs.span);
        lhs = SyntaxNode::new(
            NodeKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span,
        );
        rest = after_rhs;
    }
    Ok((rest, lhs))
}

fn unary_expr(input: Span) -> PResult<SyntaxNode> {
    let (input, ()) = ignored(input)?;
    let start = input.clone();
    let text: &str = input.fragment();
    let op = if text.starts_with('!') && !text.starts_with("!=") {
        Some(UnaryOp::Not)
    } else if text.starts_with('-') {
        Some(UnaryOp::Neg)
    } else {
        None
    };
    match op {
        Some(op) => {
            let (rest, operand) = unary_expr(input.slice(1..))?;
            let span = span_between(&start, &rest);
            Ok((
                rest,
                SyntaxNode::new(
                    NodeKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    span,
                ),
            ))
        }
        None => postfix_expr(input),
    }
}

fn postfix_expr(input: Span) -> PResult<SyntaxNode> {
    let (mut rest, mut node) = primary(input)?;
    loop {
        let (probe, ()) = ignored(rest.clone())?;
        if probe.fragment().starts_with('(') {
            let start = probe.clone();
            let (after, args) = call_args(probe)?;
            let span = node.span.join(span_between(&start, &after));
            node = SyntaxNode::new(
                NodeKind::Call {
                    callee: Box::new(node),
                    args,
                },
                span,
            );
            rest = after;
        } else {
            break;
        }
    }
    Ok((rest, node))
}

/// Parses `( expr, ... )`, including the delimiters
fn call_args(input: Span) -> PResult<Vec<SyntaxNode>> {
    let (mut rest, ()) = expect_char(input, '(', "opening parenthesis")?;
    let mut args = Vec::new();
    let (probe, ()) = ignored(rest.clone())?;
    if probe.fragment().starts_with(')') {
        return Ok((probe.slice(1..), args));
    }
    loop {
        let (after_arg, arg) = expression(rest)?;
        args.push(arg);
        let (probe, ()) = ignored(after_arg)?;
        if probe.fragment().starts_with(',') {
            rest = probe.slice(1..);
        } else if probe.fragment().starts_with(')') {
            return Ok((probe.slice(1..), args));
        } else {
            return failure(probe, "closing parenthesis");
        }
    }
}

fn primary(input: Span) -> PResult<SyntaxNode> {
    let (input, ()) = ignored(input)?;
    match input.fragment().chars().next() {
        None => soft_error(input, "expected expression"),
        Some('(') => paren_expr(input),
        Some('{') => block(input),
        Some('$') => splice(input),
        Some('"') => string_literal(input),
        Some(character) if character.is_ascii_digit() => number_literal(input),
        Some(character) if character.is_ascii_alphabetic() || character == '_' => {
            ident_like(input)
        }
        Some(_) => soft_error(input, "expected expression"),
    }
}

fn paren_expr(input: Span) -> PResult<SyntaxNode> {
    let (rest, ()) = expect_char(input, '(', "opening parenthesis")?;
    let (rest, node) = expression(rest)?;
    let (rest, ()) = expect_char(rest, ')', "closing parenthesis")?;
    Ok((rest, node))
}

fn splice(input: Span) -> PResult<SyntaxNode> {
    let start = input.clone();
    let rest = input.slice(1..);
    let Ok((rest, name)) = identifier_text(rest.clone()) else {
        return failure(rest, "expected identifier");
    };
    let symbol = start.extra.interner.intern(name.fragment());
    let span = span_between(&start, &rest);
    Ok((rest, SyntaxNode::splice(symbol, span)))
}

fn string_literal(input: Span) -> PResult<SyntaxNode> {
    let start = input.clone();
    let mut rest = input.slice(1..);
    let mut value = String::new();
    loop {
        let mut chars = rest.fragment().chars();
        match chars.next() {
            None => return failure(start, "unterminated string literal"),
            Some('"') => {
                rest = rest.slice(1..);
                break;
            }
            Some('\\') => {
                let Some(escape) = chars.next() else {
                    return failure(start, "unterminated string literal");
                };
                let unescaped = match escape {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '\\' => '\\',
                    '"' => '"',
                    _ => return failure(rest, "string escape"),
                };
                value.push(unescaped);
                rest = rest.slice(1 + escape.len_utf8()..);
            }
            Some(character) => {
                value.push(character);
                rest = rest.slice(character.len_utf8()..);
            }
        }
    }
    let span = span_between(&start, &rest);
    Ok((rest, SyntaxNode::string(value, span)))
}

fn number_literal(input: Span) -> PResult<SyntaxNode> {
    let start = input.clone();
    let (rest, integral) = digit1(input)?;
    // A dot followed by a digit makes this a float; `1.foo` stays an error
    let is_float = rest.fragment().starts_with('.')
        && rest
            .fragment()
            .chars()
            .nth(1)
            .is_some_and(|c| c.is_ascii_digit());
    if is_float {
        let (rest, fraction) = digit1(rest.slice(1..))?;
        let text = format!("{}.{}", integral.fragment(), fraction.fragment());
        let Ok(value) = text.parse::<f64>() else {
            return failure(start, "float literal");
        };
        let span = span_between(&start, &rest);
        return Ok((
            rest,
            SyntaxNode::new(NodeKind::Literal(Literal::Float(value)), span),
        ));
    }
    let Ok(value) = integral.fragment().parse::<i64>() else {
        return failure(start, "integer literal");
    };
    let span = span_between(&start, &rest);
    Ok((rest, SyntaxNode::integer(value, span)))
}

fn ident_like(input: Span) -> PResult<SyntaxNode> {
    let start = input.clone();
    let (rest, text_span) = identifier_text(input.clone())?;
    let text: &str = text_span.fragment();
    match text {
        "true" => Ok((rest.clone(), SyntaxNode::boolean(true, span_between(&start, &rest)))),
        "false" => Ok((
            rest.clone(),
            SyntaxNode::boolean(false, span_between(&start, &rest)),
        )),
        "if" => if_expr(input),
        // Statement keywords are not expressions
        "let" | "else" => soft_error(start, "expected expression"),
        name => {
            let symbol = start.extra.interner.intern(name);
            if rest.fragment().starts_with("!(") {
                let (after, args) = call_args(rest.slice(1..))?;
                let span = span_between(&start, &after);
                Ok((after, SyntaxNode::new(NodeKind::MacroCall { name: symbol, args }, span)))
            } else {
                Ok((
                    rest.clone(),
                    SyntaxNode::identifier(symbol, span_between(&start, &rest)),
                ))
            }
        }
    }
}
