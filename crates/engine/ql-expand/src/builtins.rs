//! Builtin macro implementations

use crate::error::ExpansionError;
use crate::expand::{CallSite, ExpansionContext};
use ql_syntax::{Literal, NodeKind, SyntaxNode, UnaryOp};

/// Builtin macro kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinMacro {
    /// stringify!(expr) — the argument's source rendering as a string
    Stringify,
    /// concat!(lit, ...) — literal arguments concatenated into one string
    Concat,
    /// assert!(cond) — abort the program when the condition is false
    Assert,
    /// line!() — the 1-based source line of the call site
    Line,
}

impl BuiltinMacro {
    /// Every builtin, in registration order
    pub const ALL: [Self; 4] = [Self::Stringify, Self::Concat, Self::Assert, Self::Line];

    /// The name the builtin is invoked by
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Stringify => "stringify",
            Self::Concat => "concat",
            Self::Assert => "assert",
            Self::Line => "line",
        }
    }

    /// Parses the discovery-file spelling of a builtin
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "stringify" => Self::Stringify,
            "concat" => Self::Concat,
            "assert" => Self::Assert,
            "line" => Self::Line,
            _ => return None,
        })
    }
}

/// Expands a builtin macro at one call site
///
/// # Errors
///
/// Returns [`ExpansionError::Rejected`] when the arguments are
/// incompatible with the builtin
pub fn expand_builtin(
    kind: BuiltinMacro,
    ctx: &ExpansionContext<'_>,
    call: &CallSite<'_>,
) -> Result<SyntaxNode, ExpansionError> {
    match kind {
        BuiltinMacro::Stringify => expand_stringify(ctx, call),
        BuiltinMacro::Concat => expand_concat(call),
        BuiltinMacro::Assert => expand_assert(ctx, call),
        BuiltinMacro::Line => expand_line(ctx, call),
    }
}

fn single_argument<'call>(
    call: &'call CallSite<'_>,
) -> Result<&'call SyntaxNode, ExpansionError> {
    match call.args {
        [arg] => Ok(arg),
        args => Err(ExpansionError::Rejected {
            name: call.name,
            message: format!("expected exactly one argument, got {}", args.len()),
            span: call.span,
        }),
    }
}

/// stringify!(expr) -> "expr"
fn expand_stringify(
    ctx: &ExpansionContext<'_>,
    call: &CallSite<'_>,
) -> Result<SyntaxNode, ExpansionError> {
    let arg = single_argument(call)?;
    let text = ql_syntax::format_node(arg, ctx.interner);
    Ok(SyntaxNode::string(text, call.span))
}

/// concat!(lit, ...) -> "lit..."
fn expand_concat(call: &CallSite<'_>) -> Result<SyntaxNode, ExpansionError> {
    let mut text = String::new();
    for arg in call.args {
        let NodeKind::Literal(literal) = &arg.kind else {
            return Err(ExpansionError::Rejected {
                name: call.name,
                message: "arguments must be literals".to_string(),
                span: call.span,
            });
        };
        match literal {
            Literal::Integer(value) => text.push_str(&value.to_string()),
            Literal::Float(value) => text.push_str(&value.to_string()),
            Literal::Bool(value) => text.push_str(&value.to_string()),
            Literal::String(value) => text.push_str(value),
        }
    }
    Ok(SyntaxNode::string(text, call.span))
}

/// assert!(cond) -> if !(cond) { abort("assertion failed: cond"); }
fn expand_assert(
    ctx: &ExpansionContext<'_>,
    call: &CallSite<'_>,
) -> Result<SyntaxNode, ExpansionError> {
    let condition = single_argument(call)?;
    let message = format!(
        "assertion failed: {}",
        ql_syntax::format_node(condition, ctx.interner)
    );
    let abort_call = SyntaxNode::new(
        NodeKind::Call {
            callee: Box::new(SyntaxNode::identifier(
                ctx.interner.intern("abort"),
                call.span,
            )),
            args: vec![SyntaxNode::string(message, call.span)],
        },
        call.span,
    );
    Ok(SyntaxNode::new(
        NodeKind::If {
            condition: Box::new(SyntaxNode::new(
                NodeKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(condition.clone()),
                },
                condition.span,
            )),
            then_branch: Box::new(SyntaxNode::new(
                NodeKind::Block {
                    statements: vec![abort_call],
                    tail: None,
                },
                call.span,
            )),
            else_branch: None,
        },
        call.span,
    ))
}

/// line!() -> the call site's 1-based line number
fn expand_line(
    ctx: &ExpansionContext<'_>,
    call: &CallSite<'_>,
) -> Result<SyntaxNode, ExpansionError> {
    if !call.args.is_empty() {
        return Err(ExpansionError::Rejected {
            name: call.name,
            message: "takes no arguments".to_string(),
            span: call.span,
        });
    }
    let line = i64::from(ctx.line_number(call.span));
    Ok(SyntaxNode::integer(line, call.span))
}
