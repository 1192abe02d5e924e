//! Pretty-printer for syntax trees
//!
//! Prints trees back to surface syntax, inserting parentheses wherever the
//! tree structure binds differently than operator precedence would.

use crate::{Literal, NodeKind, SyntaxNode};
use ql_intern::Interner;
use std::fmt::{self, Write};

/// Precedence assigned to operands that are not binary operations
const ATOM_PRECEDENCE: u8 = 9;
/// Precedence of unary operators, tighter than any binary operator
const UNARY_PRECEDENCE: u8 = 7;

/// Formats a node as surface syntax
pub fn format_node(node: &SyntaxNode, interner: &Interner) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_node(node, interner, &mut out);
    out
}

/// Formats a whole compilation unit: a block body without the outer braces
pub fn format_unit(unit: &SyntaxNode, interner: &Interner) -> String {
    let mut out = String::new();
    let mut printer = Printer {
        interner,
        writer: &mut out,
        depth: 0,
    };
    let result = match &unit.kind {
        NodeKind::Block { statements, tail } => printer.write_block_body(statements, tail.as_deref()),
        _ => printer.write_expr(unit, 0),
    };
    let _ = result;
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Writes a node as surface syntax into `writer`
pub fn write_node<W: Write>(node: &SyntaxNode, interner: &Interner, writer: &mut W) -> fmt::Result {
    let mut printer = Printer {
        interner,
        writer,
        depth: 0,
    };
    printer.write_expr(node, 0)
}

struct Printer<'a, W> {
    interner: &'a Interner,
    writer: &'a mut W,
    depth: usize,
}

impl<W: Write> Printer<'_, W> {
    fn indent(&mut self) -> fmt::Result {
        for _ in 0..self.depth {
            self.writer.write_str("    ")?;
        }
        Ok(())
    }

    fn write_expr(&mut self, node: &SyntaxNode, min_precedence: u8) -> fmt::Result {
        let own = precedence_of(node);
        if own < min_precedence {
            self.writer.write_char('(')?;
            self.write_bare(node)?;
            self.writer.write_char(')')
        } else {
            self.write_bare(node)
        }
    }

    fn write_bare(&mut self, node: &SyntaxNode) -> fmt::Result {
        match &node.kind {
            NodeKind::Literal(literal) => self.write_literal(literal),
            NodeKind::Identifier(name) => {
                self.writer.write_str(self.interner.resolve(*name))
            }
            NodeKind::Splice(name) => {
                write!(self.writer, "${}", self.interner.resolve(*name))
            }
            NodeKind::Unary { op, operand } => {
                self.writer.write_str(op.symbol())?;
                self.write_expr(operand, UNARY_PRECEDENCE)
            }
            NodeKind::Binary { op, lhs, rhs } => {
                let precedence = op.precedence();
                self.write_expr(lhs, precedence)?;
                write!(self.writer, " {} ", op.symbol())?;
                // Left-associative: the right operand needs strictly tighter binding
                self.write_expr(rhs, precedence + 1)
            }
            NodeKind::Call { callee, args } => {
                self.write_expr(callee, ATOM_PRECEDENCE)?;
                self.write_args(args)
            }
            NodeKind::MacroCall { name, args } => {
                write!(self.writer, "{}!", self.interner.resolve(*name))?;
                self.write_args(args)
            }
            NodeKind::Let { name, value } => {
                write!(self.writer, "let {} = ", self.interner.resolve(*name))?;
                self.write_expr(value, 0)
            }
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.writer.write_str("if ")?;
                self.write_expr(condition, 0)?;
                self.writer.write_char(' ')?;
                self.write_bare(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.writer.write_str(" else ")?;
                    self.write_bare(else_branch)?;
                }
                Ok(())
            }
            NodeKind::Block { statements, tail } => {
                if statements.is_empty() && tail.is_none() {
                    return self.writer.write_str("{}");
                }
                self.writer.write_str("{\n")?;
                self.depth += 1;
                self.write_block_body(statements, tail.as_deref())?;
                self.depth -= 1;
                self.indent()?;
                self.writer.write_char('}')
            }
        }
    }

    fn write_block_body(
        &mut self,
        statements: &[SyntaxNode],
        tail: Option<&SyntaxNode>,
    ) -> fmt::Result {
        for statement in statements {
            self.indent()?;
            self.write_expr(statement, 0)?;
            self.writer.write_str(";\n")?;
        }
        if let Some(tail) = tail {
            self.indent()?;
            self.write_expr(tail, 0)?;
            self.writer.write_char('\n')?;
        }
        Ok(())
    }

    fn write_args(&mut self, args: &[SyntaxNode]) -> fmt::Result {
        self.writer.write_char('(')?;
        for (index, arg) in args.iter().enumerate() {
            if index > 0 {
                self.writer.write_str(", ")?;
            }
            self.write_expr(arg, 0)?;
        }
        self.writer.write_char(')')
    }

    fn write_literal(&mut self, literal: &Literal) -> fmt::Result {
        match literal {
            Literal::Integer(value) => write!(self.writer, "{value}"),
            Literal::Float(value) => {
                // Keep the decimal point so the output re-parses as a float
                if value.fract() == 0.0 && value.is_finite() {
                    write!(self.writer, "{value:.1}")
                } else {
                    write!(self.writer, "{value}")
                }
            }
            Literal::String(value) => {
                self.writer.write_char('"')?;
                for character in value.chars() {
                    match character {
                        '"' => self.writer.write_str("\\\"")?,
                        '\\' => self.writer.write_str("\\\\")?,
                        '\n' => self.writer.write_str("\\n")?,
                        '\t' => self.writer.write_str("\\t")?,
                        '\r' => self.writer.write_str("\\r")?,
                        other => self.writer.write_char(other)?,
                    }
                }
                self.writer.write_char('"')
            }
            Literal::Bool(value) => write!(self.writer, "{value}"),
        }
    }
}

fn precedence_of(node: &SyntaxNode) -> u8 {
    match &node.kind {
        NodeKind::Binary { op, .. } => op.precedence(),
        NodeKind::Unary { .. } => UNARY_PRECEDENCE,
        NodeKind::Let { .. } => 0,
        _ => ATOM_PRECEDENCE,
    }
}
