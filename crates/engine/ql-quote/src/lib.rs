//! Quoting: source templates with splice points
//!
//! [`quote`] turns a block of source syntax into a syntax-tree fragment.
//! `$name` markers in the template are splice points: each is replaced
//! *verbatim* by the supplied pre-built subtree — the spliced content is
//! never re-parsed, and its spans are preserved from wherever it was
//! originally built.

use ql_intern::Symbol;
use ql_parser::ParseError;
use ql_span::Span;
use ql_syntax::{NodeKind, SyntaxNode};
use rustc_hash::{FxHashMap, FxHashSet};

/// A splice marker with no supplied subtree
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("no subtree supplied for splice marker {name:?}")]
pub struct MissingSplice {
    /// Marker name
    pub name: Symbol,
    /// Marker location in the template
    pub span: Span,
}

/// Error type for quoting
#[derive(Debug, thiserror::Error)]
pub enum QuoteError {
    /// The template itself does not parse
    #[error("malformed template: {0}")]
    Malformed(#[from] ParseError),
    /// A splice marker has no supplied subtree
    #[error(transparent)]
    MissingSplice(#[from] MissingSplice),
    /// A supplied subtree has no marker in the template
    #[error("supplied subtree {name:?} has no splice marker in the template")]
    UnusedSplice {
        /// Supplied name
        name: Symbol,
    },
}

/// Quotes an expression template, splicing the supplied subtrees
///
/// # Errors
///
/// Returns a [`QuoteError`] if the template is malformed, a marker has no
/// supplied subtree, or a supplied subtree is never used
pub fn quote(
    source: &str,
    splices: &[(Symbol, SyntaxNode)],
    interner: &ql_intern::Interner,
) -> Result<SyntaxNode, QuoteError> {
    let template = ql_parser::parse_expression(source, interner)?;
    splice_checked(&template, splices)
}

/// Quotes a whole-unit template: statements with an optional trailing
/// expression
///
/// # Errors
///
/// Same failure modes as [`quote`]
pub fn quote_unit(
    source: &str,
    splices: &[(Symbol, SyntaxNode)],
    interner: &ql_intern::Interner,
) -> Result<SyntaxNode, QuoteError> {
    let template = ql_parser::parse_unit(source, interner)?;
    splice_checked(&template, splices)
}

fn splice_checked(
    template: &SyntaxNode,
    splices: &[(Symbol, SyntaxNode)],
) -> Result<SyntaxNode, QuoteError> {
    let map: FxHashMap<Symbol, SyntaxNode> = splices
        .iter()
        .map(|(name, node)| (*name, node.clone()))
        .collect();

    let mut used = FxHashSet::default();
    let result = splice_into(template, &map, &mut used).map_err(QuoteError::MissingSplice)?;

    for (name, _) in splices {
        if !used.contains(name) {
            return Err(QuoteError::UnusedSplice { name: *name });
        }
    }
    Ok(result)
}

/// Substitutes splice markers in a pre-parsed template
///
/// Unlike [`quote`], supplied subtrees without a marker are simply ignored;
/// this is the substitution primitive the expander uses with match
/// bindings, where a template legitimately uses a subset of them.
///
/// # Errors
///
/// Returns [`MissingSplice`] if a marker has no supplied subtree
pub fn splice_tree(
    template: &SyntaxNode,
    splices: &FxHashMap<Symbol, SyntaxNode>,
) -> Result<SyntaxNode, MissingSplice> {
    let mut used = FxHashSet::default();
    splice_into(template, splices, &mut used)
}

fn splice_into(
    template: &SyntaxNode,
    splices: &FxHashMap<Symbol, SyntaxNode>,
    used: &mut FxHashSet<Symbol>,
) -> Result<SyntaxNode, MissingSplice> {
    let kind = match &template.kind {
        NodeKind::Splice(name) => {
            let Some(replacement) = splices.get(name) else {
                return Err(MissingSplice {
                    name: *name,
                    span: template.span,
                });
            };
            used.insert(*name);
            // Verbatim: the replacement keeps its own structure and spans
            return Ok(replacement.clone());
        }
        NodeKind::Literal(_) | NodeKind::Identifier(_) => template.kind.clone(),
        NodeKind::Unary { op, operand } => NodeKind::Unary {
            op: *op,
            operand: Box::new(splice_into(operand, splices, used)?),
        },
        NodeKind::Binary { op, lhs, rhs } => NodeKind::Binary {
            op: *op,
            lhs: Box::new(splice_into(lhs, splices, used)?),
            rhs: Box::new(splice_into(rhs, splices, used)?),
        },
        NodeKind::Call { callee, args } => NodeKind::Call {
            callee: Box::new(splice_into(callee, splices, used)?),
            args: splice_all(args, splices, used)?,
        },
        NodeKind::MacroCall { name, args } => NodeKind::MacroCall {
            name: *name,
            args: splice_all(args, splices, used)?,
        },
        NodeKind::Let { name, value } => NodeKind::Let {
            name: *name,
            value: Box::new(splice_into(value, splices, used)?),
        },
        NodeKind::If {
            condition,
            then_branch,
            else_branch,
        } => NodeKind::If {
            condition: Box::new(splice_into(condition, splices, used)?),
            then_branch: Box::new(splice_into(then_branch, splices, used)?),
            else_branch: match else_branch {
                Some(branch) => Some(Box::new(splice_into(branch, splices, used)?)),
                None => None,
            },
        },
        NodeKind::Block { statements, tail } => NodeKind::Block {
            statements: splice_all(statements, splices, used)?,
            tail: match tail {
                Some(tail) => Some(Box::new(splice_into(tail, splices, used)?)),
                None => None,
            },
        },
    };
    Ok(SyntaxNode::new(kind, template.span))
}

fn splice_all(
    nodes: &[SyntaxNode],
    splices: &FxHashMap<Symbol, SyntaxNode>,
    used: &mut FxHashSet<Symbol>,
) -> Result<Vec<SyntaxNode>, MissingSplice> {
    nodes
        .iter()
        .map(|node| splice_into(node, splices, used))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ql_intern::Interner;
    use ql_parser::parse_expression;

    #[test]
    fn test_splice_substitutes_verbatim() {
        let interner = Interner::new();
        let sum = parse_expression("1 + 2", &interner).unwrap();
        let quoted = quote("$x * 2", &[(interner.intern("x"), sum.clone())], &interner).unwrap();

        let expected = parse_expression("(1 + 2) * 2", &interner).unwrap();
        assert!(quoted.structurally_equals(&expected));

        // The spliced subtree keeps the spans of its construction site
        let NodeKind::Binary { lhs, .. } = &quoted.kind else {
            panic!("expected binary node");
        };
        assert_eq!(lhs.span, sum.span);
    }

    #[test]
    fn test_same_marker_may_splice_twice() {
        let interner = Interner::new();
        let one = parse_expression("1", &interner).unwrap();
        let quoted = quote("$x + $x", &[(interner.intern("x"), one)], &interner).unwrap();
        let expected = parse_expression("1 + 1", &interner).unwrap();
        assert!(quoted.structurally_equals(&expected));
    }

    #[test]
    fn test_unit_templates_accept_statements() {
        let interner = Interner::new();
        let value = parse_expression("6 * 7", &interner).unwrap();
        let quoted = quote_unit(
            "let answer = $v;\nanswer\n",
            &[(interner.intern("v"), value)],
            &interner,
        )
        .unwrap();
        let NodeKind::Block { statements, tail } = &quoted.kind else {
            panic!("expected unit block");
        };
        assert_eq!(statements.len(), 1);
        assert!(tail.is_some());
        assert!(!quoted.contains_splice());
    }

    #[test]
    fn test_missing_splice_is_an_error() {
        let interner = Interner::new();
        let error = quote("$x + 1", &[], &interner).unwrap_err();
        assert!(matches!(error, QuoteError::MissingSplice(_)));
    }

    #[test]
    fn test_unused_splice_is_an_error() {
        let interner = Interner::new();
        let one = parse_expression("1", &interner).unwrap();
        let error = quote("2 + 2", &[(interner.intern("x"), one)], &interner).unwrap_err();
        assert!(matches!(error, QuoteError::UnusedSplice { .. }));
    }

    #[test]
    fn test_malformed_template_is_an_error() {
        let interner = Interner::new();
        let error = quote("1 +", &[], &interner).unwrap_err();
        assert!(matches!(error, QuoteError::Malformed(_)));
    }
}
