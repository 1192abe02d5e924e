//! The matching walk
//!
//! Deterministic, order-preserving, first-match-wins. Because pattern
//! construction guarantees each placeholder occurs exactly once, a
//! successful walk binds every declared placeholder and never revisits one.

use crate::{CompiledConstraint, OpClass, Pattern, PatternKind, PatternNode, TokenClass};
use indexmap::IndexMap;
use ql_intern::Symbol;
use ql_syntax::{NodeKind, SyntaxNode};
use rustc_hash::FxHashMap;

/// Mapping from placeholder name to the matched subtree
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    map: FxHashMap<Symbol, SyntaxNode>,
}

impl Bindings {
    /// The subtree bound to `name`, if any
    pub fn get(&self, name: Symbol) -> Option<&SyntaxNode> {
        self.map.get(&name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates over bound (name, subtree) pairs in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = (Symbol, &SyntaxNode)> {
        self.map.iter().map(|(&name, node)| (name, node))
    }

    fn insert(&mut self, name: Symbol, node: SyntaxNode) {
        self.map.insert(name, node);
    }
}

impl Pattern {
    /// Matches the candidate against this pattern
    ///
    /// Returns `None` on a structural mismatch, or the total bindings over
    /// the declared placeholders on success.
    pub fn matches(&self, candidate: &SyntaxNode) -> Option<Bindings> {
        let mut bindings = Bindings::default();
        if match_node(self.root(), candidate, self.constraints(), &mut bindings) {
            Some(bindings)
        } else {
            None
        }
    }

    /// First matching subtree of `tree` in preorder, with its bindings
    pub fn find_first<'tree>(
        &self,
        tree: &'tree SyntaxNode,
    ) -> Option<(&'tree SyntaxNode, Bindings)> {
        if let Some(bindings) = self.matches(tree) {
            return Some((tree, bindings));
        }
        tree.children()
            .into_iter()
            .find_map(|child| self.find_first(child))
    }

    /// All matching subtrees in preorder; does not descend into a match
    pub fn find_all<'tree>(&self, tree: &'tree SyntaxNode) -> Vec<(&'tree SyntaxNode, Bindings)> {
        let mut found = Vec::new();
        self.collect_matches(tree, &mut found);
        found
    }

    fn collect_matches<'tree>(
        &self,
        tree: &'tree SyntaxNode,
        found: &mut Vec<(&'tree SyntaxNode, Bindings)>,
    ) {
        if let Some(bindings) = self.matches(tree) {
            found.push((tree, bindings));
            return;
        }
        for child in tree.children() {
            self.collect_matches(child, found);
        }
    }
}

fn match_node(
    pattern: &PatternNode,
    candidate: &SyntaxNode,
    constraints: &IndexMap<Symbol, CompiledConstraint>,
    bindings: &mut Bindings,
) -> bool {
    match (&pattern.kind, &candidate.kind) {
        (PatternKind::Placeholder(name), _) => {
            let Some(constraint) = constraints.get(name) else {
                return false;
            };
            if !class_permits(constraint.class, candidate) {
                return false;
            }
            if !constraint.allowed.is_empty()
                && !constraint
                    .allowed
                    .iter()
                    .any(|proto| proto.denotes(candidate))
            {
                return false;
            }
            bindings.insert(*name, candidate.clone());
            true
        }
        (PatternKind::Literal(pattern_lit), NodeKind::Literal(candidate_lit)) => {
            pattern_lit == candidate_lit
        }
        (PatternKind::Identifier(pattern_name), NodeKind::Identifier(candidate_name)) => {
            pattern_name == candidate_name
        }
        (
            PatternKind::Unary { op, operand },
            NodeKind::Unary {
                op: candidate_op,
                operand: candidate_operand,
            },
        ) => op == candidate_op && match_node(operand, candidate_operand, constraints, bindings),
        (
            PatternKind::Binary { op, lhs, rhs },
            NodeKind::Binary {
                op: candidate_op,
                lhs: candidate_lhs,
                rhs: candidate_rhs,
            },
        ) => {
            op.permits(*candidate_op)
                && match_node(lhs, candidate_lhs, constraints, bindings)
                && match_node(rhs, candidate_rhs, constraints, bindings)
        }
        (
            PatternKind::Call { callee, args },
            NodeKind::Call {
                callee: candidate_callee,
                args: candidate_args,
            },
        ) => {
            match_node(callee, candidate_callee, constraints, bindings)
                && match_nodes(args, candidate_args, constraints, bindings)
        }
        (
            PatternKind::MacroCall { name, args },
            NodeKind::MacroCall {
                name: candidate_name,
                args: candidate_args,
            },
        ) => name == candidate_name && match_nodes(args, candidate_args, constraints, bindings),
        (
            PatternKind::Let { name, value },
            NodeKind::Let {
                name: candidate_name,
                value: candidate_value,
            },
        ) => name == candidate_name && match_node(value, candidate_value, constraints, bindings),
        (
            PatternKind::If {
                condition,
                then_branch,
                else_branch,
            },
            NodeKind::If {
                condition: candidate_condition,
                then_branch: candidate_then,
                else_branch: candidate_else,
            },
        ) => {
            match_node(condition, candidate_condition, constraints, bindings)
                && match_node(then_branch, candidate_then, constraints, bindings)
                && match (else_branch, candidate_else) {
                    (None, None) => true,
                    (Some(pattern_else), Some(candidate_else)) => {
                        match_node(pattern_else, candidate_else, constraints, bindings)
                    }
                    _ => false,
                }
        }
        (
            PatternKind::Block { statements, tail },
            NodeKind::Block {
                statements: candidate_statements,
                tail: candidate_tail,
            },
        ) => {
            match_nodes(statements, candidate_statements, constraints, bindings)
                && match (tail, candidate_tail) {
                    (None, None) => true,
                    (Some(pattern_tail), Some(candidate_tail)) => {
                        match_node(pattern_tail, candidate_tail, constraints, bindings)
                    }
                    _ => false,
                }
        }
        _ => false,
    }
}

fn match_nodes(
    patterns: &[PatternNode],
    candidates: &[SyntaxNode],
    constraints: &IndexMap<Symbol, CompiledConstraint>,
    bindings: &mut Bindings,
) -> bool {
    patterns.len() == candidates.len()
        && patterns
            .iter()
            .zip(candidates.iter())
            .all(|(pattern, candidate)| match_node(pattern, candidate, constraints, bindings))
}

fn class_permits(class: TokenClass, candidate: &SyntaxNode) -> bool {
    match class {
        TokenClass::Expr => true,
        TokenClass::Token => candidate.is_token(),
        TokenClass::Ident => matches!(candidate.kind, NodeKind::Identifier(_)),
        TokenClass::Literal => matches!(candidate.kind, NodeKind::Literal(_)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Constraint, PatternOptions};
    use ql_intern::Interner;
    use ql_parser::parse_expression;

    fn expr_pattern(source: &str, names: &[&str], interner: &Interner) -> Pattern {
        let tree = parse_expression(source, interner).unwrap();
        let options = PatternOptions {
            placeholders: names
                .iter()
                .map(|name| (interner.intern(name), Constraint::of(TokenClass::Expr)))
                .collect(),
            operator_classes: FxHashMap::default(),
        };
        Pattern::build(&tree, &options, interner).unwrap()
    }

    #[test]
    fn test_find_first_is_preorder() {
        let interner = Interner::new();
        let pattern = expr_pattern("$a + $b", &["a", "b"], &interner);
        let tree = parse_expression("f(1 + 2, 3 + 4)", &interner).unwrap();
        let (matched, bindings) = pattern.find_first(&tree).unwrap();
        // The call itself does not match; the first argument does
        assert!(matches!(matched.kind, NodeKind::Binary { .. }));
        let bound = bindings.get(interner.intern("a")).unwrap();
        assert!(
            matches!(bound.kind, NodeKind::Literal(ql_syntax::Literal::Integer(1))),
            "first match should be the leftmost sum"
        );
    }

    #[test]
    fn test_find_all_does_not_descend_into_matches() {
        let interner = Interner::new();
        let pattern = expr_pattern("$a + $b", &["a", "b"], &interner);
        // The whole tree matches, so the nested sums are not reported
        let tree = parse_expression("(1 + 2) + (3 + 4)", &interner).unwrap();
        let found = pattern.find_all(&tree);
        assert_eq!(found.len(), 1);

        // Here only the two inner sums match
        let tree = parse_expression("f(1 + 2) * g(3 + 4)", &interner).unwrap();
        let found = pattern.find_all(&tree);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_match_is_total_over_declared_placeholders() {
        let interner = Interner::new();
        let pattern = expr_pattern("f($x, $y)", &["x", "y"], &interner);
        let tree = parse_expression("f(1, g(2))", &interner).unwrap();
        let bindings = pattern.matches(&tree).unwrap();
        for name in pattern.placeholder_names() {
            assert!(bindings.get(name).is_some());
        }
    }

    #[test]
    fn test_block_patterns_match_statement_lists() {
        let interner = Interner::new();
        let pattern = expr_pattern("{ let tmp = $v; tmp }", &["v"], &interner);
        let matching = parse_expression("{ let tmp = 1 + 2; tmp }", &interner).unwrap();
        let other = parse_expression("{ let other = 1; other }", &interner).unwrap();
        assert!(pattern.matches(&matching).is_some());
        assert!(pattern.matches(&other).is_none());
    }
}
