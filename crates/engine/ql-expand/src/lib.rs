//! Macro expansion for quill
//!
//! This crate provides the expander: the registry of macro definitions,
//! the builtin macros, and the engine that rewrites macro call sites and
//! applies standalone pattern rewrites.
//!
//! # Architecture
//!
//! Expansion works in several phases per unit:
//!
//! 1. **Registration**: macros are registered once (builtins, discovery
//!    file, programmatic), then the registry is frozen and shared.
//! 2. **Call expansion**: `name!(args)` sites are replaced bottom-up by
//!    the macro's output; output re-enters expansion one level deeper.
//! 3. **Rewriting**: standalone pattern→template rules run in passes
//!    until none fires.
//! 4. **Finalization**: the tree is checked for stray splice markers and
//!    stamped [`UnitPhase::Finalized`].
//!
//! Nested expansion depth and rewrite pass count share one configured
//! limit; exceeding it is a deterministic [`ExpansionError::RecursionLimit`].

pub mod builtins;
pub mod error;
pub mod expand;
pub mod registry;

pub use builtins::BuiltinMacro;
pub use error::{DuplicateMacro, ExpansionError};
pub use expand::{
    CallSite, DEFAULT_MAX_DEPTH, ExpandOptions, Expander, Expansion, ExpansionContext, UnitPhase,
};
pub use registry::{MacroDef, MacroKind, MacroRegistry, MacroRule, MacroTransform, RewriteRule};

#[cfg(test)]
mod tests {
    use super::*;
    use ql_intern::{Interner, Symbol};
    use ql_parser::{parse_expression, parse_unit};
    use ql_pattern::{Constraint, Pattern, PatternOptions, TokenClass};
    use ql_span::{FileId, Span};
    use ql_syntax::{Literal, NodeKind, SyntaxNode};
    use rustc_hash::FxHashMap;
    use std::sync::Arc;

    fn rule(
        interner: &Interner,
        name: &str,
        params: &[&str],
        placeholders: &[(&str, TokenClass)],
        template: &str,
    ) -> MacroRule {
        let args: Vec<SyntaxNode> = params
            .iter()
            .map(|param| parse_expression(param, interner).unwrap())
            .collect();
        let call_node = SyntaxNode::new(
            NodeKind::MacroCall {
                name: interner.intern(name),
                args,
            },
            Span::synthesized(),
        );
        let options = PatternOptions {
            placeholders: placeholders
                .iter()
                .map(|(name, class)| (interner.intern(name), Constraint::of(*class)))
                .collect(),
            operator_classes: FxHashMap::default(),
        };
        let pattern = Pattern::build(&call_node, &options, interner).unwrap();
        let template = parse_expression(template, interner).unwrap();
        MacroRule { pattern, template }
    }

    fn rewrite(
        interner: &Interner,
        name: &str,
        pattern: &str,
        placeholders: &[(&str, TokenClass)],
        template: &str,
    ) -> RewriteRule {
        let tree = parse_expression(pattern, interner).unwrap();
        let options = PatternOptions {
            placeholders: placeholders
                .iter()
                .map(|(name, class)| (interner.intern(name), Constraint::of(*class)))
                .collect(),
            operator_classes: FxHashMap::default(),
        };
        RewriteRule {
            name: name.to_string(),
            pattern: Pattern::build(&tree, &options, interner).unwrap(),
            template: parse_expression(template, interner).unwrap(),
        }
    }

    fn expand_source(
        registry: &MacroRegistry,
        interner: &Interner,
        source: &str,
    ) -> Result<Expansion, ExpansionError> {
        let unit = parse_unit(source, interner).unwrap();
        let expander = Expander::new(registry, interner, FileId::new(0), source);
        expander.expand_unit(&unit)
    }

    fn tail_of(expansion: &Expansion) -> &SyntaxNode {
        let NodeKind::Block { tail, .. } = &expansion.tree.kind else {
            panic!("expected unit block");
        };
        tail.as_deref().unwrap()
    }

    #[test]
    fn test_stringify_builtin() {
        let interner = Interner::new();
        let registry = MacroRegistry::with_builtins(&interner);
        let expansion = expand_source(&registry, &interner, "stringify!(1 + 2)").unwrap();
        let NodeKind::Literal(Literal::String(text)) = &tail_of(&expansion).kind else {
            panic!("expected string literal");
        };
        assert_eq!(text, "1 + 2");
        assert_eq!(expansion.phase, UnitPhase::Finalized);
        assert_eq!(expansion.macro_expansions, 1);
    }

    #[test]
    fn test_concat_builtin() {
        let interner = Interner::new();
        let registry = MacroRegistry::with_builtins(&interner);
        let expansion =
            expand_source(&registry, &interner, "concat!(\"v\", 1, true)").unwrap();
        let NodeKind::Literal(Literal::String(text)) = &tail_of(&expansion).kind else {
            panic!("expected string literal");
        };
        assert_eq!(text, "v1true");

        let error = expand_source(&registry, &interner, "concat!(f(1))").unwrap_err();
        assert!(matches!(error, ExpansionError::Rejected { .. }));
    }

    #[test]
    fn test_assert_builtin_guards_with_abort() {
        let interner = Interner::new();
        let registry = MacroRegistry::with_builtins(&interner);
        let expansion = expand_source(&registry, &interner, "assert!(x > 0)").unwrap();
        let rendered = ql_syntax::format_node(tail_of(&expansion), &interner);
        assert_eq!(
            rendered,
            "if !(x > 0) {\n    abort(\"assertion failed: x > 0\");\n}"
        );
    }

    #[test]
    fn test_line_builtin_reports_call_site_line() {
        let interner = Interner::new();
        let registry = MacroRegistry::with_builtins(&interner);
        let expansion = expand_source(&registry, &interner, "1;\nline!()\n").unwrap();
        let NodeKind::Literal(Literal::Integer(line)) = tail_of(&expansion).kind else {
            panic!("expected integer literal");
        };
        assert_eq!(line, 2);
    }

    #[test]
    fn test_declarative_rule_substitutes_bindings() {
        let interner = Interner::new();
        let mut registry = MacroRegistry::new();
        registry
            .register(MacroDef {
                name: interner.intern("double"),
                kind: MacroKind::Rules(vec![rule(
                    &interner,
                    "double",
                    &["$x"],
                    &[("x", TokenClass::Expr)],
                    "$x * 2",
                )]),
            })
            .unwrap();
        let expansion = expand_source(&registry, &interner, "double!(3 + 1)").unwrap();
        let expected = parse_expression("(3 + 1) * 2", &interner).unwrap();
        assert!(tail_of(&expansion).structurally_equals(&expected));
    }

    #[test]
    fn test_rules_try_in_order_first_match_wins() {
        let interner = Interner::new();
        let mut registry = MacroRegistry::new();
        registry
            .register(MacroDef {
                name: interner.intern("classify"),
                kind: MacroKind::Rules(vec![
                    rule(
                        &interner,
                        "classify",
                        &["$a"],
                        &[("a", TokenClass::Literal)],
                        "\"literal\"",
                    ),
                    rule(
                        &interner,
                        "classify",
                        &["$a"],
                        &[("a", TokenClass::Expr)],
                        "\"expr\"",
                    ),
                ]),
            })
            .unwrap();

        let expansion = expand_source(&registry, &interner, "classify!(5)").unwrap();
        let NodeKind::Literal(Literal::String(text)) = &tail_of(&expansion).kind else {
            panic!("expected string literal");
        };
        assert_eq!(text, "literal");

        let expansion = expand_source(&registry, &interner, "classify!(f(5))").unwrap();
        let NodeKind::Literal(Literal::String(text)) = &tail_of(&expansion).kind else {
            panic!("expected string literal");
        };
        assert_eq!(text, "expr");
    }

    #[test]
    fn test_expansion_output_re_enters_expansion() {
        let interner = Interner::new();
        let mut registry = MacroRegistry::new();
        registry
            .register(MacroDef {
                name: interner.intern("double"),
                kind: MacroKind::Rules(vec![rule(
                    &interner,
                    "double",
                    &["$x"],
                    &[("x", TokenClass::Expr)],
                    "$x * 2",
                )]),
            })
            .unwrap();
        registry
            .register(MacroDef {
                name: interner.intern("quadruple"),
                kind: MacroKind::Rules(vec![rule(
                    &interner,
                    "quadruple",
                    &["$x"],
                    &[("x", TokenClass::Expr)],
                    "double!(double!($x))",
                )]),
            })
            .unwrap();
        let expansion = expand_source(&registry, &interner, "quadruple!(3)").unwrap();
        let expected = parse_expression("3 * 2 * 2", &interner).unwrap();
        assert!(tail_of(&expansion).structurally_equals(&expected));
        assert_eq!(expansion.macro_expansions, 3);
    }

    #[test]
    fn test_self_referential_macro_hits_depth_limit() {
        let interner = Interner::new();
        let mut registry = MacroRegistry::new();
        registry
            .register(MacroDef {
                name: interner.intern("omega"),
                kind: MacroKind::Rules(vec![rule(
                    &interner,
                    "omega",
                    &["$x"],
                    &[("x", TokenClass::Expr)],
                    "omega!($x)",
                )]),
            })
            .unwrap();
        let error = expand_source(&registry, &interner, "omega!(1)").unwrap_err();
        assert!(matches!(error, ExpansionError::RecursionLimit { .. }));
    }

    #[test]
    fn test_undefined_macro_is_reported_with_span() {
        let interner = Interner::new();
        let registry = MacroRegistry::new();
        let error = expand_source(&registry, &interner, "1 + missing!(2)").unwrap_err();
        let ExpansionError::UndefinedMacro { name, span } = error else {
            panic!("expected undefined macro error");
        };
        assert_eq!(name, interner.intern("missing"));
        assert_eq!(span.range(), 4..15);
    }

    #[test]
    fn test_wrong_arity_matches_no_rule() {
        let interner = Interner::new();
        let mut registry = MacroRegistry::new();
        registry
            .register(MacroDef {
                name: interner.intern("double"),
                kind: MacroKind::Rules(vec![rule(
                    &interner,
                    "double",
                    &["$x"],
                    &[("x", TokenClass::Expr)],
                    "$x * 2",
                )]),
            })
            .unwrap();
        let error = expand_source(&registry, &interner, "double!(1, 2)").unwrap_err();
        let ExpansionError::NoRuleMatched { arity, .. } = error else {
            panic!("expected no-rule-matched error");
        };
        assert_eq!(arity, 2);
    }

    #[test]
    fn test_rewrites_run_to_fixpoint() {
        let interner = Interner::new();
        let mut registry = MacroRegistry::new();
        registry.add_rewrite(rewrite(
            &interner,
            "add-zero",
            "$x + 0",
            &[("x", TokenClass::Expr)],
            "$x",
        ));
        let expansion = expand_source(&registry, &interner, "(5 + 0) + 0").unwrap();
        assert!(matches!(
            tail_of(&expansion).kind,
            NodeKind::Literal(Literal::Integer(5))
        ));
        assert_eq!(expansion.rewrite_applications, 2);
    }

    #[test]
    fn test_rewrite_output_may_invoke_macros() {
        let interner = Interner::new();
        let mut registry = MacroRegistry::with_builtins(&interner);
        registry.add_rewrite(rewrite(
            &interner,
            "spell-out",
            "$x * 1",
            &[("x", TokenClass::Expr)],
            "stringify!($x)",
        ));
        let expansion = expand_source(&registry, &interner, "7 * 1").unwrap();
        let NodeKind::Literal(Literal::String(text)) = &tail_of(&expansion).kind else {
            panic!("expected string literal");
        };
        assert_eq!(text, "7");
    }

    #[test]
    fn test_divergent_rewrite_fails_deterministically() {
        let interner = Interner::new();
        let mut registry = MacroRegistry::new();
        // Grows forever: x -> x + 0 would immediately re-match itself
        registry.add_rewrite(rewrite(
            &interner,
            "grow",
            "$x * 1",
            &[("x", TokenClass::Expr)],
            "($x * 1) + 0",
        ));
        let error = expand_source(&registry, &interner, "7 * 1").unwrap_err();
        assert!(matches!(error, ExpansionError::RecursionLimit { .. }));
    }

    #[test]
    fn test_stray_splice_fails_finalization() {
        let interner = Interner::new();
        let registry = MacroRegistry::new();
        let error = expand_source(&registry, &interner, "$x + 1").unwrap_err();
        assert!(matches!(error, ExpansionError::StraySplice { .. }));
    }

    struct Doubler;

    impl MacroTransform for Doubler {
        fn expand(
            &self,
            _ctx: &ExpansionContext<'_>,
            call: &CallSite<'_>,
        ) -> Result<SyntaxNode, ExpansionError> {
            let [arg] = call.args else {
                return Err(ExpansionError::Rejected {
                    name: call.name,
                    message: "expected exactly one argument".to_string(),
                    span: call.span,
                });
            };
            Ok(SyntaxNode::new(
                NodeKind::Binary {
                    op: ql_syntax::BinaryOp::Mul,
                    lhs: Box::new(arg.clone()),
                    rhs: Box::new(SyntaxNode::integer(2, call.span)),
                },
                call.span,
            ))
        }
    }

    #[test]
    fn test_external_transform_and_rejection() {
        let interner = Interner::new();
        let mut registry = MacroRegistry::new();
        registry
            .register(MacroDef {
                name: interner.intern("twice"),
                kind: MacroKind::External(Arc::new(Doubler)),
            })
            .unwrap();

        let expansion = expand_source(&registry, &interner, "twice!(21)").unwrap();
        let expected = parse_expression("21 * 2", &interner).unwrap();
        assert!(tail_of(&expansion).structurally_equals(&expected));

        let error = expand_source(&registry, &interner, "twice!(1, 2)").unwrap_err();
        let ExpansionError::Rejected { message, span, .. } = error else {
            panic!("expected rejection");
        };
        assert_eq!(message, "expected exactly one argument");
        assert_eq!(span.range(), 0..12);
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let interner = Interner::new();
        let mut registry = MacroRegistry::with_builtins(&interner);
        let error = registry
            .register(MacroDef {
                name: interner.intern("stringify"),
                kind: MacroKind::Rules(Vec::new()),
            })
            .unwrap_err();
        let DuplicateMacro { name }: DuplicateMacro = error;
        let _: Symbol = name;
    }
}
