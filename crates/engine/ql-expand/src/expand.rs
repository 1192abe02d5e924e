//! The expansion engine
//!
//! Per compilation unit, trees progress `Parsed → Transformed* → Finalized`:
//! macro call sites are expanded bottom-up, then standalone rewrite rules
//! run in passes until none fires, re-entering call expansion after every
//! pass because templates may produce new invocations. Nested expansions
//! and rewrite passes share one configured depth limit, so divergent macro
//! sets fail deterministically instead of looping.

use crate::builtins;
use crate::error::ExpansionError;
use crate::registry::{MacroKind, MacroRegistry, MacroRule};
use ql_intern::{Interner, Symbol};
use ql_pattern::Bindings;
use ql_quote::MissingSplice;
use ql_span::{FileId, LineIndex, Span};
use ql_syntax::{NodeKind, SyntaxNode};
use rustc_hash::FxHashMap;

/// Default bound on nested expansions and rewrite passes
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Expansion tuning knobs
#[derive(Debug, Clone, Copy)]
pub struct ExpandOptions {
    /// Maximum nested expansion depth and rewrite pass count
    pub max_depth: usize,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Phase a unit's tree has reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitPhase {
    /// Parsed, not yet expanded
    Parsed,
    /// At least one transformation applied, not yet finalized
    Transformed,
    /// Expansion complete and verified
    Finalized,
}

/// A macro invocation being expanded
pub struct CallSite<'a> {
    /// Macro name
    pub name: Symbol,
    /// Resolved argument nodes
    pub args: &'a [SyntaxNode],
    /// Call-site location, for diagnostics
    pub span: Span,
}

/// Compilation context handed to macro implementations
pub struct ExpansionContext<'a> {
    /// Interner for building identifiers in replacement trees
    pub interner: &'a Interner,
    /// Unit being compiled
    pub file: FileId,
    line_index: &'a LineIndex,
    depth: usize,
}

impl ExpansionContext<'_> {
    /// 1-based source line of a span in the current unit
    pub fn line_number(&self, span: Span) -> u32 {
        self.line_index.line_col(span.start).line + 1
    }

    /// Current nested expansion depth
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// Result of expanding one unit
#[derive(Debug)]
pub struct Expansion {
    /// The finalized tree
    pub tree: SyntaxNode,
    /// Phase reached (always [`UnitPhase::Finalized`] on success)
    pub phase: UnitPhase,
    /// Number of macro call sites expanded
    pub macro_expansions: usize,
    /// Number of rewrite-rule applications
    pub rewrite_applications: usize,
}

/// Expands the trees of one compilation unit
///
/// The expander borrows the shared read-only registry; each unit's tree is
/// exclusively owned by the calling worker.
pub struct Expander<'a> {
    registry: &'a MacroRegistry,
    interner: &'a Interner,
    file: FileId,
    line_index: LineIndex,
    options: ExpandOptions,
}

impl<'a> Expander<'a> {
    /// Creates an expander for one unit with default options
    #[must_use]
    pub fn new(
        registry: &'a MacroRegistry,
        interner: &'a Interner,
        file: FileId,
        source: &str,
    ) -> Self {
        Self::with_options(registry, interner, file, source, ExpandOptions::default())
    }

    /// Creates an expander with explicit options
    #[must_use]
    pub fn with_options(
        registry: &'a MacroRegistry,
        interner: &'a Interner,
        file: FileId,
        source: &str,
        options: ExpandOptions,
    ) -> Self {
        Self {
            registry,
            interner,
            file,
            line_index: LineIndex::new(source),
            options,
        }
    }

    /// Expands every macro call site and rewrite match in the unit
    ///
    /// # Errors
    ///
    /// Returns an [`ExpansionError`] on undefined macros, rejected input,
    /// exceeded depth limits, or splice markers surviving to finalization
    pub fn expand_unit(&self, unit: &SyntaxNode) -> Result<Expansion, ExpansionError> {
        let mut macro_expansions = 0;
        let mut rewrite_applications = 0;

        let mut tree = self.expand_calls(unit, 0, &mut macro_expansions)?;

        let mut passes = 0;
        loop {
            let mut fired = 0;
            let rewritten = self.apply_rewrites(&tree, &mut fired)?;
            if fired == 0 {
                break;
            }
            rewrite_applications += fired;
            passes += 1;
            if passes >= self.options.max_depth {
                return Err(ExpansionError::RecursionLimit {
                    depth: passes,
                    span: rewritten.span,
                });
            }
            // Rewrite output may contain fresh invocations
            tree = self.expand_calls(&rewritten, 0, &mut macro_expansions)?;
        }

        if let Some((name, span)) = tree.find_splice() {
            return Err(ExpansionError::StraySplice { name, span });
        }

        Ok(Expansion {
            tree,
            phase: UnitPhase::Finalized,
            macro_expansions,
            rewrite_applications,
        })
    }

    /// Bottom-up call expansion; replacement trees re-enter expansion one
    /// level deeper
    fn expand_calls(
        &self,
        node: &SyntaxNode,
        depth: usize,
        count: &mut usize,
    ) -> Result<SyntaxNode, ExpansionError> {
        if depth > self.options.max_depth {
            return Err(ExpansionError::RecursionLimit {
                depth,
                span: node.span,
            });
        }
        let rebuilt = map_children(node, &mut |child| self.expand_calls(child, depth, count))?;
        if let NodeKind::MacroCall { name, args } = &rebuilt.kind {
            let call = CallSite {
                name: *name,
                args,
                span: rebuilt.span,
            };
            let replacement = self.invoke(&call, depth)?;
            *count += 1;
            return self.expand_calls(&replacement, depth + 1, count);
        }
        Ok(rebuilt)
    }

    fn invoke(&self, call: &CallSite<'_>, depth: usize) -> Result<SyntaxNode, ExpansionError> {
        let def = self
            .registry
            .lookup(call.name)
            .ok_or(ExpansionError::UndefinedMacro {
                name: call.name,
                span: call.span,
            })?;
        match &def.kind {
            MacroKind::Builtin(builtin) => {
                builtins::expand_builtin(*builtin, &self.context(depth), call)
            }
            MacroKind::External(transform) => transform.expand(&self.context(depth), call),
            MacroKind::Rules(rules) => self.expand_rules(rules, call),
        }
    }

    /// Declarative expansion: rules tried in order, first match wins
    fn expand_rules(
        &self,
        rules: &[MacroRule],
        call: &CallSite<'_>,
    ) -> Result<SyntaxNode, ExpansionError> {
        let call_node = SyntaxNode::new(
            NodeKind::MacroCall {
                name: call.name,
                args: call.args.to_vec(),
            },
            call.span,
        );
        for rule in rules {
            if let Some(bindings) = rule.pattern.matches(&call_node) {
                return substitute(&rule.template, &bindings);
            }
        }
        Err(ExpansionError::NoRuleMatched {
            name: call.name,
            arity: call.args.len(),
            span: call.span,
        })
    }

    /// One rewrite pass: preorder, first matching rule wins per subtree, no
    /// descent into a replacement within the same pass
    fn apply_rewrites(
        &self,
        node: &SyntaxNode,
        fired: &mut usize,
    ) -> Result<SyntaxNode, ExpansionError> {
        for rule in self.registry.rewrites() {
            if let Some(bindings) = rule.pattern.matches(node) {
                *fired += 1;
                return substitute(&rule.template, &bindings);
            }
        }
        map_children(node, &mut |child| self.apply_rewrites(child, fired))
    }

    fn context(&self, depth: usize) -> ExpansionContext<'_> {
        ExpansionContext {
            interner: self.interner,
            file: self.file,
            line_index: &self.line_index,
            depth,
        }
    }
}

/// Substitutes match bindings into a template
fn substitute(template: &SyntaxNode, bindings: &Bindings) -> Result<SyntaxNode, ExpansionError> {
    let map: FxHashMap<Symbol, SyntaxNode> = bindings
        .iter()
        .map(|(name, node)| (name, node.clone()))
        .collect();
    ql_quote::splice_tree(template, &map).map_err(|MissingSplice { name, span }| {
        ExpansionError::UnboundPlaceholder { name, span }
    })
}

/// Rebuilds a node with every direct child passed through `transform`
fn map_children<F>(node: &SyntaxNode, transform: &mut F) -> Result<SyntaxNode, ExpansionError>
where
    F: FnMut(&SyntaxNode) -> Result<SyntaxNode, ExpansionError>,
{
    let kind = match &node.kind {
        NodeKind::Literal(_) | NodeKind::Identifier(_) | NodeKind::Splice(_) => node.kind.clone(),
        NodeKind::Unary { op, operand } => NodeKind::Unary {
            op: *op,
            operand: Box::new(transform(operand)?),
        },
        NodeKind::Binary { op, lhs, rhs } => NodeKind::Binary {
            op: *op,
            lhs: Box::new(transform(lhs)?),
            rhs: Box::new(transform(rhs)?),
        },
        NodeKind::Call { callee, args } => NodeKind::Call {
            callee: Box::new(transform(callee)?),
            args: args.iter().map(&mut *transform).collect::<Result<_, _>>()?,
        },
        NodeKind::MacroCall { name, args } => NodeKind::MacroCall {
            name: *name,
            args: args.iter().map(&mut *transform).collect::<Result<_, _>>()?,
        },
        NodeKind::Let { name, value } => NodeKind::Let {
            name: *name,
            value: Box::new(transform(value)?),
        },
        NodeKind::If {
            condition,
            then_branch,
            else_branch,
        } => NodeKind::If {
            condition: Box::new(transform(condition)?),
            then_branch: Box::new(transform(then_branch)?),
            else_branch: match else_branch {
                Some(branch) => Some(Box::new(transform(branch)?)),
                None => None,
            },
        },
        NodeKind::Block { statements, tail } => NodeKind::Block {
            statements: statements
                .iter()
                .map(&mut *transform)
                .collect::<Result<_, _>>()?,
            tail: match tail {
                Some(tail) => Some(Box::new(transform(tail)?)),
                None => None,
            },
        },
    };
    Ok(SyntaxNode::new(kind, node.span))
}
