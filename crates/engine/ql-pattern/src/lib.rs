//! Structural pattern matching over syntax trees
//!
//! A [`Pattern`] is a syntax tree with declared placeholder positions and a
//! token-class constraint table. Matching compares node kinds and children
//! structurally, except at placeholder positions (always match within the
//! declared class, record the binding) and at operator positions widened by
//! an operator class ("`+` stands for any of {+,-}").
//!
//! Everything ambiguous is rejected when the pattern is *built*: a
//! placeholder may occur exactly once, and every declared placeholder must
//! occur. A successful match is therefore always total over the declared
//! placeholders, and matching needs no backtracking.

pub mod error;
mod matcher;

pub use error::PatternError;
pub use matcher::Bindings;

use indexmap::IndexMap;
use ql_intern::{Interner, Symbol};
use ql_span::Span;
use ql_syntax::{BinaryOp, Literal, NodeKind, SyntaxNode, UnaryOp};
use rustc_hash::FxHashMap;

/// Token class a placeholder is declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    /// Any single-token leaf: a literal or an identifier
    Token,
    /// Any subtree
    Expr,
    /// Identifiers only
    Ident,
    /// Literals only
    Literal,
}

impl TokenClass {
    /// Parses the discovery-file spelling of a class
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "token" => Self::Token,
            "expr" => Self::Expr,
            "ident" => Self::Ident,
            "literal" => Self::Literal,
            _ => return None,
        })
    }
}

/// Declared constraint for one placeholder
#[derive(Debug, Clone)]
pub struct Constraint {
    /// Token class the bound subtree must belong to
    pub class: TokenClass,
    /// Optional token set: the bound leaf must render as one of these
    pub allowed: Option<Vec<String>>,
}

impl Constraint {
    /// Unrestricted constraint of the given class
    pub fn of(class: TokenClass) -> Self {
        Self {
            class,
            allowed: None,
        }
    }
}

/// Inputs to [`Pattern::build`]
#[derive(Debug, Clone, Default)]
pub struct PatternOptions {
    /// Declared placeholders, in declaration order
    pub placeholders: IndexMap<Symbol, Constraint>,
    /// Operator classes: a concrete operator in the pattern stands for any
    /// operator in its set
    pub operator_classes: FxHashMap<BinaryOp, Vec<BinaryOp>>,
}

/// A compiled, validated pattern
#[derive(Debug, Clone)]
pub struct Pattern {
    root: PatternNode,
    constraints: IndexMap<Symbol, CompiledConstraint>,
}

/// One node of the pattern tree, mirroring [`NodeKind`] with placeholder
/// and operator-class positions
#[derive(Debug, Clone)]
pub struct PatternNode {
    pub kind: PatternKind,
    pub span: Span,
}

/// Pattern node kinds
#[derive(Debug, Clone)]
pub enum PatternKind {
    Literal(Literal),
    Identifier(Symbol),
    Unary {
        op: UnaryOp,
        operand: Box<PatternNode>,
    },
    Binary {
        op: OpClass,
        lhs: Box<PatternNode>,
        rhs: Box<PatternNode>,
    },
    Call {
        callee: Box<PatternNode>,
        args: Vec<PatternNode>,
    },
    MacroCall {
        name: Symbol,
        args: Vec<PatternNode>,
    },
    Let {
        name: Symbol,
        value: Box<PatternNode>,
    },
    If {
        condition: Box<PatternNode>,
        then_branch: Box<PatternNode>,
        else_branch: Option<Box<PatternNode>>,
    },
    Block {
        statements: Vec<PatternNode>,
        tail: Option<Box<PatternNode>>,
    },
    Placeholder(Symbol),
}

/// Operator position in a pattern
#[derive(Debug, Clone)]
pub enum OpClass {
    /// Matches exactly this operator
    Exact(BinaryOp),
    /// Matches any operator in the set
    OneOf(Vec<BinaryOp>),
}

impl OpClass {
    fn permits(&self, op: BinaryOp) -> bool {
        match self {
            Self::Exact(exact) => *exact == op,
            Self::OneOf(set) => set.contains(&op),
        }
    }
}

/// Constraint with its token set resolved to comparable leaf prototypes
#[derive(Debug, Clone)]
pub(crate) struct CompiledConstraint {
    pub(crate) class: TokenClass,
    /// Empty means unrestricted
    pub(crate) allowed: Vec<TokenProto>,
}

/// A leaf a token-set entry denotes
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenProto {
    Lit(Literal),
    Ident(Symbol),
}

impl TokenProto {
    fn parse(text: &str, interner: &Interner) -> Option<Self> {
        if let Ok(value) = text.parse::<i64>() {
            return Some(Self::Lit(Literal::Integer(value)));
        }
        if text.contains('.') {
            if let Ok(value) = text.parse::<f64>() {
                return Some(Self::Lit(Literal::Float(value)));
            }
        }
        match text {
            "true" => return Some(Self::Lit(Literal::Bool(true))),
            "false" => return Some(Self::Lit(Literal::Bool(false))),
            _ => {}
        }
        if let Some(stripped) = text.strip_prefix('"') {
            let stripped = stripped.strip_suffix('"')?;
            return Some(Self::Lit(Literal::String(stripped.to_string())));
        }
        let mut chars = text.chars();
        let first = chars.next()?;
        if (first.is_ascii_alphabetic() || first == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Some(Self::Ident(interner.intern(text)));
        }
        None
    }

    pub(crate) fn denotes(&self, node: &SyntaxNode) -> bool {
        match (self, &node.kind) {
            (Self::Lit(proto), NodeKind::Literal(literal)) => proto == literal,
            (Self::Ident(proto), NodeKind::Identifier(name)) => proto == name,
            _ => false,
        }
    }
}

impl Pattern {
    /// Compiles a quoted tree into a pattern, validating every declaration
    ///
    /// # Errors
    ///
    /// Returns a [`PatternError`] if a placeholder is undeclared, occurs
    /// more than once, never occurs, or carries an unusable constraint
    pub fn build(
        tree: &SyntaxNode,
        options: &PatternOptions,
        interner: &Interner,
    ) -> Result<Self, PatternError> {
        let mut constraints = IndexMap::new();
        for (&name, constraint) in &options.placeholders {
            let allowed = match &constraint.allowed {
                None => Vec::new(),
                Some(texts) if texts.is_empty() => {
                    return Err(PatternError::EmptyTokenSet { name });
                }
                Some(_) if constraint.class == TokenClass::Expr => {
                    return Err(PatternError::InvalidConstraint {
                        name,
                        reason: "token sets only apply to single-token classes".to_string(),
                    });
                }
                Some(texts) => {
                    let mut protos = Vec::with_capacity(texts.len());
                    for text in texts {
                        let proto = TokenProto::parse(text, interner).ok_or_else(|| {
                            PatternError::InvalidConstraint {
                                name,
                                reason: format!("`{text}` is not a literal or identifier"),
                            }
                        })?;
                        protos.push(proto);
                    }
                    protos
                }
            };
            constraints.insert(
                name,
                CompiledConstraint {
                    class: constraint.class,
                    allowed,
                },
            );
        }

        let mut seen: FxHashMap<Symbol, Span> = FxHashMap::default();
        let root = lower_node(tree, &constraints, &options.operator_classes, &mut seen)?;

        for &name in constraints.keys() {
            if !seen.contains_key(&name) {
                return Err(PatternError::UnusedPlaceholder { name });
            }
        }

        Ok(Self { root, constraints })
    }

    /// Declared placeholder names, in declaration order
    pub fn placeholder_names(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.constraints.keys().copied()
    }

    pub(crate) fn root(&self) -> &PatternNode {
        &self.root
    }

    pub(crate) fn constraints(&self) -> &IndexMap<Symbol, CompiledConstraint> {
        &self.constraints
    }
}

fn lower_node(
    node: &SyntaxNode,
    constraints: &IndexMap<Symbol, CompiledConstraint>,
    operator_classes: &FxHashMap<BinaryOp, Vec<BinaryOp>>,
    seen: &mut FxHashMap<Symbol, Span>,
) -> Result<PatternNode, PatternError> {
    let kind = match &node.kind {
        NodeKind::Splice(name) => {
            if !constraints.contains_key(name) {
                return Err(PatternError::UndeclaredPlaceholder {
                    name: *name,
                    span: node.span,
                });
            }
            if let Some(&first) = seen.get(name) {
                return Err(PatternError::AmbiguousPlaceholder {
                    name: *name,
                    first,
                    second: node.span,
                });
            }
            seen.insert(*name, node.span);
            PatternKind::Placeholder(*name)
        }
        NodeKind::Literal(literal) => PatternKind::Literal(literal.clone()),
        NodeKind::Identifier(name) => PatternKind::Identifier(*name),
        NodeKind::Unary { op, operand } => PatternKind::Unary {
            op: *op,
            operand: Box::new(lower_node(operand, constraints, operator_classes, seen)?),
        },
        NodeKind::Binary { op, lhs, rhs } => {
            let op = match operator_classes.get(op) {
                Some(set) => OpClass::OneOf(set.clone()),
                None => OpClass::Exact(*op),
            };
            PatternKind::Binary {
                op,
                lhs: Box::new(lower_node(lhs, constraints, operator_classes, seen)?),
                rhs: Box::new(lower_node(rhs, constraints, operator_classes, seen)?),
            }
        }
        NodeKind::Call { callee, args } => PatternKind::Call {
            callee: Box::new(lower_node(callee, constraints, operator_classes, seen)?),
            args: lower_nodes(args, constraints, operator_classes, seen)?,
        },
        NodeKind::MacroCall { name, args } => PatternKind::MacroCall {
            name: *name,
            args: lower_nodes(args, constraints, operator_classes, seen)?,
        },
        NodeKind::Let { name, value } => PatternKind::Let {
            name: *name,
            value: Box::new(lower_node(value, constraints, operator_classes, seen)?),
        },
        NodeKind::If {
            condition,
            then_branch,
            else_branch,
        } => PatternKind::If {
            condition: Box::new(lower_node(condition, constraints, operator_classes, seen)?),
            then_branch: Box::new(lower_node(then_branch, constraints, operator_classes, seen)?),
            else_branch: match else_branch {
                Some(branch) => Some(Box::new(lower_node(
                    branch,
                    constraints,
                    operator_classes,
                    seen,
                )?)),
                None => None,
            },
        },
        NodeKind::Block { statements, tail } => PatternKind::Block {
            statements: lower_nodes(statements, constraints, operator_classes, seen)?,
            tail: match tail {
                Some(tail) => Some(Box::new(lower_node(
                    tail,
                    constraints,
                    operator_classes,
                    seen,
                )?)),
                None => None,
            },
        },
    };
    Ok(PatternNode {
        kind,
        span: node.span,
    })
}

fn lower_nodes(
    nodes: &[SyntaxNode],
    constraints: &IndexMap<Symbol, CompiledConstraint>,
    operator_classes: &FxHashMap<BinaryOp, Vec<BinaryOp>>,
    seen: &mut FxHashMap<Symbol, Span>,
) -> Result<Vec<PatternNode>, PatternError> {
    nodes
        .iter()
        .map(|node| lower_node(node, constraints, operator_classes, seen))
        .collect()
}
