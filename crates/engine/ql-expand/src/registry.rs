//! Macro definitions and the process-wide registry
//!
//! The registry is populated once at startup (from the discovery file
//! and/or programmatic registration), then shared read-only behind an
//! `Arc` across unit workers; lookups never take a lock.

use crate::builtins::BuiltinMacro;
use crate::error::DuplicateMacro;
use crate::expand::{CallSite, ExpansionContext};
use crate::ExpansionError;
use indexmap::IndexMap;
use ql_intern::{Interner, Symbol};
use ql_pattern::Pattern;
use ql_syntax::SyntaxNode;
use std::sync::Arc;

/// A user-registered transformation function
///
/// Invoked at compile time with the resolved argument nodes and the current
/// compilation context; the returned subtree replaces the call site.
pub trait MacroTransform: Send + Sync {
    /// Expands one call site
    ///
    /// # Errors
    ///
    /// Implementations signal incompatible input with
    /// [`ExpansionError::Rejected`], carrying their own diagnostic message
    fn expand(
        &self,
        ctx: &ExpansionContext<'_>,
        call: &CallSite<'_>,
    ) -> Result<SyntaxNode, ExpansionError>;
}

/// Macro definition
#[derive(Debug)]
pub struct MacroDef {
    /// Macro name
    pub name: Symbol,
    /// Macro kind
    pub kind: MacroKind,
}

/// Macro kind
pub enum MacroKind {
    /// Builtin macro (stringify!, concat!, ...)
    Builtin(BuiltinMacro),
    /// Declarative macro: rules tried in order, first match wins
    Rules(Vec<MacroRule>),
    /// External transformation function
    External(Arc<dyn MacroTransform>),
}

impl std::fmt::Debug for MacroKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Builtin(b) => f.debug_tuple("Builtin").field(b).finish(),
            Self::Rules(rules) => f.debug_tuple("Rules").field(rules).finish(),
            Self::External(_) => f.debug_tuple("External").field(&"<dyn MacroTransform>").finish(),
        }
    }
}

/// One declarative rule: a call-shaped pattern and its template
#[derive(Debug)]
pub struct MacroRule {
    /// Pattern over the whole call site (name and arguments)
    pub pattern: Pattern,
    /// Replacement template; splices refer to the pattern's placeholders
    pub template: SyntaxNode,
}

/// A standalone rewrite: applied to every matching subtree of a unit
#[derive(Debug)]
pub struct RewriteRule {
    /// Rule name, for diagnostics and listings
    pub name: String,
    /// Subtree pattern
    pub pattern: Pattern,
    /// Replacement template
    pub template: SyntaxNode,
}

/// Process-wide macro registry, read-only after initialization
#[derive(Debug)]
pub struct MacroRegistry {
    macros: IndexMap<Symbol, MacroDef>,
    rewrites: Vec<RewriteRule>,
}

impl MacroRegistry {
    /// Creates an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            macros: IndexMap::new(),
            rewrites: Vec::new(),
        }
    }

    /// Creates a registry pre-populated with the builtin macros
    #[must_use]
    pub fn with_builtins(interner: &Interner) -> Self {
        let mut registry = Self::new();
        for builtin in BuiltinMacro::ALL {
            let name = interner.intern(builtin.keyword());
            // Builtin names are distinct, so this cannot conflict
            let _ = registry.register(MacroDef {
                name,
                kind: MacroKind::Builtin(builtin),
            });
        }
        registry
    }

    /// Registers a macro definition
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateMacro`] if the name is already taken
    pub fn register(&mut self, def: MacroDef) -> Result<(), DuplicateMacro> {
        if self.macros.contains_key(&def.name) {
            return Err(DuplicateMacro { name: def.name });
        }
        self.macros.insert(def.name, def);
        Ok(())
    }

    /// Appends a standalone rewrite rule; rules apply in registration order
    pub fn add_rewrite(&mut self, rule: RewriteRule) {
        self.rewrites.push(rule);
    }

    /// Looks up a macro by name
    #[must_use]
    pub fn lookup(&self, name: Symbol) -> Option<&MacroDef> {
        self.macros.get(&name)
    }

    /// Registered macro names, in registration order
    pub fn macro_names(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.macros.keys().copied()
    }

    /// Registered macros, in registration order
    pub fn macros(&self) -> impl Iterator<Item = &MacroDef> {
        self.macros.values()
    }

    /// The standalone rewrite rules, in registration order
    #[must_use]
    pub fn rewrites(&self) -> &[RewriteRule] {
        &self.rewrites
    }

    /// Number of registered macros
    #[must_use]
    pub fn len(&self) -> usize {
        self.macros.len()
    }

    /// Whether no macros are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }
}

impl Default for MacroRegistry {
    fn default() -> Self {
        Self::new()
    }
}
