//! Macro discovery file loading
//!
//! An external TOML file maps macro names to implementations — builtin
//! keys or inline declarative rules — plus standalone rewrite rules. It is
//! loaded once at startup into an immutable [`MacroRegistry`]; every entry
//! is validated here so that expansion never sees a half-built macro.
//!
//! ```toml
//! [[macros]]
//! name = "double"
//!
//! [[macros.rules]]
//! args = ["$x"]
//! template = "$x * 2"
//! placeholders = [{ name = "x", class = "expr" }]
//!
//! [[rewrites]]
//! name = "add-zero"
//! pattern = "$x + 0"
//! template = "$x"
//! placeholders = [{ name = "x", class = "expr" }]
//! ```

use indexmap::IndexMap;
use ql_expand::{BuiltinMacro, MacroDef, MacroKind, MacroRegistry, MacroRule, RewriteRule};
use ql_intern::{Interner, Symbol};
use ql_parser::ParseError;
use ql_pattern::{Constraint, Pattern, PatternError, PatternOptions, TokenClass};
use ql_syntax::{BinaryOp, NodeKind, SyntaxNode};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default discovery file name, looked up next to the input
pub const DEFAULT_MANIFEST_NAME: &str = "quill-macros.toml";

/// Error type for registry loading
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Discovery file could not be read
    #[error("failed to read discovery file {}", path.display())]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// Discovery file is not valid TOML
    #[error("failed to parse discovery file")]
    Toml(#[from] toml::de::Error),
    /// Builtin key does not name a builtin
    #[error("macro `{name}`: unknown builtin `{builtin}`")]
    UnknownBuiltin {
        /// Macro name
        name: String,
        /// The bad key
        builtin: String,
    },
    /// Name registered twice (or shadowing a builtin)
    #[error("macro `{name}` is already registered")]
    Duplicate {
        /// Macro name
        name: String,
    },
    /// Entry has neither a builtin key nor rules
    #[error("macro `{name}` has neither a builtin nor rules")]
    MissingImplementation {
        /// Macro name
        name: String,
    },
    /// Entry has both a builtin key and rules
    #[error("macro `{name}` has both a builtin and rules")]
    ConflictingImplementation {
        /// Macro name
        name: String,
    },
    /// Placeholder declared with an unknown token class
    #[error("{owner}: unknown token class `{class}` for placeholder `{placeholder}`")]
    UnknownClass {
        /// Macro or rewrite the declaration belongs to
        owner: String,
        /// Placeholder name
        placeholder: String,
        /// The bad class keyword
        class: String,
    },
    /// Operator table entry does not name an operator
    #[error("{owner}: unknown operator `{operator}`")]
    UnknownOperator {
        /// Macro or rewrite the table belongs to
        owner: String,
        /// The bad spelling
        operator: String,
    },
    /// Template splices a placeholder the pattern does not declare
    #[error("{owner}: template placeholder `{placeholder}` is not declared")]
    UnboundTemplatePlaceholder {
        /// Macro or rewrite the template belongs to
        owner: String,
        /// Placeholder name
        placeholder: String,
    },
    /// A pattern or template does not parse
    #[error("{owner}: malformed pattern or template")]
    Parse {
        /// Macro or rewrite the text belongs to
        owner: String,
        /// Underlying diagnostic
        #[source]
        source: ParseError,
    },
    /// A pattern fails validation
    #[error("{owner}: invalid pattern")]
    Pattern {
        /// Macro or rewrite the pattern belongs to
        owner: String,
        /// Underlying error
        #[source]
        source: PatternError,
    },
}

/// The discovery file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MacroManifest {
    /// Macro definitions
    #[serde(default)]
    pub macros: Vec<MacroEntry>,
    /// Standalone rewrite rules, applied in file order
    #[serde(default)]
    pub rewrites: Vec<RewriteEntry>,
}

/// One macro definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroEntry {
    /// Invocation name
    pub name: String,
    /// Builtin implementation key (exclusive with `rules`)
    #[serde(default)]
    pub builtin: Option<String>,
    /// Declarative rules, tried in file order (exclusive with `builtin`)
    #[serde(default)]
    pub rules: Vec<RuleEntry>,
}

/// One declarative rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleEntry {
    /// Argument patterns, one per call argument
    #[serde(default)]
    pub args: Vec<String>,
    /// Replacement template
    pub template: String,
    /// Placeholder declarations
    #[serde(default)]
    pub placeholders: Vec<PlaceholderEntry>,
    /// Operator classes: a concrete operator stands for a set
    #[serde(default)]
    pub operators: IndexMap<String, Vec<String>>,
}

/// One placeholder declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceholderEntry {
    /// Placeholder name (spliced as `$name`)
    pub name: String,
    /// Token class: `token`, `expr`, `ident`, or `literal`
    pub class: String,
    /// Optional token set the bound leaf must render as
    #[serde(default)]
    pub any_of: Option<Vec<String>>,
}

/// One standalone rewrite rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteEntry {
    /// Rule name, for diagnostics and listings
    pub name: String,
    /// Subtree pattern
    pub pattern: String,
    /// Replacement template
    pub template: String,
    /// Placeholder declarations
    #[serde(default)]
    pub placeholders: Vec<PlaceholderEntry>,
    /// Operator classes
    #[serde(default)]
    pub operators: IndexMap<String, Vec<String>>,
}

impl MacroManifest {
    /// Reads and parses a discovery file
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] if the file cannot be read or parsed
    pub fn from_file(path: &Path) -> Result<Self, RegistryError> {
        let contents = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }
}

/// Loads a discovery file into a registry pre-populated with the builtins
///
/// # Errors
///
/// Returns a [`RegistryError`] on IO, parse, or validation failure
pub fn load_file(path: &Path, interner: &Interner) -> Result<MacroRegistry, RegistryError> {
    let manifest = MacroManifest::from_file(path)?;
    build_registry(&manifest, interner)
}

/// Parses discovery-file text into a registry pre-populated with the
/// builtins
///
/// # Errors
///
/// Returns a [`RegistryError`] on parse or validation failure
pub fn load_str(text: &str, interner: &Interner) -> Result<MacroRegistry, RegistryError> {
    let manifest: MacroManifest = toml::from_str(text)?;
    build_registry(&manifest, interner)
}

/// Builds a registry from a parsed manifest, starting from the builtins
///
/// # Errors
///
/// Returns a [`RegistryError`] on validation failure
pub fn build_registry(
    manifest: &MacroManifest,
    interner: &Interner,
) -> Result<MacroRegistry, RegistryError> {
    let mut registry = MacroRegistry::with_builtins(interner);
    apply_manifest(&mut registry, manifest, interner)?;
    Ok(registry)
}

/// Applies a manifest's entries onto an existing registry
///
/// # Errors
///
/// Returns a [`RegistryError`] on validation failure
pub fn apply_manifest(
    registry: &mut MacroRegistry,
    manifest: &MacroManifest,
    interner: &Interner,
) -> Result<(), RegistryError> {
    for entry in &manifest.macros {
        let def = compile_macro(entry, interner)?;
        registry
            .register(def)
            .map_err(|_| RegistryError::Duplicate {
                name: entry.name.clone(),
            })?;
    }
    for entry in &manifest.rewrites {
        registry.add_rewrite(compile_rewrite(entry, interner)?);
    }
    Ok(())
}

fn compile_macro(entry: &MacroEntry, interner: &Interner) -> Result<MacroDef, RegistryError> {
    let name = interner.intern(&entry.name);
    let kind = match (&entry.builtin, entry.rules.as_slice()) {
        (Some(builtin), []) => {
            let builtin = BuiltinMacro::from_keyword(builtin).ok_or_else(|| {
                RegistryError::UnknownBuiltin {
                    name: entry.name.clone(),
                    builtin: builtin.clone(),
                }
            })?;
            MacroKind::Builtin(builtin)
        }
        (None, []) => {
            return Err(RegistryError::MissingImplementation {
                name: entry.name.clone(),
            });
        }
        (Some(_), _) => {
            return Err(RegistryError::ConflictingImplementation {
                name: entry.name.clone(),
            });
        }
        (None, rules) => {
            let compiled = rules
                .iter()
                .map(|rule| compile_rule(&entry.name, name, rule, interner))
                .collect::<Result<Vec<_>, _>>()?;
            MacroKind::Rules(compiled)
        }
    };
    Ok(MacroDef { name, kind })
}

fn compile_rule(
    owner: &str,
    name: Symbol,
    rule: &RuleEntry,
    interner: &Interner,
) -> Result<MacroRule, RegistryError> {
    let options = pattern_options(owner, &rule.placeholders, &rule.operators, interner)?;

    let args = rule
        .args
        .iter()
        .map(|text| parse_text(owner, text, interner))
        .collect::<Result<Vec<_>, _>>()?;
    let call_node = SyntaxNode::new(
        NodeKind::MacroCall { name, args },
        ql_span::Span::synthesized(),
    );
    let pattern =
        Pattern::build(&call_node, &options, interner).map_err(|source| RegistryError::Pattern {
            owner: owner.to_string(),
            source,
        })?;

    let template = parse_text(owner, &rule.template, interner)?;
    check_template(owner, &template, &options, interner)?;

    Ok(MacroRule { pattern, template })
}

fn compile_rewrite(
    entry: &RewriteEntry,
    interner: &Interner,
) -> Result<RewriteRule, RegistryError> {
    let owner = &entry.name;
    let options = pattern_options(owner, &entry.placeholders, &entry.operators, interner)?;

    let tree = parse_text(owner, &entry.pattern, interner)?;
    let pattern =
        Pattern::build(&tree, &options, interner).map_err(|source| RegistryError::Pattern {
            owner: owner.clone(),
            source,
        })?;

    let template = parse_text(owner, &entry.template, interner)?;
    check_template(owner, &template, &options, interner)?;

    Ok(RewriteRule {
        name: entry.name.clone(),
        pattern,
        template,
    })
}

fn pattern_options(
    owner: &str,
    placeholders: &[PlaceholderEntry],
    operators: &IndexMap<String, Vec<String>>,
    interner: &Interner,
) -> Result<PatternOptions, RegistryError> {
    let mut declared = IndexMap::new();
    for entry in placeholders {
        let class =
            TokenClass::from_keyword(&entry.class).ok_or_else(|| RegistryError::UnknownClass {
                owner: owner.to_string(),
                placeholder: entry.name.clone(),
                class: entry.class.clone(),
            })?;
        declared.insert(
            interner.intern(&entry.name),
            Constraint {
                class,
                allowed: entry.any_of.clone(),
            },
        );
    }

    let mut operator_classes = FxHashMap::default();
    for (spelling, set) in operators {
        let key = parse_operator(owner, spelling)?;
        let ops = set
            .iter()
            .map(|spelling| parse_operator(owner, spelling))
            .collect::<Result<Vec<_>, _>>()?;
        operator_classes.insert(key, ops);
    }

    Ok(PatternOptions {
        placeholders: declared,
        operator_classes,
    })
}

fn parse_operator(owner: &str, spelling: &str) -> Result<BinaryOp, RegistryError> {
    BinaryOp::from_symbol(spelling).ok_or_else(|| RegistryError::UnknownOperator {
        owner: owner.to_string(),
        operator: spelling.to_string(),
    })
}

fn parse_text(owner: &str, text: &str, interner: &Interner) -> Result<SyntaxNode, RegistryError> {
    ql_parser::parse_expression(text, interner).map_err(|source| RegistryError::Parse {
        owner: owner.to_string(),
        source,
    })
}

/// Every splice in a template must name a declared placeholder
fn check_template(
    owner: &str,
    template: &SyntaxNode,
    options: &PatternOptions,
    interner: &Interner,
) -> Result<(), RegistryError> {
    let mut splices = Vec::new();
    collect_splices(template, &mut splices);
    for name in splices {
        if !options.placeholders.contains_key(&name) {
            return Err(RegistryError::UnboundTemplatePlaceholder {
                owner: owner.to_string(),
                placeholder: interner.resolve(name).to_string(),
            });
        }
    }
    Ok(())
}

fn collect_splices(node: &SyntaxNode, found: &mut Vec<Symbol>) {
    if let NodeKind::Splice(name) = node.kind {
        found.push(name);
        return;
    }
    for child in node.children() {
        collect_splices(child, found);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    const MANIFEST: &str = r#"
[[macros]]
name = "double"

[[macros.rules]]
args = ["$x"]
template = "$x * 2"
placeholders = [{ name = "x", class = "expr" }]

[[macros]]
name = "shout"
builtin = "stringify"

[[rewrites]]
name = "add-zero"
pattern = "$x + 0"
template = "$x"
placeholders = [{ name = "x", class = "expr" }]
"#;

    #[test]
    fn test_load_registers_macros_and_rewrites() {
        let interner = Interner::new();
        let registry = load_str(MANIFEST, &interner).unwrap();
        assert!(registry.lookup(interner.intern("double")).is_some());
        assert!(registry.lookup(interner.intern("shout")).is_some());
        // Builtins are registered under their own names as well
        assert!(registry.lookup(interner.intern("stringify")).is_some());
        assert_eq!(registry.rewrites().len(), 1);
        assert_eq!(registry.rewrites()[0].name, "add-zero");
    }

    #[test]
    fn test_loaded_macro_expands() {
        use ql_expand::Expander;
        use ql_span::FileId;

        let interner = Interner::new();
        let registry = load_str(MANIFEST, &interner).unwrap();
        let source = "double!(5 + 1) + 0";
        let unit = ql_parser::parse_unit(source, &interner).unwrap();
        let expander = Expander::new(&registry, &interner, FileId::new(0), source);
        let expansion = expander.expand_unit(&unit).unwrap();
        let expected = ql_parser::parse_unit("(5 + 1) * 2", &interner).unwrap();
        assert!(expansion.tree.structurally_equals(&expected));
        assert_eq!(expansion.macro_expansions, 1);
        assert_eq!(expansion.rewrite_applications, 1);
    }

    #[test]
    fn test_from_file_round_trip() {
        let interner = Interner::new();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MANIFEST.as_bytes()).unwrap();
        let registry = load_file(file.path(), &interner).unwrap();
        assert!(registry.lookup(interner.intern("double")).is_some());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let interner = Interner::new();
        let error = load_file(Path::new("/nonexistent/quill-macros.toml"), &interner).unwrap_err();
        assert!(matches!(error, RegistryError::Io { .. }));
    }

    #[test]
    fn test_unknown_builtin_rejected() {
        let interner = Interner::new();
        let text = "[[macros]]\nname = \"x\"\nbuiltin = \"frobnicate\"\n";
        assert!(matches!(
            load_str(text, &interner).unwrap_err(),
            RegistryError::UnknownBuiltin { .. }
        ));
    }

    #[test]
    fn test_shadowing_a_builtin_rejected() {
        let interner = Interner::new();
        let text = "[[macros]]\nname = \"stringify\"\nbuiltin = \"concat\"\n";
        assert!(matches!(
            load_str(text, &interner).unwrap_err(),
            RegistryError::Duplicate { .. }
        ));
    }

    #[test]
    fn test_entry_without_implementation_rejected() {
        let interner = Interner::new();
        let text = "[[macros]]\nname = \"empty\"\n";
        assert!(matches!(
            load_str(text, &interner).unwrap_err(),
            RegistryError::MissingImplementation { .. }
        ));
    }

    #[test]
    fn test_unknown_class_rejected() {
        let interner = Interner::new();
        let text = r#"
[[rewrites]]
name = "bad"
pattern = "$x"
template = "$x"
placeholders = [{ name = "x", class = "statement" }]
"#;
        assert!(matches!(
            load_str(text, &interner).unwrap_err(),
            RegistryError::UnknownClass { .. }
        ));
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let interner = Interner::new();
        let text = r#"
[[rewrites]]
name = "bad"
pattern = "$a + $b"
template = "$a"
placeholders = [{ name = "a", class = "expr" }, { name = "b", class = "expr" }]
operators = { "+" = ["+", "**"] }
"#;
        assert!(matches!(
            load_str(text, &interner).unwrap_err(),
            RegistryError::UnknownOperator { .. }
        ));
    }

    #[test]
    fn test_unbound_template_placeholder_rejected() {
        let interner = Interner::new();
        let text = r#"
[[rewrites]]
name = "bad"
pattern = "$x"
template = "$y"
placeholders = [{ name = "x", class = "expr" }]
"#;
        assert!(matches!(
            load_str(text, &interner).unwrap_err(),
            RegistryError::UnboundTemplatePlaceholder { .. }
        ));
    }

    #[test]
    fn test_ambiguous_pattern_rejected_at_load() {
        let interner = Interner::new();
        let text = r#"
[[rewrites]]
name = "bad"
pattern = "$x + $x"
template = "$x"
placeholders = [{ name = "x", class = "expr" }]
"#;
        assert!(matches!(
            load_str(text, &interner).unwrap_err(),
            RegistryError::Pattern { .. }
        ));
    }

    #[test]
    fn test_malformed_pattern_rejected_at_load() {
        let interner = Interner::new();
        let text = r#"
[[rewrites]]
name = "bad"
pattern = "1 +"
template = "1"
"#;
        assert!(matches!(
            load_str(text, &interner).unwrap_err(),
            RegistryError::Parse { .. }
        ));
    }
}
