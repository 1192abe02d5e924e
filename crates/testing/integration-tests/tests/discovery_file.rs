//! Discovery-file tests against the real filesystem

use indexmap::IndexMap;
use integration_tests::TestFixture;
use ql_driver::CompileOptions;
use ql_expand::{MacroDef, MacroKind, MacroRegistry, MacroRule};
use ql_intern::Interner;
use ql_pattern::{Constraint, Pattern, PatternOptions, TokenClass};
use ql_span::Span;
use ql_syntax::{NodeKind, SyntaxNode};
use ql_vfs::SourceMap;
use std::io::Write as _;

const MANIFEST: &str = r#"
[[macros]]
name = "double"

[[macros.rules]]
args = ["$x"]
template = "$x * 2"
placeholders = [{ name = "x", class = "expr" }]
"#;

#[test]
fn test_registry_loads_from_disk_and_compiles_disk_units() {
    let dir = tempfile::tempdir().unwrap();

    let manifest_path = dir.path().join("quill-macros.toml");
    std::fs::File::create(&manifest_path)
        .unwrap()
        .write_all(MANIFEST.as_bytes())
        .unwrap();

    let unit_path = dir.path().join("main.ql");
    std::fs::File::create(&unit_path)
        .unwrap()
        .write_all(b"double!(20 + 1)\n")
        .unwrap();

    let interner = Interner::new();
    let registry = ql_registry::load_file(&manifest_path, &interner).unwrap();

    let sources = SourceMap::new();
    let collected = ql_driver::collect_source_files(dir.path()).unwrap();
    assert_eq!(collected, vec![unit_path]);
    let files: Vec<_> = collected
        .iter()
        .map(|path| sources.register_path(path).unwrap())
        .collect();

    let reports = ql_driver::compile_units(
        &sources,
        &files,
        &registry,
        &interner,
        &CompileOptions::default(),
    );
    assert_eq!(reports.len(), 1);
    let unit = reports[0].result.as_ref().unwrap();
    assert_eq!(unit.output, "(20 + 1) * 2\n");
}

/// A registry loaded from TOML expands exactly like the equivalent
/// programmatic registration
#[test]
fn test_file_and_programmatic_registration_agree() {
    let source = "double!(f(4))";

    let mut from_file = TestFixture::with_manifest(MANIFEST).unwrap();
    let file_output = from_file.expand_source(source).unwrap();

    let interner = Interner::new();
    let mut registry = MacroRegistry::with_builtins(&interner);
    let name = interner.intern("double");
    let arg = ql_parser::parse_expression("$x", &interner).unwrap();
    let call_node = SyntaxNode::new(
        NodeKind::MacroCall {
            name,
            args: vec![arg],
        },
        Span::synthesized(),
    );
    let mut placeholders = IndexMap::new();
    placeholders.insert(interner.intern("x"), Constraint::of(TokenClass::Expr));
    let options = PatternOptions {
        placeholders,
        operator_classes: rustc_hash::FxHashMap::default(),
    };
    let pattern = Pattern::build(&call_node, &options, &interner).unwrap();
    let template = ql_parser::parse_expression("$x * 2", &interner).unwrap();
    registry
        .register(MacroDef {
            name,
            kind: MacroKind::Rules(vec![MacroRule { pattern, template }]),
        })
        .unwrap();

    let mut programmatic = TestFixture::new();
    programmatic.interner = interner;
    programmatic.registry = registry;
    let programmatic_output = programmatic.expand_source(source).unwrap();

    assert_eq!(file_output, programmatic_output);
    assert_eq!(file_output, "f(4) * 2\n");
}
