//! Macros command implementation: list the registry contents

use crate::compiler;
use anyhow::Result;
use colored::Colorize;
use ql_expand::MacroKind;
use ql_intern::Interner;
use std::path::Path;

pub fn list(path: &Path, macros: Option<&Path>) -> Result<()> {
    let interner = Interner::new();
    let registry = compiler::load_registry(path, macros, &interner)?;

    println!("{}", "Macros:".bold());
    for def in registry.macros() {
        let name = interner.resolve(def.name);
        match &def.kind {
            MacroKind::Builtin(builtin) => {
                println!("  {name}! {}", format!("(builtin {})", builtin.keyword()).dimmed());
            }
            MacroKind::Rules(rules) => {
                println!("  {name}! {}", format!("({} rule(s))", rules.len()).dimmed());
            }
            MacroKind::External(_) => {
                println!("  {name}! {}", "(external)".dimmed());
            }
        }
    }

    if !registry.rewrites().is_empty() {
        println!("{}", "Rewrites:".bold());
        for rule in registry.rewrites() {
            println!("  {}", rule.name);
        }
    }

    Ok(())
}
