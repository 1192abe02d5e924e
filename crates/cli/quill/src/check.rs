//! Check command implementation

use crate::compiler;
use anyhow::Result;
use colored::Colorize;
use std::path::Path;

pub fn check(path: &Path, macros: Option<&Path>, max_depth: usize, jobs: Option<usize>) -> Result<()> {
    println!("{} units at {:?}", "Checking".green().bold(), path);

    let session = compiler::prepare(path, macros, max_depth, jobs)?;
    println!(
        "  {} {} unit(s), {} macro(s) registered",
        "Found:".bold(),
        session.files.len(),
        session.registry.len()
    );

    let reports = ql_driver::compile_units(
        &session.sources,
        &session.files,
        &session.registry,
        &session.interner,
        &session.options,
    );

    let mut total_errors = 0;
    for report in &reports {
        match &report.result {
            Ok(unit) => {
                println!(
                    "  {} {} ({} expansion(s), {} rewrite(s))",
                    "✓".green(),
                    report.name,
                    unit.expansion.macro_expansions,
                    unit.expansion.rewrite_applications
                );
            }
            Err(_) => {
                total_errors += 1;
                println!("  {} {}", "✗".red(), report.name);
                compiler::report_failure(&session.sources, report);
            }
        }
    }

    println!();
    if total_errors == 0 {
        println!("{} no errors found", "Success:".green().bold());
        Ok(())
    } else {
        anyhow::bail!("check failed with {total_errors} error(s)")
    }
}
