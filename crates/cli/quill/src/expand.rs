//! Expand command implementation

use crate::compiler;
use anyhow::Result;
use colored::Colorize;
use std::path::Path;

pub fn expand(
    path: &Path,
    macros: Option<&Path>,
    max_depth: usize,
    jobs: Option<usize>,
    emit: &str,
) -> Result<()> {
    if emit != "source" && emit != "ast" {
        anyhow::bail!("unknown emit mode `{emit}`, expected `source` or `ast`");
    }

    let session = compiler::prepare(path, macros, max_depth, jobs)?;
    let reports = ql_driver::compile_units(
        &session.sources,
        &session.files,
        &session.registry,
        &session.interner,
        &session.options,
    );

    let multiple = reports.len() > 1;
    let mut total_errors = 0;
    for report in &reports {
        match &report.result {
            Ok(unit) => {
                if multiple {
                    println!("{} {}", "//".dimmed(), report.name.bold());
                }
                if emit == "ast" {
                    println!("{:#?}", unit.expansion.tree);
                } else {
                    print!("{}", unit.output);
                }
                if multiple {
                    println!();
                }
            }
            Err(_) => {
                total_errors += 1;
                compiler::report_failure(&session.sources, report);
            }
        }
    }

    if total_errors > 0 {
        anyhow::bail!("expansion failed for {total_errors} unit(s)");
    }
    Ok(())
}
