//! Quill CLI
//!
//! Main entry point for the quill macro expansion toolchain

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod check;
mod compiler;
mod expand;
mod macros;

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Quill macro expansion toolchain", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand macros in a unit or directory and print the result
    Expand {
        /// Path to a source unit or a directory of units
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Macro discovery file (defaults to quill-macros.toml next to the input)
        #[arg(long)]
        macros: Option<PathBuf>,

        /// Maximum nested expansion depth and rewrite pass count
        #[arg(long, default_value_t = ql_expand::DEFAULT_MAX_DEPTH)]
        max_depth: usize,

        /// Worker threads (defaults to available parallelism)
        #[arg(long)]
        jobs: Option<usize>,

        /// What to emit (source or ast)
        #[arg(long, default_value = "source")]
        emit: String,
    },

    /// Check units for parse and expansion errors
    Check {
        /// Path to a source unit or a directory of units
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Macro discovery file (defaults to quill-macros.toml next to the input)
        #[arg(long)]
        macros: Option<PathBuf>,

        /// Maximum nested expansion depth and rewrite pass count
        #[arg(long, default_value_t = ql_expand::DEFAULT_MAX_DEPTH)]
        max_depth: usize,

        /// Worker threads (defaults to available parallelism)
        #[arg(long)]
        jobs: Option<usize>,
    },

    /// List the registered macros and rewrite rules
    Macros {
        /// Path the default discovery file is resolved against
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Macro discovery file (defaults to quill-macros.toml next to the input)
        #[arg(long)]
        macros: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Expand {
            path,
            macros,
            max_depth,
            jobs,
            emit,
        } => {
            expand::expand(&path, macros.as_deref(), max_depth, jobs, &emit)?;
        }
        Commands::Check {
            path,
            macros,
            max_depth,
            jobs,
        } => {
            check::check(&path, macros.as_deref(), max_depth, jobs)?;
        }
        Commands::Macros { path, macros } => {
            macros::list(&path, macros.as_deref())?;
        }
    }

    Ok(())
}
