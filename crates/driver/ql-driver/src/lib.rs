//! Compilation driver
//!
//! Orchestrates the per-unit pipeline: load → parse → expand → print.
//! Independent units compile on parallel workers; each unit's tree is
//! exclusively owned by its worker, and the only shared state is the
//! read-only macro registry, the interner, and the source map. One unit's
//! failure lands in its own report and never aborts its siblings.

use anyhow::Result;
use ql_expand::{ExpandOptions, Expander, Expansion, ExpansionError, MacroRegistry};
use ql_intern::Interner;
use ql_parser::ParseError;
use ql_span::FileId;
use ql_vfs::SourceMap;
use std::path::{Path, PathBuf};
use std::thread;

/// File extension of quill source units
pub const SOURCE_EXTENSION: &str = "ql";

/// Driver configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    /// Expansion limits
    pub expand: ExpandOptions,
    /// Worker count; defaults to the available parallelism
    pub jobs: Option<usize>,
}

/// Why one unit failed
#[derive(Debug, thiserror::Error)]
pub enum UnitError {
    /// Unit contents could not be loaded
    #[error("failed to load unit: {message}")]
    Load {
        /// Underlying error rendering
        message: String,
    },
    /// Unit does not parse
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Macro expansion failed
    #[error(transparent)]
    Expand(#[from] ExpansionError),
    /// The worker compiling this unit panicked
    #[error("worker compiling this unit panicked")]
    Worker,
}

/// Successful result for one unit
#[derive(Debug)]
pub struct CompiledUnit {
    /// Expansion result, finalized
    pub expansion: Expansion,
    /// Pretty-printed expanded source
    pub output: String,
}

/// Per-unit outcome, one per requested file, in request order
pub struct UnitReport {
    /// Unit ID
    pub file: FileId,
    /// Display name for diagnostics
    pub name: String,
    /// Compiled unit, or why it failed
    pub result: Result<CompiledUnit, UnitError>,
}

/// Compiles the given units in parallel
///
/// Reports come back in request order regardless of scheduling. Sibling
/// units always get a report, even when another unit fails.
pub fn compile_units(
    sources: &SourceMap,
    files: &[FileId],
    registry: &MacroRegistry,
    interner: &Interner,
    options: &CompileOptions,
) -> Vec<UnitReport> {
    if files.is_empty() {
        return Vec::new();
    }

    let worker_count = options
        .jobs
        .unwrap_or_else(|| {
            thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(1)
        })
        .clamp(1, files.len());
    let chunk_size = files.len().div_ceil(worker_count);

    let mut reports = Vec::with_capacity(files.len());
    thread::scope(|scope| {
        let handles: Vec<_> = files
            .chunks(chunk_size)
            .map(|chunk| {
                let handle = scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|&file| {
                            compile_unit(sources, file, registry, interner, &options.expand)
                        })
                        .collect::<Vec<_>>()
                });
                (handle, chunk)
            })
            .collect();

        for (handle, chunk) in handles {
            match handle.join() {
                Ok(mut chunk_reports) => reports.append(&mut chunk_reports),
                Err(_) => {
                    for &file in chunk {
                        let name = sources
                            .name(file)
                            .unwrap_or_else(|_| format!("<unit {}>", file.0));
                        reports.push(UnitReport {
                            file,
                            name,
                            result: Err(UnitError::Worker),
                        });
                    }
                }
            }
        }
    });
    reports
}

/// Compiles a single unit through the whole pipeline
pub fn compile_unit(
    sources: &SourceMap,
    file: FileId,
    registry: &MacroRegistry,
    interner: &Interner,
    options: &ExpandOptions,
) -> UnitReport {
    let name = sources
        .name(file)
        .unwrap_or_else(|_| format!("<unit {}>", file.0));

    let source = match sources.contents(file) {
        Ok(source) => source,
        Err(err) => {
            return UnitReport {
                file,
                name,
                result: Err(UnitError::Load {
                    message: err.to_string(),
                }),
            };
        }
    };

    let unit = match ql_parser::parse_unit(&source, interner) {
        Ok(unit) => unit,
        Err(err) => {
            let err = err.with_source(name.clone(), source);
            return UnitReport {
                file,
                name,
                result: Err(UnitError::Parse(err)),
            };
        }
    };

    let expander = Expander::with_options(registry, interner, file, &source, *options);
    let result = match expander.expand_unit(&unit) {
        Ok(expansion) => {
            let output = ql_syntax::format_unit(&expansion.tree, interner);
            Ok(CompiledUnit { expansion, output })
        }
        Err(err) => Err(UnitError::Expand(err)),
    };

    UnitReport { file, name, result }
}

/// Finds the source units under `path`: the file itself, or every
/// `.ql` file directly inside the directory, sorted by name
///
/// # Errors
///
/// Returns an error if the directory cannot be read
pub fn collect_source_files(path: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if path.is_file() {
        files.push(path.to_path_buf());
    } else if path.is_dir() {
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let file_path = entry.path();
            if file_path
                .extension()
                .is_some_and(|ext| ext == SOURCE_EXTENSION)
            {
                files.push(file_path);
            }
        }
        files.sort();
    }
    Ok(files)
}
