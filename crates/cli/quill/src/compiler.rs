//! Shared setup and diagnostic rendering for the CLI commands

use anyhow::Result;
use colored::Colorize;
use ql_driver::{CompileOptions, UnitError, UnitReport};
use ql_expand::{ExpandOptions, MacroRegistry};
use ql_intern::Interner;
use ql_span::LineIndex;
use ql_vfs::SourceMap;
use std::path::{Path, PathBuf};

/// Everything a command needs to compile the units under a path
pub struct Session {
    pub interner: Interner,
    pub registry: MacroRegistry,
    pub sources: SourceMap,
    pub files: Vec<ql_span::FileId>,
    pub options: CompileOptions,
}

/// Resolves inputs, loads the discovery file, and registers the units
pub fn prepare(
    path: &Path,
    macros: Option<&Path>,
    max_depth: usize,
    jobs: Option<usize>,
) -> Result<Session> {
    let interner = Interner::new();
    let registry = load_registry(path, macros, &interner)?;

    let file_paths = ql_driver::collect_source_files(path)?;
    if file_paths.is_empty() {
        anyhow::bail!("no source files found in {:?}", path);
    }

    let sources = SourceMap::new();
    let files = file_paths
        .iter()
        .map(|file_path| sources.register_path(file_path))
        .collect::<Result<Vec<_>>>()?;

    Ok(Session {
        interner,
        registry,
        sources,
        files,
        options: CompileOptions {
            expand: ExpandOptions { max_depth },
            jobs,
        },
    })
}

/// Loads the discovery file once at startup
///
/// An explicit `--macros` path must exist; the default path is used only
/// when present, otherwise just the builtins are registered.
pub fn load_registry(
    input: &Path,
    macros: Option<&Path>,
    interner: &Interner,
) -> Result<MacroRegistry> {
    if let Some(path) = macros {
        return Ok(ql_registry::load_file(path, interner)?);
    }
    let default_path = default_discovery_path(input);
    if default_path.is_file() {
        return Ok(ql_registry::load_file(&default_path, interner)?);
    }
    Ok(MacroRegistry::with_builtins(interner))
}

fn default_discovery_path(input: &Path) -> PathBuf {
    let dir = if input.is_dir() {
        input
    } else {
        input.parent().unwrap_or(Path::new("."))
    };
    dir.join(ql_registry::DEFAULT_MANIFEST_NAME)
}

/// Prints one unit's failure to stderr
pub fn report_failure(sources: &SourceMap, report: &UnitReport) {
    let Err(error) = &report.result else {
        return;
    };
    match error {
        UnitError::Parse(parse_error) => emit_parse_error(report, parse_error),
        UnitError::Expand(expand_error) => {
            let location = sources
                .contents(report.file)
                .map(|source| {
                    let position = LineIndex::new(&source).line_col(expand_error.span().start);
                    format!("{}:{}", report.name, position)
                })
                .unwrap_or_else(|_| report.name.clone());
            eprintln!("{} {expand_error}", "error:".red().bold());
            eprintln!("  {} {location}", "-->".blue().bold());
        }
        other => {
            eprintln!("{} {}: {other}", "error:".red().bold(), report.name);
        }
    }
}

/// Renders a parse error in rustc style via codespan
fn emit_parse_error(report: &UnitReport, error: &ql_parser::ParseError) {
    use ql_parser::error::codespan_reporting::files::SimpleFiles;
    use ql_parser::error::codespan_reporting::term;

    // The parser attached the source text to the error; fall back to a
    // plain message when it is absent
    let Some(source) = parse_error_source(error) else {
        eprintln!("{} {}: {error}", "error:".red().bold(), report.name);
        return;
    };

    let mut files = SimpleFiles::new();
    let file_id = files.add(report.name.clone(), source.to_string());
    let diagnostic = error.to_codespan_diagnostic(file_id);

    let mut buffer = Vec::new();
    let config = term::Config::default();
    #[allow(deprecated)]
    let emitted = term::emit(&mut buffer, &config, &files, &diagnostic);
    if emitted.is_ok() {
        eprint!("{}", String::from_utf8_lossy(&buffer));
    } else {
        eprintln!("{} {}: {error}", "error:".red().bold(), report.name);
    }
}

fn parse_error_source(error: &ql_parser::ParseError) -> Option<&str> {
    use ql_parser::ParseError;

    match error {
        ParseError::UnexpectedToken { src, .. }
        | ParseError::MissingToken { src, .. }
        | ParseError::UnclosedDelimiter { src, .. }
        | ParseError::InvalidSyntax { src, .. } => Some(src.inner().as_str()),
        ParseError::ParseFailed { .. } => None,
    }
}
