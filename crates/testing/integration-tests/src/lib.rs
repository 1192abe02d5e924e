//! Integration test utilities for the quill engine

use anyhow::Result;
use ql_driver::{CompileOptions, UnitReport};
use ql_expand::MacroRegistry;
use ql_intern::Interner;
use ql_span::FileId;
use ql_vfs::SourceMap;

/// Test fixture: an interner, a registry, and a set of in-memory units
pub struct TestFixture {
    /// Shared interner
    pub interner: Interner,
    /// Macro registry the units compile against
    pub registry: MacroRegistry,
    /// Unit store
    pub sources: SourceMap,
    /// Registered units, in registration order
    pub files: Vec<FileId>,
    /// Driver options
    pub options: CompileOptions,
}

impl TestFixture {
    /// Creates a fixture with just the builtin macros registered
    #[must_use]
    pub fn new() -> Self {
        let interner = Interner::new();
        let registry = MacroRegistry::with_builtins(&interner);
        Self {
            interner,
            registry,
            sources: SourceMap::new(),
            files: Vec::new(),
            options: CompileOptions::default(),
        }
    }

    /// Creates a fixture whose registry is loaded from discovery-file text
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest fails to parse or validate
    pub fn with_manifest(manifest: &str) -> Result<Self> {
        let interner = Interner::new();
        let registry = ql_registry::load_str(manifest, &interner)?;
        Ok(Self {
            interner,
            registry,
            sources: SourceMap::new(),
            files: Vec::new(),
            options: CompileOptions::default(),
        })
    }

    /// Adds an in-memory unit to the fixture
    ///
    /// # Errors
    ///
    /// Returns an error if unit registration fails
    pub fn add_unit(&mut self, name: &str, contents: &str) -> Result<FileId> {
        let file = self.sources.add_memory_unit(name, contents.to_string())?;
        self.files.push(file);
        Ok(file)
    }

    /// Compiles every registered unit
    #[must_use]
    pub fn compile(&self) -> Vec<UnitReport> {
        ql_driver::compile_units(
            &self.sources,
            &self.files,
            &self.registry,
            &self.interner,
            &self.options,
        )
    }

    /// Compiles a single source text and returns the expanded output
    ///
    /// # Errors
    ///
    /// Returns an error if the unit fails to compile
    pub fn expand_source(&mut self, source: &str) -> Result<String> {
        let file = self.add_unit("<expand>", source)?;
        let reports = self.compile();
        let report = reports
            .into_iter()
            .find(|report| report.file == file)
            .ok_or_else(|| anyhow::anyhow!("no report for unit"))?;
        match report.result {
            Ok(unit) => Ok(unit.output),
            Err(err) => Err(anyhow::anyhow!("{err}")),
        }
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
