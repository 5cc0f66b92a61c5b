use camino::Utf8PathBuf;
use serde::Serialize;

use crate::codes::{ActivityHasher, CodeGenerator};
use crate::config::{DEFAULT_LOCATION, ResolvedConfig};
use crate::diagnostics::{CountingSink, DiagnosticsSink};
use crate::domain::{Dataset, ParsedDataset, Row};
use crate::error::ImportError;
use crate::extract::{ParseContext, parse_block};
use crate::format::{project_name, segment, verify_format};
use crate::link::{BackgroundIndex, ForegroundIndex, Linker};
use crate::rows::read_rows;
use crate::store::{Collection, DatasetStore, Registration};
use crate::units::{DefaultUnits, UnitCanonicalizer};

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub filepath: Utf8PathBuf,
    pub delimiter: u8,
    pub depends: Vec<String>,
    pub overwrite: bool,
    pub name: Option<String>,
    pub default_location: String,
}

impl ImportOptions {
    pub fn new(filepath: impl Into<Utf8PathBuf>) -> Self {
        Self {
            filepath: filepath.into(),
            delimiter: b'\t',
            depends: Vec::new(),
            overwrite: false,
            name: None,
            default_location: DEFAULT_LOCATION.to_string(),
        }
    }

    pub fn from_config(filepath: impl Into<Utf8PathBuf>, config: &ResolvedConfig) -> Self {
        Self {
            filepath: filepath.into(),
            delimiter: config.delimiter,
            depends: config.depends.clone(),
            overwrite: config.overwrite,
            name: config.name.clone(),
            default_location: config.default_location.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportResult {
    pub name: String,
    pub log_path: Option<String>,
    pub format: String,
    pub datasets: usize,
    pub exchanges: usize,
    pub depends: Vec<String>,
    pub overwritten: bool,
    pub warnings: usize,
}

/// Runs the SimaPro import pipeline and commits the linked collection to a store.
pub struct Importer<S, U = DefaultUnits, C = ActivityHasher>
where
    S: DatasetStore,
    U: UnitCanonicalizer,
    C: CodeGenerator,
{
    store: S,
    units: U,
    codes: C,
}

impl<S: DatasetStore> Importer<S> {
    pub fn with_store(store: S) -> Self {
        Self::new(store, DefaultUnits::new(), ActivityHasher)
    }
}

impl<S: DatasetStore, U: UnitCanonicalizer, C: CodeGenerator> Importer<S, U, C> {
    pub fn new(store: S, units: U, codes: C) -> Self {
        Self {
            store,
            units,
            codes,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Imports one export file. Nothing is written to the store unless every block
    /// parses and every exchange links.
    pub fn import(
        &self,
        options: &ImportOptions,
        sink: &dyn DiagnosticsSink,
    ) -> Result<ImportResult, ImportError> {
        let sink = CountingSink::new(sink);
        let result = self.run(options, &sink);
        if let Err(err) = &result {
            sink.error(&format!("Import failed: {err}"));
        }
        result.map(|mut summary| {
            summary.warnings = sink.warnings();
            summary
        })
    }

    fn run(
        &self,
        options: &ImportOptions,
        sink: &dyn DiagnosticsSink,
    ) -> Result<ImportResult, ImportError> {
        sink.info(&introduction(options));

        let rows = read_rows(&options.filepath, options.delimiter)?;
        let format = verify_format(&rows)?.to_string();
        let name = match &options.name {
            Some(name) => name.clone(),
            None => project_name(&rows)?,
        };

        let parsed = self.parse(&rows, &name, &options.default_location, sink)?;
        let foreground = ForegroundIndex::build(&parsed);
        for collision in foreground.collisions() {
            sink.warn(&format!(
                "Duplicate foreground dataset '{}' ({}): {} replaces {}",
                collision.name, collision.unit, collision.kept, collision.replaced
            ));
        }
        let background = self.load_background(&options.depends, sink)?;

        let linker = Linker::new(&foreground, &background, &options.default_location);
        let datasets = match linker.link_all(parsed) {
            Ok(datasets) => datasets,
            Err(err) => {
                if let ImportError::UnlinkedExchange { missing } = &err {
                    for miss in missing {
                        sink.error(&format!("Can't find exchange: {miss}"));
                    }
                }
                return Err(err);
            }
        };

        let exchanges = datasets.iter().map(|ds| ds.exchanges.len()).sum();
        let count = datasets.len();
        let overwritten = self.commit(&name, &format, options, datasets, sink)?;

        Ok(ImportResult {
            name,
            log_path: sink.log_path().map(|path| path.to_string()),
            format,
            datasets: count,
            exchanges,
            depends: options.depends.clone(),
            overwritten,
            warnings: 0,
        })
    }

    fn parse(
        &self,
        rows: &[Row],
        name: &str,
        default_location: &str,
        sink: &dyn DiagnosticsSink,
    ) -> Result<Vec<ParsedDataset>, ImportError> {
        let blocks = segment(rows);
        sink.info(&format!("Found {} datasets", blocks.len()));
        if blocks.is_empty() {
            sink.warn("No `Process` sections found; importing an empty collection");
        }

        let ctx = ParseContext {
            database: name,
            default_location,
            units: &self.units,
            codes: &self.codes,
            sink,
        };
        blocks.iter().map(|block| parse_block(block, &ctx)).collect()
    }

    fn load_background(
        &self,
        depends: &[String],
        sink: &dyn DiagnosticsSink,
    ) -> Result<BackgroundIndex, ImportError> {
        let mut loaded = Vec::with_capacity(depends.len());
        for name in depends {
            if !self.store.exists(name)? {
                return Err(ImportError::MissingDependency(name.clone()));
            }
            let records = self.store.load(name)?;
            sink.info(&format!(
                "Loaded {} background datasets from '{name}'",
                records.len()
            ));
            loaded.push(records);
        }
        Ok(BackgroundIndex::build(
            loaded.iter().flat_map(|records| records.iter()),
        ))
    }

    /// Returns whether an existing collection was replaced. A collection registered by
    /// this call is deleted again if writing or processing it fails.
    fn commit(
        &self,
        name: &str,
        format: &str,
        options: &ImportOptions,
        datasets: Vec<Dataset>,
        sink: &dyn DiagnosticsSink,
    ) -> Result<bool, ImportError> {
        let exists = self.store.exists(name)?;
        if exists && !options.overwrite {
            return Err(ImportError::DuplicateImport(name.to_string()));
        }
        if exists {
            sink.warn(&format!("Overwriting database {name}"));
        } else {
            self.store.register(
                name,
                Registration {
                    format: format.to_string(),
                    depends: options.depends.clone(),
                    number: datasets.len(),
                },
            )?;
        }

        let collection: Collection = datasets
            .into_iter()
            .map(|ds| (ds.code.code().to_string(), ds))
            .collect();
        let written = self
            .store
            .write(name, &collection)
            .and_then(|()| self.store.process(name));
        if let Err(err) = written {
            if !exists {
                if let Err(cleanup) = self.store.delete(name) {
                    sink.error(&format!(
                        "Failed to remove partially written database {name}: {cleanup}"
                    ));
                }
            }
            return Err(err);
        }
        sink.info(&format!(
            "Wrote {} datasets to database {name}",
            collection.len()
        ));
        Ok(exists)
    }
}

fn introduction(options: &ImportOptions) -> String {
    format!(
        "Starting SimaPro import:\n\tFilepath: {}\n\tDelimiter: {:?}\n\tDepends: {}\n\tName: {}\n\tDefault geo: {}",
        options.filepath,
        options.delimiter as char,
        options.depends.join(", "),
        options.name.as_deref().unwrap_or("(from project)"),
        options.default_location,
    )
}
