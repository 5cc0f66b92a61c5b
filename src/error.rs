use std::path::PathBuf;

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

use crate::link::MissingLink;

#[derive(Debug, Error, Diagnostic)]
pub enum ImportError {
    #[error("input file not found: {0}")]
    InputNotFound(Utf8PathBuf),

    #[error("failed to read input: {0}")]
    InputRead(String),

    #[error("not a recognized SimaPro export: {0}")]
    Format(String),

    #[error("can't determine SimaPro project name; pass a name or add a `Project` row")]
    MissingProjectName,

    #[error("line {line}: process block starting here has no `Products` section")]
    MissingProducts { line: usize },

    #[error("line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("line {line}: can't import multi-output dataset '{name}'")]
    MultiOutputUnsupported { line: usize, name: String },

    #[error("line {line}: invalid amount `{value}`")]
    NumericParse { line: usize, value: String },

    #[error("dependency collection not found: {0}")]
    MissingDependency(String),

    #[error("{} exchange(s) could not be linked; first: {}", .missing.len(), first_missing(.missing))]
    UnlinkedExchange { missing: Vec<MissingLink> },

    #[error(
        "collection already imported: {0}; delete it, give a new name, or use overwrite"
    )]
    DuplicateImport(String),

    #[error("invalid delimiter: {0}")]
    InvalidDelimiter(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("store error: {0}")]
    Store(String),
}

fn first_missing(missing: &[MissingLink]) -> String {
    missing
        .first()
        .map(ToString::to_string)
        .unwrap_or_else(|| "none".to_string())
}
