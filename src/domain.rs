use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One delimited line of the export. Zero fields means a blank separator line.
pub type Row = Vec<String>;

/// Uncertainty type written on every linked exchange. Uncertainty data is not imported.
pub const NO_UNCERTAINTY: u8 = 0;

/// Globally unique dataset reference: `(database name, code)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatasetKey(pub String, pub String);

impl DatasetKey {
    pub fn new(database: impl Into<String>, code: impl Into<String>) -> Self {
        Self(database.into(), code.into())
    }

    pub fn database(&self) -> &str {
        &self.0
    }

    pub fn code(&self) -> &str {
        &self.1
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

/// Attributes that determine a dataset's code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetIdentity {
    pub name: String,
    pub unit: String,
    pub location: String,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    List(Vec<String>),
}

impl MetadataValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(value) => Some(value),
            MetadataValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            MetadataValue::Text(_) => None,
            MetadataValue::List(values) => Some(values),
        }
    }
}

pub type Metadata = BTreeMap<String, MetadataValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    Production,
    Technosphere,
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeKind::Production => write!(f, "production"),
            ExchangeKind::Technosphere => write!(f, "technosphere"),
        }
    }
}

/// Exchange row as read from the export, before linking.
#[derive(Debug, Clone, PartialEq)]
pub struct RawExchange {
    pub name: String,
    pub amount: f64,
    pub unit: String,
    /// Unparsed uncertainty column.
    pub uncertainty: String,
    pub category: String,
    /// `None` when the name carried no geography suffix.
    pub location: Option<String>,
    /// 1-based line in the input file.
    pub line: usize,
}

/// Linked exchange with a concrete input reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub input: DatasetKey,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: ExchangeKind,
    #[serde(rename = "uncertainty type")]
    pub uncertainty_type: u8,
    pub name: String,
    pub unit: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncertainty: Option<String>,
}

/// Block parsed structurally; technosphere exchanges are not linked yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDataset {
    pub name: String,
    pub unit: String,
    pub location: String,
    pub categories: Vec<String>,
    pub code: DatasetKey,
    pub metadata: Metadata,
    pub production: Exchange,
    pub exchanges: Vec<RawExchange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub unit: String,
    pub location: String,
    pub categories: Vec<String>,
    pub code: DatasetKey,
    #[serde(rename = "simapro metadata", default)]
    pub metadata: Metadata,
    pub exchanges: Vec<Exchange>,
}

impl Dataset {
    pub fn production(&self) -> impl Iterator<Item = &Exchange> {
        self.exchanges
            .iter()
            .filter(|exc| exc.kind == ExchangeKind::Production)
    }

    pub fn technosphere(&self) -> impl Iterator<Item = &Exchange> {
        self.exchanges
            .iter()
            .filter(|exc| exc.kind == ExchangeKind::Technosphere)
    }
}

/// Minimal view of a stored dataset, enough to resolve references against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub name: String,
    pub unit: String,
    #[serde(default)]
    pub location: String,
}
