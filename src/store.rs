use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Local;
use directories::BaseDirs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{ActivityRecord, Dataset, DatasetKey, ExchangeKind};
use crate::error::ImportError;

/// Collections keyed by dataset code, as handed to [`DatasetStore::write`].
pub type Collection = BTreeMap<String, Dataset>;

/// Provenance recorded on first import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub format: String,
    pub depends: Vec<String>,
    pub number: usize,
}

/// External dataset store the importer commits to.
pub trait DatasetStore {
    fn exists(&self, name: &str) -> Result<bool, ImportError>;
    /// Reference view of a collection. Missing collections are `MissingDependency`.
    fn load(&self, name: &str) -> Result<BTreeMap<DatasetKey, ActivityRecord>, ImportError>;
    fn register(&self, name: &str, registration: Registration) -> Result<(), ImportError>;
    fn write(&self, name: &str, datasets: &Collection) -> Result<(), ImportError>;
    fn process(&self, name: &str) -> Result<(), ImportError>;
    /// Removes every trace of a collection. Missing collections are not an error.
    fn delete(&self, name: &str) -> Result<(), ImportError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionMetadata {
    pub format: String,
    pub depends: Vec<String>,
    pub number: usize,
    pub registered_at: String,
    #[serde(default)]
    pub modified_at: Option<String>,
    #[serde(default)]
    pub processed_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedEdge {
    pub input: DatasetKey,
    pub output: DatasetKey,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: ExchangeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedCollection {
    pub name: String,
    pub processed_at: String,
    pub activities: Vec<DatasetKey>,
    pub edges: Vec<ProcessedEdge>,
}

/// JSON files under one root directory.
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: Utf8PathBuf,
}

impl JsonStore {
    pub fn new() -> Result<Self, ImportError> {
        if let Ok(home) = std::env::var("LCI_IMPORTER_HOME") {
            if !home.trim().is_empty() {
                return Ok(Self::new_with_root(Utf8PathBuf::from(home.trim())));
            }
        }
        let root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.data_dir().join("lci-importer")).ok()
            })
            .ok_or_else(|| {
                ImportError::Filesystem("unable to resolve store directory".to_string())
            })?;
        Ok(Self::new_with_root(root))
    }

    pub fn new_with_root(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn registry_path(&self) -> Utf8PathBuf {
        self.root.join("registry.json")
    }

    pub fn collection_path(&self, name: &str) -> Utf8PathBuf {
        self.root
            .join("collections")
            .join(format!("{}.json", safe_filename(name)))
    }

    pub fn processed_path(&self, name: &str) -> Utf8PathBuf {
        self.root
            .join("processed")
            .join(format!("{}.json", safe_filename(name)))
    }

    pub fn logs_dir(&self) -> Utf8PathBuf {
        self.root.join("logs")
    }

    pub fn collections(&self) -> Result<BTreeMap<String, CollectionMetadata>, ImportError> {
        let path = self.registry_path();
        if !path.as_std_path().exists() {
            return Ok(BTreeMap::new());
        }
        read_json(&path)
    }

    pub fn load_datasets(&self, name: &str) -> Result<Collection, ImportError> {
        let path = self.collection_path(name);
        if !path.as_std_path().exists() {
            return Err(ImportError::Store(format!("collection not found: {name}")));
        }
        read_json(&path)
    }

    fn update_registry(
        &self,
        update: impl FnOnce(&mut BTreeMap<String, CollectionMetadata>),
    ) -> Result<(), ImportError> {
        let mut registry = self.collections()?;
        update(&mut registry);
        write_json_atomic(&self.registry_path(), &registry)
    }
}

impl DatasetStore for JsonStore {
    fn exists(&self, name: &str) -> Result<bool, ImportError> {
        Ok(self.collections()?.contains_key(name)
            || self.collection_path(name).as_std_path().exists())
    }

    fn load(&self, name: &str) -> Result<BTreeMap<DatasetKey, ActivityRecord>, ImportError> {
        let path = self.collection_path(name);
        if !path.as_std_path().exists() {
            return Err(ImportError::MissingDependency(name.to_string()));
        }
        let records: BTreeMap<String, ActivityRecord> = read_json(&path)?;
        Ok(records
            .into_iter()
            .map(|(code, record)| (DatasetKey::new(name, code), record))
            .collect())
    }

    fn register(&self, name: &str, registration: Registration) -> Result<(), ImportError> {
        let now = Local::now().to_rfc3339();
        self.update_registry(|registry| {
            registry.insert(
                name.to_string(),
                CollectionMetadata {
                    format: registration.format,
                    depends: registration.depends,
                    number: registration.number,
                    registered_at: now,
                    modified_at: None,
                    processed_at: None,
                },
            );
        })
    }

    fn write(&self, name: &str, datasets: &Collection) -> Result<(), ImportError> {
        write_json_atomic(&self.collection_path(name), datasets)?;
        let now = Local::now().to_rfc3339();
        self.update_registry(|registry| {
            if let Some(meta) = registry.get_mut(name) {
                meta.modified_at = Some(now);
            }
        })
    }

    fn process(&self, name: &str) -> Result<(), ImportError> {
        let datasets = self.load_datasets(name)?;
        let now = Local::now().to_rfc3339();
        let mut activities = Vec::with_capacity(datasets.len());
        let mut edges = Vec::new();
        for dataset in datasets.values() {
            activities.push(dataset.code.clone());
            edges.extend(dataset.exchanges.iter().map(|exc| ProcessedEdge {
                input: exc.input.clone(),
                output: dataset.code.clone(),
                amount: exc.amount,
                kind: exc.kind,
            }));
        }
        let processed = ProcessedCollection {
            name: name.to_string(),
            processed_at: now.clone(),
            activities,
            edges,
        };
        write_json_atomic(&self.processed_path(name), &processed)?;
        self.update_registry(|registry| {
            if let Some(meta) = registry.get_mut(name) {
                meta.processed_at = Some(now);
            }
        })
    }

    fn delete(&self, name: &str) -> Result<(), ImportError> {
        remove_if_present(&self.collection_path(name))?;
        remove_if_present(&self.processed_path(name))?;
        if self.collections()?.contains_key(name) {
            self.update_registry(|registry| {
                registry.remove(name);
            })?;
        }
        Ok(())
    }
}

/// Filesystem-safe slug of `name` plus a short digest, so distinct names never collide.
pub fn safe_filename(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.trim().chars() {
        if ch.is_alphanumeric() || ch == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else if ch.is_whitespace() || ch == '-' {
            pending_dash = true;
        }
    }
    let digest = hex::encode(Sha256::digest(name.as_bytes()));
    format!("{slug}.{}", &digest[..12])
}

fn remove_if_present(path: &Utf8Path) -> Result<(), ImportError> {
    match fs::remove_file(path.as_std_path()) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(ImportError::Filesystem(format!("remove {path}: {err}"))),
    }
}

fn read_json<T: DeserializeOwned>(path: &Utf8Path) -> Result<T, ImportError> {
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|err| ImportError::Filesystem(format!("read {path}: {err}")))?;
    serde_json::from_str(&content)
        .map_err(|err| ImportError::Store(format!("invalid JSON in {path}: {err}")))
}

fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Utf8Path,
    value: &T,
) -> Result<(), ImportError> {
    let parent = path
        .parent()
        .ok_or_else(|| ImportError::Filesystem("invalid destination path".to_string()))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| ImportError::Filesystem(err.to_string()))?;
    let content =
        serde_json::to_vec_pretty(value).map_err(|err| ImportError::Store(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix("lci-store")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| ImportError::Filesystem(err.to_string()))?;
    temp.write_all(&content)
        .map_err(|err| ImportError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| ImportError::Filesystem(err.to_string()))?;
    Ok(())
}
