use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::domain::{
    ActivityRecord, Dataset, DatasetKey, Exchange, ExchangeKind, NO_UNCERTAINTY, ParsedDataset,
    RawExchange,
};
use crate::error::ImportError;

/// Two datasets in one batch defined the same `(name, unit)`; the later one is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForegroundCollision {
    pub name: String,
    pub unit: String,
    pub replaced: DatasetKey,
    pub kept: DatasetKey,
}

/// `(name, unit)` → code for every dataset in the current import batch.
#[derive(Debug, Clone, Default)]
pub struct ForegroundIndex {
    entries: HashMap<(String, String), DatasetKey>,
    collisions: Vec<ForegroundCollision>,
}

impl ForegroundIndex {
    pub fn build(datasets: &[ParsedDataset]) -> Self {
        let mut entries = HashMap::with_capacity(datasets.len());
        let mut collisions = Vec::new();
        for ds in datasets {
            let key = (ds.name.clone(), ds.unit.clone());
            if let Some(replaced) = entries.insert(key, ds.code.clone()) {
                if replaced != ds.code {
                    collisions.push(ForegroundCollision {
                        name: ds.name.clone(),
                        unit: ds.unit.clone(),
                        replaced,
                        kept: ds.code.clone(),
                    });
                }
            }
        }
        Self {
            entries,
            collisions,
        }
    }

    pub fn get(&self, name: &str, unit: &str) -> Option<&DatasetKey> {
        self.entries.get(&(name.to_string(), unit.to_string()))
    }

    pub fn collisions(&self) -> &[ForegroundCollision] {
        &self.collisions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lookup tables over previously imported dependency collections.
#[derive(Debug, Clone, Default)]
pub struct BackgroundIndex {
    located: HashMap<(String, String, String), DatasetKey>,
    unlocated: HashMap<(String, String), DatasetKey>,
}

impl BackgroundIndex {
    /// Later records overwrite earlier ones with the same lookup key.
    pub fn build<'r>(
        records: impl IntoIterator<Item = (&'r DatasetKey, &'r ActivityRecord)>,
    ) -> Self {
        let mut index = Self::default();
        for (key, record) in records {
            let name = record.name.to_lowercase();
            index.located.insert(
                (name.clone(), record.unit.clone(), record.location.clone()),
                key.clone(),
            );
            index
                .unlocated
                .insert((name, record.unit.clone()), key.clone());
        }
        index
    }

    pub fn get(&self, name: &str, unit: &str, location: &str) -> Option<&DatasetKey> {
        self.located.get(&(
            name.to_lowercase(),
            unit.to_string(),
            location.to_string(),
        ))
    }

    /// Match ignoring location. Only used to explain link failures.
    pub fn get_any_location(&self, name: &str, unit: &str) -> Option<&DatasetKey> {
        self.unlocated
            .get(&(name.to_lowercase(), unit.to_string()))
    }

    pub fn len(&self) -> usize {
        self.located.len()
    }

    pub fn is_empty(&self) -> bool {
        self.located.is_empty()
    }
}

/// An exchange that matched neither index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingLink {
    pub dataset: String,
    pub name: String,
    pub amount: f64,
    pub unit: String,
    pub location: String,
    pub category: String,
    pub line: usize,
    /// Background dataset with the same name and unit but another location.
    pub near_miss: Option<DatasetKey>,
}

impl fmt::Display for MissingLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}: '{}' ({} {}, {}) in '{}'",
            self.line, self.name, self.amount, self.unit, self.location, self.dataset
        )?;
        if let Some(key) = &self.near_miss {
            write!(f, "; background has {key} at another location")?;
        }
        Ok(())
    }
}

/// Resolves exchanges against the foreground first, then the background.
pub struct Linker<'a> {
    foreground: &'a ForegroundIndex,
    background: &'a BackgroundIndex,
    default_location: &'a str,
}

impl<'a> Linker<'a> {
    pub fn new(
        foreground: &'a ForegroundIndex,
        background: &'a BackgroundIndex,
        default_location: &'a str,
    ) -> Self {
        Self {
            foreground,
            background,
            default_location,
        }
    }

    pub fn resolve(&self, exc: &RawExchange) -> Option<&'a DatasetKey> {
        let location = exc.location.as_deref().unwrap_or(self.default_location);
        self.foreground
            .get(&exc.name, &exc.unit)
            .or_else(|| self.background.get(&exc.name, &exc.unit, location))
    }

    pub fn link_exchange(
        &self,
        dataset: &str,
        exc: RawExchange,
    ) -> Result<Exchange, MissingLink> {
        let location = exc
            .location
            .clone()
            .unwrap_or_else(|| self.default_location.to_string());
        match self.resolve(&exc) {
            Some(input) => Ok(Exchange {
                input: input.clone(),
                amount: exc.amount,
                kind: ExchangeKind::Technosphere,
                uncertainty_type: NO_UNCERTAINTY,
                name: exc.name,
                unit: exc.unit,
                location,
                category: Some(exc.category),
                uncertainty: Some(exc.uncertainty),
            }),
            None => Err(MissingLink {
                dataset: dataset.to_string(),
                near_miss: self
                    .background
                    .get_any_location(&exc.name, &exc.unit)
                    .cloned(),
                name: exc.name,
                amount: exc.amount,
                unit: exc.unit,
                location,
                category: exc.category,
                line: exc.line,
            }),
        }
    }

    /// Links every exchange of one dataset; the production exchange passes through.
    pub fn link_dataset(&self, parsed: ParsedDataset) -> Result<Dataset, Vec<MissingLink>> {
        let ParsedDataset {
            name,
            unit,
            location,
            categories,
            code,
            metadata,
            production,
            exchanges: raw,
        } = parsed;

        let mut exchanges = Vec::with_capacity(raw.len() + 1);
        let mut missing = Vec::new();
        for exc in raw {
            match self.link_exchange(&name, exc) {
                Ok(linked) => exchanges.push(linked),
                Err(miss) => missing.push(miss),
            }
        }
        if !missing.is_empty() {
            return Err(missing);
        }
        exchanges.push(production);

        Ok(Dataset {
            name,
            unit,
            location,
            categories,
            code,
            metadata,
            exchanges,
        })
    }

    /// Links the whole batch. Any failure fails the batch and reports every missing link.
    pub fn link_all(&self, parsed: Vec<ParsedDataset>) -> Result<Vec<Dataset>, ImportError> {
        let mut linked = Vec::with_capacity(parsed.len());
        let mut missing = Vec::new();
        for ds in parsed {
            match self.link_dataset(ds) {
                Ok(dataset) => linked.push(dataset),
                Err(mut misses) => missing.append(&mut misses),
            }
        }
        if missing.is_empty() {
            Ok(linked)
        } else {
            Err(ImportError::UnlinkedExchange { missing })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Metadata;

    fn parsed(name: &str, unit: &str, code: &str) -> ParsedDataset {
        let key = DatasetKey::new("fg", code);
        ParsedDataset {
            name: name.to_string(),
            unit: unit.to_string(),
            location: "GLO".to_string(),
            categories: vec![],
            code: key.clone(),
            metadata: Metadata::new(),
            production: Exchange {
                input: key,
                amount: 1.0,
                kind: ExchangeKind::Production,
                uncertainty_type: NO_UNCERTAINTY,
                name: name.to_string(),
                unit: unit.to_string(),
                location: "GLO".to_string(),
                category: None,
                uncertainty: None,
            },
            exchanges: vec![],
        }
    }

    #[test]
    fn foreground_keeps_last_and_records_collision() {
        let index = ForegroundIndex::build(&[
            parsed("Widget", "kilogram", "a"),
            parsed("Widget", "kilogram", "b"),
        ]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("Widget", "kilogram").unwrap().code(), "b");
        assert_eq!(index.collisions().len(), 1);
        assert_eq!(index.collisions()[0].replaced.code(), "a");
    }

    #[test]
    fn background_lookup_is_case_insensitive_on_name() {
        let key = DatasetKey::new("bg", "x");
        let record = ActivityRecord {
            name: "Steel, low-alloyed".to_string(),
            unit: "kilogram".to_string(),
            location: "RER".to_string(),
        };
        let index = BackgroundIndex::build([(&key, &record)]);
        assert_eq!(index.get("STEEL, LOW-ALLOYED", "kilogram", "RER"), Some(&key));
        assert_eq!(index.get("Steel, low-alloyed", "kilogram", "CH"), None);
        assert_eq!(index.get_any_location("steel, low-alloyed", "kilogram"), Some(&key));
    }
}
