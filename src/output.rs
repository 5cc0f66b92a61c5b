use std::collections::BTreeMap;
use std::io::{self, Write};

use serde::Serialize;

use crate::app::ImportResult;
use crate::store::CollectionMetadata;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

#[derive(Debug, Clone, Serialize)]
pub struct InfoResult {
    pub name: String,
    pub metadata: Option<CollectionMetadata>,
    pub datasets: usize,
    pub exchanges: usize,
    pub path: String,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_import(result: &ImportResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_list(collections: &BTreeMap<String, CollectionMetadata>) -> io::Result<()> {
        Self::print_json(collections)
    }

    pub fn print_info(result: &InfoResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
