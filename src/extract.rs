use crate::codes::CodeGenerator;
use crate::detox::detoxify;
use crate::diagnostics::DiagnosticsSink;
use crate::domain::{
    DatasetIdentity, DatasetKey, Exchange, ExchangeKind, Metadata, MetadataValue,
    NO_UNCERTAINTY, ParsedDataset, RawExchange, Row,
};
use crate::error::ImportError;
use crate::format::{Block, PRODUCTS_TOKEN, is_biosphere_label};
use crate::units::UnitCanonicalizer;

/// Collaborators and settings shared by every block of one import run.
pub struct ParseContext<'a> {
    pub database: &'a str,
    pub default_location: &'a str,
    pub units: &'a dyn UnitCanonicalizer,
    pub codes: &'a dyn CodeGenerator,
    pub sink: &'a dyn DiagnosticsSink,
}

/// The block's own product, read from the first line after `Products`.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub identity: DatasetIdentity,
    pub code: DatasetKey,
    pub amount: f64,
}

/// Parses one process block into a dataset whose technosphere exchanges are still unlinked.
pub fn parse_block(
    block: &Block<'_>,
    ctx: &ParseContext<'_>,
) -> Result<ParsedDataset, ImportError> {
    let products = products_index(block)?;
    let definition = define_dataset(block, products, ctx)?;
    check_single_output(block, products, &definition.identity.name)?;
    let metadata = extract_metadata(block, products);
    let exchanges = extract_exchanges(block, products, ctx)?;

    let Definition {
        identity,
        code,
        amount,
    } = definition;
    let production = Exchange {
        input: code.clone(),
        amount,
        kind: ExchangeKind::Production,
        uncertainty_type: NO_UNCERTAINTY,
        name: identity.name.clone(),
        unit: identity.unit.clone(),
        location: identity.location.clone(),
        category: None,
        uncertainty: None,
    };

    Ok(ParsedDataset {
        name: identity.name,
        unit: identity.unit,
        location: identity.location,
        categories: identity.categories,
        code,
        metadata,
        production,
        exchanges,
    })
}

/// Block-relative index of the `Products` row separating metadata from exchanges. A block
/// without one is reported at its `Process` marker line.
pub fn products_index(block: &Block<'_>) -> Result<usize, ImportError> {
    block
        .rows
        .iter()
        .position(|row| row.first().map(String::as_str) == Some(PRODUCTS_TOKEN))
        .ok_or(ImportError::MissingProducts {
            line: block.marker_line(),
        })
}

pub fn define_dataset(
    block: &Block<'_>,
    products: usize,
    ctx: &ParseContext<'_>,
) -> Result<Definition, ImportError> {
    let index = products + 1;
    let row = block.row(index).ok_or_else(|| ImportError::MalformedRow {
        line: block.line(products),
        reason: "missing product line after `Products`".to_string(),
    })?;
    let line = block.line(index);

    let (name, geo) = detoxify(field(row, 0, line, "product name")?, ctx.sink);
    let amount = parse_amount(field(row, 1, line, "amount")?, line)?;
    let unit = ctx.units.normalize(field(row, 2, line, "unit")?);
    let categories = field(row, 5, line, "category")?
        .split('\\')
        .map(str::to_string)
        .collect();

    let identity = DatasetIdentity {
        name,
        unit,
        location: geo.unwrap_or_else(|| ctx.default_location.to_string()),
        categories,
    };
    let code = DatasetKey::new(ctx.database, ctx.codes.code(&identity));
    Ok(Definition {
        identity,
        code,
        amount,
    })
}

/// A second product line after the first means a multi-output block.
pub fn check_single_output(
    block: &Block<'_>,
    products: usize,
    name: &str,
) -> Result<(), ImportError> {
    let index = products + 2;
    match block.row(index) {
        Some(row) if !row.is_empty() => Err(ImportError::MultiOutputUnsupported {
            line: block.line(index),
            name: name.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Key/value pairs above `Products`. A key followed by rows with an empty first field
/// collects those rows' second fields into a list.
pub fn extract_metadata(block: &Block<'_>, products: usize) -> Metadata {
    let rows = &block.rows[..products.min(block.rows.len())];
    let mut metadata = Metadata::new();
    for (index, row) in rows.iter().enumerate() {
        let (key, value) = match row.as_slice() {
            [key, value, ..] if !key.is_empty() && !value.is_empty() => (key, value),
            _ => continue,
        };
        let following = &rows[index + 1..];
        if following.first().is_some_and(is_continuation) {
            let mut values = vec![value.clone()];
            values.extend(
                following
                    .iter()
                    .take_while(|row| is_continuation(row))
                    .map(|row| row.get(1).cloned().unwrap_or_default()),
            );
            metadata.insert(key.clone(), MetadataValue::List(values));
        } else {
            metadata.insert(key.clone(), MetadataValue::Text(value.clone()));
        }
    }
    metadata
}

fn is_continuation(row: &Row) -> bool {
    row.first().is_some_and(|first| first.is_empty())
}

/// Exchange rows from the category sections after the product line.
pub fn extract_exchanges(
    block: &Block<'_>,
    products: usize,
    ctx: &ParseContext<'_>,
) -> Result<Vec<RawExchange>, ImportError> {
    let start = products + 3;
    let mut exchanges = Vec::new();
    let mut label: Option<&str> = None;

    for (index, row) in block.rows.iter().enumerate().skip(start) {
        let line = block.line(index);
        match row.len() {
            0 => continue,
            1 => {
                label = Some(row[0].as_str());
                continue;
            }
            _ => {}
        }
        let category = label.ok_or_else(|| ImportError::MalformedRow {
            line,
            reason: "exchange row before any category label".to_string(),
        })?;
        if is_biosphere_label(category) {
            continue;
        }

        let (name, location) = detoxify(field(row, 0, line, "exchange name")?, ctx.sink);
        exchanges.push(RawExchange {
            name,
            amount: parse_amount(field(row, 1, line, "amount")?, line)?,
            unit: ctx.units.normalize(field(row, 2, line, "unit")?),
            uncertainty: field(row, 3, line, "uncertainty")?.to_string(),
            category: category.to_string(),
            location,
            line,
        });
    }
    Ok(exchanges)
}

fn field<'r>(
    row: &'r Row,
    index: usize,
    line: usize,
    what: &str,
) -> Result<&'r str, ImportError> {
    row.get(index)
        .map(String::as_str)
        .ok_or_else(|| ImportError::MalformedRow {
            line,
            reason: format!("missing {what} (field {})", index + 1),
        })
}

pub fn parse_amount(value: &str, line: usize) -> Result<f64, ImportError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| ImportError::NumericParse {
            line,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::codes::ActivityHasher;
    use crate::diagnostics::MemorySink;
    use crate::units::DefaultUnits;

    fn rows(lines: &[&[&str]]) -> Vec<Row> {
        lines
            .iter()
            .map(|fields| fields.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn metadata_scalars_and_lists() {
        let data = rows(&[
            &["Category type", "material"],
            &["Comment", "first"],
            &["", "second"],
            &["", "third"],
            &["Status", ""],
            &[],
            &["Process identifier", "X1"],
            &["Products"],
        ]);
        let block = Block {
            offset: 3,
            rows: &data,
        };
        let metadata = extract_metadata(&block, 7);
        assert_eq!(metadata.len(), 3);
        assert_eq!(metadata["Category type"].as_text(), Some("material"));
        assert_eq!(
            metadata["Comment"].as_list(),
            Some(&["first".to_string(), "second".to_string(), "third".to_string()][..])
        );
        assert!(!metadata.contains_key("Status"));
    }

    #[test]
    fn later_metadata_key_overwrites() {
        let data = rows(&[&["Date", "1"], &["Date", "2"], &["Products"]]);
        let block = Block {
            offset: 3,
            rows: &data,
        };
        let metadata = extract_metadata(&block, 2);
        assert_eq!(metadata["Date"].as_text(), Some("2"));
    }

    #[test]
    fn missing_products_row() {
        let data = rows(&[&["Date", "1"]]);
        let block = Block {
            offset: 3,
            rows: &data,
        };
        assert_matches!(
            products_index(&block),
            Err(ImportError::MissingProducts { line: 3 })
        );
    }

    #[test]
    fn exchange_rows_need_a_label() {
        let sink = MemorySink::new();
        let units = DefaultUnits::new();
        let ctx = ParseContext {
            database: "db",
            default_location: "GLO",
            units: &units,
            codes: &ActivityHasher,
            sink: &sink,
        };
        let data = rows(&[
            &["Products"],
            &["Widget/CH U", "1", "kg", "100", "", "Materials"],
            &[],
            &["Steel/CH U", "1", "kg", "Undefined"],
        ]);
        let block = Block {
            offset: 3,
            rows: &data,
        };
        assert_matches!(
            extract_exchanges(&block, 0, &ctx),
            Err(ImportError::MalformedRow { line: 7, .. })
        );
    }
}
