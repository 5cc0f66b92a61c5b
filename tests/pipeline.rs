use assert_matches::assert_matches;

use lci_importer::codes::ActivityHasher;
use lci_importer::diagnostics::MemorySink;
use lci_importer::domain::{ExchangeKind, Row};
use lci_importer::error::ImportError;
use lci_importer::extract::{ParseContext, parse_block};
use lci_importer::format::{HEADER_ROWS, process_indices, segment};
use lci_importer::rows::parse_rows;
use lci_importer::units::DefaultUnits;

fn export(rows: &[&[&str]]) -> Vec<Row> {
    let text = rows
        .iter()
        .map(|fields| fields.join("\t"))
        .collect::<Vec<_>>()
        .join("\n");
    parse_rows(format!("{text}\n").as_bytes(), b'\t').unwrap()
}

fn two_blocks() -> Vec<Row> {
    export(&[
        &["{SimaPro 7.3.0}"],
        &["Project", "Demo project"],
        &["Process"],
        &["Category type", "material"],
        &["Comment", "first line"],
        &["", "second line"],
        &["Products"],
        &["Widget/CH U", "1", "kg", "100%", "not defined", "Materials\\Widgets"],
        &[],
        &["Materials/fuels"],
        &["Steel/RER U", "0.5", "kg", "Undefined"],
        &[],
        &["Emissions to air"],
        &["Carbon dioxide", "", "3", "kg", "Undefined"],
        &[],
        &["Process"],
        &["Process name", "Gadget assembly"],
        &["Products"],
        &["Gadget/GLO U", "4", "p", "100%", "not defined", "Products\\Gadgets"],
        &[],
        &["Materials/fuels"],
        &["Widget", "2.5", "kg", "Undefined"],
        &[],
        &["Resources"],
        &["Water", "10", "m3", "Undefined"],
    ])
}

#[test]
fn segments_cover_input_exactly_once() {
    let rows = two_blocks();
    let markers = process_indices(&rows);
    let blocks = segment(&rows);
    assert_eq!(markers.len(), 2);
    assert_eq!(blocks.len(), markers.len());

    let mut covered = vec![0usize; rows.len()];
    for index in 0..HEADER_ROWS {
        covered[index] += 1;
    }
    for &marker in &markers {
        covered[marker] += 1;
    }
    for block in &blocks {
        for index in block.range() {
            covered[index] += 1;
        }
    }
    assert!(covered.iter().all(|count| *count == 1), "{covered:?}");
}

#[test]
fn no_markers_no_blocks() {
    let rows = export(&[&["{SimaPro 7.3.0}"], &["Project", "Empty"], &["Date", "today"]]);
    assert!(segment(&rows).is_empty());
}

#[test]
fn blocks_parse_into_datasets() {
    let rows = two_blocks();
    let sink = MemorySink::new();
    let units = DefaultUnits::new();
    let ctx = ParseContext {
        database: "Demo project",
        default_location: "GLO",
        units: &units,
        codes: &ActivityHasher,
        sink: &sink,
    };
    let parsed = segment(&rows)
        .iter()
        .map(|block| parse_block(block, &ctx))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    let widget = &parsed[0];
    assert_eq!(widget.name, "Widget");
    assert_eq!(widget.unit, "kilogram");
    assert_eq!(widget.location, "CH");
    assert_eq!(widget.categories, vec!["Materials", "Widgets"]);
    assert_eq!(widget.code.database(), "Demo project");
    assert_eq!(widget.production.kind, ExchangeKind::Production);
    assert_eq!(widget.production.amount, 1.0);
    assert_eq!(widget.production.input, widget.code);
    assert_eq!(
        widget.metadata["Comment"].as_list().map(|values| values.len()),
        Some(2)
    );

    assert_eq!(widget.exchanges.len(), 1);
    assert_eq!(widget.exchanges[0].name, "Steel");
    assert_eq!(widget.exchanges[0].location.as_deref(), Some("RER"));
    assert_eq!(widget.exchanges[0].category, "Materials/fuels");
    assert_eq!(widget.exchanges[0].uncertainty, "Undefined");

    let gadget = &parsed[1];
    assert_eq!(gadget.unit, "unit");
    assert_eq!(gadget.production.amount, 4.0);
    assert_eq!(gadget.exchanges.len(), 1);
    assert_eq!(gadget.exchanges[0].name, "Widget");
    assert_eq!(gadget.exchanges[0].location, None);
    assert_eq!(gadget.exchanges[0].amount, 2.5);
}

#[test]
fn environmental_rows_never_become_exchanges() {
    let rows = two_blocks();
    let sink = MemorySink::new();
    let units = DefaultUnits::new();
    let ctx = ParseContext {
        database: "db",
        default_location: "GLO",
        units: &units,
        codes: &ActivityHasher,
        sink: &sink,
    };
    for block in segment(&rows) {
        let parsed = parse_block(&block, &ctx).unwrap();
        assert!(parsed.exchanges.iter().all(|exc| {
            exc.category != "Emissions to air" && exc.category != "Resources"
        }));
        assert!(
            parsed
                .exchanges
                .iter()
                .all(|exc| exc.name != "Water" && exc.name != "Carbon dioxide")
        );
    }
}

#[test]
fn multi_output_block_is_rejected() {
    let rows = export(&[
        &["{SimaPro 7.3.0}"],
        &["Project", "p"],
        &["Process"],
        &["Products"],
        &["Widget/CH U", "1", "kg", "50%", "not defined", "Materials"],
        &["Byproduct/CH U", "1", "kg", "50%", "not defined", "Materials"],
    ]);
    let sink = MemorySink::new();
    let units = DefaultUnits::new();
    let ctx = ParseContext {
        database: "db",
        default_location: "GLO",
        units: &units,
        codes: &ActivityHasher,
        sink: &sink,
    };
    let blocks = segment(&rows);
    assert_matches!(
        parse_block(&blocks[0], &ctx),
        Err(ImportError::MultiOutputUnsupported { line: 6, .. })
    );
}

#[test]
fn bad_amount_aborts_block() {
    let rows = export(&[
        &["{SimaPro 7.3.0}"],
        &["Project", "p"],
        &["Process"],
        &["Products"],
        &["Widget/CH U", "1", "kg", "100%", "not defined", "Materials"],
        &[],
        &["Materials/fuels"],
        &["Steel/RER U", "lots", "kg", "Undefined"],
    ]);
    let sink = MemorySink::new();
    let units = DefaultUnits::new();
    let ctx = ParseContext {
        database: "db",
        default_location: "GLO",
        units: &units,
        codes: &ActivityHasher,
        sink: &sink,
    };
    let blocks = segment(&rows);
    let err = parse_block(&blocks[0], &ctx).unwrap_err();
    assert_matches!(err, ImportError::NumericParse { line: 8, ref value } if value == "lots");
}

#[test]
fn bad_production_amount_aborts_block() {
    let rows = export(&[
        &["{SimaPro 7.3.0}"],
        &["Project", "p"],
        &["Process"],
        &["Products"],
        &["Widget/CH U", "one", "kg", "100%", "not defined", "Materials"],
    ]);
    let sink = MemorySink::new();
    let units = DefaultUnits::new();
    let ctx = ParseContext {
        database: "db",
        default_location: "GLO",
        units: &units,
        codes: &ActivityHasher,
        sink: &sink,
    };
    let blocks = segment(&rows);
    assert_matches!(
        parse_block(&blocks[0], &ctx),
        Err(ImportError::NumericParse { line: 5, .. })
    );
}

#[test]
fn missing_products_points_at_process_marker() {
    let rows = export(&[
        &["{SimaPro 7.3.0}"],
        &["Project", "p"],
        &[],
        &["Process"],
        &["Process name", "Orphan"],
        &[],
    ]);
    let sink = MemorySink::new();
    let units = DefaultUnits::new();
    let ctx = ParseContext {
        database: "db",
        default_location: "GLO",
        units: &units,
        codes: &ActivityHasher,
        sink: &sink,
    };
    let blocks = segment(&rows);
    assert_eq!(blocks[0].marker_line(), 4);
    assert_eq!(rows[blocks[0].marker_line() - 1], vec!["Process".to_string()]);
    assert_matches!(
        parse_block(&blocks[0], &ctx),
        Err(ImportError::MissingProducts { line: 4 })
    );
}

#[test]
fn windows_line_endings() {
    let text = [
        "{SimaPro 7.3.0}",
        "Project\tDemo project",
        "Process",
        "Products",
        "Widget/CH U\t1\tkg\t100%\tnot defined\tMaterials",
        "",
        "Materials/fuels",
        "Steel/RER U\t0.5\tkg\tUndefined",
    ]
    .join("\r\n");
    let rows = parse_rows(format!("{text}\r\n").as_bytes(), b'\t').unwrap();
    assert_eq!(rows.len(), 8);
    assert!(rows[5].is_empty());
    assert_eq!(rows[7][3], "Undefined");

    let sink = MemorySink::new();
    let units = DefaultUnits::new();
    let ctx = ParseContext {
        database: "db",
        default_location: "GLO",
        units: &units,
        codes: &ActivityHasher,
        sink: &sink,
    };
    let blocks = segment(&rows);
    assert_eq!(blocks.len(), 1);
    let parsed = parse_block(&blocks[0], &ctx).unwrap();
    assert_eq!(parsed.name, "Widget");
    assert_eq!(parsed.exchanges.len(), 1);
    assert_eq!(parsed.exchanges[0].name, "Steel");
}
