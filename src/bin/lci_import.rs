use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use lci_importer::app::{ImportOptions, ImportResult, Importer};
use lci_importer::codes::ActivityHasher;
use lci_importer::config::{ConfigLoader, ResolvedConfig};
use lci_importer::diagnostics::{DiagnosticsSink, ImportLog, TracingSink};
use lci_importer::error::ImportError;
use lci_importer::output::{InfoResult, JsonOutput, OutputMode};
use lci_importer::rows::parse_delimiter;
use lci_importer::store::{DatasetStore, JsonStore};
use lci_importer::units::DefaultUnits;

#[derive(Parser)]
#[command(name = "lci-import")]
#[command(about = "Import SimaPro CSV exports into a linked LCI dataset store")]
#[command(version, author)]
struct Cli {
    /// Print machine-readable JSON instead of a summary
    #[arg(long, global = true)]
    json: bool,

    /// Store root directory
    #[arg(long, global = true)]
    store: Option<Utf8PathBuf>,

    /// Config file (default: lci-import.json if present)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Import a SimaPro CSV export")]
    Import(ImportArgs),
    #[command(about = "List imported collections")]
    List,
    #[command(about = "Show collection details")]
    Info(InfoArgs),
}

#[derive(Args)]
struct ImportArgs {
    file: Utf8PathBuf,

    /// Field delimiter: tab, `;`, `,` or any single character
    #[arg(long)]
    delimiter: Option<String>,

    /// Collection referenced by this export (repeatable)
    #[arg(long = "depends")]
    depends: Vec<String>,

    #[arg(long)]
    overwrite: bool,

    /// Collection name (default: SimaPro project name)
    #[arg(long)]
    name: Option<String>,

    /// Location for names without a geography suffix
    #[arg(long)]
    default_location: Option<String>,

    /// Send diagnostics to the tracing output only, without a log file
    #[arg(long)]
    no_log: bool,
}

#[derive(Args)]
struct InfoArgs {
    name: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<ImportError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &ImportError) -> u8 {
    match error {
        ImportError::InputNotFound(_)
        | ImportError::Format(_)
        | ImportError::MissingProjectName
        | ImportError::MissingProducts { .. }
        | ImportError::MalformedRow { .. }
        | ImportError::MultiOutputUnsupported { .. }
        | ImportError::NumericParse { .. } => 2,
        ImportError::MissingDependency(_) | ImportError::UnlinkedExchange { .. } => 3,
        ImportError::DuplicateImport(_) => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let store = open_store(cli.store, &config)?;

    match cli.command {
        Commands::Import(args) => run_import(args, store, config, output_mode),
        Commands::List => run_list(&store, output_mode),
        Commands::Info(args) => run_info(args, &store, output_mode),
    }
}

fn open_store(
    flag: Option<Utf8PathBuf>,
    config: &ResolvedConfig,
) -> Result<JsonStore, ImportError> {
    match flag.or_else(|| config.store.as_deref().map(Utf8PathBuf::from)) {
        Some(root) => Ok(JsonStore::new_with_root(root)),
        None => JsonStore::new(),
    }
}

fn run_import(
    args: ImportArgs,
    store: JsonStore,
    config: ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let mut options = ImportOptions::from_config(args.file, &config);
    if let Some(delimiter) = args.delimiter.as_deref() {
        options.delimiter = parse_delimiter(delimiter)?;
    }
    if !args.depends.is_empty() {
        options.depends = args.depends;
    }
    if args.overwrite {
        options.overwrite = true;
    }
    if args.name.is_some() {
        options.name = args.name;
    }
    if let Some(location) = args.default_location {
        options.default_location = location;
    }

    let log = if args.no_log {
        None
    } else {
        Some(ImportLog::create(&store.logs_dir(), "simapro-import")?)
    };
    let sink: &dyn DiagnosticsSink = match &log {
        Some(log) => log,
        None => &TracingSink,
    };
    let importer = Importer::new(
        store,
        DefaultUnits::with_aliases(config.units),
        ActivityHasher,
    );
    let result = importer.import(&options, sink).inspect_err(|_| {
        if let Some(path) = sink.log_path() {
            eprintln!("Import log: {path}");
        }
    })?;

    match output_mode {
        OutputMode::Json => JsonOutput::print_import(&result).into_diagnostic()?,
        OutputMode::Human => print_import_summary(&result),
    }
    Ok(())
}

fn run_list(store: &JsonStore, output_mode: OutputMode) -> miette::Result<()> {
    let collections = store.collections()?;
    match output_mode {
        OutputMode::Json => JsonOutput::print_list(&collections).into_diagnostic()?,
        OutputMode::Human => {
            if collections.is_empty() {
                println!("No collections in {}", store.root());
            }
            for (name, meta) in &collections {
                println!(
                    "{name}: {} datasets, format {}, depends [{}]",
                    meta.number,
                    meta.format,
                    meta.depends.join(", ")
                );
            }
        }
    }
    Ok(())
}

fn run_info(args: InfoArgs, store: &JsonStore, output_mode: OutputMode) -> miette::Result<()> {
    if !store.exists(&args.name)? {
        return Err(miette::Report::msg(format!(
            "collection not found: {}",
            args.name
        )));
    }
    let datasets = store.load_datasets(&args.name)?;
    let metadata = store.collections()?.remove(&args.name);
    let result = InfoResult {
        path: store.collection_path(&args.name).to_string(),
        exchanges: datasets.values().map(|ds| ds.exchanges.len()).sum(),
        datasets: datasets.len(),
        metadata,
        name: args.name,
    };

    match output_mode {
        OutputMode::Json => JsonOutput::print_info(&result).into_diagnostic()?,
        OutputMode::Human => {
            println!("{}", result.name);
            println!("  datasets:  {}", result.datasets);
            println!("  exchanges: {}", result.exchanges);
            println!("  file:      {}", result.path);
            if let Some(meta) = &result.metadata {
                println!("  format:    {}", meta.format);
                println!("  depends:   {}", meta.depends.join(", "));
                println!("  imported:  {}", meta.registered_at);
                if let Some(processed) = &meta.processed_at {
                    println!("  processed: {processed}");
                }
            }
        }
    }
    Ok(())
}

fn print_import_summary(result: &ImportResult) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}SimaPro import summary{reset}");
    let action = if result.overwritten {
        "overwritten"
    } else {
        "created"
    };
    println!("{green}Collection '{}' {action}{reset}", result.name);
    println!(
        "{green}Datasets: {}, exchanges: {}{reset}",
        result.datasets, result.exchanges
    );
    if !result.depends.is_empty() {
        println!("{cyan}Linked against: {}{reset}", result.depends.join(", "));
    }
    if result.warnings > 0 {
        println!("{yellow}Warnings: {}{reset}", result.warnings);
    }
    if let Some(path) = &result.log_path {
        println!("{cyan}Log: {path}{reset}");
    }
}
