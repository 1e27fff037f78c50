//! Data Merger CLI
//!
//! Command-line tool for merging POS and supplier files on UPC and exporting the result.

use clap::{Parser, Subcommand};
use dm_core::{
    ExportFormat, FilterSpec, JoinMode, Journal, Operation, Session, Side, Table, TransformSpec,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dm-cli")]
#[command(about = "Merge POS and Supplier files on UPC", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a single file and display its columns and first rows
    Inspect {
        /// Path to a CSV, TSV, TXT, XLSX or XLS file
        #[arg(short, long)]
        file: PathBuf,

        /// Maximum number of rows to display
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Merge a POS file with a Supplier file and export the result
    Merge {
        /// Path to the POS file
        #[arg(long)]
        pos: PathBuf,

        /// Path to the Supplier file
        #[arg(long)]
        supplier: PathBuf,

        /// Merge mode (inner, left or outer)
        #[arg(short, long, default_value = "inner")]
        mode: JoinMode,

        /// Columns to keep (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        select: Vec<String>,

        /// Column renames (old=new)
        #[arg(short, long)]
        rename: Vec<String>,

        /// Strip this suffix from column names (e.g. _right)
        #[arg(long)]
        strip_suffix: Option<String>,

        /// Row filters (column:operator:value)
        #[arg(long)]
        filter: Vec<FilterSpec>,

        /// Transform recipe (JSON); flags are applied on top of it
        #[arg(long)]
        recipe: Option<PathBuf>,

        /// Output format (excel, json or parquet)
        #[arg(short, long, default_value = "excel")]
        format: ExportFormat,

        /// Output file path (defaults to Data_Merger_Export.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Append the session journal to this JSON file
        #[arg(long)]
        journal: Option<PathBuf>,
    },

    /// Create a template transform recipe
    CreateRecipe {
        /// Output path for the recipe file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        if let Some(hint) = e.hint() {
            eprintln!("Hint: {}", hint);
        }
        std::process::exit(1);
    }
}

fn run() -> dm_core::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { file, limit } => cmd_inspect(&file, limit),
        Commands::Merge {
            pos,
            supplier,
            mode,
            select,
            rename,
            strip_suffix,
            filter,
            recipe,
            format,
            output,
            journal,
        } => {
            let spec = build_spec(recipe.as_deref(), select, &rename, strip_suffix, filter)?;
            let output = output.unwrap_or_else(|| PathBuf::from(format.file_name()));
            tracing::debug!(?spec, ?mode, "transform recipe");
            cmd_merge(&pos, &supplier, mode, &spec, format, &output, journal.as_deref())
        }
        Commands::CreateRecipe { output } => cmd_create_recipe(&output),
    }
}

fn cmd_inspect(file: &Path, limit: usize) -> dm_core::Result<()> {
    let mut journal = Journal::new();
    let table = journal.track(
        Operation::Load,
        &file.display().to_string(),
        dm_core::load_file(file),
        |t| format!("{} rows, {} columns", t.row_count(), t.column_count()),
    )?;

    println!("File: {}", file.display());
    println!("Columns: {}", table.column_count());
    println!("Rows: {}", table.row_count());
    println!();

    for (index, column) in table.columns.iter().enumerate() {
        println!("  {} ({})", column.name, table.column_type(index));
    }
    println!();

    print_table(&table, limit);

    Ok(())
}

/// Start from the recipe if given, then layer the command-line options over it
fn build_spec(
    recipe: Option<&Path>,
    select: Vec<String>,
    rename: &[String],
    strip_suffix: Option<String>,
    filters: Vec<FilterSpec>,
) -> dm_core::Result<TransformSpec> {
    let mut spec = match recipe {
        Some(path) => TransformSpec::load(path)?,
        None => TransformSpec::new(),
    };

    if !select.is_empty() {
        spec.select = Some(select.into_iter().map(|s| s.trim().to_string()).collect());
    }

    for pair in rename {
        match pair.split_once('=') {
            Some((old, new)) => {
                spec.rename.insert(old.trim().to_string(), new.trim().to_string());
            }
            None => {
                eprintln!("Invalid rename format: {}. Expected old=new", pair);
                std::process::exit(1);
            }
        }
    }

    if strip_suffix.is_some() {
        spec.strip_suffix = strip_suffix;
    }
    spec.filters.extend(filters);

    Ok(spec)
}

fn cmd_merge(
    pos: &Path,
    supplier: &Path,
    mode: JoinMode,
    spec: &TransformSpec,
    format: ExportFormat,
    output: &Path,
    journal_path: Option<&Path>,
) -> dm_core::Result<()> {
    let mut journal = match journal_path {
        Some(path) => Journal::load(path)?,
        None => Journal::new(),
    };

    let result = run_session(&mut journal, pos, supplier, mode, spec, format, output);

    // Keep the record of failed runs too
    if let Some(path) = journal_path {
        journal.save(path)?;
    }

    result
}

fn run_session(
    journal: &mut Journal,
    pos: &Path,
    supplier: &Path,
    mode: JoinMode,
    spec: &TransformSpec,
    format: ExportFormat,
    output: &Path,
) -> dm_core::Result<()> {
    let mut session = Session::new(journal);

    for (side, path) in [(Side::Pos, pos), (Side::Supplier, supplier)] {
        let table = session.load_path(side, path)?;
        println!(
            "Loaded {}: {} rows, {} columns",
            table.name,
            table.row_count(),
            table.column_count()
        );
    }

    let result = session.merge(mode)?;
    println!();
    println!("Merge mode: {}", result.mode);
    println!("Matched rows: {}", result.matched_rows);
    println!("Merged rows: {}", result.merged.row_count());
    println!("Unmatched POS rows: {}", result.unmatched_pos.row_count());
    println!("Unmatched Supplier rows: {}", result.unmatched_supplier.row_count());

    let table = session.transform(spec)?;
    println!();
    println!("Result: {} rows, {} columns", table.row_count(), table.column_count());
    print_table(table, 5);

    let bytes = session.export(format)?;
    fs::write(output, &bytes)?;

    println!();
    println!("Exported {} ({} bytes) to {}", format, bytes.len(), output.display());

    Ok(())
}

fn cmd_create_recipe(output: &Path) -> dm_core::Result<()> {
    let recipe = TransformSpec::template();
    recipe.save(output)?;

    println!("Created recipe template: {}", output.display());
    println!();
    println!("Edit the file to choose columns, renames and filters, then run:");
    println!(
        "  dm-cli merge --pos <file> --supplier <file> --recipe {}",
        output.display()
    );

    Ok(())
}

fn print_table(table: &Table, limit: usize) {
    let header = table.column_names();
    println!("{}", header.join("\t"));
    println!("{}", "-".repeat(header.len() * 12));

    for row in table.rows.iter().take(limit) {
        let values: Vec<String> = row.cells.iter().map(|c| c.to_string_value()).collect();
        println!("{}", values.join("\t"));
    }

    if table.row_count() > limit {
        println!("... ({} more rows)", table.row_count() - limit);
    }
}
