use clap::{Parser, Subcommand};
use formreview::cli;
use formreview::config::ServeArgs;
use formreview::ingest::InputPolicy;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "formreview")]
#[command(about = "Evaluation-form templates from Excel spreadsheets.")]
#[command(long_about = "formreview - Evaluation-form template ingestion

Finds the header row of an uploaded evaluation form (merged headers, accented
or plain Vietnamese column names), marks the cells an employee fills in and
stores the result per branch/department/position.

COMMANDS:
  parse   - Parse a spreadsheet and show the detected table
  sample  - Write a demo evaluation form (.xlsx)
  import  - Parse a spreadsheet and store it under one or more keys
  list    - List stored templates
  show    - Show one stored template
  remove  - Delete a stored template
  serve   - Run the HTTP API server

EXAMPLES:
  formreview sample form.xlsx
  formreview parse form.xlsx --policy fill-color
  formreview import form.xlsx --db templates.db --key hn|sales|staff --key hn|sales|lead
  formreview serve --port 3000 --db templates.db")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a spreadsheet and print the detected table
    Parse {
        /// Spreadsheet file (.xlsx or .xls)
        file: PathBuf,

        /// Print the parsed table as JSON
        #[arg(long)]
        json: bool,

        /// Input-cell policy: italic-label, fill-color or fill-color-restricted
        #[arg(long, default_value = "italic-label", env = "FORMREVIEW_INPUT_POLICY")]
        policy: InputPolicy,
    },

    /// Write a demo evaluation form
    Sample {
        /// Output .xlsx file
        output: PathBuf,
    },

    /// Parse a spreadsheet once and store it under every given key
    Import {
        /// Spreadsheet file (.xlsx or .xls)
        file: PathBuf,

        /// SQLite database file
        #[arg(long, env = "FORMREVIEW_DB")]
        db: PathBuf,

        /// Template key branchId|departmentId|positionId (repeatable)
        #[arg(short, long = "key", required = true)]
        keys: Vec<String>,

        /// YAML org catalog used to validate keys
        #[arg(long, env = "FORMREVIEW_ORG_CATALOG")]
        org_catalog: Option<PathBuf>,

        /// Input-cell policy: italic-label, fill-color or fill-color-restricted
        #[arg(long, default_value = "italic-label", env = "FORMREVIEW_INPUT_POLICY")]
        policy: InputPolicy,
    },

    /// List stored templates, newest first
    List {
        /// SQLite database file
        #[arg(long, env = "FORMREVIEW_DB")]
        db: PathBuf,
    },

    /// Show one stored template
    Show {
        /// Template key branchId|departmentId|positionId
        key: String,

        /// SQLite database file
        #[arg(long, env = "FORMREVIEW_DB")]
        db: PathBuf,

        /// Print the template as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a stored template
    Remove {
        /// Template key branchId|departmentId|positionId
        key: String,

        /// SQLite database file
        #[arg(long, env = "FORMREVIEW_DB")]
        db: PathBuf,
    },

    /// Run the HTTP API server
    Serve(ServeArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Parse { file, json, policy } => cli::parse(file, json, policy)?,

        Commands::Sample { output } => cli::sample(output)?,

        Commands::Import {
            file,
            db,
            keys,
            org_catalog,
            policy,
        } => cli::import(file, db, keys, org_catalog, policy)?,

        Commands::List { db } => cli::list(db)?,

        Commands::Show { key, db, json } => cli::show(key, db, json)?,

        Commands::Remove { key, db } => cli::remove(key, db)?,

        Commands::Serve(args) => cli::serve(args)?,
    }
    Ok(())
}
