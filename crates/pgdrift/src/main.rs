//! pgdrift CLI
//!
//! Command-line tool for detecting replaceable-entity drift between SQL
//! files and a live PostgreSQL database.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use sqlx::{Connection, PgConnection};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use pgdrift::prelude::*;

/// Schema drift detection for PostgreSQL replaceable entities.
#[derive(Parser)]
#[command(name = "pgdrift")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database connection string.
    #[arg(short, long, env = "DATABASE_URL")]
    database: String,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare declared entities against the database and print the
    /// operations that reconcile it. Exits 1 when drift was found.
    Diff {
        /// SQL file or directory of .sql files declaring entities.
        #[arg(long, required = true)]
        sql: Vec<PathBuf>,

        /// Schema to observe even when no declared entity lives in it.
        #[arg(long = "schema")]
        schemas: Vec<String>,

        /// Schema to exclude from the comparison.
        #[arg(long = "exclude-schema")]
        exclude_schemas: Vec<String>,

        /// Observe every non-system schema in the database.
        #[arg(long)]
        include_schemas: bool,

        /// Output format for detected operations.
        #[arg(long, value_enum, default_value = "sql")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Executable DDL statements.
    Sql,
    /// Rust source for a revision file.
    Source,
    /// Machine-readable JSON.
    Json,
}

/// Expands a path argument into the .sql files it names.
fn collect_sql_files(path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let candidate = entry?.path();
        if candidate.extension().is_some_and(|ext| ext == "sql") {
            files.push(candidate);
        }
    }
    files.sort();
    Ok(files)
}

fn print_operations(operations: &[MigrationOperation], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Sql => {
            for operation in operations {
                println!("-- {}", operation.description());
                for statement in operation.to_sql()? {
                    println!("{statement};");
                }
            }
        }
        OutputFormat::Source => {
            for operation in operations {
                print!("{}", operation.render_for_migration());
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(operations)?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Diff {
            sql,
            schemas,
            exclude_schemas,
            include_schemas,
            format,
        } => {
            let mut registry = EntityRegistry::new();
            for path in &sql {
                for file in collect_sql_files(path)? {
                    let entity = ReplaceableEntity::from_path(&file)?;
                    info!(entity = %entity.identity(), file = %file.display(), "registered");
                    registry.register([entity]);
                }
            }
            registry.add_schemas(schemas);
            registry.add_exclude_schemas(exclude_schemas);

            let options = DiffOptions {
                include_schemas,
                ..DiffOptions::default()
            };

            let mut conn = PgConnection::connect(&cli.database).await?;
            // The whole comparison runs in a transaction that never
            // commits; the database is left untouched.
            let mut tx = conn.begin().await?;
            let operations =
                compare_registered_entities(&mut tx, &registry, &SchemaMetadata::new(), &options)
                    .await?;
            tx.rollback().await?;
            conn.close().await?;

            if operations.is_empty() {
                info!("no drift detected");
                return Ok(());
            }
            print_operations(&operations, format)?;
            std::process::exit(1)
        }
    }
}
