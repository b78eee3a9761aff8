use anyhow::{Context, Result};
use bookstore_core::logging::{self, LogLevel};
use bookstore_core::{catalog, BookStore, MemoryStore, MongoStore, QueryDriver, StoreConfig};
use clap::{Parser, Subcommand, ValueEnum};
use std::io;
use std::process::ExitCode;
use tracing::debug;

#[derive(Parser)]
#[command(name = "bookstore")]
#[command(about = "Bookstore walkthrough - CRUD, queries, aggregation and indexing on a books collection")]
#[command(version)]
struct Cli {
    /// MongoDB connection string
    #[arg(long, global = true, env = "MONGODB_URI")]
    uri: Option<String>,
    /// Database name
    #[arg(long, global = true)]
    database: Option<String>,
    /// Collection name
    #[arg(long, global = true)]
    collection: Option<String>,
    /// Log level (error, warn, info, debug, trace); overrides BOOKSTORE_LOG and RUST_LOG
    #[arg(long, global = true, value_parser = parse_log_level)]
    log_level: Option<LogLevel>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the query walkthrough and print the report
    Run {
        /// Store to run against; the memory store is pre-seeded with the sample catalog
        #[arg(long, value_enum, default_value_t = Backend::Mongo)]
        backend: Backend,
    },
    /// Insert the sample catalog into the MongoDB collection
    Seed {
        /// Delete every document in the collection first
        #[arg(long)]
        drop: bool,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    Mongo,
    Memory,
}

fn parse_log_level(s: &str) -> std::result::Result<LogLevel, String> {
    LogLevel::parse(s).ok_or_else(|| format!("unknown log level '{}'", s))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_level);

    let mut config = StoreConfig::from_env();
    if let Some(uri) = cli.uri {
        config = config.with_uri(uri);
    }
    if let Some(database) = cli.database {
        config = config.with_database(database);
    }
    if let Some(collection) = cli.collection {
        config = config.with_collection(collection);
    }

    let command = cli.command.unwrap_or(Commands::Run {
        backend: Backend::Mongo,
    });
    let outcome = match command {
        Commands::Run { backend } => run_report(&config, backend),
        Commands::Seed { drop } => seed(&config, drop),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

fn error_report(err: &anyhow::Error) -> String {
    format!("Error occurred: {:#}", err)
}

/// The one user-facing report of a failure; the log line stays below the default level
fn report_error(err: &anyhow::Error) {
    debug!(error = ?err, "bookstore command failed");
    eprintln!("{}", error_report(err));
}

fn open_store(config: &StoreConfig, backend: Backend) -> Result<Box<dyn BookStore>> {
    match backend {
        Backend::Mongo => {
            let store = MongoStore::connect(config)
                .with_context(|| format!("Failed to connect to {}", config.namespace()))?;
            Ok(Box::new(store))
        }
        Backend::Memory => {
            let store = MemoryStore::new(config.collection.clone());
            catalog::seed_catalog(&store, false).context("Failed to seed in-memory store")?;
            Ok(Box::new(store))
        }
    }
}

/// Connect, run every step, then release the connection whatever happened
fn run_report(config: &StoreConfig, backend: Backend) -> Result<()> {
    let mut store = None;
    let outcome = connect_and_run(config, backend, &mut store);
    if let Err(err) = &outcome {
        report_error(err);
    }
    drop(store);
    println!("\nConnection closed");
    outcome
}

fn connect_and_run(
    config: &StoreConfig,
    backend: Backend,
    slot: &mut Option<Box<dyn BookStore>>,
) -> Result<()> {
    let store = slot.insert(open_store(config, backend)?);
    match backend {
        Backend::Mongo => println!("Connected to MongoDB server\n"),
        Backend::Memory => println!("Connected to in-memory store\n"),
    }

    let stdout = io::stdout();
    QueryDriver::new(&**store, stdout.lock())
        .run_all()
        .context("Query walkthrough aborted")
}

fn seed(config: &StoreConfig, drop_existing: bool) -> Result<()> {
    let outcome = MongoStore::connect(config)
        .with_context(|| format!("Failed to connect to {}", config.namespace()))
        .and_then(|store| {
            let inserted = catalog::seed_catalog(&store, drop_existing)
                .context("Failed to seed sample catalog")?;
            println!("Inserted {} books into {}", inserted, store.namespace());
            Ok(())
        });
    if let Err(err) = &outcome {
        report_error(err);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookstore_core::BookstoreError;

    #[test]
    fn test_connect_failure_reported_once() {
        let config = StoreConfig::default().with_uri("mongodb://localhost:notaport");
        let err = MongoStore::connect(&config).err().unwrap();
        let detail = match &err {
            BookstoreError::Database(inner) => inner.to_string(),
            other => panic!("expected a database error, got {}", other),
        };

        let err = anyhow::Error::new(err).context("Failed to connect to plp_bookstore.books");
        let report = error_report(&err);
        assert!(report.starts_with("Error occurred: Failed to connect to plp_bookstore.books: "));
        assert_eq!(report.matches(detail.as_str()).count(), 1);
    }

    #[test]
    fn test_log_level_flag() {
        let cli = Cli::try_parse_from(["bookstore", "--log-level", "debug", "run"]).unwrap();
        assert_eq!(cli.log_level, Some(LogLevel::Debug));
        assert!(Cli::try_parse_from(["bookstore", "--log-level", "loud"]).is_err());
    }
}
