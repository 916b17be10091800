mod aggregator;
mod config;
mod coverage;
mod sources;
mod storage;
mod transfer;
mod web;

use clap::{Parser, Subcommand};
use log::LevelFilter;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::process::ExitCode;

use crate::aggregator::Aggregator;
use crate::config::Config;
use crate::storage::{CachedStorage, SledStorage};
use crate::web::state::AppState;

#[derive(Parser)]
#[command(name = "flightradar")]
#[command(about = "Collects and serves ADS-B aircraft positions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect data from the feed and serve it over HTTP
    Run { config: String },
    /// Export all stored samples to a JSON lines file
    Export { config: String, destination: String },
    /// Import samples from a JSON lines file
    Import { config: String, source: String },
    /// Print the default configuration
    DefaultConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run(&config).await,
        Commands::Export {
            config,
            destination,
        } => export(&config, &destination),
        Commands::Import { config, source } => import(&config, &source),
        Commands::DefaultConfig => default_config(),
    }
}

fn init_logging(debug: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

/// Loads the config, sets up logging and opens the store.
fn initialize(path: &str) -> Result<(Config, SledStorage), ExitCode> {
    let config = match Config::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config {}: {}", path, e);
            return Err(ExitCode::FAILURE);
        }
    };

    init_logging(config.debug);

    if let Some(parent) = config.storage.path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("Error creating {}: {}", parent.display(), e);
            return Err(ExitCode::FAILURE);
        }
    }

    match SledStorage::open(&config.storage.path, config.storage.options()) {
        Ok(store) => Ok((config, store)),
        Err(e) => {
            eprintln!(
                "Error opening database {}: {}",
                config.storage.path.display(),
                e
            );
            Err(ExitCode::FAILURE)
        }
    }
}

async fn run(path: &str) -> ExitCode {
    let (config, store) = match initialize(path) {
        Ok(v) => v,
        Err(code) => return code,
    };

    let cached = CachedStorage::new(store, config.storage.cache_capacity);
    let (aggregator, _) = Aggregator::spawn(storage::shared(cached), config.aggregator.to_config());
    let _poller = sources::spawn_dump1090(config.feed.clone(), aggregator.clone());

    let station = config.station.position();
    let (stats, _) = coverage::spawn_stats(aggregator.clone(), config.stats.to_config(station));

    let state = AppState {
        aggregator,
        station,
        stats,
    };
    match web::run_server(&config.web.bind, state).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn export(path: &str, destination: &str) -> ExitCode {
    let (_, mut store) = match initialize(path) {
        Ok(v) => v,
        Err(code) => return code,
    };

    let file = match File::create(destination) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error creating {}: {}", destination, e);
            return ExitCode::FAILURE;
        }
    };

    match transfer::export(&mut store, BufWriter::new(file)) {
        Ok(count) => {
            println!("Exported {} samples", count);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Export failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn import(path: &str, source: &str) -> ExitCode {
    let (_, mut store) = match initialize(path) {
        Ok(v) => v,
        Err(code) => return code,
    };

    let file = match File::open(source) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error reading {}: {}", source, e);
            return ExitCode::FAILURE;
        }
    };

    let result = transfer::import(&mut store, BufReader::new(file));
    if let Err(e) = store.flush() {
        eprintln!("Error flushing database: {}", e);
        return ExitCode::FAILURE;
    }

    match result {
        Ok(count) => {
            println!("Imported {} samples", count);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Import failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn default_config() -> ExitCode {
    match Config::default().to_yaml() {
        Ok(yaml) => {
            print!("{}", yaml);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error rendering config: {}", e);
            ExitCode::FAILURE
        }
    }
}
