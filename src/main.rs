mod config;
mod database;
mod entities;
mod http_server;
mod logging;
mod ports;
mod services;
#[cfg(test)]
mod test_utils;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::{Result, eyre::Context};
use uuid::Uuid;

use crate::{
    config::Config,
    database::Database,
    entities::radio_station::StationType,
    logging::init_tracing,
    services::station::{StationFilter, StationService},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "RADIO_STREAMING_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Tracing filter, e.g. `info` or `radio_streaming=debug,tower_http=info`
    #[arg(long, default_value = "info", global = true, env = "LOG_LEVEL")]
    log_level: String,

    /// OTLP gRPC endpoint for traces and metrics (disabled when unset)
    #[arg(long, global = true, env = "OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API and consume download notifications
    Serve {
        /// The port to run the server on
        #[arg(short, long, default_value = "8080", env = "RADIO_STREAMING_HTTP_PORT")]
        port: u16,
    },
    /// Bring the catalog schema up to date
    Migrate,
    #[command(subcommand)]
    Stations(StationCommands),
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum StationCommands {
    /// Create a station
    Add {
        #[arg(short, long)]
        name: String,

        #[arg(short = 't', long = "type", value_enum)]
        station_type: StationType,

        /// Genre carried by a genre station
        #[arg(short, long)]
        genre: Option<String>,

        #[arg(short, long)]
        description: Option<String>,
    },
    /// List stations, including inactive ones
    List,
    /// Put a station back on air
    Activate { id: Uuid },
    /// Take a station off air
    Deactivate { id: Uuid },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let telemetry = init_tracing(
        "radio-streaming",
        args.otlp_endpoint.as_deref(),
        &args.log_level,
    )?;

    let result = run(args).await;
    telemetry.shutdown();
    result
}

async fn run(args: Args) -> Result<()> {
    let load_config = || {
        if let Some(config) = &args.config {
            Config::from_file(config)
        } else {
            Config::load()
        }
        .wrap_err("Failed to load radio-streaming config")
    };

    match args.command {
        Commands::Config(ConfigCommands::CreateDefault) => {
            let path = Config::create_default()?;
            tracing::info!(path = %path.display(), "Default config available");
        }
        Commands::Config(ConfigCommands::Path) => match Config::config_path() {
            Some(path) => println!("{}", path.display()),
            None => println!("No default config path found"),
        },
        Commands::Migrate => {
            let config = load_config()?;
            // Connecting runs the migrations
            Database::connect(&config.database_url()?).await?;
            tracing::info!("Catalog schema is up to date");
        }
        Commands::Stations(command) => {
            let config = load_config()?;
            let database = Database::connect(&config.database_url()?).await?;
            run_station_command(StationService::new(Arc::new(database)), command).await?;
        }
        Commands::Serve { port } => {
            let config = load_config()?;
            let database = Database::connect(&config.database_url()?).await?;
            tracing::info!(port, "Starting radio streaming service");
            http_server::app::start(port, database, config).await?;
        }
    }

    Ok(())
}

async fn run_station_command(stations: StationService, command: StationCommands) -> Result<()> {
    match command {
        StationCommands::Add {
            name,
            station_type,
            genre,
            description,
        } => {
            let station = stations
                .create_station(name, station_type, genre, description)
                .await?;
            println!("{}", station.id);
        }
        StationCommands::List => {
            let filter = StationFilter {
                active_only: false,
                ..Default::default()
            };
            for station in stations.list_stations(&filter).await? {
                println!(
                    "{}\t{:?}\t{}\t{}",
                    station.id,
                    station.station_type,
                    if station.is_active { "active" } else { "inactive" },
                    station.name
                );
            }
        }
        StationCommands::Activate { id } => {
            stations.set_active(id, true).await?;
        }
        StationCommands::Deactivate { id } => {
            stations.set_active(id, false).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_type_flag() {
        let args = Args::try_parse_from([
            "radio-streaming",
            "stations",
            "add",
            "--name",
            "Jazz",
            "--type",
            "genre",
            "--genre",
            "jazz",
        ])
        .unwrap();

        match args.command {
            Commands::Stations(StationCommands::Add {
                station_type, genre, ..
            }) => {
                assert_eq!(station_type, StationType::Genre);
                assert_eq!(genre.as_deref(), Some("jazz"));
            }
            other => panic!("expected stations add, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_station_type_is_rejected() {
        let result = Args::try_parse_from([
            "radio-streaming",
            "stations",
            "add",
            "--name",
            "Jazz",
            "-t",
            "classical",
        ]);
        assert!(result.is_err());
    }
}
