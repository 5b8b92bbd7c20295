use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

/// Healthcare accessibility CLI tool
#[derive(Parser)]
#[command(name = "healthreach")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON dataset to query instead of PostGIS
    #[arg(short, long, env = "HEALTHREACH_DATASET", global = true)]
    dataset: Option<PathBuf>,

    /// Output results as JSON
    #[arg(short, long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Closest facility to a coordinate, by straight-line distance
    Nearest {
        /// Latitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: String,

        /// Longitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: String,

        /// Category tag (e.g. hospital) or stored label
        #[arg(short = 't', long = "type")]
        facility_type: Option<String>,
    },

    /// Five closest facilities to a coordinate or address
    Nearby {
        #[command(flatten)]
        origin: OriginArgs,

        /// Category substring
        #[arg(short = 't', long = "type")]
        facility_type: Option<String>,
    },

    /// Facility with the cheapest road route from a coordinate or address
    Network {
        #[command(flatten)]
        origin: OriginArgs,

        /// Category substring
        #[arg(short = 't', long = "type")]
        facility_type: Option<String>,
    },

    /// Shortest road route to a facility
    Route {
        #[command(flatten)]
        origin: OriginArgs,

        /// Target facility id (takes precedence over --name)
        #[arg(long)]
        id: Option<String>,

        /// Target facility name substring; the first match is used
        #[arg(long)]
        name: Option<String>,

        /// Leave the route geometry out of the output
        #[arg(long)]
        no_geometry: bool,
    },

    /// Population within a radius of a facility
    Buffer {
        /// Facility id (e.g. node/62357)
        id: String,

        /// Radius in meters
        #[arg(short, long, default_value = "1000")]
        radius: String,
    },

    /// Population by distance band to the nearest facility
    Stats {
        /// Category tag or stored label
        #[arg(short = 't', long = "type")]
        facility_type: Option<String>,
    },

    /// List facilities, optionally by category or name
    List {
        /// Category tag or stored label
        #[arg(short = 't', long = "type", conflicts_with = "name")]
        facility_type: Option<String>,

        /// Name substring
        #[arg(long)]
        name: Option<String>,
    },

    /// Show one facility, or per-category counts without an id
    Info {
        /// Facility id
        id: Option<String>,
    },

    /// Find the nearest facility for every row of a CSV file
    Batch {
        /// Input CSV file
        input: PathBuf,

        /// Output file (defaults to <input>_nearest.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Column name for latitude
        #[arg(long, default_value = "lat")]
        lat_col: String,

        /// Column name for longitude
        #[arg(long, default_value = "lon")]
        lon_col: String,

        /// Category tag or stored label
        #[arg(short = 't', long = "type")]
        facility_type: Option<String>,
    },
}

/// Where a query starts: coordinates, or an address for the geocoder.
#[derive(clap::Args)]
pub struct OriginArgs {
    /// Latitude in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    lat: Option<String>,

    /// Longitude in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    lon: Option<String>,

    /// Free-text address, geocoded when no coordinates are given
    #[arg(short, long)]
    address: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let service = commands::connect(cli.dataset)?;
    let json = cli.json;

    match cli.command {
        Commands::Nearest {
            lat,
            lon,
            facility_type,
        } => commands::nearest::run(&service, &lat, &lon, facility_type.as_deref(), json).await,
        Commands::Nearby {
            origin,
            facility_type,
        } => commands::nearby::run(&service, &origin, facility_type.as_deref(), json).await,
        Commands::Network {
            origin,
            facility_type,
        } => commands::network::run(&service, &origin, facility_type.as_deref(), json).await,
        Commands::Route {
            origin,
            id,
            name,
            no_geometry,
        } => {
            commands::route::run(
                &service,
                &origin,
                id.as_deref(),
                name.as_deref(),
                !no_geometry,
                json,
            )
            .await
        }
        Commands::Buffer { id, radius } => {
            commands::population::buffer(&service, &id, &radius, json).await
        }
        Commands::Stats { facility_type } => {
            commands::population::stats(&service, facility_type.as_deref(), json).await
        }
        Commands::List {
            facility_type,
            name,
        } => {
            commands::list::run(&service, facility_type.as_deref(), name.as_deref(), json).await
        }
        Commands::Info { id } => commands::info::run(&service, id.as_deref(), json).await,
        Commands::Batch {
            input,
            output,
            lat_col,
            lon_col,
            facility_type,
        } => {
            commands::batch::run(
                &service,
                input,
                output,
                &lat_col,
                &lon_col,
                facility_type.as_deref(),
            )
            .await
        }
    }
}
