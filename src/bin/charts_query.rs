//! Charts Query - inspect and maintain a charts database
//!
//! Usage:
//!   charts_query query <device_id> 1700000000 [1700086400] --fields celsius,humidity --output list
//!   charts_query purge <device_id> 1700000000
//!   charts_query delete <device_id>
//!   charts_query schema <device_id>
//!
//! Results are printed as JSON on stdout, logs go to stderr.

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::info;
use sensorcharts::{ChartStore, ChartsConfig, OutputFormat, QueryOptions, SortOrder};

#[derive(Parser)]
#[command(name = "charts_query")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, env = "CHARTS_DB_PATH")]
    db_path: Option<String>,

    /// Byte budget before query results get averaged
    #[arg(long, env = "CHARTS_MAX_DATA_SIZE")]
    max_data_size: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read samples of a device in a time range
    Query {
        device_id: String,

        /// Range start, epoch seconds
        start: i64,

        /// Range end, epoch seconds (default: now)
        end: Option<i64>,

        /// Comma separated field names (default: all)
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,

        /// dict or list
        #[arg(long, default_value = "dict")]
        output: OutputFormat,

        /// asc or desc
        #[arg(long, default_value = "asc")]
        sort: SortOrder,

        #[arg(long)]
        limit: Option<usize>,

        /// Return raw rows even when over the size budget
        #[arg(long)]
        no_average: bool,
    },

    /// Delete samples older than a timestamp
    Purge {
        device_id: String,

        /// Cutoff, epoch seconds; older samples are removed
        cutoff: i64,
    },

    /// Delete a device and all of its samples
    Delete { device_id: String },

    /// Show the stored layout of a device
    Schema { device_id: String },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let mut config = ChartsConfig::from_env();
    if let Some(db_path) = cli.db_path {
        config = config.with_db_path(db_path);
    }
    if let Some(max_data_size) = cli.max_data_size {
        config = config.with_max_data_size(max_data_size);
    }

    let store = ChartStore::open(&config.db_path, &config)?;

    match cli.command {
        Commands::Query {
            device_id,
            start,
            end,
            fields,
            output,
            sort,
            limit,
            no_average,
        } => {
            let end = end.unwrap_or_else(|| chrono::Utc::now().timestamp());
            let mut options = QueryOptions::default()
                .with_fields(fields)
                .with_output(output)
                .with_sort(sort)
                .with_average(!no_average);
            if let Some(limit) = limit {
                options = options.with_limit(limit);
            }

            let result = store.query(&device_id, start, end, &options)?;
            info!("📊 {} points for device {}", result.data.len(), device_id);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Purge { device_id, cutoff } => {
            let removed = store.purge(&device_id, cutoff)?;
            println!("{}", serde_json::json!({ "device_id": device_id, "removed": removed }));
        }
        Commands::Delete { device_id } => {
            let deletion = store.delete_device(&device_id)?;
            println!(
                "{}",
                serde_json::json!({
                    "device_id": device_id,
                    "samples_removed": deletion.samples_removed,
                    "schema_removed": deletion.schema_removed,
                })
            );
        }
        Commands::Schema { device_id } => {
            let schema = store.schema(&device_id)?;
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
    }

    Ok(())
}
