use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dronitor")]
#[command(about = "Ingest and query drone air-quality readings")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(
        short,
        long,
        global = true,
        help = "Configuration file [default: ./dronitor.toml if present]"
    )]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "SQLite database path")]
    pub database: Option<PathBuf>,

    #[arg(long, global = true, help = "Reject blank lines inside uploads")]
    pub strict: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the upload and query HTTP API
    Serve {
        #[arg(long, help = "Bind address [default: 0.0.0.0]")]
        host: Option<String>,

        #[arg(short, long, help = "Listen port [default: 8000]")]
        port: Option<u16>,
    },

    /// Ingest reading files, one batch per file
    Ingest {
        #[arg(required = true, help = "Files of longitude,latitude,aqi lines")]
        files: Vec<PathBuf>,

        #[arg(short, long, help = "Hide the progress spinner")]
        quiet: bool,
    },

    /// Print stored readings, optionally filtered by date
    Query {
        #[arg(short, long)]
        year: Option<i32>,

        #[arg(short, long, help = "Requires --year")]
        month: Option<u32>,

        #[arg(short, long, help = "Requires --year and --month")]
        day: Option<u32>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Csv,
}
