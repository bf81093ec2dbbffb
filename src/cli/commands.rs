use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cli::args::{Cli, Commands, OutputFormat};
use crate::config::Settings;
use crate::error::Result;
use crate::models::{DateFilter, Reading};
use crate::processors::IngestionService;
use crate::readers::{BatchParser, LinePolicy};
use crate::server::{self, AppState};
use crate::store::{ReadingStore, SqliteStore};
use crate::utils::progress::ProgressReporter;

pub async fn run(cli: Cli) -> Result<()> {
    setup_logging(cli.verbose);

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        settings.database_path = database;
    }
    if cli.strict {
        settings.line_policy = LinePolicy::Strict;
    }

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                settings.host = host;
            }
            if let Some(port) = port {
                settings.port = port;
            }

            let service = open_service(&settings)?;
            server::serve(AppState::new(service), &settings).await?;
        }

        Commands::Ingest { files, quiet } => {
            let service = open_service(&settings)?;
            ingest_files(&service, &files, quiet || cli.verbose)?;
        }

        Commands::Query {
            year,
            month,
            day,
            format,
        } => {
            // Validate the filter before opening (and possibly creating) the database
            let filter = DateFilter::from_parts(year, month, day)?;
            let store = SqliteStore::open(&settings.database_path)?;
            let readings = store.query(&filter)?;
            info!("{} readings match {}", readings.len(), filter);

            let stdout = std::io::stdout();
            write_readings(&readings, format, stdout.lock())?;
        }
    }

    Ok(())
}

fn open_service(settings: &Settings) -> Result<IngestionService<SqliteStore>> {
    let store = Arc::new(SqliteStore::open(&settings.database_path)?);
    Ok(IngestionService::new(store)
        .with_parser(BatchParser::with_line_policy(settings.line_policy)))
}

/// Ingest each file as its own batch, stopping at the first failure.
fn ingest_files<S: ReadingStore>(
    service: &IngestionService<S>,
    files: &[PathBuf],
    silent: bool,
) -> Result<()> {
    let mut total = 0;

    for path in files {
        let progress = ProgressReporter::new_spinner(&format!("Ingesting {}", path.display()), silent);

        match service.ingest_file(path) {
            Ok(summary) => {
                progress.finish_with_message(&format!(
                    "{}: {}",
                    path.display(),
                    summary.message()
                ));
                if progress.is_silent() {
                    println!("{}: {}", path.display(), summary.message());
                }
                total += summary.stored;
            }
            Err(e) => {
                progress.abandon();
                eprintln!("{}: {}", path.display(), e);
                return Err(e);
            }
        }
    }

    println!("Stored {} readings from {} files", total, files.len());
    Ok(())
}

pub fn write_readings<W: Write>(readings: &[Reading], format: OutputFormat, writer: W) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let mut writer = writer;
            serde_json::to_writer_pretty(&mut writer, readings)?;
            writeln!(writer)?;
        }
        OutputFormat::Csv => {
            let mut csv_writer = csv::Writer::from_writer(writer);
            for reading in readings {
                csv_writer.serialize(reading)?;
            }
            csv_writer.flush()?;
        }
    }
    Ok(())
}

/// Set up structured logging on stderr. `RUST_LOG` overrides the default level.
pub fn setup_logging(verbose: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let log_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dronitor={},tower_http={}", log_level, log_level)));

    let initialized = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr),
        )
        .try_init();

    if initialized.is_ok() {
        debug!("Logging initialized at level: {}", log_level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::NamedTempFile;

    fn sample_readings() -> Vec<Reading> {
        let recorded_at = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        vec![
            Reading {
                id: 1,
                longitude: -73.935242,
                latitude: 40.73061,
                aqi: 42,
                recorded_at,
                raw_data: "-73.935242,40.730610,42".to_string(),
            },
            Reading {
                id: 2,
                longitude: -73.935242,
                latitude: 40.73061,
                aqi: 45,
                recorded_at,
                raw_data: "-73.935242,40.730610,45".to_string(),
            },
        ]
    }

    #[test]
    fn test_write_csv() -> Result<()> {
        let mut out = Vec::new();
        write_readings(&sample_readings(), OutputFormat::Csv, &mut out)?;
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "id,longitude,latitude,aqi,recorded_at,raw_data");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("1,-73.935242,40.73061,42,2024-03-09T12:00:00Z,"));
        Ok(())
    }

    #[test]
    fn test_write_json() -> Result<()> {
        let mut out = Vec::new();
        write_readings(&sample_readings(), OutputFormat::Json, &mut out)?;
        let parsed: Vec<Reading> = serde_json::from_slice(&out)?;

        assert_eq!(parsed, sample_readings());
        Ok(())
    }

    #[test]
    fn test_ingest_files_stops_at_first_bad_file() -> Result<()> {
        let service = IngestionService::new(Arc::new(SqliteStore::open_in_memory()?));

        let mut good = NamedTempFile::new()?;
        writeln!(good, "1,2,3")?;
        let mut bad = NamedTempFile::new()?;
        writeln!(bad, "1,2")?;
        let mut never = NamedTempFile::new()?;
        writeln!(never, "4,5,6")?;

        let files = vec![
            good.path().to_path_buf(),
            bad.path().to_path_buf(),
            never.path().to_path_buf(),
        ];
        assert!(ingest_files(&service, &files, true).is_err());
        assert_eq!(service.store().count()?, 1);
        Ok(())
    }
}
