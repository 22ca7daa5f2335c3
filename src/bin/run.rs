//! sqlbridge-run
//!
//! Connects to one database, runs one SQL statement and prints the rows as
//! JSON. Failures print the classified error kind, SQLSTATE and whether a
//! retry could succeed, and exit with status 1.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use sqlbridge::{Config, ConnectionFactory, DriverError, Error, Param, Row};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Run one statement against MySQL, PostgreSQL or SQLite
#[derive(Parser, Debug)]
#[command(name = "sqlbridge-run", version, about, long_about = None)]
struct Cli {
    /// Connection URL (mysql://, postgres://, sqlite://...) or path to a JSON config file
    #[arg(env = "SQLBRIDGE_TARGET")]
    target: String,

    /// SQL statement to run
    sql: String,

    /// Positional parameters, bound as text
    params: Vec<String>,

    /// Password for JSON configs, which never store one
    #[arg(long, env = "SQLBRIDGE_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,sqlbridge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match smol::block_on(run(&cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    tracing::info!("Connecting to {}", config.database_type());

    let mut conn = ConnectionFactory::connect(config).await?;
    let params: Vec<Param> = cli.params.iter().map(|p| Param::from(p.as_str())).collect();
    let outcome = conn.run_query(&cli.sql, &params).await?;

    tracing::info!(
        "Query returned {} rows in {} ms",
        outcome.rows.len(),
        outcome.execution_time_ms
    );

    let output = serde_json::json!({
        "rows": outcome.rows.iter().map(Row::to_json).collect::<Vec<_>>(),
        "rows_affected": outcome.rows_affected,
        "execution_time_ms": outcome.execution_time_ms,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    if cli.target.contains("://") || cli.target.starts_with("sqlite:") {
        return Config::from_url(&cli.target).context("Invalid connection URL");
    }

    let path = Path::new(&cli.target);
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let mut config: Config = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;

    if let Some(password) = &cli.password {
        match &mut config {
            Config::Mysql(c) => c.password = password.clone(),
            Config::Pgsql(c) => c.password = password.clone(),
            Config::Sqlite(_) => tracing::warn!("Ignoring password for SQLite config"),
        }
    }

    Ok(config)
}

fn report(error: &anyhow::Error) {
    let driver_error = error
        .downcast_ref::<DriverError>()
        .or_else(|| error.downcast_ref::<Error>().and_then(Error::as_driver_error));

    match driver_error {
        Some(e) => {
            let output = serde_json::json!({
                "error": e.kind().as_str(),
                "sql_state": e.sql_state(),
                "retryable": e.is_retryable(),
                "query": e.query(),
                "message": e.message(),
            });
            eprintln!("{}", output);
        }
        None => eprintln!("error: {:#}", error),
    }
}
