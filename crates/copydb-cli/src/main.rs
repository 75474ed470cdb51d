//! copydb CLI - bulk data synchronization between relational databases.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use copydb::drivers::postgres::PgDriver;
use copydb::{CopyConfig, CopyError, CopyOrchestrator, Endpoint, EndpointConfig, SqlLog, SqlSession, Vendor};
use tokio::sync::watch;
use tracing::{error, info, Level};

#[derive(Parser)]
#[command(name = "copydb")]
#[command(about = "Copy tables and sequences between relational databases")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "copydb.yaml")]
    config: PathBuf,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Print the run report as JSON to stdout
    #[arg(long)]
    output_json: bool,

    /// Override the configured batch size
    #[arg(long)]
    batch_size: Option<usize>,

    /// Truncate target tables before copying
    #[arg(long)]
    truncate: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbosity.as_str() {
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut config = CopyConfig::load(&cli.config)?;
    if let Some(batch_size) = cli.batch_size {
        config.batch_size = batch_size;
    }
    if cli.truncate {
        config.truncate = true;
    }
    config.validate()?;

    let sql_log = SqlLog::from_config(config.log_sql);

    let source = connect(&config.source).await?;
    let target = connect(&config.target).await?;

    // Per-endpoint init hooks, then the global ones, all outside the
    // engine's transactional scope.
    if let Some(sql) = &config.source.init_sql {
        run_sql(source.as_ref(), sql, sql_log).await?;
    }
    if let Some(sql) = &config.target.init_sql {
        run_sql(target.as_ref(), sql, sql_log).await?;
    }
    if let Some(sql) = &config.init_sql {
        run_sql(target.as_ref(), sql, sql_log).await?;
    }
    if let Some(sql) = &config.pre_copy_sql {
        run_sql(target.as_ref(), sql, sql_log).await?;
    }

    let post_sql = config.post_sql.clone();

    let orchestrator = CopyOrchestrator::new(
        config,
        Endpoint::new(source.clone(), source.clone()),
        Endpoint::new(target.clone(), target.clone()),
    )?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Cancellation requested, stopping at the next batch boundary");
            let _ = cancel_tx.send(true);
        }
    });

    match orchestrator.run(Some(cancel_rx)).await {
        Ok(report) => {
            if let Some(sql) = &post_sql {
                run_sql(target.as_ref(), sql, sql_log).await?;
            }
            if cli.output_json {
                println!("{}", report.to_json()?);
            }
            if report.sequence_failures.is_empty() {
                Ok(ExitCode::SUCCESS)
            } else {
                error!(
                    "{} sequence(s) failed to synchronize",
                    report.sequence_failures.len()
                );
                Ok(ExitCode::FAILURE)
            }
        }
        Err(failure) => {
            error!("{}", failure);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn connect(config: &EndpointConfig) -> Result<Arc<PgDriver>, Box<dyn std::error::Error>> {
    match config.vendor()? {
        Vendor::Postgres => Ok(Arc::new(PgDriver::connect(config).await?)),
        other => Err(Box::new(CopyError::Config(format!(
            "no driver built in for vendor '{other}'"
        )))),
    }
}

/// Execute a free-form SQL hook: inline text, `@path`, or `file:path`.
async fn run_sql(
    session: &dyn SqlSession,
    sql_param: &str,
    log: SqlLog,
) -> Result<(), CopyError> {
    let sql = if let Some(path) = sql_param.strip_prefix('@') {
        std::fs::read_to_string(path)?
    } else if let Some(path) = sql_param.strip_prefix("file:") {
        std::fs::read_to_string(path)?
    } else {
        sql_param.to_string()
    };

    let statements = split_statements(&sql);
    if statements.is_empty() {
        return Ok(());
    }

    for statement in &statements {
        log.emit(statement);
    }

    let result = async {
        session.execute(&statements).await?;
        session.commit().await
    }
    .await;

    if let Err(e) = result {
        let _ = session.rollback().await;
        return Err(e);
    }
    Ok(())
}

/// Split a script into statements on `;`-terminated lines.
fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim_end();
        if trimmed.trim_start().starts_with("--") {
            continue;
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(trimmed);
        if trimmed.ends_with(';') {
            let statement = current.trim().trim_end_matches(';').trim().to_string();
            if !statement.is_empty() {
                statements.push(statement);
            }
            current.clear();
        }
    }

    let rest = current.trim().trim_end_matches(';').trim();
    if !rest.is_empty() {
        statements.push(rest.to_string());
    }
    statements
}
