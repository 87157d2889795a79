// ==========================================
// Paie - command line entry point
// ==========================================
// Results are printed as JSON on stdout, logs go to stderr
// ==========================================

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use payroll_ingest::api::ApiError;
use payroll_ingest::db::{DatabaseConfig, DEFAULT_POOL_SIZE};
use payroll_ingest::domain::ImportRequest;
use payroll_ingest::importer::{ChannelProgress, ProgressReporter};
use payroll_ingest::{i18n, logging, AppState};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "payroll-ingest", version, about = "Paie - ingestion et rapprochement")]
struct Cli {
    /// SQLite file (default: PAYROLL_DATABASE_URL, then the user data dir)
    #[arg(long, global = true)]
    db: Option<String>,

    #[arg(long, global = true, default_value_t = DEFAULT_POOL_SIZE)]
    pool_size: usize,

    /// Message language (fr, en)
    #[arg(long, global = true, default_value = i18n::DEFAULT_LOCALE)]
    locale: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a payroll file for one pay date
    Import {
        file: PathBuf,
        #[arg(long)]
        pay_date: NaiveDate,
        #[arg(long, default_value = "cli")]
        user: String,
        /// Apply the per-pay-code sign policy
        #[arg(long)]
        sign_policy: bool,
        #[arg(long)]
        client_key: Option<String>,
        #[arg(long)]
        no_save_profile: bool,
        /// Print progress events on stderr
        #[arg(long)]
        progress: bool,
    },
    /// Show the detected column mapping without writing anything
    Preview {
        file: PathBuf,
        #[arg(long)]
        client_key: Option<String>,
    },
    /// List pay periods
    Periods,
    /// KPI summary of a pay date (latest period when omitted)
    Kpi {
        #[arg(long)]
        pay_date: Option<NaiveDate>,
        #[arg(long)]
        details: bool,
    },
    /// Delete a period and everything attached to it
    DeletePeriod {
        #[arg(long)]
        pay_date: NaiveDate,
        #[arg(long, default_value = "cli")]
        user: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Close (or reopen) a period
    ClosePeriod {
        #[arg(long)]
        pay_date: NaiveDate,
        #[arg(long, default_value = "cli")]
        user: String,
        #[arg(long)]
        reopen: bool,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Technical error in the log, translated message for the operator
fn report(err: ApiError) -> anyhow::Error {
    tracing::error!(kind = err.kind(), error = %err, "command failed");
    let msg = err.user_message();
    anyhow::anyhow!("{}\n{}", msg.message, msg.solution)
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();
    i18n::set_locale(&cli.locale);

    let config = match &cli.db {
        Some(path) => DatabaseConfig::new(path),
        None => DatabaseConfig::from_env(),
    }
    .with_pool_size(cli.pool_size);

    tracing::info!(version = payroll_ingest::VERSION, db_path = %config.db_path, "{}", payroll_ingest::APP_NAME);

    let mut progress_task = None;
    let progress = match &cli.command {
        Command::Import { progress: true, .. } => {
            let (sink, mut rx) = ChannelProgress::new();
            progress_task = Some(tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    eprintln!("[{:>3}%] {}", event.percent, event.message);
                }
            }));
            ProgressReporter::with_sink(Arc::new(sink))
        }
        _ => ProgressReporter::none(),
    };

    let state = AppState::with_progress(config, progress)
        .map_err(report)
        .context("cannot open the payroll database")?;

    let outcome = run(&state, cli.command).await;
    let drained = state.shutdown();
    tracing::debug!(drained, "pool closed");
    // dropping the state closes the last progress sender
    drop(state);
    if let Some(task) = progress_task {
        let _ = task.await;
    }
    outcome
}

async fn run(state: &AppState, command: Command) -> Result<()> {
    match command {
        Command::Import {
            file,
            pay_date,
            user,
            sign_policy,
            client_key,
            no_save_profile,
            ..
        } => {
            let mut request = ImportRequest::new(file, pay_date, &user).with_sign_policy(sign_policy);
            request.save_profile = !no_save_profile;
            if let Some(key) = client_key.as_deref() {
                request = request.with_client_key(key);
            }

            let envelope = state.import_api.import_file(request).await.map_err(report)?;
            print_json(&envelope)?;
            if !envelope.is_success() {
                bail!("{}", envelope.message);
            }
        }
        Command::Preview { file, client_key } => {
            let preview = state.import_api.preview(file, client_key).await.map_err(report)?;
            print_json(&preview)?;
        }
        Command::Periods => {
            print_json(&state.period_api.list_periods().map_err(report)?)?;
        }
        Command::Kpi { pay_date, details } => {
            if details {
                print_json(&state.query_api.get_kpi_details(pay_date).map_err(report)?)?;
            } else {
                print_json(&state.query_api.get_kpis(pay_date).map_err(report)?)?;
            }
        }
        Command::DeletePeriod { pay_date, user, notes } => {
            let counts = state
                .period_api
                .delete_pay_date(pay_date, &user, notes.as_deref())
                .map_err(report)?;
            print_json(&counts)?;
        }
        Command::ClosePeriod { pay_date, user, reopen } => {
            let period = state
                .period_api
                .find_by_pay_date(pay_date)
                .map_err(report)?
                .ok_or_else(|| report(ApiError::NotFound(format!("pay_period {}", pay_date))))?;
            let period = if reopen {
                state.period_api.reopen_period(&period.period_id)
            } else {
                state.period_api.close_period(&period.period_id, &user)
            }
            .map_err(report)?;
            print_json(&period)?;
        }
    }
    Ok(())
}
