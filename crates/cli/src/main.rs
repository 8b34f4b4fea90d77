// iter8 CLI - sheet snapshots, single-cell edits and LLM enrichment

mod exit_codes;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;

use iter8_cli::enrich::{run_enrichment, EnrichOptions, Enricher};
use iter8_cli::value_arg::parse_cell_value;
use iter8_config::job::EnrichJob;
use iter8_config::secrets::ResolvedLlmConfig;
use iter8_config::settings::Settings;
use iter8_config::ConfigError;
use iter8_llm::{LlmClient, LlmError};
use iter8_sheet::{DataSheet, MemoryWorksheet, Record, SheetError, UpdateError, UpdateOutcome, Worksheet};
use iter8_sheets_client::{load_auth, RemoteWorksheet, SheetsClient, SheetsError, TOKEN_ENV};

use exit_codes::{
    sheet_read_exit_code, sheets_exit_code, EXIT_AUTH, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE, EXIT_WRITE,
};

#[derive(Parser)]
#[command(name = "iter8")]
#[command(about = "Load Google Sheets, sync changed cells back, enrich rows with an LLM")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_COMMIT_HASH"), ")"))]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Settings file (default: ~/.config/iter8/settings.json)
    #[arg(long, global = true, env = "ITER8_SETTINGS", value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Google credentials JSON (overrides sheets.credentials_path)
    #[arg(long, global = true, env = "ITER8_GOOGLE_CREDENTIALS", value_name = "PATH")]
    credentials: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List spreadsheets in a Drive folder
    Files {
        /// Drive folder ID
        #[arg(long)]
        folder: String,
    },

    /// Print a worksheet as JSON records
    #[command(after_help = "\
Examples:
  iter8 show --spreadsheet 1AbC... --sheet step-00
  iter8 show --spreadsheet 1AbC... --sheet step-00 --limit 5 | jq '.[].en'")]
    Show {
        /// Spreadsheet key
        #[arg(long)]
        spreadsheet: String,

        /// Worksheet title
        #[arg(long)]
        sheet: String,

        /// Print at most this many rows
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Set one cell and write it back
    #[command(after_help = "\
Rows are 0-based data rows: --row 0 is sheet row 2. A new --column is appended.
Values: TRUE/FALSE are booleans, numbers are numbers, null clears the cell,
anything else (formulas included) is written as typed.

Examples:
  iter8 set --spreadsheet 1AbC... --sheet step-00 --row 1 --column verse --value 'something funny'
  iter8 set --spreadsheet 1AbC... --sheet step-00 --row 3 --column works --value TRUE")]
    Set {
        #[arg(long)]
        spreadsheet: String,

        #[arg(long)]
        sheet: String,

        /// 0-based data row
        #[arg(long)]
        row: usize,

        #[arg(long)]
        column: String,

        #[arg(long, allow_hyphen_values = true)]
        value: String,
    },

    /// Enrich every row with an LLM call and write the results back
    #[command(after_help = "\
The job file is TOML:

  prompt = \"\"\"Translate {en} into Chinese. Reply as {\"ch\": \"...\"}\"\"\"
  skip_when_filled = [\"ch\"]

{record} expands to the whole row as JSON, {column} to one field.
Each key of the JSON reply is written to the column of that name.")]
    Enrich {
        #[arg(long)]
        spreadsheet: String,

        #[arg(long)]
        sheet: String,

        /// Job file (TOML)
        #[arg(long, value_name = "PATH")]
        job: PathBuf,

        /// Concurrent LLM calls (default: job, then settings)
        #[arg(long)]
        workers: Option<usize>,

        /// Completed rows per sheet write (default: job, then settings)
        #[arg(long)]
        batch: Option<usize>,

        /// Enrich one batch and print the cells that would be written
        #[arg(long)]
        dry_run: bool,
    },

    /// Settings location and effective configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the settings file path
    Path,
    /// Print the effective configuration (no secrets)
    Show,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    let settings_path = cli.settings.clone().unwrap_or_else(Settings::config_path);
    let ctx = Context {
        settings: Settings::load_from(&settings_path),
        settings_path,
        credentials: cli.credentials.clone(),
    };

    let result = match cli.command {
        Commands::Files { folder } => cmd_files(&ctx, &folder),
        Commands::Show { spreadsheet, sheet, limit } => cmd_show(&ctx, &spreadsheet, &sheet, limit),
        Commands::Set { spreadsheet, sheet, row, column, value } => {
            cmd_set(&ctx, &spreadsheet, &sheet, row, &column, &value)
        }
        Commands::Enrich { spreadsheet, sheet, job, workers, batch, dry_run } => {
            cmd_enrich(&ctx, &spreadsheet, &sheet, &job, workers, batch, dry_run)
        }
        Commands::Config { command } => match command {
            ConfigCommands::Path => cmd_config_path(&ctx),
            ConfigCommands::Show => cmd_config_show(&ctx),
        },
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn init_logging(quiet: bool) {
    let default_filter = if quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_target(false)
        .init();
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self { code: EXIT_AUTH, message: msg.into(), hint: None }
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Sheets / Drive API failure outside a snapshot load.
    pub fn sheets(err: SheetsError) -> Self {
        let code = sheets_exit_code(&err);
        let hint = (code == EXIT_AUTH).then(credentials_hint);
        Self { code, message: err.to_string(), hint }
    }

    /// Snapshot load failure.
    pub fn read(err: SheetError) -> Self {
        let code = sheet_read_exit_code(&err);
        let hint = (code == EXIT_AUTH).then(credentials_hint);
        Self { code, message: err.to_string(), hint }
    }

    /// Failure leaving an update scope.
    pub fn update(err: UpdateError<SheetError>) -> Self {
        match err {
            UpdateError::Scope(e @ SheetError::RowOutOfRange { .. }) => Self::args(e.to_string()),
            UpdateError::Scope(e) => Self::other(e.to_string()),
            UpdateError::Write(e) => Self {
                code: EXIT_WRITE,
                message: e.to_string(),
                hint: Some("the sheet may hold part of this batch; check it with `iter8 show`".to_string()),
            },
        }
    }

    pub fn config(err: ConfigError) -> Self {
        Self::args(err.to_string())
    }

    pub fn llm(err: LlmError, config: &ResolvedLlmConfig) -> Self {
        match err {
            LlmError::MissingKey => Self::auth(err.to_string())
                .with_hint(config.blocking_reason().unwrap_or_default()),
            other => Self::other(other.to_string()),
        }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn credentials_hint() -> String {
    format!(
        "set {} or pass --credentials <google_auth.json> (token, sheets_api_base, drive_api_base)",
        TOKEN_ENV
    )
}

struct Context {
    settings: Settings,
    settings_path: PathBuf,
    credentials: Option<PathBuf>,
}

impl Context {
    fn credentials_path(&self) -> Option<&Path> {
        self.credentials
            .as_deref()
            .or(self.settings.sheets.credentials_path.as_deref())
    }

    fn sheets_client(&self) -> Result<SheetsClient, CliError> {
        let creds = load_auth(self.credentials_path())
            .map_err(|e| CliError::auth(e.to_string()).with_hint(credentials_hint()))?;
        SheetsClient::new(creds).map_err(CliError::sheets)
    }

    fn load_sheet(&self, spreadsheet: &str, sheet: &str) -> Result<DataSheet<RemoteWorksheet>, CliError> {
        let client = self.sheets_client()?;
        DataSheet::from_sheet(&client, spreadsheet, sheet).map_err(CliError::read)
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::other(format!("failed to serialize output: {}", e)))?;
    println!("{}", text);
    Ok(())
}

// ============================================================================
// files / show
// ============================================================================

fn cmd_files(ctx: &Context, folder: &str) -> Result<(), CliError> {
    let client = ctx.sheets_client()?;
    let files = client.list_spreadsheet_files(folder).map_err(CliError::sheets)?;
    print_json(&files)
}

fn cmd_show(ctx: &Context, spreadsheet: &str, sheet: &str, limit: Option<usize>) -> Result<(), CliError> {
    let data = ctx.load_sheet(spreadsheet, sheet)?;
    let records: Vec<Record> = data
        .table()
        .records()
        .take(limit.unwrap_or(usize::MAX))
        .collect();
    print_json(&records)
}

// ============================================================================
// set
// ============================================================================

fn cmd_set(
    ctx: &Context,
    spreadsheet: &str,
    sheet: &str,
    row: usize,
    column: &str,
    value: &str,
) -> Result<(), CliError> {
    if column.trim().is_empty() {
        return Err(CliError::args("--column must not be empty"));
    }
    let value = parse_cell_value(value);

    let mut data = ctx.load_sheet(spreadsheet, sheet)?;
    let outcome = data
        .update(|table| table.set(row, column, value))
        .map_err(CliError::update)?;

    print_json(&outcome_json(&outcome))
}

fn outcome_json(outcome: &UpdateOutcome) -> serde_json::Value {
    match outcome {
        UpdateOutcome::NoChanges => json!({ "status": "no_changes", "headers": 0, "cells": 0 }),
        UpdateOutcome::Applied { headers, cells } => {
            json!({ "status": "applied", "headers": headers, "cells": cells })
        }
    }
}

// ============================================================================
// enrich
// ============================================================================

fn cmd_enrich(
    ctx: &Context,
    spreadsheet: &str,
    sheet: &str,
    job_path: &Path,
    workers: Option<usize>,
    batch: Option<usize>,
    dry_run: bool,
) -> Result<(), CliError> {
    if workers == Some(0) || batch == Some(0) {
        return Err(CliError::args("--workers and --batch must be at least 1"));
    }

    let job = EnrichJob::load(job_path).map_err(CliError::config)?;

    let llm_config = ResolvedLlmConfig::from_settings(&ctx.settings.llm);
    let llm = LlmClient::new(&llm_config).map_err(|e| CliError::llm(e, &llm_config))?;
    log::debug!("LLM config: {:?}", llm_config);

    let mut opts = EnrichOptions {
        workers: workers.or(job.workers).unwrap_or(ctx.settings.pipeline.workers),
        update_batch_size: batch
            .or(job.update_batch_size)
            .unwrap_or(ctx.settings.pipeline.update_batch_size),
        skip_when_filled: job.skip_when_filled.clone(),
        max_rows: None,
    };

    let data = ctx.load_sheet(spreadsheet, sheet)?;
    let rows = 0..data.len();

    let job = Arc::new(job);
    let enricher: Enricher = Arc::new(move |_row: usize, record: &Record| -> Result<Record, String> {
        let prompt = job.render_prompt(record);
        llm.complete_json(&prompt).map_err(|e| e.to_string())
    });

    if dry_run {
        let (table, remote) = data.into_parts();
        let preview_sheet = MemoryWorksheet::from_table(remote.title(), &table);
        let mut preview = DataSheet::with_table(table, preview_sheet);
        opts.max_rows = Some(opts.update_batch_size);

        let report = run_enrichment(&mut preview, rows, enricher, &opts);
        let updates: Vec<_> = preview.worksheet().batches().into_iter().flatten().collect();
        return print_json(&json!({ "dry_run": true, "report": report, "updates": updates }));
    }

    let mut data = data;
    let report = run_enrichment(&mut data, rows, enricher, &opts);
    print_json(&report)?;

    if report.failed_flushes > 0 {
        return Err(CliError {
            code: EXIT_WRITE,
            message: format!("{} of {} batch writes failed", report.failed_flushes, report.flushes),
            hint: Some("re-run to retry; rows that were written are skipped when the job sets skip_when_filled".into()),
        });
    }
    Ok(())
}

// ============================================================================
// config
// ============================================================================

fn cmd_config_path(ctx: &Context) -> Result<(), CliError> {
    println!("{}", ctx.settings_path.display());
    Ok(())
}

fn cmd_config_show(ctx: &Context) -> Result<(), CliError> {
    let llm = ResolvedLlmConfig::from_settings(&ctx.settings.llm);
    let google_credentials = match ctx.credentials_path() {
        Some(path) => path.display().to_string(),
        None => iter8_sheets_client::auth_file_path()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
    };
    let token_from_env = std::env::var(TOKEN_ENV).is_ok_and(|t| !t.is_empty());

    print_json(&json!({
        "settings_path": ctx.settings_path.display().to_string(),
        "settings": ctx.settings,
        "llm": {
            "model": llm.model,
            "endpoint": llm.endpoint,
            "key_present": llm.api_key.is_some(),
            "key_source": llm.key_source.as_str(),
        },
        "google": {
            "credentials_path": google_credentials,
            "token_from_env": token_from_env,
        },
    }))
}
