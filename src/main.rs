//! Purpose: `ratewire` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, writes documents to stdout.
//! Invariants: Data documents go to stdout untouched; logs and errors go to stderr.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
use std::io::{self, IsTerminal, Read, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod ingest;
mod serve;
mod source_config;

use ratewire::api::{
    Dataset, Error, ErrorKind, OutputFormat, encode, records_from_json, render_combined,
    render_dataset, to_exit_code,
};
use source_config::SourceConfig;

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint("Run `ratewire --help` or `ratewire <command> --help`."),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    command_dispatch::dispatch_command(cli.command)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let first = rendered.lines().next().unwrap_or("invalid arguments");
    first.trim_start_matches("error: ").trim().to_string()
}

#[derive(Parser)]
#[command(
    name = "ratewire",
    version,
    about = "Serve daily FX and interest rate tables as JSON or CSV",
    long_about = None,
    after_help = r#"EXAMPLES
  $ ratewire serve --bind 127.0.0.1:3000            # uses POSTGRES_URL
  $ curl -H 'Accept: application/json' localhost:3000/api/interest-rates
  $ ratewire export all > rates.csv
  $ ratewire ingest --views sql/views.sql           # uses POSTGRES_URL and FRED_API_KEY
  $ echo '[{"note":"a,b"}]' | ratewire csv

ROUTES
  /api/data             FX + interest (two labeled CSV sections, or one JSON object)
  /api/fx-rates         FX only
  /api/interest-rates   interest only
  CSV unless ?format=json or Accept: application/json"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        global = true,
        help = "Colorize error labels on a terminal"
    )]
    color: ColorMode,
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ExportTarget {
    Fx,
    Interest,
    All,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Csv,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(Args, Clone, Debug)]
struct SourceArgs {
    #[arg(
        long,
        env = "POSTGRES_URL",
        hide_env_values = true,
        help = "Postgres connection URL"
    )]
    database_url: Option<String>,
    #[arg(
        long,
        value_hint = ValueHint::FilePath,
        help = "Serve rows from a JSON file instead of Postgres"
    )]
    fixture: Option<PathBuf>,
    #[arg(long, default_value_t = 5, help = "Maximum pooled database connections")]
    max_connections: u32,
    #[arg(
        long,
        default_value_t = 10_000,
        help = "How long a request waits for a pooled connection"
    )]
    acquire_timeout_ms: u64,
}

impl From<SourceArgs> for SourceConfig {
    fn from(args: SourceArgs) -> Self {
        SourceConfig {
            database_url: args.database_url,
            fixture: args.fixture,
            max_connections: args.max_connections,
            acquire_timeout_ms: args.acquire_timeout_ms,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Run the HTTP server",
        after_help = r#"EXAMPLES
  $ POSTGRES_URL=postgres://app@db/rates ratewire serve
  $ ratewire serve --bind 0.0.0.0:8080 --fixture demo.json"#
    )]
    Serve {
        #[arg(
            long,
            env = "RATEWIRE_BIND",
            default_value = "127.0.0.1:3000",
            help = "Address to listen on"
        )]
        bind: String,
        #[command(flatten)]
        source: SourceArgs,
    },
    #[command(
        about = "Print a dataset to stdout",
        after_help = r#"EXAMPLES
  $ ratewire export fx
  $ ratewire export all --format json"#
    )]
    Export {
        #[arg(value_enum, help = "Which dataset to export")]
        target: ExportTarget,
        #[arg(long, value_enum, default_value = "csv")]
        format: FormatArg,
        #[command(flatten)]
        source: SourceArgs,
    },
    #[command(
        about = "Convert a JSON array of objects to CSV",
        long_about = r#"Convert a JSON array of objects (file or stdin) to CSV.

Columns come from the first object's keys in document order.
Piped output has no trailing newline; a terminal gets one after the last row."#
    )]
    Csv {
        #[arg(value_hint = ValueHint::FilePath, help = "Input file (default: stdin)")]
        file: Option<PathBuf>,
    },
    #[command(
        about = "Refresh raw rate tables from FRED",
        after_help = r#"NOTES
  - Writes raw_fred_rates and raw_fx_rates, replacing their contents.
  - --views runs each ;-separated statement; failures are logged, not fatal."#
    )]
    Ingest {
        #[arg(
            long,
            env = "POSTGRES_URL",
            hide_env_values = true,
            help = "Postgres connection URL"
        )]
        database_url: Option<String>,
        #[arg(long, env = "FRED_API_KEY", hide_env_values = true, help = "FRED API key")]
        fred_api_key: Option<String>,
        #[arg(
            long,
            default_value = "2000-01-01",
            value_parser = parse_start_date,
            help = "First observation date (YYYY-MM-DD)"
        )]
        start: time::Date,
        #[arg(long, value_hint = ValueHint::FilePath, help = "SQL file with view definitions")]
        views: Option<PathBuf>,
        #[arg(long, default_value = ingest::FRED_OBSERVATIONS_URL, hide = true)]
        fred_url: String,
        #[arg(long, default_value_t = 30_000, help = "Per-request FRED timeout")]
        timeout_ms: u64,
    },
}

fn parse_start_date(value: &str) -> Result<time::Date, String> {
    ingest::parse_date(value).map_err(|err| err.message().unwrap_or("invalid date").to_string())
}

fn parse_bind(value: &str) -> Result<SocketAddr, Error> {
    value.parse().map_err(|_| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid bind address '{value}'"))
            .with_hint("Use a host:port value like 127.0.0.1:3000.")
    })
}

fn build_runtime() -> Result<tokio::runtime::Runtime, Error> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to start runtime")
                .with_source(err)
        })
}

pub(crate) fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn read_input(file: Option<&PathBuf>) -> Result<String, Error> {
    match file {
        Some(path) => std::fs::read_to_string(path).map_err(|err| {
            let kind = if err.kind() == io::ErrorKind::NotFound {
                ErrorKind::NotFound
            } else {
                ErrorKind::Io
            };
            Error::new(kind)
                .with_message(format!("failed to read {}", path.display()))
                .with_source(err)
        }),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to read stdin")
                    .with_source(err)
            })?;
            Ok(buf)
        }
    }
}

/// Piped output is the document byte for byte; a terminal also gets a final newline.
fn emit_document(body: &str) -> Result<(), Error> {
    let mut stdout = io::stdout().lock();
    let result = if !body.is_empty() && stdout.is_terminal() {
        writeln!(stdout, "{body}")
    } else {
        stdout.write_all(body.as_bytes())
    };
    result.and_then(|_| stdout.flush()).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to write stdout")
            .with_source(err)
    })
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Retry with RUST_LOG=debug and share the command if it persists.",
    )
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    err.message()
        .map(str::to_string)
        .unwrap_or_else(|| format!("{:?}", err.kind()))
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut current = err.source();
    while let Some(source) = current {
        causes.push(source.to_string());
        current = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(dataset) = err.dataset() {
        inner.insert("dataset".to_string(), json!(dataset));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));
    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(dataset) = err.dataset() {
        lines.push(format!(
            "{} {dataset}",
            colorize_label("dataset:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }
    lines.join("\n")
}
