//! Purpose: Refresh the raw rate tables from FRED observation series.
//! Exports: `IngestConfig`, `IngestOutcome`, `ingest`, and the pure row transforms.
//! Role: Batch job behind `ratewire ingest`; the fact views read what it writes.
//! Invariants: A failing series is skipped; a group with no usable series fails the run.
//! Invariants: Each raw table is replaced inside one transaction.
//! Invariants: FX rows carry USD per one unit of the foreign currency and are always > 0.
//! Notes: FRED calls are blocking (`ureq`) and run on the blocking pool.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ratewire::api::{Error, ErrorKind, sqlx_error};
use serde::Deserialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use time::Date;
use time::macros::format_description;

pub const FRED_OBSERVATIONS_URL: &str = "https://api.stlouisfed.org/fred/series/observations";

/// Postgres caps bind parameters at 65535 per statement.
const INSERT_BATCH_ROWS: usize = 1000;

pub const INTEREST_SERIES: &[(&str, &str)] = &[
    ("DGS10", "10-Year Treasury Constant Maturity Rate"),
    ("DGS5", "5-Year Treasury Constant Maturity Rate"),
    ("DGS2", "2-Year Treasury Constant Maturity Rate"),
    ("DGS30", "30-Year Treasury Constant Maturity Rate"),
    ("DFF", "Federal Funds Effective Rate"),
    ("DEXUSEU", "U.S. / Euro Foreign Exchange Rate"),
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FxSeries {
    pub series_id: &'static str,
    pub currency: &'static str,
    /// Quoted as foreign units per USD; stored as its reciprocal.
    pub per_usd: bool,
}

impl FxSeries {
    const fn new(series_id: &'static str, currency: &'static str, per_usd: bool) -> Self {
        Self {
            series_id,
            currency,
            per_usd,
        }
    }
}

pub const FX_SERIES: &[FxSeries] = &[
    FxSeries::new("DEXUSEU", "EUR", false),
    FxSeries::new("DEXUSUK", "GBP", false),
    FxSeries::new("DEXJPUS", "JPY", true),
    FxSeries::new("DEXCAUS", "CAD", true),
    FxSeries::new("DEXUSAL", "AUD", false),
    FxSeries::new("DEXSZUS", "CHF", true),
    FxSeries::new("DEXCHUS", "CNY", true),
    FxSeries::new("DEXINUS", "INR", true),
];

#[derive(Clone, Debug)]
pub struct IngestConfig {
    pub database_url: String,
    pub api_key: String,
    pub start: Date,
    pub views: Option<PathBuf>,
    pub fred_url: String,
    pub timeout: Duration,
}

#[derive(Clone, Debug, Default)]
pub struct IngestOutcome {
    pub interest_rows: usize,
    pub fx_rows: usize,
    pub skipped_series: Vec<String>,
    pub views_applied: usize,
    pub views_failed: usize,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    pub date: Date,
    pub value: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InterestRow {
    pub date: Date,
    pub series_id: &'static str,
    pub series_name: &'static str,
    pub rate: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FxRow {
    pub date: Date,
    pub currency: &'static str,
    pub rate_to_usd: f64,
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<RawObservation>,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    date: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct FredErrorBody {
    error_message: String,
}

pub fn parse_date(value: &str) -> Result<Date, Error> {
    Date::parse(value, format_description!("[year]-[month]-[day]")).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid date '{value}'"))
            .with_hint("Use YYYY-MM-DD.")
            .with_source(err)
    })
}

/// FRED marks missing observations with `"."`.
pub fn parse_observations(body: &str) -> Result<Vec<Observation>, Error> {
    let response: ObservationsResponse = serde_json::from_str(body).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("unexpected FRED response shape")
            .with_source(err)
    })?;
    response
        .observations
        .into_iter()
        .map(|raw| {
            let date = parse_date(&raw.date)?;
            let value = raw.value.trim().parse::<f64>().ok();
            Ok(Observation { date, value })
        })
        .collect()
}

pub fn interest_rows(
    series_id: &'static str,
    series_name: &'static str,
    observations: &[Observation],
) -> Vec<InterestRow> {
    observations
        .iter()
        .map(|observation| InterestRow {
            date: observation.date,
            series_id,
            series_name,
            rate: observation.value.filter(|value| value.is_finite()),
        })
        .collect()
}

pub fn fx_rows(series: &FxSeries, observations: &[Observation]) -> Vec<FxRow> {
    observations
        .iter()
        .filter_map(|observation| {
            let raw = observation.value?;
            let rate_to_usd = if series.per_usd { 1.0 / raw } else { raw };
            (rate_to_usd.is_finite() && rate_to_usd > 0.0).then_some(FxRow {
                date: observation.date,
                currency: series.currency,
                rate_to_usd,
            })
        })
        .collect()
}

/// Statements from a views file; blank and comment-led statements are dropped.
pub fn split_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|statement| !statement.is_empty() && !statement.starts_with("--"))
        .collect()
}

pub fn observations_url(config: &IngestConfig, series_id: &str) -> Result<url::Url, Error> {
    let start = config.start.to_string();
    url::Url::parse_with_params(
        &config.fred_url,
        &[
            ("series_id", series_id),
            ("api_key", config.api_key.as_str()),
            ("file_type", "json"),
            ("observation_start", start.as_str()),
        ],
    )
    .map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid FRED url '{}'", config.fred_url))
            .with_source(err)
    })
}

fn fetch_series(
    agent: &ureq::Agent,
    config: &IngestConfig,
    series_id: &str,
) -> Result<Vec<Observation>, Error> {
    let url = observations_url(config, series_id)?;
    let response = agent.request_url("GET", &url).call().map_err(|err| match err {
        ureq::Error::Status(status, response) => {
            let detail = response
                .into_string()
                .ok()
                .and_then(|body| serde_json::from_str::<FredErrorBody>(&body).ok())
                .map(|body| body.error_message)
                .unwrap_or_else(|| "no detail".to_string());
            Error::new(ErrorKind::Query)
                .with_message(format!("FRED returned HTTP {status} for {series_id}: {detail}"))
        }
        // Transport errors embed the request URL, api_key included; keep only the kind.
        ureq::Error::Transport(transport) => Error::new(ErrorKind::Unavailable).with_message(
            format!("failed to reach FRED for {series_id}: {}", transport.kind()),
        ),
    })?;
    let body = response.into_string().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message(format!("failed to read FRED response for {series_id}"))
            .with_source(err)
    })?;
    parse_observations(&body)
}

struct Fetched {
    interest: Vec<InterestRow>,
    fx: Vec<FxRow>,
    skipped: Vec<String>,
}

fn fetch_all(config: &IngestConfig) -> Result<Fetched, Error> {
    let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
    let mut skipped = Vec::new();

    let mut interest = Vec::new();
    let mut interest_ok = 0usize;
    for &(series_id, series_name) in INTEREST_SERIES {
        match fetch_series(&agent, config, series_id) {
            Ok(observations) if !observations.is_empty() => {
                let rows = interest_rows(series_id, series_name, &observations);
                tracing::info!(series = series_id, rows = rows.len(), "fetched interest series");
                interest.extend(rows);
                interest_ok += 1;
            }
            Ok(_) => {
                tracing::warn!(series = series_id, "no observations");
                skipped.push(series_id.to_string());
            }
            Err(err) => {
                tracing::warn!(series = series_id, error = %err, "failed to fetch series");
                skipped.push(series_id.to_string());
            }
        }
    }
    if interest_ok == 0 {
        return Err(Error::new(ErrorKind::Unavailable)
            .with_message("no FRED data was successfully fetched")
            .with_hint("Check FRED_API_KEY and network access to api.stlouisfed.org."));
    }

    let mut fx = Vec::new();
    for series in FX_SERIES {
        match fetch_series(&agent, config, series.series_id) {
            Ok(observations) => {
                let rows = fx_rows(series, &observations);
                if rows.is_empty() {
                    tracing::warn!(series = series.series_id, "no valid FX observations");
                    skipped.push(series.series_id.to_string());
                } else {
                    tracing::info!(
                        series = series.series_id,
                        currency = series.currency,
                        rows = rows.len(),
                        "fetched FX series"
                    );
                    fx.extend(rows);
                }
            }
            Err(err) => {
                tracing::warn!(series = series.series_id, error = %err, "failed to fetch series");
                skipped.push(series.series_id.to_string());
            }
        }
    }
    if fx.is_empty() {
        return Err(Error::new(ErrorKind::Unavailable)
            .with_message("no FX data was successfully fetched")
            .with_hint("Check FRED_API_KEY and network access to api.stlouisfed.org."));
    }

    Ok(Fetched {
        interest,
        fx,
        skipped,
    })
}

const CREATE_TABLES: [&str; 2] = [
    "CREATE TABLE IF NOT EXISTS raw_fred_rates (
        date DATE NOT NULL,
        series_id VARCHAR(20) NOT NULL,
        series_name VARCHAR(200),
        rate NUMERIC(10, 4),
        PRIMARY KEY (date, series_id)
    )",
    "CREATE TABLE IF NOT EXISTS raw_fx_rates (
        date DATE NOT NULL,
        currency VARCHAR(10) NOT NULL,
        rate_to_usd NUMERIC(15, 6),
        PRIMARY KEY (date, currency)
    )",
];

async fn create_tables(pool: &PgPool) -> Result<(), Error> {
    for statement in CREATE_TABLES {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|err| sqlx_error(err, "failed to create raw tables"))?;
    }
    tracing::info!("raw tables created or verified");
    Ok(())
}

async fn replace_interest(pool: &PgPool, rows: &[InterestRow]) -> Result<(), Error> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|err| sqlx_error(err, "failed to start transaction"))?;
    sqlx::query("DELETE FROM raw_fred_rates")
        .execute(&mut *tx)
        .await
        .map_err(|err| sqlx_error(err, "failed to clear raw_fred_rates"))?;
    for chunk in rows.chunks(INSERT_BATCH_ROWS) {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO raw_fred_rates (date, series_id, series_name, rate) ");
        builder.push_values(chunk, |mut row_builder, row| {
            row_builder
                .push_bind(row.date)
                .push_bind(row.series_id)
                .push_bind(row.series_name)
                .push_bind(row.rate);
        });
        builder
            .build()
            .execute(&mut *tx)
            .await
            .map_err(|err| sqlx_error(err, "failed to write raw_fred_rates"))?;
    }
    tx.commit()
        .await
        .map_err(|err| sqlx_error(err, "failed to commit raw_fred_rates"))?;
    tracing::info!(rows = rows.len(), table = "raw_fred_rates", "wrote rows");
    Ok(())
}

async fn replace_fx(pool: &PgPool, rows: &[FxRow]) -> Result<(), Error> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|err| sqlx_error(err, "failed to start transaction"))?;
    sqlx::query("DELETE FROM raw_fx_rates")
        .execute(&mut *tx)
        .await
        .map_err(|err| sqlx_error(err, "failed to clear raw_fx_rates"))?;
    for chunk in rows.chunks(INSERT_BATCH_ROWS) {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO raw_fx_rates (date, currency, rate_to_usd) ");
        builder.push_values(chunk, |mut row_builder, row| {
            row_builder
                .push_bind(row.date)
                .push_bind(row.currency)
                .push_bind(row.rate_to_usd);
        });
        builder
            .build()
            .execute(&mut *tx)
            .await
            .map_err(|err| sqlx_error(err, "failed to write raw_fx_rates"))?;
    }
    tx.commit()
        .await
        .map_err(|err| sqlx_error(err, "failed to commit raw_fx_rates"))?;
    tracing::info!(rows = rows.len(), table = "raw_fx_rates", "wrote rows");
    Ok(())
}

/// Returns `(applied, failed)`; a failing statement does not stop the rest.
async fn apply_views(pool: &PgPool, path: &Path) -> Result<(usize, usize), Error> {
    let sql = std::fs::read_to_string(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message(format!("failed to read views file {}", path.display()))
            .with_source(err)
    })?;
    let mut applied = 0;
    let mut failed = 0;
    for statement in split_statements(&sql) {
        match sqlx::query(statement).execute(pool).await {
            Ok(_) => applied += 1,
            Err(err) => {
                tracing::warn!(error = %err, "failed to apply view statement");
                failed += 1;
            }
        }
    }
    tracing::info!(applied, failed, "views applied");
    Ok((applied, failed))
}

pub async fn ingest(config: IngestConfig) -> Result<IngestOutcome, Error> {
    if config.api_key.trim().is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("FRED_API_KEY not configured")
            .with_hint("Set FRED_API_KEY or pass --fred-api-key."));
    }
    if config.database_url.trim().is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("POSTGRES_URL not configured")
            .with_hint("Set POSTGRES_URL or pass --database-url."));
    }

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database_url)
        .await
        .map_err(|err| sqlx_error(err, "failed to connect to Postgres"))?;
    create_tables(&pool).await?;

    let fetch_config = config.clone();
    let fetched = tokio::task::spawn_blocking(move || fetch_all(&fetch_config))
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("FRED fetch task failed")
                .with_source(err)
        })??;

    replace_interest(&pool, &fetched.interest).await?;
    replace_fx(&pool, &fetched.fx).await?;

    let (views_applied, views_failed) = match &config.views {
        Some(path) => apply_views(&pool, path).await?,
        None => (0, 0),
    };
    pool.close().await;

    Ok(IngestOutcome {
        interest_rows: fetched.interest.len(),
        fx_rows: fetched.fx.len(),
        skipped_series: fetched.skipped,
        views_applied,
        views_failed,
    })
}
