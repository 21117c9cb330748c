//! Purpose: Hold top-level CLI command dispatch for `ratewire`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Only `serve`, `export`, and `ingest` start a runtime; `csv` stays offline.

use super::*;

pub(super) fn dispatch_command(command: Command) -> Result<RunOutcome, Error> {
    match command {
        Command::Serve { bind, source } => {
            let config = serve::ServeConfig {
                bind: parse_bind(&bind)?,
                source: SourceConfig::from(source),
            };
            config.source.validate()?;
            let runtime = build_runtime()?;
            runtime.block_on(serve::serve(config))?;
            Ok(RunOutcome::ok())
        }
        Command::Export {
            target,
            format,
            source,
        } => {
            let config = SourceConfig::from(source);
            config.validate()?;
            init_tracing();
            let format = OutputFormat::from(format);
            let runtime = build_runtime()?;
            let rendered = runtime.block_on(async {
                let source = config.open()?;
                let result = match target {
                    ExportTarget::All => source
                        .fetch_pair()
                        .await
                        .and_then(|(fx, interest)| render_combined(format, &fx, &interest)),
                    ExportTarget::Fx => source
                        .fetch(Dataset::FxRates)
                        .await
                        .and_then(|records| render_dataset(format, &records)),
                    ExportTarget::Interest => source
                        .fetch(Dataset::InterestRates)
                        .await
                        .and_then(|records| render_dataset(format, &records)),
                };
                source.close().await;
                result
            })?;
            emit_document(&rendered.body)?;
            Ok(RunOutcome::ok())
        }
        Command::Csv { file } => {
            let input = read_input(file.as_ref())?;
            let value: Value = serde_json::from_str(&input).map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message("input is not valid JSON")
                    .with_hint("Provide a JSON array of objects, e.g. [{\"date\":\"2024-01-02\"}].")
                    .with_source(err)
            })?;
            let records = records_from_json(value)?;
            emit_document(&encode(&records))?;
            Ok(RunOutcome::ok())
        }
        Command::Ingest {
            database_url,
            fred_api_key,
            start,
            views,
            fred_url,
            timeout_ms,
        } => {
            let config = ingest::IngestConfig {
                database_url: database_url.unwrap_or_default(),
                api_key: fred_api_key.unwrap_or_default(),
                start,
                views,
                fred_url,
                timeout: Duration::from_millis(timeout_ms),
            };
            init_tracing();
            let runtime = build_runtime()?;
            let outcome = runtime.block_on(ingest::ingest(config))?;
            emit_json(json!({
                "ingest": {
                    "raw_fred_rates": outcome.interest_rows,
                    "raw_fx_rates": outcome.fx_rows,
                    "skipped_series": outcome.skipped_series,
                    "views": {
                        "applied": outcome.views_applied,
                        "failed": outcome.views_failed,
                    },
                }
            }));
            Ok(RunOutcome::ok())
        }
    }
}
