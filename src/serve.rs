//! Purpose: Provide the HTTP server for the FX and interest rate datasets.
//! Exports: `ServeConfig`, `serve`.
//! Role: Axum-based read-only server; every data route renders JSON or CSV.
//! Invariants: Routes are GET-only and CORS-open for spreadsheet clients.
//! Invariants: Error envelopes are JSON with a stable `kind` string.
//! Notes: Rows are fetched and rendered in full per request; nothing is streamed.

use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::init_tracing;
use crate::source_config::SourceConfig;
use ratewire::api::{
    Dataset, Error, ErrorKind, OutputFormat, RateSource, Rendered, render_combined, render_dataset,
};

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub source: SourceConfig,
}

struct AppState {
    source: RateSource,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    config.source.validate()?;

    init_tracing();

    let source = config.source.open()?;
    let app = router(source.clone());

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message(format!("failed to bind {}", config.bind))
                .with_source(err)
        })?;
    tracing::info!(bind = %config.bind, source = %source.describe(), "listening");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    let result = tokio::select! {
        result = &mut server => result.map_err(server_error),
        _ = shutdown_signal() => {
            tracing::info!("shutting down");
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(server_error),
                Err(_) => Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out")),
            }
        }
    };
    source.close().await;
    result
}

pub(crate) fn router(source: RateSource) -> Router {
    let state = Arc::new(AppState { source });
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/data", get(combined_rates))
        .route("/api/fx-rates", get(fx_rates))
        .route("/api/interest-rates", get(interest_rates))
        .fallback(not_found)
        .layer(cors)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn server_error(err: std::io::Error) -> Error {
    Error::new(ErrorKind::Io)
        .with_message("server failed")
        .with_source(err)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler unavailable; ctrl-c only");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

/// First `format` value in the query string; repeats and unknown keys are ignored.
fn format_param(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == "format")
        .map(|(_, value)| value.into_owned())
}

fn negotiate(query: Option<&str>, headers: &HeaderMap) -> OutputFormat {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok());
    OutputFormat::negotiate(format_param(query).as_deref(), accept)
}

async fn healthz() -> Response {
    Json(json!({ "ok": true })).into_response()
}

async fn combined_rates(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let format = negotiate(query.as_deref(), &headers);
    let result = state
        .source
        .fetch_pair()
        .await
        .and_then(|(fx, interest)| {
            tracing::debug!(
                fx_rows = fx.len(),
                interest_rows = interest.len(),
                ?format,
                "rendering combined rates"
            );
            render_combined(format, &fx, &interest)
        });
    rendered_response(result)
}

async fn fx_rates(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    dataset_response(&state, &headers, query.as_deref(), Dataset::FxRates).await
}

async fn interest_rates(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    dataset_response(&state, &headers, query.as_deref(), Dataset::InterestRates).await
}

async fn dataset_response(
    state: &AppState,
    headers: &HeaderMap,
    query: Option<&str>,
    dataset: Dataset,
) -> Response {
    let format = negotiate(query, headers);
    let result = state.source.fetch(dataset).await.and_then(|records| {
        tracing::debug!(%dataset, rows = records.len(), ?format, "rendering dataset");
        render_dataset(format, &records)
    });
    rendered_response(result)
}

async fn not_found() -> Response {
    error_response(
        Error::new(ErrorKind::NotFound)
            .with_message("no such route")
            .with_hint("Use /api/data, /api/fx-rates, or /api/interest-rates."),
    )
}

fn rendered_response(result: Result<Rendered, Error>) -> Response {
    match result {
        Ok(rendered) => {
            let mut response = (StatusCode::OK, rendered.body).into_response();
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static(rendered.content_type),
            );
            response
        }
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dataset: Option<String>,
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Usage => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Query | ErrorKind::Io | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(err: Error) -> Response {
    let status = status_for(err.kind());
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    let body = ErrorEnvelope {
        error: ErrorBody {
            kind: format!("{:?}", err.kind()),
            message: err.message().unwrap_or("error").to_string(),
            hint: err.hint().map(str::to_string),
            dataset: err.dataset().map(str::to_string),
        },
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::{ServeConfig, format_param, negotiate, serve, status_for};
    use crate::source_config::SourceConfig;
    use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
    use ratewire::api::{ErrorKind, OutputFormat};

    #[tokio::test]
    async fn serve_rejects_missing_source() {
        let config = ServeConfig {
            bind: "127.0.0.1:0".parse().expect("bind"),
            source: SourceConfig {
                database_url: None,
                fixture: None,
                max_connections: 5,
                acquire_timeout_ms: 10_000,
            },
        };
        let err = serve(config).await.expect_err("expected usage error");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn query_format_beats_accept_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        assert_eq!(negotiate(Some("format=csv"), &headers), OutputFormat::Csv);
        assert_eq!(negotiate(None, &headers), OutputFormat::Json);
        assert_eq!(negotiate(Some("other=1"), &headers), OutputFormat::Json);
    }

    #[test]
    fn repeated_format_takes_first_value() {
        assert_eq!(
            format_param(Some("format=csv&format=json")).as_deref(),
            Some("csv")
        );
        assert_eq!(
            format_param(Some("x=1&format=application%2Fjson")).as_deref(),
            Some("application/json")
        );
        assert_eq!(format_param(Some("format")).as_deref(), Some(""));
        assert_eq!(format_param(Some("%zz&&=")), None);
        assert_eq!(format_param(None), None);
    }

    #[test]
    fn status_mapping() {
        assert_eq!(status_for(ErrorKind::Usage), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(ErrorKind::Unavailable),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(ErrorKind::Query),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
