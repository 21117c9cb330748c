//! Purpose: Resolve CLI/env source settings into a concrete `RateSource`.
//! Exports: `SourceConfig`.
//! Role: Keep `serve` and `export` source selection aligned from one place.
//! Invariants: Exactly one of database URL or fixture path is configured.

use std::path::PathBuf;
use std::time::Duration;

use ratewire::api::{Error, ErrorKind, FixtureSource, PgOptions, PgSource, RateSource};

#[derive(Clone, Debug)]
pub struct SourceConfig {
    pub database_url: Option<String>,
    pub fixture: Option<PathBuf>,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
}

impl SourceConfig {
    pub fn validate(&self) -> Result<(), Error> {
        let database_url = self
            .database_url
            .as_deref()
            .filter(|url| !url.trim().is_empty());
        match (database_url, &self.fixture) {
            (None, None) => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("POSTGRES_URL not configured")
                    .with_hint("Set POSTGRES_URL, pass --database-url, or use --fixture <file>."));
            }
            (Some(_), Some(_)) => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("--database-url and --fixture are mutually exclusive")
                    .with_hint("Pick one source; unset POSTGRES_URL when serving a fixture."));
            }
            _ => {}
        }
        if self.max_connections == 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("--max-connections must be greater than zero")
                .with_hint("Use a positive value like 5."));
        }
        if self.acquire_timeout_ms == 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("--acquire-timeout-ms must be greater than zero")
                .with_hint("Use a positive value like 10000."));
        }
        Ok(())
    }

    /// Must be called inside a tokio runtime when a database URL is configured.
    pub fn open(&self) -> Result<RateSource, Error> {
        self.validate()?;
        if let Some(path) = &self.fixture {
            return Ok(RateSource::Fixture(FixtureSource::load(path)?));
        }
        let url = self.database_url.as_deref().unwrap_or_default();
        let options = PgOptions {
            max_connections: self.max_connections,
            acquire_timeout: Duration::from_millis(self.acquire_timeout_ms),
        };
        Ok(RateSource::Postgres(PgSource::connect_lazy(url, options)?))
    }
}
