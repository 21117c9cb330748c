//! Purpose: Turn fetched rows into a response body in the negotiated format.
//! Exports: `Rendered`, `render_dataset`, `render_combined`.
//! Role: One rendering path for every endpoint and the export command.
//! Invariants: CSV output always goes through `core::delimited`.
//! Invariants: Combined JSON keys follow `Dataset::json_key`.

use serde_json::{Map, Value};

use crate::api::dataset::Dataset;
use crate::core::delimited::{Section, encode, encode_sections};
use crate::core::error::{Error, ErrorKind};
use crate::core::format::OutputFormat;
use crate::core::record::Record;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rendered {
    pub content_type: &'static str,
    pub body: String,
}

pub fn render_dataset(format: OutputFormat, records: &[Record]) -> Result<Rendered, Error> {
    let body = match format {
        OutputFormat::Csv => encode(records),
        OutputFormat::Json => to_json_string(&records)?,
    };
    Ok(Rendered {
        content_type: format.content_type(),
        body,
    })
}

pub fn render_combined(
    format: OutputFormat,
    fx: &[Record],
    interest: &[Record],
) -> Result<Rendered, Error> {
    let body = match format {
        OutputFormat::Csv => encode_sections(&[
            Section::new(Dataset::FxRates.label(), fx),
            Section::new(Dataset::InterestRates.label(), interest),
        ]),
        OutputFormat::Json => {
            let mut map = Map::new();
            map.insert(Dataset::FxRates.json_key().to_string(), to_json_value(fx)?);
            map.insert(
                Dataset::InterestRates.json_key().to_string(),
                to_json_value(interest)?,
            );
            to_json_string(&Value::Object(map))?
        }
    };
    Ok(Rendered {
        content_type: format.content_type(),
        body,
    })
}

fn to_json_value(records: &[Record]) -> Result<Value, Error> {
    serde_json::to_value(records).map_err(json_error)
}

fn to_json_string<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, Error> {
    serde_json::to_string(value).map_err(json_error)
}

fn json_error(err: serde_json::Error) -> Error {
    Error::new(ErrorKind::Internal)
        .with_message("failed to encode rows as JSON")
        .with_source(err)
}
