//! Purpose: Contract tests for the CSV encoder against an independent RFC 4180 parser.
//! Exports: None (integration test module).
//! Role: Prove encoded documents parse back to the same cells, column by column.
//! Invariants: Nulls and missing keys come back as empty strings; nothing else changes.

use ratewire::api::{Record, Value, encode, encode_cell};

fn parse(document: &str) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(document.as_bytes());
    let headers = reader
        .headers()
        .expect("headers")
        .iter()
        .map(str::to_string)
        .collect();
    let rows = reader
        .records()
        .map(|row| row.expect("row").iter().map(str::to_string).collect())
        .collect();
    (headers, rows)
}

fn expected_cell(value: Option<&Value>) -> String {
    value.and_then(Value::to_text).unwrap_or_default()
}

#[test]
fn awkward_text_round_trips_through_csv_parser() {
    let awkward = [
        "plain",
        "a,b",
        "he said \"hi\"",
        "multi\nline",
        "\"",
        ",,,",
        "trailing space ",
        "unicode: €/¥",
        "",
    ];
    let records: Vec<Record> = awkward
        .iter()
        .enumerate()
        .map(|(index, text)| {
            Record::new()
                .with("id", index as i64)
                .with("note", *text)
                .with("flag", index % 2 == 0)
        })
        .collect();

    let document = encode(&records);
    let (headers, rows) = parse(&document);
    assert_eq!(headers, ["id", "note", "flag"]);
    assert_eq!(rows.len(), records.len());
    for (record, row) in records.iter().zip(&rows) {
        let expected: Vec<String> = ["id", "note", "flag"]
            .iter()
            .map(|column| expected_cell(record.get(column)))
            .collect();
        assert_eq!(row, &expected);
    }
}

#[test]
fn nulls_and_missing_keys_round_trip_as_empty() {
    let records = vec![
        Record::new()
            .with("date", "2024-01-03")
            .with("currency", "JPY")
            .with("rate_to_usd", 0.00689),
        Record::new()
            .with("date", "2024-01-02")
            .with("currency", Value::Null),
        Record::new()
            .with("rate_to_usd", 1.09)
            .with("date", "2024-01-01")
            .with("ignored", "x"),
    ];
    let (headers, rows) = parse(&encode(&records));
    assert_eq!(headers, ["date", "currency", "rate_to_usd"]);
    assert_eq!(rows[0], ["2024-01-03", "JPY", "0.00689"]);
    assert_eq!(rows[1], ["2024-01-02", "", ""]);
    assert_eq!(rows[2], ["2024-01-01", "", "1.09"]);
}

#[test]
fn quoted_cells_match_doubling_rule() {
    let cases = ["a,b", "say \"x\"", "x\ny", "\"\""];
    for text in cases {
        let value = Value::from(text);
        let cell = encode_cell(Some(&value));
        assert_eq!(cell, format!("\"{}\"", text.replace('"', "\"\"")));
    }
}

#[test]
fn header_follows_first_record_order() {
    let records = vec![
        Record::new().with("zeta", 1i64).with("alpha", 2i64).with("mid", 3i64),
        Record::new().with("alpha", 5i64).with("mid", 6i64).with("zeta", 4i64),
    ];
    let document = encode(&records);
    let first_line = document.lines().next().expect("header");
    assert_eq!(first_line, "zeta,alpha,mid");
    assert!(document.ends_with("4,5,6"));
    assert!(!document.ends_with('\n'));
}
