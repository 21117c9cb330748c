//! Purpose: Encode ordered records as one comma-delimited text document.
//! Exports: `encode`, `encode_cell`, `encode_sections`, `Section`.
//! Role: The only place cell escaping happens; HTTP and CLI paths both call it.
//! Invariants: Columns come from the first record, in its order; never sorted.
//! Invariants: Empty input encodes to the empty string (no header-only output).
//! Invariants: Lines are joined by `\n` with no trailing newline.
//! Invariants: Pure and infallible; no I/O, no state across calls.

use std::borrow::Cow;

use crate::core::record::{Record, Value};

/// A labeled block inside a composed document.
#[derive(Clone, Copy, Debug)]
pub struct Section<'a> {
    pub label: &'a str,
    pub records: &'a [Record],
}

impl<'a> Section<'a> {
    pub fn new(label: &'a str, records: &'a [Record]) -> Self {
        Self { label, records }
    }
}

pub fn encode(records: &[Record]) -> String {
    let Some(first) = records.first() else {
        return String::new();
    };
    let columns: Vec<&str> = first.columns().collect();

    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(columns.join(","));
    for record in records {
        let cells: Vec<Cow<'_, str>> = columns
            .iter()
            .map(|column| encode_cell(record.get(column)))
            .collect();
        lines.push(cells.join(","));
    }
    lines.join("\n")
}

/// Missing and null values are empty; anything containing `,`, `"` or `\n` is quoted.
pub fn encode_cell(value: Option<&Value>) -> Cow<'_, str> {
    let text: Cow<'_, str> = match value {
        None | Some(Value::Null) => return Cow::Borrowed(""),
        Some(Value::Text(text)) => Cow::Borrowed(text.as_str()),
        Some(Value::Bool(value)) => Cow::Owned(value.to_string()),
        Some(Value::Number(number)) => Cow::Owned(number.to_string()),
    };
    if text.contains([',', '"', '\n']) {
        Cow::Owned(format!("\"{}\"", text.replace('"', "\"\"")))
    } else {
        text
    }
}

/// Label each non-empty section and separate sections with a blank line.
pub fn encode_sections(sections: &[Section<'_>]) -> String {
    let blocks: Vec<String> = sections
        .iter()
        .filter_map(|section| {
            let body = encode(section.records);
            if body.is_empty() {
                None
            } else {
                Some(format!("{}\n{body}", section.label))
            }
        })
        .collect();
    blocks.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::{Section, encode, encode_cell, encode_sections};
    use crate::core::record::{Record, Value};

    #[test]
    fn empty_input_is_empty_document() {
        assert_eq!(encode(&[]), "");
    }

    #[test]
    fn null_rate_renders_empty_trailing_cell() {
        let rows = [
            Record::new().with("date", "2024-01-01").with("rate", 1.05),
            Record::new().with("date", "2024-01-02").with("rate", Value::Null),
        ];
        assert_eq!(encode(&rows), "date,rate\n2024-01-01,1.05\n2024-01-02,");
    }

    #[test]
    fn extreme_floats_use_exponent_form() {
        let rows = [
            Record::new().with("x", 1e21),
            Record::new().with("x", 1e-7),
            Record::new().with("x", 2.5),
        ];
        assert_eq!(encode(&rows), "x\n1e+21\n1e-7\n2.5");
    }

    #[test]
    fn commas_and_quotes_are_escaped() {
        let rows = [
            Record::new().with("note", "a,b"),
            Record::new().with("note", "he said \"hi\""),
        ];
        assert_eq!(encode(&rows), "note\n\"a,b\"\n\"he said \"\"hi\"\"\"");
    }

    #[test]
    fn newline_forces_quoting() {
        let value = Value::from("line one\nline two");
        assert_eq!(encode_cell(Some(&value)), "\"line one\nline two\"");
    }

    #[test]
    fn carriage_return_alone_is_not_quoted() {
        let value = Value::from("a\rb");
        assert_eq!(encode_cell(Some(&value)), "a\rb");
    }

    #[test]
    fn plain_text_is_borrowed_unquoted() {
        let value = Value::from("EUR");
        assert!(matches!(encode_cell(Some(&value)), std::borrow::Cow::Borrowed("EUR")));
        assert_eq!(encode_cell(None), "");
        assert_eq!(encode_cell(Some(&Value::Null)), "");
        assert_eq!(encode_cell(Some(&Value::Bool(false))), "false");
    }

    #[test]
    fn first_record_fixes_columns() {
        let rows = [
            Record::new().with("b", 1i64).with("a", 2i64),
            Record::new().with("a", 3i64).with("extra", "x"),
        ];
        assert_eq!(encode(&rows), "b,a\n1,2\n,3");
    }

    #[test]
    fn keyless_first_record_yields_empty_lines() {
        let rows = [Record::new(), Record::new().with("a", 1i64)];
        assert_eq!(encode(&rows), "\n\n");
    }

    #[test]
    fn sections_skip_empty_datasets() {
        let interest = [Record::new().with("rate", 4.5)];
        let doc = encode_sections(&[Section::new("A", &[]), Section::new("B", &interest)]);
        assert_eq!(doc, "B\nrate\n4.5");
    }

    #[test]
    fn sections_are_separated_by_blank_line() {
        let fx = [Record::new().with("currency", "EUR")];
        let interest = [Record::new().with("series_id", "DGS10")];
        let doc = encode_sections(&[
            Section::new("FX_Rates", &fx),
            Section::new("Interest_Rates", &interest),
        ]);
        assert_eq!(doc, "FX_Rates\ncurrency\nEUR\n\nInterest_Rates\nseries_id\nDGS10");
    }

    #[test]
    fn all_sections_empty_is_empty_document() {
        assert_eq!(encode_sections(&[Section::new("A", &[]), Section::new("B", &[])]), "");
    }
}
