//! Purpose: Pick the response representation from a request's format hints.
//! Exports: `OutputFormat`.
//! Role: Shared by HTTP handlers and the export command so both negotiate identically.
//! Invariants: CSV is the default whenever JSON was not asked for.

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OutputFormat {
    Json,
    #[default]
    Csv,
}

impl OutputFormat {
    /// An explicit `format` value wins over the `Accept` header.
    pub fn negotiate(format_param: Option<&str>, accept: Option<&str>) -> Self {
        let requested = format_param
            .filter(|value| !value.trim().is_empty())
            .or(accept);
        match requested {
            Some(value) if Self::wants_json(value) => OutputFormat::Json,
            _ => OutputFormat::Csv,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Json => "application/json",
            OutputFormat::Csv => "text/csv; charset=utf-8",
        }
    }

    fn wants_json(value: &str) -> bool {
        let value = value.trim().to_ascii_lowercase();
        value == "json" || value.contains("application/json")
    }
}

#[cfg(test)]
mod tests {
    use super::OutputFormat;

    #[test]
    fn defaults_to_csv() {
        assert_eq!(OutputFormat::negotiate(None, None), OutputFormat::Csv);
        assert_eq!(OutputFormat::negotiate(None, Some("*/*")), OutputFormat::Csv);
        assert_eq!(OutputFormat::negotiate(Some(""), None), OutputFormat::Csv);
    }

    #[test]
    fn accept_header_selects_json() {
        let accept = "text/html, application/json;q=0.9";
        assert_eq!(OutputFormat::negotiate(None, Some(accept)), OutputFormat::Json);
    }

    #[test]
    fn format_param_overrides_accept() {
        assert_eq!(
            OutputFormat::negotiate(Some("csv"), Some("application/json")),
            OutputFormat::Csv
        );
        assert_eq!(
            OutputFormat::negotiate(Some("application/json"), Some("text/csv")),
            OutputFormat::Json
        );
        assert_eq!(OutputFormat::negotiate(Some("JSON"), None), OutputFormat::Json);
    }

    #[test]
    fn content_types() {
        assert_eq!(OutputFormat::Json.content_type(), "application/json");
        assert!(OutputFormat::Csv.content_type().starts_with("text/csv"));
    }
}
