//! Purpose: Name the two published datasets and their storage/presentation labels.
//! Exports: `Dataset`.
//! Role: Single table of per-dataset strings used by sources, renderers, and the CLI.
//! Invariants: Table names, CSV labels, and JSON keys are part of the public contract.

use std::fmt;
use std::str::FromStr;

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Dataset {
    FxRates,
    InterestRates,
}

impl Dataset {
    pub fn table(self) -> &'static str {
        match self {
            Dataset::FxRates => "fact_fx_rates_daily",
            Dataset::InterestRates => "fact_interest_rates_daily",
        }
    }

    /// Section label in combined CSV documents.
    pub fn label(self) -> &'static str {
        match self {
            Dataset::FxRates => "FX_Rates",
            Dataset::InterestRates => "Interest_Rates",
        }
    }

    /// Key in combined JSON documents and fixture files.
    pub fn json_key(self) -> &'static str {
        match self {
            Dataset::FxRates => "fx_rates",
            Dataset::InterestRates => "interest_rates",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Dataset::FxRates => "fx",
            Dataset::InterestRates => "interest",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dataset {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "fx" | "fx_rates" | "fx-rates" => Ok(Dataset::FxRates),
            "interest" | "interest_rates" | "interest-rates" => Ok(Dataset::InterestRates),
            _ => Err(Error::new(ErrorKind::Usage)
                .with_message(format!("unknown dataset '{value}'"))
                .with_hint("Use one of: fx, interest.")),
        }
    }
}
