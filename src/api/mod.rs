//! Purpose: Define the public Rust API boundary for ratewire.
//! Exports: Row model, encoder, datasets, sources, and rendering needed by the CLI.
//! Role: Public, additive-only surface; hides internal module layout.
//! Invariants: Callers reach core types only through these re-exports.

mod dataset;
mod render;
mod source;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::delimited::{Section, encode, encode_cell, encode_sections};
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::format::OutputFormat;
pub use crate::core::record::{Number, Record, Value, records_from_json};
pub use dataset::Dataset;
pub use render::{Rendered, render_combined, render_dataset};
pub use source::{FixtureSource, PgOptions, PgSource, RateSource};
#[doc(hidden)]
pub use source::sqlx_error;
