//! Purpose: Shared library crate used by the `ratewire` CLI and tests.
//! Exports: `api` (records, CSV encoding, datasets, sources, rendering, errors).
//! Role: Everything except argument parsing, HTTP wiring, and FRED ingestion.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
