// Core modules: row model, CSV encoding, format negotiation, and error modeling.
pub mod delimited;
pub mod error;
pub mod format;
pub mod record;
