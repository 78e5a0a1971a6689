//! Output formatting
//!
//! - `text`: worker output blocks and the run summary on stdout
//! - `json`: machine-readable run summary

pub mod json;
pub mod text;
