//! Database access for cg-server
//!
//! Schema creation lives in `cg_common::db`; these modules hold the queries.

pub mod ebay;
pub mod logs;
pub mod parse_runs;
pub mod paypal;
pub mod records;
pub mod reference;
pub mod segments;
pub mod sessions;
pub mod settings;
