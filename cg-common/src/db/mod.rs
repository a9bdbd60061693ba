//! Database initialization, schema and migrations

pub mod init;
pub mod migrations;
pub mod settings;

pub use init::*;
pub use migrations::run_migrations;
