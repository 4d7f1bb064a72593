//! Event log migrations for `logs.duckdb`
//!
//! Kept separate from the ledger schema so the event log can be exported or
//! wiped without touching account data.

/// Log migrations in application order, embedded at compile time.
/// Format: (filename, sql_content)
pub const LOG_MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_initial_schema.sql", include_str!("001_initial_schema.sql")),
];
