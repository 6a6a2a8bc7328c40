mod repository;

pub use repository::*;

/// SQL migration for the core ledger schema
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

/// SQL migration for inbox and flash messages
pub const MIGRATION_002_MESSAGES: &str = include_str!("migrations/002_messages.sql");
