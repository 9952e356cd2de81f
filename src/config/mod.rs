/// Catalog seeding configuration loaded from config.toml
pub mod catalog;

/// Database configuration and connection management
pub mod database;
