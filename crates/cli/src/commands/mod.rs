//! CLI subcommands.

pub mod categories;
pub mod migrate;

use secrecy::SecretString;

/// Environment variable holding the marketplace database URL.
pub const DATABASE_URL_VAR: &str = "CYCLEMART_DATABASE_URL";

/// Read the database URL, loading `.env` first.
pub fn database_url() -> Option<SecretString> {
    dotenvy::dotenv().ok();
    std::env::var(DATABASE_URL_VAR)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .map(SecretString::from)
}
