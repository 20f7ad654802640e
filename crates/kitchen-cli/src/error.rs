use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] kitchen_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error(
        "Sign in required. Run `kitchen auth login --email <email> --password <password> --next {from}`."
    )]
    LoginRequired { from: String },
    #[error(
        "Kitchen is not configured. Run `kitchen config init`, set SUPABASE_URL and SUPABASE_ANON_KEY, or pass --demo."
    )]
    NotConfigured,
    #[error("Item not found: {0}")]
    ItemNotFound(String),
    #[error("Item ID cannot be empty")]
    EmptyItemId,
    #[error("Nothing to change; pass at least one field to edit")]
    NothingToEdit,
    #[error("`{0}` is not available in demo mode")]
    DemoUnsupported(&'static str),
}

impl From<kitchen_core::auth::AuthError> for CliError {
    fn from(value: kitchen_core::auth::AuthError) -> Self {
        Self::Auth(value.to_string())
    }
}
