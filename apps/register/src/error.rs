//! Error types for the register application.
//!
//! Checkout failures are not here: they are rendered to the operator and the
//! session continues. These are the errors that end the process.

use tally_db::DbError;

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Cashier '{0}' does not exist; run the seed tool or set register.cashier_id")]
    UnknownCashier(String),

    #[error("Cashier '{0}' is deactivated")]
    InactiveCashier(String),

    #[error("Terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
