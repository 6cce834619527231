use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Config error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown encoding: {0}")]
    UnknownEncoding(String),

    #[error("Malformed {encoding} text in {path}")]
    Decode { path: String, encoding: String },

    #[error("Illegal date format: {0}")]
    InvalidDate(String),

    #[error("Illegal amount on row {row}: {value:?}")]
    InvalidAmount { row: usize, value: String },

    #[error("No amount field (amount, +amount or -amount) is mapped")]
    NoAmountField,

    #[error("A lone -amount column is only valid for credit accounts")]
    AmountRequiresCredit,

    #[error("Add-on item without a preceding item in order {order_id} (row {row})")]
    OrphanAddOn { order_id: String, row: usize },

    #[error("Unknown issuer: {0}")]
    UnknownIssuer(String),

    #[error("Include cycle: {0}")]
    IncludeCycle(String),

    #[error("Illegal timezone format: {0}")]
    InvalidTimezone(String),

    #[error("Only CSV files are acceptable: {0}")]
    UnsupportedFile(String),

    #[error("Settings error: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, ConvError>;
