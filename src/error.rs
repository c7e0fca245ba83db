use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PennyError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: String, available: String },

    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("Inventory is full ({0} items)")]
    CapacityExceeded(usize),

    #[error("Item {0} is not in your inventory")]
    NotOwned(u32),

    #[error("Account {0} is closed")]
    AccountClosed(String),

    #[error("Invalid username or password")]
    Auth,

    #[error("Only an admin can {0}")]
    Forbidden(String),

    #[error("{0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

pub type Result<T> = std::result::Result<T, PennyError>;

/// Stable error classification handed to whatever presents the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidAmount,
    InsufficientFunds,
    UnknownCurrency,
    CapacityExceeded,
    NotOwned,
    AccountClosed,
    Auth,
    Forbidden,
    Invalid,
    Io,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::InvalidAmount => "invalid_amount",
            Self::InsufficientFunds => "insufficient_funds",
            Self::UnknownCurrency => "unknown_currency",
            Self::CapacityExceeded => "capacity_exceeded",
            Self::NotOwned => "not_owned",
            Self::AccountClosed => "account_closed",
            Self::Auth => "auth",
            Self::Forbidden => "forbidden",
            Self::Invalid => "invalid",
            Self::Io => "io",
        }
    }
}

impl PennyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::InvalidAmount(_) => ErrorKind::InvalidAmount,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::UnknownCurrency(_) => ErrorKind::UnknownCurrency,
            Self::CapacityExceeded(_) => ErrorKind::CapacityExceeded,
            Self::NotOwned(_) => ErrorKind::NotOwned,
            Self::AccountClosed(_) => ErrorKind::AccountClosed,
            Self::Auth | Self::Hash(_) => ErrorKind::Auth,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Invalid(_) | Self::Settings(_) => ErrorKind::Invalid,
            Self::Io(_) | Self::Json(_) | Self::Csv(_) => ErrorKind::Io,
        }
    }
}
