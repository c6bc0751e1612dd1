use farmer_lib::FieldError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// The wallet's state channel ended before the awaited condition held
    #[error("Wallet state stream closed")]
    StateStreamClosed,

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u128, available: u128 },

    #[error("Corrupt wallet snapshot: {0}")]
    CorruptSnapshot(String),

    /// A contract is missing one of the circuits this client calls
    #[error("Contract is missing circuit '{circuit}'")]
    ContractShape { circuit: &'static str },

    #[error("No contract deployed at {0}")]
    ContractNotFound(String),

    #[error("Contract error: {0}")]
    Contract(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Whether an interactive session can report this and keep going
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Field(_)
                | Self::InvalidAddress(_)
                | Self::TransactionFailed(_)
                | Self::InsufficientFunds { .. }
        )
    }

    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Wallet(_) => "WALLET_ERROR",
            Self::StateStreamClosed => "STATE_STREAM_CLOSED",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::CorruptSnapshot(_) => "CORRUPT_SNAPSHOT",
            Self::ContractShape { .. } => "CONTRACT_SHAPE",
            Self::ContractNotFound(_) => "CONTRACT_NOT_FOUND",
            Self::Contract(_) => "CONTRACT_ERROR",
            Self::TransactionFailed(_) => "TRANSACTION_FAILED",
            Self::InvalidAddress(_) => "INVALID_ADDRESS",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Field(inner) => inner.error_code(),
            Self::Network(_) => "NETWORK_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        Self::Config(format!("Invalid URL: {err}"))
    }
}
