use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Errors raised while talking to the chain: log queries, views and transactions.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("rpc request failed: {0}")]
    Rpc(String),

    #[error("failed to decode {event} log: {reason}")]
    Decode { event: &'static str, reason: String },

    #[error("invalid address {0}")]
    InvalidAddress(String),

    #[error("block {0} not found")]
    BlockNotFound(u64),

    #[error("failed to submit transaction: {0}")]
    SubmissionFailed(String),

    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: String },

    #[error("no signer configured")]
    NoSigner,
}

/// Errors from the off-chain price service.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("price service request failed: {0}")]
    Request(String),

    #[error("price service returned no update data for feed {feed_id}")]
    EmptyPayload { feed_id: String },

    #[error("invalid price update payload: {0}")]
    InvalidPayload(String),

    #[error("price service unavailable after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

/// Errors raised by the keeper engine itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeeperError {
    #[error("{account} is not tracked by the {policy} index")]
    UntrackedEntity {
        policy: &'static str,
        account: String,
    },

    #[error("value {value} does not fit the fixed point range")]
    Overflow { value: String },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Keeper(#[from] KeeperError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
