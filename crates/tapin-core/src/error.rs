use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Card identifier errors
    #[error("Invalid card id: {0}")]
    InvalidCardId(String),

    // Agent lifecycle errors
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
