use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagChatError>;

#[derive(Error, Debug)]
pub enum RagChatError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chat;
pub mod commands;
pub mod config;
pub mod database;
pub mod openai;
pub mod rag;
pub mod vectorizer;

#[cfg(test)]
mod testutil;
