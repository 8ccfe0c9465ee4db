// Configuration management module
// Loads the JSON settings file shared by the ingestion and chat commands

pub mod settings;

pub use settings::{
    Config, ConfigError, DEFAULT_CONFIG_PATH, DEFAULT_EMBEDDING_DIMENSION, IndexConfig,
    OpenAiConfig, StoreConfig,
};
