use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("message has no content")]
    EmptyMessage,

    #[error("Arquivo muito grande. Máximo permitido: {} KB", limit / 1024)]
    FileTooLarge { size: u64, limit: u64 },

    #[error("failed to read attachment {path:?}: {source}")]
    Attachment {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to access settings {path:?}: {source}")]
    SettingsIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse settings {path:?}: {source}")]
    SettingsParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("could not determine config directory")]
    NoConfigDir,

    #[error("{0} API key not configured")]
    MissingApiKey(&'static str),
}

pub type Result<T> = std::result::Result<T, ChatError>;
