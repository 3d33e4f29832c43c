use thiserror::Error;

use crate::model::LinkId;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Link not found: {namespace}/{name}")]
    UnknownName { namespace: String, name: String },

    #[error("Link not found: {0}")]
    NotFound(LinkId),

    #[error("Store call failed: {0}")]
    Transport(String),

    #[error("Store rejected request: {0}")]
    Rejected(String),

    #[error("Invalid store response: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
