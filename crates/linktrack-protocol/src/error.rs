use linktrack_core::error::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GraphQL error: {0}")]
    Graphql(String),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Response is missing `{0}`")]
    MissingField(&'static str),
}

impl From<ProtocolError> for CoreError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::Http(e) => CoreError::Transport(e.to_string()),
            ProtocolError::Graphql(msg) => CoreError::Rejected(msg),
            ProtocolError::Decode(e) => CoreError::InvalidResponse(e),
            missing @ ProtocolError::MissingField(_) => CoreError::Transport(missing.to_string()),
        }
    }
}
