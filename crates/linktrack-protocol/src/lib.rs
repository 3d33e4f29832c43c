pub mod client;
pub mod codec;
pub mod error;

pub use client::{GraphqlStore, DEFAULT_TIMEOUT};
pub use error::ProtocolError;
