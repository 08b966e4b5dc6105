use thiserror::Error;

use crate::types::Hash;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("node not found in store: {hash}")]
    MissingNode { hash: Hash },

    #[error("backend error")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error("invalid root hash length: expecting 32 bytes, got {got}")]
    InvalidRootLength { got: usize },

    #[error(transparent)]
    Decode(#[from] rlp::DecoderError),
}
