//! Error kinds for the `arweave_core` crate.
//!
//! Parsing fails the whole operation; signature verification never raises,
//! it returns `bool` (see `DataItem::verify`, `Transaction::verify`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed data item header: {0}")]
    MalformedHeader(String),

    #[error("unknown signature type: {0}")]
    UnknownSignatureType(u16),

    #[error("malformed signature: expected {expected} bytes, got {actual}")]
    MalformedSignature { expected: usize, actual: usize },

    #[error("malformed tag: {0}")]
    MalformedTag(String),

    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    #[error("malformed block: {0}")]
    MalformedBlock(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("base64url decode error: {0}")]
    Base64Decode(#[from] base64_url::base64::DecodeError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rsa error: {0}")]
    Rsa(#[from] rsa::Error),

    #[error("ecdsa error: {0}")]
    Ecdsa(#[from] k256::ecdsa::Error),

    #[error("jwk error: {0}")]
    Jwk(String),
}

pub type Result<T> = std::result::Result<T, Error>;
