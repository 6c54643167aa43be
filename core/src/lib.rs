//! Binary codecs, cryptographic identity, and the ANS-104 data-item/bundle
//! format for the Arweave permaweb.
//!
//! The dominant data flow — sign and serialize a data item — runs
//! `tags` (`tag`) `-> header bytes layout` (`data_item`) `-> deep_hash of
//! signing input` (`deep_hash`) `-> signer.sign` (`signer`) `-> bundle
//! index` (`bundle`).

pub mod block;
pub mod bundle;
pub mod codec;
pub mod data_item;
pub mod deep_hash;
pub mod error;
pub mod signer;
pub mod tag;
pub mod transaction;
pub mod wallet;

pub use block::Block;
pub use bundle::{Bundle, BundleEntry, BundleHeader};
pub use data_item::{DataItem, DataItemHeader};
pub use deep_hash::{deep_hash, DeepHashItem};
pub use error::{Error, Result};
pub use signer::{PrivateKey, PublicKey, SignerInfo};
pub use tag::Tag;
pub use transaction::Transaction;
pub use wallet::Wallet;
