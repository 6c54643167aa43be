//! Shared wire-format primitives used across the `arweave_core` workspace.
//!
//! This mirrors the teacher's `arweave_rs_types` crate: a single place where
//! arbitrary-width integer types are defined and given `serde` impls, so
//! every other crate in the workspace references the same type instead of
//! re-deriving it.
#![allow(clippy::non_canonical_clone_impl)]

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uint::construct_uint;

pub mod stringify;

construct_uint! {
    /// 256-bit unsigned integer, used for values that in principle can
    /// exceed `u64` (block difficulty, cumulative difficulty, weave size).
    pub struct U256(4);
}

impl Serialize for U256 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

impl<'de> Deserialize<'de> for U256 {
    fn deserialize<D>(deserializer: D) -> Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        U256::from_dec_str(&s).map_err(serde::de::Error::custom)
    }
}
