//! Serializes and deserializes numbers represented as JSON strings.
//!
//! Arweave's JSON API renders every integer wider than a JS safe-integer as
//! a decimal string (`block_size`, `weave_size`, `reward`, ...). This is the
//! `#[serde(with = "stringify")]` helper the teacher's `types` crate uses for
//! the same purpose.
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
    <T as std::str::FromStr>::Err: std::fmt::Display,
{
    String::deserialize(deserializer)?
        .parse::<T>()
        .map_err(|e| D::Error::custom(format!("{}", e)))
}

pub fn serialize<S, T>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: std::fmt::Display,
{
    serializer.serialize_str(&format!("{}", value))
}
