//! The `deep_hash` domain-separated recursive hash (SHA-384) that underlies
//! every signing input and id in the Arweave network: data items,
//! transactions, and blocks all sign (and identify) a `deep_hash` of a tree
//! of byte strings rather than a flat hash of concatenated bytes.

use sha2::{Digest, Sha384};

/// A node in the tree `deep_hash` is computed over: either an opaque byte
/// string (a "blob") or an ordered list of further nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeepHashItem {
    Blob(Vec<u8>),
    List(Vec<DeepHashItem>),
}

impl DeepHashItem {
    pub fn blob(bytes: impl Into<Vec<u8>>) -> Self {
        DeepHashItem::Blob(bytes.into())
    }

    pub fn utf8(s: impl AsRef<str>) -> Self {
        DeepHashItem::Blob(s.as_ref().as_bytes().to_vec())
    }

    /// `ascii(x)`: the decimal digits of an unsigned integer, as the spec's
    /// `ascii()` tag denotes throughout the signing-input definitions.
    pub fn ascii(x: impl std::fmt::Display) -> Self {
        DeepHashItem::utf8(x.to_string())
    }

    pub fn list(items: impl Into<Vec<DeepHashItem>>) -> Self {
        DeepHashItem::List(items.into())
    }
}

impl From<&[u8]> for DeepHashItem {
    fn from(bytes: &[u8]) -> Self {
        DeepHashItem::Blob(bytes.to_vec())
    }
}

impl From<Vec<u8>> for DeepHashItem {
    fn from(bytes: Vec<u8>) -> Self {
        DeepHashItem::Blob(bytes)
    }
}

/// Computes the 48-byte `deep_hash` digest of a tree of byte strings.
pub fn deep_hash(item: &DeepHashItem) -> [u8; 48] {
    match item {
        DeepHashItem::Blob(b) => {
            let mut hasher = Sha384::new();
            hasher.update(b"blob");
            hasher.update(b.len().to_string().as_bytes());
            hasher.update(b);
            hasher.finalize().into()
        }
        DeepHashItem::List(items) => {
            let mut hasher = Sha384::new();
            hasher.update(b"list");
            hasher.update(items.len().to_string().as_bytes());
            let mut acc: [u8; 48] = hasher.finalize().into();
            for child in items {
                let child_hash = deep_hash(child);
                let mut hasher = Sha384::new();
                hasher.update(acc);
                hasher.update(child_hash);
                acc = hasher.finalize().into();
            }
            acc
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_matches_spec_formula() {
        let expected = {
            let mut hasher = Sha384::new();
            hasher.update(b"blob3abc");
            let out: [u8; 48] = hasher.finalize().into();
            out
        };
        assert_eq!(deep_hash(&DeepHashItem::blob(*b"abc")), expected);
    }

    #[test]
    fn list_matches_spec_formula() {
        let a = DeepHashItem::blob(*b"a");
        let b = DeepHashItem::blob(*b"b");
        let expected = {
            let mut hasher = Sha384::new();
            hasher.update(b"list2");
            let seed: [u8; 48] = hasher.finalize().into();

            let mut hasher = Sha384::new();
            hasher.update(seed);
            hasher.update(deep_hash(&a));
            let after_a: [u8; 48] = hasher.finalize().into();

            let mut hasher = Sha384::new();
            hasher.update(after_a);
            hasher.update(deep_hash(&b));
            let after_b: [u8; 48] = hasher.finalize().into();
            after_b
        };
        assert_eq!(deep_hash(&DeepHashItem::list(vec![a, b])), expected);
    }

    #[test]
    fn empty_list_is_deterministic_and_distinct_from_empty_blob() {
        let empty_list = deep_hash(&DeepHashItem::list(vec![]));
        let empty_blob = deep_hash(&DeepHashItem::blob(vec![]));
        assert_ne!(empty_list, empty_blob);
    }
}
