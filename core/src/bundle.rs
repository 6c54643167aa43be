//! The ANS-104 bundle format (§4.F′): a count-prefixed index of
//! `(length, id)` pairs followed by the concatenated data items.

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::data_item::DataItem;
use crate::error::{Error, Result};
use crate::tag::Tag;

fn u256_le(n: u128, width: usize) -> Vec<u8> {
    let full = n.to_le_bytes();
    let mut out = full.to_vec();
    out.resize(width, 0);
    out
}

fn read_u256_le<R: Read>(stream: &mut R) -> Result<usize> {
    let mut buf = [0u8; 32];
    stream.read_exact(&mut buf)?;
    // Bundle counts/lengths fit comfortably in a usize in practice; the
    // upper 24 bytes of the 32-byte field are conventionally zero.
    let mut low = [0u8; 16];
    low.copy_from_slice(&buf[..16]);
    if buf[16..].iter().any(|&b| b != 0) {
        return Err(Error::MalformedHeader("bundle length/count exceeds u128 range".into()));
    }
    Ok(u128::from_le_bytes(low) as usize)
}

/// One `(length, id)` record in a bundle's index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleEntry {
    pub length: usize,
    pub id: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BundleHeader {
    pub entries: Vec<BundleEntry>,
}

impl BundleHeader {
    /// Bytes occupied by the header itself: `32 + 64 * n`.
    pub fn len_bytes(&self) -> usize {
        32 + 64 * self.entries.len()
    }

    pub fn tobytes(&self) -> Vec<u8> {
        let mut out = u256_le(self.entries.len() as u128, 32);
        for entry in &self.entries {
            out.extend_from_slice(&u256_le(entry.length as u128, 32));
            out.extend_from_slice(&entry.id);
        }
        out
    }

    pub fn frombytes(bytes: &[u8]) -> Result<(Self, usize)> {
        let mut cursor = std::io::Cursor::new(bytes);
        let count = read_u256_le(&mut cursor)?;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let length = read_u256_le(&mut cursor)?;
            let mut id = [0u8; 32];
            cursor.read_exact(&mut id)?;
            entries.push(BundleEntry { length, id });
        }
        Ok((BundleHeader { entries }, cursor.position() as usize))
    }

    /// The byte length of the item with this id, if present in the index.
    pub fn length_of(&self, id: &[u8; 32]) -> Option<usize> {
        self.entries.iter().find(|e| &e.id == id).map(|e| e.length)
    }

    /// The byte offset (from the start of the bundle) at which the item
    /// with this id begins, per §3's invariant
    /// `offset(id_k) = 32 + 64·n + Σ_{i<k} length_i`.
    pub fn offset_of(&self, id: &[u8; 32]) -> Option<usize> {
        let mut offset = self.len_bytes();
        for entry in &self.entries {
            if &entry.id == id {
                return Some(offset);
            }
            offset += entry.length;
        }
        None
    }

    pub fn range_of(&self, id: &[u8; 32]) -> Option<(usize, usize)> {
        let start = self.offset_of(id)?;
        let length = self.length_of(id)?;
        Some((start, start + length))
    }
}

/// An ordered collection of data items, as carried inside a
/// `Bundle-Format: binary` ANS-104 payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bundle {
    pub items: Vec<DataItem>,
}

impl Bundle {
    pub fn header(&self) -> BundleHeader {
        BundleHeader {
            entries: self
                .items
                .iter()
                .map(|item| BundleEntry { length: item.tobytes().len(), id: item.header.id() })
                .collect(),
        }
    }

    pub fn tobytes(&self) -> Vec<u8> {
        let mut out = self.header().tobytes();
        for item in &self.items {
            out.extend_from_slice(&item.tobytes());
        }
        out
    }

    pub fn frombytes(bytes: &[u8]) -> Result<Self> {
        let (header, mut offset) = BundleHeader::frombytes(bytes)?;
        let mut items = Vec::with_capacity(header.entries.len());
        for entry in &header.entries {
            let end = offset + entry.length;
            let slice = bytes.get(offset..end).ok_or_else(|| {
                Error::MalformedHeader("bundle item extends past end of buffer".into())
            })?;
            items.push(DataItem::frombytes(slice)?);
            offset = end;
        }
        Ok(Bundle { items })
    }

    pub fn to_json(&self) -> Result<String> {
        let items = self
            .items
            .iter()
            .map(|item| item.to_json().and_then(|s| Ok(serde_json::from_str::<serde_json::Value>(&s)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(serde_json::to_string(&BundleJson { items })?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let json: BundleJson = serde_json::from_str(s)?;
        let items = json
            .items
            .into_iter()
            .map(|v| DataItem::from_json(&v.to_string()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Bundle { items })
    }

    /// Dispatches on the `Bundle-Format` tag (`json` | `binary`), reading
    /// the payload from `reader` accordingly.
    pub fn from_tags_and_reader<R: Read>(tags: &[Tag], reader: &mut R) -> Result<Self> {
        let format = tags
            .iter()
            .find(|t| t.name == b"Bundle-Format")
            .map(|t| t.value.clone())
            .ok_or_else(|| Error::MalformedHeader("missing Bundle-Format tag".into()))?;
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;
        match format.as_slice() {
            b"binary" => Bundle::frombytes(&raw),
            b"json" => {
                let text = String::from_utf8(raw)
                    .map_err(|e| Error::MalformedHeader(format!("bundle JSON is not utf-8: {e}")))?;
                Bundle::from_json(&text)
            }
            other => Err(Error::MalformedHeader(format!(
                "unsupported Bundle-Format: {:?}",
                String::from_utf8_lossy(other)
            ))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct BundleJson {
    items: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::{PrivateKey, SIG_TYPE_ED25519};
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    fn signed_item(data: Vec<u8>) -> DataItem {
        let signing_key = SigningKey::generate(&mut OsRng);
        let key = PrivateKey::Ed25519(Box::new(signing_key));
        let mut item = DataItem::new(SIG_TYPE_ED25519, key.raw_owner(), None, None, vec![], data).unwrap();
        item.sign(&key).unwrap();
        item
    }

    #[test]
    fn header_offsets_match_spec_formula() {
        let items = vec![signed_item(b"one".to_vec()), signed_item(b"two-two".to_vec())];
        let bundle = Bundle { items };
        let header = bundle.header();
        assert_eq!(header.len_bytes(), 32 + 64 * 2);

        let first_id = header.entries[0].id;
        let second_id = header.entries[1].id;
        assert_eq!(header.offset_of(&first_id), Some(header.len_bytes()));
        assert_eq!(
            header.offset_of(&second_id),
            Some(header.len_bytes() + header.entries[0].length)
        );
    }

    #[test]
    fn binary_round_trip_preserves_items_and_order() {
        let items = vec![signed_item(b"a".to_vec()), signed_item(b"bb".to_vec()), signed_item(b"ccc".to_vec())];
        let bundle = Bundle { items };
        let bytes = bundle.tobytes();
        let decoded = Bundle::frombytes(&bytes).unwrap();
        assert_eq!(decoded, bundle);
    }

    #[test]
    fn json_round_trip_preserves_item_count_and_data() {
        let bundle = Bundle { items: vec![signed_item(b"payload".to_vec())] };
        let json = bundle.to_json().unwrap();
        let decoded = Bundle::from_json(&json).unwrap();
        assert_eq!(decoded.items.len(), 1);
        assert_eq!(decoded.items[0].data, b"payload".to_vec());
    }

    #[test]
    fn from_tags_and_reader_dispatches_on_bundle_format() {
        let bundle = Bundle { items: vec![signed_item(b"x".to_vec())] };
        let bytes = bundle.tobytes();
        let tags = vec![Tag::from_utf8("Bundle-Format", "binary")];
        let mut reader = std::io::Cursor::new(bytes);
        let decoded = Bundle::from_tags_and_reader(&tags, &mut reader).unwrap();
        assert_eq!(decoded, bundle);
    }
}
