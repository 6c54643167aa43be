//! The ANS-104 data-item header (§4.E) and the signed `(header, payload)`
//! pair built on top of it (§4.F).

use std::io::{Cursor, Read};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::codec::{b64dec, b64enc};
use crate::deep_hash::{deep_hash, DeepHashItem};
use crate::error::{Error, Result};
use crate::signer::{signer_info, PrivateKey, PublicKey};
use crate::tag::{decode_tags_with_consumed, encode_tags, validate_tags, Tag};

/// Fixed-layout header: signature type, signature, owner (public key),
/// optional target/anchor, and the Avro-encoded tag list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataItemHeader {
    pub signature_type: u16,
    pub raw_signature: Vec<u8>,
    pub raw_owner: Vec<u8>,
    pub target: Option<[u8; 32]>,
    pub anchor: Option<[u8; 32]>,
    pub tags: Vec<Tag>,
    /// Bytes left over after the last decoded tag inside `raw_tags`. The
    /// original format tolerates (and re-emits) these rather than erroring.
    pub extra_tags_data: Vec<u8>,
}

impl DataItemHeader {
    /// Builds an unsigned header: `raw_signature` is zero-filled until
    /// [`DataItem::sign`] fills it in.
    pub fn unsigned(
        signature_type: u16,
        raw_owner: Vec<u8>,
        target: Option<[u8; 32]>,
        anchor: Option<[u8; 32]>,
        tags: Vec<Tag>,
    ) -> Result<Self> {
        validate_tags(&tags)?;
        let info = signer_info(signature_type)?;
        if raw_owner.len() != info.owner_length {
            return Err(Error::MalformedSignature {
                expected: info.owner_length,
                actual: raw_owner.len(),
            });
        }
        Ok(DataItemHeader {
            signature_type,
            raw_signature: vec![0u8; info.signature_length],
            raw_owner,
            target,
            anchor,
            tags,
            extra_tags_data: Vec::new(),
        })
    }

    pub fn raw_tags(&self) -> Vec<u8> {
        let mut out = encode_tags(&self.tags);
        out.extend_from_slice(&self.extra_tags_data);
        out
    }

    pub fn get_len_bytes(&self) -> Result<usize> {
        let info = signer_info(self.signature_type)?;
        let target_len = if self.target.is_some() { 33 } else { 1 };
        let anchor_len = if self.anchor.is_some() { 33 } else { 1 };
        Ok(2 + info.signature_length + info.owner_length + target_len + anchor_len + 16 + self.raw_tags().len())
    }

    pub fn id(&self) -> [u8; 32] {
        Sha256::digest(&self.raw_signature).into()
    }

    pub fn tobytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.get_len_bytes().unwrap_or(0));
        out.extend_from_slice(&self.signature_type.to_le_bytes());
        out.extend_from_slice(&self.raw_signature);
        out.extend_from_slice(&self.raw_owner);
        write_optional_32(&mut out, self.target);
        write_optional_32(&mut out, self.anchor);
        let raw_tags = self.raw_tags();
        out.extend_from_slice(&(self.tags.len() as u64).to_le_bytes());
        out.extend_from_slice(&(raw_tags.len() as u64).to_le_bytes());
        out.extend_from_slice(&raw_tags);
        out
    }

    /// Parses a header off the front of `bytes`; returns it with the number
    /// of bytes consumed so the caller can slice off the payload.
    pub fn frombytes(bytes: &[u8]) -> Result<(Self, usize)> {
        let mut cursor = Cursor::new(bytes);

        let mut u16_buf = [0u8; 2];
        cursor.read_exact(&mut u16_buf)?;
        let signature_type = u16::from_le_bytes(u16_buf);
        let info = signer_info(signature_type)?;

        let mut raw_signature = vec![0u8; info.signature_length];
        cursor.read_exact(&mut raw_signature)?;
        let mut raw_owner = vec![0u8; info.owner_length];
        cursor.read_exact(&mut raw_owner)?;

        let target = read_optional_32(&mut cursor)?;
        let anchor = read_optional_32(&mut cursor)?;

        let mut u64_buf = [0u8; 8];
        cursor.read_exact(&mut u64_buf)?;
        let tags_count = u64::from_le_bytes(u64_buf);
        cursor.read_exact(&mut u64_buf)?;
        let raw_tags_len = u64::from_le_bytes(u64_buf) as usize;

        let mut raw_tags = vec![0u8; raw_tags_len];
        cursor.read_exact(&mut raw_tags)?;

        let (tags, consumed) = decode_tags_with_consumed(&raw_tags)?;
        if tags.len() as u64 != tags_count {
            return Err(Error::MalformedHeader(format!(
                "tags_count {tags_count} disagrees with decoded tag count {}",
                tags.len()
            )));
        }
        let extra_tags_data = raw_tags[consumed..].to_vec();
        if !extra_tags_data.is_empty() {
            log::warn!(
                "data item header: {} cruft byte(s) after tag block, preserved for re-emission",
                extra_tags_data.len()
            );
        }

        Ok((
            DataItemHeader {
                signature_type,
                raw_signature,
                raw_owner,
                target,
                anchor,
                tags,
                extra_tags_data,
            },
            cursor.position() as usize,
        ))
    }
}

fn write_optional_32(out: &mut Vec<u8>, value: Option<[u8; 32]>) {
    match value {
        Some(bytes) => {
            out.push(1);
            out.extend_from_slice(&bytes);
        }
        None => out.push(0),
    }
}

fn read_optional_32<R: Read>(stream: &mut R) -> Result<Option<[u8; 32]>> {
    let mut flag = [0u8; 1];
    stream.read_exact(&mut flag)?;
    match flag[0] {
        0 => Ok(None),
        1 => {
            let mut bytes = [0u8; 32];
            stream.read_exact(&mut bytes)?;
            Ok(Some(bytes))
        }
        other => Err(Error::MalformedHeader(format!(
            "invalid presence flag byte: {other:#04x}"
        ))),
    }
}

fn pad_to_32(bytes: &[u8]) -> Result<[u8; 32]> {
    if bytes.len() > 32 {
        return Err(Error::MalformedHeader(format!(
            "target/anchor too long: {} > 32",
            bytes.len()
        )));
    }
    let mut out = [0u8; 32];
    out[..bytes.len()].copy_from_slice(bytes);
    Ok(out)
}

/// Guesses the signer type from an owner's raw length, for JSON shapes that
/// (per upstream convention) never carry the type explicitly. Owner lengths
/// of 512 and 65 are unambiguous; a 32-byte owner defaults to `ed25519`
/// over its `solana` twin.
pub(crate) fn infer_signature_type(owner_len: usize) -> Result<u16> {
    match owner_len {
        512 => Ok(crate::signer::SIG_TYPE_ARWEAVE),
        65 => Ok(crate::signer::SIG_TYPE_ETHEREUM),
        32 => Ok(crate::signer::SIG_TYPE_ED25519),
        other => Err(Error::MalformedHeader(format!(
            "cannot infer signature type from owner length {other}"
        ))),
    }
}

/// A data item: header plus opaque payload. `version` selects the signing
/// input shape (§4.F): `2` for binary-tags-era tooling, `1` for data
/// decoded from a pre-ANS-104 JSON transaction shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataItem {
    pub header: DataItemHeader,
    pub data: Vec<u8>,
    pub version: u8,
}

impl DataItem {
    pub fn new(
        signature_type: u16,
        raw_owner: Vec<u8>,
        target: Option<[u8; 32]>,
        anchor: Option<[u8; 32]>,
        tags: Vec<Tag>,
        data: Vec<u8>,
    ) -> Result<Self> {
        Ok(DataItem {
            header: DataItemHeader::unsigned(signature_type, raw_owner, target, anchor, tags)?,
            data,
            version: 2,
        })
    }

    fn signing_input(&self) -> DeepHashItem {
        let target_bytes = self.header.target.map(|b| b.to_vec()).unwrap_or_default();
        let anchor_bytes = self.header.anchor.map(|b| b.to_vec()).unwrap_or_default();
        let tags_item = if self.version == 1 {
            DeepHashItem::list(
                self.header
                    .tags
                    .iter()
                    .map(|t| {
                        DeepHashItem::list(vec![
                            DeepHashItem::blob(t.name.clone()),
                            DeepHashItem::blob(t.value.clone()),
                        ])
                    })
                    .collect::<Vec<_>>(),
            )
        } else {
            DeepHashItem::blob(self.header.raw_tags())
        };
        let mut list = vec![DeepHashItem::utf8("dataitem"), DeepHashItem::utf8("1")];
        if self.version >= 2 {
            list.push(DeepHashItem::ascii(self.header.signature_type));
        }
        list.push(DeepHashItem::blob(self.header.raw_owner.clone()));
        list.push(DeepHashItem::blob(target_bytes));
        list.push(DeepHashItem::blob(anchor_bytes));
        list.push(tags_item);
        list.push(DeepHashItem::blob(self.data.clone()));
        DeepHashItem::list(list)
    }

    /// Fills in `raw_owner`/`raw_signature` and returns the resulting id.
    pub fn sign(&mut self, key: &PrivateKey) -> Result<[u8; 32]> {
        self.header.raw_owner = key.raw_owner();
        let digest = deep_hash(&self.signing_input());
        self.header.raw_signature = key.sign(&digest)?;
        Ok(self.header.id())
    }

    /// Never raises: an invalid tag shape, an unknown signature type, or a
    /// failed cryptographic check are all simply "not verified".
    pub fn verify(&self) -> bool {
        if validate_tags(&self.header.tags).is_err() {
            return false;
        }
        let public_key = match PublicKey::from_raw_owner(self.header.signature_type, &self.header.raw_owner) {
            Ok(pk) => pk,
            Err(_) => return false,
        };
        let digest = deep_hash(&self.signing_input());
        public_key.verify(&digest, &self.header.raw_signature)
    }

    pub fn tobytes(&self) -> Vec<u8> {
        let mut out = self.header.tobytes();
        out.extend_from_slice(&self.data);
        out
    }

    pub fn frombytes(bytes: &[u8]) -> Result<Self> {
        let (header, consumed) = DataItemHeader::frombytes(bytes)?;
        let data = bytes[consumed..].to_vec();
        Ok(DataItem { header, data, version: 2 })
    }

    pub fn to_json(&self) -> Result<String> {
        let json = DataItemJson {
            owner: b64enc(&self.header.raw_owner),
            target: self.header.target.map(|b| b64enc(&b)).unwrap_or_default(),
            nonce: self.header.anchor.map(|b| b64enc(&b)).unwrap_or_default(),
            tags: self
                .header
                .tags
                .iter()
                .map(|t| TagJson { name: b64enc(&t.name), value: b64enc(&t.value) })
                .collect(),
            signature: b64enc(&self.header.raw_signature),
            id: b64enc(&self.header.id()),
            data: b64enc(&self.data),
        };
        Ok(serde_json::to_string(&json)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let json: DataItemJson = serde_json::from_str(s)?;
        let raw_owner = b64dec(&json.owner)?;
        let signature_type = infer_signature_type(raw_owner.len())?;
        let target = if json.target.is_empty() {
            None
        } else {
            Some(pad_to_32(&b64dec(&json.target)?)?)
        };
        let anchor = if json.nonce.is_empty() {
            None
        } else {
            Some(pad_to_32(&b64dec(&json.nonce)?)?)
        };
        let tags = json
            .tags
            .into_iter()
            .map(|t| Ok(Tag { name: b64dec(&t.name)?, value: b64dec(&t.value)? }))
            .collect::<Result<Vec<_>>>()?;
        let data = b64dec(&json.data)?;

        let mut header = DataItemHeader::unsigned(signature_type, raw_owner, target, anchor, tags)?;
        header.raw_signature = b64dec(&json.signature)?;

        Ok(DataItem { header, data, version: 1 })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TagJson {
    name: String,
    value: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct DataItemJson {
    owner: String,
    #[serde(default)]
    target: String,
    #[serde(default)]
    nonce: String,
    tags: Vec<TagJson>,
    signature: String,
    id: String,
    data: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    fn signed_item(tags: Vec<Tag>, data: Vec<u8>) -> (DataItem, [u8; 32]) {
        let signing_key = SigningKey::generate(&mut OsRng);
        let key = PrivateKey::Ed25519(Box::new(signing_key));
        let mut item = DataItem::new(
            crate::signer::SIG_TYPE_ED25519,
            key.raw_owner(),
            None,
            None,
            tags,
            data,
        )
        .unwrap();
        let id = item.sign(&key).unwrap();
        (item, id)
    }

    #[test]
    fn empty_tag_data_item_matches_spec_header_length() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let key = PrivateKey::Ed25519(Box::new(signing_key));
        let mut item = DataItem::new(crate::signer::SIG_TYPE_ED25519, key.raw_owner(), None, None, vec![], vec![])
            .unwrap();
        item.sign(&key).unwrap();
        // 2 + 64 + 32 + 1 + 1 + 16 + 1 for the ed25519 lengths used here.
        assert_eq!(item.header.get_len_bytes().unwrap(), 2 + 64 + 32 + 1 + 1 + 16 + 1);
        assert_eq!(item.header.raw_tags(), vec![0x00]);
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let tags = vec![Tag::from_utf8("Content-Type", "text/plain")];
        let (item, id) = signed_item(tags, b"hello".to_vec());
        assert!(item.verify());
        assert_eq!(item.header.id(), id);
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let (mut item, _) = signed_item(vec![], b"hello".to_vec());
        item.data = b"goodbye".to_vec();
        assert!(!item.verify());
    }

    #[test]
    fn binary_round_trip_preserves_header_and_payload() {
        let tags = vec![Tag::from_utf8("App-Name", "test")];
        let (item, _) = signed_item(tags, b"payload bytes".to_vec());
        let bytes = item.tobytes();
        let decoded = DataItem::frombytes(&bytes).unwrap();
        assert_eq!(decoded, item);
    }

    #[test]
    fn json_round_trip_preserves_signature_and_data() {
        let (item, _) = signed_item(vec![Tag::from_utf8("k", "v")], b"json payload".to_vec());
        let json = item.to_json().unwrap();
        let decoded = DataItem::from_json(&json).unwrap();
        assert_eq!(decoded.header.raw_signature, item.header.raw_signature);
        assert_eq!(decoded.data, item.data);
        assert_eq!(decoded.header.tags, item.header.tags);
    }

    #[test]
    fn version_1_signing_input_omits_signature_type_and_still_verifies() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let key = PrivateKey::Ed25519(Box::new(signing_key));
        let mut item = DataItem::new(
            crate::signer::SIG_TYPE_ED25519,
            key.raw_owner(),
            None,
            None,
            vec![Tag::from_utf8("a", "b")],
            b"legacy payload".to_vec(),
        )
        .unwrap();
        item.version = 1;
        item.sign(&key).unwrap();
        assert!(item.verify());
    }

    #[test]
    fn cruft_bytes_after_tags_are_preserved_through_binary_round_trip() {
        let (mut item, _) = signed_item(vec![Tag::from_utf8("a", "b")], b"x".to_vec());
        item.header.extra_tags_data = vec![0xDE, 0xAD];
        let bytes = item.tobytes();
        let decoded = DataItem::frombytes(&bytes).unwrap();
        assert_eq!(decoded.header.extra_tags_data, vec![0xDE, 0xAD]);
    }
}
