//! The chain record (§4.H): fixed binary layout, fork-gated signing input,
//! and a JSON shape with upstream Arweave's field renames.

use std::io::{Cursor, Read};

use arweave_core_types::U256;
use serde::{Deserialize, Serialize};

use crate::codec::{
    arbindec, arbinenc, arintdec_u256, arintdec_u64, arintenc_u256, arintenc_u64, b64dec, b64enc,
};
use crate::deep_hash::{deep_hash, DeepHashItem};
use crate::error::{Error, Result};
use crate::tag::Tag;

/// Height at which block signing input drops the PoA tail and switches to
/// encoded-tags bytes (mirrors upstream `FORK_2_4`).
pub const FORK_2_4: u64 = 235_200;
/// Height at which the five rate/threshold fields are prepended to the
/// signing input (mirrors upstream `FORK_2_5`).
pub const FORK_2_5: u64 = 812_970;

/// A `(numerator, denominator)` rational rate; `ZeroDivisionError` in the
/// original becomes `None` here rather than a panic.
pub fn reduced_rate(numerator: u64, denominator: u64) -> Option<(u64, u64)> {
    if denominator == 0 {
        None
    } else {
        let g = gcd(numerator, denominator);
        Some((numerator / g.max(1), denominator / g.max(1)))
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

fn encode_block_tag(tag: &Tag) -> Vec<u8> {
    let mut out = arbinenc(&tag.name, 4);
    out.extend_from_slice(&arbinenc(&tag.value, 4));
    out
}

fn decode_block_tag(blob: &[u8]) -> Result<Tag> {
    let mut cursor = Cursor::new(blob);
    let name = arbindec(&mut cursor, 4)?;
    let value = arbindec(&mut cursor, 4)?;
    Ok(Tag { name, value })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub indep_hash: [u8; 48],
    pub prev_block: Vec<u8>,
    pub timestamp: u64,
    pub nonce: Vec<u8>,
    pub height: u64,
    pub diff: U256,
    pub cumulative_diff: U256,
    pub last_retarget: u64,
    pub hash: Vec<u8>,
    pub block_size: U256,
    pub weave_size: U256,
    pub reward_addr: Vec<u8>,
    pub tx_root: Vec<u8>,
    pub wallet_list: Vec<u8>,
    pub hash_list_merkle: Vec<u8>,
    pub reward_pool: u64,
    pub packing_threshold: u64,
    pub strict_chunk_threshold: u64,
    pub usd_to_ar_rate: (u64, u64),
    pub scheduled_usd_to_ar_rate: (u64, u64),
    pub poa_option: u64,
    pub poa_chunk: Vec<u8>,
    pub poa_tx_path: Vec<u8>,
    pub poa_data_path: Vec<u8>,
    pub tags: Vec<Tag>,
    /// Transaction ids included in this block, in canonical (in-memory)
    /// order; the wire format serializes these reversed, matching the
    /// original's `self.txs[::-1]` round-trip. Full transaction bodies are
    /// not embedded in the block record — only their ids, as the block
    /// JSON shape (`txs: [id, ...]`) already implies.
    pub txs: Vec<[u8; 32]>,
}

impl Block {
    pub fn usd_to_ar_rate_reduced(&self) -> Option<(u64, u64)> {
        reduced_rate(self.usd_to_ar_rate.0, self.usd_to_ar_rate.1)
    }

    pub fn scheduled_usd_to_ar_rate_reduced(&self) -> Option<(u64, u64)> {
        reduced_rate(self.scheduled_usd_to_ar_rate.0, self.scheduled_usd_to_ar_rate.1)
    }

    pub fn tobytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.indep_hash);
        out.extend_from_slice(&arbinenc(&self.prev_block, 8));
        out.extend_from_slice(&arintenc_u64(self.timestamp, 8));
        out.extend_from_slice(&arbinenc(&self.nonce, 16));
        out.extend_from_slice(&arintenc_u64(self.height, 8));
        out.extend_from_slice(&arintenc_u256(self.diff, 16));
        out.extend_from_slice(&arintenc_u256(self.cumulative_diff, 16));
        out.extend_from_slice(&arintenc_u64(self.last_retarget, 8));
        out.extend_from_slice(&arbinenc(&self.hash, 8));
        out.extend_from_slice(&arintenc_u256(self.block_size, 16));
        out.extend_from_slice(&arintenc_u256(self.weave_size, 16));
        out.extend_from_slice(&arbinenc(&self.reward_addr, 8));
        out.extend_from_slice(&arbinenc(&self.tx_root, 8));
        out.extend_from_slice(&arbinenc(&self.wallet_list, 8));
        out.extend_from_slice(&arbinenc(&self.hash_list_merkle, 8));
        out.extend_from_slice(&arintenc_u64(self.reward_pool, 8));
        out.extend_from_slice(&arintenc_u64(self.packing_threshold, 8));
        out.extend_from_slice(&arintenc_u64(self.strict_chunk_threshold, 8));
        out.extend_from_slice(&arintenc_u64(self.usd_to_ar_rate.0, 8));
        out.extend_from_slice(&arintenc_u64(self.usd_to_ar_rate.1, 8));
        out.extend_from_slice(&arintenc_u64(self.scheduled_usd_to_ar_rate.0, 8));
        out.extend_from_slice(&arintenc_u64(self.scheduled_usd_to_ar_rate.1, 8));
        out.extend_from_slice(&arintenc_u64(self.poa_option, 8));
        out.extend_from_slice(&arbinenc(&self.poa_chunk, 24));
        out.extend_from_slice(&arbinenc(&self.poa_tx_path, 24));
        out.extend_from_slice(&arbinenc(&self.poa_data_path, 24));

        out.extend_from_slice(&(self.tags.len() as u16).to_be_bytes());
        for tag in &self.tags {
            out.extend_from_slice(&arbinenc(&encode_block_tag(tag), 16));
        }

        out.extend_from_slice(&(self.txs.len() as u16).to_be_bytes());
        for id in self.txs.iter().rev() {
            out.extend_from_slice(&arbinenc(id, 24));
        }
        out
    }

    pub fn frombytes(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let mut indep_hash = [0u8; 48];
        cursor.read_exact(&mut indep_hash)?;
        let prev_block = arbindec(&mut cursor, 8)?;
        let timestamp = arintdec_u64(&mut cursor, 8)?;
        let nonce = arbindec(&mut cursor, 16)?;
        let height = arintdec_u64(&mut cursor, 8)?;
        let diff = arintdec_u256(&mut cursor, 16)?;
        let cumulative_diff = arintdec_u256(&mut cursor, 16)?;
        let last_retarget = arintdec_u64(&mut cursor, 8)?;
        let hash = arbindec(&mut cursor, 8)?;
        let block_size = arintdec_u256(&mut cursor, 16)?;
        let weave_size = arintdec_u256(&mut cursor, 16)?;
        let reward_addr = arbindec(&mut cursor, 8)?;
        let tx_root = arbindec(&mut cursor, 8)?;
        let wallet_list = arbindec(&mut cursor, 8)?;
        let hash_list_merkle = arbindec(&mut cursor, 8)?;
        let reward_pool = arintdec_u64(&mut cursor, 8)?;
        let packing_threshold = arintdec_u64(&mut cursor, 8)?;
        let strict_chunk_threshold = arintdec_u64(&mut cursor, 8)?;
        let usd_to_ar_rate = (arintdec_u64(&mut cursor, 8)?, arintdec_u64(&mut cursor, 8)?);
        let scheduled_usd_to_ar_rate = (arintdec_u64(&mut cursor, 8)?, arintdec_u64(&mut cursor, 8)?);
        let poa_option = arintdec_u64(&mut cursor, 8)?;
        let poa_chunk = arbindec(&mut cursor, 24)?;
        let poa_tx_path = arbindec(&mut cursor, 24)?;
        let poa_data_path = arbindec(&mut cursor, 24)?;

        let mut u16_buf = [0u8; 2];
        cursor.read_exact(&mut u16_buf)?;
        let tags_count = u16::from_be_bytes(u16_buf);
        let mut tags = Vec::with_capacity(tags_count as usize);
        for _ in 0..tags_count {
            let blob = arbindec(&mut cursor, 16)?;
            tags.push(decode_block_tag(&blob)?);
        }

        cursor.read_exact(&mut u16_buf)?;
        let txs_count = u16::from_be_bytes(u16_buf);
        let mut txs = Vec::with_capacity(txs_count as usize);
        for _ in 0..txs_count {
            let id = arbindec(&mut cursor, 24)?;
            let id: [u8; 32] = id
                .try_into()
                .map_err(|_| Error::MalformedBlock("tx id must be 32 bytes".into()))?;
            txs.push(id);
        }
        txs.reverse();

        Ok(Block {
            indep_hash,
            prev_block,
            timestamp,
            nonce,
            height,
            diff,
            cumulative_diff,
            last_retarget,
            hash,
            block_size,
            weave_size,
            reward_addr,
            tx_root,
            wallet_list,
            hash_list_merkle,
            reward_pool,
            packing_threshold,
            strict_chunk_threshold,
            usd_to_ar_rate,
            scheduled_usd_to_ar_rate,
            poa_option,
            poa_chunk,
            poa_tx_path,
            poa_data_path,
            tags,
            txs,
        })
    }

    /// `_get_data_segment_base` + `_get_data_segment`, fork-gated on
    /// `height` (§4.H). Reproduces the `strict_chunk_threshold` quirk
    /// byte-for-byte: the ≥FORK_2_5 branch passes its decimal string
    /// straight through without re-encoding, matching already-mined blocks.
    pub fn signing_input(&self) -> DeepHashItem {
        let base = if self.height >= FORK_2_4 {
            let mut props = vec![
                DeepHashItem::ascii(self.height),
                DeepHashItem::blob(self.prev_block.clone()),
                DeepHashItem::blob(self.tx_root.clone()),
                DeepHashItem::list(self.txs.iter().map(|id| DeepHashItem::blob(id.to_vec())).collect::<Vec<_>>()),
                DeepHashItem::ascii(self.block_size),
                DeepHashItem::ascii(self.weave_size),
                DeepHashItem::blob(self.reward_addr.clone()),
                DeepHashItem::blob(self.encoded_tags()),
            ];
            if self.height >= FORK_2_5 {
                // `ar/block.py`'s `_get_data_segment_base` builds this prefix from the
                // `usd_to_ar_rate`/`scheduled_usd_to_ar_rate` *properties*
                // (`fractions.Fraction`-reduced), not the raw stored pairs.
                let usd_to_ar_rate = reduced_rate(self.usd_to_ar_rate.0, self.usd_to_ar_rate.1)
                    .unwrap_or(self.usd_to_ar_rate);
                let scheduled_usd_to_ar_rate =
                    reduced_rate(self.scheduled_usd_to_ar_rate.0, self.scheduled_usd_to_ar_rate.1)
                        .unwrap_or(self.scheduled_usd_to_ar_rate);
                let mut prefixed = vec![
                    DeepHashItem::ascii(usd_to_ar_rate.0),
                    DeepHashItem::ascii(usd_to_ar_rate.1),
                    DeepHashItem::ascii(scheduled_usd_to_ar_rate.0),
                    DeepHashItem::ascii(scheduled_usd_to_ar_rate.1),
                    DeepHashItem::ascii(self.packing_threshold),
                    DeepHashItem::ascii(self.strict_chunk_threshold),
                ];
                prefixed.append(&mut props);
                DeepHashItem::list(prefixed)
            } else {
                DeepHashItem::list(props)
            }
        } else {
            DeepHashItem::list(vec![
                DeepHashItem::ascii(self.height),
                DeepHashItem::blob(self.prev_block.clone()),
                DeepHashItem::blob(self.tx_root.clone()),
                DeepHashItem::list(self.txs.iter().map(|id| DeepHashItem::blob(id.to_vec())).collect::<Vec<_>>()),
                DeepHashItem::ascii(self.block_size),
                DeepHashItem::ascii(self.weave_size),
                DeepHashItem::blob(self.reward_addr.clone()),
                DeepHashItem::list(
                    self.tags
                        .iter()
                        .map(|t| {
                            DeepHashItem::list(vec![
                                DeepHashItem::blob(t.name.clone()),
                                DeepHashItem::blob(t.value.clone()),
                            ])
                        })
                        .collect::<Vec<_>>(),
                ),
                DeepHashItem::list(vec![
                    DeepHashItem::ascii(self.poa_option),
                    DeepHashItem::blob(self.poa_tx_path.clone()),
                    DeepHashItem::blob(self.poa_data_path.clone()),
                    DeepHashItem::blob(self.poa_chunk.clone()),
                ]),
            ])
        };

        DeepHashItem::list(vec![
            base,
            DeepHashItem::ascii(self.timestamp),
            DeepHashItem::ascii(self.last_retarget),
            DeepHashItem::ascii(self.diff),
            DeepHashItem::ascii(self.cumulative_diff),
            DeepHashItem::ascii(self.reward_pool),
            DeepHashItem::blob(self.wallet_list.clone()),
            DeepHashItem::blob(self.hash_list_merkle.clone()),
        ])
    }

    pub fn data_segment(&self) -> [u8; 48] {
        deep_hash(&self.signing_input())
    }

    fn encoded_tags(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for tag in &self.tags {
            out.extend_from_slice(&encode_block_tag(tag));
        }
        out
    }

    pub fn to_json(&self) -> Result<String> {
        let json = BlockJson {
            indep_hash: b64enc(&self.indep_hash),
            previous_block: b64enc(&self.prev_block),
            timestamp: self.timestamp,
            nonce: b64enc(&self.nonce),
            height: self.height,
            diff: self.diff,
            cumulative_diff: self.cumulative_diff,
            last_retarget: self.last_retarget,
            hash: b64enc(&self.hash),
            block_size: self.block_size,
            weave_size: self.weave_size,
            reward_addr: b64enc(&self.reward_addr),
            tx_root: b64enc(&self.tx_root),
            wallet_list: b64enc(&self.wallet_list),
            hash_list_merkle: b64enc(&self.hash_list_merkle),
            reward_pool: self.reward_pool,
            packing_2_5_threshold: self.packing_threshold,
            strict_data_split_threshold: self.strict_chunk_threshold,
            usd_to_ar_rate: [self.usd_to_ar_rate.0.to_string(), self.usd_to_ar_rate.1.to_string()],
            scheduled_usd_to_ar_rate: [
                self.scheduled_usd_to_ar_rate.0.to_string(),
                self.scheduled_usd_to_ar_rate.1.to_string(),
            ],
            txs: self.txs.iter().map(|id| b64enc(id)).collect(),
            poa: PoaJson {
                option: self.poa_option,
                tx_path: b64enc(&self.poa_tx_path),
                data_path: b64enc(&self.poa_data_path),
                chunk: b64enc(&self.poa_chunk),
            },
            tags: self
                .tags
                .iter()
                .map(|t| TagJson { name: b64enc(&t.name), value: b64enc(&t.value) })
                .collect(),
        };
        Ok(serde_json::to_string(&json)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let json: BlockJson = serde_json::from_str(s)?;
        let parse_u64 = |s: &str, field: &str| -> Result<u64> {
            s.parse().map_err(|_| Error::MalformedBlock(format!("invalid {field}: {s}")))
        };
        let mut indep_hash = [0u8; 48];
        let decoded = b64dec(&json.indep_hash)?;
        if decoded.len() != 48 {
            return Err(Error::MalformedBlock("indep_hash must be 48 bytes".into()));
        }
        indep_hash.copy_from_slice(&decoded);

        Ok(Block {
            indep_hash,
            prev_block: b64dec(&json.previous_block)?,
            timestamp: json.timestamp,
            nonce: b64dec(&json.nonce)?,
            height: json.height,
            diff: json.diff,
            cumulative_diff: json.cumulative_diff,
            last_retarget: json.last_retarget,
            hash: b64dec(&json.hash)?,
            block_size: json.block_size,
            weave_size: json.weave_size,
            reward_addr: b64dec(&json.reward_addr)?,
            tx_root: b64dec(&json.tx_root)?,
            wallet_list: b64dec(&json.wallet_list)?,
            hash_list_merkle: b64dec(&json.hash_list_merkle)?,
            reward_pool: json.reward_pool,
            packing_threshold: json.packing_2_5_threshold,
            strict_chunk_threshold: json.strict_data_split_threshold,
            usd_to_ar_rate: (
                parse_u64(&json.usd_to_ar_rate[0], "usd_to_ar_rate[0]")?,
                parse_u64(&json.usd_to_ar_rate[1], "usd_to_ar_rate[1]")?,
            ),
            scheduled_usd_to_ar_rate: (
                parse_u64(&json.scheduled_usd_to_ar_rate[0], "scheduled_usd_to_ar_rate[0]")?,
                parse_u64(&json.scheduled_usd_to_ar_rate[1], "scheduled_usd_to_ar_rate[1]")?,
            ),
            poa_option: json.poa.option,
            poa_chunk: b64dec(&json.poa.chunk)?,
            poa_tx_path: b64dec(&json.poa.tx_path)?,
            poa_data_path: b64dec(&json.poa.data_path)?,
            tags: json
                .tags
                .into_iter()
                .map(|t| Ok(Tag { name: b64dec(&t.name)?, value: b64dec(&t.value)? }))
                .collect::<Result<Vec<_>>>()?,
            txs: json
                .txs
                .iter()
                .map(|s| {
                    let bytes = b64dec(s)?;
                    bytes
                        .try_into()
                        .map_err(|_| Error::MalformedBlock("tx id must be 32 bytes".into()))
                })
                .collect::<Result<Vec<[u8; 32]>>>()?,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TagJson {
    name: String,
    value: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct PoaJson {
    #[serde(with = "arweave_core_types::stringify")]
    option: u64,
    tx_path: String,
    data_path: String,
    chunk: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct BlockJson {
    indep_hash: String,
    previous_block: String,
    timestamp: u64,
    nonce: String,
    height: u64,
    diff: U256,
    cumulative_diff: U256,
    last_retarget: u64,
    hash: String,
    block_size: U256,
    weave_size: U256,
    reward_addr: String,
    tx_root: String,
    wallet_list: String,
    hash_list_merkle: String,
    #[serde(with = "arweave_core_types::stringify")]
    reward_pool: u64,
    #[serde(with = "arweave_core_types::stringify")]
    packing_2_5_threshold: u64,
    #[serde(with = "arweave_core_types::stringify")]
    strict_data_split_threshold: u64,
    usd_to_ar_rate: [String; 2],
    scheduled_usd_to_ar_rate: [String; 2],
    txs: Vec<String>,
    poa: PoaJson,
    tags: Vec<TagJson>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block(height: u64) -> Block {
        Block {
            indep_hash: [7u8; 48],
            prev_block: vec![1u8; 48],
            timestamp: 1_700_000_000,
            nonce: vec![2u8; 32],
            height,
            diff: U256::from(12345u64),
            cumulative_diff: U256::from(999_999u64),
            last_retarget: 1_699_999_000,
            hash: vec![3u8; 32],
            block_size: U256::from(256u64),
            weave_size: U256::from(1_000_000u64),
            reward_addr: vec![4u8; 32],
            tx_root: vec![5u8; 32],
            wallet_list: vec![6u8; 48],
            hash_list_merkle: vec![8u8; 48],
            reward_pool: 42,
            packing_threshold: 100,
            strict_chunk_threshold: 200,
            usd_to_ar_rate: (3, 2),
            scheduled_usd_to_ar_rate: (5, 4),
            poa_option: 1,
            poa_chunk: vec![9u8; 10],
            poa_tx_path: vec![10u8; 10],
            poa_data_path: vec![11u8; 10],
            tags: vec![Tag::from_utf8("k", "v")],
            txs: Vec::new(),
        }
    }

    #[test]
    fn binary_round_trip_preserves_all_scalar_fields() {
        let block = sample_block(FORK_2_5 + 1);
        let bytes = block.tobytes();
        let decoded = Block::frombytes(&bytes).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn json_round_trip_preserves_rate_fields() {
        let block = sample_block(FORK_2_4 - 1);
        let json = block.to_json().unwrap();
        let decoded = Block::from_json(&json).unwrap();
        assert_eq!(decoded.usd_to_ar_rate, block.usd_to_ar_rate);
        assert_eq!(decoded.diff, block.diff);
        assert_eq!(decoded.tags, block.tags);
    }

    #[test]
    fn zero_denominator_rate_is_none_not_a_panic() {
        let mut block = sample_block(0);
        block.usd_to_ar_rate = (1, 0);
        assert_eq!(block.usd_to_ar_rate_reduced(), None);
    }

    #[test]
    fn signing_input_shape_changes_across_fork_heights() {
        let pre_2_4 = sample_block(FORK_2_4 - 1);
        let post_2_4 = sample_block(FORK_2_4);
        let post_2_5 = sample_block(FORK_2_5);
        assert_ne!(pre_2_4.data_segment(), post_2_4.data_segment());
        assert_ne!(post_2_4.data_segment(), post_2_5.data_segment());
    }

    #[test]
    fn post_2_5_signing_input_uses_reduced_rate_not_raw_pair() {
        let mut unreduced = sample_block(FORK_2_5);
        unreduced.usd_to_ar_rate = (4, 2);
        unreduced.scheduled_usd_to_ar_rate = (10, 4);

        let mut reduced = sample_block(FORK_2_5);
        reduced.usd_to_ar_rate = (2, 1);
        reduced.scheduled_usd_to_ar_rate = (5, 2);

        assert_eq!(unreduced.data_segment(), reduced.data_segment());

        let mut different = sample_block(FORK_2_5);
        different.usd_to_ar_rate = (3, 1);
        different.scheduled_usd_to_ar_rate = (5, 2);
        assert_ne!(reduced.data_segment(), different.data_segment());
    }
}
