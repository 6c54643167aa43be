//! The multi-scheme signer registry (§4.C): RSA-4096-PSS, Ed25519,
//! secp256k1 ("ethereum"), and the Ed25519-flavoured "solana" variant, each
//! addressed by a stable `u16` type tag that also drives the data-item
//! header's binary layout (owner/signature lengths are fixed per type).

use std::collections::HashMap;

use ed25519_dalek::{Signer as _, Verifier as _};
use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use lazy_static::lazy_static;
use rsa::pss::Pss;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

pub const SIG_TYPE_ARWEAVE: u16 = 1;
pub const SIG_TYPE_ED25519: u16 = 2;
pub const SIG_TYPE_ETHEREUM: u16 = 3;
pub const SIG_TYPE_SOLANA: u16 = 4;

/// Static description of a registered signer variant; the lengths here
/// determine the `DataItemHeader`'s `get_len_bytes()`.
#[derive(Debug, Clone, Copy)]
pub struct SignerInfo {
    pub type_id: u16,
    pub owner_length: usize,
    pub signature_length: usize,
    pub name: &'static str,
}

lazy_static! {
    /// Process-wide immutable lookup table, initialised once at startup —
    /// the same shape the teacher uses for its consensus constant tables.
    static ref REGISTRY: HashMap<u16, SignerInfo> = {
        let mut m = HashMap::new();
        m.insert(
            SIG_TYPE_ARWEAVE,
            SignerInfo { type_id: SIG_TYPE_ARWEAVE, owner_length: 512, signature_length: 512, name: "arweave" },
        );
        m.insert(
            SIG_TYPE_ED25519,
            SignerInfo { type_id: SIG_TYPE_ED25519, owner_length: 32, signature_length: 64, name: "ed25519" },
        );
        m.insert(
            SIG_TYPE_ETHEREUM,
            SignerInfo { type_id: SIG_TYPE_ETHEREUM, owner_length: 65, signature_length: 65, name: "ethereum" },
        );
        m.insert(
            SIG_TYPE_SOLANA,
            SignerInfo { type_id: SIG_TYPE_SOLANA, owner_length: 32, signature_length: 64, name: "solana" },
        );
        m
    };
}

/// Looks up a registered signer's owner/signature lengths by wire type id.
pub fn signer_info(type_id: u16) -> Result<SignerInfo> {
    REGISTRY
        .get(&type_id)
        .copied()
        .ok_or(Error::UnknownSignatureType(type_id))
}

/// RSA-PSS salt length for a given owner (modulus) length, per §4.C:
/// `owner_length − digest_size(SHA-256) − 2`.
pub fn rsa_pss_salt_length(owner_length: usize) -> usize {
    owner_length - Sha256::output_size() - 2
}

/// A private key for one of the registered signer variants.
pub enum PrivateKey {
    Rsa4096(Box<RsaPrivateKey>),
    Ed25519(Box<ed25519_dalek::SigningKey>),
    Ethereum(Box<k256::ecdsa::SigningKey>),
    Solana(Box<ed25519_dalek::SigningKey>),
}

impl PrivateKey {
    pub fn signature_type(&self) -> u16 {
        match self {
            PrivateKey::Rsa4096(_) => SIG_TYPE_ARWEAVE,
            PrivateKey::Ed25519(_) => SIG_TYPE_ED25519,
            PrivateKey::Ethereum(_) => SIG_TYPE_ETHEREUM,
            PrivateKey::Solana(_) => SIG_TYPE_SOLANA,
        }
    }

    /// `raw_owner(private_key)`: the public key material in its wire form.
    pub fn raw_owner(&self) -> Vec<u8> {
        match self {
            PrivateKey::Rsa4096(key) => {
                let info = signer_info(SIG_TYPE_ARWEAVE).expect("arweave signer is always registered");
                let mut bytes = key.to_public_key().n().to_bytes_be();
                while bytes.len() < info.owner_length {
                    bytes.insert(0, 0);
                }
                bytes
            }
            PrivateKey::Ed25519(key) => key.verifying_key().to_bytes().to_vec(),
            PrivateKey::Ethereum(key) => key
                .verifying_key()
                .to_encoded_point(false)
                .as_bytes()
                .to_vec(),
            PrivateKey::Solana(key) => key.verifying_key().to_bytes().to_vec(),
        }
    }

    /// `sign(private_key, message_bytes)`.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        match self {
            PrivateKey::Rsa4096(key) => {
                let info = signer_info(SIG_TYPE_ARWEAVE)?;
                let salt_len = rsa_pss_salt_length(info.owner_length);
                let padding = Pss::new_with_salt::<Sha256>(salt_len);
                let digest = Sha256::digest(message);
                let signature =
                    key.sign_with_rng(&mut rand::thread_rng(), padding, &digest)?;
                Ok(signature)
            }
            PrivateKey::Ed25519(key) => Ok(key.sign(message).to_bytes().to_vec()),
            PrivateKey::Ethereum(key) => {
                let hash = Sha256::digest(message);
                let signature: k256::ecdsa::Signature = key.sign_prehash(&hash)?;
                let mut raw = signature.to_bytes().to_vec();
                raw.push(0); // recovery byte; unused by `verify`
                Ok(raw)
            }
            PrivateKey::Solana(key) => Ok(key.sign(message).to_bytes().to_vec()),
        }
    }
}

/// A public key handle reconstructed from `raw_owner` bytes, able to verify
/// a signature produced by the matching [`PrivateKey`] variant.
pub enum PublicKey {
    Rsa4096(Box<RsaPublicKey>),
    Ed25519(Box<ed25519_dalek::VerifyingKey>),
    Ethereum(Box<k256::ecdsa::VerifyingKey>),
    Solana(Box<ed25519_dalek::VerifyingKey>),
}

impl PublicKey {
    /// `public_key(raw_owner)`, dispatched on the wire type id.
    pub fn from_raw_owner(type_id: u16, raw_owner: &[u8]) -> Result<Self> {
        let info = signer_info(type_id)?;
        if raw_owner.len() != info.owner_length {
            return Err(Error::MalformedSignature {
                expected: info.owner_length,
                actual: raw_owner.len(),
            });
        }
        match type_id {
            SIG_TYPE_ARWEAVE => {
                let n = BigUint::from_bytes_be(raw_owner);
                let e = BigUint::from(65537u32);
                let key = RsaPublicKey::new(n, e)?;
                Ok(PublicKey::Rsa4096(Box::new(key)))
            }
            SIG_TYPE_ED25519 => {
                let bytes: [u8; 32] = raw_owner
                    .try_into()
                    .map_err(|_| Error::MalformedSignature { expected: 32, actual: raw_owner.len() })?;
                let key = ed25519_dalek::VerifyingKey::from_bytes(&bytes)
                    .map_err(|e| Error::MalformedTag(e.to_string()))?;
                Ok(PublicKey::Ed25519(Box::new(key)))
            }
            SIG_TYPE_ETHEREUM => {
                let key = k256::ecdsa::VerifyingKey::from_sec1_bytes(raw_owner)
                    .map_err(|e| Error::MalformedTag(e.to_string()))?;
                Ok(PublicKey::Ethereum(Box::new(key)))
            }
            SIG_TYPE_SOLANA => {
                let bytes: [u8; 32] = raw_owner
                    .try_into()
                    .map_err(|_| Error::MalformedSignature { expected: 32, actual: raw_owner.len() })?;
                let key = ed25519_dalek::VerifyingKey::from_bytes(&bytes)
                    .map_err(|e| Error::MalformedTag(e.to_string()))?;
                Ok(PublicKey::Solana(Box::new(key)))
            }
            other => Err(Error::UnknownSignatureType(other)),
        }
    }

    /// `verify(public_key, message_bytes, signature_bytes) -> bool`. Never
    /// raises: a malformed signature or a failed cryptographic check both
    /// simply yield `false`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        match self {
            PublicKey::Rsa4096(key) => {
                let info = match signer_info(SIG_TYPE_ARWEAVE) {
                    Ok(info) => info,
                    Err(_) => return false,
                };
                let salt_len = rsa_pss_salt_length(info.owner_length);
                let padding = Pss::new_with_salt::<Sha256>(salt_len);
                let digest = Sha256::digest(message);
                key.verify(padding, &digest, signature).is_ok()
            }
            PublicKey::Ed25519(key) => {
                let sig = match ed25519_dalek::Signature::from_slice(signature) {
                    Ok(sig) => sig,
                    Err(_) => return false,
                };
                key.verify(message, &sig).is_ok()
            }
            PublicKey::Ethereum(key) => {
                if signature.len() != 65 {
                    return false;
                }
                let sig = match k256::ecdsa::Signature::from_slice(&signature[..64]) {
                    Ok(sig) => sig,
                    Err(_) => return false,
                };
                let hash = Sha256::digest(message);
                key.verify_prehash(&hash, &sig).is_ok()
            }
            PublicKey::Solana(key) => {
                let sig = match ed25519_dalek::Signature::from_slice(signature) {
                    Ok(sig) => sig,
                    Err(_) => return false,
                };
                key.verify(message, &sig).is_ok()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn rsa_salt_length_matches_spec_constant() {
        assert_eq!(rsa_pss_salt_length(512), 478);
    }

    #[test]
    fn unknown_signature_type_is_rejected() {
        assert!(matches!(signer_info(9), Err(Error::UnknownSignatureType(9))));
    }

    #[test]
    fn ed25519_sign_and_verify_round_trips() {
        let mut csprng = OsRng;
        let signing_key = ed25519_dalek::SigningKey::generate(&mut csprng);
        let key = PrivateKey::Ed25519(Box::new(signing_key));
        let message = b"deep-hash-ish bytes";
        let signature = key.sign(message).unwrap();
        let raw_owner = key.raw_owner();
        assert_eq!(raw_owner.len(), 32);
        assert_eq!(signature.len(), 64);

        let public = PublicKey::from_raw_owner(SIG_TYPE_ED25519, &raw_owner).unwrap();
        assert!(public.verify(message, &signature));
        assert!(!public.verify(b"tampered", &signature));
    }
}
