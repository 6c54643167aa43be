//! A JWK-backed RSA wallet (§4.I): owner, address, and RSA-PSS sign/verify,
//! grounded in pyarweave's `ar/wallet.py` and the pack's `jsonwebkey`-based
//! Arweave signer implementations.

use jsonwebkey::JsonWebKey;
use rsa::pss::Pss;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::codec::b64enc;
use crate::error::{Error, Result};
use crate::signer::{rsa_pss_salt_length, signer_info, SIG_TYPE_ARWEAVE};

const RSA_BITS: usize = 4096;

/// A wallet wraps an RSA-4096 key (the `arweave` signer type) parsed from a
/// JWK document.
pub struct Wallet {
    rsa_key: RsaPrivateKey,
    raw_owner: Vec<u8>,
}

impl Wallet {
    /// Parses a JWK JSON document. The JWK's `p2s` field, if present, is
    /// zeroed before use — it is PBES2 salt input unrelated to RSA key
    /// material and must not leak into signing.
    pub fn from_jwk_str(jwk_json: &str) -> Result<Self> {
        let mut value: serde_json::Value = serde_json::from_str(jwk_json)?;
        if let Some(p2s) = value.get_mut("p2s") {
            *p2s = serde_json::Value::String(String::new());
        }
        let jwk: JsonWebKey = value.to_string().parse().map_err(|e: jsonwebkey::Error| Error::Jwk(e.to_string()))?;
        let pem = jwk.key.to_pem();
        let rsa_key = rsa::pkcs8::DecodePrivateKey::from_pkcs8_pem(&pem)
            .map_err(|e| Error::Jwk(format!("JWK does not contain a PKCS#8 RSA private key: {e}")))?;

        let info = signer_info(SIG_TYPE_ARWEAVE)?;
        let mut raw_owner = rsa_key.to_public_key().n().to_bytes_be();
        while raw_owner.len() < info.owner_length {
            raw_owner.insert(0, 0);
        }
        Ok(Wallet { rsa_key, raw_owner })
    }

    /// Generates a fresh wallet. Only the mainnet key size (4096 bits) is
    /// supported; other sizes are rejected rather than silently generated.
    pub fn generate(bits: usize) -> Result<Self> {
        if bits != RSA_BITS {
            return Err(Error::Jwk(format!("unsupported RSA key size: {bits} (only {RSA_BITS} is supported)")));
        }
        let rsa_key = RsaPrivateKey::new(&mut rand::thread_rng(), bits)
            .map_err(Error::Rsa)?;
        let info = signer_info(SIG_TYPE_ARWEAVE)?;
        let mut raw_owner = rsa_key.to_public_key().n().to_bytes_be();
        while raw_owner.len() < info.owner_length {
            raw_owner.insert(0, 0);
        }
        Ok(Wallet { rsa_key, raw_owner })
    }

    pub fn raw_owner(&self) -> &[u8] {
        &self.raw_owner
    }

    pub fn owner(&self) -> String {
        b64enc(&self.raw_owner)
    }

    /// `base64url(SHA-256(raw_owner))`.
    pub fn address(&self) -> String {
        let digest = Sha256::digest(&self.raw_owner);
        b64enc(&digest)
    }

    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let salt_len = rsa_pss_salt_length(self.raw_owner.len());
        let padding = Pss::new_with_salt::<Sha256>(salt_len);
        let digest = Sha256::digest(message);
        Ok(self.rsa_key.sign_with_rng(&mut rand::thread_rng(), padding, &digest)?)
    }

    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let public_key: RsaPublicKey = self.rsa_key.to_public_key();
        let salt_len = rsa_pss_salt_length(self.raw_owner.len());
        let padding = Pss::new_with_salt::<Sha256>(salt_len);
        let digest = Sha256::digest(message);
        public_key.verify(padding, &digest, signature).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_rejects_non_mainnet_key_sizes() {
        assert!(Wallet::generate(2048).is_err());
    }

    #[test]
    fn generate_then_sign_and_verify_round_trips() {
        let wallet = Wallet::generate(RSA_BITS).unwrap();
        let message = b"arweave wallet smoke test";
        let signature = wallet.sign(message).unwrap();
        assert!(wallet.verify(message, &signature));
        assert!(!wallet.verify(b"tampered", &signature));
    }

    #[test]
    fn address_is_base64url_sha256_of_raw_owner() {
        let wallet = Wallet::generate(RSA_BITS).unwrap();
        let expected = b64enc(&Sha256::digest(wallet.raw_owner()));
        assert_eq!(wallet.address(), expected);
    }
}
