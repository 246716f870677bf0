use anyhow::{anyhow, Result};
use base64::{engine::general_purpose, Engine as _};
use ring::aead;
use ring::rand::{SecureRandom, SystemRandom};

const NONCE_LEN: usize = 12;

/// AES-256-GCM cipher for the stored service-account blob.
///
/// The key is supplied (base64, 32 bytes) at startup and validated there;
/// there is no derived or generated fallback key. Payload format:
/// `enc:<nonce b64>:<ciphertext b64>`, a fresh random nonce per encryption.
pub struct CredentialCipher {
    key: aead::LessSafeKey,
    rng: SystemRandom,
}

impl CredentialCipher {
    pub fn from_base64_key(encoded: &str) -> Result<Self> {
        let key_bytes = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| anyhow!("master key is not valid base64: {}", e))?;
        if key_bytes.len() != 32 {
            return Err(anyhow!(
                "master key must decode to 32 bytes, got {}",
                key_bytes.len()
            ));
        }
        let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, &key_bytes)
            .map_err(|_| anyhow!("invalid key material"))?;
        Ok(Self {
            key: aead::LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| anyhow!("failed to generate nonce"))?;
        let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(nonce, aead::Aad::empty(), &mut in_out)
            .map_err(|_| anyhow!("encryption failed"))?;

        Ok(format!(
            "enc:{}:{}",
            general_purpose::STANDARD.encode(nonce_bytes),
            general_purpose::STANDARD.encode(in_out)
        ))
    }

    pub fn decrypt(&self, payload: &str) -> Result<String> {
        let parts: Vec<&str> = payload.split(':').collect();
        if parts.len() != 3 || parts[0] != "enc" {
            return Err(anyhow!("unknown encrypted payload format"));
        }
        let nonce_bytes = general_purpose::STANDARD
            .decode(parts[1])
            .map_err(|e| anyhow!("decode nonce: {}", e))?;
        let mut data = general_purpose::STANDARD
            .decode(parts[2])
            .map_err(|e| anyhow!("decode ciphertext: {}", e))?;

        let nonce = aead::Nonce::assume_unique_for_key(
            nonce_bytes
                .as_slice()
                .try_into()
                .map_err(|_| anyhow!("invalid nonce length"))?,
        );
        let plaintext = self
            .key
            .open_in_place(nonce, aead::Aad::empty(), &mut data)
            .map_err(|_| anyhow!("decryption failed"))?;
        Ok(String::from_utf8(plaintext.to_vec())?)
    }
}
