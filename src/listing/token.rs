/// 페이지 커서 토큰 암호화
/// 토큰은 저장소 인스턴스 키 + 네임스페이스에 묶이므로 다른 인스턴스에서는 복호화되지 않는다.
// region:    --- Imports
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use crate::error::ListingError;
use sha2::{Digest, Sha256};
use tracing::{debug, error};

// endregion: --- Imports

const KEY_DOMAIN: &[u8] = b"auction-registry:offset-token:v1";
const NONCE_LEN: usize = 12;

// region:    --- Token Cipher
/// 불투명 토큰 암복호화 트레이트
pub trait TokenCipher: Send + Sync {
    fn encrypt(
        &self,
        instance_key: &str,
        namespace: &str,
        plaintext: &str,
    ) -> Result<String, ListingError>;

    /// 복호화 실패(위조, 다른 인스턴스/네임스페이스, 손상)는 `None`
    fn decrypt(&self, instance_key: &str, namespace: &str, token: &str) -> Option<String>;
}

/// ChaCha20-Poly1305 기반 구현
/// 논스를 평문에서 결정적으로 유도하므로 같은 경계값은 항상 같은 토큰이 된다.
#[derive(Debug, Default, Clone, Copy)]
pub struct SealedTokenCipher;

impl SealedTokenCipher {
    fn derive_key(instance_key: &str, namespace: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(KEY_DOMAIN);
        hasher.update((instance_key.len() as u64).to_le_bytes());
        hasher.update(instance_key.as_bytes());
        hasher.update(namespace.as_bytes());
        hasher.finalize().into()
    }

    fn derive_nonce(key: &[u8; 32], plaintext: &str) -> [u8; NONCE_LEN] {
        let digest = Sha256::new()
            .chain_update(key)
            .chain_update(plaintext.as_bytes())
            .finalize();
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&digest[..NONCE_LEN]);
        nonce
    }
}

impl TokenCipher for SealedTokenCipher {
    fn encrypt(
        &self,
        instance_key: &str,
        namespace: &str,
        plaintext: &str,
    ) -> Result<String, ListingError> {
        let key = Self::derive_key(instance_key, namespace);
        let nonce = Self::derive_nonce(&key, plaintext);
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|e| {
                error!("{:<12} --> 토큰 암호화 실패: {:?}", "Token", e);
                ListingError::TokenSealing
            })?;

        let mut token = Vec::with_capacity(NONCE_LEN + sealed.len());
        token.extend_from_slice(&nonce);
        token.extend_from_slice(&sealed);
        Ok(URL_SAFE_NO_PAD.encode(token))
    }

    fn decrypt(&self, instance_key: &str, namespace: &str, token: &str) -> Option<String> {
        let raw = URL_SAFE_NO_PAD.decode(token).ok()?;
        if raw.len() <= NONCE_LEN {
            debug!("{:<12} --> 토큰 길이 부족: {}", "Token", raw.len());
            return None;
        }
        let (nonce, sealed) = raw.split_at(NONCE_LEN);
        let key = Self::derive_key(instance_key, namespace);
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let plaintext = cipher.decrypt(Nonce::from_slice(nonce), sealed).ok()?;
        String::from_utf8(plaintext).ok()
    }
}
// endregion: --- Token Cipher
