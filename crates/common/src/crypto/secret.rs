//! Per-file content keys using ChaCha20-Poly1305

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Size of ChaCha20-Poly1305 nonce in bytes
pub const NONCE_SIZE: usize = 12;
/// Size of ChaCha20-Poly1305 key in bytes (256 bits)
pub const SECRET_SIZE: usize = 32;
/// Size of the Poly1305 tag closing every frame
pub const TAG_SIZE: usize = 16;
/// Plaintext bytes carried by every frame but the last
pub const CHUNK_SIZE: usize = 64 * 1024;
/// Sealed size of a full frame
pub const SEALED_CHUNK_SIZE: usize = NONCE_SIZE + CHUNK_SIZE + TAG_SIZE;

const FRAME_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("random source unavailable: {0}")]
    Random(#[from] getrandom::Error),
    #[error("invalid secret size, expected {SECRET_SIZE}, got {0}")]
    InvalidSize(usize),
    #[error("invalid base64 secret: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("ciphertext too short")]
    Truncated,
    #[error("encrypt error")]
    Encrypt,
    #[error("decrypt error")]
    Decrypt,
}

/// A 256-bit symmetric key for one stored file.
///
/// Content is sealed as a run of frames, each `nonce (12) || ciphertext || tag (16)`.
/// Every frame but the last carries exactly [`CHUNK_SIZE`] plaintext bytes and
/// the last always carries fewer, possibly none. The frame index and a final
/// flag are bound in as associated data, so dropped, reordered or truncated
/// frames fail to open. Serialized as a standard base64 string.
#[derive(PartialEq, Eq, Clone)]
pub struct Secret([u8; SECRET_SIZE]);

impl From<[u8; SECRET_SIZE]> for Secret {
    fn from(bytes: [u8; SECRET_SIZE]) -> Self {
        Secret(bytes)
    }
}

// keep key bytes out of logs
impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

impl Secret {
    /// Generate a new random key from the system CSPRNG.
    pub fn generate() -> Result<Self, SecretError> {
        let mut buff = [0; SECRET_SIZE];
        getrandom::getrandom(&mut buff)?;
        Ok(Self(buff))
    }

    pub fn from_slice(data: &[u8]) -> Result<Self, SecretError> {
        let bytes: [u8; SECRET_SIZE] = data
            .try_into()
            .map_err(|_| SecretError::InvalidSize(data.len()))?;
        Ok(bytes.into())
    }

    pub fn from_base64(encoded: &str) -> Result<Self, SecretError> {
        Self::from_slice(&STANDARD.decode(encoded)?)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn bytes(&self) -> &[u8] {
        self.0.as_ref()
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(self.bytes()))
    }

    /// Seal `data` under this key, one fresh random nonce per frame.
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, SecretError> {
        let cipher = self.cipher();
        let mut out = Vec::with_capacity(sealed_len(data.len() as u64) as usize);

        let full = data.len() / CHUNK_SIZE;
        for (index, chunk) in data.chunks(CHUNK_SIZE).take(full).enumerate() {
            seal_frame(&cipher, index as u64, false, chunk, &mut out)?;
        }
        seal_frame(&cipher, full as u64, true, &data[full * CHUNK_SIZE..], &mut out)?;

        Ok(out)
    }

    /// Open a whole sealed buffer at once.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, SecretError> {
        let mut opener = self.opener();
        let mut plaintext = opener.push(data)?;
        plaintext.extend_from_slice(&opener.finish()?);
        Ok(plaintext)
    }

    /// Start opening sealed content that arrives in pieces.
    pub fn opener(&self) -> Opener {
        Opener {
            cipher: self.cipher(),
            index: 0,
            pending: Vec::new(),
        }
    }
}

/// Incremental counterpart of [`Secret::decrypt`].
///
/// Feed sealed bytes through [`Opener::push`] in whatever pieces they arrive
/// and call [`Opener::finish`] once the source is exhausted. Plaintext is
/// released one frame at a time, only after that frame's tag has verified.
pub struct Opener {
    cipher: ChaCha20Poly1305,
    index: u64,
    pending: Vec<u8>,
}

impl Opener {
    /// Buffer `data` and return the plaintext of every frame it completes.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<u8>, SecretError> {
        self.pending.extend_from_slice(data);

        // a full-size frame is never the final one
        let mut plaintext = Vec::new();
        let mut offset = 0;
        while self.pending.len() - offset >= SEALED_CHUNK_SIZE {
            let frame = &self.pending[offset..offset + SEALED_CHUNK_SIZE];
            plaintext.extend_from_slice(&open_frame(&self.cipher, self.index, false, frame)?);
            self.index += 1;
            offset += SEALED_CHUNK_SIZE;
        }
        self.pending.drain(..offset);

        Ok(plaintext)
    }

    /// Open the final frame from whatever is still buffered.
    pub fn finish(self) -> Result<Vec<u8>, SecretError> {
        if self.pending.len() < FRAME_OVERHEAD {
            return Err(SecretError::Truncated);
        }
        open_frame(&self.cipher, self.index, true, &self.pending)
    }
}

/// Size of `plaintext` bytes once sealed.
pub fn sealed_len(plaintext: u64) -> u64 {
    let full = plaintext / CHUNK_SIZE as u64;
    let tail = plaintext % CHUNK_SIZE as u64;
    full * SEALED_CHUNK_SIZE as u64 + tail + FRAME_OVERHEAD as u64
}

/// Plaintext size behind `sealed` bytes, or `None` if no sealed content has that size.
pub fn plaintext_len(sealed: u64) -> Option<u64> {
    let full = sealed / SEALED_CHUNK_SIZE as u64;
    let tail = (sealed % SEALED_CHUNK_SIZE as u64).checked_sub(FRAME_OVERHEAD as u64)?;
    Some(full * CHUNK_SIZE as u64 + tail)
}

fn frame_aad(index: u64, last: bool) -> [u8; 9] {
    let mut aad = [0u8; 9];
    aad[..8].copy_from_slice(&index.to_be_bytes());
    aad[8] = last as u8;
    aad
}

fn seal_frame(
    cipher: &ChaCha20Poly1305,
    index: u64,
    last: bool,
    chunk: &[u8],
    out: &mut Vec<u8>,
) -> Result<(), SecretError> {
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    getrandom::getrandom(&mut nonce_bytes)?;

    let aad = frame_aad(index, last);
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: chunk,
                aad: &aad,
            },
        )
        .map_err(|_| SecretError::Encrypt)?;

    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(())
}

fn open_frame(
    cipher: &ChaCha20Poly1305,
    index: u64,
    last: bool,
    frame: &[u8],
) -> Result<Vec<u8>, SecretError> {
    if frame.len() < FRAME_OVERHEAD {
        return Err(SecretError::Truncated);
    }
    let (nonce, ciphertext) = frame.split_at(NONCE_SIZE);
    let aad = frame_aad(index, last);
    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: &aad,
            },
        )
        .map_err(|_| SecretError::Decrypt)
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Secret::from_base64(&encoded).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_secret_encrypt_decrypt() {
        let secret = Secret::generate().unwrap();
        let data = b"hello world, this is a test message for encryption";

        let encrypted = secret.encrypt(data).unwrap();
        let decrypted = secret.decrypt(&encrypted).unwrap();

        assert_eq!(data.as_slice(), decrypted.as_slice());
    }

    #[test]
    fn test_wrong_key_fails() {
        let encrypted = Secret::generate().unwrap().encrypt(b"payload").unwrap();
        let other = Secret::generate().unwrap();
        assert!(matches!(other.decrypt(&encrypted), Err(SecretError::Decrypt)));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let secret = Secret::generate().unwrap();
        let mut encrypted = secret.encrypt(b"test data for integrity check").unwrap();
        encrypted[NONCE_SIZE + 10] ^= 0xFF;
        assert!(secret.decrypt(&encrypted).is_err());
    }

    #[test]
    fn test_truncated_input() {
        let secret = Secret::generate().unwrap();
        assert!(matches!(secret.decrypt(&[0u8; 4]), Err(SecretError::Truncated)));
    }

    #[test]
    fn test_empty_data_encryption() {
        let secret = Secret::generate().unwrap();
        let encrypted = secret.encrypt(b"").unwrap();
        assert!(secret.decrypt(&encrypted).unwrap().is_empty());
    }

    #[test]
    fn test_multi_frame_opened_in_pieces() {
        let secret = Secret::generate().unwrap();
        let data: Vec<u8> = (0..CHUNK_SIZE * 2 + 100).map(|i| (i % 251) as u8).collect();
        let sealed = secret.encrypt(&data).unwrap();
        assert_eq!(sealed.len() as u64, sealed_len(data.len() as u64));

        // odd piece sizes straddle frame boundaries
        let mut opener = secret.opener();
        let mut opened = Vec::new();
        for piece in sealed.chunks(7919) {
            opened.extend_from_slice(&opener.push(piece).unwrap());
        }
        // only the final frame is held back
        assert_eq!(opened.len(), CHUNK_SIZE * 2);
        opened.extend_from_slice(&opener.finish().unwrap());
        assert_eq!(opened, data);
    }

    #[test]
    fn test_exact_chunk_multiple_ends_with_empty_frame() {
        let secret = Secret::generate().unwrap();
        let data = vec![3u8; CHUNK_SIZE];
        let sealed = secret.encrypt(&data).unwrap();
        assert_eq!(sealed.len(), SEALED_CHUNK_SIZE + NONCE_SIZE + TAG_SIZE);
        assert_eq!(secret.decrypt(&sealed).unwrap(), data);
    }

    #[test]
    fn test_dropped_final_frame_is_detected() {
        let secret = Secret::generate().unwrap();
        let sealed = secret.encrypt(&vec![1u8; CHUNK_SIZE + 10]).unwrap();

        // cut exactly at a frame boundary
        let cut = &sealed[..SEALED_CHUNK_SIZE];
        assert!(matches!(secret.decrypt(cut), Err(SecretError::Truncated)));
    }

    #[test]
    fn test_swapped_frames_fail() {
        let secret = Secret::generate().unwrap();
        let sealed = secret.encrypt(&vec![5u8; CHUNK_SIZE * 3]).unwrap();

        let mut swapped = Vec::with_capacity(sealed.len());
        swapped.extend_from_slice(&sealed[SEALED_CHUNK_SIZE..2 * SEALED_CHUNK_SIZE]);
        swapped.extend_from_slice(&sealed[..SEALED_CHUNK_SIZE]);
        swapped.extend_from_slice(&sealed[2 * SEALED_CHUNK_SIZE..]);
        assert!(matches!(secret.decrypt(&swapped), Err(SecretError::Decrypt)));
    }

    #[test]
    fn test_plaintext_len_inverts_sealed_len() {
        for len in [0, 1, CHUNK_SIZE as u64 - 1, CHUNK_SIZE as u64, 5 * CHUNK_SIZE as u64 + 17] {
            assert_eq!(plaintext_len(sealed_len(len)), Some(len));
        }
        assert_eq!(plaintext_len(0), None);
        assert_eq!(plaintext_len(FRAME_OVERHEAD as u64 - 1), None);
    }

    #[test]
    fn test_secret_size_validation() {
        assert!(matches!(
            Secret::from_slice(&[1u8; 16]),
            Err(SecretError::InvalidSize(16))
        ));
        assert!(Secret::from_slice(&[1u8; 64]).is_err());
        assert!(Secret::from_slice(&[1u8; SECRET_SIZE]).is_ok());
    }

    #[test]
    fn test_serializes_as_base64() {
        let secret = Secret::from([7u8; SECRET_SIZE]);
        let json = serde_json::to_string(&secret).unwrap();
        assert_eq!(json, format!("\"{}\"", STANDARD.encode([7u8; SECRET_SIZE])));

        let back: Secret = serde_json::from_str(&json).unwrap();
        assert_eq!(back, secret);
    }

    #[test]
    fn test_debug_hides_key() {
        let secret = Secret::from([9u8; SECRET_SIZE]);
        assert_eq!(format!("{:?}", secret), "Secret(..)");
    }
}
