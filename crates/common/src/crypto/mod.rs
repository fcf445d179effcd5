//! Key material for stored files
//!
//! Every file gets its own 256-bit [`Secret`], generated when the file's
//! identifier is allocated and stored next to its metadata. The gateway never
//! inspects the key; it is handed to the blob transport, which seals the
//! content with ChaCha20-Poly1305 before it leaves the process.

mod secret;

pub use secret::{
    plaintext_len, sealed_len, Opener, Secret, SecretError, CHUNK_SIZE, NONCE_SIZE,
    SEALED_CHUNK_SIZE, SECRET_SIZE, TAG_SIZE,
};
