/**
 * Per-file symmetric keys.
 *  - Random key generation
 *  - ChaCha20-Poly1305 sealing of blob content
 */
pub mod crypto;
/**
 * File identifiers: 128 random bits, exposed
 *  to users as a short, unambiguous string.
 */
pub mod id;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::crypto::{Secret, SecretError};
    pub use crate::id::{IdError, Identifier};
    pub use crate::version::build_info;
}
