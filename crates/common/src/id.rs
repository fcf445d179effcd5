//! File identifiers and their short textual form.
//!
//! An [`Identifier`] is 128 bits drawn from the operating system's CSPRNG, with
//! the RFC 4122 version (4) and variant (10) bits fixed. Users never see the
//! canonical `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` layout; they see the short
//! form produced by [`Identifier::short`], a fixed-length base57 string over an
//! alphabet with the visually ambiguous characters (`0 O 1 l I`) removed.
//!
//! The short form is used purely as an opaque lookup key. There is no decode
//! path back to the raw bytes.

use std::fmt;
use std::sync::OnceLock;

/// Size of an identifier in bytes.
pub const ID_SIZE: usize = 16;

/// Number of symbols in the short-encoding alphabet.
pub const ALPHABET_SIZE: usize = 57;

/// Seed for the short-encoding alphabet. Deduplicated and sorted before use.
pub const ALPHABET_SEED: &str = "23456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

#[derive(Debug, thiserror::Error)]
pub enum IdError {
    #[error("random source unavailable: {0}")]
    Random(#[from] getrandom::Error),
    #[error("encoding alphabet must contain exactly {ALPHABET_SIZE} symbols, got {0}")]
    AlphabetSize(usize),
}

/// A 128-bit random file identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identifier([u8; ID_SIZE]);

impl Identifier {
    /// Draw a fresh identifier from the system CSPRNG.
    ///
    /// Fails only if the random source is unavailable.
    pub fn generate() -> Result<Self, IdError> {
        let mut bytes = [0u8; ID_SIZE];
        getrandom::getrandom(&mut bytes)?;
        bytes[6] = (bytes[6] & 0x0f) | 0x40;
        bytes[8] = (bytes[8] & 0x3f) | 0x80;
        Ok(Self(bytes))
    }

    pub fn from_bytes(bytes: [u8; ID_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.0
    }

    /// The short, user-facing form of this identifier.
    pub fn short(&self) -> String {
        short_encoder().encode(self)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                f.write_str("-")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self)
    }
}

/// A deduplicated, lexicographically sorted symbol set.
#[derive(Debug, Clone)]
pub struct Alphabet {
    symbols: Vec<char>,
}

impl Alphabet {
    /// Build an alphabet from a seed string, keeping the first occurrence of
    /// each symbol and sorting the result.
    pub fn new(seed: &str) -> Result<Self, IdError> {
        let mut symbols: Vec<char> = Vec::with_capacity(seed.len());
        for c in seed.chars() {
            if !symbols.contains(&c) {
                symbols.push(c);
            }
        }

        if symbols.len() != ALPHABET_SIZE {
            return Err(IdError::AlphabetSize(symbols.len()));
        }

        symbols.sort_unstable();
        Ok(Self { symbols })
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbol(&self, index: usize) -> char {
        self.symbols[index]
    }
}

/// Base57 encoder for identifiers.
#[derive(Debug, Clone)]
pub struct ShortEncoder {
    alphabet: Alphabet,
    length: usize,
}

impl ShortEncoder {
    pub fn new(alphabet: Alphabet) -> Self {
        // ceil(log(256^16) / log(57)): enough digits for any 128-bit value
        let length =
            (ID_SIZE as f64 * 256f64.ln() / (alphabet.len() as f64).ln()).ceil() as usize;
        Self { alphabet, length }
    }

    /// Number of symbols in every encoding.
    pub fn encoded_len(&self) -> usize {
        self.length
    }

    /// Encode least-significant digit first, right-padded with the first
    /// symbol so that every identifier has the same length.
    pub fn encode(&self, id: &Identifier) -> String {
        let base = self.alphabet.len() as u128;
        let mut number = u128::from_be_bytes(id.0);
        let mut out = String::with_capacity(self.length);

        while number > 0 {
            out.push(self.alphabet.symbol((number % base) as usize));
            number /= base;
        }

        while out.len() < self.length {
            out.push(self.alphabet.symbol(0));
        }

        out
    }
}

/// The process-wide encoder.
///
/// Panics on first use if [`ALPHABET_SEED`] does not deduplicate to exactly
/// [`ALPHABET_SIZE`] symbols. The daemon forces this at startup.
pub fn short_encoder() -> &'static ShortEncoder {
    static ENCODER: OnceLock<ShortEncoder> = OnceLock::new();
    ENCODER.get_or_init(|| match Alphabet::new(ALPHABET_SEED) {
        Ok(alphabet) => ShortEncoder::new(alphabet),
        Err(e) => panic!("invalid identifier alphabet: {}", e),
    })
}

/// Allocate a new identifier and return its short form.
pub fn new_short() -> Result<String, IdError> {
    Ok(Identifier::generate()?.short())
}
