use core::marker::PhantomData;

use blake2::Digest as _;
use sha3::Digest as _;

use crate::digest::{Digest, DIGEST_BYTES};

// HASHER INTERFACE
// ================================================================================================

/// Interface implemented by every hash family usable in commitments and transcripts.
///
/// Implementations are stateless; a hash family is a type, not a value. The invariant
/// `Self::hash(a, b) == Self::hash_bytes_with_length(a || b)` must hold for every family, since
/// the commitment stack relies on it when it switches between byte-packing and two-to-one
/// hashing.
pub trait Hasher {
    /// Number of bytes in a digest produced by this family.
    const DIGEST_BYTES: usize = DIGEST_BYTES;

    /// The protocol name of this family, e.g. `keccak256` or `blake256_masked160_msb`.
    fn name() -> String;

    /// Hashes the given byte stream.
    fn hash_bytes_with_length(data: &[u8]) -> Digest;

    /// Wraps the given bytes into a digest without hashing.
    ///
    /// # Panics
    /// Panics if `data` is not exactly [DIGEST_BYTES] long.
    fn init_digest_to(data: &[u8]) -> Digest {
        Digest::from_bytes(data)
    }

    /// Hashes the concatenation of two digests.
    fn hash(h1: &Digest, h2: &Digest) -> Digest {
        let mut buffer = [0_u8; 2 * DIGEST_BYTES];
        buffer[..DIGEST_BYTES].copy_from_slice(h1.as_bytes());
        buffer[DIGEST_BYTES..].copy_from_slice(h2.as_bytes());
        Self::hash_bytes_with_length(&buffer)
    }
}

// CONCRETE FAMILIES
// ================================================================================================

/// The original Keccak-256 (pre-NIST-padding SHA3 candidate).
pub struct Keccak256;

impl Hasher for Keccak256 {
    fn name() -> String {
        "keccak256".to_string()
    }

    fn hash_bytes_with_length(data: &[u8]) -> Digest {
        let mut hasher = sha3::Keccak256::new();
        sha3::Digest::update(&mut hasher, data);
        let bytes: [u8; DIGEST_BYTES] = hasher.finalize().into();
        Digest::from(bytes)
    }
}

/// Blake2s with a 256-bit output.
pub struct Blake2s256;

impl Hasher for Blake2s256 {
    fn name() -> String {
        "blake256".to_string()
    }

    fn hash_bytes_with_length(data: &[u8]) -> Digest {
        let mut hasher = blake2::Blake2s256::new();
        blake2::Digest::update(&mut hasher, data);
        let bytes: [u8; DIGEST_BYTES] = hasher.finalize().into();
        Digest::from(bytes)
    }
}

// MASKED HASH
// ================================================================================================

/// Reduces an inner hash family to `NUM_EFFECTIVE_BYTES` effective bytes.
///
/// When `IS_MSB` is true the most significant (leading) bytes of the inner digest are kept and
/// the rest are zeroed; otherwise the least significant (trailing) bytes are kept in place.
/// Wrapping a digest with [Hasher::init_digest_to] does not re-mask it.
pub struct MaskedHash<H: Hasher, const NUM_EFFECTIVE_BYTES: usize, const IS_MSB: bool>(
    PhantomData<H>,
);

impl<H: Hasher, const NUM_EFFECTIVE_BYTES: usize, const IS_MSB: bool>
    MaskedHash<H, NUM_EFFECTIVE_BYTES, IS_MSB>
{
    fn mask(digest: Digest) -> Digest {
        let mut bytes = [0_u8; DIGEST_BYTES];
        if IS_MSB {
            bytes[..NUM_EFFECTIVE_BYTES].copy_from_slice(&digest.as_bytes()[..NUM_EFFECTIVE_BYTES]);
        } else {
            let offset = DIGEST_BYTES - NUM_EFFECTIVE_BYTES;
            bytes[offset..].copy_from_slice(&digest.as_bytes()[offset..]);
        }
        Digest::from(bytes)
    }
}

impl<H: Hasher, const NUM_EFFECTIVE_BYTES: usize, const IS_MSB: bool> Hasher
    for MaskedHash<H, NUM_EFFECTIVE_BYTES, IS_MSB>
{
    fn name() -> String {
        let suffix = if IS_MSB { "msb" } else { "lsb" };
        format!("{}_masked{}_{}", H::name(), NUM_EFFECTIVE_BYTES * 8, suffix)
    }

    fn hash_bytes_with_length(data: &[u8]) -> Digest {
        Self::mask(H::hash_bytes_with_length(data))
    }

    fn hash(h1: &Digest, h2: &Digest) -> Digest {
        Self::mask(H::hash(h1, h2))
    }
}

/// Keccak-256 keeping the 160 most significant bits.
pub type Keccak256Masked160Msb = MaskedHash<Keccak256, 20, true>;
/// Keccak-256 keeping the 160 least significant bits.
pub type Keccak256Masked160Lsb = MaskedHash<Keccak256, 20, false>;
/// Blake2s-256 keeping the 160 most significant bits.
pub type Blake2s256Masked160Msb = MaskedHash<Blake2s256, 20, true>;
/// Blake2s-256 keeping the 160 least significant bits.
pub type Blake2s256Masked160Lsb = MaskedHash<Blake2s256, 20, false>;

// RUNTIME SELECTION
// ================================================================================================

/// The closed set of hash families selectable by name at session construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashName {
    Keccak256,
    Blake2s256,
    Keccak256Masked160Msb,
    Keccak256Masked160Lsb,
    Blake2s256Masked160Msb,
    Blake2s256Masked160Lsb,
}

impl HashName {
    /// Resolves a protocol name string to a hash family.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "keccak256" => Some(HashName::Keccak256),
            "blake256" => Some(HashName::Blake2s256),
            "keccak256_masked160_msb" => Some(HashName::Keccak256Masked160Msb),
            "keccak256_masked160_lsb" => Some(HashName::Keccak256Masked160Lsb),
            "blake256_masked160_msb" => Some(HashName::Blake2s256Masked160Msb),
            "blake256_masked160_lsb" => Some(HashName::Blake2s256Masked160Lsb),
            _ => None,
        }
    }

    /// Returns the protocol name of this family.
    pub fn as_str(&self) -> &'static str {
        match self {
            HashName::Keccak256 => "keccak256",
            HashName::Blake2s256 => "blake256",
            HashName::Keccak256Masked160Msb => "keccak256_masked160_msb",
            HashName::Keccak256Masked160Lsb => "keccak256_masked160_lsb",
            HashName::Blake2s256Masked160Msb => "blake256_masked160_msb",
            HashName::Blake2s256Masked160Lsb => "blake256_masked160_lsb",
        }
    }
}

impl core::fmt::Display for HashName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invokes `$body` with `$hash` bound to the hash family selected by a [HashName] value.
///
/// This is the runtime bridge between name-selected sessions and the statically typed hash
/// implementations.
#[macro_export]
macro_rules! with_hash {
    ($name:expr, $hash:ident => $body:expr) => {{
        match $name {
            $crate::HashName::Keccak256 => {
                type $hash = $crate::Keccak256;
                $body
            }
            $crate::HashName::Blake2s256 => {
                type $hash = $crate::Blake2s256;
                $body
            }
            $crate::HashName::Keccak256Masked160Msb => {
                type $hash = $crate::Keccak256Masked160Msb;
                $body
            }
            $crate::HashName::Keccak256Masked160Lsb => {
                type $hash = $crate::Keccak256Masked160Lsb;
                $body
            }
            $crate::HashName::Blake2s256Masked160Msb => {
                type $hash = $crate::Blake2s256Masked160Msb;
                $body
            }
            $crate::HashName::Blake2s256Masked160Lsb => {
                type $hash = $crate::Blake2s256Masked160Lsb;
                $body
            }
        }
    }};
}

// TESTS
// ================================================================================================
