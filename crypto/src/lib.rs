//! Hash primitives and deterministic randomness for the granite STARK
//! prover and verifier.
//!
//! This crate defines the digest type shared by all supported hash families,
//! the [Hasher] interface together with its concrete implementations
//! ([Keccak256], [Blake2s256] and the width-reducing [MaskedHash]), and the
//! counter-based [HashChain] PRNG that both transcript channels are built on.
//! All hash families produce 32-byte digests; the masked variants zero part
//! of the digest so that commitments can be consumed by verifiers with a
//! reduced word width.

mod digest;
pub use digest::{Digest, DIGEST_BYTES};

mod hash;
pub use hash::{
    Blake2s256, Blake2s256Masked160Lsb, Blake2s256Masked160Msb, HashName, Hasher, Keccak256,
    Keccak256Masked160Lsb, Keccak256Masked160Msb, MaskedHash,
};

mod hash_chain;
pub use hash_chain::HashChain;

mod prng;
pub use prng::{Prng, PrngImpl};
