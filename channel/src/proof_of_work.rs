use core::marker::PhantomData;

use crypto::{Digest, Hasher, DIGEST_BYTES};

#[cfg(feature = "concurrent")]
use rayon::prelude::*;

// PROOF OF WORK
// ================================================================================================

/// Protocol constant mixed into every proof-of-work instance.
pub const PROOF_OF_WORK_MAGIC: u64 = 0x0123456789abcded;

/// Width of the nonce on the wire.
pub const NONCE_BYTES: usize = 8;

/// Nonces are scanned in batches of `2^LOG_DEFAULT_CHUNK_SIZE` per parallel round.
const LOG_DEFAULT_CHUNK_SIZE: u64 = 20;

/// Derives the per-instance digest `H(magic || seed || work_bits)` that nonce trials are hashed
/// against.
fn init_digest<H: Hasher>(seed: &[u8], work_bits: usize) -> Digest {
    let mut bytes = Vec::with_capacity(8 + seed.len() + 1);
    bytes.extend_from_slice(&PROOF_OF_WORK_MAGIC.to_be_bytes());
    bytes.extend_from_slice(seed);
    bytes.push(work_bits as u8);
    H::hash_bytes_with_length(&bytes)
}

/// Returns true if `H(init_digest || nonce)` opens with at least `work_bits` zero bits.
fn is_valid_nonce<H: Hasher>(init_digest: &Digest, nonce: u64, work_bits: usize) -> bool {
    let mut trial = [0_u8; DIGEST_BYTES + NONCE_BYTES];
    trial[..DIGEST_BYTES].copy_from_slice(init_digest.as_bytes());
    trial[DIGEST_BYTES..].copy_from_slice(&nonce.to_be_bytes());
    let digest = H::hash_bytes_with_length(&trial);
    let prefix = u64::from_be_bytes(digest.as_bytes()[..8].try_into().unwrap());
    prefix.leading_zeros() as usize >= work_bits
}

// PROVER
// ================================================================================================

/// Searches for a nonce such that `H(H(magic || seed || work_bits) || nonce)` has `work_bits`
/// leading zero bits.
pub struct ProofOfWorkProver<H: Hasher> {
    _hasher: PhantomData<H>,
}

impl<H: Hasher> ProofOfWorkProver<H> {
    pub fn new() -> Self {
        ProofOfWorkProver { _hasher: PhantomData }
    }

    /// Returns a valid 8-byte big-endian nonce for the given seed and difficulty.
    pub fn prove(&self, seed: &[u8], work_bits: usize) -> Vec<u8> {
        self.prove_with_chunk_size(seed, work_bits, LOG_DEFAULT_CHUNK_SIZE)
    }

    /// Like [Self::prove], with an explicit `2^log_chunk_size` batch size for the parallel scan.
    /// Any valid nonce may be returned, not necessarily the least one.
    pub fn prove_with_chunk_size(
        &self,
        seed: &[u8],
        work_bits: usize,
        log_chunk_size: u64,
    ) -> Vec<u8> {
        assert!(work_bits > 0 && work_bits <= 64, "invalid number of work bits");
        let init = init_digest::<H>(seed, work_bits);

        #[cfg(feature = "concurrent")]
        {
            let chunk_size = 1_u64 << log_chunk_size;
            let mut chunk_start = 0_u64;
            loop {
                let found = (chunk_start..chunk_start + chunk_size)
                    .into_par_iter()
                    .find_map_any(|nonce| {
                        is_valid_nonce::<H>(&init, nonce, work_bits).then_some(nonce)
                    });
                if let Some(nonce) = found {
                    return nonce.to_be_bytes().to_vec();
                }
                chunk_start = chunk_start
                    .checked_add(chunk_size)
                    .expect("exhausted the nonce space");
            }
        }

        #[cfg(not(feature = "concurrent"))]
        {
            let _ = log_chunk_size;
            for nonce in 0_u64..=u64::MAX {
                if is_valid_nonce::<H>(&init, nonce, work_bits) {
                    return nonce.to_be_bytes().to_vec();
                }
            }
            unreachable!("exhausted the nonce space");
        }
    }
}

impl<H: Hasher> Default for ProofOfWorkProver<H> {
    fn default() -> Self {
        Self::new()
    }
}

// VERIFIER
// ================================================================================================

/// Checks proof-of-work nonces.
pub struct ProofOfWorkVerifier<H: Hasher> {
    _hasher: PhantomData<H>,
}

impl<H: Hasher> ProofOfWorkVerifier<H> {
    pub const NONCE_BYTES: usize = NONCE_BYTES;

    pub fn new() -> Self {
        ProofOfWorkVerifier { _hasher: PhantomData }
    }

    /// Returns true iff `nonce_bytes` is a well-formed nonce meeting the difficulty for the
    /// given seed.
    pub fn verify(&self, seed: &[u8], work_bits: usize, nonce_bytes: &[u8]) -> bool {
        if nonce_bytes.len() != NONCE_BYTES || work_bits == 0 || work_bits > 64 {
            return false;
        }
        let init = init_digest::<H>(seed, work_bits);
        let nonce = u64::from_be_bytes(nonce_bytes.try_into().unwrap());
        is_valid_nonce::<H>(&init, nonce, work_bits)
    }
}

impl<H: Hasher> Default for ProofOfWorkVerifier<H> {
    fn default() -> Self {
        Self::new()
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crypto::{Keccak256, PrngImpl};

    fn seed() -> Vec<u8> {
        crypto::Prng::prng_state(&PrngImpl::<Keccak256>::new_with_seed(b"POW test"))
    }

    #[test]
    fn completeness() {
        let work_bits = 15;
        let witness = ProofOfWorkProver::<Keccak256>::new().prove(&seed(), work_bits);
        assert!(ProofOfWorkVerifier::<Keccak256>::new().verify(&seed(), work_bits, &witness));
    }

    #[test]
    fn soundness_against_other_difficulties() {
        let work_bits = 15;
        let witness = ProofOfWorkProver::<Keccak256>::new().prove(&seed(), work_bits);
        let verifier = ProofOfWorkVerifier::<Keccak256>::new();
        assert!(!verifier.verify(&seed(), work_bits + 1, &witness));
        assert!(!verifier.verify(&seed(), work_bits - 1, &witness));
    }

    #[test]
    fn bit_change_invalidates_witness() {
        let work_bits = 15;
        let mut witness = ProofOfWorkProver::<Keccak256>::new().prove(&seed(), work_bits);
        let verifier = ProofOfWorkVerifier::<Keccak256>::new();

        for byte_index in 0..witness.len() {
            for bit_index in 0..8 {
                witness[byte_index] ^= 1 << bit_index;
                assert!(!verifier.verify(&seed(), work_bits, &witness));
                witness[byte_index] ^= 1 << bit_index;
            }
        }
    }

    #[test]
    fn wrong_length_nonce_is_rejected() {
        let verifier = ProofOfWorkVerifier::<Keccak256>::new();
        assert!(!verifier.verify(&seed(), 15, &[0_u8; 7]));
        assert!(!verifier.verify(&seed(), 15, &[0_u8; 9]));
    }

    #[test]
    fn small_chunk_size_completeness() {
        let work_bits = 12;
        let witness =
            ProofOfWorkProver::<Keccak256>::new().prove_with_chunk_size(&seed(), work_bits, 8);
        assert!(ProofOfWorkVerifier::<Keccak256>::new().verify(&seed(), work_bits, &witness));
    }
}
