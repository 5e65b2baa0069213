use crate::hash::{HashName, Hasher};
use crate::hash_chain::HashChain;

// PRNG INTERFACE
// ================================================================================================

/// Object-safe view of a hash-chain PRNG.
///
/// Transcript channels select their hash family by name at session construction, so they hold
/// the PRNG behind this trait rather than a concrete [PrngImpl] instantiation.
pub trait Prng {
    /// Fills `out` with the next bytes of the stream.
    fn random_bytes(&mut self, out: &mut [u8]);

    /// Mixes the provided bytes into the stream state.
    fn mix_seed_with_bytes(&mut self, bytes: &[u8]);

    /// Returns the current stream state as bytes.
    fn prng_state(&self) -> Vec<u8>;

    /// Returns the hash family driving this PRNG.
    fn hash_name(&self) -> HashName;

    /// Returns an independent copy of this PRNG.
    fn clone_box(&self) -> Box<dyn Prng>;
}

// PRNG IMPLEMENTATION
// ================================================================================================

/// Hash-chain PRNG over a statically selected hash family.
pub struct PrngImpl<H: Hasher> {
    hash_chain: HashChain<H>,
}

impl<H: Hasher> Clone for PrngImpl<H> {
    fn clone(&self) -> Self {
        Self {
            hash_chain: self.hash_chain.clone(),
        }
    }
}

impl<H: Hasher> PrngImpl<H> {
    /// Returns a PRNG seeded with a hash of the provided bytes.
    pub fn new_with_seed(seed: &[u8]) -> Self {
        PrngImpl { hash_chain: HashChain::new_with_seed(seed) }
    }

    /// Draws a uniform integer in `[min, max]`.
    ///
    /// Used for test-data generation only: the modulo reduction below is slightly biased, and
    /// transcript draws go through the channel's bounded draw instead.
    pub fn uniform_int(&mut self, min: u64, max: u64) -> u64 {
        assert!(min <= max, "invalid interval");
        let mut bytes = [0_u8; 8];
        self.hash_chain.random_bytes(&mut bytes);
        min + u64::from_be_bytes(bytes) % (max - min + 1)
    }

    /// Draws `length` random bytes.
    pub fn random_byte_vector(&mut self, length: usize) -> Vec<u8> {
        let mut bytes = vec![0_u8; length];
        self.hash_chain.random_bytes(&mut bytes);
        bytes
    }
}

impl<H: Hasher + 'static> Prng for PrngImpl<H> {
    fn random_bytes(&mut self, out: &mut [u8]) {
        self.hash_chain.random_bytes(out);
    }

    fn mix_seed_with_bytes(&mut self, bytes: &[u8]) {
        self.hash_chain.mix_seed_with_bytes(bytes, 0);
    }

    fn prng_state(&self) -> Vec<u8> {
        self.hash_chain.hash_chain_state().as_bytes().to_vec()
    }

    fn hash_name(&self) -> HashName {
        HashName::from_name(&H::name()).expect("hash family is not in the runtime registry")
    }

    fn clone_box(&self) -> Box<dyn Prng> {
        Box::new(PrngImpl::clone(self))
    }
}

// TESTS
// ================================================================================================
