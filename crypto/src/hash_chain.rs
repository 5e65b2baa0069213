use core::marker::PhantomData;

use crate::digest::{Digest, DIGEST_BYTES};
use crate::hash::Hasher;

// HASH CHAIN
// ================================================================================================

/// A deterministic byte stream seeded by a digest.
///
/// Random bytes are produced by hashing the chain state together with an incrementing 64-bit
/// counter; a partial block left over from a draw is kept in a spare buffer and served first on
/// the next draw. Mixing new bytes into the chain resets both the counter and the spare buffer,
/// so the stream is a pure function of the seed and the mix history.
pub struct HashChain<H: Hasher> {
    digest: Digest,
    spare_bytes: [u8; 2 * DIGEST_BYTES],
    num_spare_bytes: usize,
    counter: u64,
    _hasher: PhantomData<H>,
}

impl<H: Hasher> Clone for HashChain<H> {
    fn clone(&self) -> Self {
        Self {
            digest: self.digest,
            spare_bytes: self.spare_bytes,
            num_spare_bytes: self.num_spare_bytes,
            counter: self.counter,
            _hasher: PhantomData,
        }
    }
}

impl<H: Hasher> HashChain<H> {
    /// Returns a hash chain with an all-zeros state.
    pub fn new() -> Self {
        HashChain {
            digest: Digest::default(),
            spare_bytes: [0_u8; 2 * DIGEST_BYTES],
            num_spare_bytes: 0,
            counter: 0,
            _hasher: PhantomData,
        }
    }

    /// Returns a hash chain seeded with a hash of the provided bytes.
    ///
    /// Seeding with the serialized public input ensures the initial randomness depends on the
    /// proven instance rather than on prover-chosen data.
    pub fn new_with_seed(seed: &[u8]) -> Self {
        let mut chain = Self::new();
        chain.init(seed);
        chain
    }

    /// Re-seeds the chain with a hash of the provided bytes.
    pub fn init(&mut self, bytes: &[u8]) {
        self.digest = H::hash_bytes_with_length(bytes);
        self.num_spare_bytes = 0;
        self.counter = 0;
    }

    /// Returns the current chain state.
    pub fn hash_chain_state(&self) -> &Digest {
        &self.digest
    }

    /// Fills `out` with the next bytes of the stream.
    pub fn random_bytes(&mut self, out: &mut [u8]) {
        let num_bytes = out.len();
        let num_full_blocks = num_bytes / DIGEST_BYTES;

        for block in 0..num_full_blocks {
            let offset = block * DIGEST_BYTES;
            self.more_random_bytes_using_hash_with_counter(&mut out[offset..offset + DIGEST_BYTES]);
        }

        let num_tail_bytes = num_bytes % DIGEST_BYTES;
        let tail_offset = num_full_blocks * DIGEST_BYTES;
        if num_tail_bytes <= self.num_spare_bytes {
            out[tail_offset..].copy_from_slice(&self.spare_bytes[..num_tail_bytes]);
            self.num_spare_bytes -= num_tail_bytes;
            self.spare_bytes.copy_within(num_tail_bytes.., 0);
        } else {
            self.more_random_bytes_using_hash_with_counter(&mut out[tail_offset..]);
        }
    }

    /// Mixes arbitrary bytes into the chain.
    pub fn update(&mut self, bytes: &[u8]) {
        // Implemented on top of mix_seed_with_bytes rather than the other way around because
        // mix_seed_with_bytes is the performance-critical one.
        self.mix_seed_with_bytes(bytes, 0);
    }

    /// Mixes bytes into the chain after incrementing the state, read as a big-endian 256-bit
    /// integer, by `seed_increment`. The increment creates domain separation between mixing and
    /// random-byte generation.
    pub fn mix_seed_with_bytes(&mut self, bytes: &[u8], seed_increment: u64) {
        let mut mixed = Vec::with_capacity(DIGEST_BYTES + bytes.len());
        let mut state = *self.digest.as_bytes();

        let mut carry = seed_increment as u128;
        for byte in state.iter_mut().rev() {
            if carry == 0 {
                break;
            }
            let sum = *byte as u128 + (carry & 0xff);
            *byte = (sum & 0xff) as u8;
            carry = (carry >> 8) + (sum >> 8);
        }

        mixed.extend_from_slice(&state);
        mixed.extend_from_slice(bytes);

        self.digest = H::hash_bytes_with_length(&mixed);
        self.num_spare_bytes = 0;
        self.counter = 0;
    }

    // HELPERS
    // --------------------------------------------------------------------------------------------

    /// Emits up to one digest worth of bytes into `out`, storing the unconsumed remainder of the
    /// digest in the spare buffer.
    fn more_random_bytes_using_hash_with_counter(&mut self, out: &mut [u8]) {
        let num_bytes = out.len();
        assert!(num_bytes <= DIGEST_BYTES, "asked to get more bytes than one digest size");

        let digest = Self::hash_with_counter(&self.digest, self.counter);
        self.counter += 1;
        out.copy_from_slice(&digest.as_bytes()[..num_bytes]);

        let num_remaining = DIGEST_BYTES - num_bytes;
        assert!(
            self.num_spare_bytes + num_remaining <= 2 * DIGEST_BYTES,
            "not enough room in spare bytes buffer; have {} bytes and want to add {} bytes",
            self.num_spare_bytes,
            num_remaining
        );
        self.spare_bytes[self.num_spare_bytes..self.num_spare_bytes + num_remaining]
            .copy_from_slice(&digest.as_bytes()[num_bytes..]);
        self.num_spare_bytes += num_remaining;
    }

    /// Hashes the chain state together with a counter. The counter occupies the last eight bytes
    /// of a two-digest-wide buffer, big-endian; the bytes between state and counter stay zero.
    fn hash_with_counter(digest: &Digest, counter: u64) -> Digest {
        let mut data = [0_u8; 2 * DIGEST_BYTES];
        data[..DIGEST_BYTES].copy_from_slice(digest.as_bytes());
        data[2 * DIGEST_BYTES - 8..].copy_from_slice(&counter.to_be_bytes());
        H::hash_bytes_with_length(&data)
    }
}

impl<H: Hasher> Default for HashChain<H> {
    fn default() -> Self {
        Self::new()
    }
}

// TESTS
// ================================================================================================
