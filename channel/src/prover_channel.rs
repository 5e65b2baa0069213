use core::fmt;
use core::marker::PhantomData;

use crypto::{with_hash, Digest, Prng};
use math::FieldElement;

use crate::channel::{
    format_data, format_field_element, format_field_element_span, format_hash, format_number,
    Channel, ChannelState,
};
use crate::field::FieldElementBytes;
use crate::proof_of_work::ProofOfWorkProver;

// NONINTERACTIVE PROVER CHANNEL
// ================================================================================================

/// The prover end of a Fiat-Shamir transcript.
///
/// Every sent byte is appended to the proof and, outside the query phase, mixed into the hash
/// chain; "received" randomness is drawn from the chain, so it is a deterministic function of
/// the seed and everything sent so far.
pub struct NoninteractiveProverChannel<F: FieldElementBytes> {
    state: ChannelState,
    prng: Box<dyn Prng>,
    proof: Vec<u8>,
    _field: PhantomData<F>,
}

impl<F: FieldElementBytes> NoninteractiveProverChannel<F> {
    /// Returns a prover channel drawing its randomness from the provided PRNG. The PRNG must be
    /// seeded with the serialized public input of the proven statement.
    pub fn new(prng: Box<dyn Prng>) -> Self {
        NoninteractiveProverChannel {
            state: ChannelState::new(),
            prng,
            proof: Vec::new(),
            _field: PhantomData,
        }
    }

    // SENDING
    // --------------------------------------------------------------------------------------------

    /// Appends raw bytes to the proof, mixing them into the transcript outside the query phase.
    pub fn send_bytes(&mut self, raw_bytes: &[u8]) {
        self.proof.extend_from_slice(raw_bytes);
        if !self.state.in_query_phase {
            self.prng.mix_seed_with_bytes(raw_bytes);
        }
        self.state.statistics.byte_count += raw_bytes.len();
    }

    /// Sends opaque data bytes.
    pub fn send_data(&mut self, data: &[u8], annotation: &str) {
        self.send_bytes(data);
        if self.annotations_enabled() {
            self.state.annotate_prover_to_verifier(&format_data(annotation, data), data.len());
        }
        self.state.statistics.data_count += 1;
    }

    /// Sends one field element in fixed-width big-endian standard form.
    pub fn send_field_element(&mut self, value: F, annotation: &str) {
        let mut bytes = vec![0_u8; F::ELEMENT_BYTES];
        value.to_bytes_be(&mut bytes);
        self.send_bytes(&bytes);
        if self.annotations_enabled() {
            self.state
                .annotate_prover_to_verifier(&format_field_element(annotation, &value), bytes.len());
        }
        self.state.statistics.field_element_count += 1;
    }

    /// Sends a span of field elements back to back.
    pub fn send_field_element_span(&mut self, values: &[F], annotation: &str) {
        let mut bytes = vec![0_u8; F::ELEMENT_BYTES * values.len()];
        for (value, chunk) in values.iter().zip(bytes.chunks_mut(F::ELEMENT_BYTES)) {
            value.to_bytes_be(chunk);
        }
        self.send_bytes(&bytes);
        if self.annotations_enabled() {
            self.state.annotate_prover_to_verifier(
                &format_field_element_span(annotation, values),
                bytes.len(),
            );
        }
        self.state.statistics.field_element_count += values.len();
    }

    /// Sends a commitment (a root digest).
    pub fn send_commitment_hash(&mut self, digest: &Digest, annotation: &str) {
        self.send_bytes(digest.as_bytes());
        if self.annotations_enabled() {
            self.state
                .annotate_prover_to_verifier(&format_hash(annotation, digest), digest.as_bytes().len());
        }
        self.state.statistics.commitment_count += 1;
        self.state.statistics.hash_count += 1;
    }

    /// Sends one decommitment node (an authentication-path digest).
    pub fn send_decommitment_node(&mut self, digest: &Digest, annotation: &str) {
        self.send_bytes(digest.as_bytes());
        if self.annotations_enabled() {
            self.state
                .annotate_prover_to_verifier(&format_hash(annotation, digest), digest.as_bytes().len());
        }
        self.state.statistics.hash_count += 1;
    }

    // RECEIVING (TRANSCRIPT RANDOMNESS)
    // --------------------------------------------------------------------------------------------

    /// Draws raw random bytes from the transcript.
    ///
    /// # Panics
    /// Panics if called after the query phase has begun.
    pub fn receive_bytes(&mut self, num_bytes: usize) -> Vec<u8> {
        assert!(
            !self.state.in_query_phase,
            "prover can't receive randomness after query phase has begun"
        );
        let mut bytes = vec![0_u8; num_bytes];
        self.prng.random_bytes(&mut bytes);
        bytes
    }

    /// Draws a uniform field element from the transcript.
    ///
    /// # Panics
    /// Panics if called after the query phase has begun.
    pub fn receive_field_element(&mut self, annotation: &str) -> F {
        let bytes = self.receive_bytes(F::ELEMENT_BYTES);
        let value = F::from_uniform_bytes(&bytes);
        if self.annotations_enabled() {
            self.state.annotate_verifier_to_prover(&format_field_element(annotation, &value));
        }
        value
    }

    /// Draws a uniform number in `[0, upper_bound)` from the transcript.
    ///
    /// # Panics
    /// Panics if called after the query phase has begun, or if `upper_bound >= 2^48` (the
    /// modular reduction would be noticeably biased).
    pub fn receive_number(&mut self, upper_bound: u64, annotation: &str) -> u64 {
        let number = self.receive_number_impl(upper_bound);
        if self.annotations_enabled() {
            self.state.annotate_verifier_to_prover(&format_number(annotation, number));
        }
        number
    }

    fn receive_number_impl(&mut self, upper_bound: u64) -> u64 {
        assert!(
            !self.state.in_query_phase,
            "prover can't receive randomness after query phase has begun"
        );
        assert!(upper_bound < 1 << 48, "random number upper bound is too high");
        let bytes = self.receive_bytes(8);
        u64::from_be_bytes(bytes.try_into().unwrap()) % upper_bound
    }

    // PROOF OF WORK
    // --------------------------------------------------------------------------------------------

    /// Runs the proof-of-work search against the current transcript state and sends the nonce.
    /// A zero difficulty is a no-op.
    pub fn apply_proof_of_work(&mut self, security_bits: usize) {
        if security_bits == 0 {
            return;
        }

        self.in_scope("Proof of Work", |channel| {
            let seed = channel.prng.prng_state();
            let witness = with_hash!(channel.prng.hash_name(), HashT => {
                ProofOfWorkProver::<HashT>::new().prove(&seed, security_bits)
            });
            tracing::debug!(security_bits, "proof of work nonce found");
            channel.send_data(&witness, "POW");
        });
    }

    // PROOF ACCESS
    // --------------------------------------------------------------------------------------------

    /// Returns the proof bytes accumulated so far.
    pub fn proof(&self) -> &[u8] {
        &self.proof
    }

    /// Consumes the channel and returns the proof.
    pub fn into_proof(self) -> Vec<u8> {
        self.proof
    }
}

impl<F: FieldElementBytes> Channel for NoninteractiveProverChannel<F> {
    type Field = F;

    fn state(&self) -> &ChannelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ChannelState {
        &mut self.state
    }
}

impl<F: FieldElementBytes> fmt::Display for NoninteractiveProverChannel<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.state)
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crypto::{Blake2s256, PrngImpl};
    use math::fields::f128::BaseElement;

    fn channel() -> NoninteractiveProverChannel<BaseElement> {
        NoninteractiveProverChannel::new(Box::new(PrngImpl::<Blake2s256>::new_with_seed(b"seed")))
    }

    #[test]
    fn receiving_bytes_has_requested_length() {
        let mut channel = channel();
        for size in [4_usize, 8, 16, 18, 32, 33, 63, 64, 65] {
            assert_eq!(channel.receive_bytes(size).len(), size);
        }
    }

    #[test]
    fn sending_message_affects_randomness() {
        let mut channel_1 = channel();
        let mut channel_2 = channel();

        assert_eq!(
            channel_1.receive_number(10_000_000, "n"),
            channel_2.receive_number(10_000_000, "n")
        );
        channel_1.send_field_element(BaseElement::new(1), "msg");
        assert_ne!(
            channel_1.receive_number(10_000_000, "n"),
            channel_2.receive_number(10_000_000, "n")
        );
    }

    #[test]
    fn different_messages_diverge() {
        let mut channel_1 = channel();
        let mut channel_2 = channel();

        channel_1.send_field_element(BaseElement::new(1), "msg");
        channel_2.send_field_element(BaseElement::new(2), "msg");
        assert_ne!(
            channel_1.receive_number(10_000_000, "n"),
            channel_2.receive_number(10_000_000, "n")
        );
    }

    #[test]
    fn recurring_draws_are_roughly_uniform() {
        let mut channel = channel();
        let mut histogram = [0_u64; 10];
        for _ in 0..10_000 {
            histogram[channel.receive_number(10, "n") as usize] += 1;
        }
        for count in histogram {
            assert!((850..=1150).contains(&count), "bucket count {count} outside tolerance");
        }
    }

    #[test]
    #[should_panic(expected = "after query phase has begun")]
    fn receiving_after_query_phase_panics() {
        let mut channel = channel();
        channel.begin_query_phase();
        let _ = channel.receive_number(1024, "n");
    }

    #[test]
    fn annotations_record_byte_ranges() {
        let mut channel = channel();
        channel.enter_annotation_scope("Layer 1");
        channel.send_data(&[1, 2, 3, 4], "payload");
        channel.exit_annotation_scope();

        let annotations = channel.annotations();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0], "P->V[0:4]: /Layer 1: payload: Data(0x01020304)\n");
    }
}
