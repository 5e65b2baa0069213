use core::fmt;
use core::marker::PhantomData;

use crypto::{with_hash, Digest, Prng, DIGEST_BYTES};
use math::FieldElement;

use crate::channel::{
    format_data, format_field_element, format_field_element_span, format_hash, format_number,
    Channel, ChannelState,
};
use crate::errors::VerifierError;
use crate::field::FieldElementBytes;
use crate::proof_of_work::ProofOfWorkVerifier;

// NONINTERACTIVE VERIFIER CHANNEL
// ================================================================================================

/// The verifier end of a Fiat-Shamir transcript.
///
/// Consumes the proof byte stream in the exact order the prover produced it; every byte read
/// outside the query phase is mixed into the hash chain, so randomness drawn here matches the
/// prover's draws point for point.
pub struct NoninteractiveVerifierChannel<F: FieldElementBytes> {
    state: ChannelState,
    prng: Box<dyn Prng>,
    proof: Vec<u8>,
    proof_read_index: usize,
    _field: PhantomData<F>,
}

impl<F: FieldElementBytes> NoninteractiveVerifierChannel<F> {
    /// Returns a verifier channel over the given proof. The PRNG must be seeded identically to
    /// the prover's.
    pub fn new(prng: Box<dyn Prng>, proof: &[u8]) -> Self {
        NoninteractiveVerifierChannel {
            state: ChannelState::new(),
            prng,
            proof: proof.to_vec(),
            proof_read_index: 0,
            _field: PhantomData,
        }
    }

    /// Returns true once the read cursor has consumed the entire proof.
    pub fn is_end_of_proof(&self) -> bool {
        self.proof_read_index >= self.proof.len()
    }

    // RECEIVING (PROOF BYTES)
    // --------------------------------------------------------------------------------------------

    /// Reads raw bytes off the proof, mixing them into the transcript outside the query phase.
    pub fn receive_bytes(&mut self, num_bytes: usize) -> Result<Vec<u8>, VerifierError> {
        if self.proof_read_index + num_bytes > self.proof.len() {
            return Err(VerifierError::ProofTooShort {
                offset: self.proof_read_index,
                requested: num_bytes,
                length: self.proof.len(),
            });
        }
        let raw_bytes = self.proof[self.proof_read_index..self.proof_read_index + num_bytes].to_vec();
        self.proof_read_index += num_bytes;
        if !self.state.in_query_phase {
            self.prng.mix_seed_with_bytes(&raw_bytes);
        }
        self.state.statistics.byte_count += num_bytes;
        Ok(raw_bytes)
    }

    /// Reads opaque data bytes.
    pub fn receive_data(
        &mut self,
        num_bytes: usize,
        annotation: &str,
    ) -> Result<Vec<u8>, VerifierError> {
        let data = self.receive_bytes(num_bytes)?;
        if self.annotations_enabled() {
            self.state.annotate_prover_to_verifier(&format_data(annotation, &data), data.len());
        }
        self.state.statistics.data_count += 1;
        Ok(data)
    }

    /// Reads one field element; rejects encodings at or above the modulus.
    pub fn receive_field_element(&mut self, annotation: &str) -> Result<F, VerifierError> {
        let bytes = self.receive_bytes(F::ELEMENT_BYTES)?;
        let value = F::from_bytes_be(&bytes).ok_or(VerifierError::InvalidFieldElement)?;
        if self.annotations_enabled() {
            self.state.annotate_prover_to_verifier(
                &format_field_element(annotation, &value),
                F::ELEMENT_BYTES,
            );
        }
        self.state.statistics.field_element_count += 1;
        Ok(value)
    }

    /// Reads `n_elements` field elements sent back to back.
    pub fn receive_field_element_span(
        &mut self,
        n_elements: usize,
        annotation: &str,
    ) -> Result<Vec<F>, VerifierError> {
        let bytes = self.receive_bytes(F::ELEMENT_BYTES * n_elements)?;
        let mut values = Vec::with_capacity(n_elements);
        for chunk in bytes.chunks(F::ELEMENT_BYTES) {
            values.push(F::from_bytes_be(chunk).ok_or(VerifierError::InvalidFieldElement)?);
        }
        if self.annotations_enabled() {
            self.state.annotate_prover_to_verifier(
                &format_field_element_span(annotation, &values),
                F::ELEMENT_BYTES * n_elements,
            );
        }
        self.state.statistics.field_element_count += n_elements;
        Ok(values)
    }

    /// Reads a commitment digest.
    pub fn receive_commitment_hash(&mut self, annotation: &str) -> Result<Digest, VerifierError> {
        let bytes = self.receive_bytes(DIGEST_BYTES)?;
        let digest = Digest::from_bytes(&bytes);
        if self.annotations_enabled() {
            self.state.annotate_prover_to_verifier(&format_hash(annotation, &digest), DIGEST_BYTES);
        }
        self.state.statistics.commitment_count += 1;
        self.state.statistics.hash_count += 1;
        Ok(digest)
    }

    /// Reads one decommitment node.
    pub fn receive_decommitment_node(&mut self, annotation: &str) -> Result<Digest, VerifierError> {
        let bytes = self.receive_bytes(DIGEST_BYTES)?;
        let digest = Digest::from_bytes(&bytes);
        if self.annotations_enabled() {
            self.state.annotate_prover_to_verifier(&format_hash(annotation, &digest), DIGEST_BYTES);
        }
        self.state.statistics.hash_count += 1;
        Ok(digest)
    }

    // RANDOMNESS
    // --------------------------------------------------------------------------------------------

    /// Draws a uniform number in `[0, upper_bound)` from the transcript.
    ///
    /// # Panics
    /// Panics if called after the query phase has begun, or if `upper_bound >= 2^48`.
    pub fn get_random_number(&mut self, upper_bound: u64) -> u64 {
        assert!(
            !self.state.in_query_phase,
            "verifier can't send randomness after query phase has begun"
        );
        assert!(upper_bound < 1 << 48, "random number upper bound is too high");
        let mut bytes = [0_u8; 8];
        self.prng.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes) % upper_bound
    }

    /// Draws a uniform field element from the transcript.
    ///
    /// # Panics
    /// Panics if called after the query phase has begun.
    pub fn get_random_field_element(&mut self) -> F {
        assert!(
            !self.state.in_query_phase,
            "verifier can't send randomness after query phase has begun"
        );
        let mut bytes = vec![0_u8; F::ELEMENT_BYTES];
        self.prng.random_bytes(&mut bytes);
        F::from_uniform_bytes(&bytes)
    }

    /// Draws a number and records the verifier-to-prover annotation. Noninteractively the
    /// "send" is implicit, but the draw must stay coupled with the prover's matching receive.
    pub fn get_and_send_random_number(&mut self, upper_bound: u64, annotation: &str) -> u64 {
        let number = self.get_random_number(upper_bound);
        if self.annotations_enabled() {
            self.state.annotate_verifier_to_prover(&format_number(annotation, number));
        }
        number
    }

    /// Draws a field element and records the verifier-to-prover annotation.
    pub fn get_and_send_random_field_element(&mut self, annotation: &str) -> F {
        let value = self.get_random_field_element();
        if self.annotations_enabled() {
            self.state.annotate_verifier_to_prover(&format_field_element(annotation, &value));
        }
        value
    }

    // PROOF OF WORK
    // --------------------------------------------------------------------------------------------

    /// Reads and checks the proof-of-work nonce against the transcript state preceding it.
    /// A zero difficulty is a no-op.
    pub fn apply_proof_of_work(&mut self, security_bits: usize) -> Result<(), VerifierError> {
        if security_bits == 0 {
            return Ok(());
        }

        self.enter_annotation_scope("Proof of Work");
        let prev_state = self.prng.prng_state();
        let result = (|| {
            let witness = self.receive_data(crate::proof_of_work::NONCE_BYTES, "POW")?;
            let valid = with_hash!(self.prng.hash_name(), HashT => {
                ProofOfWorkVerifier::<HashT>::new().verify(&prev_state, security_bits, &witness)
            });
            if valid {
                Ok(())
            } else {
                Err(VerifierError::ProofOfWorkFailed)
            }
        })();
        self.exit_annotation_scope();
        result
    }

    // EXTRA ANNOTATIONS
    // --------------------------------------------------------------------------------------------
    // Values the verifier computed itself, recorded in the trace for proof splitting. They carry
    // no proof bytes.

    pub fn annotate_extra_field_element(&mut self, value: &F, annotation: &str) {
        if self.annotations_enabled() && !self.extra_annotations_disabled() {
            self.state.annotate_prover_to_verifier(&format_field_element(annotation, value), 0);
        }
    }

    pub fn annotate_extra_decommitment_node(&mut self, digest: &Digest, annotation: &str) {
        if self.annotations_enabled() && !self.extra_annotations_disabled() {
            self.state.annotate_prover_to_verifier(&format_hash(annotation, digest), 0);
        }
    }
}

impl<F: FieldElementBytes> Channel for NoninteractiveVerifierChannel<F> {
    type Field = F;

    fn state(&self) -> &ChannelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ChannelState {
        &mut self.state
    }
}

impl<F: FieldElementBytes> fmt::Display for NoninteractiveVerifierChannel<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.state)
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prover_channel::NoninteractiveProverChannel;
    use crypto::{Keccak256, PrngImpl};
    use math::fields::f128::BaseElement;

    fn prng() -> Box<dyn Prng> {
        Box::new(PrngImpl::<Keccak256>::new_with_seed(b"verifier channel test"))
    }

    #[test]
    fn prover_and_verifier_draw_identical_randomness() {
        let mut prover: NoninteractiveProverChannel<BaseElement> =
            NoninteractiveProverChannel::new(prng());

        let sent_element = BaseElement::new(719);
        prover.send_field_element(sent_element, "element");
        let prover_alpha = prover.receive_field_element("alpha");
        let prover_number = prover.receive_number(1 << 20, "index");
        prover.send_data(b"tail", "tail");

        let mut verifier: NoninteractiveVerifierChannel<BaseElement> =
            NoninteractiveVerifierChannel::new(prng(), prover.proof());
        assert_eq!(verifier.receive_field_element("element").unwrap(), sent_element);
        assert_eq!(verifier.get_and_send_random_field_element("alpha"), prover_alpha);
        assert_eq!(verifier.get_and_send_random_number(1 << 20, "index"), prover_number);
        assert_eq!(verifier.receive_data(4, "tail").unwrap(), b"tail");
        assert!(verifier.is_end_of_proof());
    }

    #[test]
    fn annotations_match_prover_annotations() {
        let mut prover: NoninteractiveProverChannel<BaseElement> =
            NoninteractiveProverChannel::new(prng());
        prover.enter_annotation_scope("Layer 1");
        prover.send_field_element(BaseElement::new(3), "value");
        let _ = prover.receive_number(1024, "Index 0");
        prover.exit_annotation_scope();

        let mut verifier: NoninteractiveVerifierChannel<BaseElement> =
            NoninteractiveVerifierChannel::new(prng(), prover.proof());
        verifier.set_expected_annotations(prover.annotations().to_vec());
        verifier.enter_annotation_scope("Layer 1");
        let _ = verifier.receive_field_element("value").unwrap();
        let _ = verifier.get_and_send_random_number(1024, "Index 0");
        verifier.exit_annotation_scope();

        assert_eq!(prover.annotations(), verifier.annotations());
    }

    #[test]
    fn truncated_proof_is_reported() {
        let mut verifier: NoninteractiveVerifierChannel<BaseElement> =
            NoninteractiveVerifierChannel::new(prng(), &[1, 2, 3]);
        let err = verifier.receive_data(16, "data").unwrap_err();
        assert!(matches!(err, VerifierError::ProofTooShort { .. }));
    }

    #[test]
    fn non_canonical_field_element_is_reported() {
        let proof = [0xff_u8; 16];
        let mut verifier: NoninteractiveVerifierChannel<BaseElement> =
            NoninteractiveVerifierChannel::new(prng(), &proof);
        let err = verifier.receive_field_element("value").unwrap_err();
        assert_eq!(err, VerifierError::InvalidFieldElement);
    }

    #[test]
    #[should_panic(expected = "after query phase has begun")]
    fn drawing_after_query_phase_panics() {
        let mut verifier: NoninteractiveVerifierChannel<BaseElement> =
            NoninteractiveVerifierChannel::new(prng(), &[]);
        verifier.begin_query_phase();
        let _ = verifier.get_random_field_element();
    }

    #[test]
    fn proof_of_work_round_trip() {
        let mut prover: NoninteractiveProverChannel<BaseElement> =
            NoninteractiveProverChannel::new(prng());
        prover.send_data(b"some message", "msg");
        prover.apply_proof_of_work(10);
        let nonce_ok = prover.receive_number(1 << 30, "check");

        let mut verifier: NoninteractiveVerifierChannel<BaseElement> =
            NoninteractiveVerifierChannel::new(prng(), prover.proof());
        verifier.receive_data(12, "msg").unwrap();
        verifier.apply_proof_of_work(10).unwrap();
        assert_eq!(verifier.get_and_send_random_number(1 << 30, "check"), nonce_ok);
    }

    #[test]
    fn tampered_proof_of_work_nonce_fails() {
        let mut prover: NoninteractiveProverChannel<BaseElement> =
            NoninteractiveProverChannel::new(prng());
        prover.apply_proof_of_work(15);
        let mut proof = prover.into_proof();
        proof[7] ^= 1;

        let mut verifier: NoninteractiveVerifierChannel<BaseElement> =
            NoninteractiveVerifierChannel::new(prng(), &proof);
        assert_eq!(verifier.apply_proof_of_work(15).unwrap_err(), VerifierError::ProofOfWorkFailed);
    }
}
