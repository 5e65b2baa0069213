use std::collections::BTreeSet;

use channel::{Channel, NoninteractiveProverChannel, NoninteractiveVerifierChannel};
use commitment::{
    make_table_prover_factory, make_table_verifier_factory, CommitmentHashes, RowCol,
};
use crypto::{HashName, Keccak256, Prng, PrngImpl};
use math::fields::f128::BaseElement;
use math::FieldElement;

use crate::bases::FftBases;
use crate::errors::FriVerifierError;
use crate::parameters::{FriParameters, FriProverConfig};
use crate::prover::FriProver;
use crate::test_utils::random_polynomial_evaluation;
use crate::verifier::FriVerifier;

type ProverChannel = NoninteractiveProverChannel<BaseElement>;
type VerifierChannel = NoninteractiveVerifierChannel<BaseElement>;

// TEST SCENARIO
// ================================================================================================
// Polynomial of degree < 64 * 5 over an evaluation domain of size 1024, folded with steps
// [2, 3, 1] down to a last layer of size 16 carrying at most 5 coefficients.

const LOG2_EVAL_DOMAIN: usize = 10;
const FRI_STEP_LIST: [usize; 3] = [2, 3, 1];
const LAST_LAYER_DEGREE_BOUND: u64 = 5;
const N_QUERIES: usize = 2;
const PROOF_OF_WORK_BITS: usize = 15;

fn channel_prng() -> Box<dyn Prng> {
    Box::new(PrngImpl::<Keccak256>::new_with_seed(b"fri smoke test public input"))
}

fn commitment_hashes() -> CommitmentHashes {
    CommitmentHashes::from_single_hash(HashName::Keccak256)
}

fn test_parameters() -> FriParameters<BaseElement> {
    let bases = FftBases::new(LOG2_EVAL_DOMAIN, BaseElement::ONE);
    FriParameters::new(
        FRI_STEP_LIST.to_vec(),
        LAST_LAYER_DEGREE_BOUND,
        N_QUERIES,
        bases,
        PROOF_OF_WORK_BITS,
    )
}

/// Runs the prover over a fresh witness; returns the proof and the prover's annotations.
fn fri_prove(witness: Vec<BaseElement>) -> (Vec<u8>, Vec<String>) {
    let params = test_parameters();
    let first_layer_coset = 1_u64 << FRI_STEP_LIST[0];
    let n_witness_rows = params.fft_bases.layer_size(0) / first_layer_coset;

    let mut channel = ProverChannel::new(channel_prng());

    // The first layer is committed outside the FRI protocol proper, as the composition oracle
    // would be in a full STARK.
    let factory = make_table_prover_factory::<BaseElement>(0, 0, commitment_hashes());
    let mut witness_table = factory(1, n_witness_rows, first_layer_coset as usize);
    witness_table.add_segment_for_commitment(&[witness.as_slice()], 0, first_layer_coset as usize);
    witness_table.commit(&mut channel);

    let witness_for_callback = witness.clone();
    let mut first_layer_callback = |queries: &[u64], channel: &mut ProverChannel| {
        let data_queries: BTreeSet<RowCol> = queries
            .iter()
            .map(|&q| RowCol::new(q / first_layer_coset, q % first_layer_coset))
            .collect();
        let rows = witness_table.start_decommitment_phase(data_queries, BTreeSet::new());
        let columns: Vec<Vec<BaseElement>> = (0..first_layer_coset)
            .map(|col| {
                rows.iter()
                    .map(|&row| witness_for_callback[(row * first_layer_coset + col) as usize])
                    .collect()
            })
            .collect();
        witness_table.decommit(&columns, channel);
    };

    let mut prover = FriProver::new(
        params,
        FriProverConfig::default(),
        make_table_prover_factory::<BaseElement>(0, 0, commitment_hashes()),
    );
    prover.prove_fri(&mut channel, witness, &mut first_layer_callback);

    let annotations = channel.annotations().to_vec();
    (channel.into_proof(), annotations)
}

/// Runs the verifier over a proof; returns the verifier's annotations on success.
fn fri_verify(
    proof: &[u8],
    expected_annotations: Option<Vec<String>>,
) -> Result<Vec<String>, FriVerifierError> {
    let params = test_parameters();
    let first_layer_coset = 1_u64 << FRI_STEP_LIST[0];
    let n_witness_rows = params.fft_bases.layer_size(0) / first_layer_coset;

    let mut channel = VerifierChannel::new(channel_prng(), proof);
    channel.disable_extra_annotations();
    if let Some(expected) = expected_annotations {
        channel.set_expected_annotations(expected);
    }

    let factory = make_table_verifier_factory::<BaseElement>(0, commitment_hashes());
    let mut witness_table = factory(n_witness_rows, first_layer_coset as usize);
    witness_table.read_commitment(&mut channel)?;

    let mut first_layer_callback = |queries: &[u64],
                                    channel: &mut VerifierChannel|
     -> Result<Vec<BaseElement>, FriVerifierError> {
        let data_queries: BTreeSet<RowCol> = queries
            .iter()
            .map(|&q| RowCol::new(q / first_layer_coset, q % first_layer_coset))
            .collect();
        let values = witness_table.query(&data_queries, &BTreeSet::new(), channel)?;
        if !witness_table.verify_decommitment(&values, channel)? {
            return Err(FriVerifierError::FirstLayerDecommitmentFailed);
        }
        Ok(queries
            .iter()
            .map(|&q| values[&RowCol::new(q / first_layer_coset, q % first_layer_coset)])
            .collect())
    };

    let mut verifier = FriVerifier::new(params, factory);
    verifier.verify_fri(&mut channel, &mut first_layer_callback)?;
    Ok(channel.annotations().to_vec())
}

fn low_degree_witness() -> Vec<BaseElement> {
    let bases = FftBases::new(LOG2_EVAL_DOMAIN, BaseElement::ONE);
    let degree_bound = (LAST_LAYER_DEGREE_BOUND as usize) << (FRI_STEP_LIST.iter().sum::<usize>());
    random_polynomial_evaluation(degree_bound, &bases)
}

// PROVE/VERIFY TESTS
// ================================================================================================

#[test]
fn fri_completeness() {
    let (proof, _) = fri_prove(low_degree_witness());
    assert!(fri_verify(&proof, None).is_ok());
}

#[test]
fn prover_and_verifier_annotations_match() {
    let (proof, prover_annotations) = fri_prove(low_degree_witness());
    // The verifier checks its own trace against the prover's line by line, and the surviving
    // traces must be identical end to end.
    let verifier_annotations = fri_verify(&proof, Some(prover_annotations.clone())).unwrap();
    assert_eq!(prover_annotations, verifier_annotations);
}

#[test]
fn any_single_flipped_byte_fails_verification() {
    let (proof, _) = fri_prove(low_degree_witness());
    assert!(fri_verify(&proof, None).is_ok());

    for byte_index in 0..proof.len() {
        let mut corrupted_proof = proof.clone();
        corrupted_proof[byte_index] ^= 1;
        assert!(
            fri_verify(&corrupted_proof, None).is_err(),
            "verification passed with corrupted byte {byte_index}"
        );
    }
}

#[test]
fn truncated_proof_fails_verification() {
    let (proof, _) = fri_prove(low_degree_witness());
    let truncated = &proof[..proof.len() - 1];
    assert!(matches!(
        fri_verify(truncated, None),
        Err(FriVerifierError::Channel(channel::VerifierError::ProofTooShort { .. }))
    ));
}

#[test]
#[should_panic(expected = "last layer degree")]
fn witness_of_too_high_degree_is_rejected_by_the_prover() {
    let bases = FftBases::new(LOG2_EVAL_DOMAIN, BaseElement::ONE);
    let degree_bound = ((LAST_LAYER_DEGREE_BOUND as usize) << FRI_STEP_LIST.iter().sum::<usize>()) * 2;
    let witness = random_polynomial_evaluation(degree_bound, &bases);
    let _ = fri_prove(witness);
}

#[test]
fn flipped_nonce_fails_the_grinding_check() {
    let (proof, _) = fri_prove(low_degree_witness());

    // The nonce sits right after the three commitment roots and the last-layer coefficients.
    let nonce_offset = 3 * 32 + LAST_LAYER_DEGREE_BOUND as usize * BaseElement::ELEMENT_BYTES;
    let mut corrupted_proof = proof.clone();
    corrupted_proof[nonce_offset] ^= 1;
    assert!(matches!(
        fri_verify(&corrupted_proof, None),
        Err(FriVerifierError::Channel(channel::VerifierError::ProofOfWorkFailed))
    ));
}
